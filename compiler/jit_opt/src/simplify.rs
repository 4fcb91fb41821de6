//! Local simplification to a fixed point.
//!
//! Each round does, in order:
//!
//! 1. **Instruction rewrites**: copy propagation of `Assign`, trivial phis,
//!    redundant `GuardType`, algebraic identities, and constant folding of
//!    arithmetic, comparisons and `IsTruthy`.
//! 2. **Branch folding**: a `CondBranch` on a value with known truthiness
//!    becomes a `Branch`, and the dropped edge's phi inputs go with it.
//! 3. **Cleanup**: unreachable blocks and dead pure instructions are removed.
//!
//! Rounds repeat until nothing changes. Folding never changes behavior:
//! arithmetic that would overflow or divide by zero is left alone, and an
//! object-level identity like `x + 0` only applies when `x` is an exact int.

use jit_hir::{
    BinaryOpKind, CompareKind, Const, Function, InstrKind, Terminator, Type,
    TypeKind, ValueId,
};

use crate::rewrite::{drop_phi_inputs, remove_unreachable_blocks, sweep_dead};
use crate::{Pass, PassError, Preconditions};

/// Copy propagation, constant folding and branch folding.
pub struct Simplify;

impl Pass for Simplify {
    fn name(&self) -> &'static str {
        "Simplify"
    }

    fn preconditions(&self) -> Preconditions {
        Preconditions::SSA | Preconditions::NO_REFCOUNTS
    }

    fn run(&mut self, func: &mut Function) -> Result<(), PassError> {
        let mut rounds = 0u32;
        loop {
            rounds += 1;
            let mut changed = simplify_instructions(func);
            changed |= fold_branches(func);
            changed |= remove_unreachable_blocks(func) > 0;
            changed |= sweep_dead(func) > 0;
            if !changed {
                break;
            }
        }
        tracing::debug!(function = %func.name, rounds, "simplify converged");
        Ok(())
    }
}

/// What to do with one instruction.
enum Rewrite {
    /// Every use of `from` becomes `to`; the instruction goes away.
    Forward { from: ValueId, to: ValueId },
    /// The instruction becomes `kind`, and its output gets type `ty`.
    Replace { kind: InstrKind, ty: Type },
}

fn simplify_instructions(func: &mut Function) -> bool {
    let mut changed = false;
    for b in 0..func.blocks.len() {
        let mut i = 0;
        while i < func.blocks[b].body.len() {
            match simplify_instr(func, &func.blocks[b].body[i].kind) {
                Some(Rewrite::Forward { from, to }) => {
                    func.blocks[b].body.remove(i);
                    func.replace_uses(from, to);
                    changed = true;
                }
                Some(Rewrite::Replace { kind, ty }) => {
                    if let Some(dst) = kind.dst() {
                        func.set_value_type(dst, ty);
                    }
                    func.blocks[b].body[i].kind = kind;
                    changed = true;
                    i += 1;
                }
                None => i += 1,
            }
        }
    }
    changed
}

fn simplify_instr(func: &Function, kind: &InstrKind) -> Option<Rewrite> {
    let ty = |v: ValueId| func.value_type(v);
    match kind {
        InstrKind::Assign { dst, src } => Some(Rewrite::Forward {
            from: *dst,
            to: *src,
        }),

        InstrKind::Phi { dst, inputs } => {
            let mut distinct = inputs.iter().map(|(_, v)| *v).filter(|v| v != dst);
            let first = distinct.next()?;
            distinct.all(|v| v == first).then_some(Rewrite::Forward {
                from: *dst,
                to: first,
            })
        }

        InstrKind::GuardType {
            dst,
            ty: wanted,
            value,
        } => satisfies(ty(*value), wanted).then_some(Rewrite::Forward {
            from: *dst,
            to: *value,
        }),

        InstrKind::IntBinaryOp {
            dst,
            op,
            left,
            right,
        } => {
            let (l, r) = (ty(*left).int_constant(), ty(*right).int_constant());
            if let (Some(a), Some(b)) = (l, r) {
                return fold_arith(*op, a, b).map(|n| load_const(*dst, Type::cint64_const(n)));
            }
            identity(*op, l, r, *left, *right).map(|to| Rewrite::Forward { from: *dst, to })
        }

        InstrKind::BinaryOp {
            dst,
            op,
            left,
            right,
        } => {
            if *ty(*left).kind() != TypeKind::Long || *ty(*right).kind() != TypeKind::Long {
                return None;
            }
            let (l, r) = (ty(*left).int_constant(), ty(*right).int_constant());
            if let (Some(a), Some(b)) = (l, r) {
                return fold_arith(*op, a, b).map(|n| load_const(*dst, Type::long_const(n)));
            }
            identity(*op, l, r, *left, *right).map(|to| Rewrite::Forward { from: *dst, to })
        }

        InstrKind::Compare {
            dst,
            kind,
            op,
            left,
            right,
        } => {
            let result = match kind {
                CompareKind::Generic => return None,
                CompareKind::Long | CompareKind::Primitive => {
                    let a = ty(*left).int_constant()?;
                    let b = ty(*right).int_constant()?;
                    op.evaluate(&a, &b)
                }
                CompareKind::Unicode => {
                    let (Some(Const::Str(a)), Some(Const::Str(b))) =
                        (ty(*left).constant_value(), ty(*right).constant_value())
                    else {
                        return None;
                    };
                    op.evaluate(a, b)
                }
            };
            let folded = if *kind == CompareKind::Primitive {
                Type::cbool_const(result)
            } else {
                Type::bool_const(result)
            };
            Some(load_const(*dst, folded))
        }

        InstrKind::IsTruthy { dst, value } => ty(*value)
            .known_truthiness()
            .map(|b| load_const(*dst, Type::cbool_const(b))),

        _ => None,
    }
}

fn load_const(dst: ValueId, ty: Type) -> Rewrite {
    Rewrite::Replace {
        kind: InstrKind::LoadConst {
            dst,
            ty: ty.clone(),
        },
        ty,
    }
}

/// Whether a value of type `actual` already passes a guard for `wanted`.
fn satisfies(actual: &Type, wanted: &Type) -> bool {
    if *wanted.kind() == TypeKind::Object && wanted.constant_value().is_none() {
        return true;
    }
    actual.kind() == wanted.kind()
        && (wanted.constant_value().is_none() || actual.constant_value() == wanted.constant_value())
}

/// Integer arithmetic with Python semantics. `None` when the result is not
/// representable or the operation would raise.
fn fold_arith(op: BinaryOpKind, a: i64, b: i64) -> Option<i64> {
    match op {
        BinaryOpKind::Add => a.checked_add(b),
        BinaryOpKind::Subtract => a.checked_sub(b),
        BinaryOpKind::Multiply => a.checked_mul(b),
        BinaryOpKind::FloorDivide => floor_div(a, b),
        BinaryOpKind::Modulo => floor_mod(a, b),
        BinaryOpKind::And => Some(a & b),
        BinaryOpKind::Or => Some(a | b),
        BinaryOpKind::Xor => Some(a ^ b),
    }
}

/// Division rounding toward negative infinity.
fn floor_div(a: i64, b: i64) -> Option<i64> {
    let q = a.checked_div(b)?;
    if a % b != 0 && ((a < 0) != (b < 0)) {
        q.checked_sub(1)
    } else {
        Some(q)
    }
}

/// Remainder with the sign of the divisor.
fn floor_mod(a: i64, b: i64) -> Option<i64> {
    let r = a.checked_rem(b)?;
    if r != 0 && ((r < 0) != (b < 0)) {
        Some(r + b)
    } else {
        Some(r)
    }
}

/// The operand an identity operation reduces to, if any.
fn identity(
    op: BinaryOpKind,
    left_const: Option<i64>,
    right_const: Option<i64>,
    left: ValueId,
    right: ValueId,
) -> Option<ValueId> {
    use BinaryOpKind::{Add, FloorDivide, Multiply, Or, Subtract, Xor};
    match (op, left_const, right_const) {
        (Add | Subtract | Or | Xor, _, Some(0)) | (Multiply | FloorDivide, _, Some(1)) => {
            Some(left)
        }
        (Add | Or | Xor, Some(0), _) | (Multiply, Some(1), _) => Some(right),
        _ => None,
    }
}

/// Turn conditional branches on constants into plain branches.
fn fold_branches(func: &mut Function) -> bool {
    let mut folded = 0usize;
    for id in func.block_ids().collect::<Vec<_>>() {
        let Terminator::CondBranch {
            cond,
            if_true,
            if_false,
        } = func.block(id).terminator
        else {
            continue;
        };
        let Some(truth) = func.value_type(cond).known_truthiness() else {
            continue;
        };
        let (taken, dropped) = if truth {
            (if_true, if_false)
        } else {
            (if_false, if_true)
        };
        func.block_mut(id).terminator = Terminator::Branch { target: taken };
        if dropped != taken {
            drop_phi_inputs(func, dropped, id);
        }
        folded += 1;
    }
    folded > 0
}
