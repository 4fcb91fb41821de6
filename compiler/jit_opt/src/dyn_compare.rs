//! Specialization of generic comparisons by operand type.

use jit_hir::{CompareKind, Function, InstrKind, TypeKind};

use crate::{Pass, PassError};

/// Rewrites `Compare` into `LongCompare`, `UnicodeCompare` or
/// `PrimitiveCompare` when both operands are known to be exact ints, exact
/// strings, or the same unboxed primitive.
pub struct DynamicComparisonElimination;

impl Pass for DynamicComparisonElimination {
    fn name(&self) -> &'static str {
        "DynamicComparisonElimination"
    }

    fn run(&mut self, func: &mut Function) -> Result<(), PassError> {
        let mut rewritten = 0usize;
        for b in 0..func.blocks.len() {
            for i in 0..func.blocks[b].body.len() {
                let InstrKind::Compare {
                    dst,
                    kind: CompareKind::Generic,
                    left,
                    right,
                    ..
                } = func.blocks[b].body[i].kind
                else {
                    continue;
                };
                let Some(specialized) =
                    specialize(func.value_type(left).kind(), func.value_type(right).kind())
                else {
                    continue;
                };

                let instr = &mut func.blocks[b].body[i];
                if let InstrKind::Compare { kind, .. } = &mut instr.kind {
                    *kind = specialized;
                }
                if let Some(ty) = instr.kind.natural_type() {
                    func.set_value_type(dst, ty);
                }
                rewritten += 1;
            }
        }

        tracing::debug!(function = %func.name, rewritten, "comparisons specialized");
        Ok(())
    }
}

fn specialize(left: &TypeKind, right: &TypeKind) -> Option<CompareKind> {
    match (left, right) {
        (TypeKind::Long, TypeKind::Long) => Some(CompareKind::Long),
        (TypeKind::Str, TypeKind::Str) => Some(CompareKind::Unicode),
        (TypeKind::CInt64, TypeKind::CInt64)
        | (TypeKind::CDouble, TypeKind::CDouble)
        | (TypeKind::CBool, TypeKind::CBool) => Some(CompareKind::Primitive),
        _ => None,
    }
}
