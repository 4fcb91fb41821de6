//! Devirtualization of calls with statically known targets.

use rustc_hash::FxHashMap;

use jit_hir::{Function, InstrKind, ValueId};

use crate::rewrite::count_uses;
use crate::{Pass, PassError, Preconditions};

/// Turns calls whose target is known into `InvokeStatic`:
///
/// - `VectorCall` of a `Func[q]` constant;
/// - `CallMethod` whose method value is a `Func[q]` constant (the receiver
///   becomes the first argument);
/// - in static functions, `CallMethod` of a `LoadMethod` on a `User[C]`
///   receiver whose method resolves through `C`'s class chain. The
///   `LoadMethod` is removed once nothing else reads it.
pub struct CallOptimization;

impl Pass for CallOptimization {
    fn name(&self) -> &'static str {
        "CallOptimization"
    }

    fn preconditions(&self) -> Preconditions {
        Preconditions::NO_REFCOUNTS
    }

    fn run(&mut self, func: &mut Function) -> Result<(), PassError> {
        let methods = if func.mode.is_static() {
            resolved_methods(func)
        } else {
            FxHashMap::default()
        };

        let mut rewritten = 0usize;
        let mut orphaned: Vec<ValueId> = Vec::new();
        for b in 0..func.blocks.len() {
            for i in 0..func.blocks[b].body.len() {
                let Some((call, via_method)) = devirtualize(func, &methods, &func.blocks[b].body[i].kind)
                else {
                    continue;
                };
                func.blocks[b].body[i].kind = call;
                orphaned.extend(via_method);
                rewritten += 1;
            }
        }

        let mut removed = 0usize;
        for method in orphaned {
            if count_uses(func, method) == 0 {
                for block in &mut func.blocks {
                    block.body.retain(|instr| instr.kind.dst() != Some(method));
                }
                removed += 1;
            }
        }

        tracing::debug!(function = %func.name, rewritten, removed, "calls devirtualized");
        Ok(())
    }
}

/// `LoadMethod` results in a static function whose target resolves:
/// method value → (receiver it was loaded from, qualified target).
fn resolved_methods(func: &Function) -> FxHashMap<ValueId, (ValueId, String)> {
    let mut out = FxHashMap::default();
    for instr in func.blocks.iter().flat_map(|b| &b.body) {
        let InstrKind::LoadMethod { dst, obj, attr } = &instr.kind else {
            continue;
        };
        let Some(class) = func.value_type(*obj).user_class() else {
            continue;
        };
        if let Some(owner) = func.resolve_method(class, &attr.name) {
            out.insert(*dst, (*obj, format!("{}.{}", owner.name, attr.name)));
        }
    }
    out
}

/// The `InvokeStatic` replacing `kind`, plus the method value it no longer
/// needs when the target came from a resolved `LoadMethod`.
fn devirtualize(
    func: &Function,
    methods: &FxHashMap<ValueId, (ValueId, String)>,
    kind: &InstrKind,
) -> Option<(InstrKind, Option<ValueId>)> {
    match kind {
        InstrKind::VectorCall {
            dst,
            func: callee,
            args,
        } => {
            let target = func.value_type(*callee).func_constant()?;
            Some((
                InstrKind::InvokeStatic {
                    dst: *dst,
                    target: target.to_owned(),
                    args: args.clone(),
                },
                None,
            ))
        }
        InstrKind::CallMethod {
            dst,
            method,
            receiver,
            args,
        } => {
            let (target, via_method) = match func.value_type(*method).func_constant() {
                Some(q) => (q.to_owned(), None),
                None => {
                    let (loaded_from, target) = methods.get(method)?;
                    if loaded_from != receiver {
                        return None;
                    }
                    (target.clone(), Some(*method))
                }
            };
            let mut call_args = Vec::with_capacity(args.len() + 1);
            call_args.push(*receiver);
            call_args.extend_from_slice(args);
            Some((
                InstrKind::InvokeStatic {
                    dst: *dst,
                    target,
                    args: call_args,
                },
                via_method,
            ))
        }
        _ => None,
    }
}
