//! Static resolution of `super()` attribute and method lookups.

use jit_hir::{FieldRef, Function, InstrKind, Type, ValueId};

use crate::{Pass, PassError, Preconditions};

/// Resolves `LoadMethodSuper`/`LoadAttrSuper` whose class operand is a
/// `Type[C]` constant. Lookup starts at `C`'s base, as `super(C, self)`
/// does:
///
/// - a method defined by class `D` becomes `LoadConst<Func["D.name"]>`;
/// - for the attribute form, a slot becomes a `LoadField` on the receiver.
///
/// Static functions only.
pub struct SuperAccessResolution;

impl Pass for SuperAccessResolution {
    fn name(&self) -> &'static str {
        "SuperAccessResolution"
    }

    fn preconditions(&self) -> Preconditions {
        Preconditions::NO_REFCOUNTS
    }

    fn requires_static(&self) -> bool {
        true
    }

    fn run(&mut self, func: &mut Function) -> Result<(), PassError> {
        let mut resolved = 0usize;
        for b in 0..func.blocks.len() {
            for i in 0..func.blocks[b].body.len() {
                let Some((kind, dst, ty)) = resolve(func, &func.blocks[b].body[i].kind) else {
                    continue;
                };
                func.set_value_type(dst, ty);
                func.blocks[b].body[i].kind = kind;
                resolved += 1;
            }
        }
        tracing::debug!(function = %func.name, resolved, "super accesses resolved");
        Ok(())
    }
}

fn resolve(func: &Function, kind: &InstrKind) -> Option<(InstrKind, ValueId, Type)> {
    let (dst, class, receiver, attr, is_method) = match kind {
        InstrKind::LoadMethodSuper {
            dst,
            class,
            receiver,
            attr,
        } => (*dst, *class, *receiver, attr, true),
        InstrKind::LoadAttrSuper {
            dst,
            class,
            receiver,
            attr,
        } => (*dst, *class, *receiver, attr, false),
        _ => return None,
    };

    let start = func.value_type(class).class_constant()?;
    let base = func.class(start)?.base.as_deref()?;

    if let Some(owner) = func.resolve_method(base, &attr.name) {
        let ty = Type::func_const(format!("{}.{}", owner.name, attr.name));
        return Some((
            InstrKind::LoadConst {
                dst,
                ty: ty.clone(),
            },
            dst,
            ty,
        ));
    }
    if is_method {
        return None;
    }

    let slot = func.resolve_slot(base, &attr.name)?;
    Some((
        InstrKind::LoadField {
            dst,
            obj: receiver,
            field: FieldRef {
                offset: slot.offset,
                name: slot.name.clone(),
            },
            ty: slot.ty.clone(),
        },
        dst,
        slot.ty.clone(),
    ))
}

#[cfg(test)]
mod tests;
