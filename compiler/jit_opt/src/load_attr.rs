//! Attribute access on statically laid out objects.

use jit_hir::{FieldRef, Function, InstrKind, Type};

use crate::{Pass, PassError, Preconditions};

/// Replaces `LoadAttr`/`StoreAttr` on a `User[C]` receiver with direct slot
/// access when `C` (or one of its bases) declares the attribute as a slot.
///
/// Static functions only. The field read is borrowed from the object rather
/// than a new reference, so this must run before refcount insertion.
pub struct LoadAttrSpecialization;

impl Pass for LoadAttrSpecialization {
    fn name(&self) -> &'static str {
        "LoadAttrSpecialization"
    }

    fn preconditions(&self) -> Preconditions {
        Preconditions::NO_REFCOUNTS
    }

    fn requires_static(&self) -> bool {
        true
    }

    fn run(&mut self, func: &mut Function) -> Result<(), PassError> {
        let mut rewritten = 0usize;
        for b in 0..func.blocks.len() {
            for i in 0..func.blocks[b].body.len() {
                let Some((kind, ty)) = specialize(func, &func.blocks[b].body[i].kind) else {
                    continue;
                };
                if let (Some(dst), Some(ty)) = (kind.dst(), ty) {
                    func.set_value_type(dst, ty);
                }
                func.blocks[b].body[i].kind = kind;
                rewritten += 1;
            }
        }
        tracing::debug!(function = %func.name, rewritten, "attribute accesses specialized");
        Ok(())
    }
}

/// The slot-access form of `kind`, with the loaded value's type for loads.
fn specialize(func: &Function, kind: &InstrKind) -> Option<(InstrKind, Option<Type>)> {
    let (obj, attr) = match kind {
        InstrKind::LoadAttr { obj, attr, .. } | InstrKind::StoreAttr { obj, attr, .. } => {
            (*obj, attr)
        }
        _ => return None,
    };
    let class = func.value_type(obj).user_class()?;
    let slot = func.resolve_slot(class, &attr.name)?;
    let field = FieldRef {
        offset: slot.offset,
        name: slot.name.clone(),
    };

    Some(match kind {
        InstrKind::LoadAttr { dst, .. } => (
            InstrKind::LoadField {
                dst: *dst,
                obj,
                field,
                ty: slot.ty.clone(),
            },
            Some(slot.ty.clone()),
        ),
        InstrKind::StoreAttr { value, .. } => (
            InstrKind::StoreField {
                obj,
                value: *value,
                field,
            },
            None,
        ),
        _ => return None,
    })
}
