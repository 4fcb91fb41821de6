//! SSA well-formedness checks.
//!
//! [`verify`] is the precondition every SSA pass relies on: each value is
//! defined once, every use is dominated by its definition, phis sit at the
//! head of their block with exactly one input per predecessor, and every
//! branch target exists. Uses inside unreachable blocks are not checked;
//! nothing can observe them.

use rustc_hash::FxHashMap;

use crate::error::SsaError;
use crate::graph::{self, DominatorTree};
use crate::ir::{BlockId, Function, InstrKind, ValueId};

/// Where a value is defined: block and body position.
#[derive(Clone, Copy)]
struct DefSite {
    block: BlockId,
    index: usize,
}

/// Check that `func` is a well-formed SSA CFG.
pub fn verify(func: &Function) -> Result<(), SsaError> {
    check_targets(func)?;
    if !func.ssa {
        return Err(SsaError::NotSsa);
    }

    let defs = collect_definitions(func)?;
    check_phis(func)?;

    let dom = DominatorTree::build(func);
    let reachable = graph::reachable(func);
    let check_use = |block: BlockId, index: usize, value: ValueId| -> Result<(), SsaError> {
        let label = func.block(block).label;
        let Some(site) = defs.get(&value) else {
            return Err(SsaError::UndefinedUse {
                block: label,
                value,
            });
        };
        let dominated = if site.block == block {
            site.index < index
        } else {
            dom.dominates(site.block, block)
        };
        if dominated {
            Ok(())
        } else {
            Err(SsaError::NotDominated {
                block: label,
                value,
            })
        }
    };

    for (id, block) in func.block_ids().zip(&func.blocks) {
        if !reachable[id.index()] {
            continue;
        }
        for (index, instr) in block.body.iter().enumerate() {
            if let InstrKind::Phi { inputs, .. } = &instr.kind {
                // A phi input is used at the end of its predecessor.
                for &(pred, value) in inputs {
                    if reachable[pred.index()] {
                        check_use(pred, usize::MAX, value)?;
                    }
                }
                continue;
            }
            for value in instr.kind.operands() {
                check_use(id, index, value)?;
            }
            for &value in &instr.unwind {
                check_use(id, index, value)?;
            }
        }
        if let Some(value) = block.terminator.operand() {
            check_use(id, block.body.len(), value)?;
        }
    }

    Ok(())
}

fn check_targets(func: &Function) -> Result<(), SsaError> {
    for block in &func.blocks {
        if block
            .terminator
            .successors()
            .iter()
            .any(|s| s.index() >= func.blocks.len())
        {
            return Err(SsaError::DanglingTarget { block: block.label });
        }
    }
    Ok(())
}

fn collect_definitions(func: &Function) -> Result<FxHashMap<ValueId, DefSite>, SsaError> {
    let mut defs = FxHashMap::default();
    for (id, block) in func.block_ids().zip(&func.blocks) {
        for (index, instr) in block.body.iter().enumerate() {
            if let Some(dst) = instr.kind.dst() {
                if defs.insert(dst, DefSite { block: id, index }).is_some() {
                    return Err(SsaError::Redefinition { value: dst });
                }
            }
        }
    }
    Ok(defs)
}

fn check_phis(func: &Function) -> Result<(), SsaError> {
    let preds = graph::predecessors(func);
    for (id, block) in func.block_ids().zip(&func.blocks) {
        let phi_count = block.phi_count();
        for instr in &block.body[phi_count..] {
            if let InstrKind::Phi { dst, .. } = instr.kind {
                return Err(SsaError::PhiNotAtHead {
                    block: block.label,
                    value: dst,
                });
            }
        }
        let block_preds = &preds[id.index()];
        for instr in &block.body[..phi_count] {
            let InstrKind::Phi { dst, inputs } = &instr.kind else {
                continue;
            };
            if inputs.len() != block_preds.len() {
                return Err(SsaError::PhiArity {
                    block: block.label,
                    value: *dst,
                    inputs: inputs.len(),
                    preds: block_preds.len(),
                });
            }
            for (i, (input_block, _)) in inputs.iter().enumerate() {
                let duplicate = inputs[..i].iter().any(|(b, _)| b == input_block);
                if duplicate || !block_preds.contains(input_block) {
                    return Err(SsaError::PhiInputNotPredecessor {
                        block: block.label,
                        value: *dst,
                        input_block: func
                            .blocks
                            .get(input_block.index())
                            .map_or(input_block.raw(), |b| b.label),
                    });
                }
            }
        }
    }
    Ok(())
}
