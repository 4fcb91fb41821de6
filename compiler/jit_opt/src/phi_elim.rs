//! Phi elimination: lowers SSA phis to copies in the predecessors.
//!
//! For each phi block every incoming edge gets a parallel copy
//! `(phi_1, ..., phi_n) := (in_1, ..., in_n)` at the end of its predecessor.
//! Parallel copies are sequentialized so that no copy reads a value an
//! earlier copy already overwrote; cycles (`a := b, b := a`) are broken with
//! a fresh temporary. Critical edges into phi blocks are split first so the
//! copies only run on their own edge.
//!
//! The result is no longer in SSA form and the function is marked `nonssa`.

use jit_hir::graph;
use jit_hir::{Block, BlockId, Function, Instr, InstrKind, ValueId};

use crate::rewrite::split_critical_edges;
use crate::{Pass, PassError, Preconditions};

/// Replaces phis with `Assign` copies.
pub struct PhiElimination;

const NAME: &str = "PhiElimination";

impl Pass for PhiElimination {
    fn name(&self) -> &'static str {
        NAME
    }

    fn preconditions(&self) -> Preconditions {
        Preconditions::SSA
    }

    fn run(&mut self, func: &mut Function) -> Result<(), PassError> {
        let split = split_critical_edges(func, |_, _, _| true);

        let predecessors = graph::predecessors(func);
        let mut copies: Vec<(BlockId, Vec<(ValueId, ValueId)>)> = Vec::new();
        for (id, preds) in func.block_ids().zip(&predecessors) {
            let block = func.block(id);
            if block.phi_count() == 0 {
                continue;
            }
            for &pred in preds {
                copies.push((pred, edge_copies(block, pred)?));
            }
        }

        for (pred, moves) in copies {
            let sequence = sequentialize(func, moves);
            func.block_mut(pred).body.extend(sequence);
        }
        for block in &mut func.blocks {
            block.body.retain(|instr| !instr.kind.is_phi());
        }
        func.ssa = false;

        tracing::debug!(function = %func.name, split_edges = split, "phis eliminated");
        Ok(())
    }
}

/// The `(dst, src)` pairs that the edge `pred → block` must perform.
fn edge_copies(block: &Block, pred: BlockId) -> Result<Vec<(ValueId, ValueId)>, PassError> {
    let mut moves = Vec::new();
    for instr in &block.body[..block.phi_count()] {
        let InstrKind::Phi { dst, inputs } = &instr.kind else {
            continue;
        };
        let Some(&(_, src)) = inputs.iter().find(|(p, _)| *p == pred) else {
            return Err(PassError::internal(
                NAME,
                format!("phi {dst} in bb {} has no input for a predecessor", block.label),
            ));
        };
        moves.push((*dst, src));
    }
    Ok(moves)
}

/// Order a parallel copy as a sequence of `Assign`s.
///
/// A copy may be emitted once no other pending copy still reads its
/// destination. When every pending copy is blocked the remaining copies
/// form cycles; one source is saved to a temporary to break it.
fn sequentialize(func: &mut Function, mut pending: Vec<(ValueId, ValueId)>) -> Vec<Instr> {
    pending.retain(|(dst, src)| dst != src);
    let mut out = Vec::with_capacity(pending.len());

    while !pending.is_empty() {
        let ready = pending
            .iter()
            .position(|(dst, _)| !pending.iter().any(|(_, src)| src == dst));
        if let Some(i) = ready {
            let (dst, src) = pending.remove(i);
            out.push(assign(dst, src));
            continue;
        }

        // Every destination is still read by some copy: save the first one.
        let (blocked, _) = pending[0];
        let temp = func.fresh_value(func.value_type(blocked).clone());
        out.push(assign(temp, blocked));
        for (_, src) in &mut pending {
            if *src == blocked {
                *src = temp;
            }
        }
    }
    out
}

fn assign(dst: ValueId, src: ValueId) -> Instr {
    Instr::new(InstrKind::Assign { dst, src })
}
