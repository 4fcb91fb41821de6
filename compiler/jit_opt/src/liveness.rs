//! Backward dataflow liveness over HIR blocks.
//!
//! Computes which values are **live** (will be read later) at every block
//! boundary. Refcount insertion uses it to find last uses: a value's
//! `Decref` goes where it stops being live.
//!
//! # Algorithm
//!
//! Standard backward dataflow with fixed-point iteration:
//!
//! 1. **Precompute gen/kill** for each block (forward scan).
//!    - `gen(B)` = values used in B before being defined there.
//!    - `kill(B)` = values defined in B, phis included.
//! 2. **Postorder iteration**:
//!    - `live_out(B) = ∪ live_in(S) ∪ phi_inputs(B → S)` for each successor S.
//!    - `live_in(B) = gen(B) ∪ (live_out(B) - kill(B))`.
//! 3. Repeat until no set changes.
//!
//! Phi inputs are uses at the end of the predecessor they flow in from, not
//! uses in the phi's block. A value consumed by a phi is therefore live out
//! of its predecessor but not live into the phi's block.
//!
//! Only values accepted by the `tracked` predicate take part; everything
//! else is invisible to the analysis.

use rustc_hash::FxHashSet;

use jit_hir::graph;
use jit_hir::{Block, BlockId, Function, InstrKind, ValueId};

/// Set of live values at a program point.
pub type LiveSet = FxHashSet<ValueId>;

/// Liveness at every block boundary, indexed by `BlockId::index()`.
pub struct BlockLiveness {
    pub live_in: Vec<LiveSet>,
    pub live_out: Vec<LiveSet>,
}

/// Compute liveness for every block of `func`, considering only values for
/// which `tracked` returns true.
pub fn compute_liveness(func: &Function, tracked: &dyn Fn(ValueId) -> bool) -> BlockLiveness {
    let num_blocks = func.blocks.len();
    tracing::debug!(function = %func.name, num_blocks, "computing liveness");

    let mut gen: Vec<LiveSet> = Vec::with_capacity(num_blocks);
    let mut kill: Vec<LiveSet> = Vec::with_capacity(num_blocks);
    let mut edge_uses: Vec<LiveSet> = Vec::with_capacity(num_blocks);
    for id in func.block_ids() {
        let (block_gen, block_kill, block_edge) = compute_gen_kill(func, id, tracked);
        gen.push(block_gen);
        kill.push(block_kill);
        edge_uses.push(block_edge);
    }

    // Unreachable blocks still get sets; they are visited after the rest.
    let mut order = graph::postorder(func);
    let mut seen = vec![false; num_blocks];
    for b in &order {
        seen[b.index()] = true;
    }
    order.extend(func.block_ids().filter(|b| !seen[b.index()]));

    let mut live_in: Vec<LiveSet> = (0..num_blocks).map(|_| LiveSet::default()).collect();
    let mut live_out: Vec<LiveSet> = (0..num_blocks).map(|_| LiveSet::default()).collect();

    let mut iteration = 0u32;
    loop {
        iteration += 1;
        let mut changed = false;

        for &block in &order {
            let idx = block.index();
            let mut new_live_out = edge_uses[idx].clone();
            for succ in graph::successors(func, block) {
                new_live_out.extend(live_in[succ.index()].iter().copied());
            }

            let mut new_live_in = gen[idx].clone();
            new_live_in.extend(new_live_out.iter().filter(|v| !kill[idx].contains(v)));

            if new_live_in != live_in[idx] || new_live_out != live_out[idx] {
                changed = true;
                live_in[idx] = new_live_in;
                live_out[idx] = new_live_out;
            }
        }

        if !changed {
            break;
        }
    }

    tracing::debug!(iterations = iteration, "liveness converged");

    BlockLiveness { live_in, live_out }
}

/// Gen, kill and outgoing phi-input sets for one block.
fn compute_gen_kill(
    func: &Function,
    id: BlockId,
    tracked: &dyn Fn(ValueId) -> bool,
) -> (LiveSet, LiveSet, LiveSet) {
    let block: &Block = func.block(id);
    let mut gen = LiveSet::default();
    let mut kill = LiveSet::default();

    for instr in &block.body {
        let uses = instr
            .kind
            .operand_uses()
            .into_iter()
            .map(|(v, _)| v)
            .chain(instr.unwind.iter().copied());
        for value in uses {
            if tracked(value) && !kill.contains(&value) {
                gen.insert(value);
            }
        }
        if let Some(dst) = instr.kind.dst() {
            if tracked(dst) {
                kill.insert(dst);
            }
        }
    }

    if let Some(value) = block.terminator.operand() {
        if tracked(value) && !kill.contains(&value) {
            gen.insert(value);
        }
    }

    let mut edge = LiveSet::default();
    for succ in graph::successors(func, id) {
        for value in phi_inputs_from(func.block(succ), id) {
            if tracked(value) {
                edge.insert(value);
                if !kill.contains(&value) {
                    gen.insert(value);
                }
            }
        }
    }

    (gen, kill, edge)
}

/// Values that `block`'s phis receive along the edge from `pred`.
pub(crate) fn phi_inputs_from(block: &Block, pred: BlockId) -> impl Iterator<Item = ValueId> + '_ {
    block.body.iter().filter_map(move |instr| match &instr.kind {
        InstrKind::Phi { inputs, .. } => inputs
            .iter()
            .find(|(p, _)| *p == pred)
            .map(|(_, v)| *v),
        _ => None,
    })
}
