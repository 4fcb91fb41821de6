//! CFG and instruction rewriting helpers shared by several passes.

use rustc_hash::{FxHashMap, FxHashSet};

use jit_hir::graph;
use jit_hir::{BlockId, Function, InstrKind, Terminator, ValueId};

/// Put a new block on every edge `P → S` where `P` has several distinct
/// successors, `S` starts with a phi, and `wanted(func, P, S)` holds.
///
/// Afterwards code placed at the end of a predecessor of a phi block runs
/// only on the edge into that block. Returns the number of blocks added.
pub(crate) fn split_critical_edges(
    func: &mut Function,
    wanted: impl Fn(&Function, BlockId, BlockId) -> bool,
) -> usize {
    let mut edges: Vec<(BlockId, BlockId)> = Vec::new();
    for pred in func.block_ids() {
        let succs = graph::successors(func, pred);
        if succs.len() < 2 {
            continue;
        }
        for succ in succs {
            if func.block(succ).phi_count() > 0 && wanted(func, pred, succ) {
                edges.push((pred, succ));
            }
        }
    }

    for &(pred, succ) in &edges {
        let split = func.push_block(Vec::new(), Terminator::Branch { target: succ });
        func.block_mut(pred).terminator.redirect(succ, split);
        relabel_phi_inputs(func, succ, pred, split);
        tracing::trace!(
            pred = func.block(pred).label,
            succ = func.block(succ).label,
            split = func.block(split).label,
            "split critical edge"
        );
    }
    edges.len()
}

/// Phi inputs of `block` that came from `from` now come from `to`.
pub(crate) fn relabel_phi_inputs(func: &mut Function, block: BlockId, from: BlockId, to: BlockId) {
    for instr in &mut func.block_mut(block).body {
        if let InstrKind::Phi { inputs, .. } = &mut instr.kind {
            for (pred, _) in inputs.iter_mut() {
                if *pred == from {
                    *pred = to;
                }
            }
        }
    }
}

/// Remove the phi inputs of `block` that flow in from `pred`, after the edge
/// `pred → block` has been deleted.
pub(crate) fn drop_phi_inputs(func: &mut Function, block: BlockId, pred: BlockId) {
    for instr in &mut func.block_mut(block).body {
        if let InstrKind::Phi { inputs, .. } = &mut instr.kind {
            inputs.retain(|(p, _)| *p != pred);
        }
    }
}

/// Delete every block the entry cannot reach. Returns how many were removed.
pub(crate) fn remove_unreachable_blocks(func: &mut Function) -> usize {
    let keep = graph::reachable(func);
    let removed = keep.iter().filter(|k| !**k).count();
    if removed > 0 {
        func.retain_blocks(&keep);
    }
    removed
}

/// Mark-and-sweep removal of instructions whose results are never needed.
///
/// Roots are terminator operands, unwind annotations, and the operands of
/// every instruction with side effects or without an output. Anything not
/// reachable from a root through operand edges is deleted, which also
/// removes dead phi cycles. Works on non-SSA functions: a value with several
/// definitions keeps all of them alive together.
pub(crate) fn sweep_dead(func: &mut Function) -> usize {
    let mut defs: FxHashMap<ValueId, Vec<(usize, usize)>> = FxHashMap::default();
    let mut worklist: Vec<ValueId> = Vec::new();

    for (b, block) in func.blocks.iter().enumerate() {
        for (i, instr) in block.body.iter().enumerate() {
            match instr.kind.dst() {
                Some(dst) if !instr.kind.effects().has_side_effects() => {
                    defs.entry(dst).or_default().push((b, i));
                }
                _ => worklist.extend(instr.kind.operands()),
            }
            worklist.extend(instr.unwind.iter().copied());
        }
        worklist.extend(block.terminator.operand());
    }

    let mut live: FxHashSet<ValueId> = FxHashSet::default();
    while let Some(value) = worklist.pop() {
        if !live.insert(value) {
            continue;
        }
        for &(b, i) in defs.get(&value).into_iter().flatten() {
            worklist.extend(func.blocks[b].body[i].kind.operands());
        }
    }

    let mut removed = 0;
    for block in &mut func.blocks {
        let before = block.body.len();
        block.body.retain(|instr| match instr.kind.dst() {
            Some(dst) => instr.kind.effects().has_side_effects() || live.contains(&dst),
            None => true,
        });
        removed += before - block.body.len();
    }
    if removed > 0 {
        tracing::trace!(function = %func.name, removed, "swept dead instructions");
    }
    removed
}

/// Number of places `value` is read, phi inputs and terminators included.
pub(crate) fn count_uses(func: &Function, value: ValueId) -> usize {
    func.blocks
        .iter()
        .map(|block| {
            let in_body: usize = block
                .body
                .iter()
                .map(|instr| {
                    instr.kind.operands().iter().filter(|v| **v == value).count()
                        + instr.unwind.iter().filter(|v| **v == value).count()
                })
                .sum();
            in_body + usize::from(block.terminator.operand() == Some(value))
        })
        .sum()
}
