//! CFG analysis utilities shared by the verifier and the passes.
//!
//! Nothing here is cached on the [`Function`]: passes rewrite terminators
//! freely and recompute whatever they need next.

use rustc_hash::FxHashSet;

use crate::ir::{BlockId, Function};

/// Distinct predecessors of each block, ascending by block index.
pub fn predecessors(func: &Function) -> Vec<Vec<BlockId>> {
    let num_blocks = func.blocks.len();
    let mut preds: Vec<Vec<BlockId>> = vec![Vec::new(); num_blocks];

    for (pred, block) in func.block_ids().zip(&func.blocks) {
        let mut seen = FxHashSet::default();
        for succ in block.terminator.successors() {
            if succ.index() < num_blocks && seen.insert(succ) {
                preds[succ.index()].push(pred);
            }
        }
    }

    preds
}

/// Distinct successors of `block`, in terminator order.
pub fn successors(func: &Function, block: BlockId) -> Vec<BlockId> {
    let mut out = Vec::with_capacity(2);
    for succ in func.block(block).terminator.successors() {
        if !out.contains(&succ) {
            out.push(succ);
        }
    }
    out
}

/// Postorder over the blocks reachable from the entry.
///
/// Iterative DFS so deep CFGs cannot overflow the stack.
pub fn postorder(func: &Function) -> Vec<BlockId> {
    let num_blocks = func.blocks.len();
    let mut visited = vec![false; num_blocks];
    let mut order = Vec::with_capacity(num_blocks);
    if num_blocks == 0 {
        return order;
    }

    // (block, children pushed)
    let mut stack: Vec<(BlockId, bool)> = vec![(func.entry, false)];

    while let Some(&mut (block, ref mut children_done)) = stack.last_mut() {
        if *children_done {
            order.push(block);
            stack.pop();
            continue;
        }
        *children_done = true;

        if block.index() >= num_blocks || visited[block.index()] {
            stack.pop();
            continue;
        }
        visited[block.index()] = true;

        // The last pushed successor finishes first, so the first successor
        // ends up first in reverse postorder.
        for succ in func.block(block).terminator.successors() {
            if succ.index() < num_blocks && !visited[succ.index()] {
                stack.push((succ, false));
            }
        }
    }

    order
}

pub fn reverse_postorder(func: &Function) -> Vec<BlockId> {
    let mut rpo = postorder(func);
    rpo.reverse();
    rpo
}

/// `reachable[i]` is true when block `i` can be reached from the entry.
pub fn reachable(func: &Function) -> Vec<bool> {
    let mut reachable = vec![false; func.blocks.len()];
    for block in postorder(func) {
        reachable[block.index()] = true;
    }
    reachable
}

/// Dominator tree, built with the Cooper-Harvey-Kennedy iterative
/// algorithm over reverse postorder.
///
/// Reference: Cooper, Harvey, Kennedy, "A Simple, Fast Dominance Algorithm" (2001)
pub struct DominatorTree {
    /// `idom[entry] == Some(entry)`; unreachable blocks have `None`.
    idom: Vec<Option<usize>>,
}

impl DominatorTree {
    pub fn build(func: &Function) -> Self {
        let n = func.blocks.len();
        if n == 0 {
            return Self { idom: vec![] };
        }

        let preds = predecessors(func);
        let rpo = reverse_postorder(func);

        let mut rpo_pos = vec![usize::MAX; n];
        for (pos, block) in rpo.iter().enumerate() {
            rpo_pos[block.index()] = pos;
        }

        let entry = func.entry.index();
        let mut idom: Vec<Option<usize>> = vec![None; n];
        idom[entry] = Some(entry);

        let mut changed = true;
        while changed {
            changed = false;
            for block in rpo.iter().skip(1) {
                let b = block.index();
                let mut processed = preds[b]
                    .iter()
                    .map(|p| p.index())
                    .filter(|&p| idom[p].is_some());
                let Some(first) = processed.next() else {
                    continue;
                };
                let new_idom =
                    processed.fold(first, |acc, p| Self::intersect(p, acc, &idom, &rpo_pos));

                if idom[b] != Some(new_idom) {
                    idom[b] = Some(new_idom);
                    changed = true;
                }
            }
        }

        Self { idom }
    }

    /// Does `a` dominate `b`? Every block dominates itself.
    pub fn dominates(&self, a: BlockId, b: BlockId) -> bool {
        let target = a.index();
        let mut current = b.index();
        loop {
            if current == target {
                return true;
            }
            match self.idom.get(current).copied().flatten() {
                Some(dom) if dom != current => current = dom,
                _ => return false,
            }
        }
    }

    /// Immediate dominator of `block`; `None` for the entry and for
    /// unreachable blocks.
    pub fn idom(&self, block: BlockId) -> Option<BlockId> {
        match self.idom.get(block.index()).copied().flatten() {
            Some(dom) if dom != block.index() => {
                Some(BlockId::new(u32::try_from(dom).unwrap_or(u32::MAX)))
            }
            _ => None,
        }
    }

    /// Walk two fingers up the tree until they meet.
    fn intersect(mut a: usize, mut b: usize, idom: &[Option<usize>], rpo_pos: &[usize]) -> usize {
        while a != b {
            while rpo_pos[a] > rpo_pos[b] {
                let Some(next) = idom[a] else {
                    debug_assert!(false, "intersect: broken idom chain at {a}");
                    return a;
                };
                a = next;
            }
            while rpo_pos[b] > rpo_pos[a] {
                let Some(next) = idom[b] else {
                    debug_assert!(false, "intersect: broken idom chain at {b}");
                    return b;
                };
                b = next;
            }
        }
        a
    }
}

#[cfg(test)]
mod tests;
