//! Reference-count insertion.
//!
//! Places `Incref` and `Decref` so that every owned reference is released
//! exactly once on every path, and annotates each instruction that may raise
//! with the owned values that must be released if it does.
//!
//! # Ownership classes
//!
//! Every value gets an [`RcClass`] from its type and the ownership of the
//! instruction that defines it:
//!
//! - **Scalar**: unboxed primitives. Never counted.
//! - **Stable**: arguments, constants, and aliases of those. The caller keeps
//!   them alive for the whole call, so they are never released. Handing one
//!   to a consumer (a stealing operand, a phi, `Return`) costs an `Incref`.
//! - **Owned**: a new reference (call results, phis, ...). Released at its
//!   last use.
//! - **Borrowed**: a reference that is only valid while another value is
//!   held (`LoadField`) or an alias of a counted value. It takes its own
//!   reference with an `Incref` right after the definition and is then
//!   treated like an owned value. A dead borrowed value gets neither.
//!
//! # Algorithm
//!
//! 1. Split every critical edge into a block whose phis receive a heap
//!    value, so per-edge code has a block of its own.
//! 2. Compute liveness of the counted (owned and borrowed) values.
//! 3. Walk each block **backward** with a running `live` set initialized
//!    from the live-in sets of its successors:
//!    - outgoing phi inputs and the returned value are steals;
//!    - a stealing operand takes the held reference when this is its last
//!      use, otherwise it gets an `Incref` first;
//!    - a borrowing operand whose last use is here gets a `Decref` right
//!      after the instruction;
//!    - a definition not in `live` is dead and, when owned, is released
//!      right after it;
//!    - an instruction that may raise records the sorted `live` set (what is
//!      held across it) as its unwind list.
//! 4. **Edge cleanup**: a value held at the end of a predecessor but not live
//!    into the successor is released on that edge. With one predecessor, or
//!    when all predecessors agree, the `Decref`s go at the top of the
//!    successor; otherwise each differing edge gets a trampoline block.
//!
//! Tracked values never include stable ones, so a function whose heap values
//! are all arguments or constants gains only the `Incref`s that hand them
//! out.

use smallvec::SmallVec;

use jit_hir::graph;
use jit_hir::{BlockId, Effects, Function, Instr, InstrKind, OutputOwnership, Terminator, Use, ValueId};

use crate::liveness::{compute_liveness, phi_inputs_from, BlockLiveness, LiveSet};
use crate::rewrite::{relabel_phi_inputs, split_critical_edges};
use crate::{Pass, PassError, Preconditions};

/// Inserts `Incref`/`Decref` and unwind annotations.
pub struct RefcountInsertion;

impl Pass for RefcountInsertion {
    fn name(&self) -> &'static str {
        "RefcountInsertion"
    }

    fn preconditions(&self) -> Preconditions {
        Preconditions::SSA | Preconditions::NO_REFCOUNTS
    }

    fn run(&mut self, func: &mut Function) -> Result<(), PassError> {
        insert_refcounts(func);
        Ok(())
    }
}

/// How a value participates in reference counting.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum RcClass {
    Scalar,
    Stable,
    Owned,
    Borrowed,
}

impl RcClass {
    #[inline]
    fn is_tracked(self) -> bool {
        matches!(self, RcClass::Owned | RcClass::Borrowed)
    }
}

/// Shared, read-only state for the per-block walk.
struct RcContext<'a> {
    func: &'a Function,
    classes: &'a [RcClass],
    liveness: &'a BlockLiveness,
}

impl RcContext<'_> {
    #[inline]
    fn class(&self, value: ValueId) -> RcClass {
        self.classes
            .get(value.index())
            .copied()
            .unwrap_or(RcClass::Scalar)
    }

    #[inline]
    fn is_tracked(&self, value: ValueId) -> bool {
        self.class(value).is_tracked()
    }

    /// Hand one reference to `value` to a consumer.
    fn steal(&self, value: ValueId, live: &mut LiveSet, out: &mut SmallVec<[Instr; 4]>) {
        match self.class(value) {
            RcClass::Scalar => {}
            RcClass::Stable => out.push(incref(value)),
            RcClass::Owned | RcClass::Borrowed => {
                if !live.insert(value) {
                    out.push(incref(value));
                }
            }
        }
    }
}

fn incref(value: ValueId) -> Instr {
    Instr::new(InstrKind::Incref { value })
}

fn decref(value: ValueId) -> Instr {
    Instr::new(InstrKind::Decref { value })
}

fn sorted(set: &LiveSet) -> SmallVec<[ValueId; 4]> {
    let mut out: SmallVec<[ValueId; 4]> = set.iter().copied().collect();
    out.sort_unstable();
    out
}

/// Insert refcount operations into `func`, which must be in SSA form and
/// free of refcount operations.
pub(crate) fn insert_refcounts(func: &mut Function) {
    debug_assert!(
        !func.has_refcounts(),
        "insert_refcounts: function already contains refcount operations"
    );
    tracing::debug!(function = %func.name, "inserting refcount operations");

    let split = split_critical_edges(func, |func, pred, succ| {
        phi_inputs_from(func.block(succ), pred).any(|v| func.value_type(v).is_heap())
    });

    let classes = classify(func);
    let tracked = |value: ValueId| {
        classes
            .get(value.index())
            .is_some_and(|class| class.is_tracked())
    };
    let liveness = compute_liveness(func, &tracked);

    let ctx = RcContext {
        func,
        classes: &classes,
        liveness: &liveness,
    };
    let (bodies, exits): (Vec<Vec<Instr>>, Vec<LiveSet>) =
        func.block_ids().map(|id| process_block_rc(&ctx, id)).unzip();

    for (block, body) in func.blocks.iter_mut().zip(bodies) {
        block.body = body;
    }
    insert_edge_cleanup(func, &liveness, &exits);

    tracing::debug!(function = %func.name, split_edges = split, "refcount insertion done");
}

/// Classify every value by its type and defining instruction.
///
/// Aliases look at their source, so definitions are visited in reverse
/// postorder; blocks the entry cannot reach come last.
fn classify(func: &Function) -> Vec<RcClass> {
    let mut classes: Vec<Option<RcClass>> = vec![None; func.value_types.len()];

    let mut order = graph::reverse_postorder(func);
    let reachable = graph::reachable(func);
    order.extend(func.block_ids().filter(|b| !reachable[b.index()]));

    for id in order {
        for instr in &func.block(id).body {
            let Some(dst) = instr.kind.dst() else {
                continue;
            };
            if classes.len() <= dst.index() {
                classes.resize(dst.index() + 1, None);
            }
            let class = if !func.value_type(dst).is_heap() {
                RcClass::Scalar
            } else {
                match instr.kind.output_ownership() {
                    OutputOwnership::StableBorrow => RcClass::Stable,
                    OutputOwnership::Owned | OutputOwnership::None => RcClass::Owned,
                    OutputOwnership::BorrowedFromInput => RcClass::Borrowed,
                    OutputOwnership::AliasOfInput => {
                        let source = instr.kind.operands().first().copied();
                        match source.and_then(|s| classes.get(s.index()).copied().flatten()) {
                            Some(RcClass::Stable) => RcClass::Stable,
                            _ => RcClass::Borrowed,
                        }
                    }
                }
            };
            classes[dst.index()] = Some(class);
        }
    }

    classes
        .into_iter()
        .map(|c| c.unwrap_or(RcClass::Scalar))
        .collect()
}

/// Rewrite one block's body. Returns the new body and the set of values
/// held when control leaves the block.
fn process_block_rc(ctx: &RcContext<'_>, id: BlockId) -> (Vec<Instr>, LiveSet) {
    let func = ctx.func;
    let block = func.block(id);
    let succs = graph::successors(func, id);

    let mut live = LiveSet::default();
    for succ in &succs {
        live.extend(ctx.liveness.live_in[succ.index()].iter().copied());
    }
    let mut exit = live.clone();

    // Built back to front and flipped at the end.
    let mut rev: Vec<Instr> = Vec::with_capacity(block.body.len() + 4);

    // Step 1: terminator and outgoing phi inputs.
    let mut tail: SmallVec<[Instr; 4]> = SmallVec::new();
    for succ in &succs {
        for value in phi_inputs_from(func.block(*succ), id) {
            ctx.steal(value, &mut live, &mut tail);
        }
    }
    match &block.terminator {
        Terminator::Return { value } => ctx.steal(*value, &mut live, &mut tail),
        Terminator::CondBranch { cond, .. } if ctx.is_tracked(*cond) => {
            live.insert(*cond);
            exit.insert(*cond);
        }
        _ => {}
    }
    rev.extend(tail.into_iter().rev());

    // Step 2: ordinary instructions, last to first.
    let phis = block.phi_count();
    for instr in block.body[phis..].iter().rev() {
        let mut before: SmallVec<[Instr; 4]> = SmallVec::new();
        let mut after: SmallVec<[Instr; 4]> = SmallVec::new();

        if let Some(dst) = instr.kind.dst() {
            let class = ctx.class(dst);
            if class.is_tracked() {
                match (live.remove(&dst), class) {
                    (true, RcClass::Borrowed) => after.push(incref(dst)),
                    (false, RcClass::Owned) => after.push(decref(dst)),
                    _ => {}
                }
            }
        }

        let uses = instr.kind.operand_uses();
        for &(value, _) in uses.iter().filter(|(_, u)| *u == Use::Steal) {
            ctx.steal(value, &mut live, &mut before);
        }
        for &(value, _) in uses.iter().filter(|(_, u)| *u == Use::Borrow) {
            if ctx.is_tracked(value) && live.insert(value) {
                after.push(decref(value));
            }
        }

        let mut instr = instr.clone();
        if instr.kind.effects().contains(Effects::MAY_RAISE) {
            instr.unwind = sorted(&live);
        }

        rev.extend(after.into_iter().rev());
        rev.push(instr);
        rev.extend(before.into_iter().rev());
    }

    // Step 3: phis. A dead phi is released right after the phi prefix.
    for instr in block.body[..phis].iter().rev() {
        if let Some(dst) = instr.kind.dst() {
            if ctx.is_tracked(dst) && !live.remove(&dst) {
                rev.push(decref(dst));
            }
        }
    }
    rev.extend(block.body[..phis].iter().rev().cloned());
    rev.reverse();

    debug_assert!(
        live == ctx.liveness.live_in[id.index()],
        "walk of bb {} disagrees with liveness",
        block.label
    );

    (rev, exit)
}

/// Release values that are held at the end of a predecessor but not live
/// into its successor.
fn insert_edge_cleanup(func: &mut Function, liveness: &BlockLiveness, exits: &[LiveSet]) {
    let predecessors = graph::predecessors(func);

    let mut block_decs: Vec<(BlockId, Vec<ValueId>)> = Vec::new();
    let mut edge_splits: Vec<(BlockId, BlockId, Vec<ValueId>)> = Vec::new();

    for (succ, preds) in func.block_ids().zip(&predecessors) {
        if preds.is_empty() {
            continue;
        }
        let live_in = &liveness.live_in[succ.index()];

        let gaps: Vec<(BlockId, Vec<ValueId>)> = preds
            .iter()
            .map(|&pred| {
                let mut gap: Vec<ValueId> = exits[pred.index()]
                    .iter()
                    .copied()
                    .filter(|v| !live_in.contains(v))
                    .collect();
                gap.sort_unstable();
                (pred, gap)
            })
            .collect();

        if gaps.iter().all(|(_, gap)| gap.is_empty()) {
            continue;
        }

        if gaps.windows(2).all(|w| w[0].1 == w[1].1) {
            block_decs.push((succ, gaps[0].1.clone()));
        } else {
            for (pred, gap) in gaps {
                if !gap.is_empty() {
                    edge_splits.push((pred, succ, gap));
                }
            }
        }
    }

    for (block, values) in &block_decs {
        let block = func.block_mut(*block);
        let at = block.phi_count();
        block
            .body
            .splice(at..at, values.iter().map(|v| decref(*v)));
    }

    for (pred, succ, values) in &edge_splits {
        let body = values.iter().map(|v| decref(*v)).collect();
        let trampoline = func.push_block(body, Terminator::Branch { target: *succ });
        func.block_mut(*pred).terminator.redirect(*succ, trampoline);
        relabel_phi_inputs(func, *succ, *pred, trampoline);
    }

    if !block_decs.is_empty() || !edge_splits.is_empty() {
        tracing::debug!(
            block_decs = block_decs.len(),
            edge_splits = edge_splits.len(),
            "edge cleanup applied"
        );
    }
}
