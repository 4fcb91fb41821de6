//! Dead code elimination.

use jit_hir::Function;

use crate::rewrite::{remove_unreachable_blocks, sweep_dead};
use crate::{Pass, PassError};

/// Removes unreachable blocks and instructions whose results are never used
/// and that have no side effects.
///
/// Phi arity is preserved: dropping a block also drops the phi inputs that
/// flowed in from it.
pub struct DeadCodeElimination;

impl Pass for DeadCodeElimination {
    fn name(&self) -> &'static str {
        "DeadCodeElimination"
    }

    fn run(&mut self, func: &mut Function) -> Result<(), PassError> {
        let blocks = remove_unreachable_blocks(func);
        let instrs = sweep_dead(func);
        tracing::debug!(function = %func.name, blocks, instrs, "dead code removed");
        Ok(())
    }
}
