//! Optimization passes over the JIT's HIR.
//!
//! This crate provides:
//!
//! - **The pass contract** ([`Pass`], [`Preconditions`], [`run_pass`]): every
//!   transformation is a named pass that mutates one [`Function`] in place.
//!   [`run_pass`] enforces the declared preconditions, skips static-only
//!   passes on dynamically typed functions, and restores the input when a
//!   pass fails so callers never observe a half-rewritten function.
//!
//! - **The registry** ([`PassRegistry`], [`Pipeline`]): maps the pass names
//!   used by test fixtures to pass constructors.
//!
//! - **The passes**: [`RefcountInsertion`], [`Simplify`],
//!   [`DeadCodeElimination`], [`PhiElimination`],
//!   [`DynamicComparisonElimination`], [`LoadAttrSpecialization`],
//!   [`CallOptimization`] and [`SuperAccessResolution`].
//!
//! # Pipeline contract
//!
//! Passes run strictly in the order given. Refcount insertion is meant to run
//! last among the SSA passes: it declares that no refcount operations may be
//! present yet, so running it twice is a precondition failure rather than a
//! silent double count.

mod call_opt;
mod dce;
mod dyn_compare;
mod error;
pub mod liveness;
mod load_attr;
mod phi_elim;
mod refcount;
mod registry;
mod rewrite;
mod simplify;
mod super_access;

#[cfg(test)]
mod test_helpers;

use jit_hir::Function;

pub use call_opt::CallOptimization;
pub use dce::DeadCodeElimination;
pub use dyn_compare::DynamicComparisonElimination;
pub use error::PassError;
pub use liveness::{compute_liveness, BlockLiveness, LiveSet};
pub use load_attr::LoadAttrSpecialization;
pub use phi_elim::PhiElimination;
pub use refcount::RefcountInsertion;
pub use registry::{PassRegistry, Pipeline, RegistryError};
pub use simplify::Simplify;
pub use super_access::SuperAccessResolution;

bitflags::bitflags! {
    /// Properties a pass requires of its input.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
    pub struct Preconditions: u8 {
        /// The function is in well-formed SSA form.
        const SSA = 1 << 0;
        /// No `Incref`/`Decref` or unwind annotations are present.
        const NO_REFCOUNTS = 1 << 1;
    }
}

/// A transformation of one function's HIR.
///
/// Passes are constructed fresh for every function by the registry, so a
/// pass may keep scratch state between calls to [`Pass::run`] without
/// worrying about other functions.
pub trait Pass {
    /// Name used in fixtures and diagnostics.
    fn name(&self) -> &'static str;

    fn preconditions(&self) -> Preconditions {
        Preconditions::empty()
    }

    /// Whether the pass only applies to statically compiled functions.
    fn requires_static(&self) -> bool {
        false
    }

    /// Rewrite `func` in place.
    fn run(&mut self, func: &mut Function) -> Result<(), PassError>;
}

/// Whether [`run_pass`] applied the pass or skipped it.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PassOutcome {
    Applied,
    /// The pass is static-only and the function is dynamic.
    Skipped,
}

/// Run `pass` over `func`, honoring its declared contract.
///
/// On error `func` is left exactly as it was before the call.
pub fn run_pass(pass: &mut dyn Pass, func: &mut Function) -> Result<PassOutcome, PassError> {
    let name = pass.name();
    if pass.requires_static() && !func.mode.is_static() {
        tracing::debug!(pass = name, function = %func.name, "skipping static-only pass");
        return Ok(PassOutcome::Skipped);
    }
    check_preconditions(name, pass.preconditions(), func)?;

    let snapshot = func.clone();
    match pass.run(func) {
        Ok(()) => {
            tracing::debug!(
                pass = name,
                function = %func.name,
                blocks = func.blocks.len(),
                "pass applied"
            );
            Ok(PassOutcome::Applied)
        }
        Err(err) => {
            *func = snapshot;
            tracing::debug!(pass = name, function = %func.name, error = %err, "pass failed");
            Err(err)
        }
    }
}

fn check_preconditions(
    pass: &'static str,
    required: Preconditions,
    func: &Function,
) -> Result<(), PassError> {
    if required.contains(Preconditions::SSA) {
        if !func.ssa {
            return Err(PassError::precondition(pass, "function is not in SSA form"));
        }
        jit_hir::verify(func)
            .map_err(|e| PassError::precondition(pass, format!("malformed SSA: {e}")))?;
    }
    if required.contains(Preconditions::NO_REFCOUNTS) && func.has_refcounts() {
        return Err(PassError::precondition(
            pass,
            "function already contains refcount operations",
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests;
