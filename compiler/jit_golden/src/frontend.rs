//! The language frontend seen from the harness.
//!
//! Lowering source into HIR happens outside this workspace. Source cases
//! reach it through [`Frontend`]; literal HIR cases never touch it.

use jit_hir::{CompileMode, Function};
use thiserror::Error;

/// Source text could not be lowered to HIR.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
#[error("lowering failed: {message}")]
pub struct LoweringError {
    pub message: String,
}

impl LoweringError {
    #[cold]
    pub fn new(message: impl Into<String>) -> Self {
        LoweringError {
            message: message.into(),
        }
    }
}

/// Lowers language source to unoptimized HIR.
///
/// Cases run on several threads at once, so implementations must be `Sync`.
pub trait Frontend: Sync {
    fn lower(&self, source: &str, mode: CompileMode) -> Result<Function, LoweringError>;
}

/// The frontend used when no language frontend is linked in. Every source
/// case fails with a [`LoweringError`].
#[derive(Clone, Copy, Debug, Default)]
pub struct UnavailableFrontend;

impl Frontend for UnavailableFrontend {
    fn lower(&self, _source: &str, mode: CompileMode) -> Result<Function, LoweringError> {
        let mode = if mode.is_static() { "static" } else { "dynamic" };
        Err(LoweringError::new(format!(
            "no language frontend is available to lower {mode} source"
        )))
    }
}
