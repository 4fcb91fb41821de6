//! Pass failures.

use thiserror::Error;

/// Why a pass refused or failed to transform a function.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum PassError {
    /// The input did not satisfy the pass's declared preconditions.
    #[error("{pass}: precondition violated: {reason}")]
    Precondition { pass: &'static str, reason: String },
    /// The pass reached a state it cannot handle.
    #[error("{pass}: {reason}")]
    Internal { pass: &'static str, reason: String },
}

impl PassError {
    #[cold]
    pub(crate) fn precondition(pass: &'static str, reason: impl Into<String>) -> Self {
        PassError::Precondition {
            pass,
            reason: reason.into(),
        }
    }

    #[cold]
    pub(crate) fn internal(pass: &'static str, reason: impl Into<String>) -> Self {
        PassError::Internal {
            pass,
            reason: reason.into(),
        }
    }

    /// Name of the pass that failed.
    pub fn pass(&self) -> &'static str {
        match self {
            PassError::Precondition { pass, .. } | PassError::Internal { pass, .. } => pass,
        }
    }
}
