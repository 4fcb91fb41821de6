//! Error types for HIR construction and verification.

use crate::ir::ValueId;

/// Failure to build a [`Function`](crate::Function) from HIR text.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum HirError {
    /// The text does not follow the HIR grammar.
    #[error("malformed HIR at line {line}: {message}")]
    Malformed { line: usize, message: String },

    /// An operand names a value that no instruction defines.
    #[error("malformed HIR at line {line}: reference to undefined value {value}")]
    UndefinedValue { line: usize, value: ValueId },

    /// The text parsed, but the resulting CFG is not valid SSA.
    #[error("malformed HIR: {0}")]
    Ssa(#[from] SsaError),
}

impl HirError {
    #[cold]
    pub(crate) fn malformed(line: usize, message: impl Into<String>) -> Self {
        HirError::Malformed {
            line,
            message: message.into(),
        }
    }

    /// Line of the offending token, when one is known.
    pub fn line(&self) -> Option<usize> {
        match self {
            HirError::Malformed { line, .. } | HirError::UndefinedValue { line, .. } => {
                Some(*line)
            }
            HirError::Ssa(_) => None,
        }
    }
}

/// An SSA or CFG well-formedness violation.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum SsaError {
    #[error("{value} is defined more than once")]
    Redefinition { value: ValueId },

    #[error("bb {block} uses {value}, which is never defined")]
    UndefinedUse { block: u32, value: ValueId },

    #[error("bb {block} uses {value} before its definition dominates the use")]
    NotDominated { block: u32, value: ValueId },

    #[error("phi {value} in bb {block} has {inputs} inputs but the block has {preds} predecessors")]
    PhiArity {
        block: u32,
        value: ValueId,
        inputs: usize,
        preds: usize,
    },

    #[error("phi {value} in bb {block} names bb {input_block}, which is not a predecessor")]
    PhiInputNotPredecessor {
        block: u32,
        value: ValueId,
        input_block: u32,
    },

    #[error("phi {value} in bb {block} follows a non-phi instruction")]
    PhiNotAtHead { block: u32, value: ValueId },

    #[error("bb {block} branches to a block that does not exist")]
    DanglingTarget { block: u32 },

    #[error("function is not in SSA form (phis have been eliminated)")]
    NotSsa,
}
