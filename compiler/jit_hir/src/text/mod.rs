//! Canonical HIR text.
//!
//! ```text
//! fun f {
//!   bb 0 {
//!     v0:Object = LoadArg<0; "x">
//!     v1:Object = LoadAttr<0; "y"> v0
//!     v2:CBool = IsTruthy v0
//!     CondBranch<1, 2> v2
//!   }
//!   bb 1 (preds 0) {
//!     Return v1
//!   }
//!   bb 2 (preds 0) {
//!     v3:NoneType = LoadConst<NoneType>
//!     Return v3
//!   }
//! }
//! ```
//!
//! [`print_function`] is deterministic, and [`parse_function`] accepts
//! everything it prints: `print(parse(print(f))) == print(f)`.

mod lexer;
mod parser;
mod printer;

use crate::error::HirError;
use crate::ir::Function;

/// Parse HIR text into a [`Function`], checking SSA well-formedness unless
/// the header says `nonssa`.
pub fn parse_function(text: &str) -> Result<Function, HirError> {
    let tokens = lexer::tokenize(text)?;
    let func = parser::Parser::new(tokens).parse()?;
    tracing::trace!(
        function = %func.name,
        blocks = func.blocks.len(),
        values = func.value_types.len(),
        "parsed HIR"
    );
    Ok(func)
}

/// Render `func` as canonical HIR text.
pub fn print_function(func: &Function) -> String {
    func.to_string()
}
