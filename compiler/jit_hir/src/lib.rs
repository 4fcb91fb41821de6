//! High-level IR (HIR) for the JIT.
//!
//! This crate provides:
//!
//! - **HIR model** ([`Function`], [`Block`], [`Instr`], [`InstrKind`],
//!   [`Terminator`]): an SSA control-flow graph stored as an arena of blocks
//!   addressed by [`BlockId`], with values addressed by [`ValueId`].
//!
//! - **Types** ([`Type`], [`TypeKind`], [`Const`]): the declared type of
//!   every value, optionally specialized to a compile-time constant.
//!
//! - **Canonical text** ([`print_function`], [`parse_function`]): a
//!   deterministic serializer and its inverse. Golden tests compare printed
//!   text byte-for-byte, so the printer never depends on addresses or hash
//!   order.
//!
//! - **Verification and CFG utilities** ([`verify`], [`graph`]):
//!   predecessor lists, postorder, dominator tree, and the SSA checks that
//!   passes rely on.
//!
//! # Design
//!
//! Blocks and values are plain indices, not pointers. Dominance and
//! predecessor information are derived on demand rather than maintained as
//! back-references, so a pass may freely rewrite terminators and then
//! recompute whatever analysis it needs next.

mod error;
pub mod graph;
pub mod ir;
pub mod stable;
pub mod text;
pub mod types;
pub mod verify;

pub use error::{HirError, SsaError};
pub use ir::{
    AttrRef, BinaryOpKind, Block, BlockId, ClassDef, CompareKind, CompareOp, CompileMode,
    Effects, FieldRef, Function, Instr, InstrKind, OutputOwnership, SeqKind, Slot, Terminator,
    Use, ValueId,
};
pub use text::{parse_function, print_function};
pub use types::{Const, Type, TypeKind};
pub use verify::verify;
