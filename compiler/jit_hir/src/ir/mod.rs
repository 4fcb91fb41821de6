//! HIR data model: an SSA control-flow graph stored as an arena.
//!
//! # Architecture
//!
//! - **[`Function`]**: the CFG. Owns its blocks, its class table, and the
//!   declared type of every value.
//! - **[`Block`]**: a basic block. `body` holds the instructions in order,
//!   `terminator` decides where control goes next.
//! - **[`Instr`]**: one instruction, an [`InstrKind`] plus the optional
//!   unwind annotation written by refcount insertion.
//! - **[`Terminator`]**: block exit (branch, conditional branch, return,
//!   unreachable).
//!
//! Values are named by [`ValueId`], blocks by [`BlockId`]. A `BlockId` is an
//! arena index; the printed label of a block is stored separately so that
//! removing or appending blocks never renumbers the text.

use std::fmt;

use smallvec::SmallVec;

use crate::types::{Type, TypeKind};

// ── ID newtypes ─────────────────────────────────────────────────────

/// SSA value ID within a [`Function`]. Printed as `vN`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(transparent)]
pub struct ValueId(u32);

impl ValueId {
    #[inline]
    pub fn new(raw: u32) -> Self {
        Self(raw)
    }

    #[inline]
    pub fn raw(self) -> u32 {
        self.0
    }

    /// Index for `Vec` lookups.
    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for ValueId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "v{}", self.0)
    }
}

/// Block ID: the block's index in [`Function::blocks`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(transparent)]
pub struct BlockId(u32);

impl BlockId {
    #[inline]
    pub fn new(raw: u32) -> Self {
        Self(raw)
    }

    #[inline]
    pub fn raw(self) -> u32 {
        self.0
    }

    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

// ── Metadata ────────────────────────────────────────────────────────

bitflags::bitflags! {
    /// What executing an instruction may do besides producing its output.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
    pub struct Effects: u8 {
        /// May raise an exception (an implicit exit edge).
        const MAY_RAISE = 1 << 0;
        /// May allocate a new heap object.
        const MAY_ALLOCATE = 1 << 1;
        /// May deoptimize back to the interpreter.
        const MAY_DEOPT = 1 << 2;
        /// Writes memory observable by other instructions.
        const WRITES_MEMORY = 1 << 3;
    }
}

impl Effects {
    /// Effects that forbid removing the instruction when its output is unused.
    pub const SIDE_EFFECTS: Effects = Effects::MAY_RAISE
        .union(Effects::WRITES_MEMORY)
        .union(Effects::MAY_DEOPT);

    #[inline]
    pub fn has_side_effects(self) -> bool {
        self.intersects(Self::SIDE_EFFECTS)
    }
}

/// How an instruction's output relates to the reference it holds.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum OutputOwnership {
    /// No output.
    None,
    /// A reference kept alive for the whole call (arguments, constants).
    StableBorrow,
    /// A new reference the function must release.
    Owned,
    /// A reference borrowed from the first operand; only valid while that
    /// operand is held.
    BorrowedFromInput,
    /// The same reference as the first operand.
    AliasOfInput,
}

/// Whether an operand is read or consumed.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Use {
    /// Read only; the caller keeps its reference.
    Borrow,
    /// Ownership of one reference transfers to the instruction.
    Steal,
}

/// Lowering mode of a function.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum CompileMode {
    /// Dynamically typed; only inferred types are available.
    #[default]
    Dynamic,
    /// Statically compiled; class layouts and exact types are known.
    Static,
}

impl CompileMode {
    #[inline]
    pub fn is_static(self) -> bool {
        self == CompileMode::Static
    }
}

// ── Operators ───────────────────────────────────────────────────────

/// Arithmetic and bitwise operators of `BinaryOp` / `IntBinaryOp`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum BinaryOpKind {
    Add,
    Subtract,
    Multiply,
    FloorDivide,
    Modulo,
    And,
    Or,
    Xor,
}

impl BinaryOpKind {
    pub fn name(self) -> &'static str {
        match self {
            BinaryOpKind::Add => "Add",
            BinaryOpKind::Subtract => "Subtract",
            BinaryOpKind::Multiply => "Multiply",
            BinaryOpKind::FloorDivide => "FloorDivide",
            BinaryOpKind::Modulo => "Modulo",
            BinaryOpKind::And => "And",
            BinaryOpKind::Or => "Or",
            BinaryOpKind::Xor => "Xor",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Some(match name {
            "Add" => BinaryOpKind::Add,
            "Subtract" => BinaryOpKind::Subtract,
            "Multiply" => BinaryOpKind::Multiply,
            "FloorDivide" => BinaryOpKind::FloorDivide,
            "Modulo" => BinaryOpKind::Modulo,
            "And" => BinaryOpKind::And,
            "Or" => BinaryOpKind::Or,
            "Xor" => BinaryOpKind::Xor,
            _ => return None,
        })
    }
}

/// Comparison operators.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CompareOp {
    Equal,
    NotEqual,
    LessThan,
    LessThanEqual,
    GreaterThan,
    GreaterThanEqual,
}

impl CompareOp {
    pub fn name(self) -> &'static str {
        match self {
            CompareOp::Equal => "Equal",
            CompareOp::NotEqual => "NotEqual",
            CompareOp::LessThan => "LessThan",
            CompareOp::LessThanEqual => "LessThanEqual",
            CompareOp::GreaterThan => "GreaterThan",
            CompareOp::GreaterThanEqual => "GreaterThanEqual",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Some(match name {
            "Equal" => CompareOp::Equal,
            "NotEqual" => CompareOp::NotEqual,
            "LessThan" => CompareOp::LessThan,
            "LessThanEqual" => CompareOp::LessThanEqual,
            "GreaterThan" => CompareOp::GreaterThan,
            "GreaterThanEqual" => CompareOp::GreaterThanEqual,
            _ => return None,
        })
    }

    /// Apply the comparison to two ordered operands.
    pub fn evaluate<T: Ord>(self, left: &T, right: &T) -> bool {
        match self {
            CompareOp::Equal => left == right,
            CompareOp::NotEqual => left != right,
            CompareOp::LessThan => left < right,
            CompareOp::LessThanEqual => left <= right,
            CompareOp::GreaterThan => left > right,
            CompareOp::GreaterThanEqual => left >= right,
        }
    }
}

/// Which comparison instruction: the generic dispatching one or one of the
/// type-specialized forms.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CompareKind {
    /// `Compare`: dispatches on the operands' runtime types.
    Generic,
    /// `LongCompare`: both operands are exact ints.
    Long,
    /// `UnicodeCompare`: both operands are exact strings.
    Unicode,
    /// `PrimitiveCompare`: both operands are unboxed.
    Primitive,
}

impl CompareKind {
    pub fn opcode(self) -> &'static str {
        match self {
            CompareKind::Generic => "Compare",
            CompareKind::Long => "LongCompare",
            CompareKind::Unicode => "UnicodeCompare",
            CompareKind::Primitive => "PrimitiveCompare",
        }
    }
}

/// Kind of sequence built by `MakeList` / `MakeTuple`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SeqKind {
    List,
    Tuple,
}

/// A named attribute or global: `<idx; "name">`.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct AttrRef {
    /// Index into the code object's name table.
    pub index: u32,
    pub name: String,
}

impl AttrRef {
    pub fn new(index: u32, name: impl Into<String>) -> Self {
        AttrRef {
            index,
            name: name.into(),
        }
    }
}

/// A resolved object slot: `<offset; "name">`.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct FieldRef {
    /// Byte offset of the slot inside the object.
    pub offset: u32,
    pub name: String,
}

// ── Instructions ────────────────────────────────────────────────────

/// Operation performed by an [`Instr`].
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum InstrKind {
    LoadArg {
        dst: ValueId,
        index: u32,
        name: String,
    },
    /// Materializes the constant carried by `ty`.
    LoadConst { dst: ValueId, ty: Type },
    LoadGlobal { dst: ValueId, attr: AttrRef },
    LoadAttr {
        dst: ValueId,
        obj: ValueId,
        attr: AttrRef,
    },
    StoreAttr {
        obj: ValueId,
        value: ValueId,
        attr: AttrRef,
    },
    /// Direct slot read; the result is borrowed from `obj`.
    LoadField {
        dst: ValueId,
        obj: ValueId,
        field: FieldRef,
        ty: Type,
    },
    /// Direct slot write; steals `value`.
    StoreField {
        obj: ValueId,
        value: ValueId,
        field: FieldRef,
    },
    LoadMethod {
        dst: ValueId,
        obj: ValueId,
        attr: AttrRef,
    },
    /// `super(class, receiver).name` for a method call.
    LoadMethodSuper {
        dst: ValueId,
        class: ValueId,
        receiver: ValueId,
        attr: AttrRef,
    },
    /// `super(class, receiver).name` as an attribute read.
    LoadAttrSuper {
        dst: ValueId,
        class: ValueId,
        receiver: ValueId,
        attr: AttrRef,
    },
    CallMethod {
        dst: ValueId,
        method: ValueId,
        receiver: ValueId,
        args: Vec<ValueId>,
    },
    VectorCall {
        dst: ValueId,
        func: ValueId,
        args: Vec<ValueId>,
    },
    /// Direct call to a statically known function.
    InvokeStatic {
        dst: ValueId,
        target: String,
        args: Vec<ValueId>,
    },
    BinaryOp {
        dst: ValueId,
        op: BinaryOpKind,
        left: ValueId,
        right: ValueId,
    },
    /// Unboxed integer arithmetic; wraps on overflow.
    IntBinaryOp {
        dst: ValueId,
        op: BinaryOpKind,
        left: ValueId,
        right: ValueId,
    },
    Compare {
        dst: ValueId,
        kind: CompareKind,
        op: CompareOp,
        left: ValueId,
        right: ValueId,
    },
    IsTruthy { dst: ValueId, value: ValueId },
    /// Deoptimizes unless `value` has type `ty`.
    GuardType {
        dst: ValueId,
        ty: Type,
        value: ValueId,
    },
    Assign { dst: ValueId, src: ValueId },
    /// Builds a list or tuple; steals every item.
    MakeSeq {
        dst: ValueId,
        kind: SeqKind,
        items: Vec<ValueId>,
    },
    /// One input per predecessor, in predecessor order.
    Phi {
        dst: ValueId,
        inputs: Vec<(BlockId, ValueId)>,
    },
    Incref { value: ValueId },
    Decref { value: ValueId },
}

impl InstrKind {
    /// Opcode as written in HIR text.
    pub fn opcode(&self) -> &'static str {
        match self {
            InstrKind::LoadArg { .. } => "LoadArg",
            InstrKind::LoadConst { .. } => "LoadConst",
            InstrKind::LoadGlobal { .. } => "LoadGlobal",
            InstrKind::LoadAttr { .. } => "LoadAttr",
            InstrKind::StoreAttr { .. } => "StoreAttr",
            InstrKind::LoadField { .. } => "LoadField",
            InstrKind::StoreField { .. } => "StoreField",
            InstrKind::LoadMethod { .. } => "LoadMethod",
            InstrKind::LoadMethodSuper { .. } => "LoadMethodSuper",
            InstrKind::LoadAttrSuper { .. } => "LoadAttrSuper",
            InstrKind::CallMethod { .. } => "CallMethod",
            InstrKind::VectorCall { .. } => "VectorCall",
            InstrKind::InvokeStatic { .. } => "InvokeStatic",
            InstrKind::BinaryOp { .. } => "BinaryOp",
            InstrKind::IntBinaryOp { .. } => "IntBinaryOp",
            InstrKind::Compare { kind, .. } => kind.opcode(),
            InstrKind::IsTruthy { .. } => "IsTruthy",
            InstrKind::GuardType { .. } => "GuardType",
            InstrKind::Assign { .. } => "Assign",
            InstrKind::MakeSeq {
                kind: SeqKind::List,
                ..
            } => "MakeList",
            InstrKind::MakeSeq {
                kind: SeqKind::Tuple,
                ..
            } => "MakeTuple",
            InstrKind::Phi { .. } => "Phi",
            InstrKind::Incref { .. } => "Incref",
            InstrKind::Decref { .. } => "Decref",
        }
    }

    /// The value defined by this instruction, if any.
    pub fn dst(&self) -> Option<ValueId> {
        match self {
            InstrKind::LoadArg { dst, .. }
            | InstrKind::LoadConst { dst, .. }
            | InstrKind::LoadGlobal { dst, .. }
            | InstrKind::LoadAttr { dst, .. }
            | InstrKind::LoadField { dst, .. }
            | InstrKind::LoadMethod { dst, .. }
            | InstrKind::LoadMethodSuper { dst, .. }
            | InstrKind::LoadAttrSuper { dst, .. }
            | InstrKind::CallMethod { dst, .. }
            | InstrKind::VectorCall { dst, .. }
            | InstrKind::InvokeStatic { dst, .. }
            | InstrKind::BinaryOp { dst, .. }
            | InstrKind::IntBinaryOp { dst, .. }
            | InstrKind::Compare { dst, .. }
            | InstrKind::IsTruthy { dst, .. }
            | InstrKind::GuardType { dst, .. }
            | InstrKind::Assign { dst, .. }
            | InstrKind::MakeSeq { dst, .. }
            | InstrKind::Phi { dst, .. } => Some(*dst),

            InstrKind::StoreAttr { .. }
            | InstrKind::StoreField { .. }
            | InstrKind::Incref { .. }
            | InstrKind::Decref { .. } => None,
        }
    }

    /// Operands with how each is used, in textual order.
    ///
    /// Phi inputs are not listed: they are used on the incoming edges, not
    /// inside the phi's block.
    pub fn operand_uses(&self) -> SmallVec<[(ValueId, Use); 4]> {
        let mut out = SmallVec::new();
        match self {
            InstrKind::LoadArg { .. }
            | InstrKind::LoadConst { .. }
            | InstrKind::LoadGlobal { .. }
            | InstrKind::Phi { .. } => {}

            InstrKind::LoadAttr { obj, .. }
            | InstrKind::LoadField { obj, .. }
            | InstrKind::LoadMethod { obj, .. } => out.push((*obj, Use::Borrow)),

            InstrKind::StoreAttr { obj, value, .. } => {
                out.push((*obj, Use::Borrow));
                out.push((*value, Use::Borrow));
            }
            InstrKind::StoreField { obj, value, .. } => {
                out.push((*obj, Use::Borrow));
                out.push((*value, Use::Steal));
            }
            InstrKind::LoadMethodSuper {
                class, receiver, ..
            }
            | InstrKind::LoadAttrSuper {
                class, receiver, ..
            } => {
                out.push((*class, Use::Borrow));
                out.push((*receiver, Use::Borrow));
            }
            InstrKind::CallMethod {
                method,
                receiver,
                args,
                ..
            } => {
                out.push((*method, Use::Borrow));
                out.push((*receiver, Use::Borrow));
                out.extend(args.iter().map(|a| (*a, Use::Borrow)));
            }
            InstrKind::VectorCall { func, args, .. } => {
                out.push((*func, Use::Borrow));
                out.extend(args.iter().map(|a| (*a, Use::Borrow)));
            }
            InstrKind::InvokeStatic { args, .. } => {
                out.extend(args.iter().map(|a| (*a, Use::Borrow)));
            }
            InstrKind::BinaryOp { left, right, .. }
            | InstrKind::IntBinaryOp { left, right, .. }
            | InstrKind::Compare { left, right, .. } => {
                out.push((*left, Use::Borrow));
                out.push((*right, Use::Borrow));
            }
            InstrKind::IsTruthy { value, .. }
            | InstrKind::GuardType { value, .. }
            | InstrKind::Incref { value }
            | InstrKind::Decref { value } => out.push((*value, Use::Borrow)),
            InstrKind::Assign { src, .. } => out.push((*src, Use::Borrow)),
            InstrKind::MakeSeq { items, .. } => {
                out.extend(items.iter().map(|a| (*a, Use::Steal)));
            }
        }
        out
    }

    /// Values read by this instruction, including phi inputs.
    pub fn operands(&self) -> SmallVec<[ValueId; 4]> {
        if let InstrKind::Phi { inputs, .. } = self {
            return inputs.iter().map(|(_, v)| *v).collect();
        }
        self.operand_uses().into_iter().map(|(v, _)| v).collect()
    }

    /// Apply `f` to every operand in place (phi inputs included).
    pub fn for_each_operand_mut(&mut self, mut f: impl FnMut(&mut ValueId)) {
        match self {
            InstrKind::LoadArg { .. }
            | InstrKind::LoadConst { .. }
            | InstrKind::LoadGlobal { .. } => {}
            InstrKind::LoadAttr { obj, .. }
            | InstrKind::LoadField { obj, .. }
            | InstrKind::LoadMethod { obj, .. } => f(obj),
            InstrKind::StoreAttr { obj, value, .. } | InstrKind::StoreField { obj, value, .. } => {
                f(obj);
                f(value);
            }
            InstrKind::LoadMethodSuper {
                class, receiver, ..
            }
            | InstrKind::LoadAttrSuper {
                class, receiver, ..
            } => {
                f(class);
                f(receiver);
            }
            InstrKind::CallMethod {
                method,
                receiver,
                args,
                ..
            } => {
                f(method);
                f(receiver);
                args.iter_mut().for_each(f);
            }
            InstrKind::VectorCall { func, args, .. } => {
                f(func);
                args.iter_mut().for_each(f);
            }
            InstrKind::InvokeStatic { args, .. } => args.iter_mut().for_each(f),
            InstrKind::BinaryOp { left, right, .. }
            | InstrKind::IntBinaryOp { left, right, .. }
            | InstrKind::Compare { left, right, .. } => {
                f(left);
                f(right);
            }
            InstrKind::IsTruthy { value, .. }
            | InstrKind::GuardType { value, .. }
            | InstrKind::Incref { value }
            | InstrKind::Decref { value } => f(value),
            InstrKind::Assign { src, .. } => f(src),
            InstrKind::MakeSeq { items, .. } => items.iter_mut().for_each(f),
            InstrKind::Phi { inputs, .. } => {
                for (_, v) in inputs {
                    f(v);
                }
            }
        }
    }

    /// Replace every use of `old` with `new`. Definitions are untouched.
    pub fn substitute(&mut self, old: ValueId, new: ValueId) {
        self.for_each_operand_mut(|v| {
            if *v == old {
                *v = new;
            }
        });
    }

    pub fn effects(&self) -> Effects {
        match self {
            InstrKind::LoadArg { .. }
            | InstrKind::LoadConst { .. }
            | InstrKind::LoadField { .. }
            | InstrKind::IntBinaryOp { .. }
            | InstrKind::Assign { .. }
            | InstrKind::Phi { .. } => Effects::empty(),

            InstrKind::Compare {
                kind: CompareKind::Long | CompareKind::Unicode | CompareKind::Primitive,
                ..
            } => Effects::empty(),

            InstrKind::LoadGlobal { .. }
            | InstrKind::LoadAttr { .. }
            | InstrKind::LoadMethod { .. }
            | InstrKind::LoadMethodSuper { .. }
            | InstrKind::LoadAttrSuper { .. }
            | InstrKind::IsTruthy { .. } => Effects::MAY_RAISE,

            InstrKind::StoreAttr { .. } => Effects::MAY_RAISE | Effects::WRITES_MEMORY,
            InstrKind::StoreField { .. } | InstrKind::Incref { .. } | InstrKind::Decref { .. } => {
                Effects::WRITES_MEMORY
            }

            InstrKind::CallMethod { .. }
            | InstrKind::VectorCall { .. }
            | InstrKind::InvokeStatic { .. } => {
                Effects::MAY_RAISE | Effects::MAY_ALLOCATE | Effects::WRITES_MEMORY
            }

            InstrKind::BinaryOp { .. }
            | InstrKind::Compare {
                kind: CompareKind::Generic,
                ..
            } => Effects::MAY_RAISE | Effects::MAY_ALLOCATE,

            InstrKind::GuardType { .. } => Effects::MAY_DEOPT,
            InstrKind::MakeSeq { .. } => Effects::MAY_ALLOCATE,
        }
    }

    pub fn output_ownership(&self) -> OutputOwnership {
        match self {
            InstrKind::LoadArg { .. } | InstrKind::LoadConst { .. } => {
                OutputOwnership::StableBorrow
            }
            InstrKind::LoadField { .. } => OutputOwnership::BorrowedFromInput,
            InstrKind::GuardType { .. } | InstrKind::Assign { .. } => {
                OutputOwnership::AliasOfInput
            }
            InstrKind::StoreAttr { .. }
            | InstrKind::StoreField { .. }
            | InstrKind::Incref { .. }
            | InstrKind::Decref { .. } => OutputOwnership::None,
            _ => OutputOwnership::Owned,
        }
    }

    /// Output type when the text omits an annotation. `None` when the type
    /// depends on an operand (`Assign`).
    pub fn natural_type(&self) -> Option<Type> {
        let kind = match self {
            InstrKind::LoadConst { ty, .. }
            | InstrKind::LoadField { ty, .. }
            | InstrKind::GuardType { ty, .. } => return Some(ty.clone()),
            InstrKind::Assign { .. } => return None,
            InstrKind::IntBinaryOp { .. } => TypeKind::CInt64,
            InstrKind::Compare { kind, .. } => match kind {
                CompareKind::Generic => TypeKind::Object,
                CompareKind::Long | CompareKind::Unicode => TypeKind::Bool,
                CompareKind::Primitive => TypeKind::CBool,
            },
            InstrKind::IsTruthy { .. } => TypeKind::CBool,
            InstrKind::MakeSeq {
                kind: SeqKind::List,
                ..
            } => TypeKind::List,
            InstrKind::MakeSeq {
                kind: SeqKind::Tuple,
                ..
            } => TypeKind::Tuple,
            _ => TypeKind::Object,
        };
        Some(Type::of(kind))
    }

    #[inline]
    pub fn is_phi(&self) -> bool {
        matches!(self, InstrKind::Phi { .. })
    }

    #[inline]
    pub fn is_refcount(&self) -> bool {
        matches!(self, InstrKind::Incref { .. } | InstrKind::Decref { .. })
    }
}

/// An instruction in a block body.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Instr {
    pub kind: InstrKind,
    /// Owned values released if this instruction raises, sorted ascending.
    /// Empty until refcount insertion runs.
    pub unwind: SmallVec<[ValueId; 4]>,
}

impl Instr {
    pub fn new(kind: InstrKind) -> Self {
        Instr {
            kind,
            unwind: SmallVec::new(),
        }
    }
}

impl From<InstrKind> for Instr {
    fn from(kind: InstrKind) -> Self {
        Instr::new(kind)
    }
}

// ── Terminators ─────────────────────────────────────────────────────

/// How control leaves a block.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Terminator {
    Branch {
        target: BlockId,
    },
    CondBranch {
        cond: ValueId,
        if_true: BlockId,
        if_false: BlockId,
    },
    /// Returns `value`, stealing its reference.
    Return {
        value: ValueId,
    },
    Unreachable,
}

impl Terminator {
    /// Successor blocks in textual order. A conditional branch with both
    /// arms on the same block lists it twice.
    pub fn successors(&self) -> SmallVec<[BlockId; 2]> {
        match self {
            Terminator::Branch { target } => smallvec::smallvec![*target],
            Terminator::CondBranch {
                if_true, if_false, ..
            } => smallvec::smallvec![*if_true, *if_false],
            Terminator::Return { .. } | Terminator::Unreachable => SmallVec::new(),
        }
    }

    /// The value read by this terminator, if any.
    pub fn operand(&self) -> Option<ValueId> {
        match self {
            Terminator::CondBranch { cond, .. } => Some(*cond),
            Terminator::Return { value } => Some(*value),
            Terminator::Branch { .. } | Terminator::Unreachable => None,
        }
    }

    pub fn substitute(&mut self, old: ValueId, new: ValueId) {
        match self {
            Terminator::CondBranch { cond: v, .. } | Terminator::Return { value: v } => {
                if *v == old {
                    *v = new;
                }
            }
            Terminator::Branch { .. } | Terminator::Unreachable => {}
        }
    }

    /// Retarget every edge to `from` so it goes to `to` instead.
    pub fn redirect(&mut self, from: BlockId, to: BlockId) {
        self.for_each_target_mut(|t| {
            if *t == from {
                *t = to;
            }
        });
    }

    pub fn for_each_target_mut(&mut self, mut f: impl FnMut(&mut BlockId)) {
        match self {
            Terminator::Branch { target } => f(target),
            Terminator::CondBranch {
                if_true, if_false, ..
            } => {
                f(if_true);
                f(if_false);
            }
            Terminator::Return { .. } | Terminator::Unreachable => {}
        }
    }
}

// ── Blocks ──────────────────────────────────────────────────────────

/// A basic block.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Block {
    /// Printed label. Unique within the function, stable across passes.
    pub label: u32,
    /// Phis first, then ordinary instructions.
    pub body: Vec<Instr>,
    pub terminator: Terminator,
}

impl Block {
    /// Number of leading phi instructions.
    pub fn phi_count(&self) -> usize {
        self.body.iter().take_while(|i| i.kind.is_phi()).count()
    }
}

// ── Class table ─────────────────────────────────────────────────────

/// A field of a statically laid out class.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Slot {
    pub name: String,
    pub ty: Type,
    pub offset: u32,
}

/// Layout and method table of a class known in static mode.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ClassDef {
    pub name: String,
    pub base: Option<String>,
    pub slots: Vec<Slot>,
    pub methods: Vec<String>,
}

impl ClassDef {
    pub fn new(name: impl Into<String>) -> Self {
        ClassDef {
            name: name.into(),
            base: None,
            slots: Vec::new(),
            methods: Vec::new(),
        }
    }
}

// ── Functions ───────────────────────────────────────────────────────

static DYNAMIC_OBJECT: Type = Type::OBJECT;

/// A function's HIR.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Function {
    pub name: String,
    pub mode: CompileMode,
    /// `false` once phis have been lowered to copies; values may then be
    /// assigned in more than one place.
    pub ssa: bool,
    pub classes: Vec<ClassDef>,
    /// Blocks in definition order. `blocks[entry.index()]` is the entry.
    pub blocks: Vec<Block>,
    pub entry: BlockId,
    /// Declared type of each value, indexed by `ValueId::index()`.
    pub value_types: Vec<Option<Type>>,
}

impl Function {
    /// An empty function in SSA form.
    pub fn new(name: impl Into<String>, mode: CompileMode) -> Self {
        Function {
            name: name.into(),
            mode,
            ssa: true,
            classes: Vec::new(),
            blocks: Vec::new(),
            entry: BlockId::new(0),
            value_types: Vec::new(),
        }
    }

    #[inline]
    pub fn block(&self, id: BlockId) -> &Block {
        &self.blocks[id.index()]
    }

    #[inline]
    pub fn block_mut(&mut self, id: BlockId) -> &mut Block {
        &mut self.blocks[id.index()]
    }

    pub fn block_ids(&self) -> impl Iterator<Item = BlockId> {
        (0..self.blocks.len()).map(|i| BlockId::new(index_u32(i)))
    }

    pub fn block_by_label(&self, label: u32) -> Option<BlockId> {
        self.blocks
            .iter()
            .position(|b| b.label == label)
            .map(|i| BlockId::new(index_u32(i)))
    }

    /// Declared type of `value`. Values without a declaration are `Object`.
    pub fn value_type(&self, value: ValueId) -> &Type {
        self.value_types
            .get(value.index())
            .and_then(Option::as_ref)
            .unwrap_or(&DYNAMIC_OBJECT)
    }

    pub fn set_value_type(&mut self, value: ValueId, ty: Type) {
        if self.value_types.len() <= value.index() {
            self.value_types.resize(value.index() + 1, None);
        }
        self.value_types[value.index()] = Some(ty);
    }

    /// Allocate a value that collides with nothing in the function.
    pub fn fresh_value(&mut self, ty: Type) -> ValueId {
        let id = ValueId::new(index_u32(self.value_types.len()));
        self.value_types.push(Some(ty));
        id
    }

    /// Label one greater than every label in use.
    pub fn next_label(&self) -> u32 {
        self.blocks
            .iter()
            .map(|b| b.label + 1)
            .max()
            .unwrap_or(0)
    }

    /// Append a block with a fresh label.
    pub fn push_block(&mut self, body: Vec<Instr>, terminator: Terminator) -> BlockId {
        let id = BlockId::new(index_u32(self.blocks.len()));
        let label = self.next_label();
        self.blocks.push(Block {
            label,
            body,
            terminator,
        });
        id
    }

    /// Drop every block whose `keep` flag is false, renumbering the rest.
    ///
    /// Terminators and phi inputs that point at kept blocks are remapped;
    /// phi inputs from dropped blocks are removed. Edges into dropped blocks
    /// must not remain.
    pub fn retain_blocks(&mut self, keep: &[bool]) {
        let mut remap = vec![None; self.blocks.len()];
        let mut next = 0u32;
        for (i, &k) in keep.iter().enumerate() {
            if k {
                remap[i] = Some(BlockId::new(next));
                next += 1;
            }
        }
        let old = std::mem::take(&mut self.blocks);
        for (i, mut block) in old.into_iter().enumerate() {
            if !keep.get(i).copied().unwrap_or(false) {
                continue;
            }
            block
                .terminator
                .for_each_target_mut(|t| *t = remap[t.index()].unwrap_or(*t));
            for instr in &mut block.body {
                if let InstrKind::Phi { inputs, .. } = &mut instr.kind {
                    inputs.retain_mut(|(pred, _)| match remap[pred.index()] {
                        Some(new) => {
                            *pred = new;
                            true
                        }
                        None => false,
                    });
                }
            }
            self.blocks.push(block);
        }
        self.entry = remap[self.entry.index()].unwrap_or(self.entry);
    }

    /// Replace every use of `old` with `new` across the function.
    pub fn replace_uses(&mut self, old: ValueId, new: ValueId) {
        for block in &mut self.blocks {
            for instr in &mut block.body {
                instr.kind.substitute(old, new);
                for v in &mut instr.unwind {
                    if *v == old {
                        *v = new;
                    }
                }
            }
            block.terminator.substitute(old, new);
        }
    }

    /// Whether any block carries `Incref`/`Decref` or unwind annotations.
    pub fn has_refcounts(&self) -> bool {
        self.blocks
            .iter()
            .flat_map(|b| &b.body)
            .any(|i| i.kind.is_refcount() || !i.unwind.is_empty())
    }

    // ── Class table queries ─────────────────────────────────────

    pub fn class(&self, name: &str) -> Option<&ClassDef> {
        self.classes.iter().find(|c| c.name == name)
    }

    /// `name` followed by its bases, nearest first. Stops at an unknown base
    /// or when the chain would revisit a class.
    pub fn class_chain(&self, name: &str) -> Vec<&ClassDef> {
        let mut chain: Vec<&ClassDef> = Vec::new();
        let mut current = self.class(name);
        while let Some(class) = current {
            if chain.iter().any(|c| c.name == class.name) {
                break;
            }
            chain.push(class);
            current = class.base.as_deref().and_then(|b| self.class(b));
        }
        chain
    }

    /// The slot `attr` as seen from instances of `class`.
    pub fn resolve_slot(&self, class: &str, attr: &str) -> Option<&Slot> {
        self.class_chain(class)
            .into_iter()
            .find_map(|c| c.slots.iter().find(|s| s.name == attr))
    }

    /// The class that defines method `name` for instances of `class`.
    pub fn resolve_method(&self, class: &str, name: &str) -> Option<&ClassDef> {
        self.class_chain(class)
            .into_iter()
            .find(|c| c.methods.iter().any(|m| m == name))
    }
}

/// Arena indices are bounded by the `u32` ID space.
#[inline]
fn index_u32(i: usize) -> u32 {
    u32::try_from(i).unwrap_or(u32::MAX)
}

#[cfg(test)]
mod tests;
