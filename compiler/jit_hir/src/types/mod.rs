//! Value types for the HIR.
//!
//! A [`Type`] is a [`TypeKind`] plus an optional compile-time [`Const`]. The
//! kind decides whether a value is a managed heap reference (everything
//! except the `C*` primitives); the constant, when present, is what
//! `Simplify` folds and what the static passes resolve against.
//!
//! The textual form is the one used by the HIR printer:
//!
//! ```text
//! Object  Long[3]  Bool[True]  Str["a"]  Func["mod.f"]  Type[Point]
//! User[Point]  Object[0x7f00deadbeef]  CInt64[-1]  CBool[false]  NoneType
//! ```

use std::fmt;

use crate::stable;

/// The shape of a value, without any constant specialization.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum TypeKind {
    /// Any object; nothing is known statically.
    Object,
    Long,
    Float,
    Bool,
    Str,
    NoneType,
    List,
    Tuple,
    /// A function object.
    Func,
    /// A class object.
    Type,
    /// An exact instance of a class declared in the function's class table.
    User(String),
    /// Unboxed 64-bit integer.
    CInt64,
    /// Unboxed double.
    CDouble,
    /// Unboxed boolean.
    CBool,
}

impl TypeKind {
    /// Keyword used for this kind in HIR text (without brackets).
    pub fn keyword(&self) -> &'static str {
        match self {
            TypeKind::Object => "Object",
            TypeKind::Long => "Long",
            TypeKind::Float => "Float",
            TypeKind::Bool => "Bool",
            TypeKind::Str => "Str",
            TypeKind::NoneType => "NoneType",
            TypeKind::List => "List",
            TypeKind::Tuple => "Tuple",
            TypeKind::Func => "Func",
            TypeKind::Type => "Type",
            TypeKind::User(_) => "User",
            TypeKind::CInt64 => "CInt64",
            TypeKind::CDouble => "CDouble",
            TypeKind::CBool => "CBool",
        }
    }

    /// Parse a bracket-free kind keyword. `User` needs a class name and is
    /// therefore not accepted here.
    pub fn from_keyword(keyword: &str) -> Option<Self> {
        Some(match keyword {
            "Object" => TypeKind::Object,
            "Long" => TypeKind::Long,
            "Float" => TypeKind::Float,
            "Bool" => TypeKind::Bool,
            "Str" => TypeKind::Str,
            "NoneType" => TypeKind::NoneType,
            "List" => TypeKind::List,
            "Tuple" => TypeKind::Tuple,
            "Func" => TypeKind::Func,
            "Type" => TypeKind::Type,
            "CInt64" => TypeKind::CInt64,
            "CDouble" => TypeKind::CDouble,
            "CBool" => TypeKind::CBool,
            _ => return None,
        })
    }

    /// Whether values of this kind are reference-counted heap objects.
    pub fn is_heap(&self) -> bool {
        !matches!(self, TypeKind::CInt64 | TypeKind::CDouble | TypeKind::CBool)
    }
}

/// A compile-time constant carried by a [`Type`].
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Const {
    Long(i64),
    Bool(bool),
    Str(String),
    /// A function identified by its qualified name.
    Func(String),
    /// A class identified by its name in the class table.
    Class(String),
    /// An opaque runtime object pointer.
    Pointer(u64),
    CInt64(i64),
    CBool(bool),
}

/// The declared type of a value.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Type {
    kind: TypeKind,
    constant: Option<Const>,
}

impl Type {
    /// The dynamic, unknown object type.
    pub const OBJECT: Type = Type {
        kind: TypeKind::Object,
        constant: None,
    };

    /// An unspecialized type of the given kind.
    pub fn of(kind: TypeKind) -> Self {
        Type {
            kind,
            constant: None,
        }
    }

    /// Exact instance of class `name`.
    pub fn user(name: impl Into<String>) -> Self {
        Type::of(TypeKind::User(name.into()))
    }

    pub fn long_const(value: i64) -> Self {
        Type::constant(Const::Long(value))
    }

    pub fn bool_const(value: bool) -> Self {
        Type::constant(Const::Bool(value))
    }

    pub fn cint64_const(value: i64) -> Self {
        Type::constant(Const::CInt64(value))
    }

    pub fn cbool_const(value: bool) -> Self {
        Type::constant(Const::CBool(value))
    }

    pub fn func_const(qualname: impl Into<String>) -> Self {
        Type::constant(Const::Func(qualname.into()))
    }

    /// A type specialized to `constant`; the kind follows from the constant.
    pub fn constant(constant: Const) -> Self {
        let kind = match &constant {
            Const::Long(_) => TypeKind::Long,
            Const::Bool(_) => TypeKind::Bool,
            Const::Str(_) => TypeKind::Str,
            Const::Func(_) => TypeKind::Func,
            Const::Class(_) => TypeKind::Type,
            Const::Pointer(_) => TypeKind::Object,
            Const::CInt64(_) => TypeKind::CInt64,
            Const::CBool(_) => TypeKind::CBool,
        };
        Type {
            kind,
            constant: Some(constant),
        }
    }

    #[inline]
    pub fn kind(&self) -> &TypeKind {
        &self.kind
    }

    #[inline]
    pub fn constant_value(&self) -> Option<&Const> {
        self.constant.as_ref()
    }

    /// Whether values of this type need reference counting.
    #[inline]
    pub fn is_heap(&self) -> bool {
        self.kind.is_heap()
    }

    /// The same type with any constant specialization dropped.
    pub fn unspecialized(&self) -> Type {
        Type::of(self.kind.clone())
    }

    /// Class name for `User[C]` instances.
    pub fn user_class(&self) -> Option<&str> {
        match &self.kind {
            TypeKind::User(name) => Some(name),
            _ => None,
        }
    }

    /// Class name for `Type[C]` class-object constants.
    pub fn class_constant(&self) -> Option<&str> {
        match &self.constant {
            Some(Const::Class(name)) => Some(name),
            _ => None,
        }
    }

    /// Qualified name for `Func[q]` function constants.
    pub fn func_constant(&self) -> Option<&str> {
        match &self.constant {
            Some(Const::Func(name)) => Some(name),
            _ => None,
        }
    }

    /// Integer value of a `Long[n]` or `CInt64[n]` constant.
    pub fn int_constant(&self) -> Option<i64> {
        match self.constant {
            Some(Const::Long(n) | Const::CInt64(n)) => Some(n),
            _ => None,
        }
    }

    /// Truthiness of the value, when it is fixed at compile time.
    pub fn known_truthiness(&self) -> Option<bool> {
        if self.kind == TypeKind::NoneType {
            return Some(false);
        }
        match &self.constant {
            Some(Const::Bool(b) | Const::CBool(b)) => Some(*b),
            Some(Const::Long(n) | Const::CInt64(n)) => Some(*n != 0),
            Some(Const::Str(s)) => Some(!s.is_empty()),
            Some(Const::Func(_) | Const::Class(_)) => Some(true),
            Some(Const::Pointer(_)) | None => None,
        }
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.kind.keyword())?;
        if let TypeKind::User(name) = &self.kind {
            return write!(f, "[{name}]");
        }
        match &self.constant {
            None => Ok(()),
            Some(Const::Long(n) | Const::CInt64(n)) => write!(f, "[{n}]"),
            Some(Const::Bool(true)) => f.write_str("[True]"),
            Some(Const::Bool(false)) => f.write_str("[False]"),
            Some(Const::CBool(b)) => write!(f, "[{b}]"),
            Some(Const::Str(s) | Const::Func(s)) => {
                f.write_str("[")?;
                write_quoted(f, s)?;
                f.write_str("]")
            }
            Some(Const::Class(name)) => write!(f, "[{name}]"),
            Some(Const::Pointer(addr)) => write!(f, "[{:#x}]", stable::display_address(*addr)),
        }
    }
}

/// Write `s` as a double-quoted HIR string literal.
pub(crate) fn write_quoted(f: &mut impl fmt::Write, s: &str) -> fmt::Result {
    f.write_char('"')?;
    for c in s.chars() {
        match c {
            '"' => f.write_str("\\\"")?,
            '\\' => f.write_str("\\\\")?,
            '\n' => f.write_str("\\n")?,
            c => f.write_char(c)?,
        }
    }
    f.write_char('"')
}
