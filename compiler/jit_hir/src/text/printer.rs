//! Canonical HIR printer.
//!
//! Output depends only on the function's contents: blocks in arena order,
//! predecessors sorted by label, two-space indentation, no blank lines.

use std::fmt::{self, Write};

use crate::graph;
use crate::ir::{BlockId, Function, Instr, InstrKind, Terminator};
use crate::types::write_quoted;

const INDENT: &str = "  ";

impl fmt::Display for Function {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "fun {}", self.name)?;
        if self.mode.is_static() {
            f.write_str(" static")?;
        }
        if !self.ssa {
            f.write_str(" nonssa")?;
        }
        f.write_str(" {\n")?;

        for class in &self.classes {
            write!(f, "{INDENT}class {}", class.name)?;
            if let Some(base) = &class.base {
                write!(f, "({base})")?;
            }
            f.write_str(" {\n")?;
            for slot in &class.slots {
                writeln!(f, "{INDENT}{INDENT}slot {}: {} @{}", slot.name, slot.ty, slot.offset)?;
            }
            for method in &class.methods {
                writeln!(f, "{INDENT}{INDENT}method {method}")?;
            }
            writeln!(f, "{INDENT}}}")?;
        }

        let preds = graph::predecessors(self);
        for (id, block) in self.block_ids().zip(&self.blocks) {
            write!(f, "{INDENT}bb {}", block.label)?;
            let mut labels: Vec<u32> = preds[id.index()].iter().map(|p| self.label_of(*p)).collect();
            if !labels.is_empty() {
                labels.sort_unstable();
                f.write_str(" (preds ")?;
                write_list(f, &labels)?;
                f.write_char(')')?;
            }
            f.write_str(" {\n")?;
            for instr in &block.body {
                f.write_str(INDENT)?;
                f.write_str(INDENT)?;
                self.write_instr(f, instr)?;
                f.write_char('\n')?;
            }
            f.write_str(INDENT)?;
            f.write_str(INDENT)?;
            self.write_terminator(f, &block.terminator)?;
            writeln!(f, "\n{INDENT}}}")?;
        }
        f.write_str("}\n")
    }
}

impl Function {
    fn label_of(&self, block: BlockId) -> u32 {
        self.blocks
            .get(block.index())
            .map_or(block.raw(), |b| b.label)
    }

    fn write_instr(&self, f: &mut fmt::Formatter<'_>, instr: &Instr) -> fmt::Result {
        let kind = &instr.kind;
        if let Some(dst) = kind.dst() {
            write!(f, "{dst}:{} = ", self.value_type(dst))?;
        }
        f.write_str(kind.opcode())?;

        match kind {
            InstrKind::LoadArg { index, name, .. } => {
                write!(f, "<{index}; ")?;
                write_quoted(f, name)?;
                f.write_char('>')?;
            }
            InstrKind::LoadConst { ty, .. } | InstrKind::GuardType { ty, .. } => {
                write!(f, "<{ty}>")?;
            }
            InstrKind::LoadGlobal { attr, .. }
            | InstrKind::LoadAttr { attr, .. }
            | InstrKind::StoreAttr { attr, .. }
            | InstrKind::LoadMethod { attr, .. }
            | InstrKind::LoadMethodSuper { attr, .. }
            | InstrKind::LoadAttrSuper { attr, .. } => {
                write!(f, "<{}; ", attr.index)?;
                write_quoted(f, &attr.name)?;
                f.write_char('>')?;
            }
            InstrKind::LoadField { field, ty, .. } => {
                write!(f, "<{}; ", field.offset)?;
                write_quoted(f, &field.name)?;
                write!(f, ", {ty}>")?;
            }
            InstrKind::StoreField { field, .. } => {
                write!(f, "<{}; ", field.offset)?;
                write_quoted(f, &field.name)?;
                f.write_char('>')?;
            }
            InstrKind::CallMethod { args, .. } | InstrKind::VectorCall { args, .. } => {
                write!(f, "<{}>", args.len())?;
            }
            InstrKind::InvokeStatic { target, args, .. } => {
                f.write_char('<')?;
                write_quoted(f, target)?;
                write!(f, ", {}>", args.len())?;
            }
            InstrKind::BinaryOp { op, .. } | InstrKind::IntBinaryOp { op, .. } => {
                write!(f, "<{}>", op.name())?;
            }
            InstrKind::Compare { op, .. } => write!(f, "<{}>", op.name())?,
            InstrKind::MakeSeq { items, .. } => write!(f, "<{}>", items.len())?,
            InstrKind::Phi { inputs, .. } => {
                let labels: Vec<u32> = inputs.iter().map(|(b, _)| self.label_of(*b)).collect();
                f.write_char('<')?;
                write_list(f, &labels)?;
                f.write_char('>')?;
            }
            InstrKind::IsTruthy { .. }
            | InstrKind::Assign { .. }
            | InstrKind::Incref { .. }
            | InstrKind::Decref { .. } => {}
        }

        for operand in kind.operands() {
            write!(f, " {operand}")?;
        }
        if !instr.unwind.is_empty() {
            f.write_str(" { Unwind")?;
            for value in &instr.unwind {
                write!(f, " {value}")?;
            }
            f.write_str(" }")?;
        }
        Ok(())
    }

    fn write_terminator(&self, f: &mut fmt::Formatter<'_>, term: &Terminator) -> fmt::Result {
        match term {
            Terminator::Branch { target } => write!(f, "Branch<{}>", self.label_of(*target)),
            Terminator::CondBranch {
                cond,
                if_true,
                if_false,
            } => write!(
                f,
                "CondBranch<{}, {}> {cond}",
                self.label_of(*if_true),
                self.label_of(*if_false)
            ),
            Terminator::Return { value } => write!(f, "Return {value}"),
            Terminator::Unreachable => f.write_str("Unreachable"),
        }
    }
}

fn write_list(f: &mut fmt::Formatter<'_>, labels: &[u32]) -> fmt::Result {
    for (i, label) in labels.iter().enumerate() {
        if i > 0 {
            f.write_str(", ")?;
        }
        write!(f, "{label}")?;
    }
    Ok(())
}
