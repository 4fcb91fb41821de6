//! HIR text parser.
//!
//! Block labels may be referenced before the block is declared, so branch
//! targets and phi inputs are first recorded with `BlockId::new(label)` and
//! rewritten to arena indices once every block is known. Uses of undefined
//! values and phi arity are checked the same way, after the whole function
//! has been read; dominance is left to the verifier.

use rustc_hash::{FxHashMap, FxHashSet};

use super::lexer::{Token, TokenKind};
use crate::error::HirError;
use crate::graph;
use crate::ir::{
    AttrRef, BinaryOpKind, Block, BlockId, ClassDef, CompareKind, CompareOp, CompileMode,
    FieldRef, Function, Instr, InstrKind, SeqKind, Slot, Terminator, ValueId,
};
use crate::types::{Const, Type, TypeKind};
use crate::verify;

/// Largest `vN` a definition may use. The value-type table is indexed by
/// value number, so a huge id would size it accordingly.
const MAX_VALUE_NUMBER: u32 = 1 << 16;

pub(super) struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    func: Function,
    defined: FxHashSet<ValueId>,
    /// Every value operand, with the line it appears on.
    uses: Vec<(usize, ValueId)>,
    /// Every label reference, with the line it appears on.
    label_refs: Vec<(usize, u32)>,
    /// Phi instructions: block, position in body, line.
    phis: Vec<(BlockId, usize, usize)>,
}

impl Parser {
    pub(super) fn new(tokens: Vec<Token>) -> Self {
        Parser {
            tokens,
            pos: 0,
            func: Function::new("", CompileMode::Dynamic),
            defined: FxHashSet::default(),
            uses: Vec::new(),
            label_refs: Vec::new(),
            phis: Vec::new(),
        }
    }

    pub(super) fn parse(mut self) -> Result<Function, HirError> {
        self.header()?;
        while self.peek_word() == Some("class") {
            self.class()?;
        }
        while self.peek_word() == Some("bb") {
            self.block()?;
        }
        self.expect_punct('}')?;
        if let Some(tok) = self.tokens.get(self.pos) {
            return Err(HirError::malformed(
                tok.line,
                "unexpected text after end of function",
            ));
        }
        if self.func.blocks.is_empty() {
            return Err(HirError::malformed(self.last_line(), "function has no blocks"));
        }
        self.resolve_labels()?;
        self.check_uses()?;
        self.check_phis()?;
        if self.func.ssa {
            verify::verify(&self.func)?;
        }
        Ok(self.func)
    }

    // ── Function structure ──────────────────────────────────────

    fn header(&mut self) -> Result<(), HirError> {
        self.expect_word("fun")?;
        let (name, _) = self.word()?;
        self.func.name = name;
        loop {
            match self.peek_word() {
                Some("static") => {
                    self.pos += 1;
                    self.func.mode = CompileMode::Static;
                }
                Some("nonssa") => {
                    self.pos += 1;
                    self.func.ssa = false;
                }
                _ => break,
            }
        }
        self.expect_punct('{')
    }

    fn class(&mut self) -> Result<(), HirError> {
        self.expect_word("class")?;
        let (name, line) = self.word()?;
        if self.func.class(&name).is_some() {
            return Err(HirError::malformed(line, format!("class {name} declared twice")));
        }
        let mut class = ClassDef::new(name);
        if self.eat_punct('(') {
            class.base = Some(self.word()?.0);
            self.expect_punct(')')?;
        }
        self.expect_punct('{')?;
        while !self.eat_punct('}') {
            let (kind, line) = self.word()?;
            match kind.as_str() {
                "slot" => {
                    let name = self.word()?.0;
                    self.expect_punct(':')?;
                    let ty = self.ty()?;
                    self.expect_punct('@')?;
                    let offset = self.number()?;
                    class.slots.push(Slot { name, ty, offset });
                }
                "method" => class.methods.push(self.word()?.0),
                other => {
                    return Err(HirError::malformed(
                        line,
                        format!("expected `slot` or `method`, found `{other}`"),
                    ));
                }
            }
        }
        self.func.classes.push(class);
        Ok(())
    }

    fn block(&mut self) -> Result<(), HirError> {
        self.expect_word("bb")?;
        let line = self.line();
        let label: u32 = self.number()?;
        if self.func.blocks.iter().any(|b| b.label == label) {
            return Err(HirError::malformed(line, format!("duplicate block bb {label}")));
        }
        // The predecessor list is derived information; skip it.
        if self.eat_punct('(') {
            self.expect_word("preds")?;
            while !self.eat_punct(')') {
                self.next()?;
            }
        }
        self.expect_punct('{')?;

        let id = BlockId::new(u32::try_from(self.func.blocks.len()).unwrap_or(u32::MAX));
        let mut body: Vec<Instr> = Vec::new();
        let terminator = loop {
            let line = self.line();
            if let Some(dst) = self.peek_value_def() {
                if dst.raw() > MAX_VALUE_NUMBER {
                    return Err(HirError::malformed(
                        line,
                        format!("{dst} exceeds the largest value number v{MAX_VALUE_NUMBER}"),
                    ));
                }
                self.pos += 1;
                let annotation = if self.eat_punct(':') {
                    Some(self.ty()?)
                } else {
                    None
                };
                self.expect_punct('=')?;
                let instr = self.instr(Some(dst), line)?;
                self.define(dst, line)?;
                let ty = match annotation {
                    Some(ty) => ty,
                    None => match instr.kind.natural_type() {
                        Some(ty) => ty,
                        None => instr
                            .kind
                            .operands()
                            .first()
                            .map_or(Type::OBJECT, |src| self.func.value_type(*src).clone()),
                    },
                };
                self.func.set_value_type(dst, ty);
                self.push_instr(id, &mut body, instr, line)?;
                continue;
            }

            let (opcode, line) = self.word()?;
            match opcode.as_str() {
                "Branch" => {
                    self.expect_punct('<')?;
                    let target = self.label()?;
                    self.expect_punct('>')?;
                    break Terminator::Branch { target };
                }
                "CondBranch" => {
                    self.expect_punct('<')?;
                    let if_true = self.label()?;
                    self.expect_punct(',')?;
                    let if_false = self.label()?;
                    self.expect_punct('>')?;
                    let cond = self.operand(line)?;
                    break Terminator::CondBranch {
                        cond,
                        if_true,
                        if_false,
                    };
                }
                "Return" => {
                    let value = self.operand(line)?;
                    break Terminator::Return { value };
                }
                "Unreachable" => break Terminator::Unreachable,
                _ => {
                    self.pos -= 1;
                    let instr = self.instr(None, line)?;
                    self.push_instr(id, &mut body, instr, line)?;
                }
            }
        };
        self.expect_punct('}')?;

        self.func.blocks.push(Block {
            label,
            body,
            terminator,
        });
        Ok(())
    }

    fn push_instr(
        &mut self,
        block: BlockId,
        body: &mut Vec<Instr>,
        instr: Instr,
        line: usize,
    ) -> Result<(), HirError> {
        if instr.kind.is_phi() {
            if body.iter().any(|i| !i.kind.is_phi()) {
                return Err(HirError::malformed(
                    line,
                    "Phi must precede every non-phi instruction in its block",
                ));
            }
            self.phis.push((block, body.len(), line));
        }
        body.push(instr);
        Ok(())
    }

    fn define(&mut self, value: ValueId, line: usize) -> Result<(), HirError> {
        if !self.defined.insert(value) && self.func.ssa {
            return Err(HirError::malformed(line, format!("{value} is defined twice")));
        }
        Ok(())
    }

    // ── Instructions ────────────────────────────────────────────

    /// Opcode, immediates, operands and unwind list of one instruction.
    fn instr(&mut self, dst: Option<ValueId>, line: usize) -> Result<Instr, HirError> {
        let (opcode, _) = self.word()?;
        let need_dst = || {
            dst.ok_or_else(|| HirError::malformed(line, format!("{opcode} must define a value")))
        };
        let kind = match opcode.as_str() {
            "LoadArg" => {
                self.expect_punct('<')?;
                let index = self.number()?;
                self.expect_punct(';')?;
                let name = self.string()?;
                self.expect_punct('>')?;
                InstrKind::LoadArg {
                    dst: need_dst()?,
                    index,
                    name,
                }
            }
            "LoadConst" => {
                self.expect_punct('<')?;
                let ty = self.ty()?;
                self.expect_punct('>')?;
                InstrKind::LoadConst {
                    dst: need_dst()?,
                    ty,
                }
            }
            "LoadGlobal" => {
                let attr = self.attr_ref()?;
                InstrKind::LoadGlobal {
                    dst: need_dst()?,
                    attr,
                }
            }
            "LoadAttr" | "LoadMethod" => {
                let attr = self.attr_ref()?;
                let obj = self.operand(line)?;
                let dst = need_dst()?;
                if opcode == "LoadAttr" {
                    InstrKind::LoadAttr { dst, obj, attr }
                } else {
                    InstrKind::LoadMethod { dst, obj, attr }
                }
            }
            "StoreAttr" => {
                let attr = self.attr_ref()?;
                let obj = self.operand(line)?;
                let value = self.operand(line)?;
                InstrKind::StoreAttr { obj, value, attr }
            }
            "LoadField" => {
                self.expect_punct('<')?;
                let offset = self.number()?;
                self.expect_punct(';')?;
                let name = self.string()?;
                self.expect_punct(',')?;
                let ty = self.ty()?;
                self.expect_punct('>')?;
                let obj = self.operand(line)?;
                InstrKind::LoadField {
                    dst: need_dst()?,
                    obj,
                    field: FieldRef { offset, name },
                    ty,
                }
            }
            "StoreField" => {
                self.expect_punct('<')?;
                let offset = self.number()?;
                self.expect_punct(';')?;
                let name = self.string()?;
                self.expect_punct('>')?;
                let obj = self.operand(line)?;
                let value = self.operand(line)?;
                InstrKind::StoreField {
                    obj,
                    value,
                    field: FieldRef { offset, name },
                }
            }
            "LoadMethodSuper" | "LoadAttrSuper" => {
                let attr = self.attr_ref()?;
                let class = self.operand(line)?;
                let receiver = self.operand(line)?;
                let dst = need_dst()?;
                if opcode == "LoadMethodSuper" {
                    InstrKind::LoadMethodSuper {
                        dst,
                        class,
                        receiver,
                        attr,
                    }
                } else {
                    InstrKind::LoadAttrSuper {
                        dst,
                        class,
                        receiver,
                        attr,
                    }
                }
            }
            "CallMethod" => {
                let n = self.count()?;
                let method = self.operand(line)?;
                let receiver = self.operand(line)?;
                let args = self.operands(n, line)?;
                InstrKind::CallMethod {
                    dst: need_dst()?,
                    method,
                    receiver,
                    args,
                }
            }
            "VectorCall" => {
                let n = self.count()?;
                let func = self.operand(line)?;
                let args = self.operands(n, line)?;
                InstrKind::VectorCall {
                    dst: need_dst()?,
                    func,
                    args,
                }
            }
            "InvokeStatic" => {
                self.expect_punct('<')?;
                let target = self.string()?;
                self.expect_punct(',')?;
                let n = self.number()?;
                self.expect_punct('>')?;
                let args = self.operands(n, line)?;
                InstrKind::InvokeStatic {
                    dst: need_dst()?,
                    target,
                    args,
                }
            }
            "BinaryOp" | "IntBinaryOp" => {
                self.expect_punct('<')?;
                let (name, op_line) = self.word()?;
                let op = BinaryOpKind::from_name(&name).ok_or_else(|| {
                    HirError::malformed(op_line, format!("unknown binary operator {name}"))
                })?;
                self.expect_punct('>')?;
                let left = self.operand(line)?;
                let right = self.operand(line)?;
                let dst = need_dst()?;
                if opcode == "BinaryOp" {
                    InstrKind::BinaryOp {
                        dst,
                        op,
                        left,
                        right,
                    }
                } else {
                    InstrKind::IntBinaryOp {
                        dst,
                        op,
                        left,
                        right,
                    }
                }
            }
            "Compare" | "LongCompare" | "UnicodeCompare" | "PrimitiveCompare" => {
                let kind = match opcode.as_str() {
                    "Compare" => CompareKind::Generic,
                    "LongCompare" => CompareKind::Long,
                    "UnicodeCompare" => CompareKind::Unicode,
                    _ => CompareKind::Primitive,
                };
                self.expect_punct('<')?;
                let (name, op_line) = self.word()?;
                let op = CompareOp::from_name(&name).ok_or_else(|| {
                    HirError::malformed(op_line, format!("unknown comparison {name}"))
                })?;
                self.expect_punct('>')?;
                let left = self.operand(line)?;
                let right = self.operand(line)?;
                InstrKind::Compare {
                    dst: need_dst()?,
                    kind,
                    op,
                    left,
                    right,
                }
            }
            "IsTruthy" => {
                let value = self.operand(line)?;
                InstrKind::IsTruthy {
                    dst: need_dst()?,
                    value,
                }
            }
            "GuardType" => {
                self.expect_punct('<')?;
                let ty = self.ty()?;
                self.expect_punct('>')?;
                let value = self.operand(line)?;
                InstrKind::GuardType {
                    dst: need_dst()?,
                    ty,
                    value,
                }
            }
            "Assign" => {
                let src = self.operand(line)?;
                InstrKind::Assign {
                    dst: need_dst()?,
                    src,
                }
            }
            "MakeList" | "MakeTuple" => {
                let n = self.count()?;
                let items = self.operands(n, line)?;
                let kind = if opcode == "MakeList" {
                    SeqKind::List
                } else {
                    SeqKind::Tuple
                };
                InstrKind::MakeSeq {
                    dst: need_dst()?,
                    kind,
                    items,
                }
            }
            "Phi" => {
                self.expect_punct('<')?;
                let mut labels = vec![self.label()?];
                while self.eat_punct(',') {
                    labels.push(self.label()?);
                }
                self.expect_punct('>')?;
                let values = self.operands(labels.len(), line)?;
                InstrKind::Phi {
                    dst: need_dst()?,
                    inputs: labels.into_iter().zip(values).collect(),
                }
            }
            "Incref" => InstrKind::Incref {
                value: self.operand(line)?,
            },
            "Decref" => InstrKind::Decref {
                value: self.operand(line)?,
            },
            other => {
                return Err(HirError::malformed(line, format!("unknown opcode {other}")));
            }
        };
        if dst.is_some() && kind.dst().is_none() {
            return Err(HirError::malformed(
                line,
                format!("{} does not define a value", kind.opcode()),
            ));
        }

        let mut instr = Instr::new(kind);
        if self.eat_punct('{') {
            self.expect_word("Unwind")?;
            while !self.eat_punct('}') {
                let value = self.value()?;
                self.uses.push((line, value));
                instr.unwind.push(value);
            }
        }
        Ok(instr)
    }

    /// `<idx; "name">`
    fn attr_ref(&mut self) -> Result<AttrRef, HirError> {
        self.expect_punct('<')?;
        let index = self.number()?;
        self.expect_punct(';')?;
        let name = self.string()?;
        self.expect_punct('>')?;
        Ok(AttrRef { index, name })
    }

    /// `<n>`
    fn count(&mut self) -> Result<usize, HirError> {
        self.expect_punct('<')?;
        let n = self.number()?;
        self.expect_punct('>')?;
        Ok(n)
    }

    /// A value operand, which must be on the instruction's line.
    fn operand(&mut self, line: usize) -> Result<ValueId, HirError> {
        if self.line() != line || self.peek_value().is_none() {
            return Err(HirError::malformed(line, "missing operand"));
        }
        let value = self.value()?;
        self.uses.push((line, value));
        Ok(value)
    }

    fn operands(&mut self, n: usize, line: usize) -> Result<Vec<ValueId>, HirError> {
        (0..n).map(|_| self.operand(line)).collect()
    }

    fn label(&mut self) -> Result<BlockId, HirError> {
        let line = self.line();
        let label: u32 = self.number()?;
        self.label_refs.push((line, label));
        Ok(BlockId::new(label))
    }

    // ── Types ───────────────────────────────────────────────────

    fn ty(&mut self) -> Result<Type, HirError> {
        let (keyword, line) = self.word()?;
        if keyword == "User" {
            self.expect_punct('[')?;
            let class = self.word()?.0;
            self.expect_punct(']')?;
            return Ok(Type::user(class));
        }
        let kind = TypeKind::from_keyword(&keyword)
            .ok_or_else(|| HirError::malformed(line, format!("unknown type {keyword}")))?;
        if !self.eat_punct('[') {
            return Ok(Type::of(kind));
        }
        let constant = match kind {
            TypeKind::Long => Const::Long(self.number()?),
            TypeKind::CInt64 => Const::CInt64(self.number()?),
            TypeKind::Bool => match self.word()? {
                (w, _) if w == "True" => Const::Bool(true),
                (w, _) if w == "False" => Const::Bool(false),
                (w, l) => return Err(HirError::malformed(l, format!("invalid Bool constant {w}"))),
            },
            TypeKind::CBool => match self.word()? {
                (w, _) if w == "true" => Const::CBool(true),
                (w, _) if w == "false" => Const::CBool(false),
                (w, l) => {
                    return Err(HirError::malformed(l, format!("invalid CBool constant {w}")));
                }
            },
            TypeKind::Str => Const::Str(self.string()?),
            TypeKind::Func => Const::Func(self.string()?),
            TypeKind::Type => Const::Class(self.word()?.0),
            TypeKind::Object => {
                let (w, l) = self.word()?;
                let addr = w
                    .strip_prefix("0x")
                    .and_then(|hex| u64::from_str_radix(hex, 16).ok())
                    .ok_or_else(|| HirError::malformed(l, format!("invalid pointer {w}")))?;
                Const::Pointer(addr)
            }
            _ => {
                return Err(HirError::malformed(
                    line,
                    format!("type {keyword} cannot carry a constant"),
                ));
            }
        };
        self.expect_punct(']')?;
        Ok(Type::constant(constant))
    }

    // ── Post-parse checks ───────────────────────────────────────

    fn resolve_labels(&mut self) -> Result<(), HirError> {
        let index: FxHashMap<u32, BlockId> = self
            .func
            .block_ids()
            .map(|id| (self.func.block(id).label, id))
            .collect();
        if let Some(&(line, label)) = self.label_refs.iter().find(|(_, l)| !index.contains_key(l)) {
            return Err(HirError::malformed(
                line,
                format!("reference to undefined block bb {label}"),
            ));
        }
        let remap = |b: &mut BlockId| {
            if let Some(&id) = index.get(&b.raw()) {
                *b = id;
            }
        };
        for block in &mut self.func.blocks {
            block.terminator.for_each_target_mut(remap);
            for instr in &mut block.body {
                if let InstrKind::Phi { inputs, .. } = &mut instr.kind {
                    for (pred, _) in inputs {
                        remap(pred);
                    }
                }
            }
        }
        Ok(())
    }

    fn check_uses(&self) -> Result<(), HirError> {
        match self.uses.iter().find(|(_, v)| !self.defined.contains(v)) {
            Some(&(line, value)) => Err(HirError::UndefinedValue { line, value }),
            None => Ok(()),
        }
    }

    fn check_phis(&self) -> Result<(), HirError> {
        let preds = graph::predecessors(&self.func);
        for &(block, index, line) in &self.phis {
            let InstrKind::Phi { inputs, .. } = &self.func.block(block).body[index].kind else {
                continue;
            };
            let block_preds = &preds[block.index()];
            if inputs.len() != block_preds.len() {
                return Err(HirError::malformed(
                    line,
                    format!(
                        "Phi has {} inputs but bb {} has {} predecessors",
                        inputs.len(),
                        self.func.block(block).label,
                        block_preds.len()
                    ),
                ));
            }
            for (i, (pred, _)) in inputs.iter().enumerate() {
                if !block_preds.contains(pred) || inputs[..i].iter().any(|(p, _)| p == pred) {
                    return Err(HirError::malformed(
                        line,
                        format!(
                            "Phi input from bb {}, which is not a distinct predecessor",
                            self.func.block(*pred).label
                        ),
                    ));
                }
            }
        }
        Ok(())
    }

    // ── Token helpers ───────────────────────────────────────────

    fn last_line(&self) -> usize {
        self.tokens.last().map_or(1, |t| t.line)
    }

    /// Line of the next token.
    fn line(&self) -> usize {
        self.tokens
            .get(self.pos)
            .map_or_else(|| self.last_line(), |t| t.line)
    }

    fn next(&mut self) -> Result<Token, HirError> {
        let tok = self
            .tokens
            .get(self.pos)
            .cloned()
            .ok_or_else(|| HirError::malformed(self.last_line(), "unexpected end of input"))?;
        self.pos += 1;
        Ok(tok)
    }

    fn peek_word(&self) -> Option<&str> {
        match self.tokens.get(self.pos) {
            Some(Token {
                kind: TokenKind::Word(w),
                ..
            }) => Some(w),
            _ => None,
        }
    }

    fn peek_value(&self) -> Option<ValueId> {
        self.peek_word().and_then(parse_value)
    }

    /// A value followed by `:` or `=` starts a defining instruction.
    fn peek_value_def(&self) -> Option<ValueId> {
        let value = self.peek_value()?;
        match self.tokens.get(self.pos + 1) {
            Some(Token {
                kind: TokenKind::Punct(':' | '='),
                ..
            }) => Some(value),
            _ => None,
        }
    }

    fn eat_punct(&mut self, c: char) -> bool {
        match self.tokens.get(self.pos) {
            Some(Token {
                kind: TokenKind::Punct(p),
                ..
            }) if *p == c => {
                self.pos += 1;
                true
            }
            _ => false,
        }
    }

    fn expect_punct(&mut self, c: char) -> Result<(), HirError> {
        let tok = self.next()?;
        match tok.kind {
            TokenKind::Punct(p) if p == c => Ok(()),
            other => Err(HirError::malformed(
                tok.line,
                format!("expected `{c}`, found {}", describe(&other)),
            )),
        }
    }

    fn word(&mut self) -> Result<(String, usize), HirError> {
        let tok = self.next()?;
        match tok.kind {
            TokenKind::Word(w) => Ok((w, tok.line)),
            other => Err(HirError::malformed(
                tok.line,
                format!("expected a word, found {}", describe(&other)),
            )),
        }
    }

    fn expect_word(&mut self, expected: &str) -> Result<(), HirError> {
        let (w, line) = self.word()?;
        if w == expected {
            Ok(())
        } else {
            Err(HirError::malformed(
                line,
                format!("expected `{expected}`, found `{w}`"),
            ))
        }
    }

    fn string(&mut self) -> Result<String, HirError> {
        let tok = self.next()?;
        match tok.kind {
            TokenKind::Str(s) => Ok(s),
            other => Err(HirError::malformed(
                tok.line,
                format!("expected a string, found {}", describe(&other)),
            )),
        }
    }

    fn number<T: std::str::FromStr>(&mut self) -> Result<T, HirError> {
        let (w, line) = self.word()?;
        w.parse()
            .map_err(|_| HirError::malformed(line, format!("expected a number, found `{w}`")))
    }

    fn value(&mut self) -> Result<ValueId, HirError> {
        let (w, line) = self.word()?;
        parse_value(&w)
            .ok_or_else(|| HirError::malformed(line, format!("expected a value, found `{w}`")))
    }
}

/// `vN` -> `ValueId(N)`.
fn parse_value(word: &str) -> Option<ValueId> {
    let digits = word.strip_prefix('v')?;
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok().map(ValueId::new)
}

fn describe(kind: &TokenKind) -> String {
    match kind {
        TokenKind::Word(w) => format!("`{w}`"),
        TokenKind::Str(s) => format!("string {s:?}"),
        TokenKind::Punct(c) => format!("`{c}`"),
    }
}
