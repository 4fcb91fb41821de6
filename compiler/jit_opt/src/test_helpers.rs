//! Shared test utilities for the passes. Only compiled in test builds.

use jit_hir::{parse_function, print_function, BlockId, Function, InstrKind, ValueId};

use crate::{run_pass, Pass};

/// Shorthand for `ValueId::new(n)`.
pub(crate) fn v(n: u32) -> ValueId {
    ValueId::new(n)
}

/// Shorthand for `BlockId::new(n)`.
pub(crate) fn b(n: u32) -> BlockId {
    BlockId::new(n)
}

/// Parse HIR text, panicking on malformed input.
pub(crate) fn parse(text: &str) -> Function {
    match parse_function(text) {
        Ok(func) => func,
        Err(err) => panic!("bad test HIR: {err}\n{text}"),
    }
}

/// Parse `input`, run `pass` through [`run_pass`], and print the result.
pub(crate) fn run_on(pass: &mut dyn Pass, input: &str) -> String {
    let mut func = parse(input);
    if let Err(err) = run_pass(pass, &mut func) {
        panic!("{} failed: {err}", pass.name());
    }
    print_function(&func)
}

pub(crate) fn count_incref(func: &Function) -> usize {
    count(func, |k| matches!(k, InstrKind::Incref { .. }))
}

pub(crate) fn count_decref(func: &Function) -> usize {
    count(func, |k| matches!(k, InstrKind::Decref { .. }))
}

fn count(func: &Function, pred: impl Fn(&InstrKind) -> bool) -> usize {
    func.blocks
        .iter()
        .flat_map(|b| &b.body)
        .filter(|i| pred(&i.kind))
        .count()
}
