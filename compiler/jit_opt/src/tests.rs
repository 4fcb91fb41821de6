use pretty_assertions::assert_eq;

use jit_hir::print_function;

use super::*;
use crate::test_helpers::{b, parse, run_on};

const INPUT: &str = "fun f {
  bb 0 {
    v0:Object = LoadArg<0; \"x\">
    Return v0
  }
}
";

/// Mutates the function, then fails.
struct Vandal;

impl Pass for Vandal {
    fn name(&self) -> &'static str {
        "Vandal"
    }

    fn run(&mut self, func: &mut Function) -> Result<(), PassError> {
        func.blocks.clear();
        func.name = "wrecked".into();
        Err(PassError::internal("Vandal", "gave up"))
    }
}

/// Static-only pass that records whether it ran.
struct StaticProbe(bool);

impl Pass for StaticProbe {
    fn name(&self) -> &'static str {
        "StaticProbe"
    }

    fn requires_static(&self) -> bool {
        true
    }

    fn run(&mut self, _func: &mut Function) -> Result<(), PassError> {
        self.0 = true;
        Ok(())
    }
}

#[test]
fn failed_pass_leaves_input_untouched() {
    let mut func = parse(INPUT);
    let err = run_pass(&mut Vandal, &mut func).unwrap_err();
    assert_eq!(err.to_string(), "Vandal: gave up");
    assert_eq!(print_function(&func), INPUT);
}

#[test]
fn static_only_pass_is_skipped_on_dynamic_functions() {
    let mut probe = StaticProbe(false);
    let mut func = parse(INPUT);
    assert_eq!(run_pass(&mut probe, &mut func), Ok(PassOutcome::Skipped));
    assert!(!probe.0);

    let mut func = parse(&INPUT.replacen("fun f {", "fun f static {", 1));
    assert_eq!(run_pass(&mut probe, &mut func), Ok(PassOutcome::Applied));
    assert!(probe.0);
}

#[test]
fn ssa_precondition_checks_well_formedness() {
    let mut func = parse(
        "fun f {
  bb 0 {
    v0:Object = LoadArg<0; \"x\">
    Branch<1>
  }
  bb 1 (preds 0) {
    v1:Object = Phi<0> v0
    Return v1
  }
}
",
    );
    // Break the phi so it names a block that is not a predecessor.
    if let jit_hir::InstrKind::Phi { inputs, .. } = &mut func.blocks[1].body[0].kind {
        inputs[0].0 = b(1);
    }
    let err = run_pass(&mut Simplify, &mut func).unwrap_err();
    assert!(err.to_string().starts_with("Simplify: precondition violated: malformed SSA"));
}

#[test]
fn passes_without_preconditions_accept_anything() {
    assert_eq!(run_on(&mut DeadCodeElimination, INPUT), INPUT);
    assert_eq!(Simplify.preconditions(), Preconditions::SSA | Preconditions::NO_REFCOUNTS);
    assert_eq!(DeadCodeElimination.preconditions(), Preconditions::empty());
}
