use pretty_assertions::assert_eq;

use super::*;
use crate::test_helpers::parse;

#[test]
fn builtin_names_are_registered() {
    assert_eq!(
        PassRegistry::new().names(),
        vec![
            "CallOptimization",
            "DeadCodeElimination",
            "DynamicComparisonElimination",
            "LoadAttrSpecialization",
            "PhiElimination",
            "RefcountInsertion",
            "Simplify",
            "SuperAccessResolution",
        ]
    );
}

#[test]
fn every_factory_builds_the_named_pass() {
    let registry = PassRegistry::new();
    for name in registry.names() {
        assert_eq!(registry.make_pass(name).unwrap().name(), name);
    }
}

#[test]
fn unknown_name_is_reported_verbatim() {
    let registry = PassRegistry::new();
    let err = registry
        .validate(["Simplify", "Frobnicate", "AlsoBad"])
        .unwrap_err();
    assert_eq!(
        err,
        RegistryError::UnknownPassName {
            name: "Frobnicate".into()
        }
    );
    assert_eq!(err.to_string(), "Unknown pass name Frobnicate");
    assert!(registry.make_pass("simplify").is_err());
}

#[test]
fn pipeline_runs_in_order() {
    let registry = PassRegistry::new();
    let mut pipeline = registry
        .build_pipeline(["Simplify", "RefcountInsertion"])
        .unwrap();
    assert_eq!(pipeline.names(), vec!["Simplify", "RefcountInsertion"]);
    assert_eq!(pipeline.len(), 2);

    let mut func = parse(
        "fun f {
  bb 0 {
    v0:Object = LoadArg<0; \"x\">
    v1:Object = Assign v0
    Return v1
  }
}
",
    );
    pipeline.run(&mut func).unwrap();
    assert_eq!(
        jit_hir::print_function(&func),
        "fun f {
  bb 0 {
    v0:Object = LoadArg<0; \"x\">
    Incref v0
    Return v0
  }
}
"
    );
}

#[test]
fn pipeline_stops_at_first_failure() {
    let registry = PassRegistry::new();
    let mut pipeline = registry
        .build_pipeline(["RefcountInsertion", "Simplify"])
        .unwrap();
    let mut func = parse(
        "fun f {
  bb 0 {
    v0:Object = LoadArg<0; \"x\">
    Return v0
  }
}
",
    );
    let err = pipeline.run(&mut func).unwrap_err();
    assert_eq!(err.pass(), "Simplify");
}

#[test]
fn custom_registrations_replace_builtins() {
    let mut registry = PassRegistry::empty();
    assert!(registry.names().is_empty());
    registry.register("Simplify", || Box::new(crate::DeadCodeElimination));
    assert_eq!(registry.make_pass("Simplify").unwrap().name(), "DeadCodeElimination");
    assert!(PassRegistry::default().contains("PhiElimination"));
}
