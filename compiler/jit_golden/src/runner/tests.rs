use std::fs;
use std::path::Path;

use jit_hir::CompileMode;
use pretty_assertions::assert_eq;

use super::*;
use crate::fixture::parse_suite;
use crate::frontend::UnavailableFrontend;

const FOLD_INPUT: &str = "fun f {
  bb 0 {
    v0:Long[-7] = LoadConst<Long[-7]>
    v1:Long[2] = LoadConst<Long[2]>
    v2:Object = BinaryOp<FloorDivide> v0 v1
    v3:Object = BinaryOp<Modulo> v0 v1
    v4:Tuple = MakeTuple<2> v2 v3
    Return v4
  }
}
";

const FOLD_EXPECTED: &str = "fun f {
  bb 0 {
    v2:Long[-4] = LoadConst<Long[-4]>
    v3:Long[1] = LoadConst<Long[1]>
    v4:Tuple = MakeTuple<2> v2 v3
    Return v4
  }
}
";

/// Source for [`HirFrontend`]: HIR text without a mode in its header.
const CLASS_SOURCE: &str = "fun f {
  class Point {
    slot y: Object @24
  }
  bb 0 {
    v0:User[Point] = LoadArg<0; \"self\">
    v1:Object = LoadAttr<0; \"y\"> v0
    Return v1
  }
}
";

/// Treats source text as HIR and stamps the requested mode on it.
struct HirFrontend;

impl Frontend for HirFrontend {
    fn lower(&self, source: &str, mode: CompileMode) -> Result<Function, LoweringError> {
        let mut func = parse_function(source).map_err(|e| LoweringError::new(e.to_string()))?;
        func.mode = mode;
        Ok(func)
    }
}

fn fixture(passes: &[&str], cases: &[(&str, &str, &str)]) -> String {
    let mut text = format!("RunnerTest\n---\n{}\n---\n", passes.join("\n"));
    for (name, input, expected) in cases {
        text.push_str(&format!("{name}\n---\n{input}---\n{expected}---\n\n"));
    }
    text
}

fn hir(text: &str) -> String {
    format!("# HIR\n{text}")
}

fn suite_at(path: &str, passes: &[&str], cases: &[(&str, &str, &str)]) -> TestSuite {
    parse_suite(Path::new(path), &fixture(passes, cases)).unwrap()
}

fn check(frontend: &dyn Frontend, suite: &TestSuite) -> Result<(), CaseError> {
    check_case(&PassRegistry::new(), frontend, suite, &suite.cases[0])
}

// ── Single cases ────────────────────────────────────────────

#[test]
fn literal_hir_case_passes() {
    let suite = suite_at(
        "fold_test.txt",
        &["DeadCodeElimination", "Simplify"],
        &[("Fold", &hir(FOLD_INPUT), FOLD_EXPECTED)],
    );
    assert!(check(&UnavailableFrontend, &suite).is_ok());
}

#[test]
fn builder_only_suite_round_trips_input() {
    let suite = suite_at("builder_test.txt", &[], &[("Same", &hir(FOLD_INPUT), FOLD_INPUT)]);
    assert_eq!(
        run_case(&PassRegistry::new(), &UnavailableFrontend, &suite, &suite.cases[0]).unwrap(),
        FOLD_INPUT
    );
}

#[test]
fn wrong_expectation_is_a_golden_mismatch() {
    let suite = suite_at(
        "fold_test.txt",
        &["Simplify"],
        &[("Fold", &hir(FOLD_INPUT), FOLD_INPUT)],
    );
    match check(&UnavailableFrontend, &suite) {
        Err(CaseError::GoldenMismatch { diff }) => assert!(!diff.is_empty()),
        other => panic!("expected a golden mismatch, got {other:?}"),
    }
}

#[test]
fn unparsable_hir_is_malformed() {
    let suite = suite_at(
        "bad_test.txt",
        &[],
        &[("Bad", "# HIR\nfun f {\n  bb 0 {\n    Return v3\n  }\n}\n", "")],
    );
    match check(&UnavailableFrontend, &suite) {
        Err(CaseError::MalformedHir(err)) => assert_eq!(err.line(), Some(3)),
        other => panic!("expected malformed HIR, got {other:?}"),
    }
}

#[test]
fn source_case_without_frontend_fails_to_lower() {
    let suite = suite_at("source_test.txt", &[], &[("Src", "def f(): pass\n", "")]);
    let err = check(&UnavailableFrontend, &suite).unwrap_err();
    assert!(matches!(err, CaseError::Lowering(_)));
    assert!(err.to_string().contains("dynamic source"), "{err}");
}

#[test]
fn static_fixture_lowers_in_static_mode() {
    let expected = "fun f static {
  class Point {
    slot y: Object @24
  }
  bb 0 {
    v0:User[Point] = LoadArg<0; \"self\">
    v1:Object = LoadField<24; \"y\", Object> v0
    Return v1
  }
}
";
    let suite = suite_at(
        "attr_static_test.txt",
        &["LoadAttrSpecialization"],
        &[("Slot", CLASS_SOURCE, expected)],
    );
    assert_eq!(suite.mode, CompileMode::Static);
    assert!(check(&HirFrontend, &suite).is_ok());
}

#[test]
fn static_pass_is_a_no_op_in_dynamic_fixture() {
    let suite = suite_at(
        "attr_test.txt",
        &["LoadAttrSpecialization"],
        &[("Slot", CLASS_SOURCE, CLASS_SOURCE)],
    );
    assert!(check(&HirFrontend, &suite).is_ok());
}

#[test]
fn refcount_insertion_twice_is_a_pass_failure() {
    let input = "fun f {
  bb 0 {
    v0:Object = LoadArg<0; \"x\">
    Return v0
  }
}
";
    let suite = suite_at(
        "twice_test.txt",
        &["RefcountInsertion", "RefcountInsertion"],
        &[("Twice", &hir(input), "")],
    );
    match check(&UnavailableFrontend, &suite) {
        Err(CaseError::Pass(err)) => assert_eq!(err.pass(), "RefcountInsertion"),
        other => panic!("expected a pass failure, got {other:?}"),
    }
}

#[test]
fn unvalidated_unknown_pass_fails_the_case() {
    let suite = suite_at("typo_test.txt", &["Simplfy"], &[("Typo", &hir(FOLD_INPUT), "")]);
    assert!(matches!(
        check(&UnavailableFrontend, &suite),
        Err(CaseError::UnknownPass(_))
    ));
}

// ── Setup ───────────────────────────────────────────────────

#[test]
fn validation_reports_the_first_unknown_name() {
    let good = suite_at("good_test.txt", &["Simplify"], &[]);
    let bad = suite_at("dir/bad_test.txt", &["Simplify", "Bogus", "Other"], &[]);
    let err = validate_suites(&PassRegistry::new(), &[good.clone(), bad]).unwrap_err();
    match &err {
        SetupError::UnknownPassName { path, suite, name } => {
            assert_eq!(path, Path::new("dir/bad_test.txt"));
            assert_eq!(suite, "RunnerTest");
            assert_eq!(name, "Bogus");
        }
        other => panic!("expected an unknown pass name, got {other:?}"),
    }
    assert_eq!(err.to_string(), "[dir/bad_test.txt] Unknown pass name Bogus");
    assert!(validate_suites(&PassRegistry::new(), &[good]).is_ok());
}

#[test]
fn empty_path_has_no_fixtures() {
    let dir = tempfile::tempdir().unwrap();
    let err = load_suites(&[dir.path().to_path_buf()]).unwrap_err();
    assert!(matches!(err, SetupError::NoFixtures { .. }));
}

#[test]
fn malformed_fixture_stops_loading() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("a_test.txt"), fixture(&[], &[])).unwrap();
    fs::write(dir.path().join("b_test.txt"), "Broken\n").unwrap();
    let err = load_suites(&[dir.path().to_path_buf()]).unwrap_err();
    match err {
        SetupError::Fixture(err) => assert!(err.path().ends_with("b_test.txt")),
        other => panic!("expected a fixture error, got {other:?}"),
    }
}

// ── Whole runs ──────────────────────────────────────────────

fn mixed_suite() -> TestSuite {
    let disabled = "@disabled Skipped";
    suite_at(
        "mixed_test.txt",
        &["DeadCodeElimination", "Simplify"],
        &[
            ("Good", &hir(FOLD_INPUT), FOLD_EXPECTED),
            ("Wrong", &hir(FOLD_INPUT), FOLD_INPUT),
            (disabled, &hir(FOLD_INPUT), ""),
            ("AlsoGood", &hir(FOLD_EXPECTED), FOLD_EXPECTED),
        ],
    )
}

fn run_with(config: RunnerConfig) -> RunSummary {
    let registry = PassRegistry::new();
    GoldenRunner::new(&registry, &UnavailableFrontend, config).run(&[mixed_suite()])
}

#[test]
fn run_counts_passes_failures_and_disabled() {
    let summary = run_with(RunnerConfig::default());
    assert_eq!(summary.passed, 2);
    assert_eq!(summary.failed, 1);
    assert_eq!(summary.disabled, 1);
    assert_eq!(summary.exit_code(), 1);

    let failures: Vec<_> = summary.failures().map(|(_, r)| r.name.as_str()).collect();
    assert_eq!(failures, vec!["RunnerTest.Wrong"]);
}

#[test]
fn parallel_and_sequential_runs_agree() {
    let parallel = run_with(RunnerConfig::default());
    let sequential = run_with(RunnerConfig {
        parallel: false,
        ..RunnerConfig::default()
    });
    let outcomes = |summary: &RunSummary| -> Vec<(String, bool)> {
        summary.suites[0]
            .results
            .iter()
            .map(|r| (r.name.clone(), r.outcome.is_passed()))
            .collect()
    };
    assert_eq!(outcomes(&parallel), outcomes(&sequential));
    assert_eq!(
        outcomes(&sequential),
        vec![
            ("RunnerTest.Good".to_owned(), true),
            ("RunnerTest.Wrong".to_owned(), false),
            ("RunnerTest.AlsoGood".to_owned(), true),
        ]
    );
}

#[test]
fn filter_selects_by_qualified_name() {
    let summary = run_with(RunnerConfig {
        filter: Some("Test.Good".to_owned()),
        ..RunnerConfig::default()
    });
    assert_eq!(summary.passed, 1);
    assert_eq!(summary.failed, 0);
    assert_eq!(summary.disabled, 0);
    assert_eq!(summary.exit_code(), 0);
}

#[test]
fn oversized_value_number_fails_only_its_case() {
    let huge = "fun f {\n  bb 0 {\n    v3000000000:Object = LoadArg<0; \"x\">\n    Return v3000000000\n  }\n}\n";
    let suite = suite_at(
        "huge_test.txt",
        &["DeadCodeElimination", "Simplify"],
        &[
            ("Huge", &hir(huge), huge),
            ("Good", &hir(FOLD_INPUT), FOLD_EXPECTED),
        ],
    );
    let registry = PassRegistry::new();
    let summary =
        GoldenRunner::new(&registry, &UnavailableFrontend, RunnerConfig::default()).run(&[suite]);
    assert_eq!((summary.passed, summary.failed), (1, 1));
    let (_, failure) = summary.failures().next().unwrap();
    assert_eq!(failure.name, "RunnerTest.Huge");
    assert!(matches!(
        failure.outcome,
        CaseOutcome::Failed(CaseError::MalformedHir(_))
    ));
}

#[test]
fn run_paths_loads_validates_and_runs() {
    let dir = tempfile::tempdir().unwrap();
    let text = fixture(
        &["DeadCodeElimination", "Simplify"],
        &[("Fold", &hir(FOLD_INPUT), FOLD_EXPECTED)],
    );
    fs::write(dir.path().join("fold_test.txt"), text).unwrap();
    let summary = run_paths(
        &PassRegistry::new(),
        &UnavailableFrontend,
        RunnerConfig::default(),
        &[dir.path().to_path_buf()],
    )
    .unwrap();
    assert_eq!(summary.passed, 1);
    assert!(!summary.has_failures());
}

#[test]
fn golden_diff_shows_both_sides() {
    let diff = golden_diff("a\nb\n", "a\nc\n");
    assert!(diff.contains('<'), "{diff}");
    assert!(diff.contains('>'), "{diff}");
}
