use std::io::Write;
use std::path::Path;

use pretty_assertions::assert_eq;

use super::*;

const TWO_CASES: &str = "SimplifyTest
---
DeadCodeElimination
Simplify
---
FoldsAddition
---
# HIR
fun f {
  bb 0 {
    v0:Long[1] = LoadConst<Long[1]>
    Return v0
  }
}
---
fun f {
  bb 0 {
    v0:Long[1] = LoadConst<Long[1]>
    Return v0
  }
}
---

@disabled   LowersSource
---
def f(x):
    return x + 1
---
fun f {
}
---
";

fn parse(name: &str, text: &str) -> Result<TestSuite, FixtureError> {
    parse_suite(Path::new(name), text)
}

fn malformed_line(text: &str) -> usize {
    match parse("bad_test.txt", text) {
        Err(FixtureError::Malformed { line, .. }) => line,
        other => panic!("expected a malformed fixture, got {other:?}"),
    }
}

#[test]
fn parses_header_and_cases() {
    let suite = parse("simplify_test.txt", TWO_CASES).unwrap();
    assert_eq!(suite.name, "SimplifyTest");
    assert_eq!(suite.passes, vec!["DeadCodeElimination", "Simplify"]);
    assert_eq!(suite.mode, CompileMode::Dynamic);
    assert_eq!(suite.cases.len(), 2);

    let first = &suite.cases[0];
    assert_eq!(first.name, "FoldsAddition");
    assert!(first.is_hir);
    assert!(!first.disabled);
    assert_eq!(first.line, 6);
    assert!(first.input.starts_with("fun f {\n"));
    assert!(!first.input.contains(HIR_MARKER));
    assert_eq!(first.input, first.expected);
}

#[test]
fn disabled_cases_are_loaded_but_flagged() {
    let suite = parse("simplify_test.txt", TWO_CASES).unwrap();
    let second = &suite.cases[1];
    assert_eq!(second.name, "LowersSource");
    assert!(second.disabled);
    assert!(!second.is_hir);
    assert_eq!(second.input, "def f(x):\n    return x + 1\n");
    assert_eq!(suite.disabled_count(), 1);
    assert_eq!(suite.enabled_cases().count(), 1);
    assert_eq!(suite.qualified_name(second), "SimplifyTest.LowersSource");
}

#[test]
fn empty_pass_list_is_a_builder_only_suite() {
    let suite = parse(
        "builder_test.txt",
        "BuilderTest\n---\n---\nEmpty\n---\n# HIR\n---\n---\n",
    )
    .unwrap();
    assert!(suite.passes.is_empty());
    assert_eq!(suite.cases[0].input, "");
    assert_eq!(suite.cases[0].expected, "");
}

#[test]
fn suite_without_cases_is_accepted() {
    let suite = parse("none_test.txt", "\n\nNothing\n---\nSimplify\n---\n\n").unwrap();
    assert_eq!(suite.name, "Nothing");
    assert!(suite.cases.is_empty());
}

#[test]
fn static_suffix_selects_static_mode() {
    assert_eq!(
        mode_for_path(Path::new("dir/load_attr_static_test.txt")),
        CompileMode::Static
    );
    assert_eq!(
        mode_for_path(Path::new("dir/static_load_attr_test.txt")),
        CompileMode::Dynamic
    );
}

#[test]
fn blank_lines_inside_blocks_are_kept() {
    let suite = parse("keep_test.txt", "S\n---\n---\nC\n---\na\n\nb\n---\n\n---\n").unwrap();
    assert_eq!(suite.cases[0].input, "a\n\nb\n");
    assert_eq!(suite.cases[0].expected, "\n");
}

#[test]
fn missing_suite_name_is_malformed() {
    assert_eq!(malformed_line(""), 1);
    assert_eq!(malformed_line("\n---\n"), 2);
}

#[test]
fn missing_header_delimiter_is_malformed() {
    assert_eq!(malformed_line("Suite\nSimplify\n---\n"), 2);
}

#[test]
fn unterminated_pass_list_is_malformed() {
    assert_eq!(malformed_line("Suite\n---\nSimplify\n"), 3);
}

#[test]
fn case_without_delimiter_after_name_is_malformed() {
    assert_eq!(malformed_line("Suite\n---\n---\nCase\nfun f {\n"), 5);
}

#[test]
fn unterminated_expected_block_is_malformed() {
    let err = parse("cut_test.txt", "Suite\n---\n---\nCase\n---\n# HIR\n---\nfun f {\n").unwrap_err();
    assert_eq!(err.path(), Path::new("cut_test.txt"));
    let message = err.to_string();
    assert!(message.contains("unterminated expected output"), "{message}");
    assert!(message.starts_with("[cut_test.txt]"), "{message}");
}

#[test]
fn disabled_marker_alone_is_malformed() {
    assert_eq!(malformed_line("Suite\n---\n---\n@disabled\n---\n---\n---\n"), 4);
}

#[test]
fn load_reads_from_disk() {
    let mut file = tempfile::Builder::new()
        .suffix("_static_test.txt")
        .tempfile()
        .unwrap();
    file.write_all(TWO_CASES.as_bytes()).unwrap();
    let suite = load_suite(file.path()).unwrap();
    assert_eq!(suite.mode, CompileMode::Static);
    assert_eq!(suite.path, file.path());
    assert_eq!(suite.cases.len(), 2);
}

#[test]
fn load_reports_missing_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("absent_test.txt");
    let err = load_suite(&path).unwrap_err();
    assert!(matches!(err, FixtureError::Io { .. }));
    assert_eq!(err.path(), path);
}
