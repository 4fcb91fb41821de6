//! Golden tests for HIR passes.
//!
//! This crate provides:
//!
//! - **Fixtures** ([`TestSuite`], [`TestCase`], [`load_suite`]): a suite name,
//!   the passes to run, and cases pairing an input with the expected HIR
//!   text after those passes.
//!
//! - **Discovery** ([`discover_fixtures_in`]): every `*_test.txt` file under
//!   a directory, in path order.
//!
//! - **Execution** ([`GoldenRunner`], [`validate_suites`]): every pass name
//!   is checked before any case runs; cases then run independently, in
//!   parallel by default, and are compared byte-for-byte with their
//!   expected text.
//!
//! Source cases are lowered through a [`Frontend`]. The `jit-golden` binary
//! links none ([`UnavailableFrontend`]), so only literal HIR cases pass there.

mod discovery;
mod fixture;
mod frontend;
mod result;
mod runner;

pub use discovery::{discover_fixtures, discover_fixtures_in, FIXTURE_SUFFIX};
pub use fixture::{
    load_suite, mode_for_path, parse_suite, FixtureError, TestCase, TestSuite, DELIMITER,
    DISABLED_PREFIX, HIR_MARKER, STATIC_SUFFIX,
};
pub use frontend::{Frontend, LoweringError, UnavailableFrontend};
pub use result::{CaseOutcome, CaseResult, RunSummary, SuiteSummary};
pub use runner::{
    check_case, default_fixture_dir, golden_diff, load_suites, run_case, run_paths,
    validate_suites, CaseError, GoldenRunner, RunnerConfig, SetupError,
};
