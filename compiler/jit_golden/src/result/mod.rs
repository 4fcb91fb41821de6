//! Case outcomes and run summaries.

use std::fmt::Write as _;
use std::path::PathBuf;
use std::time::Duration;

use crate::fixture::TestSuite;
use crate::runner::CaseError;

/// Outcome of one enabled case.
#[derive(Clone, Debug)]
pub enum CaseOutcome {
    Passed,
    Failed(CaseError),
}

impl CaseOutcome {
    pub fn is_passed(&self) -> bool {
        matches!(self, CaseOutcome::Passed)
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, CaseOutcome::Failed(_))
    }
}

/// Result of running a single case.
#[derive(Clone, Debug)]
pub struct CaseResult {
    /// `Suite.Case`.
    pub name: String,
    /// Line of the case name in its fixture.
    pub line: usize,
    pub outcome: CaseOutcome,
    pub duration: Duration,
}

/// Results for one fixture file.
#[derive(Clone, Debug, Default)]
pub struct SuiteSummary {
    pub name: String,
    pub path: PathBuf,
    pub results: Vec<CaseResult>,
    pub passed: usize,
    pub failed: usize,
    /// Qualified names of cases that were loaded but not run.
    pub disabled: Vec<String>,
    pub duration: Duration,
}

impl SuiteSummary {
    pub fn new(suite: &TestSuite) -> Self {
        SuiteSummary {
            name: suite.name.clone(),
            path: suite.path.clone(),
            disabled: suite
                .cases
                .iter()
                .filter(|case| case.disabled)
                .map(|case| suite.qualified_name(case))
                .collect(),
            ..Default::default()
        }
    }

    pub fn add_result(&mut self, result: CaseResult) {
        match result.outcome {
            CaseOutcome::Passed => self.passed += 1,
            CaseOutcome::Failed(_) => self.failed += 1,
        }
        self.duration += result.duration;
        self.results.push(result);
    }

    /// Cases that ran.
    pub fn total(&self) -> usize {
        self.passed + self.failed
    }

    pub fn has_failures(&self) -> bool {
        self.failed > 0
    }
}

/// Overall summary of a run.
#[derive(Clone, Debug, Default)]
pub struct RunSummary {
    pub suites: Vec<SuiteSummary>,
    pub passed: usize,
    pub failed: usize,
    pub disabled: usize,
    pub duration: Duration,
}

impl RunSummary {
    pub fn new() -> Self {
        RunSummary::default()
    }

    pub fn add_suite(&mut self, summary: SuiteSummary) {
        self.passed += summary.passed;
        self.failed += summary.failed;
        self.disabled += summary.disabled.len();
        self.suites.push(summary);
    }

    pub fn has_failures(&self) -> bool {
        self.failed > 0
    }

    /// Process exit status for this run.
    pub fn exit_code(&self) -> i32 {
        i32::from(self.has_failures())
    }

    /// Every failure, in run order.
    pub fn failures(&self) -> impl Iterator<Item = (&SuiteSummary, &CaseResult)> {
        self.suites.iter().flat_map(|suite| {
            suite
                .results
                .iter()
                .filter(|result| result.outcome.is_failed())
                .map(move |result| (suite, result))
        })
    }

    /// Human-readable report: one `PASS`/`FAIL` line per case, the error and
    /// diff under each failure, and a closing count. `verbose` adds disabled
    /// cases and per-suite timings.
    pub fn report(&self, verbose: bool) -> String {
        let mut out = String::new();
        for suite in &self.suites {
            if verbose {
                let _ = writeln!(
                    out,
                    "{} ({}): {} cases in {:.2?}",
                    suite.name,
                    suite.path.display(),
                    suite.total(),
                    suite.duration
                );
            }
            for result in &suite.results {
                match &result.outcome {
                    CaseOutcome::Passed => {
                        let _ = writeln!(out, "PASS {}", result.name);
                    }
                    CaseOutcome::Failed(error) => {
                        let _ = writeln!(
                            out,
                            "FAIL {} ({}:{})",
                            result.name,
                            suite.path.display(),
                            result.line
                        );
                        for line in error.to_string().lines() {
                            let _ = writeln!(out, "    {line}");
                        }
                    }
                }
            }
            if verbose {
                for name in &suite.disabled {
                    let _ = writeln!(out, "DISABLED {name}");
                }
            }
        }

        let status = if self.has_failures() { "FAILED" } else { "ok" };
        let _ = writeln!(
            out,
            "\nresult: {status}. {} passed; {} failed; {} disabled; finished in {:.2}s",
            self.passed,
            self.failed,
            self.disabled,
            self.duration.as_secs_f64()
        );
        out
    }
}
