//! Case execution.
//!
//! Setup problems (an unreadable fixture, an unknown pass name) are fatal
//! and surface as [`SetupError`] before any case runs. Everything that
//! goes wrong inside a case is that case's [`CaseError`] and never stops
//! its siblings.

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Instant;

use jit_hir::{parse_function, print_function, Function, HirError};
use jit_opt::{PassError, PassRegistry, RegistryError};
use rayon::prelude::*;
use thiserror::Error;

use crate::discovery::discover_fixtures_in;
use crate::fixture::{load_suite, FixtureError, TestCase, TestSuite};
use crate::frontend::{Frontend, LoweringError};
use crate::result::{CaseOutcome, CaseResult, RunSummary, SuiteSummary};

/// Configuration for the golden runner.
#[derive(Clone, Debug)]
pub struct RunnerConfig {
    /// Only run cases whose `Suite.Case` name contains this substring.
    pub filter: Option<String>,
    /// Run cases on a rayon pool.
    pub parallel: bool,
    /// Report disabled cases and per-suite timings.
    pub verbose: bool,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        RunnerConfig {
            filter: None,
            parallel: true,
            verbose: false,
        }
    }
}

impl RunnerConfig {
    fn selects(&self, qualified_name: &str) -> bool {
        self.filter
            .as_deref()
            .map_or(true, |pattern| qualified_name.contains(pattern))
    }
}

/// A problem with the fixtures themselves. Nothing runs when one occurs.
#[derive(Debug, Error)]
pub enum SetupError {
    #[error(transparent)]
    Fixture(#[from] FixtureError),

    #[error("[{}] Unknown pass name {name}", path.display())]
    UnknownPassName {
        path: PathBuf,
        suite: String,
        name: String,
    },

    #[error("[{}] no fixture files found", path.display())]
    NoFixtures { path: PathBuf },
}

/// Why one case failed.
#[derive(Clone, Debug, Error)]
pub enum CaseError {
    #[error(transparent)]
    Lowering(#[from] LoweringError),

    #[error(transparent)]
    MalformedHir(#[from] HirError),

    #[error("pass failed: {0}")]
    Pass(#[from] PassError),

    /// Only reachable for suites that skipped [`validate_suites`].
    #[error(transparent)]
    UnknownPass(#[from] RegistryError),

    #[error("golden mismatch (< expected, > actual):\n{diff}")]
    GoldenMismatch { diff: String },
}

/// Discover and load every fixture under `paths`, stopping at the first
/// fixture that cannot be loaded.
pub fn load_suites(paths: &[PathBuf]) -> Result<Vec<TestSuite>, SetupError> {
    let mut suites = Vec::new();
    for path in paths {
        let files = discover_fixtures_in(path);
        if files.is_empty() {
            return Err(SetupError::NoFixtures { path: path.clone() });
        }
        for file in files {
            suites.push(load_suite(&file)?);
        }
    }
    tracing::debug!(suites = suites.len(), "fixtures loaded");
    Ok(suites)
}

/// Check every pass name of every suite against `registry`.
pub fn validate_suites(registry: &PassRegistry, suites: &[TestSuite]) -> Result<(), SetupError> {
    for suite in suites {
        registry
            .validate(suite.passes.iter().map(String::as_str))
            .map_err(|RegistryError::UnknownPassName { name }| SetupError::UnknownPassName {
                path: suite.path.clone(),
                suite: suite.name.clone(),
                name,
            })?;
    }
    Ok(())
}

/// Build the starting HIR for `case`, run the suite's passes, and return
/// the printed result.
pub fn run_case(
    registry: &PassRegistry,
    frontend: &dyn Frontend,
    suite: &TestSuite,
    case: &TestCase,
) -> Result<String, CaseError> {
    let mut func = build_function(frontend, suite, case)?;
    let mut pipeline = registry.build_pipeline(suite.passes.iter().map(String::as_str))?;
    pipeline.run(&mut func)?;
    Ok(print_function(&func))
}

fn build_function(
    frontend: &dyn Frontend,
    suite: &TestSuite,
    case: &TestCase,
) -> Result<Function, CaseError> {
    if case.is_hir {
        Ok(parse_function(&case.input)?)
    } else {
        Ok(frontend.lower(&case.input, suite.mode)?)
    }
}

/// Run `case` and compare its output with the expected text.
pub fn check_case(
    registry: &PassRegistry,
    frontend: &dyn Frontend,
    suite: &TestSuite,
    case: &TestCase,
) -> Result<(), CaseError> {
    let actual = run_case(registry, frontend, suite, case)?;
    if actual == case.expected {
        Ok(())
    } else {
        Err(CaseError::GoldenMismatch {
            diff: golden_diff(&case.expected, &actual),
        })
    }
}

/// Line diff of two HIR texts.
pub fn golden_diff(expected: &str, actual: &str) -> String {
    pretty_assertions::Comparison::new(&Text(expected), &Text(actual)).to_string()
}

/// Debug-prints as the raw text so the diff is taken line by line.
struct Text<'a>(&'a str);

impl fmt::Debug for Text<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.0)
    }
}

/// Runs golden cases against a registry and a frontend.
pub struct GoldenRunner<'a> {
    registry: &'a PassRegistry,
    frontend: &'a dyn Frontend,
    config: RunnerConfig,
}

impl<'a> GoldenRunner<'a> {
    pub fn new(registry: &'a PassRegistry, frontend: &'a dyn Frontend, config: RunnerConfig) -> Self {
        GoldenRunner {
            registry,
            frontend,
            config,
        }
    }

    pub fn config(&self) -> &RunnerConfig {
        &self.config
    }

    /// Run every enabled case of `suites` that the filter selects.
    ///
    /// Suites must already have passed [`validate_suites`].
    pub fn run(&self, suites: &[TestSuite]) -> RunSummary {
        let start = Instant::now();
        let jobs: Vec<(usize, &TestCase)> = suites
            .iter()
            .enumerate()
            .flat_map(|(index, suite)| {
                suite
                    .enabled_cases()
                    .filter(move |case| self.config.selects(&suite.qualified_name(case)))
                    .map(move |case| (index, case))
            })
            .collect();

        let results = if self.config.parallel {
            self.run_parallel(suites, &jobs)
        } else {
            self.run_sequential(suites, &jobs)
        };

        let mut summaries: Vec<SuiteSummary> = suites
            .iter()
            .map(|suite| {
                let mut summary = SuiteSummary::new(suite);
                summary.disabled.retain(|name| self.config.selects(name));
                summary
            })
            .collect();
        for (index, result) in results {
            summaries[index].add_result(result);
        }

        let mut summary = RunSummary::new();
        for suite_summary in summaries {
            summary.add_suite(suite_summary);
        }
        summary.duration = start.elapsed();
        tracing::debug!(
            passed = summary.passed,
            failed = summary.failed,
            disabled = summary.disabled,
            "golden run finished"
        );
        summary
    }

    fn run_sequential(
        &self,
        suites: &[TestSuite],
        jobs: &[(usize, &TestCase)],
    ) -> Vec<(usize, CaseResult)> {
        jobs.iter()
            .map(|&(index, case)| (index, self.run_one(&suites[index], case)))
            .collect()
    }

    /// Run cases on a scoped rayon pool, falling back to sequential
    /// execution when the pool cannot be built.
    ///
    /// `build_scoped` joins its workers before returning, so no rayon
    /// threads outlive the run.
    fn run_parallel(
        &self,
        suites: &[TestSuite],
        jobs: &[(usize, &TestCase)],
    ) -> Vec<(usize, CaseResult)> {
        rayon::ThreadPoolBuilder::new()
            .build_scoped(rayon::ThreadBuilder::run, |pool| {
                pool.install(|| {
                    jobs.par_iter()
                        .map(|&(index, case)| (index, self.run_one(&suites[index], case)))
                        .collect::<Vec<_>>()
                })
            })
            .unwrap_or_else(|e| {
                tracing::warn!("failed to create thread pool ({e}), running sequentially");
                self.run_sequential(suites, jobs)
            })
    }

    fn run_one(&self, suite: &TestSuite, case: &TestCase) -> CaseResult {
        let name = suite.qualified_name(case);
        let _span = tracing::debug_span!("case", name = %name).entered();
        let start = Instant::now();
        let outcome = match check_case(self.registry, self.frontend, suite, case) {
            Ok(()) => CaseOutcome::Passed,
            Err(error) => {
                tracing::debug!(%error, "case failed");
                CaseOutcome::Failed(error)
            }
        };
        CaseResult {
            name,
            line: case.line,
            outcome,
            duration: start.elapsed(),
        }
    }
}

/// Load, validate and run everything under `paths`.
pub fn run_paths(
    registry: &PassRegistry,
    frontend: &dyn Frontend,
    config: RunnerConfig,
    paths: &[PathBuf],
) -> Result<RunSummary, SetupError> {
    let suites = load_suites(paths)?;
    validate_suites(registry, &suites)?;
    Ok(GoldenRunner::new(registry, frontend, config).run(&suites))
}

/// Default fixture directory of this crate.
pub fn default_fixture_dir() -> &'static Path {
    Path::new(concat!(env!("CARGO_MANIFEST_DIR"), "/tests/hir"))
}

#[cfg(test)]
mod tests;
