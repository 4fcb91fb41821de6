//! Golden fixture files.
//!
//! A fixture holds one suite: a name, the passes to run, and any number of
//! cases, each separated by `---` delimiter lines.
//!
//! ```text
//! RefcountInsertionTest
//! ---
//! RefcountInsertion
//! ---
//! ReturnsArgument
//! ---
//! # HIR
//! fun f {
//!   ...
//! }
//! ---
//! fun f {
//!   ...
//! }
//! ---
//! ```
//!
//! The first input line `# HIR` marks literal HIR; any other input is
//! language source for the frontend. A case name starting with
//! `@disabled` is loaded but never run.

use std::path::{Path, PathBuf};

use jit_hir::CompileMode;
use thiserror::Error;

/// Delimiter between fixture sections.
pub const DELIMITER: &str = "---";

/// Case-name prefix that keeps a case from running.
pub const DISABLED_PREFIX: &str = "@disabled";

/// First input line of a case whose input is already HIR.
pub const HIR_MARKER: &str = "# HIR";

/// Suffix of fixture files whose source is lowered in static mode.
pub const STATIC_SUFFIX: &str = "_static_test.txt";

/// A fixture could not be loaded.
#[derive(Debug, Error)]
pub enum FixtureError {
    #[error("[{}] malformed fixture at line {line}: {message}", path.display())]
    Malformed {
        path: PathBuf,
        line: usize,
        message: String,
    },

    #[error("[{}] cannot read fixture: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl FixtureError {
    #[cold]
    fn malformed(path: &Path, line: usize, message: impl Into<String>) -> Self {
        FixtureError::Malformed {
            path: path.to_path_buf(),
            line,
            message: message.into(),
        }
    }

    /// The fixture file at fault.
    pub fn path(&self) -> &Path {
        match self {
            FixtureError::Malformed { path, .. } | FixtureError::Io { path, .. } => path,
        }
    }
}

/// One case of a suite.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TestCase {
    /// Name without the disabled prefix.
    pub name: String,
    pub disabled: bool,
    /// Input is literal HIR rather than language source.
    pub is_hir: bool,
    /// Input text, marker line removed.
    pub input: String,
    /// Expected HIR after the suite's passes.
    pub expected: String,
    /// Line of the case name in the fixture.
    pub line: usize,
}

/// A parsed fixture file.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TestSuite {
    pub name: String,
    pub path: PathBuf,
    /// Mode used when lowering source cases.
    pub mode: CompileMode,
    /// Pass names, in the order they run.
    pub passes: Vec<String>,
    pub cases: Vec<TestCase>,
}

impl TestSuite {
    /// Cases that will run.
    pub fn enabled_cases(&self) -> impl Iterator<Item = &TestCase> {
        self.cases.iter().filter(|case| !case.disabled)
    }

    pub fn disabled_count(&self) -> usize {
        self.cases.iter().filter(|case| case.disabled).count()
    }

    /// `Suite.Case`, the name used for filtering and reporting.
    pub fn qualified_name(&self, case: &TestCase) -> String {
        format!("{}.{}", self.name, case.name)
    }
}

/// Compile mode implied by a fixture's file name.
pub fn mode_for_path(path: &Path) -> CompileMode {
    let is_static = path
        .file_name()
        .and_then(|name| name.to_str())
        .is_some_and(|name| name.ends_with(STATIC_SUFFIX));
    if is_static {
        CompileMode::Static
    } else {
        CompileMode::Dynamic
    }
}

/// Read and parse the fixture at `path`.
pub fn load_suite(path: &Path) -> Result<TestSuite, FixtureError> {
    let text = std::fs::read_to_string(path).map_err(|source| FixtureError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    parse_suite(path, &text)
}

/// Parse fixture text. `path` is used for the compile mode and for errors.
pub fn parse_suite(path: &Path, text: &str) -> Result<TestSuite, FixtureError> {
    let mut reader = Reader::new(path, text);

    let Some((line, name)) = reader.next_non_blank() else {
        return Err(FixtureError::malformed(path, 1, "missing suite name"));
    };
    if name == DELIMITER {
        return Err(FixtureError::malformed(path, line, "missing suite name"));
    }
    reader.expect_delimiter("after the suite name")?;

    let passes = reader
        .section("pass list")?
        .into_iter()
        .map(|(_, pass)| pass.trim().to_owned())
        .filter(|pass| !pass.is_empty())
        .collect();

    let mut cases = Vec::new();
    while let Some((line, raw_name)) = reader.next_non_blank() {
        cases.push(reader.case(line, raw_name)?);
    }

    let suite = TestSuite {
        name: name.trim().to_owned(),
        path: path.to_path_buf(),
        mode: mode_for_path(path),
        passes,
        cases,
    };
    tracing::debug!(
        suite = %suite.name,
        path = %path.display(),
        cases = suite.cases.len(),
        passes = suite.passes.len(),
        "loaded fixture"
    );
    Ok(suite)
}

/// Line cursor over fixture text, numbering lines from 1.
struct Reader<'a> {
    path: &'a Path,
    lines: std::iter::Enumerate<std::str::Lines<'a>>,
    last_line: usize,
}

impl<'a> Reader<'a> {
    fn new(path: &'a Path, text: &'a str) -> Self {
        Reader {
            path,
            lines: text.lines().enumerate(),
            last_line: 0,
        }
    }

    fn next_line(&mut self) -> Option<(usize, &'a str)> {
        let (index, line) = self.lines.next()?;
        self.last_line = index + 1;
        Some((index + 1, line))
    }

    fn next_non_blank(&mut self) -> Option<(usize, &'a str)> {
        while let Some((line, text)) = self.next_line() {
            if !text.trim().is_empty() {
                return Some((line, text));
            }
        }
        None
    }

    fn expect_delimiter(&mut self, context: &str) -> Result<(), FixtureError> {
        match self.next_line() {
            Some((_, DELIMITER)) => Ok(()),
            Some((line, text)) => Err(FixtureError::malformed(
                self.path,
                line,
                format!("expected `{DELIMITER}` {context}, found `{text}`"),
            )),
            None => Err(self.eof(&format!("expected `{DELIMITER}` {context}"))),
        }
    }

    /// Lines up to and excluding the next delimiter.
    fn section(&mut self, what: &str) -> Result<Vec<(usize, &'a str)>, FixtureError> {
        let mut lines = Vec::new();
        loop {
            match self.next_line() {
                Some((_, DELIMITER)) => return Ok(lines),
                Some(line) => lines.push(line),
                None => return Err(self.eof(&format!("unterminated {what}"))),
            }
        }
    }

    fn case(&mut self, line: usize, raw_name: &str) -> Result<TestCase, FixtureError> {
        let (disabled, name) = match raw_name.trim().strip_prefix(DISABLED_PREFIX) {
            Some(rest) => (true, rest.trim()),
            None => (false, raw_name.trim()),
        };
        if name.is_empty() || name == DELIMITER {
            return Err(FixtureError::malformed(self.path, line, "missing case name"));
        }
        self.expect_delimiter("after the case name")?;

        let mut input = self.section("case input")?;
        let is_hir = input
            .first()
            .is_some_and(|(_, first)| first.trim_end() == HIR_MARKER);
        if is_hir {
            input.remove(0);
        }
        let expected = self.section("expected output")?;

        Ok(TestCase {
            name: name.to_owned(),
            disabled,
            is_hir,
            input: join_lines(&input),
            expected: join_lines(&expected),
            line,
        })
    }

    #[cold]
    fn eof(&self, message: &str) -> FixtureError {
        FixtureError::malformed(self.path, self.last_line.max(1), format!("{message} at end of file"))
    }
}

fn join_lines(lines: &[(usize, &str)]) -> String {
    let mut text = String::new();
    for (_, line) in lines {
        text.push_str(line);
        text.push('\n');
    }
    text
}

#[cfg(test)]
mod tests;
