//! Verdicts, suite aggregation and console reporting.
//!
//! The reporter is generic over [`WriteColor`] so the same code paints a
//! terminal and fills an in-memory buffer in tests.

use std::fmt;
use std::io;
use std::time::Duration;

use serde::Serialize;
use termcolor::{Color, ColorSpec, WriteColor};

use crate::compare::{line_diff, DiffLine};
use crate::discovery::TestCase;

// =============================================================================
// VERDICTS
// =============================================================================

/// Pipeline stage a failure or timeout is attributed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    Compile,
    Build,
    Run,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Stage::Compile => "compile",
            Stage::Build => "build",
            Stage::Run => "run",
        })
    }
}

/// Why a case failed. Each kind is reported distinctly.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// Observed and expected text differ after trimming.
    Mismatch,
    /// A case in a rejecting category compiled cleanly.
    MissingRejection,
    /// The toolchain could not assemble or link the compiler's output.
    BuildFailed,
    /// The program exited nonzero or was killed by a signal.
    Crashed { exit_code: Option<i32> },
    TimedOut(Stage),
    /// The harness itself could not carry out the case.
    Harness,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureKind::Mismatch => f.write_str("output mismatch"),
            FailureKind::MissingRejection => f.write_str("expected the compiler to reject"),
            FailureKind::BuildFailed => f.write_str("build failure"),
            FailureKind::Crashed {
                exit_code: Some(code),
            } => write!(f, "runtime failure (exit {code})"),
            FailureKind::Crashed { exit_code: None } => f.write_str("runtime failure"),
            FailureKind::TimedOut(stage) => write!(f, "timed out during {stage}"),
            FailureKind::Harness => f.write_str("harness error"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Failure {
    pub kind: FailureKind,
    pub observed: String,
    pub expected: String,
    /// The observed output hit the capture limit and is only a prefix.
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub truncated: bool,
}

/// Final classification of one case.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    Passed,
    Failed(Failure),
}

impl Verdict {
    /// Builds a failure, trimming both texts the way the comparator does.
    pub fn failed(kind: FailureKind, observed: impl Into<String>, expected: impl AsRef<str>) -> Self {
        Verdict::Failed(Failure {
            kind,
            observed: observed.into().trim().to_string(),
            expected: expected.as_ref().trim().to_string(),
            truncated: false,
        })
    }

    /// Marks the observed text of a failure as cut off at the capture limit.
    pub fn truncated(mut self) -> Self {
        if let Verdict::Failed(failure) = &mut self {
            failure.truncated = true;
        }
        self
    }

    pub fn is_passed(&self) -> bool {
        matches!(self, Verdict::Passed)
    }
}

#[derive(Debug, Clone)]
pub struct CaseReport {
    pub case: TestCase,
    pub verdict: Verdict,
    pub duration: Duration,
}

// =============================================================================
// AGGREGATION
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SuiteOutcome {
    AllPassed,
    SomeFailed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CategorySummary {
    pub name: String,
    pub discovered: usize,
    pub passed: usize,
    pub failed: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FailedCase {
    pub id: String,
    #[serde(flatten)]
    pub failure: Failure,
}

/// Suite-wide result, accumulated case by case.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SuiteSummary {
    pub passed: usize,
    pub failed: usize,
    /// Cases never started because fail-fast stopped the suite.
    pub not_run: usize,
    pub categories: Vec<CategorySummary>,
    pub failures: Vec<FailedCase>,
    pub duration_ms: u128,
}

impl SuiteSummary {
    pub fn begin_category(&mut self, name: &str, discovered: usize) {
        self.categories.push(CategorySummary {
            name: name.to_string(),
            discovered,
            passed: 0,
            failed: 0,
        });
    }

    pub fn record(&mut self, report: &CaseReport) {
        let category = self
            .categories
            .iter_mut()
            .find(|c| c.name == report.case.category);
        match &report.verdict {
            Verdict::Passed => {
                self.passed += 1;
                if let Some(c) = category {
                    c.passed += 1;
                }
            }
            Verdict::Failed(failure) => {
                self.failed += 1;
                if let Some(c) = category {
                    c.failed += 1;
                }
                self.failures.push(FailedCase {
                    id: report.case.id(),
                    failure: failure.clone(),
                });
            }
        }
    }

    pub fn total(&self) -> usize {
        self.passed + self.failed
    }

    pub fn all_passed(&self) -> bool {
        self.failed == 0 && self.not_run == 0
    }

    pub fn outcome(&self) -> SuiteOutcome {
        if self.all_passed() {
            SuiteOutcome::AllPassed
        } else {
            SuiteOutcome::SomeFailed
        }
    }

    pub fn failed_ids(&self) -> Vec<&str> {
        self.failures.iter().map(|f| f.id.as_str()).collect()
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        #[derive(Serialize)]
        struct Document<'a> {
            outcome: SuiteOutcome,
            #[serde(flatten)]
            summary: &'a SuiteSummary,
        }
        serde_json::to_string_pretty(&Document {
            outcome: self.outcome(),
            summary: self,
        })
    }
}

// =============================================================================
// CONSOLE OUTPUT
// =============================================================================

/// Lines of observed or expected text printed per failure.
const MAX_BLOCK_LINES: usize = 40;

pub struct Reporter<W: WriteColor> {
    out: W,
}

impl<W: WriteColor> Reporter<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    pub fn category(&mut self, name: &str, cases: usize) -> io::Result<()> {
        self.paint(Color::Cyan, true)?;
        write!(self.out, "== {name}")?;
        self.out.reset()?;
        writeln!(self.out, " ({cases} cases)")
    }

    /// One verdict line, plus details when the case failed.
    pub fn case(&mut self, report: &CaseReport) -> io::Result<()> {
        let id = report.case.id();
        let millis = report.duration.as_millis();
        match &report.verdict {
            Verdict::Passed => {
                self.tag("PASS", Color::Green)?;
                writeln!(self.out, " {id} ({millis} ms)")
            }
            Verdict::Failed(failure) => {
                self.tag("FAIL", Color::Red)?;
                writeln!(self.out, " {id} ({millis} ms): {}", failure.kind)?;
                self.failure_details(failure)
            }
        }
    }

    fn failure_details(&mut self, failure: &Failure) -> io::Result<()> {
        writeln!(self.out, "  observed:")?;
        self.block(&failure.observed)?;
        if failure.truncated {
            writeln!(self.out, "    [output truncated at the capture limit]")?;
        }
        writeln!(self.out, "  expected:")?;
        self.block(&failure.expected)?;
        if failure.kind != FailureKind::Mismatch || failure.truncated {
            return Ok(());
        }
        writeln!(self.out, "  diff:")?;
        for line in line_diff(&failure.observed, &failure.expected) {
            match line {
                DiffLine::Same(x) => writeln!(self.out, "     {x}")?,
                DiffLine::Missing(x) => {
                    self.paint(Color::Green, false)?;
                    writeln!(self.out, "    -{x}")?;
                    self.out.reset()?;
                }
                DiffLine::Extra(x) => {
                    self.paint(Color::Red, false)?;
                    writeln!(self.out, "    +{x}")?;
                    self.out.reset()?;
                }
            }
        }
        Ok(())
    }

    fn block(&mut self, text: &str) -> io::Result<()> {
        if text.is_empty() {
            return writeln!(self.out, "    <empty>");
        }
        let mut lines = text.lines();
        for line in lines.by_ref().take(MAX_BLOCK_LINES) {
            writeln!(self.out, "    {line}")?;
        }
        let rest = lines.count();
        if rest > 0 {
            writeln!(self.out, "    ... {rest} more lines")?;
        }
        Ok(())
    }

    pub fn summary(&mut self, summary: &SuiteSummary) -> io::Result<()> {
        writeln!(self.out)?;
        for category in &summary.categories {
            writeln!(
                self.out,
                "{}: {} passed, {} failed, {} discovered",
                category.name, category.passed, category.failed, category.discovered
            )?;
        }
        if summary.not_run > 0 {
            writeln!(self.out, "{} cases not run (fail-fast)", summary.not_run)?;
        }
        if !summary.failures.is_empty() {
            writeln!(self.out, "\nFailed cases:")?;
            for failed in &summary.failures {
                writeln!(self.out, "  - {} ({})", failed.id, failed.failure.kind)?;
            }
        }
        writeln!(self.out)?;
        match summary.outcome() {
            SuiteOutcome::AllPassed => self.tag("PASS", Color::Green)?,
            SuiteOutcome::SomeFailed => self.tag("FAIL", Color::Red)?,
        }
        writeln!(
            self.out,
            " {} of {} cases passed in {} ms",
            summary.passed,
            summary.total(),
            summary.duration_ms
        )
    }

    /// Lists discovered cases without running them.
    pub fn listing(&mut self, name: &str, cases: &[TestCase]) -> io::Result<()> {
        self.category(name, cases.len())?;
        for case in cases {
            match &case.stdin {
                Some(_) => writeln!(self.out, "  {} [stdin]", case.name)?,
                None => writeln!(self.out, "  {}", case.name)?,
            }
        }
        Ok(())
    }

    fn tag(&mut self, text: &str, color: Color) -> io::Result<()> {
        self.paint(color, true)?;
        write!(self.out, "{text}")?;
        self.out.reset()
    }

    fn paint(&mut self, color: Color, bold: bool) -> io::Result<()> {
        self.out
            .set_color(ColorSpec::new().set_fg(Some(color)).set_bold(bold))
    }
}
