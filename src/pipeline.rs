//! The per-case execution protocol: compile → build → run → compare.
//!
//! Each stage is a plain function over a [`Workspace`]. Stage failures are
//! values, not errors: [`run_case`] always returns a [`Verdict`], so nothing
//! escapes a single case boundary.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::Instant;

use log::{debug, info};

use crate::compare::compare;
use crate::config::SuiteConfig;
use crate::discovery::TestCase;
use crate::process::run_bounded;
use crate::report::{CaseReport, FailureKind, Stage, Verdict};
use crate::workspace::Workspace;

// =============================================================================
// OUTCOMES
// =============================================================================

/// Result of invoking the compiler on one source file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CompileOutcome {
    Compiled(PathBuf),
    /// Trimmed stderr of a compiler that exited nonzero.
    Rejected(String),
    TimedOut,
}

/// Trimmed program output, flagged when it hit the capture limit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Captured {
    pub text: String,
    pub truncated: bool,
}

impl Captured {
    pub fn complete(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            truncated: false,
        }
    }
}

/// Result of building and running a compiled program.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExecutionOutcome {
    /// Stdout of a program that exited zero.
    Completed(Captured),
    BuildFailed(String),
    Crashed {
        exit_code: Option<i32>,
        partial_stdout: Captured,
    },
    TimedOut {
        stage: Stage,
        partial_stdout: Captured,
    },
}

/// A per-case problem that is neither a rejection nor a program failure,
/// such as a tool that cannot be spawned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HarnessFault(pub String);

impl HarnessFault {
    fn spawn(what: &str, path: &Path, e: std::io::Error) -> Self {
        Self(format!("failed to run {what} '{}': {e}", path.display()))
    }
}

// =============================================================================
// STAGES
// =============================================================================

/// Runs `compiler [args...] <source>` inside the workspace.
///
/// The compiler drops its assembly into its working directory, which is the
/// workspace, so the fixed output name is private to this case.
pub fn compile(
    config: &SuiteConfig,
    source: &Path,
    ws: &Workspace,
) -> Result<CompileOutcome, HarnessFault> {
    let source = absolute_source(source);
    let mut cmd = Command::new(&config.compiler);
    cmd.args(&config.compiler_args)
        .arg(&source)
        .current_dir(ws.path());

    let out = run_bounded(&mut cmd, None, config.timeout())
        .map_err(|e| HarnessFault::spawn("compiler", &config.compiler, e))?;
    if out.timed_out {
        return Ok(CompileOutcome::TimedOut);
    }
    if !out.status.success() {
        debug!("compiler rejected {} with {:?}", source.display(), out.exit_code());
        return Ok(CompileOutcome::Rejected(out.stderr_text().trim().to_string()));
    }
    Ok(CompileOutcome::Compiled(ws.assembly().to_path_buf()))
}

/// Assembles and links `assembly` with the runtime support object.
///
/// `Err` carries the diagnostic for a build failure; the exit status of the
/// toolchain is always checked.
pub fn build(
    config: &SuiteConfig,
    assembly: &Path,
    ws: &Workspace,
) -> Result<Result<(), ExecutionOutcome>, HarnessFault> {
    if !assembly.is_file() {
        return Ok(Err(ExecutionOutcome::BuildFailed(format!(
            "compiler succeeded but wrote no '{}'",
            config.assembly_name
        ))));
    }

    let mut cmd = Command::new(&config.toolchain);
    cmd.arg("-o")
        .arg(ws.executable())
        .arg(assembly)
        .arg(&config.runtime_support)
        .current_dir(ws.path());

    let out = run_bounded(&mut cmd, None, config.timeout())
        .map_err(|e| HarnessFault::spawn("toolchain", &config.toolchain, e))?;
    if out.timed_out {
        return Ok(Err(ExecutionOutcome::TimedOut {
            stage: Stage::Build,
            partial_stdout: Captured::complete(""),
        }));
    }
    if !out.status.success() {
        let mut diagnostic = out.stderr_text().trim().to_string();
        if diagnostic.is_empty() {
            diagnostic = format!("toolchain exited with {:?}", out.exit_code());
        }
        return Ok(Err(ExecutionOutcome::BuildFailed(diagnostic)));
    }
    if !ws.executable().is_file() {
        return Ok(Err(ExecutionOutcome::BuildFailed(
            "toolchain succeeded but produced no executable".to_string(),
        )));
    }
    Ok(Ok(()))
}

/// Runs the built program, piping in the stdin fixture when there is one.
pub fn execute(
    config: &SuiteConfig,
    stdin: Option<&Path>,
    ws: &Workspace,
) -> Result<ExecutionOutcome, HarnessFault> {
    let input = match stdin {
        Some(path) => Some(fs::read(path).map_err(|e| {
            HarnessFault(format!("failed to read stdin fixture '{}': {e}", path.display()))
        })?),
        None => None,
    };

    let mut cmd = Command::new(ws.executable());
    cmd.current_dir(ws.path());
    let out = run_bounded(&mut cmd, input, config.timeout())
        .map_err(|e| HarnessFault::spawn("program", ws.executable(), e))?;

    let stdout = Captured {
        text: out.stdout_text().trim().to_string(),
        truncated: out.stdout_truncated,
    };
    if out.timed_out {
        return Ok(ExecutionOutcome::TimedOut {
            stage: Stage::Run,
            partial_stdout: stdout,
        });
    }
    if !out.status.success() {
        return Ok(ExecutionOutcome::Crashed {
            exit_code: out.exit_code(),
            partial_stdout: stdout,
        });
    }
    Ok(ExecutionOutcome::Completed(stdout))
}

// =============================================================================
// CASE DRIVER
// =============================================================================

/// Drives one case through the whole protocol and classifies the result.
///
/// The workspace is dropped, and its artifacts removed, before this returns.
pub fn run_case(config: &SuiteConfig, case: &TestCase) -> CaseReport {
    let started = Instant::now();
    let verdict = match fs::read_to_string(&case.expected) {
        Ok(expected) => run_stages(config, case, &expected)
            .unwrap_or_else(|HarnessFault(message)| {
                Verdict::failed(FailureKind::Harness, message, expected)
            }),
        Err(e) => Verdict::failed(
            FailureKind::Harness,
            format!(
                "cannot read expected output '{}': {e}",
                case.expected.display()
            ),
            String::new(),
        ),
    };
    let report = CaseReport {
        case: case.clone(),
        verdict,
        duration: started.elapsed(),
    };
    info!(
        "{} {} in {:?}",
        case.id(),
        if report.verdict.is_passed() { "passed" } else { "failed" },
        report.duration
    );
    report
}

fn run_stages(config: &SuiteConfig, case: &TestCase, expected: &str) -> Result<Verdict, HarnessFault> {
    let ws = Workspace::create(config, &case.id())
        .map_err(|e| HarnessFault(format!("cannot create workspace: {e}")))?;

    let assembly = match compile(config, &case.source, &ws)? {
        CompileOutcome::TimedOut => {
            return Ok(Verdict::failed(
                FailureKind::TimedOut(Stage::Compile),
                String::new(),
                expected,
            ))
        }
        CompileOutcome::Rejected(diagnostic) => {
            // The diagnostic stands in for program output; nothing is built.
            return Ok(judge(diagnostic, expected));
        }
        CompileOutcome::Compiled(_) if case.expect_rejection => {
            return Ok(Verdict::failed(
                FailureKind::MissingRejection,
                "compiler accepted the program",
                expected,
            ))
        }
        CompileOutcome::Compiled(assembly) => assembly,
    };

    if let Err(outcome) = build(config, &assembly, &ws)? {
        return Ok(verdict_for(outcome, expected));
    }
    let outcome = execute(config, case.stdin.as_deref(), &ws)?;
    Ok(verdict_for(outcome, expected))
}

fn verdict_for(outcome: ExecutionOutcome, expected: &str) -> Verdict {
    match outcome {
        // Output cut off at the capture limit is never a faithful match.
        ExecutionOutcome::Completed(Captured {
            text,
            truncated: true,
        }) => Verdict::failed(FailureKind::Mismatch, text, expected).truncated(),
        ExecutionOutcome::Completed(Captured { text, .. }) => judge(text, expected),
        ExecutionOutcome::BuildFailed(diagnostic) => {
            Verdict::failed(FailureKind::BuildFailed, diagnostic, expected)
        }
        ExecutionOutcome::Crashed {
            exit_code,
            partial_stdout,
        } => partial_failure(FailureKind::Crashed { exit_code }, partial_stdout, expected),
        ExecutionOutcome::TimedOut {
            stage,
            partial_stdout,
        } => partial_failure(FailureKind::TimedOut(stage), partial_stdout, expected),
    }
}

fn partial_failure(kind: FailureKind, partial: Captured, expected: &str) -> Verdict {
    let verdict = Verdict::failed(kind, partial.text, expected);
    if partial.truncated {
        verdict.truncated()
    } else {
        verdict
    }
}

fn judge(observed: String, expected: &str) -> Verdict {
    if compare(&observed, expected) {
        Verdict::Passed
    } else {
        Verdict::failed(FailureKind::Mismatch, observed, expected)
    }
}

fn absolute_source(source: &Path) -> PathBuf {
    if source.is_absolute() {
        return source.to_path_buf();
    }
    std::env::current_dir()
        .map(|cwd| cwd.join(source))
        .unwrap_or_else(|_| source.to_path_buf())
}
