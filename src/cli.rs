//! Command-line front end.
//!
//! Exit codes: 0 when every case passed, 1 when any case failed or was not
//! run, 2 when the suite could not run at all.

use std::fs;
use std::path::{Path, PathBuf};

use clap::{ArgAction, Parser};
use env_logger::Env;
use log::debug;
use termcolor::{ColorChoice, StandardStream, WriteColor};

use crate::config::SuiteConfig;
use crate::error::{HarnessError, Result};
use crate::report::Reporter;
use crate::runner::{discover, run_all, RunOptions};

pub const EXIT_PASSED: i32 = 0;
pub const EXIT_FAILED: i32 = 1;
pub const EXIT_FATAL: i32 = 2;

/// Golden-output conformance runner for the compiler.
#[derive(Debug, Parser)]
#[command(name = "goldrun", version, about)]
pub struct GoldrunArgs {
    /// YAML config file. Relative paths inside it resolve against its directory.
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,
    /// Fixture root holding one directory per category.
    #[arg(long, value_name = "DIR")]
    pub root: Option<PathBuf>,
    /// Compiler executable under test.
    #[arg(long, value_name = "PATH")]
    pub compiler: Option<PathBuf>,
    /// Extra argument passed to the compiler before the source path.
    #[arg(long = "compiler-arg", value_name = "ARG", allow_hyphen_values = true)]
    pub compiler_args: Vec<String>,
    /// Runtime support file linked into every program.
    #[arg(long, value_name = "PATH")]
    pub runtime: Option<PathBuf>,
    /// Native toolchain driver used to assemble and link.
    #[arg(long = "cc", value_name = "PATH")]
    pub toolchain: Option<PathBuf>,
    /// Per-process timeout in seconds.
    #[arg(long, value_name = "SECS")]
    pub timeout: Option<u64>,
    /// Number of cases to run concurrently.
    #[arg(short, long, value_name = "N")]
    pub jobs: Option<usize>,
    /// Only run this category. Repeatable.
    #[arg(long = "category", value_name = "NAME")]
    pub categories: Vec<String>,
    /// Only run cases whose name contains this substring.
    #[arg(long, value_name = "SUBSTR")]
    pub filter: Option<String>,
    /// Stop after the first failing case.
    #[arg(long)]
    pub fail_fast: bool,
    /// List discovered cases and exit.
    #[arg(long)]
    pub list: bool,
    /// Also write the suite summary as JSON.
    #[arg(long, value_name = "FILE")]
    pub json: Option<PathBuf>,
    #[arg(long)]
    pub no_color: bool,
    /// Raise log verbosity (-v info, -vv debug).
    #[arg(short, long, action = ArgAction::Count)]
    pub verbose: u8,
}

impl GoldrunArgs {
    /// Builds the effective config: defaults, then the file, then flags.
    pub fn resolve_config(&self, cwd: &Path) -> Result<SuiteConfig> {
        let mut config = match &self.config {
            Some(path) => {
                let path = cwd.join(path);
                let mut config = SuiteConfig::from_file(&path)?;
                config.absolutize(path.parent().unwrap_or(cwd));
                config
            }
            None => SuiteConfig::default(),
        };

        if let Some(root) = &self.root {
            config.fixture_root = root.clone();
        }
        if let Some(compiler) = &self.compiler {
            config.compiler = compiler.clone();
        }
        if !self.compiler_args.is_empty() {
            config.compiler_args = self.compiler_args.clone();
        }
        if let Some(runtime) = &self.runtime {
            config.runtime_support = runtime.clone();
        }
        if let Some(toolchain) = &self.toolchain {
            config.toolchain = toolchain.clone();
        }
        if let Some(timeout) = self.timeout {
            config.timeout_secs = timeout;
        }
        if let Some(jobs) = self.jobs {
            config.jobs = jobs;
        }
        config.absolutize(cwd);
        config.restrict_categories(&self.categories)?;
        config.validate()?;
        Ok(config)
    }

    fn options(&self) -> RunOptions {
        RunOptions {
            fail_fast: self.fail_fast,
            filter: self.filter.clone(),
        }
    }

    fn color_choice(&self) -> ColorChoice {
        if self.no_color || !atty::is(atty::Stream::Stdout) {
            ColorChoice::Never
        } else {
            ColorChoice::Auto
        }
    }
}

/// Parses the process arguments, runs the suite and returns the exit code.
pub fn run() -> i32 {
    let args = GoldrunArgs::parse();
    init_logging(args.verbose);

    let mut reporter = Reporter::new(StandardStream::stdout(args.color_choice()));
    match execute(&args, &mut reporter) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("{:?}", miette::Report::new(e));
            EXIT_FATAL
        }
    }
}

/// Everything `run` does after argument parsing, against any output.
pub fn execute<W: WriteColor>(args: &GoldrunArgs, reporter: &mut Reporter<W>) -> Result<i32> {
    let cwd = std::env::current_dir().map_err(|e| HarnessError::io(".", e))?;
    let config = args.resolve_config(&cwd)?;
    debug!("effective config: {:?}", config);
    let options = args.options();

    if args.list {
        for group in discover(&config, &options)? {
            reporter
                .listing(&group.category.name, &group.cases)
                .map_err(HarnessError::Report)?;
        }
        return Ok(EXIT_PASSED);
    }

    let summary = run_all(&config, &options, reporter)?;
    if let Some(path) = &args.json {
        fs::write(path, summary.to_json()?).map_err(|e| HarnessError::io(path, e))?;
    }
    Ok(if summary.all_passed() {
        EXIT_PASSED
    } else {
        EXIT_FAILED
    })
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let _ = env_logger::Builder::from_env(Env::default().default_filter_or(level))
        .format_timestamp(None)
        .try_init();
}
