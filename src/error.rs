//! Fatal harness errors.
//!
//! Anything in here aborts the whole suite. Per-case problems never become a
//! `HarnessError`; they are folded into a failing [`crate::report::Verdict`]
//! at the case boundary instead.

use std::path::PathBuf;

use miette::Diagnostic;
use thiserror::Error;

/// Infrastructure failures that make running the suite impossible.
#[derive(Debug, Error, Diagnostic)]
pub enum HarnessError {
    #[error("fixture root '{}' does not exist", .path.display())]
    #[diagnostic(
        code(goldrun::fixtures::missing_root),
        help("pass --root or set `fixture_root` in the config file")
    )]
    MissingFixtureRoot { path: PathBuf },

    #[error("compiler '{}' was not found", .path.display())]
    #[diagnostic(
        code(goldrun::config::missing_compiler),
        help("build the compiler first or point --compiler at it")
    )]
    MissingCompiler { path: PathBuf },

    #[error("runtime support object '{}' was not found", .path.display())]
    #[diagnostic(code(goldrun::config::missing_runtime))]
    MissingRuntimeSupport { path: PathBuf },

    #[error("unknown category '{name}'")]
    #[diagnostic(code(goldrun::config::unknown_category), help("known categories: {known}"))]
    UnknownCategory { name: String, known: String },

    #[error("invalid configuration: {message}")]
    #[diagnostic(code(goldrun::config::invalid))]
    InvalidConfig { message: String },

    #[error("failed to parse config file '{}'", .path.display())]
    #[diagnostic(code(goldrun::config::parse))]
    ConfigParse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("failed to walk '{}'", .path.display())]
    #[diagnostic(code(goldrun::fixtures::walk))]
    Walk {
        path: PathBuf,
        #[source]
        source: walkdir::Error,
    },

    #[error("I/O error on '{}'", .path.display())]
    #[diagnostic(code(goldrun::io))]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to write the report")]
    #[diagnostic(code(goldrun::report::write))]
    Report(#[source] std::io::Error),

    #[error("failed to write JSON report")]
    #[diagnostic(code(goldrun::report::json))]
    Json(#[from] serde_json::Error),
}

impl HarnessError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    pub fn invalid(message: impl Into<String>) -> Self {
        Self::InvalidConfig {
            message: message.into(),
        }
    }
}

pub type Result<T, E = HarnessError> = std::result::Result<T, E>;
