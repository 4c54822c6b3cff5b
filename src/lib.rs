pub use crate::config::{Category, SuiteConfig};
pub use crate::discovery::TestCase;
pub use crate::error::HarnessError;
pub use crate::report::{SuiteSummary, Verdict};

pub mod cli;
pub mod compare;
pub mod config;
pub mod discovery;
pub mod error;
pub mod pipeline;
pub mod process;
pub mod report;
pub mod runner;
pub mod workspace;
