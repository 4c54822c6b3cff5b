//! Suite configuration.
//!
//! The category list, tool locations and limits are plain data loaded once at
//! suite start. Adding a category means editing the config, not the runner.

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{HarnessError, Result};

// ============================================================================
// CATEGORIES
// ============================================================================

/// A fixed classification of cases by testing intent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    pub name: String,
    /// Directory holding `codes/` and `outputs/`, relative to the fixture root.
    /// Defaults to the category name.
    #[serde(default)]
    pub dir: Option<PathBuf>,
    /// Cases in this category pass only when the compiler rejects them.
    #[serde(default)]
    pub expect_rejection: bool,
}

impl Category {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            dir: None,
            expect_rejection: false,
        }
    }

    pub fn rejecting(name: impl Into<String>) -> Self {
        Self {
            expect_rejection: true,
            ..Self::new(name)
        }
    }

    pub fn root(&self, fixture_root: &Path) -> PathBuf {
        match &self.dir {
            Some(dir) => fixture_root.join(dir),
            None => fixture_root.join(&self.name),
        }
    }

    pub fn codes_dir(&self, fixture_root: &Path) -> PathBuf {
        self.root(fixture_root).join("codes")
    }

    pub fn outputs_dir(&self, fixture_root: &Path) -> PathBuf {
        self.root(fixture_root).join("outputs")
    }
}

fn default_categories() -> Vec<Category> {
    vec![
        Category::new("algorithm"),
        Category::new("function"),
        Category::rejecting("error"),
    ]
}

// ============================================================================
// SUITE CONFIG
// ============================================================================

/// Everything the runner needs to know before discovering a single case.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SuiteConfig {
    pub fixture_root: PathBuf,
    pub compiler: PathBuf,
    /// Extra arguments placed before the source path, e.g. `-D`.
    pub compiler_args: Vec<String>,
    pub toolchain: PathBuf,
    pub runtime_support: PathBuf,
    /// File name the compiler writes into its working directory on success.
    pub assembly_name: String,
    pub executable_name: String,
    /// Where per-case workspaces are created. Defaults to the system temp dir.
    pub scratch_dir: Option<PathBuf>,
    pub timeout_secs: u64,
    pub jobs: usize,
    pub categories: Vec<Category>,
}

impl Default for SuiteConfig {
    fn default() -> Self {
        Self {
            fixture_root: PathBuf::from("test"),
            compiler: PathBuf::from("../myComp"),
            compiler_args: Vec::new(),
            toolchain: PathBuf::from("cc"),
            runtime_support: PathBuf::from("../lib/printint.c"),
            assembly_name: "out.s".to_string(),
            executable_name: "out".to_string(),
            scratch_dir: None,
            timeout_secs: 10,
            jobs: 1,
            categories: default_categories(),
        }
    }
}

impl SuiteConfig {
    /// Loads a YAML config file. Missing keys fall back to [`Default`].
    pub fn from_file(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path).map_err(|e| HarnessError::io(path, e))?;
        Self::from_yaml(&text).map_err(|source| HarnessError::ConfigParse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn from_yaml(text: &str) -> Result<Self, serde_yaml::Error> {
        serde_yaml::from_str(text)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn validate(&self) -> Result<()> {
        if self.categories.is_empty() {
            return Err(HarnessError::invalid("at least one category is required"));
        }
        let mut seen = HashSet::new();
        for category in &self.categories {
            if category.name.is_empty() {
                return Err(HarnessError::invalid("category names must not be empty"));
            }
            if !seen.insert(category.name.as_str()) {
                return Err(HarnessError::invalid(format!(
                    "category '{}' is listed twice",
                    category.name
                )));
            }
        }
        if self.jobs == 0 {
            return Err(HarnessError::invalid("jobs must be at least 1"));
        }
        if self.timeout_secs == 0 {
            return Err(HarnessError::invalid("timeout_secs must be at least 1"));
        }
        if self.assembly_name.is_empty() || self.executable_name.is_empty() {
            return Err(HarnessError::invalid("artifact names must not be empty"));
        }
        Ok(())
    }

    /// Keeps only the named categories, in config order.
    pub fn restrict_categories(&mut self, names: &[String]) -> Result<()> {
        if names.is_empty() {
            return Ok(());
        }
        for name in names {
            if !self.categories.iter().any(|c| &c.name == name) {
                let known = self
                    .categories
                    .iter()
                    .map(|c| c.name.as_str())
                    .collect::<Vec<_>>()
                    .join(", ");
                return Err(HarnessError::UnknownCategory {
                    name: name.clone(),
                    known,
                });
            }
        }
        self.categories.retain(|c| names.contains(&c.name));
        Ok(())
    }

    /// Checks the external collaborators exist before any case runs.
    ///
    /// Bare command names such as `cc` are left to `PATH` lookup at spawn time.
    pub fn check_tools(&self) -> Result<()> {
        if !self.fixture_root.is_dir() {
            return Err(HarnessError::MissingFixtureRoot {
                path: self.fixture_root.clone(),
            });
        }
        if is_explicit_path(&self.compiler) && !self.compiler.is_file() {
            return Err(HarnessError::MissingCompiler {
                path: self.compiler.clone(),
            });
        }
        if !self.runtime_support.is_file() {
            return Err(HarnessError::MissingRuntimeSupport {
                path: self.runtime_support.clone(),
            });
        }
        if let Some(scratch) = self.scratch_dir.as_deref().filter(|d| !d.is_dir()) {
            return Err(HarnessError::invalid(format!(
                "scratch_dir '{}' is not a directory",
                scratch.display()
            )));
        }
        Ok(())
    }

    /// A copy with relative paths anchored at the process working directory.
    pub fn resolved(&self) -> Result<Self> {
        let cwd = std::env::current_dir().map_err(|e| HarnessError::io(".", e))?;
        let mut config = self.clone();
        config.absolutize(&cwd);
        Ok(config)
    }

    /// Makes tool and fixture paths absolute so they survive the per-case
    /// working directory change.
    pub fn absolutize(&mut self, base: &Path) {
        self.fixture_root = absolute(base, &self.fixture_root);
        self.runtime_support = absolute(base, &self.runtime_support);
        if let Some(scratch) = &self.scratch_dir {
            self.scratch_dir = Some(absolute(base, scratch));
        }
        if is_explicit_path(&self.compiler) {
            self.compiler = absolute(base, &self.compiler);
        }
        if is_explicit_path(&self.toolchain) {
            self.toolchain = absolute(base, &self.toolchain);
        }
    }
}

fn is_explicit_path(path: &Path) -> bool {
    path.components().count() > 1 || path.is_absolute()
}

fn absolute(base: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        base.join(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_mark_only_error_as_rejecting() {
        let config = SuiteConfig::default();
        let rejecting: Vec<_> = config
            .categories
            .iter()
            .filter(|c| c.expect_rejection)
            .map(|c| c.name.as_str())
            .collect();
        assert_eq!(rejecting, vec!["error"]);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn yaml_overrides_merge_with_defaults() {
        let config = SuiteConfig::from_yaml(
            "compiler: ./bin/cc1\ntimeout_secs: 3\ncategories:\n  - name: smoke\n  - name: bad\n    expect_rejection: true\n",
        )
        .unwrap();
        assert_eq!(config.compiler, PathBuf::from("./bin/cc1"));
        assert_eq!(config.timeout(), Duration::from_secs(3));
        assert_eq!(config.assembly_name, "out.s");
        assert_eq!(config.categories.len(), 2);
        assert!(config.categories[1].expect_rejection);
    }

    #[test]
    fn unknown_keys_are_rejected() {
        assert!(SuiteConfig::from_yaml("compilr: x\n").is_err());
    }

    #[test]
    fn duplicate_categories_fail_validation() {
        let config = SuiteConfig {
            categories: vec![Category::new("a"), Category::new("a")],
            ..SuiteConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(HarnessError::InvalidConfig { .. })
        ));
    }

    #[test]
    fn restrict_keeps_config_order() {
        let mut config = SuiteConfig::default();
        config
            .restrict_categories(&["error".to_string(), "algorithm".to_string()])
            .unwrap();
        let names: Vec<_> = config.categories.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["algorithm", "error"]);
    }

    #[test]
    fn restrict_rejects_unknown_names() {
        let mut config = SuiteConfig::default();
        let err = config
            .restrict_categories(&["nope".to_string()])
            .unwrap_err();
        assert!(matches!(err, HarnessError::UnknownCategory { .. }));
    }

    #[test]
    fn category_dir_override() {
        let category = Category {
            dir: Some(PathBuf::from("errs")),
            ..Category::rejecting("error")
        };
        assert_eq!(
            category.codes_dir(Path::new("/t")),
            PathBuf::from("/t/errs/codes")
        );
    }

    #[test]
    fn bare_tool_names_stay_bare() {
        let mut config = SuiteConfig::default();
        config.absolutize(Path::new("/work"));
        assert_eq!(config.toolchain, PathBuf::from("cc"));
        assert_eq!(config.compiler, PathBuf::from("/work/../myComp"));
        assert_eq!(config.fixture_root, PathBuf::from("/work/test"));
    }

    #[test]
    fn resolved_anchors_relative_tools_at_cwd() {
        let config = SuiteConfig {
            compiler: PathBuf::from("tools/myComp"),
            runtime_support: PathBuf::from("/abs/printint.c"),
            ..SuiteConfig::default()
        };
        let resolved = config.resolved().unwrap();
        let cwd = std::env::current_dir().unwrap();
        assert_eq!(resolved.compiler, cwd.join("tools/myComp"));
        assert_eq!(resolved.runtime_support, PathBuf::from("/abs/printint.c"));
        assert_eq!(resolved.toolchain, PathBuf::from("cc"));
    }
}
