use std::path::{Path, PathBuf};

use log::{debug, warn};
use serde::Serialize;
use walkdir::WalkDir;

use crate::config::{Category, SuiteConfig};
use crate::error::{HarnessError, Result};

/// One fixture exercised by the pipeline.
///
/// Built once during discovery and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TestCase {
    pub category: String,
    pub name: String,
    pub source: PathBuf,
    pub stdin: Option<PathBuf>,
    pub expected: PathBuf,
    pub expect_rejection: bool,
}

impl TestCase {
    /// `category/name`, used in reports and failure lists.
    pub fn id(&self) -> String {
        format!("{}/{}", self.category, self.name)
    }
}

/// The cases of one category, in deterministic order.
#[derive(Debug, Clone)]
pub struct CategoryCases {
    pub category: Category,
    pub cases: Vec<TestCase>,
}

/// Discovers fixtures laid out as `<category>/codes/**/<name>.c` with golden
/// files under `<category>/outputs/`.
#[derive(Debug)]
pub struct FixtureDiscoverer;

impl FixtureDiscoverer {
    /// Walks every configured category in config order.
    ///
    /// A category without a `codes` directory contributes zero cases. Only a
    /// missing fixture root is fatal.
    pub fn discover(config: &SuiteConfig) -> Result<Vec<CategoryCases>> {
        let root = &config.fixture_root;
        if !root.is_dir() {
            return Err(HarnessError::MissingFixtureRoot { path: root.clone() });
        }

        let mut groups = Vec::with_capacity(config.categories.len());
        for category in &config.categories {
            let cases = Self::discover_category(root, category)?;
            debug!("category {}: {} cases", category.name, cases.len());
            groups.push(CategoryCases {
                category: category.clone(),
                cases,
            });
        }
        Ok(groups)
    }

    /// Recursively scans one category's `codes` subtree for `.c` files.
    ///
    /// The returned cases are sorted by source path so the suite output is
    /// reproducible regardless of directory iteration order. Symlinks are
    /// followed.
    pub fn discover_category(root: &Path, category: &Category) -> Result<Vec<TestCase>> {
        let codes = category.codes_dir(root);
        if !codes.is_dir() {
            warn!(
                "category {} has no codes directory at {}",
                category.name,
                codes.display()
            );
            return Ok(Vec::new());
        }
        let outputs = category.outputs_dir(root);

        let mut sources = Vec::new();
        for entry in WalkDir::new(&codes).follow_links(true) {
            let entry = entry.map_err(|source| HarnessError::Walk {
                path: codes.clone(),
                source,
            })?;
            if !entry.file_type().is_file() {
                continue;
            }
            if !Self::is_c_source(entry.path()) {
                continue;
            }
            sources.push(entry.into_path());
        }
        sources.sort();

        Ok(sources
            .into_iter()
            .filter_map(|source| Self::case_for(category, &outputs, source))
            .collect())
    }

    fn case_for(category: &Category, outputs: &Path, source: PathBuf) -> Option<TestCase> {
        let name = source.file_stem()?.to_string_lossy().into_owned();
        let stdin = outputs.join(format!("{name}.in"));
        Some(TestCase {
            category: category.name.clone(),
            expected: outputs.join(format!("{name}.out")),
            stdin: stdin.is_file().then_some(stdin),
            name,
            source,
            expect_rejection: category.expect_rejection,
        })
    }

    fn is_c_source(path: &Path) -> bool {
        path.extension().is_some_and(|ext| ext == "c")
    }
}

/// Keeps cases whose name contains `filter`, ignoring case.
pub fn filter_cases(groups: &mut [CategoryCases], filter: &str) {
    let needle = filter.to_lowercase();
    for group in groups {
        group
            .cases
            .retain(|case| case.name.to_lowercase().contains(&needle));
    }
}
