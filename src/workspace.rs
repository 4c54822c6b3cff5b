//! Per-case scratch directories.
//!
//! The compiler writes its assembly to a fixed file name in its working
//! directory, and the toolchain is told to emit a fixed executable name. Giving
//! every case its own directory keeps those fixed names from colliding, so
//! cases never observe each other's artifacts and can run concurrently.

use std::path::{Path, PathBuf};

use log::{debug, warn};
use tempfile::TempDir;

use crate::config::SuiteConfig;

/// Transient artifacts of one pipeline run. Removed when dropped.
#[derive(Debug)]
pub struct Workspace {
    dir: Option<TempDir>,
    assembly: PathBuf,
    executable: PathBuf,
}

impl Workspace {
    pub fn create(config: &SuiteConfig, case_id: &str) -> std::io::Result<Self> {
        let prefix = format!("goldrun-{}-", case_id.replace(['/', '\\'], "_"));
        let mut builder = tempfile::Builder::new();
        builder.prefix(&prefix);
        let dir = match &config.scratch_dir {
            Some(scratch) => builder.tempdir_in(scratch)?,
            None => builder.tempdir()?,
        };
        debug!("workspace {} for {}", dir.path().display(), case_id);
        Ok(Self {
            assembly: dir.path().join(&config.assembly_name),
            executable: dir.path().join(&config.executable_name),
            dir: Some(dir),
        })
    }

    pub fn path(&self) -> &Path {
        self.dir
            .as_ref()
            .map(TempDir::path)
            .unwrap_or_else(|| Path::new("."))
    }

    pub fn assembly(&self) -> &Path {
        &self.assembly
    }

    pub fn executable(&self) -> &Path {
        &self.executable
    }
}

impl Drop for Workspace {
    fn drop(&mut self) {
        if let Some(dir) = self.dir.take() {
            let path = dir.path().to_path_buf();
            if let Err(e) = dir.close() {
                warn!("failed to remove workspace {}: {}", path.display(), e);
            }
        }
    }
}
