//! Resolution of bundled default data files
//!
//! Default data lives under an explicit base directory handed in at construction
//! time (usually from [`F312Config`](crate::F312Config)). Local copies of defaults
//! are written to a separate working directory so bundled files are never touched.

use std::path::{Path, PathBuf};
use crate::config::F312Config;
use crate::{Error, Result};

/// Locates bundled default data files and makes local copies of them
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataPathFinder {
    defaults_dir: PathBuf,
    work_dir: PathBuf,
}

impl DataPathFinder {
    /// Create a finder rooted at `defaults_dir`, copying into the current directory
    pub fn new(defaults_dir: impl Into<PathBuf>) -> Self {
        Self {
            defaults_dir: defaults_dir.into(),
            work_dir: PathBuf::from("."),
        }
    }

    /// Set the directory local copies are written to
    pub fn with_work_dir(mut self, work_dir: impl Into<PathBuf>) -> Self {
        self.work_dir = work_dir.into();
        self
    }

    /// Build a finder from configuration, falling back to `data/default` and `.`
    pub fn from_config(config: &F312Config) -> Self {
        let finder = Self::new(config.defaults_dir().unwrap_or_else(|| PathBuf::from("data/default")));
        match config.work_dir() {
            Some(work_dir) => finder.with_work_dir(work_dir),
            None => finder,
        }
    }

    pub fn defaults_dir(&self) -> &Path {
        &self.defaults_dir
    }

    pub fn work_dir(&self) -> &Path {
        &self.work_dir
    }

    /// Absolute path of a bundled default file.
    ///
    /// Fails with [`Error::PathNotFound`] if the path is not an existing regular file.
    pub fn default_data_path(&self, parts: &[&str]) -> Result<PathBuf> {
        let path = self.default_data_path_unchecked(parts)?;
        if !path.is_file() {
            return Err(Error::PathNotFound(path));
        }
        Ok(path)
    }

    /// Same as [`default_data_path`](Self::default_data_path) without the existence check
    pub fn default_data_path_unchecked(&self, parts: &[&str]) -> Result<PathBuf> {
        let mut path = self.defaults_dir.clone();
        path.extend(parts);
        Ok(std::path::absolute(path)?)
    }

    /// Copy a bundled default file into the working directory, returning the copy's path
    pub fn copy_default_data_file(&self, name: &str) -> Result<PathBuf> {
        let source = self.default_data_path(&[name])?;
        let file_name = source
            .file_name()
            .ok_or_else(|| Error::PathNotFound(source.clone()))?;
        let dest = self.work_dir.join(file_name);
        std::fs::copy(&source, &dest)?;
        tracing::debug!("Copied default {} to {}", source.display(), dest.display());
        Ok(dest)
    }

    /// First `work_dir/<stem>-NNNN.<ext>` that does not exist yet
    pub fn new_filename(&self, stem: &str, ext: &str) -> PathBuf {
        let ext = ext.trim_start_matches('.');
        let mut i: u32 = 0;
        loop {
            let name = if ext.is_empty() {
                format!("{}-{:04}", stem, i)
            } else {
                format!("{}-{:04}.{}", stem, i, ext)
            };
            let candidate = self.work_dir.join(name);
            if !candidate.exists() {
                return candidate;
            }
            i += 1;
        }
    }
}
