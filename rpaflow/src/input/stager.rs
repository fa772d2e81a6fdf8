//! Copying classified input files into the local staging directory.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

use super::fs::{is_text_file, FileSystem};
use super::locator::ClassifiedFileSet;
use crate::errors::StagingError;

/// Mirrors the recognized input files into a scratch directory.
///
/// The staging directory is ephemeral: every pass deletes the text files
/// already in it before copying.
pub struct LocalStager {
    staging_dir: PathBuf,
    fs: Arc<dyn FileSystem>,
}

impl LocalStager {
    /// Creates a stager for `staging_dir`.
    #[must_use]
    pub fn new(staging_dir: impl Into<PathBuf>, fs: Arc<dyn FileSystem>) -> Self {
        Self {
            staging_dir: staging_dir.into(),
            fs,
        }
    }

    /// The staging directory.
    #[must_use]
    pub fn staging_dir(&self) -> &Path {
        &self.staging_dir
    }

    /// Clears the staging directory, copies every classified file from
    /// `source`, and returns the absolute paths of all text files now staged.
    ///
    /// # Errors
    ///
    /// Any I/O failure is returned as a `StagingError`; nothing is rolled back.
    pub fn stage(
        &self,
        source: &Path,
        files: &ClassifiedFileSet,
    ) -> Result<Vec<PathBuf>, StagingError> {
        let dir = self
            .fs
            .absolute(&self.staging_dir)
            .map_err(|source| self.directory_error(source))?;
        self.fs
            .create_dir_all(&dir)
            .map_err(|source| self.directory_error(source))?;

        let cleared = self.clear(&dir)?;
        debug!(staging = %dir.display(), cleared, "Cleared staging directory");

        for name in files.file_names() {
            let from = source.join(name);
            let to = dir.join(name);
            self.fs
                .copy_preserving(&from, &to)
                .map_err(|source| StagingError::Copy {
                    from: from.clone(),
                    to: to.clone(),
                    source,
                })?;
        }

        let staged: Vec<PathBuf> = self
            .text_files(&dir)?
            .into_iter()
            .map(|name| dir.join(name))
            .collect();

        info!(staging = %dir.display(), staged = staged.len(), "Staged input files");
        Ok(staged)
    }

    fn clear(&self, dir: &Path) -> Result<usize, StagingError> {
        let stale = self.text_files(dir)?;
        for name in &stale {
            let path = dir.join(name);
            self.fs
                .remove_file(&path)
                .map_err(|source| StagingError::Clear { path, source })?;
        }
        Ok(stale.len())
    }

    fn text_files(&self, dir: &Path) -> Result<Vec<String>, StagingError> {
        let names = self
            .fs
            .list_files(dir)
            .map_err(|source| self.directory_error(source))?;
        Ok(names.into_iter().filter(|n| is_text_file(n)).collect())
    }

    fn directory_error(&self, source: std::io::Error) -> StagingError {
        StagingError::Directory {
            path: self.staging_dir.clone(),
            source,
        }
    }
}

impl fmt::Debug for LocalStager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LocalStager")
            .field("staging_dir", &self.staging_dir)
            .finish_non_exhaustive()
    }
}
