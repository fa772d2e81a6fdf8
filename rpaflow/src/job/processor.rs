//! Per-item processing.

use std::fs;
use std::path::Path;

use crate::errors::RpaError;

/// Processes one staged file inside its transaction.
///
/// The returned string, if any, replaces the transaction data on success.
#[cfg_attr(test, mockall::automock)]
pub trait ItemProcessor: Send + Sync {
    /// Processes the file at `path`.
    fn process(&self, path: &Path) -> Result<Option<String>, RpaError>;
}

/// Counts the lines of each file.
#[derive(Debug, Clone, Copy, Default)]
pub struct LineCountProcessor;

impl ItemProcessor for LineCountProcessor {
    fn process(&self, path: &Path) -> Result<Option<String>, RpaError> {
        let bytes = fs::read(path).map_err(|e| RpaError::processing(path, e.to_string()))?;
        let text = String::from_utf8_lossy(&bytes);
        let name = path
            .file_name()
            .map_or_else(|| path.display().to_string(), |n| n.to_string_lossy().into_owned());
        Ok(Some(format!("Item File: {name} - Lines: {}", text.lines().count())))
    }
}
