//! Error types for the rpaflow job.
//!
//! Discovery and staging failures are fatal to a run; store failures are
//! reported through sentinels by the tracker and only surface as errors from
//! the start-up self-test.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

use crate::core::{ExecutionStatus, TransactionStatus};

/// The main error type for rpaflow operations.
#[derive(Debug, Error)]
pub enum RpaError {
    /// Business-day resolution walked past its lookback bound.
    #[error("{0}")]
    Resolution(#[from] ResolutionError),

    /// The dated input folder does not exist.
    #[error("Folder not found: {}", path.display())]
    NotFound {
        /// The expected folder.
        path: PathBuf,
    },

    /// The dated folder exists but holds no recognized input file.
    #[error("No files to process in folder: {}", path.display())]
    NoFilesFound {
        /// The scanned folder.
        path: PathBuf,
    },

    /// More than one file matched the same marker and duplicates are rejected.
    #[error("Marker '{marker}' matched several files: {}", files.join(", "))]
    AmbiguousFiles {
        /// The marker that matched more than once.
        marker: String,
        /// The matching file names, in listing order.
        files: Vec<String>,
    },

    /// An I/O failure while clearing or populating the staging directory.
    #[error("{0}")]
    Staging(#[from] StagingError),

    /// A persistent store failure.
    #[error("{0}")]
    Store(#[from] StoreError),

    /// An illegal status transition was requested.
    #[error("{0}")]
    Transition(#[from] TransitionError),

    /// Configuration could not be loaded.
    #[error("{0}")]
    Config(#[from] ConfigError),

    /// The holiday calendar could not be read.
    #[error("Holiday calendar error: {0}")]
    Holiday(String),

    /// A notification could not be delivered.
    #[error("Notification failed: {0}")]
    Notify(String),

    /// A per-item processing failure.
    #[error("Item processing failed for {}: {reason}", path.display())]
    Processing {
        /// The staged file being processed.
        path: PathBuf,
        /// The reason for failure.
        reason: String,
    },
}

impl RpaError {
    /// Creates a not-found error.
    #[must_use]
    pub fn not_found(path: impl Into<PathBuf>) -> Self {
        Self::NotFound { path: path.into() }
    }

    /// Creates a no-files-found error.
    #[must_use]
    pub fn no_files_found(path: impl Into<PathBuf>) -> Self {
        Self::NoFilesFound { path: path.into() }
    }

    /// Creates a processing error.
    #[must_use]
    pub fn processing(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::Processing {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Short machine-readable kind, used in log messages and notifications.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Resolution(_) => "ResolutionError",
            Self::NotFound { .. } => "NotFoundError",
            Self::NoFilesFound { .. } => "NoFilesFoundError",
            Self::AmbiguousFiles { .. } => "AmbiguousFilesError",
            Self::Staging(_) => "StagingError",
            Self::Store(_) => "StoreError",
            Self::Transition(_) => "TransitionError",
            Self::Config(_) => "ConfigError",
            Self::Holiday(_) => "HolidayError",
            Self::Notify(_) => "NotifyError",
            Self::Processing { .. } => "ProcessingError",
        }
    }
}

/// Raised when no business day is found within the lookback bound.
#[derive(Debug, Clone, Error)]
#[error("No business day found within {max_lookback_days} days before {today}")]
pub struct ResolutionError {
    /// The reference date.
    pub today: NaiveDate,
    /// The bound that was exceeded.
    pub max_lookback_days: u32,
}

/// I/O failure while clearing or populating the staging directory.
#[derive(Debug, Error)]
pub enum StagingError {
    /// Removing a stale file failed.
    #[error("Failed to clear {}: {source}", path.display())]
    Clear {
        /// The file that could not be removed.
        path: PathBuf,
        /// The underlying error.
        #[source]
        source: std::io::Error,
    },

    /// Copying a source file failed.
    #[error("Failed to copy {} to {}: {source}", from.display(), to.display())]
    Copy {
        /// Source path.
        from: PathBuf,
        /// Destination path.
        to: PathBuf,
        /// The underlying error.
        #[source]
        source: std::io::Error,
    },

    /// Listing or creating the staging directory failed.
    #[error("Failed to read staging directory {}: {source}", path.display())]
    Directory {
        /// The staging directory.
        path: PathBuf,
        /// The underlying error.
        #[source]
        source: std::io::Error,
    },
}

/// Persistent store failures.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Opening the connection failed.
    #[error("Failed to connect to store: {0}")]
    Connection(String),

    /// A statement failed and was rolled back.
    #[error("Query failed: {0}")]
    Query(String),

    /// A stored row could not be decoded.
    #[error("Corrupt row in {table}: {reason}")]
    CorruptRow {
        /// The table read from.
        table: &'static str,
        /// What was wrong.
        reason: String,
    },
}

impl From<rusqlite::Error> for StoreError {
    fn from(err: rusqlite::Error) -> Self {
        Self::Query(err.to_string())
    }
}

/// A status change the transition table does not allow.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
pub enum TransitionError {
    /// Execution transition rejected.
    #[error("Illegal execution transition for {id}: {from} -> {to}")]
    Execution {
        /// The execution id.
        id: i64,
        /// Current status.
        from: ExecutionStatus,
        /// Requested status.
        to: ExecutionStatus,
    },

    /// Transaction transition rejected.
    #[error("Illegal transaction transition for {id}: {from} -> {to}")]
    Transaction {
        /// The transaction id.
        id: i64,
        /// Current status.
        from: TransactionStatus,
        /// Requested status.
        to: TransactionStatus,
    },

    /// An execution must start in STARTING or RUNNING.
    #[error("Execution cannot start in status {0}")]
    ExecutionStart(ExecutionStatus),

    /// A transaction must start in RUNNING.
    #[error("Transaction cannot start in status {0}")]
    TransactionStart(TransactionStatus),
}

/// Configuration loading failures.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The configuration file could not be read.
    #[error("Failed to read config {}: {source}", path.display())]
    Read {
        /// The config path.
        path: PathBuf,
        /// The underlying error.
        #[source]
        source: std::io::Error,
    },

    /// The configuration file is not valid JSON for the expected shape.
    #[error("Invalid config {}: {source}", path.display())]
    Parse {
        /// The config path.
        path: PathBuf,
        /// The underlying error.
        #[source]
        source: serde_json::Error,
    },

    /// A value is present but unusable.
    #[error("Invalid value for '{key}': {reason}")]
    Invalid {
        /// The config key.
        key: String,
        /// Why it was rejected.
        reason: String,
    },
}

impl ConfigError {
    /// Creates an invalid-value error.
    #[must_use]
    pub fn invalid(key: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Invalid {
            key: key.into(),
            reason: reason.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_message() {
        let err = RpaError::not_found("/share/10.2025/13");
        assert_eq!(err.to_string(), "Folder not found: /share/10.2025/13");
        assert_eq!(err.kind(), "NotFoundError");
    }

    #[test]
    fn test_ambiguous_files_lists_candidates() {
        let err = RpaError::AmbiguousFiles {
            marker: "SAL".to_string(),
            files: vec!["SAL_1.txt".to_string(), "SAL_2.txt".to_string()],
        };

        assert_eq!(err.kind(), "AmbiguousFilesError");
        assert!(err.to_string().contains("SAL_1.txt, SAL_2.txt"));
    }

    #[test]
    fn test_resolution_error_from() {
        let err: RpaError = ResolutionError {
            today: NaiveDate::from_ymd_opt(2025, 1, 1).unwrap(),
            max_lookback_days: 3650,
        }
        .into();

        assert_eq!(err.kind(), "ResolutionError");
        assert!(err.to_string().contains("3650"));
    }

    #[test]
    fn test_transition_error_display() {
        let err = TransitionError::Execution {
            id: 7,
            from: ExecutionStatus::Success,
            to: ExecutionStatus::Running,
        };
        assert_eq!(
            err.to_string(),
            "Illegal execution transition for 7: SUCCESS -> RUNNING"
        );
    }

    #[test]
    fn test_config_invalid() {
        let err = ConfigError::invalid("weekend", "unknown day 'Funday'");
        assert!(err.to_string().contains("weekend"));
    }
}
