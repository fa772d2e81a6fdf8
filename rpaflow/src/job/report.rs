//! What a run did.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::core::{ExecutionId, ExecutionStatus, TransactionId, TransactionStatus};

/// The result of processing one staged file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemOutcome {
    /// The staged file.
    pub path: PathBuf,
    /// Its transaction, if the row was created.
    pub transaction_id: Option<TransactionId>,
    /// Final status.
    pub status: TransactionStatus,
    /// Processor output on success, error message on failure.
    pub detail: Option<String>,
}

impl ItemOutcome {
    /// Returns true if the item succeeded.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.status == TransactionStatus::Success
    }
}

/// Summary of one execution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunReport {
    /// The execution row.
    pub execution_id: ExecutionId,
    /// Final execution status.
    pub status: ExecutionStatus,
    /// The business day whose folder was processed.
    pub business_day: Option<NaiveDate>,
    /// The dated source folder.
    pub source_folder: Option<PathBuf>,
    /// Files staged locally.
    pub staged: Vec<PathBuf>,
    /// Per-item results, in staging order.
    pub items: Vec<ItemOutcome>,
    /// The fatal error, when the run failed.
    pub error: Option<String>,
}

impl RunReport {
    pub(crate) fn new(execution_id: ExecutionId) -> Self {
        Self {
            execution_id,
            status: ExecutionStatus::Running,
            business_day: None,
            source_folder: None,
            staged: Vec::new(),
            items: Vec::new(),
            error: None,
        }
    }

    /// Returns true if the execution finished in SUCCESS.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.status == ExecutionStatus::Success
    }

    /// Number of items that failed.
    #[must_use]
    pub fn failed_items(&self) -> usize {
        self.items.iter().filter(|i| !i.is_success()).count()
    }
}
