//! Rows tracked in the persistent store.

use serde::{Deserialize, Serialize};

use super::{ExecutionStatus, LogStatus, ProcessType, TransactionStatus};
use crate::utils::Timestamp;

/// Identifier of an `EXECUTIONS` row.
pub type ExecutionId = i64;

/// Identifier of a `TRANSACTION` row.
pub type TransactionId = i64;

/// One end-to-end run of the job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Execution {
    /// Row id.
    pub id: ExecutionId,
    /// The robot that ran.
    pub robot_id: String,
    /// Current status.
    pub status: ExecutionStatus,
    /// When the row was created.
    pub start_time: Timestamp,
    /// Set by every status update.
    pub end_time: Option<Timestamp>,
}

/// One per-item unit of work within an execution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    /// Row id.
    pub id: TransactionId,
    /// Parent execution.
    pub execution_id: ExecutionId,
    /// Current status.
    pub status: TransactionStatus,
    /// Free-text description of the item.
    pub data: Option<String>,
    /// When the row was created.
    pub start_time: Timestamp,
    /// Set by every status update.
    pub end_time: Option<Timestamp>,
}

/// A structured log entry destined for the `LOG` table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogRecord {
    /// Execution the entry belongs to.
    pub execution_id: ExecutionId,
    /// Transaction in progress, if any.
    pub transaction_id: Option<TransactionId>,
    /// Logical function name supplied by the caller.
    pub function: String,
    /// Source file of the call site.
    pub file: String,
    /// Source line of the call site.
    pub line: u32,
    /// The message.
    pub message: String,
    /// Kind of work.
    pub process_type: ProcessType,
    /// Severity.
    pub status: LogStatus,
    /// When the entry was produced.
    pub created_at: Timestamp,
}
