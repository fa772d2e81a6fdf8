//! Core domain model types for rpaflow.
//!
//! This module contains the fundamental types used throughout the job:
//! - Execution, transaction and log status enums
//! - The rows tracked in the persistent store

mod records;
mod status;

pub use records::{Execution, ExecutionId, LogRecord, Transaction, TransactionId};
pub use status::{ExecutionStatus, LogStatus, ProcessType, TransactionStatus, TransitionPolicy};
