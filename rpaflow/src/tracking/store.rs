//! The persistent store port.

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::core::{
    Execution, ExecutionId, ExecutionStatus, LogRecord, Transaction, TransactionId,
    TransactionStatus,
};
use crate::errors::StoreError;
use crate::utils::Timestamp;

/// What the start-up self-test learned about the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionInfo {
    /// Database name or file.
    pub database: String,
    /// Engine version string.
    pub version: String,
}

/// Persistence for executions, transactions and log entries.
///
/// Every write is committed on its own; a failed write is rolled back
/// before the error is returned.
#[cfg_attr(test, mockall::automock)]
pub trait StatusStore: Send {
    /// Opens a connection, queries engine metadata, then disconnects.
    fn self_test(&mut self) -> Result<ConnectionInfo, StoreError>;

    /// Drops any open connection and opens a fresh one.
    fn reconnect(&mut self) -> Result<(), StoreError>;

    /// Inserts an execution row and returns its id.
    fn insert_execution(
        &mut self,
        robot_id: &str,
        status: ExecutionStatus,
        at: Timestamp,
    ) -> Result<ExecutionId, StoreError>;

    /// Sets status and end time.
    fn update_execution(
        &mut self,
        id: ExecutionId,
        status: ExecutionStatus,
        at: Timestamp,
    ) -> Result<(), StoreError>;

    /// Inserts a transaction row bound to `execution_id` and returns its id.
    fn insert_transaction(
        &mut self,
        execution_id: ExecutionId,
        status: TransactionStatus,
        data: Option<String>,
        at: Timestamp,
    ) -> Result<TransactionId, StoreError>;

    /// Sets status and end time, and replaces the data when `data` is given.
    fn update_transaction(
        &mut self,
        id: TransactionId,
        status: TransactionStatus,
        data: Option<String>,
        at: Timestamp,
    ) -> Result<(), StoreError>;

    /// Appends a row to the `LOG` table.
    fn insert_log(&mut self, record: &LogRecord) -> Result<(), StoreError>;

    /// Reads an execution row.
    fn execution(&mut self, id: ExecutionId) -> Result<Option<Execution>, StoreError>;

    /// Reads a transaction row.
    fn transaction(&mut self, id: TransactionId) -> Result<Option<Transaction>, StoreError>;
}

/// A store shared by the tracker and the log sink for the life of the process.
pub type SharedStore = Arc<Mutex<dyn StatusStore>>;

/// Wraps a store for sharing.
pub fn share<S: StatusStore + 'static>(store: S) -> SharedStore {
    Arc::new(Mutex::new(store))
}
