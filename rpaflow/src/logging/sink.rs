//! Destinations for structured log records.

use parking_lot::RwLock;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::warn;

use crate::core::LogRecord;
use crate::tracking::SharedStore;

/// Receives every log record that belongs to an execution.
///
/// Implementations never fail the caller: errors are reported through
/// `tracing` and swallowed.
pub trait LogSink: Send + Sync {
    /// Writes one record.
    fn write(&self, record: &LogRecord);
}

/// Writes records to the `LOG` table of the shared store.
///
/// A failed insert triggers one reconnect and one retry. If that also fails
/// the sink trips and ignores every later record, leaving the log file as
/// the only durable record for the rest of the run.
pub struct DbLogSink {
    store: SharedStore,
    tripped: AtomicBool,
}

impl DbLogSink {
    /// Creates a sink on `store`.
    #[must_use]
    pub fn new(store: SharedStore) -> Self {
        Self {
            store,
            tripped: AtomicBool::new(false),
        }
    }

    /// Returns true once the sink has given up on the store.
    #[must_use]
    pub fn is_tripped(&self) -> bool {
        self.tripped.load(Ordering::Relaxed)
    }
}

impl LogSink for DbLogSink {
    fn write(&self, record: &LogRecord) {
        if self.is_tripped() {
            return;
        }

        let mut store = self.store.lock();
        let Err(first) = store.insert_log(record) else {
            return;
        };

        warn!(error = %first, execution_id = record.execution_id, "Failed to write log row, reconnecting");
        let retried = store.reconnect().and_then(|()| store.insert_log(record));
        if let Err(e) = retried {
            self.tripped.store(true, Ordering::Relaxed);
            warn!(error = %e, "Log store unavailable, continuing with file-only logging");
        }
    }
}

impl std::fmt::Debug for DbLogSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DbLogSink")
            .field("tripped", &self.is_tripped())
            .finish_non_exhaustive()
    }
}

/// A collecting sink for testing purposes.
#[derive(Debug, Default)]
pub struct CollectingLogSink {
    records: RwLock<Vec<LogRecord>>,
}

impl CollectingLogSink {
    /// Creates a new collecting sink.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns all collected records.
    #[must_use]
    pub fn records(&self) -> Vec<LogRecord> {
        self.records.read().clone()
    }

    /// Returns the number of collected records.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.read().len()
    }

    /// Returns true if no records have been collected.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.read().is_empty()
    }
}

impl LogSink for CollectingLogSink {
    fn write(&self, record: &LogRecord) {
        self.records.write().push(record.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{LogStatus, ProcessType};
    use crate::errors::StoreError;
    use crate::tracking::store::{share, MockStatusStore};
    use chrono::Utc;
    use mockall::Sequence;

    fn record() -> LogRecord {
        LogRecord {
            execution_id: 1,
            transaction_id: Some(2),
            function: "process_item".to_string(),
            file: "runner.rs".to_string(),
            line: 10,
            message: "Item processed".to_string(),
            process_type: ProcessType::Business,
            status: LogStatus::Success,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_writes_through() {
        let mut mock = MockStatusStore::new();
        mock.expect_insert_log().times(2).returning(|_| Ok(()));
        mock.expect_reconnect().never();

        let sink = DbLogSink::new(share(mock));
        sink.write(&record());
        sink.write(&record());
        assert!(!sink.is_tripped());
    }

    #[test]
    fn test_retries_once_after_reconnect() {
        let mut seq = Sequence::new();
        let mut mock = MockStatusStore::new();
        mock.expect_insert_log()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Err(StoreError::Connection("reset".to_string())));
        mock.expect_reconnect()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|| Ok(()));
        mock.expect_insert_log()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(()));

        let sink = DbLogSink::new(share(mock));
        sink.write(&record());
        assert!(!sink.is_tripped());
    }

    #[test]
    fn test_trips_after_failed_retry() {
        let mut mock = MockStatusStore::new();
        mock.expect_insert_log()
            .times(1)
            .returning(|_| Err(StoreError::Query("locked".to_string())));
        mock.expect_reconnect()
            .times(1)
            .returning(|| Err(StoreError::Connection("refused".to_string())));

        let sink = DbLogSink::new(share(mock));
        sink.write(&record());
        assert!(sink.is_tripped());

        // Later writes never reach the store.
        sink.write(&record());
    }

    #[test]
    fn test_collecting_sink() {
        let sink = CollectingLogSink::new();
        assert!(sink.is_empty());
        sink.write(&record());
        assert_eq!(sink.len(), 1);
        assert_eq!(sink.records()[0].message, "Item processed");
    }
}
