//! Execution and transaction lifecycle tracking.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, warn};

use super::store::{ConnectionInfo, SharedStore};
use crate::core::{ExecutionId, ExecutionStatus, TransactionId, TransactionStatus, TransitionPolicy};
use crate::errors::{StoreError, TransitionError};
use crate::utils::Clock;

/// Drives the execution and transaction rows of one run.
///
/// Store failures never surface as errors here: the write is rolled back,
/// a warning is logged and the operation returns `Ok(None)`. Only illegal
/// transitions under [`TransitionPolicy::Strict`] are errors.
///
/// A legal update whose write fails still advances the tracked status, so
/// the lifecycle checks follow what the job did rather than what the store
/// managed to record.
pub struct ExecutionTracker {
    store: SharedStore,
    clock: Arc<dyn Clock>,
    robot_id: String,
    policy: TransitionPolicy,
    executions: Mutex<HashMap<ExecutionId, ExecutionStatus>>,
    transactions: Mutex<HashMap<TransactionId, TransactionStatus>>,
}

impl ExecutionTracker {
    /// Creates a tracker writing rows for `robot_id`.
    #[must_use]
    pub fn new(store: SharedStore, clock: Arc<dyn Clock>, robot_id: impl Into<String>) -> Self {
        Self {
            store,
            clock,
            robot_id: robot_id.into(),
            policy: TransitionPolicy::default(),
            executions: Mutex::new(HashMap::new()),
            transactions: Mutex::new(HashMap::new()),
        }
    }

    /// Sets the transition policy.
    #[must_use]
    pub fn with_policy(mut self, policy: TransitionPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// The robot identifier written to new executions.
    #[must_use]
    pub fn robot_id(&self) -> &str {
        &self.robot_id
    }

    /// The transition policy in force.
    #[must_use]
    pub fn policy(&self) -> TransitionPolicy {
        self.policy
    }

    /// Checks store connectivity. This is the one tracker operation whose
    /// failure is returned to the caller.
    pub fn self_test(&self) -> Result<ConnectionInfo, StoreError> {
        self.store.lock().self_test()
    }

    /// Inserts an execution row in `status` and returns its id.
    pub fn start_execution(
        &self,
        status: ExecutionStatus,
    ) -> Result<Option<ExecutionId>, TransitionError> {
        if self.is_strict() && !status.is_initial() {
            return Err(TransitionError::ExecutionStart(status));
        }

        let at = self.clock.now();
        let result = self.store.lock().insert_execution(&self.robot_id, status, at);
        match result {
            Ok(id) => {
                self.executions.lock().insert(id, status);
                debug!(execution_id = id, status = %status, robot = %self.robot_id, "Execution started");
                Ok(Some(id))
            }
            Err(e) => {
                warn!(error = %e, status = %status, "Failed to insert execution");
                Ok(None)
            }
        }
    }

    /// Moves execution `id` to `status` and stamps its end time.
    pub fn update_execution(
        &self,
        id: ExecutionId,
        status: ExecutionStatus,
    ) -> Result<Option<ExecutionId>, TransitionError> {
        if self.is_strict() {
            if let Some(&from) = self.executions.lock().get(&id) {
                if !from.can_transition_to(status) {
                    return Err(TransitionError::Execution { id, from, to: status });
                }
            }
        }

        let at = self.clock.now();
        let result = self.store.lock().update_execution(id, status, at);
        match result {
            Ok(()) => {
                self.executions.lock().insert(id, status);
                debug!(execution_id = id, status = %status, "Execution updated");
                Ok(Some(id))
            }
            Err(e) => {
                warn!(execution_id = id, error = %e, status = %status, "Failed to update execution");
                self.executions.lock().insert(id, status);
                Ok(None)
            }
        }
    }

    /// Inserts a transaction row under `execution_id`.
    ///
    /// The parent must exist in the store; an unknown parent yields `Ok(None)`.
    pub fn start_transaction(
        &self,
        execution_id: ExecutionId,
        data: Option<&str>,
        status: TransactionStatus,
    ) -> Result<Option<TransactionId>, TransitionError> {
        if self.is_strict() && status != TransactionStatus::Running {
            return Err(TransitionError::TransactionStart(status));
        }

        let at = self.clock.now();
        let result = self
            .store
            .lock()
            .insert_transaction(execution_id, status, data.map(str::to_owned), at);
        match result {
            Ok(id) => {
                self.transactions.lock().insert(id, status);
                debug!(execution_id, transaction_id = id, "Transaction started");
                Ok(Some(id))
            }
            Err(e) => {
                warn!(execution_id, error = %e, "Failed to insert transaction");
                Ok(None)
            }
        }
    }

    /// Moves transaction `id` to `status`, stamping its end time and
    /// replacing its data when `data` is given.
    pub fn update_transaction(
        &self,
        id: TransactionId,
        status: TransactionStatus,
        data: Option<&str>,
    ) -> Result<Option<TransactionId>, TransitionError> {
        if self.is_strict() {
            if let Some(&from) = self.transactions.lock().get(&id) {
                if !from.can_transition_to(status) {
                    return Err(TransitionError::Transaction { id, from, to: status });
                }
            }
        }

        let at = self.clock.now();
        let result = self
            .store
            .lock()
            .update_transaction(id, status, data.map(str::to_owned), at);
        match result {
            Ok(()) => {
                self.transactions.lock().insert(id, status);
                debug!(transaction_id = id, status = %status, "Transaction updated");
                Ok(Some(id))
            }
            Err(e) => {
                warn!(transaction_id = id, error = %e, status = %status, "Failed to update transaction");
                self.transactions.lock().insert(id, status);
                Ok(None)
            }
        }
    }

    /// Last status written for an execution by this tracker.
    #[must_use]
    pub fn execution_status(&self, id: ExecutionId) -> Option<ExecutionStatus> {
        self.executions.lock().get(&id).copied()
    }

    /// Last status written for a transaction by this tracker.
    #[must_use]
    pub fn transaction_status(&self, id: TransactionId) -> Option<TransactionStatus> {
        self.transactions.lock().get(&id).copied()
    }

    fn is_strict(&self) -> bool {
        self.policy == TransitionPolicy::Strict
    }
}

impl fmt::Debug for ExecutionTracker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExecutionTracker")
            .field("robot_id", &self.robot_id)
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tracking::sqlite::SqliteStatusStore;
    use crate::tracking::store::{share, MockStatusStore};
    use crate::utils::FixedClock;
    use chrono::{TimeZone, Utc};
    use mockall::predicate::eq;
    use pretty_assertions::assert_eq;

    fn clock() -> Arc<FixedClock> {
        Arc::new(FixedClock::new(Utc.with_ymd_and_hms(2025, 10, 14, 8, 0, 0).unwrap()))
    }

    fn sqlite_tracker() -> (tempfile::TempDir, Arc<FixedClock>, SharedStore, ExecutionTracker) {
        let dir = tempfile::tempdir().unwrap();
        let store = share(SqliteStatusStore::new(dir.path().join("rpa.db")));
        let clock = clock();
        let tracker = ExecutionTracker::new(store.clone(), clock.clone(), "FIN001");
        (dir, clock, store, tracker)
    }

    #[test]
    fn test_execution_lifecycle() {
        let (_dir, clock, store, tracker) = sqlite_tracker();

        let id = tracker.start_execution(ExecutionStatus::Starting).unwrap().unwrap();
        tracker.update_execution(id, ExecutionStatus::Running).unwrap().unwrap();
        clock.advance(chrono::Duration::seconds(30));
        tracker.update_execution(id, ExecutionStatus::Success).unwrap().unwrap();

        let row = store.lock().execution(id).unwrap().unwrap();
        assert_eq!(row.status, ExecutionStatus::Success);
        assert_eq!(row.robot_id, "FIN001");
        assert!(row.end_time.unwrap() > row.start_time);
        assert_eq!(tracker.execution_status(id), Some(ExecutionStatus::Success));
    }

    #[test]
    fn test_transaction_update_sets_final_status_and_end_time() {
        let (_dir, clock, store, tracker) = sqlite_tracker();
        let exec = tracker.start_execution(ExecutionStatus::Running).unwrap().unwrap();

        for (status, data) in [
            (TransactionStatus::Success, Some("lines=3")),
            (TransactionStatus::Failure, None),
        ] {
            let tx = tracker
                .start_transaction(exec, Some("Item File: SAL.txt"), TransactionStatus::Running)
                .unwrap()
                .unwrap();
            clock.advance(chrono::Duration::milliseconds(250));
            tracker.update_transaction(tx, status, data).unwrap().unwrap();

            let row = store.lock().transaction(tx).unwrap().unwrap();
            assert_eq!(row.status, status);
            assert!(row.end_time.unwrap() >= row.start_time);
            assert_eq!(
                row.data.as_deref(),
                Some(data.unwrap_or("Item File: SAL.txt"))
            );
        }
    }

    #[test]
    fn test_transaction_without_parent_is_sentinel() {
        let (_dir, _clock, _store, tracker) = sqlite_tracker();
        let tx = tracker
            .start_transaction(404, Some("orphan"), TransactionStatus::Running)
            .unwrap();
        assert_eq!(tx, None);
    }

    #[test]
    fn test_strict_rejects_illegal_transitions() {
        let (_dir, _clock, _store, tracker) = sqlite_tracker();

        assert_eq!(
            tracker.start_execution(ExecutionStatus::Success),
            Err(TransitionError::ExecutionStart(ExecutionStatus::Success))
        );

        let id = tracker.start_execution(ExecutionStatus::Starting).unwrap().unwrap();
        assert_eq!(
            tracker.update_execution(id, ExecutionStatus::Success),
            Err(TransitionError::Execution {
                id,
                from: ExecutionStatus::Starting,
                to: ExecutionStatus::Success,
            })
        );

        tracker.update_execution(id, ExecutionStatus::Failure).unwrap().unwrap();
        assert!(tracker.update_execution(id, ExecutionStatus::Running).is_err());

        assert_eq!(
            tracker.start_transaction(id, None, TransactionStatus::Success),
            Err(TransitionError::TransactionStart(TransactionStatus::Success))
        );
    }

    #[test]
    fn test_strict_rejects_second_terminal_transaction_update() {
        let (_dir, _clock, _store, tracker) = sqlite_tracker();
        let exec = tracker.start_execution(ExecutionStatus::Running).unwrap().unwrap();
        let tx = tracker
            .start_transaction(exec, None, TransactionStatus::Running)
            .unwrap()
            .unwrap();

        tracker.update_transaction(tx, TransactionStatus::Success, None).unwrap();
        let err = tracker
            .update_transaction(tx, TransactionStatus::Failure, None)
            .unwrap_err();
        assert!(matches!(err, TransitionError::Transaction { .. }));
    }

    #[test]
    fn test_permissive_writes_out_of_order_statuses() {
        let dir = tempfile::tempdir().unwrap();
        let store = share(SqliteStatusStore::new(dir.path().join("rpa.db")));
        let tracker = ExecutionTracker::new(store.clone(), clock(), "FIN001")
            .with_policy(TransitionPolicy::Permissive);

        let id = tracker.start_execution(ExecutionStatus::Success).unwrap().unwrap();
        tracker.update_execution(id, ExecutionStatus::Running).unwrap().unwrap();

        let row = store.lock().execution(id).unwrap().unwrap();
        assert_eq!(row.status, ExecutionStatus::Running);
    }

    #[test]
    fn test_store_failure_returns_sentinel() {
        let mut mock = MockStatusStore::new();
        mock.expect_insert_execution()
            .withf(|_, status, _| *status == ExecutionStatus::Starting)
            .times(1)
            .returning(|_, _, _| Err(StoreError::Query("disk I/O error".to_string())));

        let tracker = ExecutionTracker::new(share(mock), clock(), "FIN001");
        assert_eq!(tracker.start_execution(ExecutionStatus::Starting), Ok(None));
    }

    #[test]
    fn test_failed_update_still_advances_lifecycle() {
        let mut mock = MockStatusStore::new();
        mock.expect_insert_execution().returning(|_, _, _| Ok(7));
        mock.expect_update_execution()
            .with(eq(7), eq(ExecutionStatus::Running), mockall::predicate::always())
            .times(1)
            .returning(|_, _, _| Err(StoreError::Connection("gone".to_string())));
        mock.expect_update_execution()
            .with(eq(7), eq(ExecutionStatus::Success), mockall::predicate::always())
            .times(1)
            .returning(|_, _, _| Ok(()));

        let tracker = ExecutionTracker::new(share(mock), clock(), "FIN001");
        let id = tracker.start_execution(ExecutionStatus::Starting).unwrap().unwrap();
        assert_eq!(tracker.update_execution(id, ExecutionStatus::Running), Ok(None));
        assert_eq!(tracker.execution_status(id), Some(ExecutionStatus::Running));
        assert_eq!(tracker.update_execution(id, ExecutionStatus::Success), Ok(Some(7)));
    }

    #[test]
    fn test_failed_transaction_update_still_blocks_second_terminal() {
        let mut mock = MockStatusStore::new();
        mock.expect_insert_transaction().returning(|_, _, _, _| Ok(11));
        mock.expect_update_transaction()
            .times(1)
            .returning(|_, _, _, _| Err(StoreError::Query("locked".to_string())));

        let tracker = ExecutionTracker::new(share(mock), clock(), "FIN001");
        let tx = tracker
            .start_transaction(1, None, TransactionStatus::Running)
            .unwrap()
            .unwrap();
        assert_eq!(
            tracker.update_transaction(tx, TransactionStatus::Success, None),
            Ok(None)
        );
        assert!(tracker
            .update_transaction(tx, TransactionStatus::Failure, None)
            .is_err());
    }

    #[test]
    fn test_self_test_propagates_errors() {
        let mut mock = MockStatusStore::new();
        mock.expect_self_test()
            .returning(|| Err(StoreError::Connection("refused".to_string())));

        let tracker = ExecutionTracker::new(share(mock), clock(), "FIN001");
        assert!(matches!(tracker.self_test(), Err(StoreError::Connection(_))));
    }
}
