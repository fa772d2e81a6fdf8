//! One run of the job, from self-test to the FINISHED marker.

use std::panic::Location;
use std::path::Path;
use std::sync::Arc;
use tracing::{info, info_span, warn};

use super::processor::{ItemProcessor, LineCountProcessor};
use super::report::{ItemOutcome, RunReport};
use crate::calendar::BusinessDayResolver;
use crate::core::{ExecutionId, ExecutionStatus, ProcessType, TransactionStatus};
use crate::errors::{ResolutionError, RpaError, StoreError, TransitionError};
use crate::input::{InputLocator, LocalStager};
use crate::logging::StatusLogger;
use crate::notify::{LoggingNotifier, Notification, NotificationComposer, Notifier};
use crate::tracking::ExecutionTracker;
use crate::utils::Clock;

const MAIN: &str = "main";

/// A fatal run error and the line of the runner that raised it.
#[derive(Debug)]
struct RunFailure {
    error: RpaError,
    location: &'static Location<'static>,
}

impl RunFailure {
    #[track_caller]
    fn at(error: RpaError) -> Self {
        Self {
            error,
            location: Location::caller(),
        }
    }

    /// Message for the error notification, carrying the failing line.
    fn notice(&self) -> String {
        format!(
            "{} - File: {} - Line: {}",
            self.error,
            self.location.file(),
            self.location.line()
        )
    }
}

impl From<RpaError> for RunFailure {
    #[track_caller]
    fn from(error: RpaError) -> Self {
        Self::at(error)
    }
}

impl From<TransitionError> for RunFailure {
    #[track_caller]
    fn from(error: TransitionError) -> Self {
        Self::at(error.into())
    }
}

impl From<ResolutionError> for RunFailure {
    #[track_caller]
    fn from(error: ResolutionError) -> Self {
        Self::at(error.into())
    }
}

/// Drives one execution.
///
/// Collaborators are built once by the caller and injected here.
pub struct JobRunner {
    process_name: String,
    tracker: ExecutionTracker,
    logger: Arc<StatusLogger>,
    resolver: BusinessDayResolver,
    locator: InputLocator,
    stager: LocalStager,
    clock: Arc<dyn Clock>,
    processor: Arc<dyn ItemProcessor>,
    notifier: Arc<dyn Notifier>,
    composer: Option<NotificationComposer>,
}

impl JobRunner {
    /// Creates a runner with the line-count processor and no notifications.
    #[must_use]
    pub fn new(
        process_name: impl Into<String>,
        tracker: ExecutionTracker,
        logger: Arc<StatusLogger>,
        resolver: BusinessDayResolver,
        locator: InputLocator,
        stager: LocalStager,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            process_name: process_name.into(),
            tracker,
            logger,
            resolver,
            locator,
            stager,
            clock,
            processor: Arc::new(LineCountProcessor),
            notifier: Arc::new(LoggingNotifier),
            composer: None,
        }
    }

    /// Replaces the per-item processor.
    #[must_use]
    pub fn with_processor(mut self, processor: Arc<dyn ItemProcessor>) -> Self {
        self.processor = processor;
        self
    }

    /// Enables start, finish and error notifications.
    #[must_use]
    pub fn with_notifications(
        mut self,
        notifier: Arc<dyn Notifier>,
        composer: NotificationComposer,
    ) -> Self {
        self.notifier = notifier;
        self.composer = Some(composer);
        self
    }

    /// The status logger.
    #[must_use]
    pub fn logger(&self) -> &StatusLogger {
        &self.logger
    }

    /// Runs the job once.
    ///
    /// # Errors
    ///
    /// Only failures before an execution row exists are returned as errors:
    /// the store self-test and the execution insert. Anything later marks
    /// the execution FAILURE and is reported in the returned [`RunReport`].
    pub fn run(&self) -> Result<RunReport, RpaError> {
        let span = info_span!("run", process = %self.process_name);
        let _enter = span.enter();

        if let Err(e) = self.tracker.self_test() {
            self.logger.log_critical(
                MAIN,
                &format!("Store connection test failed: {e}"),
                ProcessType::System,
            );
            self.log_finished(None);
            return Err(e.into());
        }

        let execution_id = match self.tracker.start_execution(ExecutionStatus::Starting) {
            Ok(Some(id)) => id,
            Ok(None) => {
                let e = StoreError::Query("execution row was not created".to_string());
                self.logger
                    .log_critical(MAIN, &format!("Error: {e}"), ProcessType::System);
                self.log_finished(None);
                return Err(e.into());
            }
            Err(e) => {
                self.log_finished(None);
                return Err(e.into());
            }
        };
        self.logger.set_execution_id(execution_id);
        self.logger.log_info(
            MAIN,
            &format!(
                "ExecutionID: {execution_id} - Process: {} - Status: STARTING",
                self.process_name
            ),
            ProcessType::Process,
        );
        if let Some(composer) = &self.composer {
            self.notify(&composer.start(execution_id));
        }

        let mut report = RunReport::new(execution_id);
        match self.execute(execution_id, &mut report) {
            Ok(()) => self.complete(&mut report),
            Err(e) => self.fail(&mut report, &e),
        }

        self.log_finished(Some(execution_id));
        Ok(report)
    }

    fn log_finished(&self, execution_id: Option<ExecutionId>) {
        self.logger.clear_transaction_id();
        let id = execution_id.map_or_else(|| "N/A".to_string(), |id| id.to_string());
        self.logger.log_info(
            MAIN,
            &format!(
                "ExecutionID: {id} - Process: {} - Status: FINISHED",
                self.process_name
            ),
            ProcessType::Process,
        );
    }

    fn execute(&self, execution_id: ExecutionId, report: &mut RunReport) -> Result<(), RunFailure> {
        self.tracker
            .update_execution(execution_id, ExecutionStatus::Running)?;

        let today = self.clock.today();
        let holidays = self.resolver.holidays();
        self.logger.log_info(
            "resolve_business_day",
            &format!("Holidays loaded: {}", holidays.len()),
            ProcessType::Business,
        );
        let business_day = self.resolver.resolve(today)?;
        report.business_day = Some(business_day);
        self.logger.log_info(
            "resolve_business_day",
            &format!("Reference business day for {today}: {business_day}"),
            ProcessType::Business,
        );

        let located = self.locator.locate(business_day).inspect_err(|e| {
            self.logger
                .log_error("locate_input", &format!("Error: {e}"), ProcessType::Robotic);
        })?;
        report.source_folder = Some(located.folder.clone());
        self.logger.log_info(
            "locate_input",
            &format!("Folder to process: {}", located.folder.display()),
            ProcessType::Robotic,
        );
        self.logger.log_info(
            "locate_input",
            &format!("Files found in folder: {}", located.files),
            ProcessType::Robotic,
        );

        self.logger.log_info(
            "stage_input",
            &format!(
                "Copying files to local staging folder: {}",
                self.stager.staging_dir().display()
            ),
            ProcessType::Robotic,
        );
        let staged = self
            .stager
            .stage(&located.folder, &located.files)
            .map_err(RpaError::from)
            .inspect_err(|e| {
                self.logger
                    .log_error("stage_input", &format!("Error: {e}"), ProcessType::Robotic);
            })?;
        self.logger.log_success(
            "stage_input",
            &format!("{} file(s) staged", staged.len()),
            ProcessType::Robotic,
        );
        report.staged = staged;

        for path in &report.staged {
            let outcome = self.process_item(execution_id, path);
            report.items.push(outcome);
        }
        Ok(())
    }

    fn process_item(&self, execution_id: ExecutionId, path: &Path) -> ItemOutcome {
        let data = format!("Item File: {}", path.display());
        let outcome = match self
            .tracker
            .start_transaction(execution_id, Some(&data), TransactionStatus::Running)
        {
            Ok(transaction_id) => self.run_transaction(transaction_id, path),
            Err(e) => ItemOutcome {
                path: path.to_path_buf(),
                transaction_id: None,
                status: TransactionStatus::Failure,
                detail: Some(e.to_string()),
            },
        };
        self.logger.clear_transaction_id();
        outcome
    }

    fn run_transaction(&self, transaction_id: Option<i64>, path: &Path) -> ItemOutcome {
        if let Some(id) = transaction_id {
            self.logger.set_transaction_id(id);
        }
        self.logger.log_info(
            MAIN,
            &format!(
                "Item started: {} - ItemID: {} - Status: RUNNING",
                path.display(),
                transaction_id.map_or_else(|| "N/A".to_string(), |id| id.to_string())
            ),
            ProcessType::Business,
        );

        let (status, detail) = match self.processor.process(path) {
            Ok(data) => (TransactionStatus::Success, data),
            Err(e) => {
                self.logger
                    .log_error(MAIN, &format!("Error: {e}"), ProcessType::Business);
                (TransactionStatus::Failure, Some(e.to_string()))
            }
        };

        if let Some(id) = transaction_id {
            let data = match status {
                TransactionStatus::Success => detail.as_deref(),
                _ => None,
            };
            if let Err(e) = self.tracker.update_transaction(id, status, data) {
                self.logger
                    .log_error(MAIN, &format!("Error: {e}"), ProcessType::System);
            }
        }

        if status == TransactionStatus::Success {
            self.logger.log_info(
                MAIN,
                &format!("Item finished: {} - Status: SUCCESS", path.display()),
                ProcessType::Business,
            );
        }

        ItemOutcome {
            path: path.to_path_buf(),
            transaction_id,
            status,
            detail,
        }
    }

    fn complete(&self, report: &mut RunReport) {
        let execution_id = report.execution_id;
        match self
            .tracker
            .update_execution(execution_id, ExecutionStatus::Success)
        {
            Ok(_) => report.status = ExecutionStatus::Success,
            Err(e) => {
                self.fail(report, &RunFailure::from(e));
                return;
            }
        }

        self.logger.clear_transaction_id();
        if let Some(composer) = &self.composer {
            self.notify(&composer.finish(execution_id));
        }
        self.logger.log_success(
            MAIN,
            &format!(
                "ExecutionID: {execution_id} - Process: {} - Status: SUCCESS",
                self.process_name
            ),
            ProcessType::Process,
        );
        info!(
            execution_id,
            items = report.items.len(),
            failed = report.failed_items(),
            "Run complete"
        );
    }

    fn fail(&self, report: &mut RunReport, failure: &RunFailure) {
        let error = &failure.error;
        let execution_id = report.execution_id;
        let transaction_id = self.logger.transaction_id();
        if let Some(composer) = &self.composer {
            self.notify(&composer.error(execution_id, transaction_id, &failure.notice()));
        }

        if let Err(e) = self
            .tracker
            .update_execution(execution_id, ExecutionStatus::Failure)
        {
            warn!(execution_id, error = %e, "Execution could not be marked FAILURE");
        }
        report.status = ExecutionStatus::Failure;
        report.error = Some(error.to_string());

        self.logger.log_error(
            MAIN,
            &format!(
                "Error: {error} - Kind: {} - Line: {}",
                error.kind(),
                failure.location.line()
            ),
            ProcessType::Process,
        );
    }

    fn notify(&self, notification: &Notification) {
        if let Err(e) = self.notifier.send(notification) {
            self.logger.log_error(
                "notify",
                &format!(
                    "Notification '{}' to {} failed: {e}",
                    notification.kind,
                    notification.recipients.join(", ")
                ),
                ProcessType::System,
            );
        }
    }
}

impl std::fmt::Debug for JobRunner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JobRunner")
            .field("process_name", &self.process_name)
            .field("tracker", &self.tracker)
            .field("locator", &self.locator)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calendar::{HolidaySet, WeekendRule};
    use crate::input::StdFileSystem;
    use crate::job::processor::MockItemProcessor;
    use crate::logging::CollectingLogSink;
    use crate::notify::MockNotifier;
    use crate::tracking::store::MockStatusStore;
    use crate::tracking::{share, ConnectionInfo, SharedStore, SqliteStatusStore};
    use crate::utils::FixedClock;
    use chrono::{NaiveDate, TimeZone, Utc};
    use pretty_assertions::assert_eq;
    use std::fs;

    struct Fixture {
        _root: tempfile::TempDir,
        network: std::path::PathBuf,
        staging: std::path::PathBuf,
        store: SharedStore,
        sink: Arc<CollectingLogSink>,
        runner: JobRunner,
    }

    // Tuesday 2025-10-14; the business day is Monday 2025-10-13.
    fn fixture(holidays: HolidaySet) -> Fixture {
        let root = tempfile::tempdir().unwrap();
        let store = share(SqliteStatusStore::new(root.path().join("rpa.db")));
        fixture_with_store(root, holidays, store)
    }

    fn fixture_with_store(
        root: tempfile::TempDir,
        holidays: HolidaySet,
        store: SharedStore,
    ) -> Fixture {
        let network = root.path().join("share");
        let staging = root.path().join("staging");
        let clock: Arc<dyn Clock> = Arc::new(
            FixedClock::new(Utc.with_ymd_and_hms(2025, 10, 14, 9, 0, 0).unwrap())
                .with_today(NaiveDate::from_ymd_opt(2025, 10, 14).unwrap()),
        );
        let sink = Arc::new(CollectingLogSink::new());
        let logger = Arc::new(
            StatusLogger::create(&root.path().join("logs"), "TEST", sink.clone(), clock.clone())
                .unwrap(),
        );
        let fs = Arc::new(StdFileSystem);

        let runner = JobRunner::new(
            "Supplier reconciliation",
            ExecutionTracker::new(store.clone(), clock.clone(), "FIN001"),
            logger,
            BusinessDayResolver::new(WeekendRule::default(), holidays),
            InputLocator::new(&network, fs.clone()),
            LocalStager::new(&staging, fs),
            clock,
        );

        Fixture {
            _root: root,
            network,
            staging,
            store,
            sink,
            runner,
        }
    }

    fn seed(folder: &Path, files: &[(&str, &str)]) {
        fs::create_dir_all(folder).unwrap();
        for (name, body) in files {
            fs::write(folder.join(name), body).unwrap();
        }
    }

    #[test]
    fn test_successful_run() {
        let fx = fixture(HolidaySet::empty());
        seed(
            &fx.network.join("10.2025").join("13"),
            &[("SAL_1310.txt", "1\n2\n"), ("FORN_1310.TXT", "1\n"), ("notes.doc", "")],
        );

        let report = fx.runner.run().unwrap();

        assert!(report.is_success());
        assert_eq!(report.business_day, NaiveDate::from_ymd_opt(2025, 10, 13));
        assert_eq!(report.staged.len(), 2);
        assert_eq!(report.failed_items(), 0);
        assert!(fx.staging.join("SAL_1310.txt").exists());

        let mut store = fx.store.lock();
        let execution = store.execution(report.execution_id).unwrap().unwrap();
        assert_eq!(execution.status, ExecutionStatus::Success);
        for item in &report.items {
            let tx = store.transaction(item.transaction_id.unwrap()).unwrap().unwrap();
            assert_eq!(tx.status, TransactionStatus::Success);
            assert!(tx.data.unwrap().contains("Lines:"));
        }
        drop(store);

        let last = fx.sink.records().pop().unwrap();
        assert!(last.message.ends_with("Status: FINISHED"));
        assert_eq!(last.transaction_id, None);
    }

    #[test]
    fn test_missing_folder_fails_execution() {
        let fx = fixture(HolidaySet::empty());

        let report = fx.runner.run().unwrap();

        assert_eq!(report.status, ExecutionStatus::Failure);
        assert!(report.error.unwrap().contains("Folder not found"));
        let execution = fx.store.lock().execution(report.execution_id).unwrap().unwrap();
        assert_eq!(execution.status, ExecutionStatus::Failure);
        assert!(fx
            .sink
            .records()
            .last()
            .unwrap()
            .message
            .ends_with("Status: FINISHED"));
    }

    #[test]
    fn test_holiday_moves_business_day() {
        let monday = NaiveDate::from_ymd_opt(2025, 10, 13).unwrap();
        let fx = fixture([monday].into_iter().collect());
        seed(&fx.network.join("10.2025").join("10"), &[("EXTREL_1010.txt", "x")]);

        let report = fx.runner.run().unwrap();
        assert!(report.is_success());
        assert_eq!(report.business_day, NaiveDate::from_ymd_opt(2025, 10, 10));
    }

    #[test]
    fn test_item_failure_does_not_stop_run() {
        let fx = fixture(HolidaySet::empty());
        seed(
            &fx.network.join("10.2025").join("13"),
            &[("EXTREL_a.txt", "x"), ("SAL_b.txt", "y")],
        );

        let mut processor = MockItemProcessor::new();
        processor.expect_process().times(2).returning(|path| {
            if path.to_string_lossy().contains("EXTREL") {
                Err(RpaError::processing(path, "layout not recognized"))
            } else {
                Ok(None)
            }
        });
        let runner = fx.runner.with_processor(Arc::new(processor));

        let report = runner.run().unwrap();
        assert!(report.is_success());
        assert_eq!(report.failed_items(), 1);

        let failed = report.items.iter().find(|i| !i.is_success()).unwrap();
        let tx = fx
            .store
            .lock()
            .transaction(failed.transaction_id.unwrap())
            .unwrap()
            .unwrap();
        assert_eq!(tx.status, TransactionStatus::Failure);
        assert!(tx.data.unwrap().starts_with("Item File: "));
    }

    #[test]
    fn test_notifications_follow_the_run() {
        let fx = fixture(HolidaySet::empty());
        seed(&fx.network.join("10.2025").join("13"), &[("SAL.txt", "x")]);

        let mut notifier = MockNotifier::new();
        let mut seq = mockall::Sequence::new();
        notifier
            .expect_send()
            .withf(|n| n.kind == crate::notify::NotificationKind::Start)
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(()));
        notifier
            .expect_send()
            .withf(|n| n.kind == crate::notify::NotificationKind::Finish)
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Err(RpaError::Notify("relay down".to_string())));

        let composer = NotificationComposer::new("P", "Bot", "bot@example.com", &[]);
        let runner = fx
            .runner
            .with_notifications(Arc::new(notifier), composer);

        let report = runner.run().unwrap();
        assert!(report.is_success());
        assert!(fx
            .sink
            .records()
            .iter()
            .any(|r| r.function == "notify" && r.message.contains("relay down")));
    }

    #[test]
    fn test_failed_running_write_does_not_fail_run() {
        let mut store = MockStatusStore::new();
        store.expect_self_test().returning(|| {
            Ok(ConnectionInfo {
                database: "memory".to_string(),
                version: "3".to_string(),
            })
        });
        store.expect_insert_execution().returning(|_, _, _| Ok(1));
        store
            .expect_update_execution()
            .withf(|_, status, _| *status == ExecutionStatus::Running)
            .times(1)
            .returning(|_, _, _| Err(StoreError::Connection("connection reset".to_string())));
        store
            .expect_update_execution()
            .withf(|_, status, _| *status == ExecutionStatus::Success)
            .times(1)
            .returning(|_, _, _| Ok(()));
        store.expect_insert_transaction().returning(|_, _, _, _| Ok(10));
        store.expect_update_transaction().returning(|_, _, _, _| Ok(()));

        let root = tempfile::tempdir().unwrap();
        let fx = fixture_with_store(root, HolidaySet::empty(), share(store));
        seed(&fx.network.join("10.2025").join("13"), &[("SAL_1310.txt", "1\n")]);

        let report = fx.runner.run().unwrap();
        assert_eq!(report.status, ExecutionStatus::Success);
        assert_eq!(report.error, None);
        assert_eq!(report.failed_items(), 0);
    }

    #[test]
    fn test_error_notification_carries_failing_line() {
        let fx = fixture(HolidaySet::empty());

        let mut notifier = MockNotifier::new();
        notifier
            .expect_send()
            .withf(|n| n.kind == crate::notify::NotificationKind::Start)
            .returning(|_| Ok(()));
        notifier
            .expect_send()
            .withf(|n| {
                n.kind == crate::notify::NotificationKind::Error
                    && n.body.lines().any(|line| {
                        line.strip_prefix("Error line: ").is_some_and(|value| {
                            !value.is_empty() && value.chars().all(|c| c.is_ascii_digit())
                        })
                    })
            })
            .times(1)
            .returning(|_| Ok(()));

        let composer = NotificationComposer::new("P", "Bot", "bot@example.com", &[]);
        let runner = fx.runner.with_notifications(Arc::new(notifier), composer);

        let report = runner.run().unwrap();
        assert_eq!(report.status, ExecutionStatus::Failure);
        assert!(fx
            .sink
            .records()
            .iter()
            .any(|r| r.message.contains("Kind: NotFoundError - Line: ")));
    }

    #[test]
    fn test_run_failure_records_question_mark_site() {
        fn raise() -> Result<(), RunFailure> {
            Err::<(), _>(RpaError::not_found("/share"))?;
            Ok(())
        }

        let failure = raise().unwrap_err();
        assert_eq!(failure.location.file(), file!());
        assert!(failure.notice().contains(&format!("Line: {}", failure.location.line())));
        assert!(failure.notice().starts_with("Folder not found: /share"));
    }
}
