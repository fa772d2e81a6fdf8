//! The status logger: a pipe-table log file plus the `LOG` table.

use parking_lot::Mutex;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::panic::Location;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use super::sink::LogSink;
use super::table::{self, TableRow};
use crate::core::{ExecutionId, LogRecord, LogStatus, ProcessType, TransactionId};
use crate::utils::{file_stamp, table_stamp, Clock};

#[derive(Debug, Default)]
struct Correlation {
    execution_id: Option<ExecutionId>,
    transaction_id: Option<TransactionId>,
}

/// Durable structured logging correlated with the current execution and
/// transaction.
///
/// Every entry is appended to the log file, mirrored to `tracing` at the
/// level its status maps to, and handed to the sink once an execution id is
/// set. File write failures are reported through `tracing` and never
/// interrupt the job.
pub struct StatusLogger {
    path: PathBuf,
    file: Mutex<Option<File>>,
    sink: Arc<dyn LogSink>,
    clock: Arc<dyn Clock>,
    ids: Mutex<Correlation>,
}

impl StatusLogger {
    /// Creates `<dir>/rpa_<project>_<stamp>.log`, writes the table header
    /// and returns the logger. `dir` is created if missing.
    pub fn create(
        dir: &Path,
        project: &str,
        sink: Arc<dyn LogSink>,
        clock: Arc<dyn Clock>,
    ) -> io::Result<Self> {
        fs::create_dir_all(dir)?;
        let path = dir.join(format!("rpa_{project}_{}.log", file_stamp(&clock.local_now())));

        let mut file = OpenOptions::new().create(true).append(true).open(&path)?;
        file.write_all(table::header().as_bytes())?;

        tracing::debug!(path = %path.display(), "Status log file created");
        Ok(Self {
            path,
            file: Mutex::new(Some(file)),
            sink,
            clock,
            ids: Mutex::new(Correlation::default()),
        })
    }

    /// The log file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Sets the execution id attached to later entries.
    pub fn set_execution_id(&self, id: ExecutionId) {
        self.ids.lock().execution_id = Some(id);
    }

    /// Sets the transaction id attached to later entries.
    pub fn set_transaction_id(&self, id: TransactionId) {
        self.ids.lock().transaction_id = Some(id);
    }

    /// Clears the transaction id.
    pub fn clear_transaction_id(&self) {
        self.ids.lock().transaction_id = None;
    }

    /// The current execution id.
    #[must_use]
    pub fn execution_id(&self) -> Option<ExecutionId> {
        self.ids.lock().execution_id
    }

    /// The current transaction id.
    #[must_use]
    pub fn transaction_id(&self) -> Option<TransactionId> {
        self.ids.lock().transaction_id
    }

    /// Logs an informational entry.
    #[track_caller]
    pub fn log_info(&self, function: &str, message: &str, process_type: ProcessType) {
        self.entry(function, message, process_type, LogStatus::Info, Location::caller());
    }

    /// Logs a success entry.
    #[track_caller]
    pub fn log_success(&self, function: &str, message: &str, process_type: ProcessType) {
        self.entry(function, message, process_type, LogStatus::Success, Location::caller());
    }

    /// Logs a warning entry.
    #[track_caller]
    pub fn log_warning(&self, function: &str, message: &str, process_type: ProcessType) {
        self.entry(function, message, process_type, LogStatus::Warning, Location::caller());
    }

    /// Logs a failure entry.
    #[track_caller]
    pub fn log_error(&self, function: &str, message: &str, process_type: ProcessType) {
        self.entry(function, message, process_type, LogStatus::Failure, Location::caller());
    }

    /// Logs a critical entry, followed by a separator in the log file.
    #[track_caller]
    pub fn log_critical(&self, function: &str, message: &str, process_type: ProcessType) {
        self.entry(function, message, process_type, LogStatus::Critical, Location::caller());
    }

    /// Writes an entry with an explicit status.
    #[track_caller]
    pub fn log(&self, function: &str, message: &str, process_type: ProcessType, status: LogStatus) {
        self.entry(function, message, process_type, status, Location::caller());
    }

    /// Writes the closing separator and closes the file. Later entries still
    /// reach `tracing` and the sink.
    pub fn finish(&self) {
        let Some(mut file) = self.file.lock().take() else {
            return;
        };
        if let Err(e) = writeln!(file, "{}", table::separator()).and_then(|()| file.flush()) {
            tracing::warn!(error = %e, path = %self.path.display(), "Failed to close status log");
        }
    }

    fn entry(
        &self,
        function: &str,
        message: &str,
        process_type: ProcessType,
        status: LogStatus,
        location: &Location<'_>,
    ) {
        let (execution_id, transaction_id) = {
            let ids = self.ids.lock();
            (ids.execution_id, ids.transaction_id)
        };
        let file_name = Path::new(location.file())
            .file_name()
            .map_or_else(|| location.file().to_string(), |n| n.to_string_lossy().into_owned());

        let row = TableRow {
            timestamp: table_stamp(&self.clock.local_now()),
            execution_id,
            transaction_id,
            function: function.to_string(),
            file: file_name.clone(),
            line: location.line(),
            message: message.to_string(),
            process_type: process_type.as_str().to_string(),
            status: status.as_str().to_string(),
        };
        self.append(&row, status);

        emit(status, function, message, execution_id, transaction_id);

        if let Some(execution_id) = execution_id {
            self.sink.write(&LogRecord {
                execution_id,
                transaction_id,
                function: function.to_string(),
                file: file_name,
                line: location.line(),
                message: message.to_string(),
                process_type,
                status,
                created_at: self.clock.now(),
            });
        }
    }

    fn append(&self, row: &TableRow, status: LogStatus) {
        let mut guard = self.file.lock();
        let Some(file) = guard.as_mut() else {
            return;
        };

        let mut text = table::format_row(row).join("\n");
        text.push('\n');
        if status == LogStatus::Critical {
            text.push_str(&table::separator());
            text.push('\n');
        }
        if let Err(e) = file.write_all(text.as_bytes()) {
            tracing::warn!(error = %e, path = %self.path.display(), "Failed to write status log");
        }
    }
}

fn emit(
    status: LogStatus,
    function: &str,
    message: &str,
    execution_id: Option<ExecutionId>,
    transaction_id: Option<TransactionId>,
) {
    match status.level() {
        tracing::Level::ERROR => {
            tracing::error!(execution_id, transaction_id, function, status = %status, "{message}");
        }
        tracing::Level::WARN => {
            tracing::warn!(execution_id, transaction_id, function, status = %status, "{message}");
        }
        _ => {
            tracing::info!(execution_id, transaction_id, function, status = %status, "{message}");
        }
    }
}

impl Drop for StatusLogger {
    fn drop(&mut self) {
        self.finish();
    }
}

impl std::fmt::Debug for StatusLogger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StatusLogger")
            .field("path", &self.path)
            .finish_non_exhaustive()
    }
}
