//! Start, finish and error notifications.
//!
//! Notifications are composed here and handed to a [`Notifier`]. The shipped
//! [`LoggingNotifier`] records them through `tracing`; mail delivery belongs
//! to whatever implementation the binary wires in.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::LazyLock;

use crate::core::{ExecutionId, TransactionId};
use crate::errors::RpaError;

#[allow(clippy::expect_used)]
static ERROR_LINE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)line\s*[:=]\s*(\d+)").expect("valid regex"));

/// The moment in the run a notification reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationKind {
    /// The execution was created.
    Start,
    /// The execution finished successfully.
    Finish,
    /// The execution was interrupted.
    Error,
}

impl fmt::Display for NotificationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Start => "Start",
            Self::Finish => "Finish",
            Self::Error => "Error",
        };
        f.write_str(s)
    }
}

/// A composed notification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    /// What it reports.
    pub kind: NotificationKind,
    /// Sender address.
    pub sender: String,
    /// Resolved recipients; never empty.
    pub recipients: Vec<String>,
    /// Carbon-copy addresses.
    pub cc: Vec<String>,
    /// Subject line.
    pub subject: String,
    /// Plain-text body.
    pub body: String,
    /// The execution it reports on.
    pub execution_id: ExecutionId,
}

/// Delivers notifications.
#[cfg_attr(test, mockall::automock)]
pub trait Notifier: Send + Sync {
    /// Sends `notification`.
    fn send(&self, notification: &Notification) -> Result<(), RpaError>;
}

/// A notifier that only records notifications in the console log.
#[derive(Debug, Clone, Copy, Default)]
pub struct LoggingNotifier;

impl Notifier for LoggingNotifier {
    fn send(&self, notification: &Notification) -> Result<(), RpaError> {
        tracing::info!(
            kind = %notification.kind,
            execution_id = notification.execution_id,
            recipients = %notification.recipients.join(", "),
            subject = %notification.subject,
            "Notification"
        );
        Ok(())
    }
}

/// Splits a comma-separated address list, dropping blanks.
#[must_use]
pub fn split_addresses(text: &str) -> Vec<String> {
    text.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// Returns the configured recipients, or the sender when none are usable.
#[must_use]
pub fn resolve_recipients(configured: &[String], sender: &str) -> Vec<String> {
    let recipients: Vec<String> = configured
        .iter()
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect();
    if recipients.is_empty() {
        vec![sender.to_string()]
    } else {
        recipients
    }
}

/// Builds notifications for one process.
#[derive(Debug, Clone)]
pub struct NotificationComposer {
    process_name: String,
    robot_name: String,
    sender: String,
    recipients: Vec<String>,
    cc: Vec<String>,
}

impl NotificationComposer {
    /// Creates a composer. `recipients` falls back to `sender` when empty.
    #[must_use]
    pub fn new(
        process_name: impl Into<String>,
        robot_name: impl Into<String>,
        sender: impl Into<String>,
        recipients: &[String],
    ) -> Self {
        let sender = sender.into();
        Self {
            process_name: process_name.into(),
            robot_name: robot_name.into(),
            recipients: resolve_recipients(recipients, &sender),
            sender,
            cc: Vec::new(),
        }
    }

    /// Sets the carbon-copy list.
    #[must_use]
    pub fn with_cc(mut self, cc: Vec<String>) -> Self {
        self.cc = cc;
        self
    }

    /// The execution has started.
    #[must_use]
    pub fn start(&self, execution_id: ExecutionId) -> Notification {
        let body = format!(
            "Process {} has started.\nExecution ID: {execution_id}\n\
             You will receive another message when the process completes.",
            self.process_name
        );
        self.build(
            NotificationKind::Start,
            format!("Process {} started", self.robot_name),
            body,
            execution_id,
        )
    }

    /// The execution completed successfully.
    #[must_use]
    pub fn finish(&self, execution_id: ExecutionId) -> Notification {
        let body = format!(
            "Process {} completed successfully.\nExecution ID: {execution_id}",
            self.process_name
        );
        self.build(
            NotificationKind::Finish,
            format!("Process {} completed successfully", self.robot_name),
            body,
            execution_id,
        )
    }

    /// The execution was interrupted by `message`.
    #[must_use]
    pub fn error(
        &self,
        execution_id: ExecutionId,
        transaction_id: Option<TransactionId>,
        message: &str,
    ) -> Notification {
        let transaction = transaction_id.map(|id| id.to_string()).unwrap_or_default();
        let item = transaction_id.map(|id| format!("Transaction {id}")).unwrap_or_default();
        let line = ERROR_LINE
            .captures(message)
            .and_then(|c| c.get(1))
            .map(|m| m.as_str())
            .unwrap_or_default();

        let body = format!(
            "Process {} was interrupted.\n\
             Execution ID: {execution_id}\n\
             Transaction ID: {transaction}\n\
             Item: {item}\n\
             Error message: {message}\n\
             Error line: {line}\n\
             Context: {}",
            self.process_name, self.robot_name
        );
        self.build(
            NotificationKind::Error,
            format!("Error running process {}", self.robot_name),
            body,
            execution_id,
        )
    }

    fn build(
        &self,
        kind: NotificationKind,
        subject: String,
        body: String,
        execution_id: ExecutionId,
    ) -> Notification {
        Notification {
            kind,
            sender: self.sender.clone(),
            recipients: self.recipients.clone(),
            cc: self.cc.clone(),
            subject,
            body,
            execution_id,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn composer(recipients: &[&str]) -> NotificationComposer {
        let recipients: Vec<String> = recipients.iter().map(|s| s.to_string()).collect();
        NotificationComposer::new("Conciliação FIN001", "FIN001 Bot", "bot@example.com", &recipients)
    }

    #[test]
    fn test_split_addresses() {
        assert_eq!(
            split_addresses(" a@x.com, ,b@x.com ,"),
            vec!["a@x.com".to_string(), "b@x.com".to_string()]
        );
        assert!(split_addresses("").is_empty());
    }

    #[test]
    fn test_recipients_fall_back_to_sender() {
        assert_eq!(composer(&[]).start(1).recipients, vec!["bot@example.com"]);
        assert_eq!(composer(&["  "]).start(1).recipients, vec!["bot@example.com"]);
        assert_eq!(
            composer(&["ops@example.com"]).finish(1).recipients,
            vec!["ops@example.com"]
        );
    }

    #[test]
    fn test_start_and_finish() {
        let c = composer(&["ops@example.com"]);
        let start = c.start(12);
        assert_eq!(start.kind, NotificationKind::Start);
        assert_eq!(start.subject, "Process FIN001 Bot started");
        assert!(start.body.contains("Execution ID: 12"));

        let finish = c.finish(12);
        assert!(finish.body.contains("completed successfully"));
    }

    #[test]
    fn test_error_extracts_line() {
        let n = composer(&[]).error(3, None, "Error: Folder not found: /x - Line: 88");
        assert_eq!(n.kind, NotificationKind::Error);
        assert!(n.body.contains("Error line: 88"));
        assert!(n.body.contains("Transaction ID: \n"));

        let n = composer(&[]).error(3, Some(9), "boom");
        assert!(n.body.contains("Item: Transaction 9"));
        assert!(n.body.contains("Error line: \n"));
    }

    #[test]
    fn test_logging_notifier_accepts_everything() {
        let n = composer(&[]).start(1);
        assert!(LoggingNotifier.send(&n).is_ok());
    }
}
