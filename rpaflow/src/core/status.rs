//! Execution, transaction and log status enums.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Lifecycle status of an execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ExecutionStatus {
    /// The execution row exists but work has not begun.
    Starting,
    /// The job is running.
    Running,
    /// The job finished successfully.
    Success,
    /// The job failed.
    Failure,
}

impl Default for ExecutionStatus {
    fn default() -> Self {
        Self::Starting
    }
}

impl fmt::Display for ExecutionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ExecutionStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "STARTING" => Ok(Self::Starting),
            "RUNNING" => Ok(Self::Running),
            "SUCCESS" => Ok(Self::Success),
            "FAILURE" => Ok(Self::Failure),
            other => Err(format!("unknown execution status '{other}'")),
        }
    }
}

impl ExecutionStatus {
    /// The value stored in the `STATUS` column.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Starting => "STARTING",
            Self::Running => "RUNNING",
            Self::Success => "SUCCESS",
            Self::Failure => "FAILURE",
        }
    }

    /// Returns true if an execution may be created in this status.
    #[must_use]
    pub fn is_initial(&self) -> bool {
        matches!(self, Self::Starting | Self::Running)
    }

    /// Transition table for executions.
    #[must_use]
    pub fn can_transition_to(&self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Starting, Self::Running | Self::Failure)
                | (Self::Running, Self::Success | Self::Failure)
        )
    }
}

/// Lifecycle status of a transaction. Transactions start directly in `Running`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransactionStatus {
    /// The item is being processed.
    Running,
    /// The item was processed.
    Success,
    /// The item failed.
    Failure,
}

impl Default for TransactionStatus {
    fn default() -> Self {
        Self::Running
    }
}

impl fmt::Display for TransactionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TransactionStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "RUNNING" => Ok(Self::Running),
            "SUCCESS" => Ok(Self::Success),
            "FAILURE" => Ok(Self::Failure),
            other => Err(format!("unknown transaction status '{other}'")),
        }
    }
}

impl TransactionStatus {
    /// The value stored in the `STATUS` column.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Running => "RUNNING",
            Self::Success => "SUCCESS",
            Self::Failure => "FAILURE",
        }
    }

    /// Transition table for transactions.
    #[must_use]
    pub fn can_transition_to(&self, next: Self) -> bool {
        matches!((self, next), (Self::Running, Self::Success | Self::Failure))
    }
}

/// How strictly the tracker enforces the transition tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TransitionPolicy {
    /// Reject transitions outside the table with a `TransitionError`.
    #[default]
    Strict,
    /// Write any status at any time.
    Permissive,
}

/// Severity of a status log entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogStatus {
    /// Informational.
    #[serde(rename = "information")]
    Info,
    /// A step succeeded.
    Success,
    /// Something looked wrong but the run continues.
    Warning,
    /// A step failed.
    Failure,
    /// A failure severe enough to be set apart in the log file.
    Critical,
}

impl Default for LogStatus {
    fn default() -> Self {
        Self::Info
    }
}

impl fmt::Display for LogStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl LogStatus {
    /// The value written to the log file and the `LOG.STATUS` column.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Info => "information",
            Self::Success => "success",
            Self::Warning => "warning",
            Self::Failure => "failure",
            Self::Critical => "critical",
        }
    }

    /// The console level this status maps to.
    #[must_use]
    pub fn level(&self) -> tracing::Level {
        match self {
            Self::Critical | Self::Failure => tracing::Level::ERROR,
            Self::Warning => tracing::Level::WARN,
            Self::Info | Self::Success => tracing::Level::INFO,
        }
    }
}

/// The kind of work a log entry describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProcessType {
    /// Robot-level mechanics (file moves, UI automation).
    Robotic,
    /// Business rules.
    Business,
    /// Infrastructure and plumbing.
    System,
    /// The overall process lifecycle.
    Process,
}

impl Default for ProcessType {
    fn default() -> Self {
        Self::System
    }
}

impl fmt::Display for ProcessType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl ProcessType {
    /// The value written to the log file and the `LOG.PROCESSTYPE` column.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Robotic => "robotic",
            Self::Business => "business",
            Self::System => "system",
            Self::Process => "process",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_execution_status_display() {
        assert_eq!(ExecutionStatus::Starting.to_string(), "STARTING");
        assert_eq!(ExecutionStatus::Failure.to_string(), "FAILURE");
    }

    #[test]
    fn test_execution_transition_table() {
        use ExecutionStatus::*;

        assert!(Starting.can_transition_to(Running));
        assert!(Starting.can_transition_to(Failure));
        assert!(Running.can_transition_to(Success));
        assert!(Running.can_transition_to(Failure));

        assert!(!Starting.can_transition_to(Success));
        assert!(!Running.can_transition_to(Starting));
        assert!(!Success.can_transition_to(Failure));
        assert!(!Failure.can_transition_to(Running));
    }

    #[test]
    fn test_transaction_transition_table() {
        use TransactionStatus::*;

        assert!(Running.can_transition_to(Success));
        assert!(Running.can_transition_to(Failure));
        assert!(!Success.can_transition_to(Failure));
        assert!(!Running.can_transition_to(Running));
    }

    #[test]
    fn test_status_from_str_round_trip() {
        for status in [
            ExecutionStatus::Starting,
            ExecutionStatus::Running,
            ExecutionStatus::Success,
            ExecutionStatus::Failure,
        ] {
            assert_eq!(status.as_str().parse::<ExecutionStatus>(), Ok(status));
        }
        assert!("PENDING".parse::<ExecutionStatus>().is_err());
        assert_eq!("success".parse::<TransactionStatus>(), Ok(TransactionStatus::Success));
    }

    #[test]
    fn test_log_status_serialize() {
        let json = serde_json::to_string(&LogStatus::Info).unwrap();
        assert_eq!(json, r#""information""#);
        assert_eq!(LogStatus::Failure.level(), tracing::Level::ERROR);
        assert_eq!(LogStatus::Success.level(), tracing::Level::INFO);
    }

    #[test]
    fn test_transition_policy_default() {
        assert_eq!(TransitionPolicy::default(), TransitionPolicy::Strict);
        let policy: TransitionPolicy = serde_json::from_str(r#""permissive""#).unwrap();
        assert_eq!(policy, TransitionPolicy::Permissive);
    }
}
