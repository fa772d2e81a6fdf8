//! Timestamp and calendar-date helpers.

use chrono::{DateTime, Local, NaiveDate, NaiveDateTime, Utc};
use thiserror::Error;

/// Represents a timestamp that can be serialized/deserialized.
pub type Timestamp = DateTime<Utc>;

/// Errors that can occur during timestamp parsing.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TimestampError {
    /// The timestamp string is empty.
    #[error("Empty timestamp string")]
    EmptyString,

    /// The timestamp value is invalid.
    #[error("Invalid timestamp: {0}")]
    InvalidFormat(String),
}

/// Day-first layouts accepted for calendar cells, tried in order.
const DAY_FIRST_DATE_FORMATS: &[&str] = &[
    "%d/%m/%y",
    "%d/%m/%Y",
    "%d-%m-%Y",
    "%d.%m.%Y",
    "%Y-%m-%d",
    "%Y/%m/%d",
];

const DAY_FIRST_DATETIME_FORMATS: &[&str] = &[
    "%d/%m/%Y %H:%M:%S",
    "%d/%m/%Y %H:%M",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M:%S%.f",
];

/// Formats a timestamp as ISO 8601 string. This is the layout stored in the
/// `START_TIME`, `END_TIME` and `CREATED_AT` columns.
#[must_use]
pub fn format_iso8601(dt: &Timestamp) -> String {
    dt.format("%Y-%m-%dT%H:%M:%S%.6f+00:00").to_string()
}

/// Parses a timestamp previously written with [`format_iso8601`].
///
/// # Errors
///
/// Returns `TimestampError` if the input is empty or not RFC 3339.
pub fn parse_iso8601(input: &str) -> Result<Timestamp, TimestampError> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(TimestampError::EmptyString);
    }

    DateTime::parse_from_rfc3339(&trimmed.replace('Z', "+00:00"))
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|_| TimestampError::InvalidFormat(trimmed.to_string()))
}

/// Parses a calendar cell, reading ambiguous dates day-first
/// (`05/10/2023` is 5 October).
///
/// # Errors
///
/// Returns `TimestampError` if no known layout matches.
pub fn parse_day_first_date(input: &str) -> Result<NaiveDate, TimestampError> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(TimestampError::EmptyString);
    }

    for fmt in DAY_FIRST_DATE_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(trimmed, fmt) {
            return Ok(date);
        }
    }

    for fmt in DAY_FIRST_DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(trimmed, fmt) {
            return Ok(dt.date());
        }
    }

    Err(TimestampError::InvalidFormat(trimmed.to_string()))
}

/// Local wall-clock stamp used in log file names (`20251013_081500`).
#[must_use]
pub fn file_stamp(at: &DateTime<Local>) -> String {
    at.format("%Y%m%d_%H%M%S").to_string()
}

/// Local wall-clock stamp used in the log table's TIMESTAMP column.
#[must_use]
pub fn table_stamp(at: &DateTime<Local>) -> String {
    at.format("%Y-%m-%d %H:%M:%S").to_string()
}
