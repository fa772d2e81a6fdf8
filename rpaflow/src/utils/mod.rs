//! Utility functions for identifiers, timestamps and the clock port.

mod clock;
pub mod timestamps;

pub use clock::{Clock, FixedClock, OverrideToday, SystemClock};
pub use timestamps::{
    file_stamp, format_iso8601, parse_day_first_date, parse_iso8601, table_stamp,
    Timestamp, TimestampError,
};

use uuid::Uuid;

/// Generates a new UUID v4, used to correlate console output for a run
/// before the store has assigned an execution id.
#[must_use]
pub fn generate_run_id() -> Uuid {
    Uuid::new_v4()
}
