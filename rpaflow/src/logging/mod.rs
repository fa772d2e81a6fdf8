//! Durable status logging.
//!
//! [`StatusLogger`] writes a fixed-width pipe table to a per-run log file and
//! forwards records that belong to an execution to a [`LogSink`], normally
//! the `LOG` table through [`DbLogSink`].

mod logger;
mod sink;
pub mod table;

pub use logger::StatusLogger;
pub use sink::{CollectingLogSink, DbLogSink, LogSink};
