//! Execution and transaction status tracking.
//!
//! [`ExecutionTracker`] drives the lifecycle state machine; the rows live in
//! a [`StatusStore`], which the log sink shares for the life of the process.

pub mod sqlite;
pub mod store;
mod tracker;

pub use sqlite::SqliteStatusStore;
pub use store::{share, ConnectionInfo, SharedStore, StatusStore};
pub use tracker::ExecutionTracker;
