//! The job: control flow over resolution, discovery, staging and per-item
//! transactions.

mod processor;
mod report;
mod runner;

pub use processor::{ItemProcessor, LineCountProcessor};
pub use report::{ItemOutcome, RunReport};
pub use runner::JobRunner;
