//! # rpaflow
//!
//! A single-run automation job that stages the previous business day's input
//! files from a network share and tracks the run in a status store.
//!
//! A run:
//!
//! - **Resolves the business day**: the latest day before today that is not
//!   a weekend day or a holiday
//! - **Locates input**: `<root>/<MM>.<YYYY>/<DD>`, classified by the `SAL`,
//!   `FORN` and `EXTREL` markers
//! - **Stages**: clears the local staging folder and copies the files in
//! - **Tracks**: one execution row per run, one transaction row per file
//! - **Logs**: a fixed-width table file plus the `LOG` table
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use rpaflow::prelude::*;
//!
//! let store = share(SqliteStatusStore::new("rpa.db"));
//! let tracker = ExecutionTracker::new(store.clone(), clock.clone(), "FIN001");
//! let runner = JobRunner::new("FIN001", tracker, logger, resolver, locator, stager, clock);
//!
//! let report = runner.run()?;
//! ```

#![forbid(unsafe_code)]
#![warn(
    clippy::all,
    clippy::pedantic,
    missing_docs,
    rust_2018_idioms
)]
#![allow(
    clippy::module_name_repetitions,
    clippy::must_use_candidate,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc
)]

pub mod calendar;
pub mod config;
pub mod core;
pub mod errors;
pub mod input;
pub mod job;
pub mod logging;
pub mod notify;
pub mod tracking;
pub mod utils;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::calendar::{BusinessDayResolver, HolidaySet, HolidaySource, WeekendRule};
    pub use crate::config::{JobConfig, MailCredentials};
    pub use crate::core::{
        ExecutionId, ExecutionStatus, LogStatus, ProcessType, TransactionId,
        TransactionStatus, TransitionPolicy,
    };
    pub use crate::errors::{
        ConfigError, ResolutionError, RpaError, StagingError, StoreError,
        TransitionError,
    };
    pub use crate::input::{
        ClassifiedFileSet, DuplicatePolicy, FileSystem, InputLocator, LocalStager,
        StdFileSystem,
    };
    pub use crate::job::{ItemProcessor, JobRunner, LineCountProcessor, RunReport};
    pub use crate::logging::{DbLogSink, LogSink, StatusLogger};
    pub use crate::notify::{LoggingNotifier, NotificationComposer, Notifier};
    pub use crate::tracking::{
        share, ExecutionTracker, SharedStore, SqliteStatusStore, StatusStore,
    };
    pub use crate::utils::{Clock, SystemClock, Timestamp};
}
