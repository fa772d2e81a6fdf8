//! Clock port so date logic and stored timestamps can be pinned in tests.

use chrono::{DateTime, Local, NaiveDate, Utc};
use parking_lot::Mutex;

use super::Timestamp;

/// Source of "now" for the job.
pub trait Clock: Send + Sync {
    /// Current UTC instant, used for stored timestamps.
    fn now(&self) -> Timestamp;

    /// Current local wall-clock time, used for log file stamps.
    fn local_now(&self) -> DateTime<Local> {
        self.now().with_timezone(&Local)
    }

    /// The calendar date business-day resolution starts from.
    fn today(&self) -> NaiveDate {
        self.local_now().date_naive()
    }
}

/// The system clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Timestamp {
        Utc::now()
    }
}

/// A clock that returns a fixed instant until advanced.
#[derive(Debug)]
pub struct FixedClock {
    now: Mutex<Timestamp>,
    today: Option<NaiveDate>,
}

impl FixedClock {
    /// Creates a clock pinned at `now`.
    #[must_use]
    pub fn new(now: Timestamp) -> Self {
        Self {
            now: Mutex::new(now),
            today: None,
        }
    }

    /// Overrides the calendar date reported by [`Clock::today`].
    #[must_use]
    pub fn with_today(mut self, today: NaiveDate) -> Self {
        self.today = Some(today);
        self
    }

    /// Moves the clock forward.
    pub fn advance(&self, by: chrono::Duration) {
        let mut now = self.now.lock();
        *now += by;
    }
}

impl Clock for FixedClock {
    fn now(&self) -> Timestamp {
        *self.now.lock()
    }

    fn today(&self) -> NaiveDate {
        self.today
            .unwrap_or_else(|| self.now().with_timezone(&Local).date_naive())
    }
}

/// A clock that delegates to another but reports a different business date,
/// used when re-running the job for a past day.
pub struct OverrideToday<C> {
    inner: C,
    today: NaiveDate,
}

impl<C: Clock> OverrideToday<C> {
    /// Wraps `inner`, pinning [`Clock::today`] to `today`.
    pub fn new(inner: C, today: NaiveDate) -> Self {
        Self { inner, today }
    }
}

impl<C: Clock> Clock for OverrideToday<C> {
    fn now(&self) -> Timestamp {
        self.inner.now()
    }

    fn today(&self) -> NaiveDate {
        self.today
    }
}
