//! Business-day resolution.

use chrono::{Datelike, Duration, NaiveDate, Weekday};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::HolidaySet;
use crate::errors::{ConfigError, ResolutionError};

/// Default bound on how far back resolution may walk (about ten years).
pub const DEFAULT_MAX_LOOKBACK_DAYS: u32 = 3650;

/// The days of the week that are never business days.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WeekendRule {
    days: Vec<Weekday>,
}

impl Default for WeekendRule {
    fn default() -> Self {
        Self {
            days: vec![Weekday::Sat, Weekday::Sun],
        }
    }
}

impl WeekendRule {
    /// Creates a rule from explicit weekend days.
    #[must_use]
    pub fn new(days: impl IntoIterator<Item = Weekday>) -> Self {
        let mut days: Vec<Weekday> = days.into_iter().collect();
        days.sort_by_key(Weekday::num_days_from_monday);
        days.dedup();
        Self { days }
    }

    /// Parses day names such as `"Saturday"` or `"sat"`.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` for unknown names, or if every day of
    /// the week would be a weekend day.
    pub fn from_names<S: AsRef<str>>(names: &[S]) -> Result<Self, ConfigError> {
        let days = names
            .iter()
            .map(|n| {
                n.as_ref()
                    .trim()
                    .parse::<Weekday>()
                    .map_err(|_| ConfigError::invalid("weekend", format!("unknown day '{}'", n.as_ref())))
            })
            .collect::<Result<Vec<_>, _>>()?;

        let rule = Self::new(days);
        if rule.days.len() >= 7 {
            return Err(ConfigError::invalid("weekend", "every day cannot be a weekend day"));
        }
        Ok(rule)
    }

    /// Returns true if `date` falls on a weekend day.
    #[must_use]
    pub fn is_weekend(&self, date: NaiveDate) -> bool {
        self.days.contains(&date.weekday())
    }

    /// The weekend days, Monday first.
    #[must_use]
    pub fn days(&self) -> &[Weekday] {
        &self.days
    }
}

/// Finds the most recent business day before a given date.
#[derive(Debug, Clone)]
pub struct BusinessDayResolver {
    weekend: WeekendRule,
    holidays: HolidaySet,
    max_lookback_days: u32,
}

impl BusinessDayResolver {
    /// Creates a resolver with the default lookback bound.
    #[must_use]
    pub fn new(weekend: WeekendRule, holidays: HolidaySet) -> Self {
        Self {
            weekend,
            holidays,
            max_lookback_days: DEFAULT_MAX_LOOKBACK_DAYS,
        }
    }

    /// Sets the lookback bound.
    #[must_use]
    pub fn with_max_lookback_days(mut self, days: u32) -> Self {
        self.max_lookback_days = days;
        self
    }

    /// Returns true if `date` is neither a weekend day nor a holiday.
    #[must_use]
    pub fn is_business_day(&self, date: NaiveDate) -> bool {
        !self.weekend.is_weekend(date) && !self.holidays.contains(&date)
    }

    /// Returns the latest business day strictly before `today`.
    ///
    /// # Errors
    ///
    /// Returns `ResolutionError` if none is found within the lookback bound.
    pub fn resolve(&self, today: NaiveDate) -> Result<NaiveDate, ResolutionError> {
        let exceeded = || ResolutionError {
            today,
            max_lookback_days: self.max_lookback_days,
        };

        let mut candidate = today.pred_opt().ok_or_else(exceeded)?;
        let mut steps = 1u32;
        while !self.is_business_day(candidate) {
            if steps >= self.max_lookback_days {
                return Err(exceeded());
            }
            candidate = candidate
                .checked_sub_signed(Duration::days(1))
                .ok_or_else(exceeded)?;
            steps += 1;
        }

        debug!(%today, business_day = %candidate, skipped = steps - 1, "Resolved business day");
        Ok(candidate)
    }

    /// The holiday calendar in use.
    #[must_use]
    pub fn holidays(&self) -> &HolidaySet {
        &self.holidays
    }
}
