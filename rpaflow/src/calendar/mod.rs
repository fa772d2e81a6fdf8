//! Business-day calendar: weekend rule, holiday set and resolver.

mod holidays;
mod resolver;

pub use holidays::{HolidaySet, HolidaySource, HolidayTable};
pub use resolver::{BusinessDayResolver, WeekendRule, DEFAULT_MAX_LOOKBACK_DAYS};
