//! Signed business-day arithmetic.
//!
//! Not invertible: `add_business_days(add_business_days(d, n), -n)` only returns `d`
//! when `d` is itself a business day, because the forward result always lands on one.

use chrono::{Duration, NaiveDate};

use crate::calendar::{BusinessCalendar, Direction};

/// Move `days` business days away from `from`, counting only business days.
///
/// A zero offset returns `from` when it is a business day and otherwise rolls
/// forward to the next one, so every result is a business day.
pub fn add_business_days(calendar: &BusinessCalendar, from: NaiveDate, days: i64) -> NaiveDate {
    if days == 0 {
        return calendar.nearest_business_day(from, Direction::Forward);
    }

    let step = if days > 0 {
        Duration::days(1)
    } else {
        Duration::days(-1)
    };
    let target = days.unsigned_abs();
    let mut current = from;
    let mut count = 0;
    while count < target {
        current = current + step;
        if calendar.is_business_day(current) {
            count += 1;
        }
    }
    current
}
