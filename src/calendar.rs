use chrono::{Datelike, Duration, NaiveDate, Weekday};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;

use crate::error::{RepositoryResult, ScheduleError, ScheduleResult};
use crate::persistence::HolidaySource;

/// Direction used when rounding a non-business day to a business day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Forward,
    Backward,
}

impl Direction {
    fn step(self) -> Duration {
        match self {
            Direction::Forward => Duration::days(1),
            Direction::Backward => Duration::days(-1),
        }
    }
}

/// Immutable view of which days can carry a deadline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BusinessCalendar {
    holidays: HashSet<NaiveDate>,
    non_working_days: HashSet<Weekday>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CalendarConfig {
    working_days: Vec<Weekday>,
    #[serde(default)]
    holidays: Vec<NaiveDate>,
}

impl Default for BusinessCalendar {
    fn default() -> Self {
        Self {
            holidays: HashSet::new(),
            non_working_days: HashSet::from([Weekday::Sat, Weekday::Sun]),
        }
    }
}

impl BusinessCalendar {
    const ALL_WEEKDAYS: [Weekday; 7] = [
        Weekday::Mon,
        Weekday::Tue,
        Weekday::Wed,
        Weekday::Thu,
        Weekday::Fri,
        Weekday::Sat,
        Weekday::Sun,
    ];

    /// Monday to Friday with the given holidays.
    pub fn with_holidays<I>(holidays: I) -> Self
    where
        I: IntoIterator<Item = NaiveDate>,
    {
        let mut calendar = Self::default();
        calendar.holidays.extend(holidays);
        calendar
    }

    pub fn from_config(config: &CalendarConfig) -> ScheduleResult<Self> {
        let working_set: HashSet<Weekday> = config.working_days.iter().copied().collect();
        if working_set.is_empty() {
            return Err(ScheduleError::InvalidCalendar(
                "at least one working day is required".into(),
            ));
        }
        let non_working_days = Self::ALL_WEEKDAYS
            .into_iter()
            .filter(|day| !working_set.contains(day))
            .collect();

        Ok(Self {
            holidays: config.holidays.iter().copied().collect(),
            non_working_days,
        })
    }

    pub fn to_config(&self) -> CalendarConfig {
        CalendarConfig::from(self)
    }

    pub fn is_business_day(&self, date: NaiveDate) -> bool {
        !self.holidays.contains(&date) && !self.non_working_days.contains(&date.weekday())
    }

    pub fn add_holiday(&mut self, date: NaiveDate) -> bool {
        self.holidays.insert(date)
    }

    pub fn remove_holiday(&mut self, date: NaiveDate) -> bool {
        self.holidays.remove(&date)
    }

    pub fn replace_holidays<I>(&mut self, holidays: I)
    where
        I: IntoIterator<Item = NaiveDate>,
    {
        self.holidays = holidays.into_iter().collect();
    }

    pub fn holidays(&self) -> Vec<NaiveDate> {
        let mut holidays: Vec<NaiveDate> = self.holidays.iter().copied().collect();
        holidays.sort();
        holidays
    }

    /// Returns `date` if it is a business day, otherwise the first business day reached
    /// by stepping one calendar day at a time in `direction`.
    ///
    /// Stepping past the representable date range panics.
    pub fn nearest_business_day(&self, date: NaiveDate, direction: Direction) -> NaiveDate {
        let step = direction.step();
        let mut current = date;
        while !self.is_business_day(current) {
            current = current + step;
        }
        current
    }

    /// Shift `date` by a signed number of business days.
    /// See [`crate::calculations::business_days::add_business_days`].
    pub fn add_business_days(&self, date: NaiveDate, days: i64) -> NaiveDate {
        crate::calculations::business_days::add_business_days(self, date, days)
    }
}

impl CalendarConfig {
    /// Panics if `working_days` is empty.
    pub fn new<I, J>(working_days: I, holidays: J) -> Self
    where
        I: IntoIterator<Item = Weekday>,
        J: IntoIterator<Item = NaiveDate>,
    {
        match Self::try_new(working_days, holidays) {
            Ok(config) => config,
            Err(_) => panic!("CalendarConfig requires at least one working day"),
        }
    }

    pub fn try_new<I, J>(working_days: I, holidays: J) -> ScheduleResult<Self>
    where
        I: IntoIterator<Item = Weekday>,
        J: IntoIterator<Item = NaiveDate>,
    {
        let mut working: Vec<Weekday> = working_days.into_iter().collect();
        if working.is_empty() {
            return Err(ScheduleError::InvalidCalendar(
                "at least one working day is required".into(),
            ));
        }
        working.sort_by_key(|wd| wd.num_days_from_monday());
        working.dedup_by(|a, b| a.num_days_from_monday() == b.num_days_from_monday());

        let mut holidays: Vec<NaiveDate> = holidays.into_iter().collect();
        holidays.sort();
        holidays.dedup();

        Ok(Self {
            working_days: working,
            holidays,
        })
    }

    pub fn working_days(&self) -> &[Weekday] {
        &self.working_days
    }

    pub fn holidays(&self) -> &[NaiveDate] {
        &self.holidays
    }
}

impl Default for CalendarConfig {
    fn default() -> Self {
        CalendarConfig::from(&BusinessCalendar::default())
    }
}

impl From<&BusinessCalendar> for CalendarConfig {
    fn from(calendar: &BusinessCalendar) -> Self {
        let working = BusinessCalendar::ALL_WEEKDAYS
            .into_iter()
            .filter(|day| !calendar.non_working_days.contains(day))
            .collect();

        Self {
            working_days: working,
            holidays: calendar.holidays(),
        }
    }
}

/// Process-wide calendar handle.
///
/// Readers take an `Arc` snapshot and never hold the lock while computing; writers
/// build a modified copy and swap it in.
#[derive(Debug, Clone, Default)]
pub struct SharedCalendar {
    current: Arc<RwLock<Arc<BusinessCalendar>>>,
}

impl SharedCalendar {
    pub fn new(calendar: BusinessCalendar) -> Self {
        Self {
            current: Arc::new(RwLock::new(Arc::new(calendar))),
        }
    }

    pub fn snapshot(&self) -> Arc<BusinessCalendar> {
        self.current.read().clone()
    }

    pub fn add_holiday(&self, date: NaiveDate) -> bool {
        self.update(|calendar| calendar.add_holiday(date))
    }

    pub fn remove_holiday(&self, date: NaiveDate) -> bool {
        self.update(|calendar| calendar.remove_holiday(date))
    }

    /// Replace the holiday set with whatever `source` currently lists.
    pub fn refresh_from<S>(&self, source: &S) -> RepositoryResult<usize>
    where
        S: HolidaySource + ?Sized,
    {
        let holidays = source.list_holidays()?;
        let count = holidays.len();
        self.update(|calendar| calendar.replace_holidays(holidays));
        tracing::debug!(holidays = count, "calendar holidays refreshed");
        Ok(count)
    }

    fn update<T>(&self, mutator: impl FnOnce(&mut BusinessCalendar) -> T) -> T {
        let mut guard = self.current.write();
        let mut next = BusinessCalendar::clone(&guard);
        let result = mutator(&mut next);
        *guard = Arc::new(next);
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn nearest_business_day_rolls_weekend_both_ways() {
        let cal = BusinessCalendar::default();
        let sat = d(2025, 12, 27);
        assert_eq!(cal.nearest_business_day(sat, Direction::Forward), d(2025, 12, 29));
        assert_eq!(cal.nearest_business_day(sat, Direction::Backward), d(2025, 12, 26));
    }

    #[test]
    fn nearest_business_day_keeps_business_day() {
        let cal = BusinessCalendar::default();
        let wed = d(2025, 12, 31);
        assert_eq!(cal.nearest_business_day(wed, Direction::Backward), wed);
    }

    #[test]
    fn nearest_business_day_crosses_long_holiday_runs() {
        let start = d(2025, 12, 29);
        let cal = BusinessCalendar::with_holidays((0..14).map(|i| start + Duration::days(i)));
        assert_eq!(
            cal.nearest_business_day(start, Direction::Forward),
            d(2026, 1, 12)
        );
    }

    #[test]
    fn snapshot_is_unaffected_by_later_writes() {
        let shared = SharedCalendar::default();
        let before = shared.snapshot();
        let holiday = d(2026, 1, 2);
        assert!(shared.add_holiday(holiday));
        assert!(before.is_business_day(holiday));
        assert!(!shared.snapshot().is_business_day(holiday));
        assert!(shared.remove_holiday(holiday));
        assert!(shared.snapshot().is_business_day(holiday));
    }

    #[test]
    fn config_without_working_days_is_rejected() {
        let config = CalendarConfig {
            working_days: Vec::new(),
            holidays: Vec::new(),
        };
        assert!(matches!(
            BusinessCalendar::from_config(&config),
            Err(ScheduleError::InvalidCalendar(_))
        ));
    }
}
