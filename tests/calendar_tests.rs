use case_schedule::{
    BusinessCalendar, CalendarConfig, Direction, SharedCalendar, StaticHolidays, add_business_days,
};
use chrono::{Datelike, NaiveDate, Weekday};

fn d(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

#[test]
fn default_calendar_weekends_unavailable() {
    let cal = BusinessCalendar::default();
    // 2025-01-04 is a Saturday, 2025-01-05 is a Sunday
    assert!(!cal.is_business_day(d(2025, 1, 4)));
    assert!(!cal.is_business_day(d(2025, 1, 5)));
    assert!(cal.is_business_day(d(2025, 1, 6)));
}

#[test]
fn holidays_are_not_business_days() {
    let mut cal = BusinessCalendar::default();
    let christmas = d(2025, 12, 25);
    assert!(cal.is_business_day(christmas));
    assert!(cal.add_holiday(christmas));
    assert!(!cal.add_holiday(christmas));
    assert!(!cal.is_business_day(christmas));
    assert!(cal.remove_holiday(christmas));
    assert!(cal.is_business_day(christmas));
}

#[test]
fn nearest_business_day_rounds_in_requested_direction() {
    let cal = BusinessCalendar::with_holidays([d(2026, 1, 5)]);
    let saturday = d(2026, 1, 3);
    // Monday 2026-01-05 is a holiday, so forward lands on Tuesday
    assert_eq!(
        cal.nearest_business_day(saturday, Direction::Forward),
        d(2026, 1, 6)
    );
    assert_eq!(
        cal.nearest_business_day(saturday, Direction::Backward),
        d(2026, 1, 2)
    );
    let wednesday = d(2026, 1, 7);
    assert_eq!(
        cal.nearest_business_day(wednesday, Direction::Backward),
        wednesday
    );
}

#[test]
fn add_business_days_counts_only_workdays() {
    let cal = BusinessCalendar::default();
    let mon = d(2025, 1, 6);
    let four_ahead = add_business_days(&cal, mon, 4);
    assert_eq!(four_ahead.weekday(), Weekday::Fri);
    assert_eq!(add_business_days(&cal, mon, 5), d(2025, 1, 13));
    assert_eq!(add_business_days(&cal, mon, -1), d(2025, 1, 3));
}

#[test]
fn zero_offset_rolls_weekend_forward() {
    let cal = BusinessCalendar::default();
    assert_eq!(add_business_days(&cal, d(2025, 1, 4), 0), d(2025, 1, 6));
    assert_eq!(add_business_days(&cal, d(2025, 1, 7), 0), d(2025, 1, 7));
}

#[test]
fn custom_working_week_from_config() {
    let config = CalendarConfig::new(
        [
            Weekday::Sun,
            Weekday::Mon,
            Weekday::Tue,
            Weekday::Wed,
            Weekday::Thu,
        ],
        [d(2026, 1, 1)],
    );
    let cal = BusinessCalendar::from_config(&config).unwrap();
    assert!(cal.is_business_day(d(2026, 1, 4))); // Sunday
    assert!(!cal.is_business_day(d(2026, 1, 2))); // Friday
    assert!(!cal.is_business_day(d(2026, 1, 1))); // holiday
    assert_eq!(cal.to_config().holidays(), &[d(2026, 1, 1)]);
}

#[test]
fn shared_calendar_refresh_replaces_holidays() {
    let shared = SharedCalendar::new(BusinessCalendar::with_holidays([d(2025, 12, 25)]));
    let before = shared.snapshot();

    let count = shared
        .refresh_from(&StaticHolidays(vec![d(2026, 1, 1), d(2026, 1, 2)]))
        .unwrap();
    assert_eq!(count, 2);

    let after = shared.snapshot();
    assert!(after.is_business_day(d(2025, 12, 25)));
    assert!(!after.is_business_day(d(2026, 1, 2)));
    // Snapshots taken earlier keep the old holiday set
    assert!(!before.is_business_day(d(2025, 12, 25)));
    assert!(before.is_business_day(d(2026, 1, 2)));
}

#[test]
fn shared_calendar_is_usable_across_threads() {
    let shared = SharedCalendar::default();
    let writer = {
        let shared = shared.clone();
        std::thread::spawn(move || {
            for day in 1..=20 {
                shared.add_holiday(d(2026, 3, day));
            }
        })
    };
    let readers: Vec<_> = (0..4)
        .map(|_| {
            let shared = shared.clone();
            std::thread::spawn(move || {
                for _ in 0..50 {
                    let cal = shared.snapshot();
                    let due = add_business_days(&cal, d(2026, 4, 30), -30);
                    assert!(cal.is_business_day(due));
                }
            })
        })
        .collect();
    writer.join().unwrap();
    for reader in readers {
        reader.join().unwrap();
    }
    assert_eq!(shared.snapshot().holidays().len(), 20);
}
