//! Next-run-time calculation.
//!
//! Pure functions only: no clock reads, no I/O. Callers pass `now`.

use chrono::{DateTime, Datelike, Days, Months, NaiveDate, NaiveTime, TimeDelta, Utc};

use super::schedule::ScheduleSpec;

/// Maximum number of days scanned forward for daily/weekly schedules.
const MAX_SCAN_DAYS: u64 = 31;

/// Maximum number of months scanned forward for monthly schedules.
const MAX_SCAN_MONTHS: u32 = 12;

/// Compute the next trigger time of `spec` after `now`.
///
/// Total for every input: a day-of-month that never occurs falls back to the
/// next calendar day at the earliest configured time, and a time-based spec
/// without times returns `now`.
pub fn next_run_time(spec: &ScheduleSpec, now: DateTime<Utc>) -> DateTime<Utc> {
    match spec {
        ScheduleSpec::Interval { every } => TimeDelta::from_std(*every)
            .ok()
            .and_then(|delta| now.checked_add_signed(delta))
            .unwrap_or(DateTime::<Utc>::MAX_UTC),
        _ => next_time_based_run(spec, now),
    }
}

fn next_time_based_run(spec: &ScheduleSpec, now: DateTime<Utc>) -> DateTime<Utc> {
    let times = spec.times();
    let Some(earliest) = spec.earliest_time() else {
        return now;
    };

    let today = now.date_naive();
    let current = now.time();

    if spec.matches_date(today) {
        if let Some(time) = times.iter().copied().filter(|t| *t > current).min() {
            return at(today, time);
        }
    }

    let next_date = match spec {
        ScheduleSpec::MonthlyTimes { day_of_month, .. } => next_month_day(today, *day_of_month),
        _ => (1..=MAX_SCAN_DAYS)
            .filter_map(|offset| today.checked_add_days(Days::new(offset)))
            .find(|date| spec.matches_date(*date)),
    };

    match next_date {
        Some(date) => at(date, earliest),
        None => fallback_run(today, Some(earliest)),
    }
}

/// First date strictly after `today` that falls on `day_of_month`.
fn next_month_day(today: NaiveDate, day_of_month: u32) -> Option<NaiveDate> {
    if !(1..=31).contains(&day_of_month) {
        return None;
    }

    let first_of_month = today.with_day(1)?;
    (0..=MAX_SCAN_MONTHS)
        .filter_map(|offset| first_of_month.checked_add_months(Months::new(offset)))
        .filter_map(|month| month.with_day(day_of_month))
        .find(|date| *date > today)
}

/// Deterministic fallback: tomorrow at the earliest time, or midnight.
fn fallback_run(today: NaiveDate, earliest: Option<NaiveTime>) -> DateTime<Utc> {
    let time = earliest.unwrap_or(NaiveTime::MIN);
    let date = today.succ_opt().unwrap_or(today);
    at(date, time)
}

fn at(date: NaiveDate, time: NaiveTime) -> DateTime<Utc> {
    date.and_time(time).and_utc()
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use chrono::{TimeZone, Weekday};
    use rstest::rstest;

    use super::*;
    use crate::scheduler::schedule::presets;

    fn utc(y: i32, mo: u32, d: u32, h: u32, mi: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, mo, d, h, mi, 0).unwrap()
    }

    fn t(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    #[rstest]
    #[case(Duration::from_secs(1))]
    #[case(Duration::from_secs(90))]
    #[case(Duration::from_secs(3600))]
    #[case(Duration::from_millis(1500))]
    fn test_interval_adds_duration(#[case] every: Duration) {
        let now = utc(2026, 3, 2, 8, 0);
        let next = next_run_time(&ScheduleSpec::every(every), now);
        assert_eq!(next, now + TimeDelta::from_std(every).unwrap());
    }

    #[test]
    fn test_interval_saturates() {
        let now = utc(2026, 3, 2, 8, 0);
        let next = next_run_time(&ScheduleSpec::every(Duration::MAX), now);
        assert_eq!(next, DateTime::<Utc>::MAX_UTC);
    }

    #[rstest]
    // later today
    #[case(utc(2026, 3, 2, 8, 0), utc(2026, 3, 2, 9, 0))]
    // already passed: tomorrow
    #[case(utc(2026, 3, 2, 10, 0), utc(2026, 3, 3, 9, 0))]
    // exactly on time is not strictly later
    #[case(utc(2026, 3, 2, 9, 0), utc(2026, 3, 3, 9, 0))]
    // year boundary
    #[case(utc(2026, 12, 31, 23, 0), utc(2027, 1, 1, 9, 0))]
    fn test_daily_single_time(#[case] now: DateTime<Utc>, #[case] expected: DateTime<Utc>) {
        let spec = ScheduleSpec::daily([t(9, 0)]);
        assert_eq!(next_run_time(&spec, now), expected);
    }

    #[test]
    fn test_daily_picks_earliest_remaining_time() {
        let spec = ScheduleSpec::daily([t(18, 0), t(9, 0), t(12, 30)]);
        assert_eq!(
            next_run_time(&spec, utc(2026, 3, 2, 10, 0)),
            utc(2026, 3, 2, 12, 30)
        );
        assert_eq!(
            next_run_time(&spec, utc(2026, 3, 2, 19, 0)),
            utc(2026, 3, 3, 9, 0)
        );
    }

    #[test]
    fn test_unsorted_times_pick_earliest_remaining() {
        let now = utc(2026, 3, 2, 8, 0);
        let literal = ScheduleSpec::DailyTimes {
            times: vec![t(18, 0), t(9, 0), t(12, 0)],
        };
        assert_eq!(next_run_time(&literal, now), utc(2026, 3, 2, 9, 0));
        assert_eq!(
            next_run_time(&literal, utc(2026, 3, 2, 10, 0)),
            utc(2026, 3, 2, 12, 0)
        );

        let parsed: ScheduleSpec =
            serde_json::from_str(r#"{"type":"daily_times","times":["18:00:00","09:00:00"]}"#)
                .unwrap();
        assert_eq!(next_run_time(&parsed, now), utc(2026, 3, 2, 9, 0));
        assert_eq!(
            next_run_time(&parsed, utc(2026, 3, 2, 19, 0)),
            utc(2026, 3, 3, 9, 0)
        );
    }

    #[test]
    fn test_weekly_next_monday() {
        // 2026-03-03 is a Tuesday.
        let spec = ScheduleSpec::weekly([Weekday::Mon], [t(9, 0)]);
        assert_eq!(
            next_run_time(&spec, utc(2026, 3, 3, 8, 0)),
            utc(2026, 3, 9, 9, 0)
        );
    }

    #[test]
    fn test_weekly_same_day_before_time() {
        let spec = ScheduleSpec::weekly([Weekday::Mon], [t(9, 0)]);
        assert_eq!(
            next_run_time(&spec, utc(2026, 3, 2, 7, 0)),
            utc(2026, 3, 2, 9, 0)
        );
    }

    #[test]
    fn test_weekdays_preset_skips_weekend() {
        // 2026-03-06 is a Friday; after 09:00 the next run is Monday.
        let next = next_run_time(&presets::weekdays_at_9am(), utc(2026, 3, 6, 10, 0));
        assert_eq!(next, utc(2026, 3, 9, 9, 0));
    }

    #[test]
    fn test_weekly_without_weekdays_behaves_daily() {
        let spec = ScheduleSpec::weekly([], [t(9, 0)]);
        assert_eq!(
            next_run_time(&spec, utc(2026, 3, 3, 10, 0)),
            utc(2026, 3, 4, 9, 0)
        );
    }

    #[rstest]
    // April has 30 days.
    #[case(utc(2026, 4, 15, 12, 0), utc(2026, 5, 31, 0, 0))]
    #[case(utc(2026, 4, 1, 0, 0), utc(2026, 5, 31, 0, 0))]
    #[case(utc(2026, 4, 30, 12, 0), utc(2026, 5, 31, 0, 0))]
    // February 2026 has 28 days.
    #[case(utc(2026, 2, 10, 12, 0), utc(2026, 3, 31, 0, 0))]
    fn test_monthly_31st_skips_short_months(
        #[case] now: DateTime<Utc>,
        #[case] expected: DateTime<Utc>,
    ) {
        let spec = ScheduleSpec::monthly(31, [NaiveTime::MIN]);
        let next = next_run_time(&spec, now);
        assert_eq!(next, expected);
        assert_eq!(next.day(), 31);
    }

    #[test]
    fn test_monthly_same_day() {
        let spec = ScheduleSpec::monthly(15, [t(10, 0)]);
        assert_eq!(
            next_run_time(&spec, utc(2026, 4, 15, 9, 0)),
            utc(2026, 4, 15, 10, 0)
        );
        assert_eq!(
            next_run_time(&spec, utc(2026, 4, 15, 10, 0)),
            utc(2026, 5, 15, 10, 0)
        );
    }

    #[test]
    fn test_monthly_first_preset_rolls_over_year() {
        let next = next_run_time(
            &presets::monthly_first_at_midnight(),
            utc(2026, 12, 31, 23, 59),
        );
        assert_eq!(next, utc(2027, 1, 1, 0, 0));
    }

    #[rstest]
    #[case(0)]
    #[case(32)]
    fn test_monthly_impossible_day_falls_back_to_tomorrow(#[case] day: u32) {
        let spec = ScheduleSpec::monthly(day, [t(6, 0), t(4, 0)]);
        assert_eq!(
            next_run_time(&spec, utc(2026, 4, 15, 12, 0)),
            utc(2026, 4, 16, 4, 0)
        );
    }

    #[test]
    fn test_empty_times_runs_now() {
        let now = utc(2026, 4, 15, 12, 0);
        assert_eq!(next_run_time(&ScheduleSpec::daily([]), now), now);
        assert_eq!(next_run_time(&ScheduleSpec::monthly(31, []), now), now);
    }

    #[test]
    fn test_fallback_without_times_is_midnight() {
        let today = NaiveDate::from_ymd_opt(2026, 4, 15).unwrap();
        assert_eq!(fallback_run(today, None), utc(2026, 4, 16, 0, 0));
    }
}
