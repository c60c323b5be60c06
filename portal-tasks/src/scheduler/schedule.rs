//! Schedule specifications.
//!
//! A [`ScheduleSpec`] describes when recurring work should next run. It is
//! plain data: the next trigger time is computed by
//! [`next_run_time`](super::calculator::next_run_time).

use std::time::Duration;

use chrono::{Datelike, NaiveDate, NaiveTime, Weekday};
use serde::{Deserialize, Serialize};

/// Declarative description of a recurring schedule.
///
/// Times of day are interpreted in UTC. The constructors normalise the time
/// and weekday sets (sorted, de-duplicated); prefer them over building the
/// variants by hand.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ScheduleSpec {
    /// Fires every `every` after the previous fire.
    Interval { every: Duration },
    /// Fires at each listed time of day, every day.
    DailyTimes { times: Vec<NaiveTime> },
    /// Fires at the listed times on the listed weekdays.
    ///
    /// An empty weekday set places no restriction on the day.
    WeeklyTimes {
        weekdays: Vec<Weekday>,
        times: Vec<NaiveTime>,
    },
    /// Fires at the listed times on one day of the month.
    MonthlyTimes {
        day_of_month: u32,
        times: Vec<NaiveTime>,
    },
}

impl ScheduleSpec {
    /// Run at a fixed interval.
    pub fn every(every: Duration) -> Self {
        Self::Interval { every }
    }

    /// Run daily at the given times.
    pub fn daily(times: impl IntoIterator<Item = NaiveTime>) -> Self {
        Self::DailyTimes {
            times: normalize_times(times),
        }
    }

    /// Run on the given weekdays at the given times.
    pub fn weekly(
        weekdays: impl IntoIterator<Item = Weekday>,
        times: impl IntoIterator<Item = NaiveTime>,
    ) -> Self {
        let mut weekdays: Vec<Weekday> = weekdays.into_iter().collect();
        weekdays.sort_by_key(|d| d.num_days_from_monday());
        weekdays.dedup();
        Self::WeeklyTimes {
            weekdays,
            times: normalize_times(times),
        }
    }

    /// Run on the given day of the month at the given times.
    pub fn monthly(day_of_month: u32, times: impl IntoIterator<Item = NaiveTime>) -> Self {
        Self::MonthlyTimes {
            day_of_month,
            times: normalize_times(times),
        }
    }

    /// Configured times of day (empty for interval schedules).
    pub fn times(&self) -> &[NaiveTime] {
        match self {
            Self::Interval { .. } => &[],
            Self::DailyTimes { times }
            | Self::WeeklyTimes { times, .. }
            | Self::MonthlyTimes { times, .. } => times.as_slice(),
        }
    }

    /// Earliest configured time of day, if any.
    pub fn earliest_time(&self) -> Option<NaiveTime> {
        self.times().iter().min().copied()
    }

    /// Whether this schedule collapses to "run once now".
    ///
    /// True for a zero interval and for any time-based schedule without
    /// configured times.
    pub fn is_degenerate(&self) -> bool {
        match self {
            Self::Interval { every } => every.is_zero(),
            _ => self.times().is_empty(),
        }
    }

    /// Whether `date` satisfies the weekday / day-of-month restriction.
    pub fn matches_date(&self, date: NaiveDate) -> bool {
        match self {
            Self::Interval { .. } | Self::DailyTimes { .. } => true,
            Self::WeeklyTimes { weekdays, .. } => {
                weekdays.is_empty() || weekdays.contains(&date.weekday())
            }
            Self::MonthlyTimes { day_of_month, .. } => date.day() == *day_of_month,
        }
    }
}

fn normalize_times(times: impl IntoIterator<Item = NaiveTime>) -> Vec<NaiveTime> {
    let mut times: Vec<NaiveTime> = times.into_iter().collect();
    times.sort();
    times.dedup();
    times
}

/// Named convenience schedules.
pub mod presets {
    use std::time::Duration;

    use chrono::{NaiveTime, Weekday};

    use super::ScheduleSpec;

    fn at(hour: u32, minute: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(hour, minute, 0).unwrap_or(NaiveTime::MIN)
    }

    pub fn every_minute() -> ScheduleSpec {
        ScheduleSpec::every(Duration::from_secs(60))
    }

    pub fn every_5_minutes() -> ScheduleSpec {
        ScheduleSpec::every(Duration::from_secs(5 * 60))
    }

    pub fn hourly() -> ScheduleSpec {
        ScheduleSpec::every(Duration::from_secs(60 * 60))
    }

    /// Every day at 02:00.
    pub fn daily_at_2am() -> ScheduleSpec {
        ScheduleSpec::daily([at(2, 0)])
    }

    /// Monday to Friday at 09:00.
    pub fn weekdays_at_9am() -> ScheduleSpec {
        ScheduleSpec::weekly(
            [
                Weekday::Mon,
                Weekday::Tue,
                Weekday::Wed,
                Weekday::Thu,
                Weekday::Fri,
            ],
            [at(9, 0)],
        )
    }

    /// Sundays at 03:00.
    pub fn weekly_sunday_at_3am() -> ScheduleSpec {
        ScheduleSpec::weekly([Weekday::Sun], [at(3, 0)])
    }

    /// The 1st of every month at midnight.
    pub fn monthly_first_at_midnight() -> ScheduleSpec {
        ScheduleSpec::monthly(1, [NaiveTime::MIN])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn t(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    #[test]
    fn test_daily_normalizes_times() {
        let spec = ScheduleSpec::daily([t(18, 0), t(9, 0), t(18, 0)]);
        assert_eq!(spec.times(), &[t(9, 0), t(18, 0)]);
        assert_eq!(spec.earliest_time(), Some(t(9, 0)));
    }

    #[test]
    fn test_weekly_dedups_weekdays() {
        let spec = ScheduleSpec::weekly([Weekday::Fri, Weekday::Mon, Weekday::Fri], [t(9, 0)]);
        match spec {
            ScheduleSpec::WeeklyTimes { weekdays, .. } => {
                assert_eq!(weekdays, vec![Weekday::Mon, Weekday::Fri]);
            }
            other => panic!("unexpected spec: {other:?}"),
        }
    }

    #[test]
    fn test_degenerate_specs() {
        assert!(ScheduleSpec::every(Duration::ZERO).is_degenerate());
        assert!(ScheduleSpec::daily([]).is_degenerate());
        assert!(ScheduleSpec::monthly(1, []).is_degenerate());
        assert!(!presets::every_minute().is_degenerate());
        assert!(!presets::daily_at_2am().is_degenerate());
    }

    #[test]
    fn test_matches_date() {
        // 2026-03-02 is a Monday.
        let monday = NaiveDate::from_ymd_opt(2026, 3, 2).unwrap();
        let tuesday = NaiveDate::from_ymd_opt(2026, 3, 3).unwrap();

        let weekly = ScheduleSpec::weekly([Weekday::Mon], [t(9, 0)]);
        assert!(weekly.matches_date(monday));
        assert!(!weekly.matches_date(tuesday));

        let any_day = ScheduleSpec::weekly([], [t(9, 0)]);
        assert!(any_day.matches_date(tuesday));

        let monthly = ScheduleSpec::monthly(2, [t(0, 0)]);
        assert!(monthly.matches_date(monday));
        assert!(!monthly.matches_date(tuesday));
    }

    #[test]
    fn test_presets() {
        assert_eq!(
            presets::every_5_minutes(),
            ScheduleSpec::every(Duration::from_secs(300))
        );
        assert_eq!(presets::hourly(), ScheduleSpec::every(Duration::from_secs(3600)));
        assert_eq!(presets::weekly_sunday_at_3am().times(), &[t(3, 0)]);
        assert_eq!(
            presets::monthly_first_at_midnight(),
            ScheduleSpec::MonthlyTimes {
                day_of_month: 1,
                times: vec![NaiveTime::MIN],
            }
        );
        match presets::weekdays_at_9am() {
            ScheduleSpec::WeeklyTimes { weekdays, times } => {
                assert_eq!(weekdays.len(), 5);
                assert!(!weekdays.contains(&Weekday::Sat));
                assert_eq!(times, vec![t(9, 0)]);
            }
            other => panic!("unexpected spec: {other:?}"),
        }
    }

    #[test]
    fn test_serialization() {
        let spec = presets::weekdays_at_9am();
        let json = serde_json::to_string(&spec).unwrap();
        assert!(json.contains("\"type\":\"weekly_times\""));
        let parsed: ScheduleSpec = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, spec);
    }
}
