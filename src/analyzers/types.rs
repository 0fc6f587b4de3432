//! Data types used by the aggregation pipeline.

use chrono::{Datelike, NaiveDate, NaiveDateTime, NaiveTime, TimeDelta, Timelike};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A single observation after parsing and filtering.
#[derive(Debug, Clone, PartialEq)]
pub struct TimeSeriesRecord {
    pub timestamp: NaiveDateTime,
    pub category: String,
    pub measure: f64,
}

/// Time-bucket resolution, ordered from finest to coarsest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Granularity {
    Hour,
    Day,
    Week,
    Month,
    Year,
}

impl Granularity {
    pub const ALL: [Granularity; 5] = [
        Granularity::Hour,
        Granularity::Day,
        Granularity::Week,
        Granularity::Month,
        Granularity::Year,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Granularity::Hour => "hour",
            Granularity::Day => "day",
            Granularity::Week => "week",
            Granularity::Month => "month",
            Granularity::Year => "year",
        }
    }

    /// Whether every `self` period lies entirely inside one `coarser` period.
    ///
    /// Weeks and months are not nested in either direction.
    pub fn nests_in(&self, coarser: Granularity) -> bool {
        match (self, coarser) {
            (Granularity::Week, Granularity::Month) => false,
            (Granularity::Month, Granularity::Week) => false,
            (fine, coarse) => *fine < coarse,
        }
    }
}

impl fmt::Display for Granularity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Granularity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Granularity::ALL
            .into_iter()
            .find(|g| g.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| format!("unknown granularity '{s}'; expected hour, day, week, month or year"))
    }
}

/// Identifies one time bucket at a given granularity.
///
/// Weeks are keyed by ISO week-year, so the week containing 1 January may
/// belong to the previous year.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum PeriodKey {
    Year(i32),
    Month { year: i32, month: u32 },
    Week { iso_year: i32, week: u32 },
    Day(NaiveDate),
    Hour(NaiveDateTime),
}

impl PeriodKey {
    /// The bucket at `granularity` that contains `ts`.
    pub fn of(granularity: Granularity, ts: NaiveDateTime) -> PeriodKey {
        let date = ts.date();
        match granularity {
            Granularity::Hour => PeriodKey::Hour(floor_hour(ts)),
            Granularity::Day => PeriodKey::Day(date),
            Granularity::Week => week_of(date),
            Granularity::Month => PeriodKey::Month {
                year: date.year(),
                month: date.month(),
            },
            Granularity::Year => PeriodKey::Year(date.year()),
        }
    }

    pub fn granularity(&self) -> Granularity {
        match self {
            PeriodKey::Year(_) => Granularity::Year,
            PeriodKey::Month { .. } => Granularity::Month,
            PeriodKey::Week { .. } => Granularity::Week,
            PeriodKey::Day(_) => Granularity::Day,
            PeriodKey::Hour(_) => Granularity::Hour,
        }
    }

    /// The enclosing period at `parent` granularity, or `None` when `parent`
    /// does not contain this key's granularity.
    ///
    /// Days and hours belong to their calendar year; weeks to their ISO
    /// week-year.
    pub fn parent(&self, parent: Granularity) -> Option<PeriodKey> {
        if !self.granularity().nests_in(parent) {
            return None;
        }
        match *self {
            PeriodKey::Hour(ts) => Some(PeriodKey::of(parent, ts)),
            PeriodKey::Day(date) => Some(PeriodKey::of(parent, date.and_time(NaiveTime::MIN))),
            PeriodKey::Week { iso_year, .. } => Some(PeriodKey::Year(iso_year)),
            PeriodKey::Month { year, .. } => Some(PeriodKey::Year(year)),
            PeriodKey::Year(_) => None,
        }
    }
}

impl fmt::Display for PeriodKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PeriodKey::Year(year) => write!(f, "{year}"),
            PeriodKey::Month { year, month } => write!(f, "{year}-{month:02}"),
            PeriodKey::Week { iso_year, week } => write!(f, "{iso_year}-W{week:02}"),
            PeriodKey::Day(date) => write!(f, "{}", date.format("%Y-%m-%d")),
            PeriodKey::Hour(ts) => write!(f, "{}", ts.format("%Y-%m-%d %H:%M:%S")),
        }
    }
}

/// Truncates a timestamp to the start of its hour.
pub fn floor_hour(ts: NaiveDateTime) -> NaiveDateTime {
    ts.date().and_time(NaiveTime::MIN) + TimeDelta::hours(i64::from(ts.hour()))
}

fn week_of(date: NaiveDate) -> PeriodKey {
    let iso = date.iso_week();
    PeriodKey::Week {
        iso_year: iso.year(),
        week: iso.week(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ts(s: &str) -> NaiveDateTime {
        NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S").unwrap()
    }

    #[test]
    fn test_hour_key_floors_minutes_and_seconds() {
        let key = PeriodKey::of(Granularity::Hour, ts("2021-03-04 13:47:12"));
        assert_eq!(key, PeriodKey::Hour(ts("2021-03-04 13:00:00")));
        assert_eq!(key.to_string(), "2021-03-04 13:00:00");
    }

    #[test]
    fn test_week_spanning_new_year_uses_iso_year() {
        // 2022-01-01 is a Saturday in ISO week 52 of 2021.
        let key = PeriodKey::of(Granularity::Week, ts("2022-01-01 00:00:00"));
        assert_eq!(
            key,
            PeriodKey::Week {
                iso_year: 2021,
                week: 52
            }
        );
        assert_eq!(key.parent(Granularity::Year), Some(PeriodKey::Year(2021)));

        // 2024-12-31 is a Tuesday in ISO week 1 of 2025.
        let key = PeriodKey::of(Granularity::Week, ts("2024-12-31 12:00:00"));
        assert_eq!(key.to_string(), "2025-W01");
        assert_eq!(key.parent(Granularity::Year), Some(PeriodKey::Year(2025)));
    }

    #[test]
    fn test_day_and_hour_belong_to_calendar_year() {
        let day = PeriodKey::of(Granularity::Day, ts("2022-01-01 05:00:00"));
        assert_eq!(day.parent(Granularity::Year), Some(PeriodKey::Year(2022)));

        let hour = PeriodKey::of(Granularity::Hour, ts("2022-01-01 05:00:00"));
        assert_eq!(hour.parent(Granularity::Year), Some(PeriodKey::Year(2022)));
        assert_eq!(
            hour.parent(Granularity::Week),
            Some(PeriodKey::Week {
                iso_year: 2021,
                week: 52
            })
        );
    }

    #[test]
    fn test_week_has_no_month_parent() {
        let week = PeriodKey::of(Granularity::Week, ts("2022-03-09 00:00:00"));
        assert_eq!(week.parent(Granularity::Month), None);
        assert_eq!(week.parent(Granularity::Week), None);
        assert_eq!(week.parent(Granularity::Day), None);
    }

    #[test]
    fn test_nesting_rules() {
        assert!(Granularity::Hour.nests_in(Granularity::Day));
        assert!(Granularity::Day.nests_in(Granularity::Week));
        assert!(Granularity::Day.nests_in(Granularity::Month));
        assert!(Granularity::Week.nests_in(Granularity::Year));
        assert!(!Granularity::Week.nests_in(Granularity::Month));
        assert!(!Granularity::Month.nests_in(Granularity::Week));
        assert!(!Granularity::Year.nests_in(Granularity::Year));
        assert!(!Granularity::Month.nests_in(Granularity::Day));
    }

    #[test]
    fn test_keys_sort_chronologically_within_granularity() {
        let mut keys = vec![
            PeriodKey::Month {
                year: 2022,
                month: 1,
            },
            PeriodKey::Month {
                year: 2021,
                month: 12,
            },
            PeriodKey::Month {
                year: 2021,
                month: 2,
            },
        ];
        keys.sort();
        let labels: Vec<String> = keys.iter().map(ToString::to_string).collect();
        assert_eq!(labels, ["2021-02", "2021-12", "2022-01"]);
    }

    #[test]
    fn test_granularity_from_str() {
        assert_eq!("Week".parse::<Granularity>(), Ok(Granularity::Week));
        assert!("fortnight".parse::<Granularity>().is_err());
    }
}
