//! Cross-period profiles indexed by a cyclical position.

use crate::analyzers::factors::DisaggregationFactor;
use crate::analyzers::types::PeriodKey;
use crate::analyzers::utility::{mean, percentile, relative};
use crate::error::DisaggError;
use chrono::{Datelike, NaiveDateTime, Timelike};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Position axis of a profile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CyclicalAxis {
    /// Hour 0–23.
    HourOfDay,
    /// Weekday 0–6, Monday is 0.
    DayOfWeek,
    /// Month 1–12.
    MonthOfYear,
}

impl CyclicalAxis {
    pub const ALL: [CyclicalAxis; 3] = [
        CyclicalAxis::HourOfDay,
        CyclicalAxis::DayOfWeek,
        CyclicalAxis::MonthOfYear,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            CyclicalAxis::HourOfDay => "hour_of_day",
            CyclicalAxis::DayOfWeek => "day_of_week",
            CyclicalAxis::MonthOfYear => "month_of_year",
        }
    }

    /// Header of the position column in exported tables.
    pub fn column_name(&self) -> &'static str {
        match self {
            CyclicalAxis::HourOfDay => "hour",
            CyclicalAxis::DayOfWeek => "dayofweek",
            CyclicalAxis::MonthOfYear => "month",
        }
    }

    /// Folder and file suffix for per-category lookup tables.
    pub fn table_name(&self) -> &'static str {
        match self {
            CyclicalAxis::HourOfDay => "hourly",
            CyclicalAxis::DayOfWeek => "weekly",
            CyclicalAxis::MonthOfYear => "monthly",
        }
    }

    pub fn position(&self, ts: NaiveDateTime) -> u32 {
        match self {
            CyclicalAxis::HourOfDay => ts.hour(),
            CyclicalAxis::DayOfWeek => ts.weekday().num_days_from_monday(),
            CyclicalAxis::MonthOfYear => ts.month(),
        }
    }

    /// Position of a period key, when the key is fine enough to have one.
    pub fn position_of_key(&self, key: &PeriodKey) -> Result<u32, DisaggError> {
        let position = match (self, key) {
            (_, PeriodKey::Hour(ts)) => Some(self.position(*ts)),
            (CyclicalAxis::DayOfWeek, PeriodKey::Day(date)) => {
                Some(date.weekday().num_days_from_monday())
            }
            (CyclicalAxis::MonthOfYear, PeriodKey::Day(date)) => Some(date.month()),
            (CyclicalAxis::MonthOfYear, PeriodKey::Month { month, .. }) => Some(*month),
            _ => None,
        };
        position.ok_or(DisaggError::AxisMismatch {
            axis: self.as_str(),
            granularity: key.granularity(),
        })
    }
}

impl fmt::Display for CyclicalAxis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CyclicalAxis {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        CyclicalAxis::ALL
            .into_iter()
            .find(|a| a.as_str() == s.trim() || a.table_name() == s.trim())
            .ok_or_else(|| format!("unknown profile axis '{s}'"))
    }
}

/// Summary of all samples at one cyclical position.
#[derive(Debug, Clone, PartialEq)]
pub struct CyclicalProfile {
    pub position: u32,
    pub samples: usize,
    pub mean: f64,
    pub p05: f64,
    pub p95: f64,
    /// `mean` over the sum of means across the axis.
    pub relative: Option<f64>,
    pub p05_relative: Option<f64>,
    pub p95_relative: Option<f64>,
}

/// Collects samples per position, then summarizes them in one pass.
#[derive(Debug, Clone)]
pub struct ProfileAccumulator {
    axis: CyclicalAxis,
    samples: BTreeMap<u32, Vec<f64>>,
    skipped_undefined: usize,
}

impl ProfileAccumulator {
    pub fn new(axis: CyclicalAxis) -> Self {
        Self {
            axis,
            samples: BTreeMap::new(),
            skipped_undefined: 0,
        }
    }

    pub fn axis(&self) -> CyclicalAxis {
        self.axis
    }

    /// Number of undefined factors left out of the profile.
    pub fn skipped_undefined(&self) -> usize {
        self.skipped_undefined
    }

    pub fn push(&mut self, position: u32, value: f64) {
        self.samples.entry(position).or_default().push(value);
    }

    pub fn push_at(&mut self, ts: NaiveDateTime, value: f64) {
        self.push(self.axis.position(ts), value);
    }

    pub fn push_factor(&mut self, factor: &DisaggregationFactor) -> Result<(), DisaggError> {
        let position = self.axis.position_of_key(&factor.key)?;
        match factor.factor {
            Some(value) => self.push(position, value),
            None => self.skipped_undefined += 1,
        }
        Ok(())
    }

    /// One profile row per position that received at least one sample,
    /// ordered by position.
    pub fn finish(self) -> Vec<CyclicalProfile> {
        let mut rows = Vec::with_capacity(self.samples.len());
        for (position, mut values) in self.samples {
            values.sort_by(f64::total_cmp);
            rows.push(CyclicalProfile {
                position,
                samples: values.len(),
                mean: mean(&values),
                p05: percentile(&values, 0.05).unwrap_or(f64::NAN),
                p95: percentile(&values, 0.95).unwrap_or(f64::NAN),
                relative: None,
                p05_relative: None,
                p95_relative: None,
            });
        }

        let means: Vec<f64> = rows.iter().map(|r| r.mean).collect();
        let p05s: Vec<f64> = rows.iter().map(|r| r.p05).collect();
        let p95s: Vec<f64> = rows.iter().map(|r| r.p95).collect();
        let columns = relative(&means)
            .into_iter()
            .zip(relative(&p05s))
            .zip(relative(&p95s));
        for (row, ((rel, p05_rel), p95_rel)) in rows.iter_mut().zip(columns) {
            row.relative = rel;
            row.p05_relative = p05_rel;
            row.p95_relative = p95_rel;
        }
        rows
    }
}

/// Profiles the factors of many parent periods along `axis`.
pub fn summarize_factors(
    factors: &[DisaggregationFactor],
    axis: CyclicalAxis,
) -> Result<(Vec<CyclicalProfile>, usize), DisaggError> {
    let mut acc = ProfileAccumulator::new(axis);
    for factor in factors {
        acc.push_factor(factor)?;
    }
    let skipped = acc.skipped_undefined();
    Ok((acc.finish(), skipped))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyzers::types::Granularity;
    use chrono::NaiveDate;

    fn hour(y: i32, m: u32, d: u32, h: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d)
            .unwrap()
            .and_hms_opt(h, 0, 0)
            .unwrap()
    }

    fn factor(key: PeriodKey, value: Option<f64>) -> DisaggregationFactor {
        DisaggregationFactor {
            key,
            parent: key.parent(Granularity::Year).unwrap(),
            measure: value.unwrap_or(0.0),
            parent_total: 1.0,
            factor: value,
        }
    }

    #[test]
    fn test_relative_profile_sums_to_one() {
        let mut acc = ProfileAccumulator::new(CyclicalAxis::HourOfDay);
        for (h, v) in [(0, 1.0), (0, 3.0), (1, 4.0), (2, 8.0)] {
            acc.push(h, v);
        }

        let rows = acc.finish();

        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0].mean, 2.0);
        assert_eq!(rows[0].samples, 2);
        let total: f64 = rows.iter().map(|r| r.relative.unwrap()).sum();
        assert!((total - 1.0).abs() < 1e-12);
        assert_eq!(rows[2].relative, Some(8.0 / 14.0));
    }

    #[test]
    fn test_percentiles_per_position() {
        let mut acc = ProfileAccumulator::new(CyclicalAxis::MonthOfYear);
        for v in [5.0, 1.0, 4.0, 2.0, 3.0] {
            acc.push(7, v);
        }

        let rows = acc.finish();

        assert!((rows[0].p05 - 1.2).abs() < 1e-12);
        assert!((rows[0].p95 - 4.8).abs() < 1e-12);
        assert_eq!(rows[0].relative, Some(1.0));
    }

    #[test]
    fn test_single_sample_bounds_equal_value() {
        let mut acc = ProfileAccumulator::new(CyclicalAxis::DayOfWeek);
        acc.push(3, 0.2);

        let rows = acc.finish();

        assert_eq!(rows[0].p05, 0.2);
        assert_eq!(rows[0].p95, 0.2);
        assert_eq!(rows[0].mean, 0.2);
    }

    #[test]
    fn test_zero_means_give_undefined_relative() {
        let mut acc = ProfileAccumulator::new(CyclicalAxis::HourOfDay);
        acc.push(0, 0.0);
        acc.push(1, 0.0);

        let rows = acc.finish();

        assert!(rows.iter().all(|r| r.relative.is_none()));
    }

    #[test]
    fn test_summarize_hourly_factors_across_years() {
        let factors = vec![
            factor(PeriodKey::Hour(hour(2021, 5, 1, 0)), Some(0.1)),
            factor(PeriodKey::Hour(hour(2022, 5, 1, 0)), Some(0.3)),
            factor(PeriodKey::Hour(hour(2021, 5, 1, 12)), Some(0.6)),
            factor(PeriodKey::Hour(hour(2022, 5, 1, 12)), None),
        ];

        let (rows, skipped) = summarize_factors(&factors, CyclicalAxis::HourOfDay).unwrap();

        assert_eq!(skipped, 1);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].position, 0);
        assert!((rows[0].mean - 0.2).abs() < 1e-12);
        assert_eq!(rows[1].position, 12);
        assert_eq!(rows[1].samples, 1);
        assert_eq!(rows[1].mean, 0.6);
    }

    #[test]
    fn test_weekday_positions_start_on_monday() {
        // 2024-01-01 was a Monday, 2024-01-07 a Sunday.
        assert_eq!(CyclicalAxis::DayOfWeek.position(hour(2024, 1, 1, 3)), 0);
        assert_eq!(CyclicalAxis::DayOfWeek.position(hour(2024, 1, 7, 3)), 6);
    }

    #[test]
    fn test_axis_mismatch_is_an_error() {
        let day = PeriodKey::Day(NaiveDate::from_ymd_opt(2024, 1, 1).unwrap());
        assert!(CyclicalAxis::HourOfDay.position_of_key(&day).is_err());
        assert_eq!(CyclicalAxis::DayOfWeek.position_of_key(&day), Ok(0));

        let month = PeriodKey::Month {
            year: 2024,
            month: 9,
        };
        assert_eq!(CyclicalAxis::MonthOfYear.position_of_key(&month), Ok(9));
        assert!(CyclicalAxis::DayOfWeek.position_of_key(&month).is_err());
    }

    #[test]
    fn test_axis_from_str_accepts_table_names() {
        assert_eq!("weekly".parse::<CyclicalAxis>(), Ok(CyclicalAxis::DayOfWeek));
        assert_eq!(
            "hour_of_day".parse::<CyclicalAxis>(),
            Ok(CyclicalAxis::HourOfDay)
        );
    }
}
