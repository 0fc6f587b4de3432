//! Uniform split of monthly totals into hourly records.
//!
//! Every hour of the month receives the same share. This is a modeling
//! simplification: no intra-month shape is known for these series.

use crate::error::DisaggError;
use chrono::{NaiveDate, NaiveDateTime, NaiveTime, TimeDelta};

/// One category's total for one calendar month.
#[derive(Debug, Clone, PartialEq)]
pub struct MonthlyRecord {
    pub category: String,
    pub year: i32,
    pub month: u32,
    pub total: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct HourlyRecord<'a> {
    pub category: &'a str,
    pub timestamp: NaiveDateTime,
    pub measure: f64,
}

pub fn days_in_month(year: i32, month: u32) -> Option<u32> {
    let first = NaiveDate::from_ymd_opt(year, month, 1)?;
    let next = if month == 12 {
        NaiveDate::from_ymd_opt(year + 1, 1, 1)?
    } else {
        NaiveDate::from_ymd_opt(year, month + 1, 1)?
    };
    u32::try_from((next - first).num_days()).ok()
}

pub fn hours_in_month(year: i32, month: u32) -> Option<u32> {
    days_in_month(year, month).map(|days| days * 24)
}

/// Lazily yields one [`HourlyRecord`] per hour of the record's month, in
/// order, starting at midnight on the 1st.
///
/// The final hour absorbs the rounding residual, so summing the measures
/// front to back reproduces `record.total` exactly.
pub fn expand_to_hours(record: &MonthlyRecord) -> Result<HourlyExpansion<'_>, DisaggError> {
    let invalid = DisaggError::InvalidMonth {
        year: record.year,
        month: record.month,
    };
    let start = NaiveDate::from_ymd_opt(record.year, record.month, 1)
        .ok_or(invalid.clone())?
        .and_time(NaiveTime::MIN);
    let hours = hours_in_month(record.year, record.month).ok_or(invalid)?;

    Ok(HourlyExpansion {
        record,
        start,
        hours,
        share: record.total / f64::from(hours),
        next: 0,
        emitted: 0.0,
    })
}

pub struct HourlyExpansion<'a> {
    record: &'a MonthlyRecord,
    start: NaiveDateTime,
    hours: u32,
    share: f64,
    next: u32,
    emitted: f64,
}

impl<'a> Iterator for HourlyExpansion<'a> {
    type Item = HourlyRecord<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.next >= self.hours {
            return None;
        }
        let index = self.next;
        self.next += 1;

        // emitted stays within a factor of two of the total here, so the
        // subtraction is exact
        let measure = if self.next == self.hours {
            self.record.total - self.emitted
        } else {
            self.share
        };
        self.emitted += measure;

        Some(HourlyRecord {
            category: &self.record.category,
            timestamp: self.start + TimeDelta::hours(i64::from(index)),
            measure,
        })
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let left = (self.hours - self.next) as usize;
        (left, Some(left))
    }
}

impl ExactSizeIterator for HourlyExpansion<'_> {}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Datelike, Timelike};

    fn monthly(year: i32, month: u32, total: f64) -> MonthlyRecord {
        MonthlyRecord {
            category: "3.10".to_string(),
            year,
            month,
            total,
        }
    }

    #[test]
    fn test_leap_february_has_696_hours() {
        let record = monthly(2024, 2, 100.0);
        assert_eq!(expand_to_hours(&record).unwrap().count(), 696);
        let record = monthly(2000, 2, 100.0);
        assert_eq!(expand_to_hours(&record).unwrap().count(), 696);
    }

    #[test]
    fn test_common_february_has_672_hours() {
        let record = monthly(2023, 2, 100.0);
        assert_eq!(expand_to_hours(&record).unwrap().count(), 672);
        let record = monthly(1900, 2, 100.0);
        assert_eq!(expand_to_hours(&record).unwrap().count(), 672);
    }

    #[test]
    fn test_hours_in_month_table() {
        assert_eq!(hours_in_month(2023, 1), Some(744));
        assert_eq!(hours_in_month(2023, 4), Some(720));
        assert_eq!(hours_in_month(2023, 12), Some(744));
        assert_eq!(hours_in_month(2023, 13), None);
        assert_eq!(hours_in_month(2023, 0), None);
    }

    #[test]
    fn test_sum_reproduces_total_exactly() {
        for (year, month, total) in [
            (2024, 2, 100.5),
            (2023, 1, 1.0 / 3.0),
            (2023, 4, 98.2),
            (2022, 12, 123456.789),
            (2021, 7, 0.0),
            (2021, 9, -42.1),
        ] {
            let record = monthly(year, month, total);
            let sum: f64 = expand_to_hours(&record).unwrap().map(|h| h.measure).sum();
            assert_eq!(sum, total, "{year}-{month}");
        }
    }

    #[test]
    fn test_each_hour_carries_uniform_share() {
        let record = monthly(2023, 4, 98.2);
        let share = 98.2 / 720.0;
        let hours: Vec<_> = expand_to_hours(&record).unwrap().collect();
        let (last, rest) = hours.split_last().unwrap();

        assert!(rest.iter().all(|h| h.measure == share));
        // the residual is bounded by the error accumulated over the month
        let bound = f64::EPSILON * hours.len() as f64 * record.total;
        assert!((last.measure - share).abs() <= bound);
    }

    #[test]
    fn test_timestamps_step_hourly_without_gaps() {
        let record = monthly(2023, 3, 10.0);
        let hours: Vec<_> = expand_to_hours(&record).unwrap().collect();

        assert_eq!(hours.len(), 744);
        assert_eq!(hours[0].timestamp.to_string(), "2023-03-01 00:00:00");
        assert_eq!(hours[743].timestamp.to_string(), "2023-03-31 23:00:00");
        for pair in hours.windows(2) {
            assert_eq!(pair[1].timestamp - pair[0].timestamp, TimeDelta::hours(1));
        }
        assert!(hours.iter().all(|h| h.timestamp.month() == 3));
        assert!(hours.iter().all(|h| h.category == "3.10"));
        assert_eq!(hours[5].timestamp.hour(), 5);
    }

    #[test]
    fn test_invalid_month_is_an_error() {
        let record = monthly(2023, 13, 1.0);
        assert_eq!(
            expand_to_hours(&record).err(),
            Some(DisaggError::InvalidMonth {
                year: 2023,
                month: 13
            })
        );
    }

    #[test]
    fn test_size_hint_is_exact() {
        let record = monthly(2023, 6, 1.0);
        let mut hours = expand_to_hours(&record).unwrap();
        assert_eq!(hours.len(), 720);
        hours.next();
        assert_eq!(hours.len(), 719);
    }
}
