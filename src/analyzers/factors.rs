//! Disaggregation factors: each bucket's share of its parent period.
//!
//! A parent whose children sum to exactly zero has no meaningful shares;
//! its children carry `factor: None`, written out as [`UNDEFINED`].

use crate::analyzers::aggregate::AggregatedBucket;
use crate::analyzers::types::{Granularity, PeriodKey};
use crate::error::DisaggError;
use std::collections::BTreeMap;
use tracing::{debug, warn};

/// Allowed distance of a parent's factor sum from 1.
pub const SUM_TOLERANCE: f64 = 1e-9;

/// Output marker for a factor whose parent total is zero.
pub const UNDEFINED: &str = "undefined";

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DisaggregationFactor {
    pub key: PeriodKey,
    pub parent: PeriodKey,
    pub measure: f64,
    pub parent_total: f64,
    pub factor: Option<f64>,
}

/// Sums bucket totals per enclosing `parent` period.
pub fn parent_totals(
    buckets: &[AggregatedBucket],
    parent: Granularity,
) -> Result<BTreeMap<PeriodKey, f64>, DisaggError> {
    let mut totals = BTreeMap::new();
    for bucket in buckets {
        *totals.entry(parent_of(&bucket.key, parent)?).or_insert(0.0) += bucket.total;
    }
    Ok(totals)
}

/// Computes `measure / parent_total` for every bucket.
///
/// Buckets may be in any order; the result follows the input order.
///
/// # Errors
///
/// Returns [`DisaggError::InvalidNesting`] if `parent` does not contain the
/// granularity of some bucket.
pub fn compute_factors(
    buckets: &[AggregatedBucket],
    parent: Granularity,
) -> Result<Vec<DisaggregationFactor>, DisaggError> {
    let totals = parent_totals(buckets, parent)?;

    let negative = buckets.iter().filter(|b| b.total < 0.0).count();
    if negative > 0 {
        warn!(negative, "Negative bucket totals found; upstream data is suspect");
    }

    let mut factors = Vec::with_capacity(buckets.len());
    for bucket in buckets {
        let parent_key = parent_of(&bucket.key, parent)?;
        let parent_total = totals.get(&parent_key).copied().unwrap_or(0.0);
        let factor = if parent_total == 0.0 {
            None
        } else {
            Some(bucket.total / parent_total)
        };
        factors.push(DisaggregationFactor {
            key: bucket.key,
            parent: parent_key,
            measure: bucket.total,
            parent_total,
            factor,
        });
    }

    debug!(
        buckets = buckets.len(),
        parents = totals.len(),
        %parent,
        "Computed disaggregation factors"
    );
    Ok(factors)
}

fn parent_of(key: &PeriodKey, parent: Granularity) -> Result<PeriodKey, DisaggError> {
    key.parent(parent).ok_or(DisaggError::InvalidNesting {
        fine: key.granularity(),
        parent,
    })
}

/// Outcome of checking that each parent's factors sum to 1.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct FactorCheck {
    /// Factor sum per parent with a nonzero total.
    pub sums: BTreeMap<PeriodKey, f64>,
    /// Parents whose total is zero, so every child is undefined.
    pub undefined: Vec<PeriodKey>,
    /// Parents whose sum misses 1 by more than [`SUM_TOLERANCE`].
    pub violations: Vec<(PeriodKey, f64)>,
}

impl FactorCheck {
    pub fn is_ok(&self) -> bool {
        self.violations.is_empty()
    }
}

/// Verifies mass conservation over already computed factors.
pub fn validate_factors(factors: &[DisaggregationFactor]) -> FactorCheck {
    let mut sums: BTreeMap<PeriodKey, Option<f64>> = BTreeMap::new();
    for f in factors {
        let entry = sums.entry(f.parent).or_insert(Some(0.0));
        *entry = match (*entry, f.factor) {
            (Some(acc), Some(value)) => Some(acc + value),
            _ => None,
        };
    }

    let mut check = FactorCheck::default();
    for (parent, sum) in sums {
        match sum {
            Some(sum) => {
                if (sum - 1.0).abs() > SUM_TOLERANCE {
                    check.violations.push((parent, sum));
                }
                check.sums.insert(parent, sum);
            }
            None => check.undefined.push(parent),
        }
    }
    check
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyzers::aggregate::{aggregate, rollup};
    use crate::analyzers::types::TimeSeriesRecord;
    use chrono::{NaiveDate, NaiveDateTime};

    fn month(year: i32, month: u32, total: f64) -> AggregatedBucket {
        AggregatedBucket {
            key: PeriodKey::Month { year, month },
            total,
            count: 1,
        }
    }

    #[test]
    fn test_normalization_removes_absolute_scale() {
        let mut buckets = Vec::new();
        for m in 1..=4 {
            buckets.push(month(2021, m, 250.0));
            buckets.push(month(2022, m, 500.0));
        }

        let factors = compute_factors(&buckets, Granularity::Year).unwrap();

        assert_eq!(factors.len(), 8);
        for f in &factors {
            assert_eq!(f.factor, Some(0.25));
        }
        let totals = parent_totals(&buckets, Granularity::Year).unwrap();
        assert_eq!(totals[&PeriodKey::Year(2021)], 1000.0);
        assert_eq!(totals[&PeriodKey::Year(2022)], 2000.0);
    }

    #[test]
    fn test_zero_parent_total_yields_undefined() {
        let buckets = vec![
            month(2021, 1, 0.0),
            month(2021, 2, 0.0),
            month(2021, 3, 0.0),
            month(2022, 1, 10.0),
        ];

        let factors = compute_factors(&buckets, Granularity::Year).unwrap();

        let undefined: Vec<_> = factors.iter().filter(|f| f.factor.is_none()).collect();
        assert_eq!(undefined.len(), 3);
        assert!(undefined.iter().all(|f| f.parent == PeriodKey::Year(2021)));
        assert_eq!(factors[3].factor, Some(1.0));

        let check = validate_factors(&factors);
        assert!(check.is_ok());
        assert_eq!(check.undefined, vec![PeriodKey::Year(2021)]);
        assert_eq!(check.sums.len(), 1);
    }

    #[test]
    fn test_zero_child_is_a_valid_factor() {
        let buckets = vec![month(2021, 1, 0.0), month(2021, 2, 8.0)];
        let factors = compute_factors(&buckets, Granularity::Year).unwrap();
        assert_eq!(factors[0].factor, Some(0.0));
        assert_eq!(factors[1].factor, Some(1.0));
    }

    #[test]
    fn test_factors_sum_to_one_for_irregular_hourly_series() {
        let start = NaiveDate::from_ymd_opt(2020, 1, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        let records: Vec<TimeSeriesRecord> = (0..(24 * 800))
            .map(|h| TimeSeriesRecord {
                timestamp: start + chrono::TimeDelta::hours(h),
                category: "TÉRMICA".into(),
                measure: ((h * 7919) % 1013) as f64 * 0.37 + 0.001,
            })
            .collect();

        let hourly = aggregate(&records, Granularity::Hour);
        for target in [Granularity::Hour, Granularity::Day, Granularity::Week, Granularity::Month] {
            let buckets = if target == Granularity::Hour {
                hourly.clone()
            } else {
                rollup(&hourly, target).unwrap()
            };
            let factors = compute_factors(&buckets, Granularity::Year).unwrap();
            let check = validate_factors(&factors);
            assert!(check.is_ok(), "{target}: {:?}", check.violations);
            assert!(check.undefined.is_empty());
            for sum in check.sums.values() {
                assert!((sum - 1.0).abs() <= SUM_TOLERANCE);
            }
        }
    }

    #[test]
    fn test_daily_factors_within_month() {
        let buckets = vec![
            AggregatedBucket {
                key: PeriodKey::Day(NaiveDate::from_ymd_opt(2023, 2, 1).unwrap()),
                total: 1.0,
                count: 1,
            },
            AggregatedBucket {
                key: PeriodKey::Day(NaiveDate::from_ymd_opt(2023, 2, 2).unwrap()),
                total: 3.0,
                count: 1,
            },
        ];

        let factors = compute_factors(&buckets, Granularity::Month).unwrap();

        assert_eq!(factors[0].parent.to_string(), "2023-02");
        assert_eq!(factors[0].factor, Some(0.25));
        assert_eq!(factors[1].factor, Some(0.75));
    }

    #[test]
    fn test_week_under_month_is_rejected() {
        let ts = NaiveDateTime::parse_from_str("2023-02-01 00:00:00", "%Y-%m-%d %H:%M:%S").unwrap();
        let buckets = vec![AggregatedBucket {
            key: PeriodKey::of(Granularity::Week, ts),
            total: 1.0,
            count: 1,
        }];
        assert!(compute_factors(&buckets, Granularity::Month).is_err());
    }

    #[test]
    fn test_validate_reports_violation() {
        let factors = vec![
            DisaggregationFactor {
                key: PeriodKey::Month {
                    year: 2021,
                    month: 1,
                },
                parent: PeriodKey::Year(2021),
                measure: 1.0,
                parent_total: 1.0,
                factor: Some(0.6),
            },
            DisaggregationFactor {
                key: PeriodKey::Month {
                    year: 2021,
                    month: 2,
                },
                parent: PeriodKey::Year(2021),
                measure: 1.0,
                parent_total: 1.0,
                factor: Some(0.6),
            },
        ];

        let check = validate_factors(&factors);

        assert!(!check.is_ok());
        assert_eq!(check.violations.len(), 1);
        assert!((check.violations[0].1 - 1.2).abs() < 1e-12);
    }
}
