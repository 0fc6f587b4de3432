use crate::analyzers::types::{Granularity, PeriodKey, TimeSeriesRecord};
use crate::error::DisaggError;
use std::collections::BTreeMap;

/// Summed measure for one period.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AggregatedBucket {
    pub key: PeriodKey,
    pub total: f64,
    /// Number of input rows (or finer buckets) folded into `total`.
    pub count: usize,
}

#[derive(Default)]
struct BucketSum {
    total: f64,
    count: usize,
}

/// Sums record measures per key produced by `key_fn`.
///
/// Buckets come back sorted by key.
pub fn aggregate_by<F>(records: &[TimeSeriesRecord], key_fn: F) -> Vec<AggregatedBucket>
where
    F: Fn(&TimeSeriesRecord) -> PeriodKey,
{
    fold_buckets(records.iter().map(|r| (key_fn(r), r.measure, 1)))
}

/// Sums record measures per period at `granularity`.
pub fn aggregate(records: &[TimeSeriesRecord], granularity: Granularity) -> Vec<AggregatedBucket> {
    aggregate_by(records, |r| PeriodKey::of(granularity, r.timestamp))
}

/// Re-buckets already aggregated periods into the coarser `target`
/// granularity, summing totals and counts.
///
/// # Errors
///
/// Returns [`DisaggError::InvalidNesting`] when a bucket's period is not
/// contained in a `target` period.
pub fn rollup(
    buckets: &[AggregatedBucket],
    target: Granularity,
) -> Result<Vec<AggregatedBucket>, DisaggError> {
    let mut keyed = Vec::with_capacity(buckets.len());
    for bucket in buckets {
        let parent = bucket
            .key
            .parent(target)
            .ok_or(DisaggError::InvalidNesting {
                fine: bucket.key.granularity(),
                parent: target,
            })?;
        keyed.push((parent, bucket.total, bucket.count));
    }
    Ok(fold_buckets(keyed))
}

fn fold_buckets<I>(items: I) -> Vec<AggregatedBucket>
where
    I: IntoIterator<Item = (PeriodKey, f64, usize)>,
{
    let mut sums: BTreeMap<PeriodKey, BucketSum> = BTreeMap::new();
    for (key, measure, count) in items {
        let entry = sums.entry(key).or_default();
        entry.total += measure;
        entry.count += count;
    }

    sums.into_iter()
        .map(|(key, sum)| AggregatedBucket {
            key,
            total: sum.total,
            count: sum.count,
        })
        .collect()
}
