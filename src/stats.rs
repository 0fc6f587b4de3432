use serde::Serialize;
use std::collections::BTreeMap;

use crate::error::ParseError;

/// Row accounting for one load pass.
#[derive(Debug, Default, Clone, PartialEq, Serialize)]
pub struct LoadStats {
    pub files: usize,
    /// Data rows (or melted cells, for wide tables) seen.
    pub rows_read: usize,
    pub rows_kept: usize,
    /// Rows whose category is not in the include list.
    pub rows_filtered: usize,

    // drops by parse error kind
    pub dropped: BTreeMap<String, usize>,
}

impl LoadStats {
    pub fn pct(part: usize, total: usize) -> f64 {
        if total == 0 {
            0.0
        } else {
            (part as f64 / total as f64) * 100.0
        }
    }

    pub fn record_drop(&mut self, err: &ParseError) {
        *self.dropped.entry(err.kind().to_string()).or_insert(0) += 1;
    }

    pub fn dropped_total(&self) -> usize {
        self.dropped.values().sum()
    }

    pub fn dropped_pct(&self) -> f64 {
        Self::pct(self.dropped_total(), self.rows_read)
    }

    /// Folds another pass (another file) into this one.
    pub fn merge(&mut self, other: LoadStats) {
        self.files += other.files;
        self.rows_read += other.rows_read;
        self.rows_kept += other.rows_kept;
        self.rows_filtered += other.rows_filtered;
        for (kind, count) in other.dropped {
            *self.dropped.entry(kind).or_insert(0) += count;
        }
    }
}
