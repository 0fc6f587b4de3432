//! Totals of every numeric column per sector.

use crate::parser::parse_measure;
use crate::parser::DateLocale;
use std::collections::BTreeMap;
use tracing::debug;

/// Columns dropped from the sector table unless told otherwise.
pub const DEFAULT_DROP_COLUMNS: &[&str] = &["Latitude", "Longitude", "ANO", "CD_MUN", "TIER"];

#[derive(Debug, Clone, PartialEq)]
pub struct SectorTotals {
    pub group_column: String,
    /// Summed columns, in input order.
    pub columns: Vec<String>,
    /// Sector name to one total per entry in `columns`.
    pub rows: BTreeMap<String, Vec<f64>>,
    /// Rows without a sector value.
    pub skipped_rows: usize,
}

/// Groups `rows` by the `group_column` cell and sums every numeric column
/// that is not listed in `drop`.
///
/// A column is numeric when it has at least one non-empty cell and all of
/// its non-empty cells parse as numbers; empty cells add nothing.
pub fn sum_by_group(
    headers: &[String],
    rows: &[Vec<String>],
    group_column: &str,
    drop: &[String],
    locale: DateLocale,
) -> anyhow::Result<SectorTotals> {
    let group_idx = headers
        .iter()
        .position(|h| h == group_column)
        .ok_or_else(|| anyhow::anyhow!("group column '{group_column}' not found"))?;

    let numeric: Vec<usize> = (0..headers.len())
        .filter(|&i| i != group_idx && !drop.contains(&headers[i]))
        .filter(|&i| {
            let mut cells = rows
                .iter()
                .filter_map(|row| row.get(i))
                .filter(|cell| !cell.trim().is_empty())
                .peekable();
            cells.peek().is_some() && cells.all(|cell| parse_measure(cell, locale).is_ok())
        })
        .collect();

    let mut totals: BTreeMap<String, Vec<f64>> = BTreeMap::new();
    let mut skipped_rows = 0;
    for row in rows {
        let group = row.get(group_idx).map(|g| g.trim()).unwrap_or("");
        if group.is_empty() {
            skipped_rows += 1;
            continue;
        }
        let sums = totals
            .entry(group.to_string())
            .or_insert_with(|| vec![0.0; numeric.len()]);
        for (slot, &col) in sums.iter_mut().zip(&numeric) {
            if let Some(Ok(value)) = row.get(col).map(|cell| parse_measure(cell, locale)) {
                *slot += value;
            }
        }
    }

    debug!(
        groups = totals.len(),
        numeric_columns = numeric.len(),
        skipped_rows,
        "Summed numeric columns by group"
    );

    Ok(SectorTotals {
        group_column: group_column.to_string(),
        columns: numeric.iter().map(|&i| headers[i].clone()).collect(),
        rows: totals,
        skipped_rows,
    })
}
