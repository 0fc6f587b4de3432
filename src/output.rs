//! CSV exports for factors, profiles and sector totals.
//!
//! Numbers are written at full precision; undefined factors are written as
//! the literal `undefined`.

use anyhow::{Context, Result};
use csv::{Writer, WriterBuilder};
use serde::{Serialize, Serializer};
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::analyzers::factors::{DisaggregationFactor, UNDEFINED};
use crate::analyzers::profile::{CyclicalAxis, CyclicalProfile};
use crate::analyzers::sector::SectorTotals;

/// A factor cell that may hold the undefined sentinel.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FactorValue(pub Option<f64>);

impl Serialize for FactorValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self.0 {
            Some(value) => serializer.serialize_f64(value),
            None => serializer.serialize_str(UNDEFINED),
        }
    }
}

#[derive(Serialize)]
struct FactorRow {
    period: String,
    parent: String,
    measure: f64,
    parent_total: f64,
    factor: FactorValue,
}

/// Logs a run summary as pretty-printed JSON.
pub fn print_json(summary: &impl Serialize) -> Result<()> {
    info!("{}", serde_json::to_string_pretty(summary)?);
    Ok(())
}

/// Opens `path` for writing, creating parent directories. The caller writes
/// the header row.
fn create_writer(path: &Path) -> Result<Writer<File>> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("creating output directory {}", parent.display()))?;
    }
    let file = File::create(path).with_context(|| format!("creating {}", path.display()))?;
    Ok(WriterBuilder::new().has_headers(false).from_writer(file))
}

/// Writes `period,parent,measure,parent_total,factor` rows.
pub fn write_factors(path: &Path, factors: &[DisaggregationFactor]) -> Result<()> {
    let mut writer = create_writer(path)?;
    writer.write_record(["period", "parent", "measure", "parent_total", "factor"])?;
    for f in factors {
        writer.serialize(FactorRow {
            period: f.key.to_string(),
            parent: f.parent.to_string(),
            measure: f.measure,
            parent_total: f.parent_total,
            factor: FactorValue(f.factor),
        })?;
    }
    writer.flush()?;
    debug!(path = %path.display(), rows = factors.len(), "Wrote factors");
    Ok(())
}

/// Writes the full profile summary for one axis.
pub fn write_profile_summary(
    path: &Path,
    axis: CyclicalAxis,
    rows: &[CyclicalProfile],
) -> Result<()> {
    let mut writer = create_writer(path)?;
    writer.write_record([
        axis.column_name(),
        "samples",
        "mean",
        "p05",
        "p95",
        "relative",
        "p05_relative",
        "p95_relative",
    ])?;
    for row in rows {
        writer.serialize((
            row.position,
            row.samples,
            row.mean,
            row.p05,
            row.p95,
            FactorValue(row.relative),
            FactorValue(row.p05_relative),
            FactorValue(row.p95_relative),
        ))?;
    }
    writer.flush()?;
    debug!(path = %path.display(), rows = rows.len(), "Wrote profile summary");
    Ok(())
}

/// `<root>/<table>/<category>_<table>.csv`, e.g. `profiles/hourly/2H2_hourly.csv`.
pub fn category_profile_path(root: &Path, category: &str, axis: CyclicalAxis) -> PathBuf {
    let table = axis.table_name();
    root.join(table)
        .join(format!("{}_{table}.csv", sanitize_file_component(category)))
}

/// Writes a reusable `<position>,factor` lookup for one category.
pub fn write_category_profile(
    root: &Path,
    category: &str,
    axis: CyclicalAxis,
    rows: &[CyclicalProfile],
) -> Result<PathBuf> {
    let path = category_profile_path(root, category, axis);
    let mut writer = create_writer(&path)?;
    writer.write_record([axis.column_name(), "factor"])?;
    for row in rows {
        writer.serialize((row.position, FactorValue(row.relative)))?;
    }
    writer.flush()?;
    Ok(path)
}

pub fn write_sector_totals(path: &Path, totals: &SectorTotals) -> Result<()> {
    let mut writer = create_writer(path)?;
    let header = std::iter::once(totals.group_column.as_str())
        .chain(totals.columns.iter().map(String::as_str));
    writer.write_record(header)?;
    for (group, sums) in &totals.rows {
        // the sums flatten into the same record as the group
        writer.serialize((group, sums))?;
    }
    writer.flush()?;
    info!(path = %path.display(), groups = totals.rows.len(), "Wrote sector totals");
    Ok(())
}

fn sanitize_file_component(value: &str) -> String {
    value
        .trim()
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c => c,
        })
        .collect()
}
