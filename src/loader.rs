//! CSV discovery and readers for the long, wide and lookup input shapes.
//!
//! Every reader decodes the file first (UTF-8, falling back to Latin-1),
//! strips a byte-order mark and sniffs the delimiter when none is
//! configured. Unparseable rows are dropped and tallied in [`LoadStats`];
//! missing files and columns are fatal.

use anyhow::{Context, Result, bail};
use csv::{ReaderBuilder, StringRecord};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::analyzers::classify::{Classifier, extract_code};
use crate::analyzers::expand::MonthlyRecord;
use crate::analyzers::types::TimeSeriesRecord;
use crate::config::PipelineConfig;
use crate::error::ParseError;
use crate::parser::{parse_measure, parse_month_label, parse_timestamp, sniff_delimiter};
use crate::stats::LoadStats;

/// All `*.csv` files directly inside `dir`, sorted by file name.
pub fn list_csv_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in fs::read_dir(dir).with_context(|| format!("reading input directory {}", dir.display()))? {
        let path = entry?.path();
        let is_csv = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case("csv"));
        if path.is_file() && is_csv {
            files.push(path);
        }
    }
    if files.is_empty() {
        bail!("no CSV files found in {}", dir.display());
    }
    files.sort();
    Ok(files)
}

/// Reads a text file as UTF-8, or as Latin-1 when it is not valid UTF-8.
pub fn read_text(path: &Path) -> Result<String> {
    let bytes = fs::read(path).with_context(|| format!("opening {}", path.display()))?;
    let text = match String::from_utf8(bytes) {
        Ok(text) => text,
        Err(err) => {
            debug!(path = %path.display(), "Input is not UTF-8, decoding as Latin-1");
            err.into_bytes().into_iter().map(char::from).collect()
        }
    };
    Ok(text.trim_start_matches('\u{feff}').to_string())
}

fn reader_for(text: &str, separator: Option<u8>) -> csv::Reader<&[u8]> {
    let delimiter =
        separator.unwrap_or_else(|| sniff_delimiter(text.lines().next().unwrap_or_default()));
    ReaderBuilder::new()
        .delimiter(delimiter)
        .flexible(true)
        .from_reader(text.as_bytes())
}

fn column_index(headers: &StringRecord, name: &str, path: &Path) -> Result<usize> {
    headers
        .iter()
        .position(|h| h.trim() == name)
        .with_context(|| format!("column '{name}' not found in {}", path.display()))
}

fn included(categories: &[String], value: &str) -> bool {
    categories.is_empty() || categories.iter().any(|c| c.trim() == value)
}

/// Loads and concatenates every long-format CSV in `config.input_dir`.
pub fn load_timestamped(config: &PipelineConfig) -> Result<(Vec<TimeSeriesRecord>, LoadStats)> {
    let mut records = Vec::new();
    let mut stats = LoadStats::default();
    for path in list_csv_files(&config.input_dir)? {
        let file_stats = load_timestamped_file(&path, config, &mut records)?;
        stats.merge(file_stats);
    }
    log_load("timestamped", &stats);
    Ok((records, stats))
}

/// Appends the valid rows of one long-format CSV to `records`.
pub fn load_timestamped_file(
    path: &Path,
    config: &PipelineConfig,
    records: &mut Vec<TimeSeriesRecord>,
) -> Result<LoadStats> {
    let text = read_text(path)?;
    let mut rdr = reader_for(&text, config.separator_byte());
    let headers = rdr
        .headers()
        .with_context(|| format!("reading header of {}", path.display()))?
        .clone();
    let columns = &config.columns;
    let ts_idx = column_index(&headers, &columns.timestamp, path)?;
    let cat_idx = column_index(&headers, &columns.category, path)?;
    let measure_idx = column_index(&headers, &columns.measure, path)?;
    let needed = ts_idx.max(cat_idx).max(measure_idx) + 1;

    let mut stats = LoadStats {
        files: 1,
        ..Default::default()
    };
    for result in rdr.records() {
        let row = result.with_context(|| format!("reading {}", path.display()))?;
        stats.rows_read += 1;

        if row.len() < needed {
            stats.record_drop(&ParseError::ShortRow {
                found: row.len(),
                expected: needed,
            });
            continue;
        }
        let category = row[cat_idx].trim();
        if !included(&config.categories_to_include, category) {
            stats.rows_filtered += 1;
            continue;
        }
        let parsed = parse_timestamp(&row[ts_idx], config.date_locale).and_then(|timestamp| {
            parse_measure(&row[measure_idx], config.date_locale).map(|m| (timestamp, m))
        });
        match parsed {
            Ok((timestamp, measure)) => {
                stats.rows_kept += 1;
                records.push(TimeSeriesRecord {
                    timestamp,
                    category: category.to_string(),
                    measure,
                });
            }
            Err(err) => {
                debug!(path = %path.display(), line = stats.rows_read + 1, %err, "Dropping row");
                stats.record_drop(&err);
            }
        }
    }

    debug!(path = %path.display(), rows = stats.rows_read, kept = stats.rows_kept, "Loaded file");
    Ok(stats)
}

/// Loads every wide-format CSV in `config.input_dir` and melts it into one
/// [`MonthlyRecord`] per (label, month) cell.
pub fn load_wide_monthly(config: &PipelineConfig) -> Result<(Vec<MonthlyRecord>, LoadStats)> {
    let mut records = Vec::new();
    let mut stats = LoadStats::default();
    for path in list_csv_files(&config.input_dir)? {
        let file_stats = load_wide_monthly_file(&path, config, &mut records)?;
        stats.merge(file_stats);
    }
    log_load("wide_monthly", &stats);
    Ok((records, stats))
}

/// Melts one wide table. The first column holds the class label, every
/// other header is a `"<month> <year>"` label.
pub fn load_wide_monthly_file(
    path: &Path,
    config: &PipelineConfig,
    records: &mut Vec<MonthlyRecord>,
) -> Result<LoadStats> {
    let text = read_text(path)?;
    let mut rdr = reader_for(&text, config.separator_byte());
    let headers = rdr
        .headers()
        .with_context(|| format!("reading header of {}", path.display()))?
        .clone();
    if headers.len() < 2 {
        bail!("{} has no period columns", path.display());
    }
    let periods: Vec<Result<(i32, u32), ParseError>> = headers
        .iter()
        .skip(1)
        .map(|label| parse_month_label(label, config.date_locale))
        .collect();
    let bad_labels = periods.iter().filter(|p| p.is_err()).count();
    if bad_labels > 0 {
        warn!(path = %path.display(), bad_labels, "Columns with unparseable period labels");
    }

    let mut stats = LoadStats {
        files: 1,
        ..Default::default()
    };
    for result in rdr.records() {
        let row = result.with_context(|| format!("reading {}", path.display()))?;
        if row.len() < headers.len() {
            // footer lines such as the data source note
            stats.rows_read += 1;
            stats.record_drop(&ParseError::ShortRow {
                found: row.len(),
                expected: headers.len(),
            });
            continue;
        }

        let label = row[0].trim();
        let cells = headers.len() - 1;
        stats.rows_read += cells;
        if !(included(&config.categories_to_include, label)
            || included(&config.categories_to_include, extract_code(label)))
        {
            stats.rows_filtered += cells;
            continue;
        }

        for (period, raw) in periods.iter().zip(row.iter().skip(1)) {
            let parsed = period
                .clone()
                .and_then(|(year, month)| {
                    parse_measure(raw, config.date_locale).map(|total| (year, month, total))
                });
            match parsed {
                Ok((year, month, total)) => {
                    stats.rows_kept += 1;
                    records.push(MonthlyRecord {
                        category: label.to_string(),
                        year,
                        month,
                        total,
                    });
                }
                Err(err) => stats.record_drop(&err),
            }
        }
    }

    debug!(path = %path.display(), cells = stats.rows_read, kept = stats.rows_kept, "Melted file");
    Ok(stats)
}

/// Reads a two-column code lookup into a [`Classifier`].
pub fn load_lookup(path: &Path, code_column: &str, category_column: &str) -> Result<Classifier> {
    let text = read_text(path)?;
    let mut rdr = reader_for(&text, None);
    let headers = rdr
        .headers()
        .with_context(|| format!("reading header of {}", path.display()))?
        .clone();
    let code_idx = column_index(&headers, code_column, path)?;
    let category_idx = column_index(&headers, category_column, path)?;

    let mut pairs = Vec::new();
    for result in rdr.records() {
        let row = result.with_context(|| format!("reading {}", path.display()))?;
        let (Some(code), Some(category)) = (row.get(code_idx), row.get(category_idx)) else {
            continue;
        };
        let (code, category) = (code.trim(), category.trim());
        if code.is_empty() || category.is_empty() {
            continue;
        }
        pairs.push((code.to_string(), category.to_string()));
    }

    let classifier = Classifier::from_pairs(pairs);
    info!(path = %path.display(), codes = classifier.len(), "Lookup table loaded");
    Ok(classifier)
}

/// Reads a whole CSV as header plus string rows.
pub fn load_table(path: &Path, separator: Option<u8>) -> Result<(Vec<String>, Vec<Vec<String>>)> {
    let text = read_text(path)?;
    let mut rdr = reader_for(&text, separator);
    let headers: Vec<String> = rdr
        .headers()
        .with_context(|| format!("reading header of {}", path.display()))?
        .iter()
        .map(|h| h.trim().to_string())
        .collect();

    let mut rows = Vec::new();
    for result in rdr.records() {
        let row = result.with_context(|| format!("reading {}", path.display()))?;
        rows.push(row.iter().map(str::to_string).collect());
    }
    Ok((headers, rows))
}

fn log_load(shape: &str, stats: &LoadStats) {
    info!(
        shape,
        files = stats.files,
        rows_read = stats.rows_read,
        rows_kept = stats.rows_kept,
        rows_filtered = stats.rows_filtered,
        dropped = stats.dropped_total(),
        dropped_pct = stats.dropped_pct(),
        "Input loaded"
    );
    for (kind, count) in &stats.dropped {
        warn!(kind = %kind, count, "Rows dropped");
    }
}
