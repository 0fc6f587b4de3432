//! End-to-end runs: load, aggregate, compute factors and profiles, export.

use anyhow::{Context, Result, bail, ensure};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::analyzers::aggregate::{aggregate, rollup};
use crate::analyzers::classify::{Classifier, UNCLASSIFIED, extract_code};
use crate::analyzers::expand::{MonthlyRecord, expand_to_hours, hours_in_month};
use crate::analyzers::factors::{DisaggregationFactor, compute_factors, validate_factors};
use crate::analyzers::profile::{CyclicalAxis, ProfileAccumulator, summarize_factors};
use crate::analyzers::sector::{SectorTotals, sum_by_group};
use crate::analyzers::types::Granularity;
use crate::config::PipelineConfig;
use crate::error::DisaggError;
use crate::loader::{load_lookup, load_table, load_timestamped, load_wide_monthly};
use crate::output::{
    write_category_profile, write_factors, write_profile_summary, write_sector_totals,
};
use crate::parser::DateLocale;
use crate::stats::LoadStats;

#[derive(Debug, Serialize)]
pub struct GranularitySummary {
    pub granularity: Granularity,
    pub buckets: usize,
    pub parents: usize,
    pub undefined_parents: usize,
    /// Largest distance of a parent's factor sum from 1.
    pub max_deviation: f64,
    pub output: PathBuf,
}

#[derive(Debug, Serialize)]
pub struct ProfileSummary {
    pub axis: CyclicalAxis,
    pub category: Option<String>,
    pub positions: usize,
    pub skipped_undefined: usize,
    pub output: PathBuf,
}

#[derive(Debug, Serialize)]
pub struct FactorRunSummary {
    pub load: LoadStats,
    pub granularities: Vec<GranularitySummary>,
    pub profiles: Vec<ProfileSummary>,
}

#[derive(Debug, Serialize)]
pub struct ProfileRunSummary {
    pub load: LoadStats,
    pub categories: usize,
    pub unclassified_labels: Vec<String>,
    pub unused_lookup_codes: Vec<String>,
    pub profiles: Vec<ProfileSummary>,
}

/// The factor series a profile axis is read from.
fn source_granularity(axis: CyclicalAxis) -> Granularity {
    match axis {
        CyclicalAxis::HourOfDay => Granularity::Hour,
        CyclicalAxis::DayOfWeek => Granularity::Day,
        CyclicalAxis::MonthOfYear => Granularity::Month,
    }
}

/// Computes factors of long-format series at every configured granularity
/// against `config.parent`, then profiles them along each configured axis.
///
/// Records are first summed per hour; coarser series are rolled up from the
/// hourly buckets.
#[tracing::instrument(
    skip(config),
    fields(input_dir = %config.input_dir.display(), output_dir = %config.output_dir.display())
)]
pub fn run_factors(config: &PipelineConfig) -> Result<FactorRunSummary> {
    let (records, load) = load_timestamped(config)?;
    ensure!(
        !records.is_empty(),
        "no valid rows left in {} after filtering",
        config.input_dir.display()
    );

    let hourly = aggregate(&records, Granularity::Hour);
    info!(hours = hourly.len(), "Hourly series aggregated");

    let granularities: BTreeSet<Granularity> = config.granularities.iter().copied().collect();
    let mut summaries = Vec::new();
    let mut computed: BTreeMap<Granularity, Vec<DisaggregationFactor>> = BTreeMap::new();

    for granularity in granularities {
        let buckets = if granularity == Granularity::Hour {
            hourly.clone()
        } else {
            rollup(&hourly, granularity)?
        };
        let factors = compute_factors(&buckets, config.parent)?;

        let check = validate_factors(&factors);
        for (parent, sum) in &check.sums {
            info!(%granularity, %parent, sum, "Factor sum per parent");
        }
        if !check.is_ok() {
            for (parent, sum) in &check.violations {
                warn!(%granularity, %parent, sum, "Factor sum is not 1");
            }
            bail!(
                "{granularity} factors of {} parent periods do not sum to 1",
                check.violations.len()
            );
        }
        for parent in &check.undefined {
            warn!(%granularity, %parent, "Parent total is zero; factors undefined");
        }

        let output = config
            .output_dir
            .join(format!("factors_{}.csv", granularity.as_str()));
        write_factors(&output, &factors)?;

        let max_deviation = check
            .sums
            .values()
            .map(|s| (s - 1.0).abs())
            .fold(0.0, f64::max);
        summaries.push(GranularitySummary {
            granularity,
            buckets: buckets.len(),
            parents: check.sums.len() + check.undefined.len(),
            undefined_parents: check.undefined.len(),
            max_deviation,
            output,
        });
        computed.insert(granularity, factors);
    }

    let mut profiles = Vec::new();
    for &axis in &config.profile_axes {
        let source = source_granularity(axis);
        let Some(factors) = computed.get(&source) else {
            debug!(%axis, %source, "Source granularity not computed; skipping profile");
            continue;
        };
        let (rows, skipped_undefined) = summarize_factors(factors, axis)?;
        let output = config
            .output_dir
            .join(format!("profile_{}.csv", axis.as_str()));
        write_profile_summary(&output, axis, &rows)?;
        profiles.push(ProfileSummary {
            axis,
            category: None,
            positions: rows.len(),
            skipped_undefined,
            output,
        });
    }

    info!(
        granularities = summaries.len(),
        profiles = profiles.len(),
        "Factor run complete"
    );
    Ok(FactorRunSummary {
        load,
        granularities: summaries,
        profiles,
    })
}

#[derive(Serialize)]
struct MonthlyRow<'a> {
    label: &'a str,
    code: &'a str,
    category: &'a str,
    year: i32,
    month: u32,
    total: f64,
    hours: u32,
    hourly_measure: f64,
}

/// Builds per-category cyclical profiles from wide monthly tables.
///
/// Each monthly total is spread uniformly over the hours of its month, the
/// hourly values are averaged per position, and each position's factor is
/// its mean over the sum of means. Labels are joined to categories through
/// the configured lookup; misses go to `unclassified`.
#[tracing::instrument(
    skip(config),
    fields(input_dir = %config.input_dir.display(), output_dir = %config.output_dir.display())
)]
pub fn run_profiles(config: &PipelineConfig) -> Result<ProfileRunSummary> {
    let classifier = match &config.lookup.path {
        Some(path) => load_lookup(
            path,
            &config.lookup.code_column,
            &config.lookup.category_column,
        )?,
        None => {
            warn!("No lookup table configured; every label is unclassified");
            Classifier::default()
        }
    };

    let (monthly, load) = load_wide_monthly(config)?;
    ensure!(
        !monthly.is_empty(),
        "no valid monthly values in {}",
        config.input_dir.display()
    );

    let mut by_category: BTreeMap<&str, Vec<&MonthlyRecord>> = BTreeMap::new();
    let mut seen_codes = BTreeSet::new();
    let mut unclassified_labels = BTreeSet::new();
    for record in &monthly {
        let code = extract_code(&record.category);
        seen_codes.insert(code);
        let categories = classifier.classify(code);
        if categories == [UNCLASSIFIED] {
            unclassified_labels.insert(record.category.clone());
        }
        for category in categories {
            by_category.entry(category).or_default().push(record);
        }
    }

    for label in &unclassified_labels {
        warn!(label = %label, "Label has no lookup entry; kept as unclassified");
    }
    let unused_lookup_codes: Vec<String> = classifier
        .unused_codes(seen_codes.iter().copied())
        .into_iter()
        .map(str::to_string)
        .collect();
    if !unused_lookup_codes.is_empty() {
        info!(codes = ?unused_lookup_codes, "Lookup codes without data");
    }

    write_monthly_table(
        &config.output_dir.join("monthly_long.csv"),
        &by_category,
    )?;

    let root = config.output_dir.join("profiles");
    let mut profiles = Vec::new();
    for (category, records) in &by_category {
        let mut accumulators: Vec<ProfileAccumulator> = config
            .profile_axes
            .iter()
            .map(|&axis| ProfileAccumulator::new(axis))
            .collect();
        for record in records {
            for hour in expand_to_hours(record)? {
                for acc in &mut accumulators {
                    acc.push_at(hour.timestamp, hour.measure);
                }
            }
        }

        for acc in accumulators {
            let axis = acc.axis();
            let rows = acc.finish();
            let output = write_category_profile(&root, category, axis, &rows)?;
            profiles.push(ProfileSummary {
                axis,
                category: Some(category.to_string()),
                positions: rows.len(),
                skipped_undefined: 0,
                output,
            });
        }
        debug!(category = %category, months = records.len(), "Category profiled");
    }

    info!(
        categories = by_category.len(),
        files = profiles.len(),
        root = %root.display(),
        "Profile run complete"
    );
    Ok(ProfileRunSummary {
        load,
        categories: by_category.len(),
        unclassified_labels: unclassified_labels.into_iter().collect(),
        unused_lookup_codes,
        profiles,
    })
}

fn write_monthly_table(path: &Path, by_category: &BTreeMap<&str, Vec<&MonthlyRecord>>) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("creating output directory {}", parent.display()))?;
    }
    let mut writer =
        csv::Writer::from_path(path).with_context(|| format!("creating {}", path.display()))?;
    for (category, records) in by_category {
        for record in records {
            let hours = hours_in_month(record.year, record.month).ok_or(
                DisaggError::InvalidMonth {
                    year: record.year,
                    month: record.month,
                },
            )?;
            writer.serialize(MonthlyRow {
                label: &record.category,
                code: extract_code(&record.category),
                category,
                year: record.year,
                month: record.month,
                total: record.total,
                hours,
                hourly_measure: record.total / f64::from(hours),
            })?;
        }
    }
    writer.flush()?;
    Ok(())
}

/// Sums every numeric column of `input` per `group_column` value.
#[tracing::instrument(skip_all, fields(input = %input.display(), output = %output.display()))]
pub fn run_sector_totals(
    input: &Path,
    output: &Path,
    group_column: &str,
    drop: &[String],
    separator: Option<u8>,
    locale: DateLocale,
) -> Result<SectorTotals> {
    let (headers, rows) = load_table(input, separator)?;
    info!(rows = rows.len(), columns = headers.len(), "Inventory loaded");
    let totals = sum_by_group(&headers, &rows, group_column, drop, locale)?;
    if totals.skipped_rows > 0 {
        warn!(skipped = totals.skipped_rows, "Rows without a group value");
    }
    write_sector_totals(output, &totals)?;
    Ok(totals)
}
