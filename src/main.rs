//! CLI entry point for temporal_factors.
//!
//! Provides subcommands for computing disaggregation factors from long-format
//! series, building per-category profiles from wide monthly tables, and
//! summing inventory columns per sector.

use anyhow::{Result, ensure};
use clap::{Args, Parser, Subcommand};
use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use temporal_factors::analyzers::sector::DEFAULT_DROP_COLUMNS;
use temporal_factors::{
    config::{Overrides, PipelineConfig},
    output::print_json,
    parser::DateLocale,
    pipeline::{run_factors, run_profiles, run_sector_totals},
};
use tracing::{error, info};
use tracing_subscriber::{
    EnvFilter, Layer,
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

#[derive(Parser)]
#[command(name = "temporal_factors")]
#[command(
    about = "Temporal disaggregation factors for energy-generation and production series",
    long_about = None
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct RunArgs {
    /// JSON configuration file; flags below override its values
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Directory holding the input CSV files
    #[arg(short, long)]
    input_dir: Option<PathBuf>,

    /// Directory for the exported CSV files
    #[arg(short, long)]
    output_dir: Option<PathBuf>,

    /// Field separator; detected from each header when omitted
    #[arg(short, long)]
    separator: Option<char>,

    /// Date and number conventions (pt-BR or en)
    #[arg(long)]
    locale: Option<DateLocale>,

    /// Category to keep; repeat for several, omit to keep all
    #[arg(long = "category", value_name = "CATEGORY")]
    categories: Vec<String>,
}

impl RunArgs {
    fn resolve(self, lookup: Option<PathBuf>) -> Result<PipelineConfig> {
        let overrides = Overrides {
            input_dir: self.input_dir,
            output_dir: self.output_dir,
            separator: self.separator,
            date_locale: self.locale,
            categories: self.categories,
            lookup,
        };
        PipelineConfig::resolve(self.config.as_deref(), overrides)
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Hourly, daily, weekly and monthly factors from long-format series
    Factors {
        #[command(flatten)]
        run: RunArgs,
    },
    /// Per-category hourly, weekday and monthly profiles from wide monthly tables
    Profiles {
        #[command(flatten)]
        run: RunArgs,

        /// Code to category lookup CSV
        #[arg(short, long, value_name = "FILE")]
        lookup: Option<PathBuf>,
    },
    /// Sum every numeric column of an inventory CSV per sector
    SectorTotals {
        /// Inventory CSV
        #[arg(value_name = "FILE")]
        input: PathBuf,

        /// CSV file to write the totals to
        #[arg(short, long, default_value = "emissao_agg_por_setor.csv")]
        output: PathBuf,

        /// Column to group by
        #[arg(short, long, default_value = "SETOR")]
        group_column: String,

        /// Column to leave out of the totals; repeat for several
        #[arg(long = "drop", value_name = "COLUMN")]
        drop: Vec<String>,

        /// Field separator; detected from the header when omitted
        #[arg(short, long)]
        separator: Option<char>,

        /// Number conventions (pt-BR or en)
        #[arg(long, default_value = "en")]
        locale: DateLocale,
    },
}

fn main() -> Result<()> {
    dotenvy::dotenv().ok(); // Load .env file

    // Logging setup: colored stderr + JSON rolling log file
    let log_file_path = std::env::var("LOG_FILE_PATH")
        .unwrap_or_else(|_| "logs/temporal_factors.log".to_string());
    let log_dir = Path::new(&log_file_path)
        .parent()
        .unwrap_or(Path::new("logs"));
    let log_file_name = Path::new(&log_file_path)
        .file_name()
        .unwrap_or(OsStr::new("temporal_factors.log"));

    let file_appender = tracing_appender::rolling::daily(log_dir, log_file_name);
    let (non_blocking_file, _file_guard) = tracing_appender::non_blocking(file_appender);

    let stderr_layer = fmt::layer()
        .with_target(true)
        .with_span_events(FmtSpan::CLOSE)
        .with_ansi(true)
        .with_writer(std::io::stderr)
        .with_filter(EnvFilter::from_env("RUST_LOG").add_directive("info".parse()?));

    let json_layer = fmt::layer()
        .json()
        .with_current_span(true)
        .with_span_list(true)
        .with_writer(non_blocking_file)
        .with_filter(EnvFilter::from_env("RUST_LOG_JSON").add_directive("debug".parse()?));

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(json_layer)
        .init();

    let cli = Cli::parse();

    if let Err(err) = run(cli.command) {
        error!(error = %format!("{err:#}"), "Run failed");
        return Err(err);
    }
    Ok(())
}

fn run(command: Commands) -> Result<()> {
    match command {
        Commands::Factors { run } => {
            let config = run.resolve(None)?;
            let summary = run_factors(&config)?;
            print_json(&summary)?;
            info!(output_dir = %config.output_dir.display(), "Factors exported");
        }
        Commands::Profiles { run, lookup } => {
            let config = run.resolve(lookup)?;
            let summary = run_profiles(&config)?;
            print_json(&summary)?;
            info!(output_dir = %config.output_dir.display(), "Profiles exported");
        }
        Commands::SectorTotals {
            input,
            output,
            group_column,
            drop,
            separator,
            locale,
        } => {
            let drop = if drop.is_empty() {
                DEFAULT_DROP_COLUMNS.iter().map(|c| c.to_string()).collect()
            } else {
                drop
            };
            let separator = separator.map(separator_byte).transpose()?;
            let totals =
                run_sector_totals(&input, &output, &group_column, &drop, separator, locale)?;
            info!(
                groups = totals.rows.len(),
                columns = totals.columns.len(),
                "Sector totals exported"
            );
        }
    }

    Ok(())
}

/// A `--separator` value as a single delimiter byte.
fn separator_byte(sep: char) -> Result<u8> {
    ensure!(sep.is_ascii(), "separator '{sep}' must be a single ASCII character");
    Ok(sep as u8)
}
