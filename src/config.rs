//! Run configuration.
//!
//! Stored as a JSON object on disk; every field is optional:
//! ```json
//! {
//!   "input_dir": "inputs/dados",
//!   "output_dir": "outputs/fatoresTermo",
//!   "separator": ";",
//!   "date_locale": "pt-BR",
//!   "categories_to_include": ["TÉRMICA"],
//!   "columns": { "category": "nom_tipousina", "timestamp": "din_instante", "measure": "val_geracao" },
//!   "granularities": ["hour", "day", "week", "month"],
//!   "parent": "year"
//! }
//! ```

use anyhow::{Context, Result, bail, ensure};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::analyzers::profile::CyclicalAxis;
use crate::analyzers::types::Granularity;
use crate::parser::DateLocale;

/// Names of the columns read from long-format inputs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ColumnConfig {
    pub category: String,
    pub timestamp: String,
    pub measure: String,
}

impl Default for ColumnConfig {
    fn default() -> Self {
        Self {
            category: "nom_tipousina".to_string(),
            timestamp: "din_instante".to_string(),
            measure: "val_geracao".to_string(),
        }
    }
}

/// Code lookup joined to wide-table class labels.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LookupConfig {
    pub path: Option<PathBuf>,
    pub code_column: String,
    pub category_column: String,
}

impl Default for LookupConfig {
    fn default() -> Self {
        Self {
            path: None,
            code_column: "prod_code".to_string(),
            category_column: "nfr".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub input_dir: PathBuf,
    pub output_dir: PathBuf,
    /// Field delimiter; sniffed from each file's header when absent.
    pub separator: Option<char>,
    pub date_locale: DateLocale,
    /// Category values to keep; empty keeps everything.
    pub categories_to_include: Vec<String>,
    pub columns: ColumnConfig,
    /// Factor granularities, each computed against `parent`.
    pub granularities: Vec<Granularity>,
    pub parent: Granularity,
    pub profile_axes: Vec<CyclicalAxis>,
    pub lookup: LookupConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            input_dir: PathBuf::from("inputs"),
            output_dir: PathBuf::from("outputs"),
            separator: None,
            date_locale: DateLocale::default(),
            categories_to_include: Vec::new(),
            columns: ColumnConfig::default(),
            granularities: vec![
                Granularity::Hour,
                Granularity::Day,
                Granularity::Week,
                Granularity::Month,
            ],
            parent: Granularity::Year,
            profile_axes: CyclicalAxis::ALL.to_vec(),
            lookup: LookupConfig::default(),
        }
    }
}

/// Command-line values that take precedence over the config file.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub input_dir: Option<PathBuf>,
    pub output_dir: Option<PathBuf>,
    pub separator: Option<char>,
    pub date_locale: Option<DateLocale>,
    pub categories: Vec<String>,
    pub lookup: Option<PathBuf>,
}

impl PipelineConfig {
    /// Loads the config from a JSON file at `path`.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        let config: PipelineConfig = serde_json::from_str(&content)
            .with_context(|| format!("parsing config {}", path.display()))?;
        Ok(config)
    }

    /// Defaults, then the optional file, then `overrides`; validated.
    pub fn resolve(path: Option<&Path>, overrides: Overrides) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::load(path)?,
            None => Self::default(),
        };
        config.apply(overrides);
        config.validate()?;
        Ok(config)
    }

    pub fn apply(&mut self, overrides: Overrides) {
        if let Some(dir) = overrides.input_dir {
            self.input_dir = dir;
        }
        if let Some(dir) = overrides.output_dir {
            self.output_dir = dir;
        }
        if let Some(sep) = overrides.separator {
            self.separator = Some(sep);
        }
        if let Some(locale) = overrides.date_locale {
            self.date_locale = locale;
        }
        if !overrides.categories.is_empty() {
            self.categories_to_include = overrides.categories;
        }
        if let Some(path) = overrides.lookup {
            self.lookup.path = Some(path);
        }
    }

    pub fn validate(&self) -> Result<()> {
        ensure!(!self.granularities.is_empty(), "at least one granularity is required");
        for g in &self.granularities {
            if !g.nests_in(self.parent) {
                bail!("granularity '{g}' does not nest in parent '{}'", self.parent);
            }
        }
        if let Some(sep) = self.separator {
            ensure!(sep.is_ascii(), "separator '{sep}' must be a single ASCII character");
        }
        Ok(())
    }

    pub fn separator_byte(&self) -> Option<u8> {
        self.separator.and_then(|c| u8::try_from(c).ok())
    }
}
