//! Data source adapters.
//!
//! Loads observations from delimited exports, JSON exports, or a directory
//! holding several of either. Column names are configurable so exports with
//! headers like `playername` / `groupteam` can be read without rewriting.

mod delimited;
mod json;

pub use delimited::CsvSource;
pub use json::JsonSource;

use crate::models::Observation;
use anyhow::{bail, Context, Result};
use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

/// Something that can produce the full observation set.
pub trait DataSource {
    fn load(&self) -> Result<LoadOutcome>;

    /// Short description for logs and reports.
    fn describe(&self) -> String;
}

/// Header names of the five observation columns.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnMap {
    #[serde(default = "default_entity_column")]
    pub entity: String,
    #[serde(default = "default_group_column")]
    pub group: String,
    #[serde(default = "default_metric_column")]
    pub metric: String,
    #[serde(default = "default_timestamp_column")]
    pub timestamp: String,
    #[serde(default = "default_value_column")]
    pub value: String,
}

impl Default for ColumnMap {
    fn default() -> Self {
        Self {
            entity: default_entity_column(),
            group: default_group_column(),
            metric: default_metric_column(),
            timestamp: default_timestamp_column(),
            value: default_value_column(),
        }
    }
}

fn default_entity_column() -> String {
    "entity".to_string()
}

fn default_group_column() -> String {
    "group".to_string()
}

fn default_metric_column() -> String {
    "metric".to_string()
}

fn default_timestamp_column() -> String {
    "timestamp".to_string()
}

fn default_value_column() -> String {
    "value".to_string()
}

/// Settings shared by every loader.
#[derive(Debug, Clone)]
pub struct LoadOptions {
    pub columns: ColumnMap,
    /// Field delimiter for delimited files.
    pub delimiter: u8,
    /// Fail on the first malformed row instead of skipping it.
    pub strict: bool,
}

impl Default for LoadOptions {
    fn default() -> Self {
        Self {
            columns: ColumnMap::default(),
            delimiter: b',',
            strict: false,
        }
    }
}

impl From<&crate::config::SourceConfig> for LoadOptions {
    fn from(config: &crate::config::SourceConfig) -> Self {
        Self {
            columns: config.columns.clone(),
            delimiter: config.delimiter as u8,
            strict: config.strict,
        }
    }
}

/// Observations read from a source plus bookkeeping.
#[derive(Debug, Clone, Default)]
pub struct LoadOutcome {
    pub observations: Vec<Observation>,
    /// Malformed rows that were skipped.
    pub skipped: usize,
    /// Files that were read.
    pub files: Vec<PathBuf>,
}

impl LoadOutcome {
    fn for_file(path: &Path) -> Self {
        Self {
            files: vec![path.to_path_buf()],
            ..Self::default()
        }
    }

    /// Record one parsed row; in lenient mode malformed rows are counted.
    fn record(
        &mut self,
        row: std::result::Result<Observation, RowError>,
        path: &Path,
        line: u64,
        strict: bool,
    ) -> Result<()> {
        match row {
            Ok(obs) => self.observations.push(obs),
            Err(e) if strict => {
                bail!("{}:{}: {}", path.display(), line, e);
            }
            Err(e) => {
                warn!("Skipping {}:{}: {}", path.display(), line, e);
                self.skipped += 1;
            }
        }
        Ok(())
    }

    fn extend(&mut self, other: LoadOutcome) {
        self.observations.extend(other.observations);
        self.skipped += other.skipped;
        self.files.extend(other.files);
    }
}

/// Why a single row could not become an observation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RowError {
    #[error("missing {0}")]
    MissingField(&'static str),
    #[error("unparseable timestamp '{0}'")]
    BadTimestamp(String),
    #[error("non-numeric value '{0}'")]
    BadValue(String),
    #[error("invalid UTF-8 text")]
    BadEncoding,
}

/// Raw field values of one row before parsing.
#[derive(Debug, Default)]
struct RawRow<'a> {
    entity: Option<Cow<'a, str>>,
    group: Option<Cow<'a, str>>,
    metric: Option<Cow<'a, str>>,
    timestamp: Option<Cow<'a, str>>,
    value: Option<Cow<'a, str>>,
}

fn required<'a>(
    field: Option<Cow<'a, str>>,
    name: &'static str,
) -> std::result::Result<Cow<'a, str>, RowError> {
    match field {
        Some(v) if !v.trim().is_empty() => Ok(v),
        _ => Err(RowError::MissingField(name)),
    }
}

impl RawRow<'_> {
    fn parse(self) -> std::result::Result<Observation, RowError> {
        let entity = required(self.entity, "entity")?;
        let group = required(self.group, "group")?;
        let metric = required(self.metric, "metric")?;
        let timestamp = required(self.timestamp, "timestamp")?;
        let value = required(self.value, "value")?;

        let timestamp = parse_timestamp(&timestamp)
            .ok_or_else(|| RowError::BadTimestamp(timestamp.to_string()))?;
        let value = value
            .trim()
            .parse::<f64>()
            .ok()
            .filter(|v| v.is_finite())
            .ok_or_else(|| RowError::BadValue(value.to_string()))?;

        Ok(Observation {
            entity_id: entity.trim().to_string(),
            group_id: group.trim().to_string(),
            metric: metric.trim().to_string(),
            timestamp,
            value,
        })
    }
}

const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M",
];

/// Parse an ISO-8601 timestamp into naive wall-clock time.
///
/// Offsets are dropped without conversion: `2024-01-01T23:00:00-05:00`
/// becomes `2024-01-01 23:00:00`.
pub fn parse_timestamp(s: &str) -> Option<NaiveDateTime> {
    let s = s.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.naive_local());
    }
    for fmt in DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(dt);
        }
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
}

/// Every supported export below a directory, loaded in path order.
#[derive(Debug, Clone)]
pub struct DirectorySource {
    root: PathBuf,
    options: LoadOptions,
}

impl DirectorySource {
    pub fn new(root: PathBuf, options: LoadOptions) -> Self {
        Self { root, options }
    }
}

impl DataSource for DirectorySource {
    fn load(&self) -> Result<LoadOutcome> {
        let mut outcome = LoadOutcome::default();

        for entry in WalkDir::new(&self.root).sort_by_file_name() {
            let entry = entry
                .with_context(|| format!("Failed to walk {}", self.root.display()))?;
            if !entry.file_type().is_file() {
                continue;
            }
            let Some(source) = file_source(entry.path(), &self.options) else {
                debug!("Ignoring {}", entry.path().display());
                continue;
            };
            outcome.extend(source.load()?);
        }

        if outcome.files.is_empty() {
            bail!("No .csv, .tsv or .json exports found in {}", self.root.display());
        }
        Ok(outcome)
    }

    fn describe(&self) -> String {
        format!("{}/", self.root.display())
    }
}

/// Loader for a single file, chosen by extension.
fn file_source(path: &Path, options: &LoadOptions) -> Option<Box<dyn DataSource>> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())?;
    match ext.as_str() {
        "csv" => Some(Box::new(CsvSource::new(path.to_path_buf(), options.clone()))),
        "tsv" => {
            let options = LoadOptions {
                delimiter: b'\t',
                ..options.clone()
            };
            Some(Box::new(CsvSource::new(path.to_path_buf(), options)))
        }
        "json" => Some(Box::new(JsonSource::new(path.to_path_buf(), options.clone()))),
        _ => None,
    }
}

/// Pick a loader for `path`: a directory, a `.csv`/`.tsv` file or a `.json` file.
pub fn open(path: &Path, options: &LoadOptions) -> Result<Box<dyn DataSource>> {
    if !path.exists() {
        bail!("Data source does not exist: {}", path.display());
    }
    if path.is_dir() {
        return Ok(Box::new(DirectorySource::new(path.to_path_buf(), options.clone())));
    }
    file_source(path, options).with_context(|| {
        format!(
            "Unsupported data file {} (expected .csv, .tsv or .json)",
            path.display()
        )
    })
}

/// Open and load in one step, logging a summary.
pub fn load(path: &Path, options: &LoadOptions) -> Result<LoadOutcome> {
    let source = open(path, options)?;
    info!("Loading observations from {}", source.describe());
    let outcome = source.load()?;
    info!(
        "Loaded {} observations from {} file(s), skipped {} malformed row(s)",
        outcome.observations.len(),
        outcome.files.len(),
        outcome.skipped
    );
    Ok(outcome)
}
