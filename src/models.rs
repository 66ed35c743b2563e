//! Data models for the metrics pipeline.
//!
//! This module contains the core data structures shared by the loader,
//! the pipeline stages and the report generator.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// One measured value of one metric for one entity at one timestamp.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    /// Subject of the measurement (e.g. a player).
    pub entity_id: String,
    /// Collection the entity belongs to (e.g. a team).
    pub group_id: String,
    /// Name of the measured quantity.
    pub metric: String,
    /// Naive wall-clock time of the measurement.
    pub timestamp: NaiveDateTime,
    /// Measured value.
    pub value: f64,
}

impl Observation {
    /// Calendar date of the measurement.
    pub fn date(&self) -> NaiveDate {
        self.timestamp.date()
    }

    /// Display label combining entity and group, e.g. `Jordan (Football)`.
    pub fn label(&self) -> String {
        entity_label(&self.entity_id, &self.group_id)
    }
}

/// Format an `entity (group)` label.
pub fn entity_label(entity_id: &str, group_id: &str) -> String {
    format!("{} ({})", entity_id, group_id)
}

/// Which key a partition was built from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Scope {
    Entity,
    Group,
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scope::Entity => write!(f, "Entity"),
            Scope::Group => write!(f, "Group"),
        }
    }
}

/// Grouping requested from the aggregator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Grouping {
    /// Partition by entity id.
    Entity,
    /// Partition by group id.
    Group,
    /// Partition by both; every row feeds one entity and one group partition.
    #[default]
    Both,
}

impl Grouping {
    /// Scopes produced by this grouping, in the order rows feed them.
    pub fn scopes(&self) -> &'static [Scope] {
        match self {
            Grouping::Entity => &[Scope::Entity],
            Grouping::Group => &[Scope::Group],
            Grouping::Both => &[Scope::Entity, Scope::Group],
        }
    }
}

/// Key of one aggregation partition.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AggregateKey {
    pub scope: Scope,
    /// Entity id or group id depending on `scope`.
    pub id: String,
    pub metric: String,
}

impl AggregateKey {
    pub fn new(scope: Scope, id: impl Into<String>, metric: impl Into<String>) -> Self {
        Self {
            scope,
            id: id.into(),
            metric: metric.into(),
        }
    }
}

/// Descriptive statistics for one partition.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Stats {
    pub mean: f64,
    /// Sample standard deviation (ddof = 1). `None` for a single observation.
    pub std: Option<f64>,
    pub min: f64,
    pub max: f64,
    /// Number of observations that contributed. Always at least 1.
    pub count: usize,
}

/// Entity mean next to its group's mean for one metric.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComparisonRow {
    pub entity_id: String,
    pub group_id: String,
    pub metric: String,
    pub entity_mean: f64,
    pub group_mean: f64,
}

impl ComparisonRow {
    /// Entity mean minus group mean.
    pub fn delta(&self) -> f64 {
        self.entity_mean - self.group_mean
    }
}

/// Least-squares line of value against time.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Trend {
    /// Change in value per day.
    pub slope_per_day: f64,
    /// Fitted value at the earliest timestamp.
    pub intercept: f64,
    /// Number of points in the fit.
    pub points: usize,
}

/// A group x metric table.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PivotTable {
    /// Row labels (group ids).
    pub rows: Vec<String>,
    /// Column labels (metric names).
    pub columns: Vec<String>,
    /// `cells[row][column]`; `None` where no observation exists.
    pub cells: Vec<Vec<Option<f64>>>,
}

impl PivotTable {
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty() || self.columns.is_empty()
    }
}

#[cfg(test)]
impl PivotTable {
    /// Look up a cell by labels.
    pub(crate) fn get(&self, row: &str, column: &str) -> Option<f64> {
        let r = self.rows.iter().position(|x| x == row)?;
        let c = self.columns.iter().position(|x| x == column)?;
        self.cells[r][c]
    }
}

/// Statistics rows for one metric in the report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricSection {
    pub metric: String,
    /// Partitions for this metric in aggregation order.
    pub partitions: Vec<(AggregateKey, Stats)>,
    /// Trend over all filtered observations of the metric.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trend: Option<Trend>,
}

/// Metadata about a report run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportMetadata {
    /// Path of the loaded export.
    pub source: String,
    /// Date and time the report was generated.
    pub generated_at: DateTime<Utc>,
    /// Date relative windows were resolved against.
    pub reference_date: NaiveDate,
    /// Observations loaded from the source.
    pub rows_loaded: usize,
    /// Malformed source rows that were skipped.
    pub rows_skipped: usize,
    /// Observations left after filtering.
    pub rows_matched: usize,
    /// Human-readable descriptions of the active filters.
    pub filters: Vec<String>,
    /// Duration of the run in seconds.
    pub duration_seconds: f64,
}

/// The complete metrics report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Report {
    pub metadata: ReportMetadata,
    /// One section per requested metric, in request order.
    pub metrics: Vec<MetricSection>,
    /// Entity vs group means. Empty when comparison is disabled.
    pub comparison: Vec<ComparisonRow>,
    /// Metric occurrence counts in the filtered view.
    pub frequency: Vec<(String, usize)>,
    /// Observation counts per group and requested metric.
    pub counts: PivotTable,
    /// Mean value per group and requested metric.
    pub means: PivotTable,
}
