//! Pipeline errors.

use chrono::NaiveDate;
use thiserror::Error;

/// Errors raised by the filter and comparison stages.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PipelineError {
    /// A filter referenced names outside the dataset's domain.
    #[error("Invalid filter: unknown {field} {}", .unknown.join(", "))]
    InvalidFilter {
        /// Which filter field (`group`, `entity` or `metric`).
        field: &'static str,
        /// Every unknown name, sorted.
        unknown: Vec<String>,
    },

    /// A date range whose start lies after its end.
    #[error("Invalid filter: date range starts {start} after it ends {end}")]
    InvalidDateRange { start: NaiveDate, end: NaiveDate },

    /// An entity aggregate whose group has no group-level aggregate.
    #[error("Orphan entity '{entity}': no aggregate for group '{group}' on metric '{metric}'")]
    OrphanEntity {
        entity: String,
        group: String,
        metric: String,
    },
}

pub type PipelineResult<T> = std::result::Result<T, PipelineError>;
