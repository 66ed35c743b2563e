//! Filter → aggregate → compare pipeline.
//!
//! Every stage is a pure function of its inputs; a run derives new views and
//! never touches the loaded dataset.

pub mod aggregate;
pub mod clock;
pub mod compare;
pub mod dataset;
pub mod explore;
pub mod filter;

#[cfg(test)]
pub(crate) mod testutil;

pub use clock::{Clock, FixedClock, SystemClock};
pub use dataset::Dataset;
pub use explore::{top_groups, top_metrics_for_groups};
pub use filter::{DateWindow, FilterComposer, FilterSpec};

use aggregate::aggregate;
use compare::compare;
use explore::{count_pivot, mean_pivot, metric_frequency, trend};

use crate::error::PipelineResult;
use crate::models::{ComparisonRow, Grouping, MetricSection, Observation, PivotTable};
use tracing::{debug, info};

/// What one pipeline run should produce.
#[derive(Debug, Clone)]
pub struct RunOptions {
    /// Metrics to aggregate, in display order.
    pub metrics: Vec<String>,
    pub group_by: Grouping,
    /// Build the entity-vs-group comparison.
    pub compare: bool,
    /// Number of metrics listed in the frequency ranking.
    pub top: usize,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            metrics: Vec::new(),
            group_by: Grouping::Both,
            compare: true,
            top: 10,
        }
    }
}

/// Everything a report needs from one run.
#[derive(Debug, Clone)]
pub struct RunOutput {
    pub filtered: Dataset,
    pub sections: Vec<MetricSection>,
    pub comparison: Vec<ComparisonRow>,
    pub frequency: Vec<(String, usize)>,
    pub counts: PivotTable,
    pub means: PivotTable,
}

/// Run one full pass over `dataset`.
pub fn run<C: Clock>(
    composer: &FilterComposer<C>,
    dataset: &Dataset,
    spec: &FilterSpec,
    options: &RunOptions,
) -> PipelineResult<RunOutput> {
    let filtered = composer.apply(dataset, spec)?;
    info!(
        "{} of {} observations match the filters",
        filtered.len(),
        dataset.len()
    );

    let rows = filtered.rows();
    let stats = aggregate(rows, &options.metrics, options.group_by);
    debug!("Aggregated {} partitions", stats.len());

    let sections = options
        .metrics
        .iter()
        .map(|metric| {
            let metric_rows: Vec<Observation> =
                rows.iter().filter(|o| &o.metric == metric).cloned().collect();
            MetricSection {
                metric: metric.clone(),
                partitions: stats.for_metric(metric).cloned().collect(),
                trend: trend(&metric_rows),
            }
        })
        .collect();

    let comparison = if options.compare {
        compare(rows, &options.metrics)?
    } else {
        Vec::new()
    };

    let mut frequency = metric_frequency(rows);
    frequency.truncate(options.top);

    let counts = count_pivot(rows, &options.metrics);
    let means = mean_pivot(rows, &options.metrics);

    Ok(RunOutput {
        filtered,
        sections,
        comparison,
        frequency,
        counts,
        means,
    })
}
