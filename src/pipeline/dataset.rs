//! Immutable observation sets and their domain.

use crate::models::Observation;
use std::collections::BTreeSet;
use std::sync::Arc;

/// Known names of a loaded dataset.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Domain {
    pub groups: BTreeSet<String>,
    pub entities: BTreeSet<String>,
    pub metrics: BTreeSet<String>,
}

impl Domain {
    /// Collect the domain of a set of observations.
    pub fn from_rows(rows: &[Observation]) -> Self {
        let mut domain = Self::default();
        for obs in rows {
            if !domain.groups.contains(&obs.group_id) {
                domain.groups.insert(obs.group_id.clone());
            }
            if !domain.entities.contains(&obs.entity_id) {
                domain.entities.insert(obs.entity_id.clone());
            }
            if !domain.metrics.contains(&obs.metric) {
                domain.metrics.insert(obs.metric.clone());
            }
        }
        domain
    }
}

/// Observations plus the domain they were loaded with.
///
/// Views produced by filtering share the domain of the dataset they came
/// from, so a filter that was valid on the base data stays valid when it is
/// re-applied to a view.
#[derive(Debug, Clone, PartialEq)]
pub struct Dataset {
    rows: Vec<Observation>,
    domain: Arc<Domain>,
}

impl Dataset {
    pub fn new(rows: Vec<Observation>) -> Self {
        let domain = Arc::new(Domain::from_rows(&rows));
        Self { rows, domain }
    }

    pub fn rows(&self) -> &[Observation] {
        &self.rows
    }

    pub fn domain(&self) -> &Domain {
        &self.domain
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Build a view over `rows` that keeps this dataset's domain.
    pub(crate) fn derive(&self, rows: Vec<Observation>) -> Self {
        Self {
            rows,
            domain: Arc::clone(&self.domain),
        }
    }
}
