//! Per-metric aggregation and descriptive statistics.
//!
//! Rows are partitioned by metric and by entity and/or group in a single
//! pass. Partitions appear in the order their first row was seen.

use crate::models::{AggregateKey, Grouping, Observation, Scope, Stats};
use std::collections::hash_map::Entry;
use std::collections::{HashMap, HashSet};

/// Running mean/variance (Welford) with min and max.
#[derive(Debug, Clone, Copy)]
struct Accumulator {
    count: usize,
    mean: f64,
    m2: f64,
    min: f64,
    max: f64,
}

impl Accumulator {
    fn new(value: f64) -> Self {
        Self {
            count: 1,
            mean: value,
            m2: 0.0,
            min: value,
            max: value,
        }
    }

    fn push(&mut self, value: f64) {
        self.count += 1;
        let delta = value - self.mean;
        self.mean += delta / self.count as f64;
        self.m2 += delta * (value - self.mean);
        self.min = self.min.min(value);
        self.max = self.max.max(value);
    }

    fn finish(&self) -> Stats {
        let std = if self.count > 1 {
            Some((self.m2 / (self.count - 1) as f64).sqrt())
        } else {
            None
        };
        Stats {
            mean: self.mean,
            std,
            min: self.min,
            max: self.max,
            count: self.count,
        }
    }
}

/// Statistics per `(scope, id, metric)` partition, in first-seen order.
///
/// Only partitions with at least one observation are present.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AggregationResult {
    entries: Vec<(AggregateKey, Stats)>,
    index: HashMap<AggregateKey, usize>,
}

impl AggregationResult {
    pub fn get(&self, key: &AggregateKey) -> Option<&Stats> {
        self.index.get(key).map(|&i| &self.entries[i].1)
    }

    pub fn group(&self, group_id: &str, metric: &str) -> Option<&Stats> {
        self.get(&AggregateKey::new(Scope::Group, group_id, metric))
    }

    /// Partitions of one metric, in aggregation order.
    pub fn for_metric<'a>(
        &'a self,
        metric: &'a str,
    ) -> impl Iterator<Item = &'a (AggregateKey, Stats)> + 'a {
        self.entries.iter().filter(move |(key, _)| key.metric == metric)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }
}

#[cfg(test)]
impl AggregationResult {
    fn entity(&self, entity_id: &str, metric: &str) -> Option<&Stats> {
        self.get(&AggregateKey::new(Scope::Entity, entity_id, metric))
    }

    fn iter(&self) -> impl Iterator<Item = &(AggregateKey, Stats)> {
        self.entries.iter()
    }

    fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Aggregate `rows` whose metric is listed in `metrics`.
///
/// Metric names with no matching rows simply produce no entry.
pub fn aggregate<S: AsRef<str>>(
    rows: &[Observation],
    metrics: &[S],
    group_by: Grouping,
) -> AggregationResult {
    let wanted: HashSet<&str> = metrics.iter().map(AsRef::as_ref).collect();

    let mut order: Vec<AggregateKey> = Vec::new();
    let mut partitions: HashMap<AggregateKey, Accumulator> = HashMap::new();

    for obs in rows.iter().filter(|o| wanted.contains(o.metric.as_str())) {
        for &scope in group_by.scopes() {
            let id = match scope {
                Scope::Entity => &obs.entity_id,
                Scope::Group => &obs.group_id,
            };
            match partitions.entry(AggregateKey::new(scope, id.as_str(), obs.metric.as_str())) {
                Entry::Occupied(mut entry) => entry.get_mut().push(obs.value),
                Entry::Vacant(entry) => {
                    order.push(entry.key().clone());
                    entry.insert(Accumulator::new(obs.value));
                }
            }
        }
    }

    let mut result = AggregationResult::default();
    for key in order {
        if let Some(acc) = partitions.get(&key) {
            result.index.insert(key.clone(), result.entries.len());
            result.entries.push((key, acc.finish()));
        }
    }
    result
}
