//! Entity-versus-group comparison.

use super::aggregate::aggregate;
use crate::error::{PipelineError, PipelineResult};
use crate::models::{ComparisonRow, Grouping, Observation};
use std::collections::hash_map::Entry;
use std::collections::{HashMap, HashSet};
use tracing::debug;

/// Pair every entity's mean with the mean of its group, per metric.
///
/// Entities are keyed by `(entity, group)`: an entity recorded under two
/// groups yields one row per group, each compared against that group's
/// mean. The output is one row per `(entity, group, metric)` in first-seen
/// order.
pub fn compare<S: AsRef<str>>(
    rows: &[Observation],
    metrics: &[S],
) -> PipelineResult<Vec<ComparisonRow>> {
    let wanted: HashSet<&str> = metrics.iter().map(AsRef::as_ref).collect();
    let group_stats = aggregate(rows, metrics, Grouping::Group);

    let mut order: Vec<(&str, &str, &str)> = Vec::new();
    let mut sums: HashMap<(&str, &str, &str), (f64, usize)> = HashMap::new();
    for obs in rows.iter().filter(|o| wanted.contains(o.metric.as_str())) {
        let key = (
            obs.entity_id.as_str(),
            obs.group_id.as_str(),
            obs.metric.as_str(),
        );
        match sums.entry(key) {
            Entry::Occupied(mut entry) => {
                let (sum, count) = entry.get_mut();
                *sum += obs.value;
                *count += 1;
            }
            Entry::Vacant(entry) => {
                order.push(key);
                entry.insert((obs.value, 1));
            }
        }
    }

    let mut out = Vec::with_capacity(order.len());
    for key in order {
        let (entity, group, metric) = key;
        let (sum, count) = sums[&key];

        let group_mean = group_stats
            .group(group, metric)
            .map(|s| s.mean)
            .ok_or_else(|| PipelineError::OrphanEntity {
                entity: entity.to_string(),
                group: group.to_string(),
                metric: metric.to_string(),
            })?;

        out.push(ComparisonRow {
            entity_id: entity.to_string(),
            group_id: group.to_string(),
            metric: metric.to_string(),
            entity_mean: sum / count as f64,
            group_mean,
        });
    }

    debug!("Built {} comparison rows", out.len());
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::testutil::obs;

    #[test]
    fn test_compare_pairs_entity_with_group() {
        let rows = vec![
            obs("e1", "g1", "M", "2024-01-01", 10.0),
            obs("e1", "g1", "M", "2024-01-05", 14.0),
            obs("e2", "g1", "M", "2024-01-02", 24.0),
            obs("e3", "g2", "M", "2024-01-02", 5.0),
        ];
        let out = compare(&rows, &["M"]).unwrap();

        assert_eq!(out.len(), 3);
        assert_eq!(out[0].entity_id, "e1");
        assert_eq!(out[0].entity_mean, 12.0);
        assert_eq!(out[0].group_mean, 16.0);
        assert_eq!(out[1].entity_id, "e2");
        assert_eq!(out[1].entity_mean, 24.0);
        assert_eq!(out[2].group_id, "g2");
        assert_eq!(out[2].group_mean, 5.0);
    }

    #[test]
    fn test_group_mean_is_shared_within_group() {
        let rows = vec![
            obs("e1", "g1", "M", "2024-01-01", 1.0),
            obs("e2", "g1", "M", "2024-01-01", 2.0),
            obs("e3", "g1", "M", "2024-01-01", 6.0),
            obs("e1", "g1", "N", "2024-01-02", 10.0),
            obs("e3", "g1", "N", "2024-01-02", 30.0),
        ];
        let out = compare(&rows, &["M", "N"]).unwrap();

        for metric in ["M", "N"] {
            let means: Vec<f64> = out
                .iter()
                .filter(|r| r.metric == metric && r.group_id == "g1")
                .map(|r| r.group_mean)
                .collect();
            assert!(!means.is_empty());
            assert!(means.windows(2).all(|w| w[0] == w[1]));
        }
        assert_eq!(out.iter().filter(|r| r.metric == "N").count(), 2);
    }

    #[test]
    fn test_entity_in_two_groups_gets_a_row_per_group() {
        let rows = vec![
            obs("e1", "g1", "M", "2024-01-01", 10.0),
            obs("e1", "g2", "M", "2025-01-01", 30.0),
            obs("e2", "g2", "M", "2025-01-01", 50.0),
        ];
        let out = compare(&rows, &["M"]).unwrap();
        assert_eq!(out.len(), 3);
        assert_eq!((out[0].group_id.as_str(), out[0].entity_mean), ("g1", 10.0));
        assert_eq!(out[0].group_mean, 10.0);
        assert_eq!((out[1].group_id.as_str(), out[1].entity_mean), ("g2", 30.0));
        assert_eq!(out[1].group_mean, 40.0);
    }

    #[test]
    fn test_transferred_entity_with_metric_only_in_new_group() {
        let rows = vec![
            obs("ben", "g1", "N", "2024-01-01", 1.0),
            obs("amy", "g1", "N", "2024-01-01", 3.0),
            obs("ben", "g2", "M", "2024-02-01", 2.0),
            obs("cal", "g2", "M", "2024-02-01", 4.0),
        ];
        let out = compare(&rows, &["M", "N"]).unwrap();
        assert_eq!(out.len(), 4);

        let ben: Vec<(&str, &str, f64)> = out
            .iter()
            .filter(|r| r.entity_id == "ben")
            .map(|r| (r.group_id.as_str(), r.metric.as_str(), r.group_mean))
            .collect();
        assert_eq!(ben, vec![("g1", "N", 2.0), ("g2", "M", 3.0)]);
    }

    #[test]
    fn test_empty_input_gives_empty_output() {
        let out = compare::<&str>(&[], &["M"]).unwrap();
        assert!(out.is_empty());

        let rows = vec![obs("e1", "g1", "M", "2024-01-01", 10.0)];
        assert!(compare(&rows, &["Other"]).unwrap().is_empty());
    }
}
