//! Exploration helpers: frequency rankings, pivot tables and trend lines.

use super::aggregate::aggregate;
use crate::models::{Grouping, Observation, PivotTable, Stats, Trend};
use std::collections::{HashMap, HashSet};

/// Count occurrences of each key, most frequent first.
///
/// Ties keep first-seen order.
fn ranked_counts<'a>(keys: impl Iterator<Item = &'a str>) -> Vec<(String, usize)> {
    let mut order: Vec<&str> = Vec::new();
    let mut counts: HashMap<&str, usize> = HashMap::new();
    for key in keys {
        let count = counts.entry(key).or_insert_with(|| {
            order.push(key);
            0
        });
        *count += 1;
    }

    let mut ranked: Vec<(String, usize)> = order
        .into_iter()
        .map(|k| (k.to_string(), counts[k]))
        .collect();
    ranked.sort_by_key(|(_, count)| std::cmp::Reverse(*count));
    ranked
}

/// Observation count per metric.
pub fn metric_frequency(rows: &[Observation]) -> Vec<(String, usize)> {
    ranked_counts(rows.iter().map(|o| o.metric.as_str()))
}

/// The `n` groups with the most observations.
pub fn top_groups(rows: &[Observation], n: usize) -> Vec<String> {
    let mut ranked = ranked_counts(rows.iter().map(|o| o.group_id.as_str()));
    ranked.truncate(n);
    ranked.into_iter().map(|(group, _)| group).collect()
}

/// The `n` most frequent metrics among rows of the given groups.
pub fn top_metrics_for_groups<S: AsRef<str>>(
    rows: &[Observation],
    groups: &[S],
    n: usize,
) -> Vec<(String, usize)> {
    let wanted: HashSet<&str> = groups.iter().map(AsRef::as_ref).collect();
    let mut ranked = ranked_counts(
        rows.iter()
            .filter(|o| wanted.contains(o.group_id.as_str()))
            .map(|o| o.metric.as_str()),
    );
    ranked.truncate(n);
    ranked
}

/// Groups in first-seen order among rows carrying one of `metrics`.
fn pivot_rows<S: AsRef<str>>(rows: &[Observation], metrics: &[S]) -> Vec<String> {
    let wanted: HashSet<&str> = metrics.iter().map(AsRef::as_ref).collect();
    let mut seen = HashSet::new();
    rows.iter()
        .filter(|o| wanted.contains(o.metric.as_str()))
        .filter(|o| seen.insert(o.group_id.as_str()))
        .map(|o| o.group_id.clone())
        .collect()
}

fn build_pivot<S: AsRef<str>>(
    rows: &[Observation],
    metrics: &[S],
    fill: Option<f64>,
    cell: impl Fn(&Stats) -> f64,
) -> PivotTable {
    let groups = pivot_rows(rows, metrics);
    let stats = aggregate(rows, metrics, Grouping::Group);
    let columns: Vec<String> = metrics.iter().map(|m| m.as_ref().to_string()).collect();

    let cells = groups
        .iter()
        .map(|g| {
            columns
                .iter()
                .map(|m| stats.group(g, m).map(&cell).or(fill))
                .collect()
        })
        .collect();

    PivotTable {
        rows: groups,
        columns,
        cells,
    }
}

/// Observation count per group and metric; missing pairs count 0.
pub fn count_pivot<S: AsRef<str>>(rows: &[Observation], metrics: &[S]) -> PivotTable {
    build_pivot(rows, metrics, Some(0.0), |s| s.count as f64)
}

/// Mean value per group and metric; missing pairs are empty.
pub fn mean_pivot<S: AsRef<str>>(rows: &[Observation], metrics: &[S]) -> PivotTable {
    build_pivot(rows, metrics, None, |s| s.mean)
}

/// Least-squares fit of value against time in days.
///
/// Returns `None` with fewer than two points or when every point shares the
/// same timestamp.
pub fn trend(rows: &[Observation]) -> Option<Trend> {
    let origin = rows.iter().map(|o| o.timestamp).min()?;
    let points: Vec<(f64, f64)> = rows
        .iter()
        .map(|o| {
            let days = (o.timestamp - origin).num_seconds() as f64 / 86_400.0;
            (days, o.value)
        })
        .collect();

    let n = points.len();
    if n < 2 {
        return None;
    }

    let nf = n as f64;
    let mean_x = points.iter().map(|(x, _)| x).sum::<f64>() / nf;
    let mean_y = points.iter().map(|(_, y)| y).sum::<f64>() / nf;

    let (sxx, sxy) = points.iter().fold((0.0, 0.0), |(sxx, sxy), (x, y)| {
        let dx = x - mean_x;
        (sxx + dx * dx, sxy + dx * (y - mean_y))
    });
    if sxx == 0.0 {
        return None;
    }

    let slope = sxy / sxx;
    Some(Trend {
        slope_per_day: slope,
        intercept: mean_y - slope * mean_x,
        points: n,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::testutil::obs;

    fn rows() -> Vec<Observation> {
        vec![
            obs("e1", "Football", "Speed_Max", "2024-01-01", 8.0),
            obs("e2", "Football", "Speed_Max", "2024-01-02", 9.0),
            obs("e3", "Soccer", "Jump Height(M)", "2024-01-02", 0.4),
            obs("e1", "Football", "Jump Height(M)", "2024-01-03", 0.5),
            obs("e4", "Soccer", "Speed_Max", "2024-01-03", 7.0),
            obs("e5", "Tennis", "Distance_Total", "2024-01-04", 3000.0),
        ]
    }

    #[test]
    fn test_metric_frequency() {
        let freq = metric_frequency(&rows());
        assert_eq!(
            freq,
            vec![
                ("Speed_Max".to_string(), 3),
                ("Jump Height(M)".to_string(), 2),
                ("Distance_Total".to_string(), 1),
            ]
        );
    }

    #[test]
    fn test_frequency_ties_keep_first_seen_order() {
        let rows = vec![
            obs("e1", "g1", "B", "2024-01-01", 1.0),
            obs("e1", "g1", "A", "2024-01-01", 1.0),
        ];
        let freq = metric_frequency(&rows);
        assert_eq!(freq[0].0, "B");
        assert_eq!(freq[1].0, "A");
    }

    #[test]
    fn test_top_groups() {
        assert_eq!(top_groups(&rows(), 2), vec!["Football", "Soccer"]);
        assert_eq!(top_groups(&rows(), 10).len(), 3);
    }

    #[test]
    fn test_top_metrics_for_groups() {
        let top = top_metrics_for_groups(&rows(), &["Soccer"], 5);
        assert_eq!(top.len(), 2);
        assert!(top.iter().all(|(_, c)| *c == 1));
        assert!(top_metrics_for_groups(&rows(), &["Chess"], 5).is_empty());
    }

    #[test]
    fn test_count_pivot_fills_zero() {
        let pivot = count_pivot(&rows(), &["Speed_Max", "Jump Height(M)"]);
        assert_eq!(pivot.rows, vec!["Football", "Soccer"]);
        assert_eq!(pivot.get("Football", "Speed_Max"), Some(2.0));
        assert_eq!(pivot.get("Soccer", "Jump Height(M)"), Some(1.0));

        let with_tennis = count_pivot(&rows(), &["Speed_Max", "Distance_Total"]);
        assert_eq!(with_tennis.get("Tennis", "Speed_Max"), Some(0.0));
    }

    #[test]
    fn test_mean_pivot_leaves_gaps() {
        let pivot = mean_pivot(&rows(), &["Speed_Max", "Distance_Total"]);
        assert_eq!(pivot.get("Football", "Speed_Max"), Some(8.5));
        assert_eq!(pivot.get("Football", "Distance_Total"), None);
        assert_eq!(pivot.get("Tennis", "Distance_Total"), Some(3000.0));
    }

    #[test]
    fn test_trend_on_linear_series() {
        let rows = vec![
            obs("e1", "g1", "M", "2024-01-01", 10.0),
            obs("e1", "g1", "M", "2024-01-03", 14.0),
            obs("e1", "g1", "M", "2024-01-05", 18.0),
        ];
        let t = trend(&rows).unwrap();
        assert!((t.slope_per_day - 2.0).abs() < 1e-9);
        assert!((t.intercept - 10.0).abs() < 1e-9);
        assert_eq!(t.points, 3);
    }

    #[test]
    fn test_trend_degenerate_cases() {
        assert!(trend(&[]).is_none());
        assert!(trend(&[obs("e1", "g1", "M", "2024-01-01", 1.0)]).is_none());
        let same_time = vec![
            obs("e1", "g1", "M", "2024-01-01", 1.0),
            obs("e2", "g1", "M", "2024-01-01", 3.0),
        ];
        assert!(trend(&same_time).is_none());
    }
}
