use crate::models::Observation;
use chrono::{NaiveDate, NaiveDateTime};

/// Build an observation; `when` is `YYYY-MM-DD` or `YYYY-MM-DD HH:MM:SS`.
pub fn obs(entity: &str, group: &str, metric: &str, when: &str, value: f64) -> Observation {
    let timestamp = NaiveDateTime::parse_from_str(when, "%Y-%m-%d %H:%M:%S")
        .or_else(|_| {
            NaiveDate::parse_from_str(when, "%Y-%m-%d")
                .map(|d| d.and_hms_opt(0, 0, 0).unwrap())
        })
        .unwrap();
    Observation {
        entity_id: entity.to_string(),
        group_id: group.to_string(),
        metric: metric.to_string(),
        timestamp,
        value,
    }
}

pub fn date(s: &str) -> NaiveDate {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
}

pub fn names(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}
