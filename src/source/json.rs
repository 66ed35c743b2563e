//! JSON exports: an array of flat objects, one per observation.

use super::{DataSource, LoadOptions, LoadOutcome, RawRow};
use anyhow::{Context, Result};
use serde_json::{Map, Value};
use std::borrow::Cow;
use std::path::PathBuf;

/// A JSON array export.
#[derive(Debug, Clone)]
pub struct JsonSource {
    path: PathBuf,
    options: LoadOptions,
}

impl JsonSource {
    pub fn new(path: PathBuf, options: LoadOptions) -> Self {
        Self { path, options }
    }
}

/// Strings pass through; numbers and booleans are rendered.
fn field<'a>(object: &'a Map<String, Value>, name: &str) -> Option<Cow<'a, str>> {
    match object.get(name)? {
        Value::String(s) => Some(Cow::Borrowed(s.as_str())),
        Value::Number(n) => Some(Cow::Owned(n.to_string())),
        Value::Bool(b) => Some(Cow::Owned(b.to_string())),
        _ => None,
    }
}

impl DataSource for JsonSource {
    fn load(&self) -> Result<LoadOutcome> {
        let content = std::fs::read_to_string(&self.path)
            .with_context(|| format!("Failed to read {}", self.path.display()))?;
        let records: Vec<Map<String, Value>> = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse {}", self.path.display()))?;

        let columns = &self.options.columns;
        let mut outcome = LoadOutcome::for_file(&self.path);
        for (i, object) in records.iter().enumerate() {
            let row = RawRow {
                entity: field(object, &columns.entity),
                group: field(object, &columns.group),
                metric: field(object, &columns.metric),
                timestamp: field(object, &columns.timestamp),
                value: field(object, &columns.value),
            };
            // Report the 1-based record position in place of a line number.
            outcome.record(row.parse(), &self.path, i as u64 + 1, self.options.strict)?;
        }

        Ok(outcome)
    }

    fn describe(&self) -> String {
        self.path.display().to_string()
    }
}
