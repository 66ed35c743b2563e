//! Delimited-file (CSV/TSV) exports.

use super::{ColumnMap, DataSource, LoadOptions, LoadOutcome, RawRow, RowError};
use anyhow::{Context, Result};
use csv::{ErrorKind, ReaderBuilder, StringRecord, Trim};
use std::borrow::Cow;
use std::path::PathBuf;
use tracing::debug;

/// Positions of the observation columns in a header row.
#[derive(Debug, Clone, Copy)]
struct ColumnIndex {
    entity: usize,
    group: usize,
    metric: usize,
    timestamp: usize,
    value: usize,
}

impl ColumnIndex {
    fn resolve(headers: &StringRecord, columns: &ColumnMap) -> Result<Self> {
        let find = |name: &str| {
            headers
                .iter()
                .position(|h| h.eq_ignore_ascii_case(name))
                .with_context(|| {
                    format!(
                        "Missing column '{}' (found: {})",
                        name,
                        headers.iter().collect::<Vec<_>>().join(", ")
                    )
                })
        };
        Ok(Self {
            entity: find(&columns.entity)?,
            group: find(&columns.group)?,
            metric: find(&columns.metric)?,
            timestamp: find(&columns.timestamp)?,
            value: find(&columns.value)?,
        })
    }

    fn row<'r>(&self, record: &'r StringRecord) -> RawRow<'r> {
        RawRow {
            entity: record.get(self.entity).map(Cow::Borrowed),
            group: record.get(self.group).map(Cow::Borrowed),
            metric: record.get(self.metric).map(Cow::Borrowed),
            timestamp: record.get(self.timestamp).map(Cow::Borrowed),
            value: record.get(self.value).map(Cow::Borrowed),
        }
    }
}

/// A single delimited export with a header row.
#[derive(Debug, Clone)]
pub struct CsvSource {
    path: PathBuf,
    options: LoadOptions,
}

impl CsvSource {
    pub fn new(path: PathBuf, options: LoadOptions) -> Self {
        Self { path, options }
    }
}

impl DataSource for CsvSource {
    fn load(&self) -> Result<LoadOutcome> {
        let mut reader = ReaderBuilder::new()
            .delimiter(self.options.delimiter)
            .trim(Trim::All)
            .flexible(true)
            .from_path(&self.path)
            .with_context(|| format!("Failed to open {}", self.path.display()))?;

        let headers = reader
            .headers()
            .with_context(|| format!("Failed to read header of {}", self.path.display()))?
            .clone();
        let index = ColumnIndex::resolve(&headers, &self.options.columns)
            .with_context(|| format!("Unexpected header in {}", self.path.display()))?;
        debug!("Column positions for {}: {:?}", self.path.display(), index);

        let mut outcome = LoadOutcome::for_file(&self.path);
        let mut record = StringRecord::new();
        loop {
            match reader.read_record(&mut record) {
                Ok(true) => {
                    let line = record.position().map(|p| p.line()).unwrap_or(0);
                    let row = index.row(&record).parse();
                    outcome.record(row, &self.path, line, self.options.strict)?;
                }
                Ok(false) => break,
                Err(e) if matches!(e.kind(), ErrorKind::Utf8 { .. }) => {
                    let line = e.position().map(|p| p.line()).unwrap_or(0);
                    let row = Err(RowError::BadEncoding);
                    outcome.record(row, &self.path, line, self.options.strict)?;
                }
                Err(e) => {
                    return Err(e)
                        .with_context(|| format!("Failed to read {}", self.path.display()));
                }
            }
        }

        Ok(outcome)
    }

    fn describe(&self) -> String {
        self.path.display().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    const HEADER: &str = "playername,groupteam,metric,timestamp,value";

    fn options() -> LoadOptions {
        LoadOptions {
            columns: ColumnMap {
                entity: "playername".to_string(),
                group: "groupteam".to_string(),
                ..ColumnMap::default()
            },
            ..LoadOptions::default()
        }
    }

    #[test]
    fn test_load_csv_with_mapped_columns() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("export.csv");
        fs::write(
            &path,
            format!(
                "{}\nJordan, Football ,Speed_Max,2024-03-01 09:15:00,8.4\nRiley,Womens Soccer,Jump Height(M),2024-03-02,0.41\n",
                HEADER
            ),
        )
        .unwrap();

        let outcome = CsvSource::new(path, options()).load().unwrap();
        assert_eq!(outcome.observations.len(), 2);
        assert_eq!(outcome.skipped, 0);
        let first = &outcome.observations[0];
        assert_eq!(first.entity_id, "Jordan");
        assert_eq!(first.group_id, "Football");
        assert_eq!(first.value, 8.4);
    }

    #[test]
    fn test_header_match_is_case_insensitive_and_order_free() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("export.csv");
        fs::write(
            &path,
            "Value,Timestamp,Metric,Group,Entity\n3.5,2024-01-01,M,g1,e1\n",
        )
        .unwrap();
        let outcome = CsvSource::new(path, LoadOptions::default()).load().unwrap();
        assert_eq!(outcome.observations[0].value, 3.5);
        assert_eq!(outcome.observations[0].entity_id, "e1");
    }

    #[test]
    fn test_missing_column_is_an_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("export.csv");
        fs::write(&path, "entity,metric,timestamp,value\ne1,M,2024-01-01,1\n").unwrap();
        let err = CsvSource::new(path, LoadOptions::default()).load().unwrap_err();
        assert!(format!("{:#}", err).contains("Missing column 'group'"));
    }

    #[test]
    fn test_malformed_rows_are_skipped() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("export.csv");
        fs::write(
            &path,
            format!(
                "{}\nA,T,M,2024-01-01,1\nB,T,M,not-a-date,2\nC,T,M,2024-01-03,\nD,T,M\nE,T,M,2024-01-05,5\n",
                HEADER
            ),
        )
        .unwrap();
        let outcome = CsvSource::new(path, options()).load().unwrap();
        assert_eq!(outcome.observations.len(), 2);
        assert_eq!(outcome.skipped, 3);
    }

    #[test]
    fn test_invalid_utf8_row_is_skipped() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("export.csv");
        let mut content = b"entity,group,metric,timestamp,value\n".to_vec();
        content.extend_from_slice(b"e1,g1,M,2024-01-01,1\n");
        content.extend_from_slice(b"e\xff2,g1,M,2024-01-02,2\n");
        content.extend_from_slice(b"e3,g1,M,2024-01-03,3\n");
        fs::write(&path, content).unwrap();

        let outcome = CsvSource::new(path.clone(), LoadOptions::default())
            .load()
            .unwrap();
        assert_eq!(outcome.observations.len(), 2);
        assert_eq!(outcome.skipped, 1);
        assert_eq!(outcome.observations[1].entity_id, "e3");

        let strict = LoadOptions {
            strict: true,
            ..LoadOptions::default()
        };
        let err = CsvSource::new(path, strict).load().unwrap_err();
        assert!(err.to_string().contains(":3:"), "{}", err);
    }

    #[test]
    fn test_strict_mode_reports_line() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("export.csv");
        fs::write(
            &path,
            format!("{}\nA,T,M,2024-01-01,1\nB,T,M,2024-01-02,oops\n", HEADER),
        )
        .unwrap();
        let strict = LoadOptions {
            strict: true,
            ..options()
        };
        let err = CsvSource::new(path, strict).load().unwrap_err();
        let message = err.to_string();
        assert!(message.contains(":3:"), "{}", message);
        assert!(message.contains("oops"));
    }

    #[test]
    fn test_semicolon_delimiter() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("export.csv");
        fs::write(&path, "entity;group;metric;timestamp;value\ne1;g1;M;2024-01-01;2.5\n").unwrap();
        let opts = LoadOptions {
            delimiter: b';',
            ..LoadOptions::default()
        };
        let outcome = CsvSource::new(path, opts).load().unwrap();
        assert_eq!(outcome.observations[0].value, 2.5);
    }
}
