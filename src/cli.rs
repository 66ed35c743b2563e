//! Command-line interface argument parsing.
//!
//! This module handles all CLI argument parsing using clap,
//! including validation and default values.

use crate::models::Grouping;
use crate::pipeline::DateWindow;
use chrono::NaiveDate;
use clap::Parser;
use std::path::PathBuf;

/// Perfboard - sports-performance metrics explorer
///
/// Filter sensor exports by team, player, year or date window, then report
/// per-metric statistics, trends and player-vs-team comparisons.
///
/// Examples:
///   perfboard --data exports/sessions.csv
///   perfboard --data exports/ --group Football,"Mens Soccer" --year 2024
///   perfboard --data sessions.csv --entity "Jordan Reyes" --last-days 30
///   perfboard --data sessions.csv --metrics "Jump Height(M)" --format json -o report.json
///   perfboard --data sessions.csv --dry-run
///   perfboard --init-config
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Args {
    /// Export file (.csv, .tsv, .json) or directory of exports
    ///
    /// Can also be set via PERFBOARD_DATA or `source.path` in .perfboard.toml.
    #[arg(short, long, value_name = "PATH", env = "PERFBOARD_DATA")]
    pub data: Option<PathBuf>,

    /// Groups (teams) to include (comma-separated, default: all)
    #[arg(short, long = "group", value_name = "GROUPS", value_delimiter = ',')]
    pub groups: Option<Vec<String>>,

    /// Entities (players) to include (comma-separated, default: all)
    #[arg(short, long = "entity", value_name = "ENTITIES", value_delimiter = ',')]
    pub entities: Option<Vec<String>>,

    /// Restrict the filtered view to these metrics (comma-separated)
    ///
    /// Unlike --metrics, unknown names here are an error.
    #[arg(long, value_name = "METRICS", value_delimiter = ',')]
    pub only_metric: Option<Vec<String>>,

    /// Calendar year to include
    #[arg(short, long, value_name = "YEAR")]
    pub year: Option<i32>,

    /// First date to include (YYYY-MM-DD)
    #[arg(long, value_name = "DATE", conflicts_with = "last_days")]
    pub from: Option<NaiveDate>,

    /// Last date to include (YYYY-MM-DD)
    #[arg(long, value_name = "DATE", conflicts_with = "last_days")]
    pub to: Option<NaiveDate>,

    /// Only include the last N days, counted back from today
    #[arg(long, value_name = "DAYS")]
    pub last_days: Option<u64>,

    /// Date that counts as "today" for --last-days (YYYY-MM-DD)
    ///
    /// Pins relative windows so reports are reproducible.
    #[arg(long, value_name = "DATE")]
    pub today: Option<NaiveDate>,

    /// Metrics to aggregate (comma-separated)
    ///
    /// Names with no observations are left out of the statistics.
    #[arg(short, long, value_name = "METRICS", value_delimiter = ',')]
    pub metrics: Option<Vec<String>>,

    /// Partitioning for the statistics tables
    #[arg(long, value_name = "KEY")]
    pub group_by: Option<Grouping>,

    /// Skip the entity-vs-group comparison
    #[arg(long)]
    pub no_compare: bool,

    /// Number of metrics in the frequency ranking
    #[arg(long, value_name = "COUNT")]
    pub top: Option<usize>,

    /// Fail on malformed rows instead of skipping them
    #[arg(long)]
    pub strict: bool,

    /// Output file path for the report
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Output format (markdown, json)
    #[arg(long, default_value = "markdown", value_name = "FORMAT")]
    pub format: OutputFormat,

    /// Path to configuration file
    ///
    /// If not specified, looks for .perfboard.toml in the current directory
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Enable verbose logging output
    #[arg(short, long)]
    pub verbose: bool,

    /// Run in quiet mode (minimal output)
    #[arg(short, long)]
    pub quiet: bool,

    /// Load the data and print what it contains without aggregating
    #[arg(long)]
    pub dry_run: bool,

    /// Generate a default .perfboard.toml configuration file
    #[arg(long)]
    pub init_config: bool,
}

/// Output format for the report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum OutputFormat {
    /// Markdown format (default)
    #[default]
    Markdown,
    /// JSON format
    Json,
}

impl Args {
    /// Parse command-line arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Validate the parsed arguments.
    pub fn validate(&self) -> Result<(), String> {
        // Skip validation for --init-config
        if self.init_config {
            return Ok(());
        }

        // Check for conflicting options
        if self.verbose && self.quiet {
            return Err("Cannot use both --verbose and --quiet".to_string());
        }

        if let (Some(from), Some(to)) = (self.from, self.to) {
            if from > to {
                return Err(format!("--from {} is after --to {}", from, to));
            }
        }

        if self.top == Some(0) {
            return Err("--top must be at least 1".to_string());
        }

        if let Some(ref metrics) = self.metrics {
            if metrics.iter().all(|m| m.trim().is_empty()) {
                return Err("--metrics needs at least one metric name".to_string());
            }
        }

        // Validate data path if provided
        if let Some(ref data) = self.data {
            if !data.exists() {
                return Err(format!("Data path does not exist: {}", data.display()));
            }
        }

        Ok(())
    }

    /// Returns the log level based on verbosity settings.
    pub fn log_level(&self) -> tracing::Level {
        if self.quiet {
            tracing::Level::ERROR
        } else if self.verbose {
            tracing::Level::DEBUG
        } else {
            tracing::Level::INFO
        }
    }

    /// Date window requested with --from/--to, if any.
    ///
    /// A missing bound is open-ended.
    pub fn date_range(&self) -> Option<DateWindow> {
        if self.from.is_none() && self.to.is_none() {
            return None;
        }
        Some(DateWindow::Range {
            start: self.from.unwrap_or(NaiveDate::MIN),
            end: self.to.unwrap_or(NaiveDate::MAX),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_args() -> Args {
        Args {
            data: None,
            groups: None,
            entities: None,
            only_metric: None,
            year: None,
            from: None,
            to: None,
            last_days: None,
            today: None,
            metrics: None,
            group_by: None,
            no_compare: false,
            top: None,
            strict: false,
            output: None,
            format: OutputFormat::Markdown,
            config: None,
            verbose: false,
            quiet: false,
            dry_run: false,
            init_config: false,
        }
    }

    #[test]
    fn test_parse_filters() {
        let args = Args::try_parse_from([
            "perfboard",
            "--group",
            "Football,Mens Soccer",
            "-e",
            "Jordan Reyes",
            "--year",
            "2024",
            "--metrics",
            "Speed_Max,Jump Height(M)",
            "--group-by",
            "entity",
            "--today",
            "2024-03-01",
        ])
        .unwrap();
        assert_eq!(
            args.groups,
            Some(vec!["Football".to_string(), "Mens Soccer".to_string()])
        );
        assert_eq!(args.entities, Some(vec!["Jordan Reyes".to_string()]));
        assert_eq!(args.year, Some(2024));
        assert_eq!(args.metrics.as_ref().map(|m| m.len()), Some(2));
        assert_eq!(args.group_by, Some(Grouping::Entity));
        assert_eq!(args.today, NaiveDate::from_ymd_opt(2024, 3, 1));
    }

    #[test]
    fn test_last_days_conflicts_with_range() {
        let result = Args::try_parse_from([
            "perfboard",
            "--last-days",
            "30",
            "--from",
            "2024-01-01",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn test_validation_conflicting_options() {
        let mut args = make_args();
        args.verbose = true;
        args.quiet = true;
        assert!(args.validate().is_err());
    }

    #[test]
    fn test_validation_inverted_range() {
        let mut args = make_args();
        args.from = NaiveDate::from_ymd_opt(2024, 5, 1);
        args.to = NaiveDate::from_ymd_opt(2024, 4, 1);
        assert!(args.validate().is_err());
    }

    #[test]
    fn test_validation_missing_data_path() {
        let mut args = make_args();
        args.data = Some(PathBuf::from("/definitely/not/here.csv"));
        assert!(args.validate().is_err());
    }

    #[test]
    fn test_date_range_open_ends() {
        let mut args = make_args();
        assert_eq!(args.date_range(), None);

        args.from = NaiveDate::from_ymd_opt(2024, 1, 1);
        assert_eq!(
            args.date_range(),
            Some(DateWindow::Range {
                start: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
                end: NaiveDate::MAX,
            })
        );
    }

    #[test]
    fn test_log_level() {
        let mut args = make_args();
        assert_eq!(args.log_level(), tracing::Level::INFO);

        args.verbose = true;
        assert_eq!(args.log_level(), tracing::Level::DEBUG);

        args.verbose = false;
        args.quiet = true;
        assert_eq!(args.log_level(), tracing::Level::ERROR);
    }
}
