//! Configuration file handling.
//!
//! This module handles loading and merging configuration from
//! `.perfboard.toml` files.

use crate::models::Grouping;
use crate::source::ColumnMap;
use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Default configuration file name.
pub const CONFIG_FILE: &str = ".perfboard.toml";

/// Root configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// General settings.
    #[serde(default)]
    pub general: GeneralConfig,

    /// Data source settings.
    #[serde(default)]
    pub source: SourceConfig,

    /// Dashboard (aggregation) settings.
    #[serde(default)]
    pub dashboard: DashboardConfig,

    /// Default filters.
    #[serde(default)]
    pub filter: FilterConfig,
}

/// General application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneralConfig {
    /// Default report path.
    #[serde(default = "default_output")]
    pub output: String,

    /// Enable verbose logging by default.
    #[serde(default)]
    pub verbose: bool,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            output: default_output(),
            verbose: false,
        }
    }
}

fn default_output() -> String {
    "perfboard_report.md".to_string()
}

/// Where observations come from and how to read them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    /// Export file or directory; the `--data` flag overrides it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,

    /// Field delimiter for `.csv` files.
    #[serde(default = "default_delimiter")]
    pub delimiter: char,

    /// Fail on malformed rows instead of skipping them.
    #[serde(default)]
    pub strict: bool,

    /// Header names of the observation columns.
    #[serde(default)]
    pub columns: ColumnMap,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            path: None,
            delimiter: default_delimiter(),
            strict: false,
            columns: ColumnMap::default(),
        }
    }
}

fn default_delimiter() -> char {
    ','
}

/// Aggregation settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DashboardConfig {
    /// Metrics to aggregate, in display order.
    #[serde(default = "default_metrics")]
    pub metrics: Vec<String>,

    /// Partitioning for the statistics tables.
    #[serde(default)]
    pub group_by: Grouping,

    /// Include the entity-vs-group comparison.
    #[serde(default = "default_true")]
    pub compare: bool,

    /// Number of metrics in the frequency ranking.
    #[serde(default = "default_top")]
    pub top: usize,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            metrics: default_metrics(),
            group_by: Grouping::default(),
            compare: true,
            top: default_top(),
        }
    }
}

fn default_metrics() -> Vec<String> {
    vec![
        "Speed_Max",
        "Jump Height(M)",
        "Peak Velocity(M/S)",
        "Peak Propulsive Power(W)",
        "Distance_Total",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}

fn default_true() -> bool {
    true
}

fn default_top() -> usize {
    10
}

/// Filters applied when the command line does not set them.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FilterConfig {
    /// Allowed groups; empty means all.
    #[serde(default)]
    pub groups: Vec<String>,

    /// Allowed entities; empty means all.
    #[serde(default)]
    pub entities: Vec<String>,

    /// Calendar year.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub year: Option<i32>,

    /// Relative window in days.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_days: Option<u64>,
}

impl Config {
    /// Load configuration from a file path.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        config
            .validate()
            .with_context(|| format!("Invalid config file: {}", path.display()))?;

        Ok(config)
    }

    /// Try to load configuration from the default location.
    ///
    /// Returns `Ok(None)` if the file doesn't exist, `Err` if it exists but can't be parsed.
    pub fn load_default() -> Result<Option<Self>> {
        Self::load_from_dir(Path::new("."))
    }

    /// Try to load `.perfboard.toml` from a directory.
    pub fn load_from_dir(dir: &Path) -> Result<Option<Self>> {
        let config_path = dir.join(CONFIG_FILE);

        if config_path.exists() {
            Ok(Some(Self::load(&config_path)?))
        } else {
            Ok(None)
        }
    }

    /// Reject settings no run could use.
    pub fn validate(&self) -> Result<()> {
        if !self.source.delimiter.is_ascii() {
            bail!(
                "Delimiter must be a single ASCII character, got '{}'",
                self.source.delimiter
            );
        }
        if self.dashboard.top == 0 {
            bail!("dashboard.top must be at least 1");
        }
        Ok(())
    }

    /// Merge this configuration with CLI arguments.
    ///
    /// CLI arguments take precedence over config file settings.
    /// This method only overrides config when CLI provides explicit values.
    pub fn merge_with_args(&mut self, args: &crate::cli::Args) {
        if let Some(ref data) = args.data {
            self.source.path = Some(data.display().to_string());
        }
        if let Some(ref output) = args.output {
            self.general.output = output.display().to_string();
        }
        if args.strict {
            self.source.strict = true;
        }

        // Dashboard settings - only override if provided
        if let Some(ref metrics) = args.metrics {
            self.dashboard.metrics = metrics.clone();
        }
        if let Some(group_by) = args.group_by {
            self.dashboard.group_by = group_by;
        }
        if args.no_compare {
            self.dashboard.compare = false;
        }
        if let Some(top) = args.top {
            self.dashboard.top = top;
        }

        // Filter defaults - a CLI value replaces the configured one
        if let Some(ref groups) = args.groups {
            self.filter.groups = groups.clone();
        }
        if let Some(ref entities) = args.entities {
            self.filter.entities = entities.clone();
        }
        if args.year.is_some() {
            self.filter.year = args.year;
        }
        if args.last_days.is_some() {
            self.filter.last_days = args.last_days;
        }

        // Flags always override
        if args.verbose {
            self.general.verbose = true;
        }
    }

    /// Generate a default configuration file content.
    pub fn default_toml() -> String {
        let config = Config::default();
        toml::to_string_pretty(&config).unwrap_or_else(|_| String::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.general.output, "perfboard_report.md");
        assert_eq!(config.dashboard.metrics.len(), 5);
        assert!(config.dashboard.metrics.contains(&"Speed_Max".to_string()));
        assert_eq!(config.dashboard.group_by, Grouping::Both);
        assert_eq!(config.source.columns.entity, "entity");
        assert!(config.filter.groups.is_empty());
    }

    #[test]
    fn test_parse_config() {
        let toml_content = r#"
[general]
output = "team_report.md"
verbose = true

[source]
path = "exports/"
delimiter = ";"
strict = true

[source.columns]
entity = "playername"
group = "groupteam"

[dashboard]
metrics = ["Avg. Braking Force(N)", "Landing Stiffness(N/m)"]
group_by = "group"
compare = false

[filter]
groups = ["Football", "Mens Soccer"]
year = 2024
"#;

        let config: Config = toml::from_str(toml_content).unwrap();
        assert_eq!(config.general.output, "team_report.md");
        assert!(config.general.verbose);
        assert_eq!(config.source.path.as_deref(), Some("exports/"));
        assert_eq!(config.source.delimiter, ';');
        assert!(config.source.strict);
        assert_eq!(config.source.columns.entity, "playername");
        assert_eq!(config.source.columns.metric, "metric");
        assert_eq!(config.dashboard.metrics.len(), 2);
        assert_eq!(config.dashboard.group_by, Grouping::Group);
        assert!(!config.dashboard.compare);
        assert_eq!(config.dashboard.top, 10);
        assert_eq!(config.filter.groups, vec!["Football", "Mens Soccer"]);
        assert_eq!(config.filter.year, Some(2024));
        assert_eq!(config.filter.last_days, None);
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = Config::default();
        config.source.delimiter = 'é';
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.dashboard.top = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_load_from_dir() {
        let dir = tempfile::tempdir().unwrap();
        assert!(Config::load_from_dir(dir.path()).unwrap().is_none());

        std::fs::write(dir.path().join(CONFIG_FILE), "[dashboard]\ntop = 3\n").unwrap();
        let config = Config::load_from_dir(dir.path()).unwrap().unwrap();
        assert_eq!(config.dashboard.top, 3);

        std::fs::write(dir.path().join(CONFIG_FILE), "[dashboard\n").unwrap();
        assert!(Config::load_from_dir(dir.path()).is_err());
    }

    #[test]
    fn test_default_toml_generation() {
        let toml_str = Config::default_toml();
        assert!(!toml_str.is_empty());
        assert!(toml_str.contains("[general]"));
        assert!(toml_str.contains("[source.columns]"));
        assert!(toml_str.contains("[dashboard]"));

        let parsed: Config = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed.dashboard.metrics, Config::default().dashboard.metrics);
    }
}
