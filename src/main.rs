//! Perfboard - sports-performance metrics explorer
//!
//! A CLI tool that loads sensor-metric exports, narrows them with
//! composable filters, and reports per-metric statistics, trends and
//! entity-versus-group comparisons.
//!
//! Exit codes:
//!   0 - Success (including filters that match nothing)
//!   1 - Error (bad arguments, unreadable data, invalid filter, orphan entity)

mod cli;
mod config;
mod error;
mod models;
mod pipeline;
mod report;
mod source;

use anyhow::{Context, Result};
use chrono::Utc;
use cli::{Args, OutputFormat};
use config::Config;
use models::{Report, ReportMetadata};
use pipeline::{
    Clock, Dataset, DateWindow, FilterComposer, FilterSpec, FixedClock, RunOptions, SystemClock,
};
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{debug, error, info, warn};
use tracing_subscriber::FmtSubscriber;

fn main() -> Result<()> {
    // Parse command-line arguments
    let args = Args::parse_args();

    // Validate arguments
    if let Err(e) = args.validate() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }

    // Handle --init-config early (no logging needed)
    if args.init_config {
        return handle_init_config();
    }

    init_logging(&args)?;

    info!("Perfboard v{}", env!("CARGO_PKG_VERSION"));
    debug!("Arguments: {:?}", args);

    if let Err(e) = run_report(args) {
        error!("Run failed: {:#}", e);
        eprintln!("\n❌ Error: {:#}", e);
        std::process::exit(1);
    }
    Ok(())
}

/// Handle --init-config: generate a default .perfboard.toml.
fn handle_init_config() -> Result<()> {
    let path = Path::new(config::CONFIG_FILE);

    if path.exists() {
        eprintln!(
            "⚠️  {} already exists. Remove it first or edit it manually.",
            config::CONFIG_FILE
        );
        std::process::exit(1);
    }

    let content = Config::default_toml();
    std::fs::write(path, &content)
        .with_context(|| format!("Failed to write {}", config::CONFIG_FILE))?;

    println!("✅ Created {} with default settings.", config::CONFIG_FILE);
    println!("   Edit it to set the data path, column names, metrics and default filters.");
    Ok(())
}

/// Initialize logging based on verbosity settings.
fn init_logging(args: &Args) -> Result<()> {
    let level = args.log_level();

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .with_writer(std::io::stderr)
        .compact()
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .context("Failed to set tracing subscriber")
}

/// Load, filter, aggregate and write the report.
fn run_report(args: Args) -> Result<()> {
    let start_time = Instant::now();

    let mut config = load_config(&args)?;
    config.merge_with_args(&args);
    config.validate()?;

    let data_path = config
        .source
        .path
        .clone()
        .map(PathBuf::from)
        .context("No data source: pass --data or set source.path in .perfboard.toml")?;

    // Step 1: Load observations
    let outcome = source::load(&data_path, &source::LoadOptions::from(&config.source))?;
    let rows_skipped = outcome.skipped;
    let dataset = Dataset::new(outcome.observations);
    if dataset.is_empty() {
        warn!("{} contains no usable observations", data_path.display());
    }

    let clock: Box<dyn Clock> = match args.today {
        Some(date) => {
            info!("Pinning today to {}", date);
            Box::new(FixedClock(date))
        }
        None => Box::new(SystemClock),
    };
    let composer = FilterComposer::new(clock);

    if args.dry_run {
        handle_dry_run(&dataset, rows_skipped);
        return Ok(());
    }

    // Step 2: Filter, aggregate, compare
    let spec = build_filter_spec(&config, &args);
    if spec.is_unrestricted() {
        info!("No filters active; using all observations");
    }
    let options = RunOptions {
        metrics: config.dashboard.metrics.clone(),
        group_by: config.dashboard.group_by,
        compare: config.dashboard.compare,
        top: config.dashboard.top,
    };
    let output = pipeline::run(&composer, &dataset, &spec, &options)?;

    // Step 3: Build the report
    let metadata = ReportMetadata {
        source: data_path.display().to_string(),
        generated_at: Utc::now(),
        reference_date: composer.clock().today(),
        rows_loaded: dataset.len(),
        rows_skipped,
        rows_matched: output.filtered.len(),
        filters: spec.describe(composer.clock()),
        duration_seconds: start_time.elapsed().as_secs_f64(),
    };

    let report = Report {
        metadata,
        metrics: output.sections,
        comparison: output.comparison,
        frequency: output.frequency,
        counts: output.counts,
        means: output.means,
    };

    let rendered = match args.format {
        OutputFormat::Json => report::generate_json_report(&report)?,
        OutputFormat::Markdown => report::generate_markdown_report(&report),
    };

    let output_path = output_path(&config, &args);
    std::fs::write(&output_path, &rendered)
        .with_context(|| format!("Failed to write report to {}", output_path.display()))?;

    // Print summary
    let with_data = report
        .metrics
        .iter()
        .filter(|s| !s.partitions.is_empty())
        .count();
    println!("\n📊 Summary:");
    println!(
        "   Observations: {} loaded, {} matched",
        report.metadata.rows_loaded, report.metadata.rows_matched
    );
    println!(
        "   Metrics with data: {} of {}",
        with_data,
        report.metrics.len()
    );
    if !report.comparison.is_empty() {
        println!("   Comparison rows: {}", report.comparison.len());
    }
    println!("\n✅ Report saved to: {}", output_path.display());

    Ok(())
}

/// Handle --dry-run: describe the loaded data, exit.
fn handle_dry_run(dataset: &Dataset, rows_skipped: usize) {
    let domain = dataset.domain();

    println!("\n🔍 Dry run: data loaded, nothing aggregated\n");
    println!(
        "   Observations: {} ({} malformed rows skipped)",
        dataset.len(),
        rows_skipped
    );
    println!("   Groups: {}", domain.groups.len());
    println!("   Entities: {}", domain.entities.len());
    println!("   Metrics: {}", domain.metrics.len());

    let groups = pipeline::top_groups(dataset.rows(), 5);
    if !groups.is_empty() {
        println!("\n   Most observed groups: {}", groups.join(", "));
        println!("   Most recorded metrics in those groups:");
        for (metric, count) in pipeline::top_metrics_for_groups(dataset.rows(), &groups, 5) {
            println!("     📈 {} ({})", metric, count);
        }
    }

    if let Some(first) = dataset.rows().first() {
        println!(
            "\n   First row: {} {} = {} at {}",
            first.label(),
            first.metric,
            first.value,
            first.timestamp
        );
    }

    println!("\n✅ Dry run complete.");
}

/// Combine configured filters with command-line overrides.
fn build_filter_spec(config: &Config, args: &Args) -> FilterSpec {
    let window = match (args.date_range(), config.filter.last_days) {
        (Some(range), _) => range,
        (None, Some(days)) => DateWindow::Relative { days },
        (None, None) => DateWindow::All,
    };

    FilterSpec::all()
        .with_groups(config.filter.groups.iter().cloned())
        .with_entities(config.filter.entities.iter().cloned())
        .with_metrics(args.only_metric.iter().flatten().cloned())
        .with_year(config.filter.year)
        .with_window(window)
}

/// Report path; a JSON report replaces a default `.md` extension.
fn output_path(config: &Config, args: &Args) -> PathBuf {
    let path = PathBuf::from(&config.general.output);
    if args.output.is_none()
        && args.format == OutputFormat::Json
        && path.extension().is_some_and(|e| e == "md")
    {
        return path.with_extension("json");
    }
    path
}

/// Load configuration from file or use defaults.
fn load_config(args: &Args) -> Result<Config> {
    // Try explicit config path
    if let Some(ref config_path) = args.config {
        info!("Loading config from: {}", config_path.display());
        return Config::load(config_path);
    }

    // Try default location
    match Config::load_default() {
        Ok(Some(config)) => {
            info!("Loaded default config from {}", config::CONFIG_FILE);
            Ok(config)
        }
        Ok(None) => {
            debug!("No config file found, using defaults");
            Ok(Config::default())
        }
        Err(e) => {
            warn!("Failed to load config: {:#}", e);
            Ok(Config::default())
        }
    }
}
