//! Markdown report generation.
//!
//! This module renders the metrics report as Markdown or JSON. Charts are
//! left to whatever consumes the JSON; the Markdown form uses tables only.

use crate::models::{
    entity_label, ComparisonRow, MetricSection, PivotTable, Report, ReportMetadata, Stats, Trend,
};
use anyhow::Result;

/// Generate a complete Markdown report.
pub fn generate_markdown_report(report: &Report) -> String {
    let mut output = String::new();

    // Title
    output.push_str("# Perfboard Report\n\n");

    output.push_str(&generate_metadata_section(&report.metadata));
    output.push_str(&generate_table_of_contents(report));
    output.push_str(&generate_filters_section(&report.metadata.filters));

    // Per-metric statistics
    output.push_str("## Metric Statistics\n\n");
    for section in &report.metrics {
        output.push_str(&generate_metric_section(section));
    }

    if !report.comparison.is_empty() {
        output.push_str(&generate_comparison_section(&report.comparison));
    }

    output.push_str(&generate_frequency_section(&report.frequency));
    output.push_str(&generate_pivot_section(
        "Observations per Group",
        &report.counts,
        |v| format!("{}", v as usize),
    ));
    output.push_str(&generate_pivot_section("Mean per Group", &report.means, format_value));

    output.push_str(&generate_footer());

    output
}

/// Render a value with at most three decimals, dropping trailing zeros.
fn format_value(value: f64) -> String {
    let text = format!("{:.3}", value);
    let text = text.trim_end_matches('0').trim_end_matches('.');
    if text == "-0" {
        "0".to_string()
    } else {
        text.to_string()
    }
}

/// Escape text for a Markdown table cell.
fn table_cell(text: &str) -> String {
    text.replace('|', "\\|")
}

fn anchor(text: &str) -> String {
    text.chars()
        .filter_map(|c| {
            if c.is_ascii_alphanumeric() {
                Some(c.to_ascii_lowercase())
            } else if c == ' ' || c == '-' || c == '_' {
                Some('-')
            } else {
                None
            }
        })
        .collect()
}

/// Generate the metadata section.
fn generate_metadata_section(metadata: &ReportMetadata) -> String {
    let mut section = String::new();

    section.push_str("## Metadata\n\n");
    section.push_str(&format!("- **Source:** `{}`\n", metadata.source));
    section.push_str(&format!(
        "- **Generated:** {}\n",
        metadata.generated_at.format("%Y-%m-%d %H:%M:%S UTC")
    ));
    section.push_str(&format!("- **Reference Date:** {}\n", metadata.reference_date));
    section.push_str(&format!(
        "- **Observations Loaded:** {}\n",
        metadata.rows_loaded
    ));
    if metadata.rows_skipped > 0 {
        section.push_str(&format!(
            "- **Malformed Rows Skipped:** {}\n",
            metadata.rows_skipped
        ));
    }
    section.push_str(&format!(
        "- **Observations Matched:** {}\n",
        metadata.rows_matched
    ));
    section.push_str(&format!(
        "- **Duration:** {:.2}s\n",
        metadata.duration_seconds
    ));
    section.push('\n');

    section
}

/// Generate the table of contents.
fn generate_table_of_contents(report: &Report) -> String {
    let mut toc = String::new();

    toc.push_str("## Table of Contents\n\n");
    toc.push_str("- [Metadata](#metadata)\n");
    toc.push_str("- [Filters](#filters)\n");
    toc.push_str("- [Metric Statistics](#metric-statistics)\n");

    for section in &report.metrics {
        toc.push_str(&format!(
            "  - [{}](#{})\n",
            section.metric,
            anchor(&section.metric)
        ));
    }

    if !report.comparison.is_empty() {
        toc.push_str("- [Entity vs Group](#entity-vs-group)\n");
    }
    toc.push_str("- [Metric Frequency](#metric-frequency)\n");
    if !report.counts.is_empty() {
        toc.push_str("- [Observations per Group](#observations-per-group)\n");
    }
    if !report.means.is_empty() {
        toc.push_str("- [Mean per Group](#mean-per-group)\n");
    }
    toc.push('\n');

    toc
}

/// Generate the active filter list.
fn generate_filters_section(filters: &[String]) -> String {
    let mut section = String::new();

    section.push_str("## Filters\n\n");
    if filters.is_empty() {
        section.push_str("None (all observations).\n\n");
        return section;
    }
    for filter in filters {
        section.push_str(&format!("- {}\n", filter));
    }
    section.push('\n');

    section
}

/// Generate the statistics table for one metric.
fn generate_metric_section(metric: &MetricSection) -> String {
    let mut section = String::new();

    section.push_str(&format!(
        "### {} {{#{}}}\n\n",
        metric.metric,
        anchor(&metric.metric)
    ));

    if metric.partitions.is_empty() {
        section.push_str("No data available\n\n");
        return section;
    }

    section.push_str("| Scope | Name | Mean | Std | Min | Max | Count |\n");
    section.push_str("|:---|:---|---:|---:|---:|---:|---:|\n");
    for (key, stats) in &metric.partitions {
        section.push_str(&format!(
            "| {} | {} | {} |\n",
            key.scope,
            table_cell(&key.id),
            format_stats(stats)
        ));
    }
    section.push('\n');

    if let Some(ref trend) = metric.trend {
        section.push_str(&format!("{}\n\n", format_trend(trend)));
    }

    section
}

fn format_stats(stats: &Stats) -> String {
    let std = stats
        .std
        .map(format_value)
        .unwrap_or_else(|| "n/a".to_string());
    format!(
        "{} | {} | {} | {} | {}",
        format_value(stats.mean),
        std,
        format_value(stats.min),
        format_value(stats.max),
        stats.count
    )
}

fn format_trend(trend: &Trend) -> String {
    let sign = if trend.slope_per_day >= 0.0 { "+" } else { "" };
    format!(
        "*Trend: {}{} per day over {} observations (start {})*",
        sign,
        format_value(trend.slope_per_day),
        trend.points,
        format_value(trend.intercept)
    )
}

/// Generate the entity-vs-group comparison table.
fn generate_comparison_section(rows: &[ComparisonRow]) -> String {
    let mut section = String::new();

    section.push_str("## Entity vs Group\n\n");
    section.push_str("| Entity | Metric | Entity Mean | Group Mean | Difference |\n");
    section.push_str("|:---|:---|---:|---:|---:|\n");

    for row in rows {
        section.push_str(&format!(
            "| {} | {} | {} | {} | {} |\n",
            table_cell(&entity_label(&row.entity_id, &row.group_id)),
            table_cell(&row.metric),
            format_value(row.entity_mean),
            format_value(row.group_mean),
            format_value(row.delta())
        ));
    }
    section.push('\n');

    section
}

/// Generate the metric frequency ranking.
fn generate_frequency_section(frequency: &[(String, usize)]) -> String {
    let mut section = String::new();

    section.push_str("## Metric Frequency\n\n");
    if frequency.is_empty() {
        section.push_str("No data available\n\n");
        return section;
    }

    section.push_str("| Metric | Observations |\n");
    section.push_str("|:---|:---:|\n");
    for (metric, count) in frequency {
        section.push_str(&format!("| {} | {} |\n", table_cell(metric), count));
    }
    section.push('\n');

    section
}

/// Generate a group x metric table; empty tables render nothing.
fn generate_pivot_section(
    title: &str,
    pivot: &PivotTable,
    cell: impl Fn(f64) -> String,
) -> String {
    if pivot.is_empty() {
        return String::new();
    }

    let mut section = String::new();

    section.push_str(&format!("## {}\n\n", title));
    let columns: Vec<String> = pivot.columns.iter().map(|c| table_cell(c)).collect();
    section.push_str(&format!("| Group | {} |\n", columns.join(" | ")));
    section.push_str(&format!(
        "|:---|{}\n",
        "---:|".repeat(pivot.columns.len())
    ));

    for (group, cells) in pivot.rows.iter().zip(&pivot.cells) {
        let rendered: Vec<String> = cells
            .iter()
            .map(|c| c.map(&cell).unwrap_or_default())
            .collect();
        section.push_str(&format!(
            "| {} | {} |\n",
            table_cell(group),
            rendered.join(" | ")
        ));
    }
    section.push('\n');

    section
}

/// Generate the report footer.
fn generate_footer() -> String {
    let mut footer = String::new();

    footer.push_str("---\n\n");
    footer.push_str("*Report generated by perfboard*\n");

    footer
}

/// Generate a JSON report.
pub fn generate_json_report(report: &Report) -> Result<String> {
    serde_json::to_string_pretty(report).map_err(Into::into)
}
