//! Text rendering for alert mails and cluster summaries

use crate::error::Result;
use crate::output::report::{ClusterSummary, PostingRow};
use crate::processing::posting::Posting;
use colored::Colorize;
use std::fmt::Write;

pub const DEFAULT_SUBJECT: &str = "New Job Matches Your Preferences";

/// Output formats for cluster summaries.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum OutputFormat {
    Console,
    Json,
}

/// Trait for rendering cluster summaries
pub trait OutputFormatter {
    fn format_summary(&self, summary: &ClusterSummary) -> Result<String>;
}

/// Colored console rendering, one table per cluster
pub struct ConsoleFormatter {
    use_colors: bool,
}

/// JSON rendering for scripting
pub struct JsonFormatter {
    pretty: bool,
}

impl ConsoleFormatter {
    pub fn new(use_colors: bool) -> Self {
        Self { use_colors }
    }

    fn heading(&self, text: &str) -> String {
        if self.use_colors {
            text.bold().cyan().to_string()
        } else {
            text.to_string()
        }
    }
}

impl OutputFormatter for ConsoleFormatter {
    fn format_summary(&self, summary: &ClusterSummary) -> Result<String> {
        let mut out = String::new();
        let _ = writeln!(
            out,
            "{}",
            self.heading(&format!(
                "{} postings in {} clusters",
                summary.total_postings,
                summary.clusters.len()
            ))
        );

        for cluster in &summary.clusters {
            let _ = writeln!(out);
            let _ = writeln!(
                out,
                "{}",
                self.heading(&format!("Cluster {} ({} postings)", cluster.label, cluster.size))
            );
            if !cluster.top_skills.is_empty() {
                let _ = writeln!(out, "Top skills: {}", cluster.top_skills.join(", "));
            }
            out.push_str(&format_table(&cluster.sample));
        }

        Ok(out)
    }
}

impl JsonFormatter {
    pub fn new(pretty: bool) -> Self {
        Self { pretty }
    }
}

impl OutputFormatter for JsonFormatter {
    fn format_summary(&self, summary: &ClusterSummary) -> Result<String> {
        let json = if self.pretty {
            serde_json::to_string_pretty(summary)?
        } else {
            serde_json::to_string(summary)?
        };
        Ok(json)
    }
}

/// Parse and validate an output format name
pub fn parse_output_format(format: &str) -> std::result::Result<OutputFormat, String> {
    match format.to_lowercase().as_str() {
        "console" => Ok(OutputFormat::Console),
        "json" => Ok(OutputFormat::Json),
        _ => Err(format!("Invalid output format: {}. Supported: console, json", format)),
    }
}

/// Body of an alert mail listing the matched postings.
pub fn format_alert_body(postings: &[&Posting]) -> String {
    let rows: Vec<PostingRow> = postings.iter().map(|p| PostingRow::from(*p)).collect();
    format!(
        "Hello,\n\nNew jobs matching your preferences:\n\n{}\nBest regards,\nJob Alert System\n",
        format_table(&rows)
    )
}

/// Left-aligned Title/Company/Location table, one line per row.
pub fn format_table(rows: &[PostingRow]) -> String {
    let headers = ["Title", "Company", "Location"];
    let mut widths = headers.map(|h| h.chars().count());
    for row in rows {
        for (width, cell) in widths.iter_mut().zip([&row.title, &row.company, &row.location]) {
            *width = (*width).max(cell.chars().count());
        }
    }

    let mut out = String::new();
    let mut push_line = |cells: [&str; 3]| {
        let line = cells
            .iter()
            .zip(widths.iter())
            .map(|(cell, width)| pad(cell, *width))
            .collect::<Vec<_>>()
            .join("  ");
        out.push_str(line.trim_end());
        out.push('\n');
    };

    push_line(headers);
    for row in rows {
        push_line([row.title.as_str(), row.company.as_str(), row.location.as_str()]);
    }
    out
}

fn pad(cell: &str, width: usize) -> String {
    let fill = width.saturating_sub(cell.chars().count());
    format!("{}{}", cell, " ".repeat(fill))
}
