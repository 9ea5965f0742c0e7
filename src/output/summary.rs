//! Run summary: `run_meta.json` and the markdown report
//!
//! Both files are rewritten at the end of every run, whatever the stop
//! reason.

use crate::crawler::StopReason;
use crate::output::stats::CrawlStatistics;
use crate::state::{OutcomeTally, UrlOutcome};
use crate::Result;
use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;
use std::fs::File;
use std::io::Write;
use std::path::Path;

/// What one run did
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub started_at: DateTime<Utc>,
    pub ended_at: DateTime<Utc>,
    pub elapsed_seconds: f64,
    pub stop_reason: StopReason,

    /// SHA-256 of the configuration file, when known
    pub config_hash: Option<String>,

    /// True when the run continued a saved frontier
    pub resumed: bool,

    /// Inflight URL recovered from an interrupted run
    pub recovered_inflight: Option<String>,

    pub seeded: usize,
    pub pages_fetched: u64,
    pub requests_this_run: u64,
    pub requests_total: u64,
    pub queue_remaining: usize,
    pub deferred: usize,
    pub attachments_detected: u64,
    pub attachments_downloaded: u64,
    pub outcomes: OutcomeTally,
}

/// Writes `run_meta.json`
pub fn write_run_meta(summary: &RunSummary, path: &Path) -> Result<()> {
    let json = serde_json::to_vec_pretty(summary)?;
    let mut file = File::create(path)?;
    file.write_all(&json)?;
    Ok(())
}

/// Writes the markdown report
pub fn write_report(summary: &RunSummary, stats: &CrawlStatistics, path: &Path) -> Result<()> {
    let markdown = format_report(summary, stats);
    let mut file = File::create(path)?;
    file.write_all(markdown.as_bytes())?;
    Ok(())
}

fn timestamp(at: &DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// Formats a run summary and the data directory totals as markdown
pub fn format_report(summary: &RunSummary, stats: &CrawlStatistics) -> String {
    let mut md = String::new();

    md.push_str("# Snapcrawl Run Report\n\n");

    // Run metadata
    md.push_str("## Run Information\n\n");
    md.push_str(&format!("- **Started**: {}\n", timestamp(&summary.started_at)));
    md.push_str(&format!("- **Finished**: {}\n", timestamp(&summary.ended_at)));
    md.push_str(&format!(
        "- **Duration**: {:.1} seconds ({:.2} minutes)\n",
        summary.elapsed_seconds,
        summary.elapsed_seconds / 60.0
    ));
    md.push_str(&format!("- **Stopped by**: {}\n", summary.stop_reason));
    if let Some(hash) = &summary.config_hash {
        md.push_str(&format!("- **Config Hash**: {}\n", hash));
    }
    if summary.resumed {
        md.push_str("- **Resumed**: yes\n");
    } else {
        md.push_str(&format!("- **Seeded URLs**: {}\n", summary.seeded));
    }
    if let Some(url) = &summary.recovered_inflight {
        md.push_str(&format!("- **Recovered inflight URL**: {}\n", url));
    }
    md.push('\n');

    // This run
    md.push_str("## This Run\n\n");
    md.push_str(&format!("- **Pages Fetched**: {}\n", summary.pages_fetched));
    md.push_str(&format!(
        "- **Requests**: {} (lifetime {})\n",
        summary.requests_this_run, summary.requests_total
    ));
    md.push_str(&format!(
        "- **Attachments**: {} detected, {} downloaded\n",
        summary.attachments_detected, summary.attachments_downloaded
    ));
    md.push_str(&format!("- **Queue Remaining**: {}\n", summary.queue_remaining));
    if summary.deferred > 0 {
        md.push_str(&format!("- **Deferred to Next Run**: {}\n", summary.deferred));
    }
    md.push('\n');

    md.push_str("| Outcome | Count |\n");
    md.push_str("|---------|-------|\n");
    for outcome in UrlOutcome::all() {
        md.push_str(&format!(
            "| {} | {} |\n",
            outcome,
            summary.outcomes.get(outcome)
        ));
    }
    md.push('\n');

    // Totals
    md.push_str("## Data Directory Totals\n\n");
    md.push_str(&format!("- **Pages Logged**: {}\n", stats.pages_logged));
    md.push_str(&format!("- **Snapshot Files**: {}\n", stats.snapshots));
    md.push_str(&format!(
        "- **Attachments Logged**: {} ({} downloaded)\n\n",
        stats.attachments_logged, stats.attachments_downloaded
    ));

    if !stats.pages_by_section.is_empty() {
        md.push_str("## Pages by Section\n\n");
        md.push_str("| Section | Pages |\n");
        md.push_str("|---------|-------|\n");
        for (section, count) in &stats.pages_by_section {
            let name = if section.is_empty() { "(root)" } else { section.as_str() };
            md.push_str(&format!("| {} | {} |\n", name, count));
        }
        md.push('\n');
    }

    md
}
