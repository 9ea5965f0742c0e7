//! Output module for run summaries and statistics
//!
//! This module handles:
//! - `run_meta.json` and the markdown report written after every run
//! - Totals gathered from the logs, snapshots and state file

pub mod stats;
mod summary;

pub use stats::{collect_statistics, load_statistics, print_statistics, CrawlStatistics};
pub use summary::{format_report, write_report, write_run_meta, RunSummary};
