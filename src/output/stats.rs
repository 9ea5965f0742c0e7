//! Statistics gathered from the logs, the snapshot store and the state file
//!
//! Used for `--stats` and for the totals section of the run report.

use crate::config::Config;
use crate::snapshot::SnapshotStore;
use crate::state::StateStore;
use crate::storage::{open_storage, DataLayout, Storage};
use crate::Result;
use chrono::{DateTime, SecondsFormat, Utc};

/// Totals across every run that wrote to a data directory
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CrawlStatistics {
    /// Rows in the page log
    pub pages_logged: u64,

    /// Page rows per section, sorted by section
    pub pages_by_section: Vec<(String, u64)>,

    /// Rows in the attachment log
    pub attachments_logged: u64,

    /// Attachment rows with a downloaded binary
    pub attachments_downloaded: u64,

    /// Snapshot files on disk
    pub snapshots: usize,

    /// URLs waiting in the persisted frontier
    pub queue_remaining: usize,

    /// URL left inflight by an interrupted run
    pub inflight: Option<String>,

    /// Requests issued over the crawl's lifetime
    pub requests_used: u64,

    /// URLs ever enqueued
    pub enqueued_total: usize,

    pub last_saved_at: Option<DateTime<Utc>>,
}

/// Loads statistics for a configured data directory
///
/// A data directory that does not exist yet yields empty statistics and is
/// not created. In an existing one, opening the storage backend creates its
/// empty log files when they are missing.
pub fn load_statistics(config: &Config) -> Result<CrawlStatistics> {
    let layout = DataLayout::new(&config.output.data_dir);
    if !layout.root.is_dir() {
        return Ok(CrawlStatistics::default());
    }

    let storage = open_storage(config.output.storage, &layout)?;
    collect_statistics(storage.as_ref(), &layout)
}

/// Gathers statistics from an open storage backend and the data directory
pub fn collect_statistics(storage: &dyn Storage, layout: &DataLayout) -> Result<CrawlStatistics> {
    let mut stats = CrawlStatistics {
        pages_logged: storage.count_pages()?,
        pages_by_section: storage.count_pages_by_section()?,
        attachments_logged: storage.count_attachments()?,
        attachments_downloaded: storage.count_downloaded_attachments()?,
        ..CrawlStatistics::default()
    };

    if layout.snapshots_dir.is_dir() {
        stats.snapshots = SnapshotStore::open(&layout.snapshots_dir)?.count()?;
    }

    if layout.state_dir.is_dir() {
        if let Some((state, last_saved_at)) = StateStore::open(&layout.state_dir)?.load()? {
            stats.queue_remaining = state.queue.len();
            stats.inflight = state.inflight;
            stats.requests_used = state.requests_used;
            stats.enqueued_total = state.enqueued_keys.len();
            stats.last_saved_at = last_saved_at;
        }
    }

    Ok(stats)
}

/// Prints statistics to stdout in a formatted manner
pub fn print_statistics(stats: &CrawlStatistics) {
    println!("=== Crawl Statistics ===\n");

    println!("Logs:");
    println!("  Pages logged: {}", stats.pages_logged);
    println!("  Snapshot files: {}", stats.snapshots);
    println!(
        "  Attachments: {} detected, {} downloaded",
        stats.attachments_logged, stats.attachments_downloaded
    );
    println!();

    println!("Frontier:");
    println!("  Queued: {}", stats.queue_remaining);
    println!(
        "  Inflight: {}",
        stats.inflight.as_deref().unwrap_or("none")
    );
    println!("  Ever enqueued: {}", stats.enqueued_total);
    println!("  Requests used: {}", stats.requests_used);
    if let Some(saved) = stats.last_saved_at {
        println!(
            "  Last saved: {}",
            saved.to_rfc3339_opts(SecondsFormat::Secs, true)
        );
    }
    println!();

    if !stats.pages_by_section.is_empty() {
        println!("Pages by Section:");
        let mut sections: Vec<_> = stats.pages_by_section.iter().collect();
        sections.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));

        for (section, count) in sections {
            let percentage = if stats.pages_logged > 0 {
                (*count as f64 / stats.pages_logged as f64) * 100.0
            } else {
                0.0
            };
            let name = if section.is_empty() { "(root)" } else { section.as_str() };
            println!("  {}: {} ({:.1}%)", name, count, percentage);
        }
    }
}
