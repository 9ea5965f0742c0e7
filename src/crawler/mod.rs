//! Crawler module for page fetching and processing
//!
//! This module contains the core crawling logic, including:
//! - HTTP fetching with a raw-HTML cache and politeness pauses
//! - Sitemap seeding
//! - Link and attachment classification
//! - Attachment download policy and storage
//! - The durable frontier and the crawl loop

mod attachments;
mod coordinator;
mod fetcher;
mod parser;
mod scheduler;
mod shutdown;
mod sitemap;

pub use attachments::{AttachmentRules, FileStore, SavedFile};
pub use coordinator::{CrawlOptions, Coordinator};
pub use fetcher::{
    build_http_client, filename_from_disposition, sanitize_file_name, BinaryFile, FetchResult,
    Fetcher, FALLBACK_FILE_NAME,
};
pub use parser::{attachment_extension, AttachmentCandidate, ClassifiedLinks, LinkClassifier};
pub use scheduler::{Scheduler, StopReason};
pub use shutdown::ShutdownSignal;
pub use sitemap::{
    collect_sitemap_entries, parse_sitemap, sort_newest_first, SitemapDocument, SitemapEntry,
};

use crate::config::Config;
use crate::output::RunSummary;
use crate::Result;

/// Runs a complete crawl
///
/// This is the main entry point for starting a crawl. It will:
/// 1. Open the data directory and the log storage
/// 2. Fetch robots.txt and the sitemap
/// 3. Resume the saved frontier or seed a new one
/// 4. Process URLs until the frontier, a budget or `shutdown` stops it
/// 5. Write `run_meta.json` and `report.md`
///
/// # Example
///
/// ```no_run
/// use snapcrawl::config::load_config;
/// use snapcrawl::crawler::{crawl, CrawlOptions, ShutdownSignal};
/// use std::path::Path;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let config = load_config(Path::new("crawl.toml"))?;
/// let summary = crawl(config, CrawlOptions::default(), ShutdownSignal::new()).await?;
/// println!("stopped by {}", summary.stop_reason);
/// # Ok(())
/// # }
/// ```
pub async fn crawl(
    config: Config,
    options: CrawlOptions,
    shutdown: ShutdownSignal,
) -> Result<RunSummary> {
    let mut coordinator = Coordinator::new(config, options, shutdown).await?;
    coordinator.run().await
}
