//! Configuration module for snapcrawl
//!
//! This module handles loading, parsing, and validating TOML configuration files.
//!
//! # Example
//!
//! ```no_run
//! use snapcrawl::config::load_config;
//! use std::path::Path;
//!
//! let config = load_config(Path::new("crawl.toml")).unwrap();
//! println!("Crawling {} (max {} pages)", config.site.domain, config.crawler.max_pages);
//! ```

mod parser;
mod types;
mod validation;

// Re-export types
pub use types::{
    AttachmentConfig, AttachmentPolicy, Config, CrawlerConfig, LoginConfig, OutputConfig,
    PiiConfig, SiteConfig, SnapshotConfig, StorageBackend, UserAgentConfig, MAX_REQUEST_SLEEP_SECS,
};

// Re-export parser functions
pub use parser::{compute_config_hash, load_config, load_config_with_hash, parse_config};
