//! Storage module for the page and attachment logs
//!
//! Both logs are append-only: one row per fetched page and one row per
//! detected download-intent link. Two backends exist:
//! - `filesystem`: `pages.csv` and `attachments.csv`
//! - `sqlite`: `crawl.db`

mod csv_log;
mod layout;
mod schema;
mod sqlite;
mod traits;

pub use csv_log::CsvStorage;
pub use layout::DataLayout;
pub use sqlite::SqliteStorage;
pub use traits::{Storage, StorageError, StorageResult};

use crate::config::StorageBackend;
use std::collections::BTreeMap;

/// Opens the configured storage backend inside the data directory
///
/// # Arguments
///
/// * `backend` - Which backend to use
/// * `layout` - The data directory layout
///
/// # Returns
///
/// * `Ok(Box<dyn Storage>)` - Opened storage, created if missing
/// * `Err(StorageError)` - Failed to open or initialize
pub fn open_storage(backend: StorageBackend, layout: &DataLayout) -> StorageResult<Box<dyn Storage>> {
    match backend {
        StorageBackend::Filesystem => Ok(Box::new(CsvStorage::open(
            &layout.pages_csv,
            &layout.attachments_csv,
        )?)),
        StorageBackend::Sqlite => Ok(Box::new(SqliteStorage::new(&layout.database)?)),
    }
}

/// One fetched page
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PageRecord {
    pub url: String,
    pub snapshot_path: String,
    pub title: String,
    /// Last-modified hint from the sitemap
    pub lastmod: Option<String>,
    /// RFC 3339
    pub fetched_at: String,
    pub section: String,
    pub out_links: u64,
    pub text_length: u64,
    /// Forward-compatible fields, e.g. `title_area`
    pub extra: BTreeMap<String, String>,
}

/// One detected download-intent link
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AttachmentRecord {
    pub page_url: String,
    pub page_snapshot: String,
    pub link_text: String,
    pub url: String,
    /// RFC 3339
    pub detected_at: String,
    /// Attachment policy in force when the link was seen
    pub policy: String,
    /// Lowercase file extension guessed from the URL or link text
    pub ext: Option<String>,
    pub download: Option<DownloadInfo>,
}

/// Details of a downloaded attachment binary
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DownloadInfo {
    pub saved_path: String,
    pub size_bytes: u64,
    /// SHA-256 of the content, hex
    pub sha256: String,
    pub content_type: String,
}

impl PageRecord {
    pub(crate) const COLUMNS: [&'static str; 9] = [
        "url",
        "snapshot_path",
        "title",
        "lastmod",
        "fetched_at",
        "section",
        "out_links",
        "text_length",
        "extra",
    ];

    /// Encodes `extra` as a JSON object for tabular storage
    pub(crate) fn extra_json(&self) -> StorageResult<String> {
        serde_json::to_string(&self.extra).map_err(|e| StorageError::Serialization(e.to_string()))
    }
}

impl AttachmentRecord {
    pub(crate) const COLUMNS: [&'static str; 11] = [
        "page_url",
        "page_snapshot",
        "link_text",
        "url",
        "detected_at",
        "policy",
        "ext",
        "saved_path",
        "size_bytes",
        "sha256",
        "content_type",
    ];

    pub fn is_downloaded(&self) -> bool {
        self.download.is_some()
    }
}
