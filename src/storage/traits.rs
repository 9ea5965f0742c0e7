//! Storage traits and error types
//!
//! This module defines the trait interface for log backends and the
//! associated error types.

use crate::storage::{AttachmentRecord, PageRecord};
use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Trait for log backend implementations
///
/// Rows have left the process's buffers once a call returns, so they survive
/// a crash of the crawler; they are not fsynced. The crawler writes them
/// before the snapshot that marks the URL done.
pub trait Storage: Send {
    /// Short backend name for logs
    fn name(&self) -> &'static str;

    // ===== Logs =====

    /// Appends one page row
    fn save_page(&mut self, page: &PageRecord) -> StorageResult<()>;

    /// Appends attachment rows for one page
    fn save_attachments(&mut self, attachments: &[AttachmentRecord]) -> StorageResult<()>;

    // ===== Statistics =====

    /// Gets total page rows
    fn count_pages(&self) -> StorageResult<u64>;

    /// Gets total attachment rows
    fn count_attachments(&self) -> StorageResult<u64>;

    /// Gets attachment rows whose binary was downloaded
    fn count_downloaded_attachments(&self) -> StorageResult<u64>;

    /// Gets page counts per section, sorted by section
    fn count_pages_by_section(&self) -> StorageResult<Vec<(String, u64)>>;
}
