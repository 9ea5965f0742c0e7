//! SQLite storage implementation
//!
//! This module provides a SQLite-based implementation of the Storage trait.

use crate::storage::schema::initialize_schema;
use crate::storage::traits::{Storage, StorageResult};
use crate::storage::{AttachmentRecord, PageRecord};
use rusqlite::{params, Connection};
use std::path::Path;

/// SQLite storage backend
pub struct SqliteStorage {
    conn: Connection,
}

impl SqliteStorage {
    /// Creates a new SqliteStorage instance
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the SQLite database file
    ///
    /// # Returns
    ///
    /// * `Ok(SqliteStorage)` - Successfully opened/created database
    /// * `Err(StorageError)` - Failed to open database
    pub fn new(path: &Path) -> StorageResult<Self> {
        let conn = Connection::open(path)?;

        // Rows must survive a crash right after the call returns
        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = FULL;
            PRAGMA temp_store = MEMORY;
        ",
        )?;

        initialize_schema(&conn)?;

        Ok(Self { conn })
    }

    /// Creates an in-memory database (for testing)
    #[cfg(test)]
    pub fn new_in_memory() -> StorageResult<Self> {
        let conn = Connection::open_in_memory()?;
        initialize_schema(&conn)?;
        Ok(Self { conn })
    }

    fn count(&self, sql: &str) -> StorageResult<u64> {
        let count: i64 = self.conn.query_row(sql, [], |row| row.get(0))?;
        Ok(count as u64)
    }
}

impl Storage for SqliteStorage {
    fn name(&self) -> &'static str {
        "sqlite"
    }

    fn save_page(&mut self, page: &PageRecord) -> StorageResult<()> {
        let extra = page.extra_json()?;
        self.conn.execute(
            "INSERT INTO pages (url, snapshot_path, title, lastmod, fetched_at, section,
             out_links, text_length, extra)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                page.url,
                page.snapshot_path,
                page.title,
                page.lastmod,
                page.fetched_at,
                page.section,
                page.out_links as i64,
                page.text_length as i64,
                extra,
            ],
        )?;
        Ok(())
    }

    fn save_attachments(&mut self, attachments: &[AttachmentRecord]) -> StorageResult<()> {
        let tx = self.conn.transaction()?;
        {
            let mut stmt = tx.prepare(
                "INSERT INTO attachments (page_url, page_snapshot, link_text, url, detected_at,
                 policy, ext, saved_path, size_bytes, sha256, content_type)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
            )?;
            for a in attachments {
                let download = a.download.as_ref();
                stmt.execute(params![
                    a.page_url,
                    a.page_snapshot,
                    a.link_text,
                    a.url,
                    a.detected_at,
                    a.policy,
                    a.ext,
                    download.map(|d| d.saved_path.as_str()),
                    download.map(|d| d.size_bytes as i64),
                    download.map(|d| d.sha256.as_str()),
                    download.map(|d| d.content_type.as_str()),
                ])?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    fn count_pages(&self) -> StorageResult<u64> {
        self.count("SELECT COUNT(*) FROM pages")
    }

    fn count_attachments(&self) -> StorageResult<u64> {
        self.count("SELECT COUNT(*) FROM attachments")
    }

    fn count_downloaded_attachments(&self) -> StorageResult<u64> {
        self.count("SELECT COUNT(*) FROM attachments WHERE saved_path IS NOT NULL")
    }

    fn count_pages_by_section(&self) -> StorageResult<Vec<(String, u64)>> {
        let mut stmt = self
            .conn
            .prepare("SELECT section, COUNT(*) FROM pages GROUP BY section ORDER BY section")?;
        let rows = stmt.query_map([], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)? as u64))
        })?;

        let mut counts = Vec::new();
        for row in rows {
            counts.push(row?);
        }
        Ok(counts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::DownloadInfo;

    fn page(url: &str, section: &str) -> PageRecord {
        let mut page = PageRecord {
            url: url.to_string(),
            snapshot_path: "snapshots/x.html".to_string(),
            title: "T".to_string(),
            fetched_at: "2024-01-02T00:00:00Z".to_string(),
            section: section.to_string(),
            ..PageRecord::default()
        };
        page.extra.insert("title_area".to_string(), "Board".to_string());
        page
    }

    #[test]
    fn test_pages() {
        let mut storage = SqliteStorage::new_in_memory().unwrap();
        storage.save_page(&page("https://example.org/a", "news")).unwrap();
        storage.save_page(&page("https://example.org/b", "")).unwrap();
        assert_eq!(storage.count_pages().unwrap(), 2);
        assert_eq!(
            storage.count_pages_by_section().unwrap(),
            vec![(String::new(), 1), ("news".to_string(), 1)]
        );

        let extra: String = storage
            .conn
            .query_row("SELECT extra FROM pages LIMIT 1", [], |row| row.get(0))
            .unwrap();
        assert_eq!(extra, r#"{"title_area":"Board"}"#);
    }

    #[test]
    fn test_attachments() {
        let mut storage = SqliteStorage::new_in_memory().unwrap();
        let metadata_only = AttachmentRecord {
            page_url: "https://example.org/a".to_string(),
            url: "https://example.org/f.pdf".to_string(),
            policy: "blocklist".to_string(),
            ext: Some("pdf".to_string()),
            ..AttachmentRecord::default()
        };
        let downloaded = AttachmentRecord {
            download: Some(DownloadInfo {
                saved_path: "files/x_f.pdf".to_string(),
                size_bytes: 4,
                sha256: "ab".to_string(),
                content_type: "application/pdf".to_string(),
            }),
            ..metadata_only.clone()
        };
        storage.save_attachments(&[metadata_only, downloaded]).unwrap();
        storage.save_attachments(&[]).unwrap();
        assert_eq!(storage.count_attachments().unwrap(), 2);
        assert_eq!(storage.count_downloaded_attachments().unwrap(), 1);
    }
}
