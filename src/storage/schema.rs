//! Database schema definitions
//!
//! This module contains the SQL schema of `crawl.db`.

/// SQL schema for the database
pub const SCHEMA_SQL: &str = r#"
-- One row per fetched page, never updated
CREATE TABLE IF NOT EXISTS pages (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    url TEXT NOT NULL,
    snapshot_path TEXT NOT NULL,
    title TEXT NOT NULL,
    lastmod TEXT,
    fetched_at TEXT NOT NULL,
    section TEXT NOT NULL,
    out_links INTEGER NOT NULL,
    text_length INTEGER NOT NULL,
    extra TEXT NOT NULL DEFAULT '{}'
);

CREATE INDEX IF NOT EXISTS idx_pages_url ON pages(url);
CREATE INDEX IF NOT EXISTS idx_pages_section ON pages(section);

-- One row per download-intent link, never updated
CREATE TABLE IF NOT EXISTS attachments (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    page_url TEXT NOT NULL,
    page_snapshot TEXT NOT NULL,
    link_text TEXT NOT NULL,
    url TEXT NOT NULL,
    detected_at TEXT NOT NULL,
    policy TEXT NOT NULL,
    ext TEXT,
    saved_path TEXT,
    size_bytes INTEGER,
    sha256 TEXT,
    content_type TEXT
);

CREATE INDEX IF NOT EXISTS idx_attachments_page ON attachments(page_url);
CREATE INDEX IF NOT EXISTS idx_attachments_url ON attachments(url);
"#;

/// Initializes the database schema
///
/// # Arguments
///
/// * `conn` - The database connection
///
/// # Returns
///
/// * `Ok(())` - Schema initialized successfully
/// * `Err(rusqlite::Error)` - Failed to initialize schema
pub fn initialize_schema(conn: &rusqlite::Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(SCHEMA_SQL)?;
    conn.pragma_update(None, "user_version", SCHEMA_VERSION)?;
    Ok(())
}

/// Schema version stored in `PRAGMA user_version`
pub const SCHEMA_VERSION: u32 = 1;
