use crate::url::snapshot_file_name;
use chrono::{DateTime, SecondsFormat, Utc};
use html_escape::{encode_double_quoted_attribute, encode_text};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use url::Url;

/// Visible marker preceding the fetch timestamp in every snapshot
pub const FETCHED_AT_MARKER: &str = "Fetched at:";

/// Wraps an extracted fragment into a minimal self-contained document
pub fn build_minimal_snapshot_html(
    base_url: &str,
    title: &str,
    content_html: &str,
    fetched_at: &DateTime<Utc>,
) -> String {
    let base = encode_double_quoted_attribute(base_url);
    let link_text = encode_text(base_url);
    format!(
        r#"<!doctype html>
<html>
<head>
  <meta charset="utf-8"/>
  <meta name="viewport" content="width=device-width,initial-scale=1"/>
  <base href="{base}"/>
  <title>{title}</title>
</head>
<body>
  <div class="meta">{marker} {fetched_at}</div>
  {content_html}
  <hr/>
  <div class="meta">Snapshot of <a href="{base}">{link_text}</a></div>
</body>
</html>
"#,
        base = base,
        title = encode_text(title),
        marker = FETCHED_AT_MARKER,
        fetched_at = fetched_at.to_rfc3339_opts(SecondsFormat::Secs, true),
        content_html = content_html,
        link_text = link_text,
    )
}

/// Snapshot files on disk; existence of a file marks its URL as done
#[derive(Debug, Clone)]
pub struct SnapshotStore {
    dir: PathBuf,
}

impl SnapshotStore {
    /// Opens the store, creating the directory if needed
    pub fn open(dir: impl Into<PathBuf>) -> io::Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Deterministic snapshot path for a normalized URL
    pub fn path_for(&self, url: &Url) -> PathBuf {
        self.dir.join(snapshot_file_name(url))
    }

    /// Idempotency check
    pub fn exists(&self, url: &Url) -> bool {
        self.path_for(url).is_file()
    }

    /// Writes the snapshot, overwriting previous content
    pub fn write(&self, url: &Url, document: &str) -> io::Result<PathBuf> {
        let path = self.path_for(url);
        fs::write(&path, document)?;
        Ok(path)
    }

    /// Deletes a snapshot; returns false when there was none
    pub fn remove(&self, url: &Url) -> io::Result<bool> {
        match fs::remove_file(self.path_for(url)) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// Number of snapshot files present
    pub fn count(&self) -> io::Result<usize> {
        let mut count = 0;
        for entry in fs::read_dir(&self.dir)? {
            let entry = entry?;
            if entry.path().extension().map_or(false, |ext| ext == "html") {
                count += 1;
            }
        }
        Ok(count)
    }
}
