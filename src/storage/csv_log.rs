//! Filesystem storage: append-only CSV logs

use crate::storage::traits::{Storage, StorageResult};
use crate::storage::{AttachmentRecord, PageRecord};
use std::collections::BTreeMap;
use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};

/// `pages.csv` + `attachments.csv`
pub struct CsvStorage {
    pages_path: PathBuf,
    attachments_path: PathBuf,
    pages: csv::Writer<File>,
    attachments: csv::Writer<File>,
}

/// Opens a log for appending, writing the header row to new files
fn open_log(path: &Path, header: &[&str]) -> StorageResult<csv::Writer<File>> {
    let is_new = path.metadata().map(|m| m.len() == 0).unwrap_or(true);
    let file = OpenOptions::new().create(true).append(true).open(path)?;
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(file);
    if is_new {
        writer.write_record(header)?;
        writer.flush()?;
    }
    Ok(writer)
}

/// Reads every data row of a log; a missing file has no rows
fn read_rows(path: &Path) -> StorageResult<Vec<csv::StringRecord>> {
    if !path.exists() {
        return Ok(Vec::new());
    }
    let mut reader = csv::Reader::from_path(path)?;
    let mut rows = Vec::new();
    for row in reader.records() {
        rows.push(row?);
    }
    Ok(rows)
}

impl CsvStorage {
    pub fn open(pages_path: &Path, attachments_path: &Path) -> StorageResult<Self> {
        Ok(Self {
            pages_path: pages_path.to_path_buf(),
            attachments_path: attachments_path.to_path_buf(),
            pages: open_log(pages_path, &PageRecord::COLUMNS)?,
            attachments: open_log(attachments_path, &AttachmentRecord::COLUMNS)?,
        })
    }
}

impl Storage for CsvStorage {
    fn name(&self) -> &'static str {
        "filesystem"
    }

    fn save_page(&mut self, page: &PageRecord) -> StorageResult<()> {
        let out_links = page.out_links.to_string();
        let text_length = page.text_length.to_string();
        let extra = page.extra_json()?;
        self.pages.write_record([
            page.url.as_str(),
            page.snapshot_path.as_str(),
            page.title.as_str(),
            page.lastmod.as_deref().unwrap_or(""),
            page.fetched_at.as_str(),
            page.section.as_str(),
            out_links.as_str(),
            text_length.as_str(),
            extra.as_str(),
        ])?;
        self.pages.flush()?;
        Ok(())
    }

    fn save_attachments(&mut self, attachments: &[AttachmentRecord]) -> StorageResult<()> {
        for a in attachments {
            let download = a.download.as_ref();
            let size = download.map(|d| d.size_bytes.to_string()).unwrap_or_default();
            self.attachments.write_record([
                a.page_url.as_str(),
                a.page_snapshot.as_str(),
                a.link_text.as_str(),
                a.url.as_str(),
                a.detected_at.as_str(),
                a.policy.as_str(),
                a.ext.as_deref().unwrap_or(""),
                download.map_or("", |d| d.saved_path.as_str()),
                size.as_str(),
                download.map_or("", |d| d.sha256.as_str()),
                download.map_or("", |d| d.content_type.as_str()),
            ])?;
        }
        self.attachments.flush()?;
        Ok(())
    }

    fn count_pages(&self) -> StorageResult<u64> {
        Ok(read_rows(&self.pages_path)?.len() as u64)
    }

    fn count_attachments(&self) -> StorageResult<u64> {
        Ok(read_rows(&self.attachments_path)?.len() as u64)
    }

    fn count_downloaded_attachments(&self) -> StorageResult<u64> {
        let saved_path = AttachmentRecord::COLUMNS
            .iter()
            .position(|c| *c == "saved_path")
            .unwrap_or(7);
        Ok(read_rows(&self.attachments_path)?
            .iter()
            .filter(|row| row.get(saved_path).map_or(false, |v| !v.is_empty()))
            .count() as u64)
    }

    fn count_pages_by_section(&self) -> StorageResult<Vec<(String, u64)>> {
        let section = PageRecord::COLUMNS
            .iter()
            .position(|c| *c == "section")
            .unwrap_or(5);
        let mut counts: BTreeMap<String, u64> = BTreeMap::new();
        for row in read_rows(&self.pages_path)? {
            let key = row.get(section).unwrap_or("").to_string();
            *counts.entry(key).or_insert(0) += 1;
        }
        Ok(counts.into_iter().collect())
    }
}
