use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Paths inside the data directory
///
/// ```text
/// data/
/// ├── state/crawl_state.json
/// ├── snapshots/      one minimal HTML document per page
/// ├── cache/          raw HTML as fetched
/// ├── files/          downloaded attachments
/// ├── pages.csv, attachments.csv   (filesystem backend)
/// ├── crawl.db                     (sqlite backend)
/// ├── run_meta.json
/// └── report.md
/// ```
#[derive(Debug, Clone)]
pub struct DataLayout {
    pub root: PathBuf,
    pub state_dir: PathBuf,
    pub snapshots_dir: PathBuf,
    pub cache_dir: PathBuf,
    pub files_dir: PathBuf,
    pub pages_csv: PathBuf,
    pub attachments_csv: PathBuf,
    pub database: PathBuf,
    pub run_meta: PathBuf,
    pub report: PathBuf,
}

impl DataLayout {
    pub fn new(root: &Path) -> Self {
        Self {
            root: root.to_path_buf(),
            state_dir: root.join("state"),
            snapshots_dir: root.join("snapshots"),
            cache_dir: root.join("cache"),
            files_dir: root.join("files"),
            pages_csv: root.join("pages.csv"),
            attachments_csv: root.join("attachments.csv"),
            database: root.join("crawl.db"),
            run_meta: root.join("run_meta.json"),
            report: root.join("report.md"),
        }
    }

    /// Creates every directory of the layout
    pub fn create_dirs(&self) -> io::Result<()> {
        for dir in [
            &self.root,
            &self.state_dir,
            &self.snapshots_dir,
            &self.cache_dir,
            &self.files_dir,
        ] {
            fs::create_dir_all(dir)?;
        }
        Ok(())
    }

    /// Path relative to the data directory, for log rows
    pub fn relative(&self, path: &Path) -> String {
        path.strip_prefix(&self.root)
            .unwrap_or(path)
            .to_string_lossy()
            .replace('\\', "/")
    }
}
