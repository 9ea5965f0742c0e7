use crate::state::CrawlState;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

/// Name of the state file inside the state directory
pub const STATE_FILE_NAME: &str = "crawl_state.json";

/// On-disk form written by `save`
#[derive(Serialize)]
struct StateFileRef<'a> {
    queue: Vec<&'a str>,
    inflight: Option<&'a str>,
    requests_used: u64,
    enqueued_keys: Vec<&'a str>,
    last_saved_at: DateTime<Utc>,
}

/// On-disk form read by `load`
#[derive(Deserialize)]
struct StateFile {
    #[serde(default)]
    queue: Vec<String>,
    #[serde(default)]
    inflight: Option<String>,
    #[serde(default)]
    requests_used: u64,
    #[serde(default)]
    enqueued_keys: Vec<String>,
    #[serde(default)]
    last_saved_at: Option<DateTime<Utc>>,
}

/// Crash-safe persistence of [`CrawlState`]
///
/// Saves go to a temporary file that is fsynced and then renamed over the
/// state file, so readers only ever see a complete document.
#[derive(Debug, Clone)]
pub struct StateStore {
    path: PathBuf,
}

impl StateStore {
    /// Opens the store in `state_dir`, creating the directory if needed
    pub fn open(state_dir: &Path) -> io::Result<Self> {
        fs::create_dir_all(state_dir)?;
        Ok(Self {
            path: state_dir.join(STATE_FILE_NAME),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn tmp_path(&self) -> PathBuf {
        self.path.with_extension("json.tmp")
    }

    /// Loads the state file
    ///
    /// # Returns
    ///
    /// * `Ok(None)` - No state file, start fresh
    /// * `Ok(Some((state, last_saved_at)))` - Loaded state
    /// * `Err(SnapError)` - The file exists but cannot be read or parsed
    pub fn load(&self) -> crate::Result<Option<(CrawlState, Option<DateTime<Utc>>)>> {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        let file: StateFile = serde_json::from_str(&content)?;
        let mut state = CrawlState {
            queue: file.queue.into_iter().collect(),
            inflight: file.inflight,
            requests_used: file.requests_used,
            requests_used_this_run: 0,
            enqueued_keys: file.enqueued_keys.into_iter().collect(),
        };

        let repaired = state.repair_keys();
        if repaired > 0 {
            tracing::warn!(repaired, "State file was missing frontier keys");
        }

        Ok(Some((state, file.last_saved_at)))
    }

    /// Atomically writes the state
    ///
    /// `deferred` URLs are appended to the persisted queue (after the live
    /// queue) so the next run retries them; they are not part of `state`.
    pub fn save(&self, state: &CrawlState, deferred: &[String]) -> crate::Result<DateTime<Utc>> {
        let now = Utc::now();
        let file = StateFileRef {
            queue: state
                .queue
                .iter()
                .chain(deferred.iter())
                .map(String::as_str)
                .collect(),
            inflight: state.inflight.as_deref(),
            requests_used: state.requests_used,
            enqueued_keys: state.enqueued_keys.iter().map(String::as_str).collect(),
            last_saved_at: now,
        };
        let json = serde_json::to_vec_pretty(&file)?;

        let tmp = self.tmp_path();
        {
            let mut out = File::create(&tmp)?;
            out.write_all(&json)?;
            out.sync_all()?;
        }
        fs::rename(&tmp, &self.path)?;

        tracing::debug!(
            queue = file.queue.len(),
            inflight = ?file.inflight,
            requests_used = file.requests_used,
            "Saved crawl state"
        );
        Ok(now)
    }

    /// Removes the state file, used by `--fresh`
    pub fn clear(&self) -> io::Result<()> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e),
        }
    }
}
