//! Attachment download policy and file store

use crate::config::{AttachmentConfig, AttachmentPolicy};
use crate::crawler::fetcher::BinaryFile;
use crate::url::short_hash;
use sha2::{Digest, Sha256};
use std::fs;
use std::io;
use std::path::PathBuf;
use url::Url;

/// Hex characters of the URL hash prefixed to saved file names
const FILE_PREFIX_LEN: usize = 10;

/// Decides which detected attachments are downloaded
///
/// | Policy | Downloads |
/// |--------|-----------|
/// | `metadata_only` | nothing |
/// | `allowlist` | paths under an allow prefix, unless under a block prefix |
/// | `blocklist` | everything not under a block prefix |
#[derive(Debug, Clone)]
pub struct AttachmentRules {
    policy: AttachmentPolicy,
    allow_prefixes: Vec<String>,
    block_prefixes: Vec<String>,
}

impl AttachmentRules {
    pub fn from_config(config: &AttachmentConfig) -> Self {
        Self {
            policy: config.policy,
            allow_prefixes: config.allow_prefixes.clone(),
            block_prefixes: config.block_prefixes.clone(),
        }
    }

    pub fn policy(&self) -> AttachmentPolicy {
        self.policy
    }

    pub fn should_download(&self, url: &Url) -> bool {
        let path = url.path();
        let blocked = self.block_prefixes.iter().any(|p| path.starts_with(p.as_str()));

        match self.policy {
            AttachmentPolicy::MetadataOnly => false,
            AttachmentPolicy::Allowlist => {
                !blocked && self.allow_prefixes.iter().any(|p| path.starts_with(p.as_str()))
            }
            AttachmentPolicy::Blocklist => !blocked,
        }
    }
}

/// A binary written to the files directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SavedFile {
    pub path: PathBuf,
    pub size_bytes: u64,
    /// SHA-256 of the content, hex
    pub sha256: String,
}

/// Downloaded attachments on disk
///
/// Files are named `<url-hash10>_<file name>`, so two attachments with the
/// same file name never collide and re-downloading a URL overwrites its file.
#[derive(Debug, Clone)]
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    pub fn open(dir: impl Into<PathBuf>) -> io::Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    pub fn path_for(&self, url: &Url, file_name: &str) -> PathBuf {
        self.dir.join(format!(
            "{}_{}",
            short_hash(url.as_str(), FILE_PREFIX_LEN),
            file_name
        ))
    }

    pub fn save(&self, url: &Url, file: &BinaryFile) -> io::Result<SavedFile> {
        let path = self.path_for(url, &file.file_name);
        fs::write(&path, &file.bytes)?;
        Ok(SavedFile {
            path,
            size_bytes: file.bytes.len() as u64,
            sha256: hex::encode(Sha256::digest(&file.bytes)),
        })
    }
}
