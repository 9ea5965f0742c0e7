//! Stable hashes derived from URLs
//!
//! Two different keys are used: the frontier key hashes the whole normalized
//! URL and de-duplicates the queue, while the snapshot key hashes only
//! path+query and names the snapshot and cache files.

use sha2::{Digest, Sha256};
use url::Url;

/// Length of the hex keys stored in the state file and file names
pub const KEY_LEN: usize = 16;

/// Longest path slug kept in a snapshot file name
const MAX_SLUG_LEN: usize = 120;

/// Short hex digest of arbitrary text
pub fn short_hash(text: &str, len: usize) -> String {
    let digest = Sha256::digest(text.as_bytes());
    let mut hex = hex::encode(digest);
    hex.truncate(len);
    hex
}

/// Key recorded in `enqueued_keys` for a normalized URL
pub fn frontier_key(url: &Url) -> String {
    short_hash(url.as_str(), KEY_LEN)
}

/// The path+query part of a URL that snapshot keys are derived from
fn path_and_query(url: &Url) -> String {
    let path = if url.path().is_empty() { "/" } else { url.path() };
    match url.query() {
        Some(query) if !query.is_empty() => format!("{}?{}", path, query),
        _ => path.to_string(),
    }
}

/// Key of the snapshot for a URL
pub fn snapshot_key(url: &Url) -> String {
    short_hash(&path_and_query(url), KEY_LEN)
}

/// Deterministic snapshot file name: `<path-slug>__<key>.html`
///
/// The slug keeps the file system listing readable; the key alone decides
/// identity.
pub fn snapshot_file_name(url: &Url) -> String {
    let slug: String = url
        .path()
        .trim_matches('/')
        .replace('/', "__")
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .take(MAX_SLUG_LEN)
        .collect();

    let slug = if slug.is_empty() { "index".to_string() } else { slug };
    format!("{}__{}.html", slug, snapshot_key(url))
}
