//! URL handling module for snapcrawl
//!
//! This module provides URL normalization, authority extraction, path
//! sections, and the stable hashes used for de-duplication and snapshot
//! file names.

mod domain;
mod key;
mod normalize;

// Re-export main functions
pub use domain::{extract_authority, first_segment, path_section};
pub use key::{frontier_key, short_hash, snapshot_file_name, snapshot_key, KEY_LEN};
pub use normalize::{UrlNormalizer, DEFAULT_VOLATILE_PARAMS};
