//! Snapshot building
//!
//! Turns a fetched page into the minimal document that is persisted:
//!
//! - `ContentExtractor`: title, main-content fragment, chrome stripping
//! - `EmailRedactor`: `mailto:` rewriting and free-text e-mail replacement
//! - `SnapshotStore`: deterministic snapshot paths and writes

mod builder;
mod extract;
mod pii;

pub use builder::{build_minimal_snapshot_html, SnapshotStore, FETCHED_AT_MARKER};
pub use extract::{ContentExtractor, Extracted};
pub use pii::EmailRedactor;
