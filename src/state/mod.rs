//! State module for tracking crawl progress
//!
//! # Components
//!
//! - `CrawlState`: the frontier queue, the inflight URL, request counters and
//!   the set of every URL key ever enqueued
//! - `StateStore`: atomic JSON persistence of `CrawlState`
//! - `UrlOutcome`: how processing of a single URL ended

mod crawl_state;
mod outcome;
mod store;

// Re-export main types
pub use crawl_state::CrawlState;
pub use outcome::{OutcomeTally, UrlOutcome};
pub use store::{StateStore, STATE_FILE_NAME};
