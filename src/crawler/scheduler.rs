//! Scheduler for the durable crawl frontier
//!
//! This module handles:
//! - FIFO frontier order with enqueue-once de-duplication
//! - The inflight checkpoint written before a URL is worked on
//! - Batched state persistence every `state-save-interval` operations
//! - Page and request budgets for the current run
//! - Failed URLs deferred to the next run

use crate::config::CrawlerConfig;
use crate::state::{CrawlState, StateStore};
use crate::Result;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashSet;
use url::Url;

/// Why a run stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    /// Nothing left in the frontier
    QueueExhausted,
    /// `max-pages` pages snapshotted this run
    PageBudget,
    /// `max-requests-per-run` requests issued this run
    RequestBudget,
    /// Ctrl-C
    Shutdown,
}

impl StopReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::QueueExhausted => "queue_exhausted",
            Self::PageBudget => "page_budget",
            Self::RequestBudget => "request_budget",
            Self::Shutdown => "shutdown",
        }
    }
}

impl std::fmt::Display for StopReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Scheduler owns the crawl state and decides when it is persisted
///
/// The state is never shared: the coordinator asks the scheduler for the
/// next URL and reports back through `begin`, `finish`, `enqueue` and
/// `defer`.
pub struct Scheduler {
    state: CrawlState,
    store: StateStore,

    /// URLs popped during this run
    visited: HashSet<String>,

    /// Failed URLs persisted at the end of the queue for the next run
    deferred: Vec<String>,

    ops_since_save: usize,
    save_interval: usize,
    max_pages: u64,
    max_requests: u64,
    pages_fetched: u64,
    last_saved_at: Option<DateTime<Utc>>,
}

impl Scheduler {
    /// Creates a scheduler over a loaded or freshly seeded state
    pub fn new(config: &CrawlerConfig, state: CrawlState, store: StateStore) -> Self {
        Self {
            state,
            store,
            visited: HashSet::new(),
            deferred: Vec::new(),
            ops_since_save: 0,
            save_interval: config.state_save_interval.max(1),
            max_pages: config.max_pages,
            max_requests: config.max_requests_per_run,
            pages_fetched: 0,
            last_saved_at: None,
        }
    }

    pub fn state(&self) -> &CrawlState {
        &self.state
    }

    /// Returns the number of URLs in the frontier
    pub fn frontier_size(&self) -> usize {
        self.state.queue.len()
    }

    /// Returns whether the frontier is empty
    pub fn is_empty(&self) -> bool {
        self.state.queue.is_empty()
    }

    pub fn pages_fetched(&self) -> u64 {
        self.pages_fetched
    }

    pub fn deferred(&self) -> &[String] {
        &self.deferred
    }

    pub fn last_saved_at(&self) -> Option<DateTime<Utc>> {
        self.last_saved_at
    }

    /// Budget that stops the run before the next URL, if any
    pub fn budget_exhausted(&self) -> Option<StopReason> {
        if self.pages_fetched >= self.max_pages {
            Some(StopReason::PageBudget)
        } else if !self.has_request_budget() {
            Some(StopReason::RequestBudget)
        } else {
            None
        }
    }

    /// Whether another request may be issued this run
    pub fn has_request_budget(&self) -> bool {
        self.state.requests_used_this_run < self.max_requests
    }

    /// Takes the next URL from the front of the frontier
    pub fn next_url(&mut self) -> Option<String> {
        self.state.pop_next()
    }

    /// Marks a URL visited for this run; false if it already was
    pub fn first_visit(&mut self, url: &Url) -> bool {
        self.visited.insert(url.to_string())
    }

    /// Makes a URL inflight and persists the state immediately
    pub fn begin(&mut self, url: &Url) -> Result<()> {
        self.state.set_inflight(url.as_str());
        self.checkpoint()
    }

    /// Clears the inflight URL and persists once the batch is full
    pub fn finish(&mut self) -> Result<()> {
        self.state.clear_inflight();
        self.ops_since_save += 1;
        if self.ops_since_save >= self.save_interval {
            self.checkpoint()?;
        }
        Ok(())
    }

    /// Enqueues a discovered URL unless it was seen before
    ///
    /// Returns true when the URL was added to the frontier.
    pub fn enqueue(&mut self, url: &Url) -> bool {
        if self.visited.contains(url.as_str()) {
            return false;
        }
        self.state.try_enqueue(url)
    }

    /// Keeps a failed URL for the next run
    pub fn defer(&mut self, url: &Url) {
        self.deferred.push(url.to_string());
    }

    /// Counts one issued HTTP request
    pub fn record_request(&mut self) {
        self.state.record_request();
    }

    /// Counts one snapshotted page against the page budget
    pub fn record_page(&mut self) {
        self.pages_fetched += 1;
    }

    /// Persists the state now
    pub fn checkpoint(&mut self) -> Result<()> {
        let saved_at = self.store.save(&self.state, &self.deferred)?;
        self.last_saved_at = Some(saved_at);
        self.ops_since_save = 0;
        Ok(())
    }
}
