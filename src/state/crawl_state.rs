use crate::url::frontier_key;
use std::collections::{BTreeSet, VecDeque};
use url::Url;

/// Durable crawl progress
///
/// Invariant: the key of every URL in `queue` or in `inflight` is present in
/// `enqueued_keys`. Keys are never removed, so a URL is enqueued at most once
/// over the lifetime of a state file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CrawlState {
    /// Normalized URLs awaiting processing, FIFO
    pub queue: VecDeque<String>,

    /// The URL being processed, kept for crash recovery
    pub inflight: Option<String>,

    /// Requests issued over the crawl's lifetime
    pub requests_used: u64,

    /// Requests issued since this process started; not persisted
    pub requests_used_this_run: u64,

    /// Frontier keys of every URL ever enqueued
    pub enqueued_keys: BTreeSet<String>,
}

impl CrawlState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Enqueues a normalized URL unless its key was seen before
    ///
    /// Returns true when the URL was added.
    pub fn try_enqueue(&mut self, url: &Url) -> bool {
        if self.enqueued_keys.insert(frontier_key(url)) {
            self.queue.push_back(url.to_string());
            true
        } else {
            false
        }
    }

    /// Puts a URL at the front of the queue even if it was enqueued before
    ///
    /// A queued copy is moved rather than duplicated.
    pub fn requeue_front(&mut self, url: &Url) {
        let raw = url.to_string();
        self.enqueued_keys.insert(frontier_key(url));
        self.queue.retain(|queued| *queued != raw);
        self.queue.push_front(raw);
    }

    /// Takes the next URL from the front of the queue
    pub fn pop_next(&mut self) -> Option<String> {
        self.queue.pop_front()
    }

    pub fn set_inflight(&mut self, url: &str) {
        self.inflight = Some(url.to_string());
    }

    pub fn clear_inflight(&mut self) {
        self.inflight = None;
    }

    /// Moves a leftover inflight URL back to the front of the queue
    ///
    /// Returns the recovered URL, if any.
    pub fn recover_inflight(&mut self) -> Option<String> {
        let url = self.inflight.take()?;
        if self.queue.front() != Some(&url) {
            self.queue.push_front(url.clone());
        }
        Some(url)
    }

    /// Counts one issued HTTP request
    pub fn record_request(&mut self) {
        self.requests_used += 1;
        self.requests_used_this_run += 1;
    }

    /// True when there is nothing left to resume
    pub fn is_finished(&self) -> bool {
        self.queue.is_empty() && self.inflight.is_none()
    }

    /// Inserts keys for queued and inflight URLs that lack one
    ///
    /// Used after loading a state file that was edited by hand or written by
    /// an older version.
    pub fn repair_keys(&mut self) -> usize {
        let missing: Vec<String> = self
            .queue
            .iter()
            .chain(self.inflight.iter())
            .filter_map(|raw| Url::parse(raw).ok())
            .map(|url| frontier_key(&url))
            .filter(|key| !self.enqueued_keys.contains(key))
            .collect();
        let repaired = missing.len();
        self.enqueued_keys.extend(missing);
        repaired
    }

    /// Checks the key invariant
    pub fn keys_cover_frontier(&self) -> bool {
        self.queue
            .iter()
            .chain(self.inflight.iter())
            .all(|raw| match Url::parse(raw) {
                Ok(url) => self.enqueued_keys.contains(&frontier_key(&url)),
                Err(_) => false,
            })
    }
}
