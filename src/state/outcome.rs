/// Outcome definitions for processed URLs
///
/// Every URL popped from the frontier ends in exactly one outcome.
use serde::Serialize;
use std::fmt;

/// What happened to a URL taken from the frontier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UrlOutcome {
    // ===== Success =====
    /// Fetched, snapshotted and logged
    Fetched,

    // ===== Skips =====
    /// Already visited this run, or its snapshot already exists
    SkippedDuplicate,

    /// Rejected by the politeness gate
    SkippedFiltered,

    /// Looks like a login screen (URL or HTML)
    SkippedLogin,

    // ===== Errors =====
    /// Network error, non-2xx status or wrong content type
    Failed,

    /// Shutdown arrived before the URL was finished; it stays inflight
    Interrupted,
}

impl UrlOutcome {
    /// Returns true if this represents a successful fetch
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Fetched)
    }

    /// Returns true if the URL was deliberately not fetched
    pub fn is_skipped(&self) -> bool {
        matches!(
            self,
            Self::SkippedDuplicate | Self::SkippedFiltered | Self::SkippedLogin
        )
    }

    /// Returns true if the URL is considered done and leaves `inflight`
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Interrupted)
    }

    /// String form used in logs and run metadata
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Fetched => "fetched",
            Self::SkippedDuplicate => "skipped_duplicate",
            Self::SkippedFiltered => "skipped_filtered",
            Self::SkippedLogin => "skipped_login",
            Self::Failed => "failed",
            Self::Interrupted => "interrupted",
        }
    }

    /// Parses the string form
    pub fn from_str_name(s: &str) -> Option<Self> {
        Self::all().into_iter().find(|o| o.as_str() == s)
    }

    /// Returns all outcomes
    pub fn all() -> Vec<Self> {
        vec![
            Self::Fetched,
            Self::SkippedDuplicate,
            Self::SkippedFiltered,
            Self::SkippedLogin,
            Self::Failed,
            Self::Interrupted,
        ]
    }
}

impl fmt::Display for UrlOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Per-outcome counters for one run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct OutcomeTally {
    pub fetched: u64,
    pub skipped_duplicate: u64,
    pub skipped_filtered: u64,
    pub skipped_login: u64,
    pub failed: u64,
    pub interrupted: u64,
}

impl OutcomeTally {
    pub fn record(&mut self, outcome: UrlOutcome) {
        let slot = match outcome {
            UrlOutcome::Fetched => &mut self.fetched,
            UrlOutcome::SkippedDuplicate => &mut self.skipped_duplicate,
            UrlOutcome::SkippedFiltered => &mut self.skipped_filtered,
            UrlOutcome::SkippedLogin => &mut self.skipped_login,
            UrlOutcome::Failed => &mut self.failed,
            UrlOutcome::Interrupted => &mut self.interrupted,
        };
        *slot += 1;
    }

    pub fn get(&self, outcome: UrlOutcome) -> u64 {
        match outcome {
            UrlOutcome::Fetched => self.fetched,
            UrlOutcome::SkippedDuplicate => self.skipped_duplicate,
            UrlOutcome::SkippedFiltered => self.skipped_filtered,
            UrlOutcome::SkippedLogin => self.skipped_login,
            UrlOutcome::Failed => self.failed,
            UrlOutcome::Interrupted => self.interrupted,
        }
    }

    pub fn total(&self) -> u64 {
        UrlOutcome::all().into_iter().map(|o| self.get(o)).sum()
    }
}
