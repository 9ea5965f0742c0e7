//! Access policy: what may be fetched and what must not be snapshotted
//!
//! - `PolitenessGate`: domain, path prefix, deny pattern and robots.txt checks
//! - `LoginDetector`: URL and HTML heuristics for authentication screens

mod gate;
mod login;

pub use gate::{PolitenessGate, Rejection};
pub use login::{ClassMarkerMatcher, IdPatternMatcher, LoginDetector, PageMatcher};
