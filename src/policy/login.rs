//! Login-page detection
//!
//! Stage one looks at the URL only and runs before any request. Stage two
//! runs an ordered list of [`PageMatcher`]s over fetched HTML.

use crate::config::LoginConfig;
use crate::{ConfigError, ConfigResult};
use regex::{Regex, RegexBuilder};
use scraper::Html;
use url::Url;

/// A strategy that recognizes login screens in parsed HTML
pub trait PageMatcher: Send + Sync {
    /// Short name used in log output
    fn name(&self) -> &str;

    /// Returns true if the document looks like a login screen
    fn matches(&self, document: &Html) -> bool;
}

/// Matches elements carrying a class token that contains a marker
pub struct ClassMarkerMatcher {
    markers: Vec<String>,
}

impl ClassMarkerMatcher {
    pub fn new(markers: Vec<String>) -> Self {
        Self {
            markers: markers.into_iter().map(|m| m.to_lowercase()).collect(),
        }
    }
}

impl PageMatcher for ClassMarkerMatcher {
    fn name(&self) -> &str {
        "class_marker"
    }

    fn matches(&self, document: &Html) -> bool {
        document.root_element().descendants().any(|node| {
            node.value().as_element().map_or(false, |element| {
                element.classes().any(|class| {
                    let class = class.to_lowercase();
                    self.markers.iter().any(|marker| class.contains(marker))
                })
            })
        })
    }
}

/// Matches elements whose id satisfies a regular expression
pub struct IdPatternMatcher {
    pattern: Regex,
}

impl IdPatternMatcher {
    pub fn new(pattern: &str) -> ConfigResult<Self> {
        let pattern = RegexBuilder::new(pattern)
            .case_insensitive(true)
            .build()
            .map_err(|e| ConfigError::InvalidPattern(format!("'{}': {}", pattern, e)))?;
        Ok(Self { pattern })
    }
}

impl PageMatcher for IdPatternMatcher {
    fn name(&self) -> &str {
        "id_pattern"
    }

    fn matches(&self, document: &Html) -> bool {
        document.root_element().descendants().any(|node| {
            node.value()
                .as_element()
                .and_then(|element| element.id())
                .map_or(false, |id| self.pattern.is_match(id.trim()))
        })
    }
}

/// Two-stage login-screen classifier
pub struct LoginDetector {
    enabled: bool,
    url_patterns: Vec<String>,
    matchers: Vec<Box<dyn PageMatcher>>,
}

impl LoginDetector {
    /// Builds the detector with the configured markers
    pub fn from_config(config: &LoginConfig) -> ConfigResult<Self> {
        let mut matchers: Vec<Box<dyn PageMatcher>> = Vec::new();
        if !config.class_markers.is_empty() {
            matchers.push(Box::new(ClassMarkerMatcher::new(config.class_markers.clone())));
        }
        if let Some(pattern) = &config.id_pattern {
            matchers.push(Box::new(IdPatternMatcher::new(pattern)?));
        }

        Ok(Self {
            enabled: config.block_login_pages,
            url_patterns: config.url_patterns.iter().map(|p| p.to_lowercase()).collect(),
            matchers,
        })
    }

    /// Adds a site-specific matcher after the configured ones
    pub fn with_matcher(mut self, matcher: Box<dyn PageMatcher>) -> Self {
        self.matchers.push(matcher);
        self
    }

    /// Stage one: URL substrings, no network access
    pub fn is_login_url(&self, url: &Url) -> bool {
        if !self.enabled {
            return false;
        }
        let url = url.as_str().to_lowercase();
        self.url_patterns.iter().any(|p| url.contains(p.as_str()))
    }

    /// Stage two: returns the name of the first matcher that fires
    pub fn login_marker(&self, document: &Html) -> Option<&str> {
        if !self.enabled {
            return None;
        }
        self.matchers
            .iter()
            .find(|m| m.matches(document))
            .map(|m| m.name())
    }

    pub fn is_login_html(&self, document: &Html) -> bool {
        self.login_marker(document).is_some()
    }
}
