use crate::config::{Config, CrawlerConfig, SiteConfig};
use crate::robots::ParsedRobots;
use crate::url::extract_authority;
use crate::{ConfigError, ConfigResult};
use regex::{Regex, RegexBuilder};
use std::time::Duration;
use url::Url;

/// Why the gate refused a URL
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    /// Host[:port] differs from the crawled domain
    OffSite,
    /// Path is outside every allowed prefix
    OutsidePrefixes,
    /// Matched a deny pattern
    Denied,
    /// robots.txt disallows the path
    Robots,
}

impl Rejection {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::OffSite => "off_site",
            Self::OutsidePrefixes => "outside_prefixes",
            Self::Denied => "deny_pattern",
            Self::Robots => "robots",
        }
    }
}

/// Decides whether a URL may be fetched at all
///
/// Checks run cheapest first: domain, path prefix, deny patterns, and only
/// then robots.txt. The gate owns the robots rules fetched at startup.
#[derive(Debug, Clone)]
pub struct PolitenessGate {
    domain: String,
    allowed_prefixes: Vec<String>,
    deny: Vec<Regex>,
    robots: ParsedRobots,
    agent: String,
    delay: Duration,
}

impl PolitenessGate {
    /// Builds the gate from configuration and the startup robots.txt
    pub fn new(config: &Config, robots: ParsedRobots) -> ConfigResult<Self> {
        Self::from_parts(&config.site, &config.crawler, &config.user_agent.crawler_name, robots)
    }

    fn from_parts(
        site: &SiteConfig,
        crawler: &CrawlerConfig,
        agent: &str,
        robots: ParsedRobots,
    ) -> ConfigResult<Self> {
        let deny = site
            .deny_patterns
            .iter()
            .map(|p| {
                RegexBuilder::new(p)
                    .case_insensitive(true)
                    .build()
                    .map_err(|e| ConfigError::InvalidPattern(format!("'{}': {}", p, e)))
            })
            .collect::<ConfigResult<Vec<_>>>()?;

        let configured = crawler.request_sleep();
        let delay = robots.crawl_delay(agent).unwrap_or(configured);

        Ok(Self {
            domain: site.domain.to_lowercase(),
            allowed_prefixes: site.allowed_path_prefixes.clone(),
            deny,
            robots,
            agent: agent.to_string(),
            delay,
        })
    }

    /// Returns true when every check passes
    pub fn is_allowed(&self, url: &Url) -> bool {
        self.check(url).is_ok()
    }

    /// Runs the checks in order and reports the first failing one
    pub fn check(&self, url: &Url) -> Result<(), Rejection> {
        if !self.is_on_site(url) {
            return Err(Rejection::OffSite);
        }

        if !self.allowed_prefixes.is_empty()
            && !self
                .allowed_prefixes
                .iter()
                .any(|prefix| url.path().starts_with(prefix.as_str()))
        {
            return Err(Rejection::OutsidePrefixes);
        }

        if self.deny.iter().any(|re| re.is_match(url.as_str())) {
            return Err(Rejection::Denied);
        }

        if !self.robots_permits(url) {
            return Err(Rejection::Robots);
        }

        Ok(())
    }

    /// True when the URL belongs to the crawled origin
    pub fn is_on_site(&self, url: &Url) -> bool {
        extract_authority(url).as_deref() == Some(self.domain.as_str())
    }

    /// robots.txt verdict alone, used for attachment downloads
    pub fn robots_permits(&self, url: &Url) -> bool {
        self.robots.is_allowed(url.as_str(), &self.agent)
    }

    /// Crawl-delay from robots.txt, or the configured sleep when absent
    pub fn crawl_delay(&self) -> Duration {
        self.delay
    }
}
