use crate::config::types::{
    Config, CrawlerConfig, LoginConfig, PiiConfig, SiteConfig, SnapshotConfig, UserAgentConfig,
    MAX_REQUEST_SLEEP_SECS,
};
use crate::ConfigError;
use regex::RegexBuilder;
use scraper::Selector;
use url::Url;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_site_config(&config.site)?;
    validate_crawler_config(&config.crawler)?;
    validate_user_agent_config(&config.user_agent)?;
    validate_login_config(&config.login)?;
    validate_snapshot_config(&config.snapshot)?;
    validate_pii_config(&config.pii)?;
    Ok(())
}

/// Validates the crawled origin
fn validate_site_config(config: &SiteConfig) -> Result<(), ConfigError> {
    validate_domain(&config.domain)?;

    if config.start_url.is_none() && config.sitemap_index.is_none() {
        return Err(ConfigError::Validation(
            "at least one of start-url or sitemap-index must be set".to_string(),
        ));
    }

    for (name, value) in [
        ("start-url", &config.start_url),
        ("sitemap-index", &config.sitemap_index),
    ] {
        if let Some(raw) = value {
            let url = Url::parse(raw)
                .map_err(|e| ConfigError::InvalidUrl(format!("Invalid {} '{}': {}", name, raw, e)))?;
            if url.scheme() != "http" && url.scheme() != "https" {
                return Err(ConfigError::InvalidUrl(format!(
                    "{} '{}' must use http or https",
                    name, raw
                )));
            }
        }
    }

    for prefix in &config.allowed_path_prefixes {
        if !prefix.starts_with('/') {
            return Err(ConfigError::Validation(format!(
                "allowed path prefix '{}' must start with '/'",
                prefix
            )));
        }
    }

    for pattern in &config.deny_patterns {
        validate_regex(pattern)?;
    }

    Ok(())
}

/// Validates crawler configuration
fn validate_crawler_config(config: &CrawlerConfig) -> Result<(), ConfigError> {
    if config.request_timeout_secs < 1 {
        return Err(ConfigError::Validation(format!(
            "request-timeout-secs must be >= 1, got {}",
            config.request_timeout_secs
        )));
    }

    if !config.request_sleep_secs.is_finite()
        || config.request_sleep_secs < 0.0
        || config.request_sleep_secs > MAX_REQUEST_SLEEP_SECS
    {
        return Err(ConfigError::Validation(format!(
            "request-sleep-secs must be between 0 and {}, got {}",
            MAX_REQUEST_SLEEP_SECS, config.request_sleep_secs
        )));
    }

    if config.max_pages < 1 {
        return Err(ConfigError::Validation(format!(
            "max-pages must be >= 1, got {}",
            config.max_pages
        )));
    }

    if config.max_requests_per_run < 1 {
        return Err(ConfigError::Validation(format!(
            "max-requests-per-run must be >= 1, got {}",
            config.max_requests_per_run
        )));
    }

    if config.state_save_interval < 1 {
        return Err(ConfigError::Validation(format!(
            "state-save-interval must be >= 1, got {}",
            config.state_save_interval
        )));
    }

    Ok(())
}

/// Validates user agent configuration
fn validate_user_agent_config(config: &UserAgentConfig) -> Result<(), ConfigError> {
    // The name doubles as the robots.txt product token
    if config.crawler_name.is_empty() {
        return Err(ConfigError::Validation(
            "crawler-name cannot be empty".to_string(),
        ));
    }

    if !config
        .crawler_name
        .chars()
        .all(|c| c.is_alphanumeric() || c == '-' || c == '_')
    {
        return Err(ConfigError::Validation(format!(
            "crawler-name must contain only alphanumeric characters, '-' and '_', got '{}'",
            config.crawler_name
        )));
    }

    if let Some(contact_url) = &config.contact_url {
        Url::parse(contact_url)
            .map_err(|e| ConfigError::InvalidUrl(format!("Invalid contact-url: {}", e)))?;
    }

    if let Some(email) = &config.contact_email {
        validate_email(email)?;
    }

    Ok(())
}

fn validate_login_config(config: &LoginConfig) -> Result<(), ConfigError> {
    if let Some(pattern) = &config.id_pattern {
        validate_regex(pattern)?;
    }
    Ok(())
}

fn validate_snapshot_config(config: &SnapshotConfig) -> Result<(), ConfigError> {
    for selector in config
        .content_selectors
        .iter()
        .chain(config.strip_selectors.iter())
    {
        Selector::parse(selector)
            .map_err(|e| ConfigError::InvalidSelector(format!("'{}': {:?}", selector, e)))?;
    }
    Ok(())
}

fn validate_pii_config(config: &PiiConfig) -> Result<(), ConfigError> {
    if config.redact_email && config.placeholder.contains('@') {
        return Err(ConfigError::Validation(
            "pii placeholder must not itself look like an e-mail address".to_string(),
        ));
    }
    Ok(())
}

/// Validates a host[:port] string
fn validate_domain(domain: &str) -> Result<(), ConfigError> {
    if domain.is_empty() {
        return Err(ConfigError::Validation("domain cannot be empty".to_string()));
    }

    let (host, port) = match domain.rsplit_once(':') {
        Some((host, port)) => (host, Some(port)),
        None => (domain, None),
    };

    if let Some(port) = port {
        if port.parse::<u16>().is_err() {
            return Err(ConfigError::Validation(format!(
                "domain '{}' has an invalid port",
                domain
            )));
        }
    }

    if host.is_empty()
        || !host
            .chars()
            .all(|c| c.is_alphanumeric() || c == '.' || c == '-')
    {
        return Err(ConfigError::Validation(format!(
            "domain '{}' contains invalid characters",
            domain
        )));
    }

    if host.starts_with('.') || host.ends_with('.') || host.contains("..") {
        return Err(ConfigError::Validation(format!(
            "domain '{}' is malformed",
            domain
        )));
    }

    Ok(())
}

fn validate_regex(pattern: &str) -> Result<(), ConfigError> {
    RegexBuilder::new(pattern)
        .case_insensitive(true)
        .build()
        .map(|_| ())
        .map_err(|e| ConfigError::InvalidPattern(format!("'{}': {}", pattern, e)))
}

/// Basic email validation
fn validate_email(email: &str) -> Result<(), ConfigError> {
    let parts: Vec<&str> = email.split('@').collect();
    if parts.len() != 2 || parts[0].is_empty() || !parts[1].contains('.') {
        return Err(ConfigError::Validation(format!(
            "Invalid email format: '{}'",
            email
        )));
    }
    Ok(())
}
