//! Robots.txt handling module
//!
//! This module fetches and parses the robots.txt of the crawled origin. It is
//! read once at startup; the result is owned by the politeness gate.

mod parser;

pub use parser::{ParsedRobots, MAX_CRAWL_DELAY};

use reqwest::Client;
use url::Url;

/// Builds the robots.txt URL for a site
///
/// The scheme is taken from `reference` (the start URL or sitemap), the
/// authority from the configured domain.
pub fn robots_url(reference: &Url, domain: &str) -> crate::UrlResult<Url> {
    let raw = format!("{}://{}/robots.txt", reference.scheme(), domain);
    Url::parse(&raw).map_err(|e| crate::UrlError::Parse(format!("{}: {}", raw, e)))
}

/// Fetches robots.txt for the crawled origin
///
/// A missing robots.txt (404 and other 4xx) allows everything. Any other
/// failure (network error, 5xx, unreadable body) is resolved by `fail_open`:
/// `true` allows everything, `false` disallows everything.
///
/// # Arguments
///
/// * `client` - The HTTP client carrying the crawler's User-Agent
/// * `url` - The robots.txt URL
/// * `fail_open` - Behaviour when robots.txt cannot be obtained
///
/// # Returns
///
/// The parsed rules; this never fails
pub async fn fetch_robots(client: &Client, url: &Url, fail_open: bool) -> ParsedRobots {
    let fallback = |reason: String| {
        if fail_open {
            tracing::warn!(url = %url, error = %reason, "robots.txt unavailable, allowing all");
            ParsedRobots::allow_all()
        } else {
            tracing::warn!(url = %url, error = %reason, "robots.txt unavailable, disallowing all");
            ParsedRobots::disallow_all()
        }
    };

    let response = match client.get(url.as_str()).send().await {
        Ok(response) => response,
        Err(e) => return fallback(e.to_string()),
    };

    let status = response.status();
    if status.is_client_error() {
        tracing::info!(url = %url, status = status.as_u16(), "No robots.txt, allowing all");
        return ParsedRobots::allow_all();
    }
    if !status.is_success() {
        return fallback(format!("HTTP {}", status.as_u16()));
    }

    match response.text().await {
        Ok(body) => {
            tracing::debug!(url = %url, bytes = body.len(), "Fetched robots.txt");
            ParsedRobots::from_content(&body)
        }
        Err(e) => fallback(e.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_robots_url_uses_reference_scheme() {
        let start = Url::parse("http://127.0.0.1:4000/start").unwrap();
        let url = robots_url(&start, "127.0.0.1:4000").unwrap();
        assert_eq!(url.as_str(), "http://127.0.0.1:4000/robots.txt");

        let start = Url::parse("https://www.example.org/").unwrap();
        let url = robots_url(&start, "www.example.org").unwrap();
        assert_eq!(url.as_str(), "https://www.example.org/robots.txt");
    }

    #[tokio::test]
    async fn test_unreachable_robots_follows_fail_mode() {
        let client = Client::new();
        // Port 9 (discard) on localhost is not expected to be serving HTTP
        let url = Url::parse("http://127.0.0.1:9/robots.txt").unwrap();

        let open = fetch_robots(&client, &url, true).await;
        assert!(open.is_allowed("/anything", "TestBot"));

        let closed = fetch_robots(&client, &url, false).await;
        assert!(!closed.is_allowed("/anything", "TestBot"));
    }
}
