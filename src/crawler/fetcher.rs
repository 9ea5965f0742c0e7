//! HTTP fetcher implementation
//!
//! This module handles all HTTP requests for the crawler, including:
//! - Building the HTTP client with the configured user agent and timeout
//! - Page fetches backed by a raw-HTML cache
//! - Attachment downloads with a Referer header
//! - The politeness pause after every network fetch

use crate::config::Config;
use crate::url::frontier_key;
use crate::{Result, SnapError};
use reqwest::{header, redirect::Policy, Client};
use std::path::{Path, PathBuf};
use std::time::Duration;
use url::Url;

/// Name used when a download carries no usable file name
pub const FALLBACK_FILE_NAME: &str = "download.bin";

/// Longest file name, in UTF-8 bytes, kept for a saved attachment; leaves
/// room for the store's hash prefix under the usual 255-byte limit
const MAX_FILE_NAME_BYTES: usize = 180;

const MAX_EXTENSION_BYTES: usize = 16;

/// Result of a page fetch
#[derive(Debug)]
pub enum FetchResult {
    /// Successfully fetched the page
    Success {
        /// Page body content
        body: String,
        /// HTTP status code (200 for cache hits)
        status_code: u16,
        /// Content-Type header value
        content_type: String,
        /// Served from the raw-HTML cache without network access
        from_cache: bool,
    },

    /// Response is neither HTML nor XML
    ContentMismatch {
        /// The actual Content-Type received
        content_type: String,
    },

    /// Non-success HTTP status
    HttpError {
        /// The HTTP status code
        status_code: u16,
    },

    /// Network error (connection refused, timeout, body read failure)
    NetworkError {
        /// Error description
        error: String,
    },
}

impl FetchResult {
    /// Whether producing this result sent a request over the network
    pub fn issued_request(&self) -> bool {
        !matches!(
            self,
            FetchResult::Success {
                from_cache: true,
                ..
            }
        )
    }
}

/// A downloaded attachment
#[derive(Debug, Clone)]
pub struct BinaryFile {
    /// Sanitized file name from Content-Disposition or the URL path
    pub file_name: String,
    pub bytes: Vec<u8>,
    pub content_type: String,
}

/// Builds an HTTP client with proper configuration
///
/// Redirects are followed up to 10 hops; the user agent is
/// `CrawlerName/Version (+ContactURL; ContactEmail)`.
///
/// # Arguments
///
/// * `config` - The crawler configuration
///
/// # Returns
///
/// * `Ok(Client)` - Successfully built HTTP client
/// * `Err(reqwest::Error)` - Failed to build client
pub fn build_http_client(config: &Config) -> std::result::Result<Client, reqwest::Error> {
    let timeout = Duration::from_secs(config.crawler.request_timeout_secs);

    Client::builder()
        .user_agent(config.user_agent.header_value())
        .timeout(timeout)
        .connect_timeout(timeout.min(Duration::from_secs(10)))
        .redirect(Policy::limited(10))
        .gzip(true)
        .brotli(true)
        .build()
}

/// Fetches pages and attachments for one crawl
///
/// Every response received over the network is followed by a pause of
/// `delay`; cache hits return immediately.
#[derive(Debug, Clone)]
pub struct Fetcher {
    client: Client,
    cache_dir: PathBuf,
    delay: Duration,
}

impl Fetcher {
    pub fn new(client: Client, cache_dir: impl Into<PathBuf>, delay: Duration) -> Self {
        Self {
            client,
            cache_dir: cache_dir.into(),
            delay,
        }
    }

    pub fn client(&self) -> &Client {
        &self.client
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Raw-HTML cache file of a URL
    pub fn cache_path(&self, url: &Url) -> PathBuf {
        self.cache_dir.join(format!("{}.html", frontier_key(url)))
    }

    /// Drops the cached body of a URL so the next fetch goes to the network
    pub fn evict(&self, url: &Url) -> std::io::Result<bool> {
        match std::fs::remove_file(self.cache_path(url)) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// Fetches a page, serving it from the cache when possible
    ///
    /// # Request Flow
    ///
    /// 1. Cached body present → `Success { from_cache: true }`, no pause
    /// 2. GET the URL
    ///    - Non-2xx → `HttpError`
    ///    - Content-Type without `html`/`xml` → `ContentMismatch`
    /// 3. Write the body to the cache (failures only warn)
    /// 4. Pause for the politeness delay after any received response
    pub async fn fetch_page(&self, url: &Url) -> FetchResult {
        let cache_path = self.cache_path(url);
        if let Some(body) = read_cached(&cache_path).await {
            tracing::debug!(url = %url, "Serving page from cache");
            return FetchResult::Success {
                body,
                status_code: 200,
                content_type: "text/html".to_string(),
                from_cache: true,
            };
        }

        let response = match self.client.get(url.as_str()).send().await {
            Ok(response) => response,
            Err(e) => {
                return FetchResult::NetworkError {
                    error: describe_error(&e),
                }
            }
        };

        let status = response.status();
        let content_type = header_string(response.headers(), header::CONTENT_TYPE);

        let result = if !status.is_success() {
            FetchResult::HttpError {
                status_code: status.as_u16(),
            }
        } else if !is_markup(&content_type) {
            FetchResult::ContentMismatch { content_type }
        } else {
            match response.text().await {
                Ok(body) => {
                    if let Err(e) = tokio::fs::write(&cache_path, &body).await {
                        tracing::warn!(
                            url = %url,
                            path = %cache_path.display(),
                            error = %e,
                            "Failed to write page cache"
                        );
                    }
                    FetchResult::Success {
                        body,
                        status_code: status.as_u16(),
                        content_type,
                        from_cache: false,
                    }
                }
                Err(e) => FetchResult::NetworkError {
                    error: describe_error(&e),
                },
            }
        };

        self.pause().await;
        result
    }

    /// Fetches a text document such as a sitemap, bypassing the cache
    ///
    /// Returns `None` on any failure; the caller only logs it.
    pub async fn fetch_text(&self, url: &Url) -> Option<String> {
        let response = match self.client.get(url.as_str()).send().await {
            Ok(response) => response,
            Err(e) => {
                tracing::warn!(url = %url, error = %describe_error(&e), "Failed to fetch document");
                return None;
            }
        };

        let status = response.status();
        let body = if status.is_success() {
            match response.text().await {
                Ok(body) => Some(body),
                Err(e) => {
                    tracing::warn!(url = %url, error = %e, "Failed to read document body");
                    None
                }
            }
        } else {
            tracing::warn!(url = %url, status = status.as_u16(), "Document fetch returned an error status");
            None
        };

        self.pause().await;
        body
    }

    /// Downloads an attachment
    ///
    /// # Arguments
    ///
    /// * `url` - The attachment URL
    /// * `referer` - The page linking to it, sent as the Referer header
    ///
    /// # Returns
    ///
    /// * `Ok(BinaryFile)` - The file name, content and content type
    /// * `Err(SnapError)` - Network failure or non-2xx status
    pub async fn fetch_binary(&self, url: &Url, referer: &Url) -> Result<BinaryFile> {
        let response = self
            .client
            .get(url.as_str())
            .header(header::REFERER, referer.as_str())
            .send()
            .await
            .map_err(|source| SnapError::Http {
                url: url.to_string(),
                source,
            })?;

        let status = response.status();
        if !status.is_success() {
            self.pause().await;
            return Err(SnapError::HttpStatus {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let content_type = header_string(response.headers(), header::CONTENT_TYPE);
        let disposition = response
            .headers()
            .get(header::CONTENT_DISPOSITION)
            .map(|value| String::from_utf8_lossy(value.as_bytes()).into_owned());

        let raw_name = disposition
            .as_deref()
            .and_then(filename_from_disposition)
            .or_else(|| last_path_segment(url))
            .unwrap_or_else(|| FALLBACK_FILE_NAME.to_string());

        let bytes = response.bytes().await;
        self.pause().await;
        let bytes = bytes.map_err(|source| SnapError::Http {
            url: url.to_string(),
            source,
        })?;

        Ok(BinaryFile {
            file_name: sanitize_file_name(&raw_name),
            bytes: bytes.to_vec(),
            content_type,
        })
    }

    async fn pause(&self) {
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
    }
}

async fn read_cached(path: &Path) -> Option<String> {
    let bytes = tokio::fs::read(path).await.ok()?;
    if bytes.is_empty() {
        return None;
    }
    Some(String::from_utf8_lossy(&bytes).into_owned())
}

fn header_string(headers: &header::HeaderMap, name: header::HeaderName) -> String {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("")
        .to_string()
}

fn is_markup(content_type: &str) -> bool {
    let lower = content_type.to_ascii_lowercase();
    lower.contains("html") || lower.contains("xml")
}

fn describe_error(e: &reqwest::Error) -> String {
    if e.is_timeout() {
        "Request timeout".to_string()
    } else if e.is_connect() {
        format!("Connection failed: {}", e)
    } else if e.is_redirect() {
        format!("Redirect error: {}", e)
    } else {
        e.to_string()
    }
}

/// Extracts the file name of a Content-Disposition header
///
/// `filename*` (RFC 5987, `charset''percent-encoded`) wins over `filename`.
pub fn filename_from_disposition(value: &str) -> Option<String> {
    let mut plain = None;
    let mut extended = None;

    for part in value.split(';') {
        let Some((key, raw)) = part.split_once('=') else {
            continue;
        };
        let raw = raw.trim().trim_matches('"');
        match key.trim().to_ascii_lowercase().as_str() {
            "filename*" => {
                let encoded = raw.splitn(3, '\'').last().unwrap_or(raw);
                extended = Some(percent_decode(encoded));
            }
            "filename" => plain = Some(percent_decode(raw)),
            _ => {}
        }
    }

    let usable = |name: Option<String>| {
        name.map(|n| n.trim().to_string())
            .filter(|n| !n.is_empty())
    };
    usable(extended).or_else(|| usable(plain))
}

fn last_path_segment(url: &Url) -> Option<String> {
    url.path_segments()?
        .filter(|s| !s.is_empty())
        .last()
        .map(percent_decode)
}

/// Decodes `%XX` escapes; invalid UTF-8 is replaced
fn percent_decode(input: &str) -> String {
    String::from_utf8_lossy(&urlencoding::decode_binary(input.as_bytes())).into_owned()
}

/// Makes a download name safe to use as a file name
///
/// Directory components are dropped, reserved and control characters become
/// `_`, whitespace runs collapse, and a `.bin` extension is added when the
/// name has none.
pub fn sanitize_file_name(raw: &str) -> String {
    let base = raw.rsplit(|c| c == '/' || c == '\\').next().unwrap_or(raw);

    let replaced: String = base
        .chars()
        .map(|c| match c {
            ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();

    let collapsed = replaced.split_whitespace().collect::<Vec<_>>().join(" ");
    let trimmed = collapsed.trim_matches(|c: char| c == '.' || c == ' ');
    if trimmed.is_empty() {
        return FALLBACK_FILE_NAME.to_string();
    }

    let mut name = trimmed.to_string();
    if !name.contains('.') {
        name.push_str(".bin");
    }
    truncate_file_name(&name, MAX_FILE_NAME_BYTES)
}

/// Shortens a name to at most `max_bytes` UTF-8 bytes, keeping a short
/// extension and cutting the stem on a char boundary
fn truncate_file_name(name: &str, max_bytes: usize) -> String {
    if name.len() <= max_bytes {
        return name.to_string();
    }

    let (stem, ext) = match name.rfind('.') {
        Some(dot) if dot > 0 && name.len() - dot <= MAX_EXTENSION_BYTES => name.split_at(dot),
        _ => (name, ""),
    };

    let mut cut = max_bytes.saturating_sub(ext.len()).min(stem.len());
    while !stem.is_char_boundary(cut) {
        cut -= 1;
    }
    format!("{}{}", stem[..cut].trim_end(), ext)
}
