use crate::url::DEFAULT_VOLATILE_PARAMS;
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

/// Upper bound accepted for `request-sleep-secs`
pub const MAX_REQUEST_SLEEP_SECS: f64 = 3600.0;

/// Main configuration structure for snapcrawl
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub site: SiteConfig,
    #[serde(default)]
    pub crawler: CrawlerConfig,
    #[serde(rename = "user-agent")]
    pub user_agent: UserAgentConfig,
    #[serde(default)]
    pub login: LoginConfig,
    #[serde(default)]
    pub snapshot: SnapshotConfig,
    #[serde(default)]
    pub attachments: AttachmentConfig,
    #[serde(default)]
    pub pii: PiiConfig,
    #[serde(default)]
    pub output: OutputConfig,
}

/// The single origin being crawled
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct SiteConfig {
    /// Host (with port, if non-default) that every crawled URL must have
    pub domain: String,

    /// Page appended to the seed queue after sitemap entries
    #[serde(default)]
    pub start_url: Option<String>,

    /// Sitemap index used to seed the queue and provide lastmod hints
    #[serde(default)]
    pub sitemap_index: Option<String>,

    /// Restricts sitemap traversal to these first path segments
    #[serde(default)]
    pub allow_sections: Option<Vec<String>>,

    /// Only paths starting with one of these prefixes are crawled
    #[serde(default = "default_allowed_prefixes")]
    pub allowed_path_prefixes: Vec<String>,

    /// Case-insensitive regular expressions matched against the full URL
    #[serde(default)]
    pub deny_patterns: Vec<String>,

    /// Treat an unreachable robots.txt as "allow everything"
    #[serde(default = "default_true")]
    pub robots_fail_open: bool,
}

/// Crawler behavior configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct CrawlerConfig {
    /// Per-request timeout in seconds
    pub request_timeout_secs: u64,

    /// Minimum pause after each network fetch, in seconds
    pub request_sleep_secs: f64,

    /// Maximum number of pages snapshotted per run
    pub max_pages: u64,

    /// Maximum number of HTTP requests issued per run
    pub max_requests_per_run: u64,

    /// Number of processed URLs between state file checkpoints
    pub state_save_interval: usize,

    /// Query parameters dropped during URL normalization
    pub volatile_params: Vec<String>,

    /// Keep failed URLs in the persisted queue for the next run
    pub retry_failed: bool,
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            request_timeout_secs: 10,
            request_sleep_secs: 0.7,
            max_pages: 300_000,
            max_requests_per_run: 300_000,
            state_save_interval: 50,
            volatile_params: DEFAULT_VOLATILE_PARAMS.iter().map(|p| p.to_string()).collect(),
            retry_failed: false,
        }
    }
}

impl CrawlerConfig {
    /// The configured politeness pause, clamped to `MAX_REQUEST_SLEEP_SECS`;
    /// negative or NaN values give zero
    pub fn request_sleep(&self) -> Duration {
        if self.request_sleep_secs.is_nan() {
            return Duration::ZERO;
        }
        Duration::try_from_secs_f64(self.request_sleep_secs.min(MAX_REQUEST_SLEEP_SECS))
            .unwrap_or(Duration::ZERO)
    }
}

/// User agent identification configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct UserAgentConfig {
    /// Name of the crawler, also the robots.txt product token
    pub crawler_name: String,

    /// Version of the crawler
    pub crawler_version: String,

    /// URL with information about the crawler
    #[serde(default)]
    pub contact_url: Option<String>,

    /// Email address for crawler-related contact
    #[serde(default)]
    pub contact_email: Option<String>,
}

impl UserAgentConfig {
    /// Formats the User-Agent header value
    ///
    /// Format: `CrawlerName/Version (+ContactURL; ContactEmail)`, with the
    /// parenthesised part omitted when no contact details are configured.
    pub fn header_value(&self) -> String {
        let contact: Vec<String> = [
            self.contact_url.as_ref().map(|u| format!("+{}", u)),
            self.contact_email.clone(),
        ]
        .into_iter()
        .flatten()
        .collect();

        if contact.is_empty() {
            format!("{}/{}", self.crawler_name, self.crawler_version)
        } else {
            format!(
                "{}/{} ({})",
                self.crawler_name,
                self.crawler_version,
                contact.join("; ")
            )
        }
    }
}

/// Login-page avoidance configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct LoginConfig {
    pub block_login_pages: bool,

    /// Case-insensitive substrings matched against the URL
    pub url_patterns: Vec<String>,

    /// Substrings matched against individual class tokens
    pub class_markers: Vec<String>,

    /// Case-insensitive regular expression matched against element ids
    pub id_pattern: Option<String>,
}

impl Default for LoginConfig {
    fn default() -> Self {
        Self {
            block_login_pages: true,
            url_patterns: vec!["/login".to_string()],
            class_markers: vec!["login-wrapper".to_string(), "login_wrap".to_string()],
            id_pattern: Some(r"^login(|-)?(wrap|wrapper|form|box)$".to_string()),
        }
    }
}

/// Snapshot extraction configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct SnapshotConfig {
    /// Ordered main-content selectors; the first match wins
    pub content_selectors: Vec<String>,

    /// Chrome removed from the extracted fragment
    pub strip_selectors: Vec<String>,
}

impl Default for SnapshotConfig {
    fn default() -> Self {
        Self {
            content_selectors: [
                "article",
                ".content-wrap",
                "#content",
                ".contents",
                ".board-view",
                ".sub-contents",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
            strip_selectors: [
                "nav",
                "header",
                "#header",
                ".sub-top",
                "footer",
                "#footer",
                "script",
                "style",
                ".skip",
                ".sr-only",
                "#lnb",
                ".snb.lnb-wrapper",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
        }
    }
}

/// Attachment download policy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttachmentPolicy {
    /// Record metadata only, never download
    MetadataOnly,
    /// Download only paths under an allow prefix and not under a block prefix
    Allowlist,
    /// Download everything not under a block prefix
    Blocklist,
}

impl AttachmentPolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::MetadataOnly => "metadata_only",
            Self::Allowlist => "allowlist",
            Self::Blocklist => "blocklist",
        }
    }
}

/// Attachment detection and download configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct AttachmentConfig {
    pub policy: AttachmentPolicy,
    pub allow_prefixes: Vec<String>,
    pub block_prefixes: Vec<String>,

    /// Case-insensitive substrings of href/URL that signal a download
    pub download_markers: Vec<String>,

    /// Class substrings that mark download buttons
    pub download_classes: Vec<String>,
}

impl Default for AttachmentConfig {
    fn default() -> Self {
        Self {
            policy: AttachmentPolicy::Blocklist,
            allow_prefixes: Vec::new(),
            block_prefixes: Vec::new(),
            download_markers: vec!["download".to_string(), "/cms/filedownload.do".to_string()],
            download_classes: vec!["file-down-btn".to_string()],
        }
    }
}

/// Personal-information redaction configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct PiiConfig {
    pub redact_email: bool,
    pub placeholder: String,
}

impl Default for PiiConfig {
    fn default() -> Self {
        Self {
            redact_email: true,
            placeholder: "[email redacted: see original page]".to_string(),
        }
    }
}

/// Storage backend for page and attachment logs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    /// `pages.csv` and `attachments.csv` in the data directory
    Filesystem,
    /// `crawl.db` in the data directory
    Sqlite,
}

/// Output configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct OutputConfig {
    /// Root directory for state, snapshots, cache, files and logs
    pub data_dir: PathBuf,

    pub storage: StorageBackend,

    /// Optional plain-text log file in addition to stderr
    pub log_path: Option<PathBuf>,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./data"),
            storage: StorageBackend::Filesystem,
            log_path: None,
        }
    }
}

fn default_allowed_prefixes() -> Vec<String> {
    vec!["/".to_string()]
}

fn default_true() -> bool {
    true
}
