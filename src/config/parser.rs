use crate::config::types::Config;
use crate::config::validation::validate;
use crate::ConfigError;
use sha2::{Digest, Sha256};
use std::path::Path;

/// Loads and parses a configuration file from the given path
///
/// # Arguments
///
/// * `path` - Path to the TOML configuration file
///
/// # Returns
///
/// * `Ok(Config)` - Successfully loaded and validated configuration
/// * `Err(ConfigError)` - Failed to load, parse, or validate the configuration
///
/// # Example
///
/// ```no_run
/// use std::path::Path;
/// use snapcrawl::config::load_config;
///
/// let config = load_config(Path::new("crawl.toml")).unwrap();
/// println!("Domain: {}", config.site.domain);
/// ```
pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
    let content = std::fs::read_to_string(path)?;
    parse_config(&content)
}

/// Parses and validates configuration from TOML text
pub fn parse_config(content: &str) -> Result<Config, ConfigError> {
    let config: Config = toml::from_str(content)?;
    validate(&config)?;
    Ok(config)
}

/// Computes a SHA-256 hash of the configuration file content
///
/// Logged at startup so a crawl run can be tied to the exact settings it
/// ran with.
///
/// # Arguments
///
/// * `path` - Path to the TOML configuration file
///
/// # Returns
///
/// * `Ok(String)` - Hex-encoded SHA-256 hash of the file content
/// * `Err(ConfigError)` - Failed to read the file
pub fn compute_config_hash(path: &Path) -> Result<String, ConfigError> {
    let content = std::fs::read_to_string(path)?;
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    let result = hasher.finalize();
    Ok(hex::encode(result))
}

/// Loads a configuration and returns both the config and its hash
pub fn load_config_with_hash(path: &Path) -> Result<(Config, String), ConfigError> {
    let config = load_config(path)?;
    let hash = compute_config_hash(path)?;
    Ok((config, hash))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{AttachmentPolicy, StorageBackend};
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn create_temp_config(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file.flush().unwrap();
        file
    }

    const MINIMAL: &str = r#"
[site]
domain = "www.example.org"
start-url = "https://www.example.org/"

[user-agent]
crawler-name = "TestCrawler"
crawler-version = "1.0"
"#;

    #[test]
    fn test_load_minimal_config_uses_defaults() {
        let file = create_temp_config(MINIMAL);
        let config = load_config(file.path()).unwrap();

        assert_eq!(config.site.domain, "www.example.org");
        assert_eq!(config.site.allowed_path_prefixes, vec!["/".to_string()]);
        assert!(config.site.robots_fail_open);
        assert_eq!(config.crawler.request_timeout_secs, 10);
        assert_eq!(config.crawler.state_save_interval, 50);
        assert_eq!(config.attachments.policy, AttachmentPolicy::Blocklist);
        assert_eq!(config.output.storage, StorageBackend::Filesystem);
        assert!(config.login.block_login_pages);
        assert!(config.pii.redact_email);
    }

    #[test]
    fn test_load_full_config() {
        let config_content = r#"
[site]
domain = "www.example.org"
start-url = "https://www.example.org/"
sitemap-index = "https://www.example.org/sitemap.xml"
allow-sections = ["news"]
allowed-path-prefixes = ["/news", "/about"]
deny-patterns = ["\\?mode=print"]
robots-fail-open = false

[crawler]
request-timeout-secs = 5
request-sleep-secs = 1.5
max-pages = 20
max-requests-per-run = 40
volatile-params = ["offset"]
retry-failed = true

[user-agent]
crawler-name = "TestCrawler"
crawler-version = "1.0"
contact-email = "admin@example.org"

[attachments]
policy = "allowlist"
allow-prefixes = ["/files"]

[pii]
redact-email = false

[output]
data-dir = "/tmp/crawl"
storage = "sqlite"
"#;

        let file = create_temp_config(config_content);
        let config = load_config(file.path()).unwrap();

        assert_eq!(config.site.allowed_path_prefixes.len(), 2);
        assert!(!config.site.robots_fail_open);
        assert_eq!(config.crawler.max_pages, 20);
        assert_eq!(config.crawler.volatile_params, vec!["offset".to_string()]);
        // Unset keys inside a present table still get their defaults
        assert_eq!(config.crawler.state_save_interval, 50);
        assert_eq!(config.attachments.policy, AttachmentPolicy::Allowlist);
        assert_eq!(config.attachments.download_classes, vec!["file-down-btn"]);
        assert!(!config.pii.redact_email);
        assert_eq!(config.output.storage, StorageBackend::Sqlite);
    }

    #[test]
    fn test_load_config_with_invalid_path() {
        let result = load_config(Path::new("/nonexistent/config.toml"));
        assert!(matches!(result, Err(ConfigError::Io(_))));
    }

    #[test]
    fn test_load_config_with_invalid_toml() {
        let file = create_temp_config("this is not valid TOML {{{");
        let result = load_config(file.path());
        assert!(matches!(result, Err(ConfigError::Parse(_))));
    }

    #[test]
    fn test_unknown_policy_is_rejected() {
        let content = format!("{}\n[attachments]\npolicy = \"everything\"\n", MINIMAL);
        assert!(matches!(parse_config(&content), Err(ConfigError::Parse(_))));
    }

    #[test]
    fn test_load_config_with_validation_error() {
        let content = format!("{}\n[crawler]\nstate-save-interval = 0\n", MINIMAL);
        let result = parse_config(&content);
        assert!(matches!(result, Err(ConfigError::Validation(_))));
    }

    #[test]
    fn test_compute_config_hash() {
        let file = create_temp_config("test content");

        let hash1 = compute_config_hash(file.path()).unwrap();
        let hash2 = compute_config_hash(file.path()).unwrap();

        assert_eq!(hash1, hash2);
        assert_eq!(hash1.len(), 64);
    }

    #[test]
    fn test_different_content_different_hash() {
        let file1 = create_temp_config("content 1");
        let file2 = create_temp_config("content 2");

        let hash1 = compute_config_hash(file1.path()).unwrap();
        let hash2 = compute_config_hash(file2.path()).unwrap();

        assert_ne!(hash1, hash2);
    }
}
