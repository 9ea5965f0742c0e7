use url::Url;

/// Extracts the authority (`host` or `host:port`) from a URL
///
/// The port is only included when it differs from the scheme default, so
/// `https://example.org:443/` and `https://example.org/` share an authority.
///
/// # Examples
///
/// ```
/// use url::Url;
/// use snapcrawl::url::extract_authority;
///
/// let url = Url::parse("https://Example.org/path").unwrap();
/// assert_eq!(extract_authority(&url), Some("example.org".to_string()));
///
/// let url = Url::parse("http://127.0.0.1:8080/").unwrap();
/// assert_eq!(extract_authority(&url), Some("127.0.0.1:8080".to_string()));
/// ```
pub fn extract_authority(url: &Url) -> Option<String> {
    let host = url.host_str()?.to_lowercase();
    match url.port() {
        Some(port) => Some(format!("{}:{}", host, port)),
        None => Some(host),
    }
}

/// Derives the site section of a page from its first two path segments
///
/// `/news/notice/view.do` is section `news/notice`, `/about` is `about`,
/// and the root page has an empty section.
pub fn path_section(url: &Url) -> String {
    let segments: Vec<&str> = url
        .path()
        .trim_matches('/')
        .split('/')
        .filter(|s| !s.is_empty())
        .collect();

    segments
        .iter()
        .take(2)
        .copied()
        .collect::<Vec<_>>()
        .join("/")
}

/// First path segment, used to restrict sitemap traversal
pub fn first_segment(url: &Url) -> String {
    url.path()
        .trim_matches('/')
        .split('/')
        .next()
        .unwrap_or("")
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_simple_domain() {
        let url = Url::parse("https://example.com/").unwrap();
        assert_eq!(extract_authority(&url), Some("example.com".to_string()));
    }

    #[test]
    fn test_extract_with_port() {
        let url = Url::parse("https://example.com:8080/").unwrap();
        assert_eq!(extract_authority(&url), Some("example.com:8080".to_string()));
    }

    #[test]
    fn test_default_port_is_dropped() {
        let url = Url::parse("https://example.com:443/").unwrap();
        assert_eq!(extract_authority(&url), Some("example.com".to_string()));
    }

    #[test]
    fn test_extract_mixed_case() {
        let url = Url::parse("https://Example.COM/").unwrap();
        assert_eq!(extract_authority(&url), Some("example.com".to_string()));
    }

    #[test]
    fn test_path_section() {
        let section = |s: &str| path_section(&Url::parse(s).unwrap());
        assert_eq!(section("https://example.com/"), "");
        assert_eq!(section("https://example.com/about"), "about");
        assert_eq!(section("https://example.com/news/notice/view.do"), "news/notice");
        assert_eq!(section("https://example.com/news/?id=1"), "news");
    }

    #[test]
    fn test_first_segment() {
        let url = Url::parse("https://example.com/news/sitemap.xml").unwrap();
        assert_eq!(first_segment(&url), "news");
        let root = Url::parse("https://example.com/sitemap.xml").unwrap();
        assert_eq!(first_segment(&root), "sitemap.xml");
    }
}
