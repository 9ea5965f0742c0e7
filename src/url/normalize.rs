use crate::{UrlError, UrlResult};
use url::Url;

/// Query parameters dropped when nothing else is configured
pub const DEFAULT_VOLATILE_PARAMS: &[&str] = &["article.offset", "offset"];

/// Canonicalizes URLs so that every page has exactly one spelling
///
/// # Normalization Steps
///
/// 1. Resolve the href against the base URL
/// 2. Reject anything that is not http or https
/// 3. Remove the fragment (everything after #)
/// 4. Remove volatile query parameters (pagination offsets and the like)
/// 5. Sort remaining query parameters by key, then value
/// 6. Remove the empty query string (trailing ?)
///
/// Applying the normalizer to its own output is a no-op.
#[derive(Debug, Clone)]
pub struct UrlNormalizer {
    volatile_params: Vec<String>,
}

impl Default for UrlNormalizer {
    fn default() -> Self {
        Self::new(DEFAULT_VOLATILE_PARAMS.iter().map(|p| p.to_string()))
    }
}

impl UrlNormalizer {
    /// Creates a normalizer that drops the given query parameters
    pub fn new<I, S>(volatile_params: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            volatile_params: volatile_params.into_iter().map(Into::into).collect(),
        }
    }

    /// Normalizes a possibly-relative href against a base URL
    ///
    /// # Examples
    ///
    /// ```
    /// use snapcrawl::url::UrlNormalizer;
    /// use url::Url;
    ///
    /// let normalizer = UrlNormalizer::default();
    /// let base = Url::parse("https://example.org/a").unwrap();
    /// let url = normalizer.normalize("/a?offset=20&foo=1#top", &base).unwrap();
    /// assert_eq!(url.as_str(), "https://example.org/a?foo=1");
    /// ```
    pub fn normalize(&self, href: &str, base: &Url) -> UrlResult<Url> {
        let mut url = base
            .join(href.trim())
            .map_err(|e| UrlError::Parse(format!("{}: {}", href, e)))?;

        if url.scheme() != "http" && url.scheme() != "https" {
            return Err(UrlError::InvalidScheme(url.scheme().to_string()));
        }

        if url.host_str().is_none() {
            return Err(UrlError::MissingDomain);
        }

        url.set_fragment(None);

        if url.query().is_some() {
            let params = self.filter_and_sort_query_params(&url);
            if params.is_empty() {
                url.set_query(None);
            } else {
                url.query_pairs_mut().clear().extend_pairs(params);
            }
        }

        Ok(url)
    }

    /// Normalizes an absolute URL string
    pub fn normalize_absolute(&self, url: &str) -> UrlResult<Url> {
        let parsed = Url::parse(url.trim()).map_err(|e| UrlError::Parse(format!("{}: {}", url, e)))?;
        self.normalize(parsed.as_str(), &parsed)
    }

    /// Filters out volatile parameters and sorts the rest
    fn filter_and_sort_query_params(&self, url: &Url) -> Vec<(String, String)> {
        let mut params: Vec<(String, String)> = url
            .query_pairs()
            .filter(|(key, _)| !self.is_volatile(key))
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect();

        params.sort();
        params
    }

    fn is_volatile(&self, key: &str) -> bool {
        self.volatile_params.iter().any(|p| p == key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> Url {
        Url::parse("https://example.org/dir/page").unwrap()
    }

    fn norm(href: &str) -> String {
        UrlNormalizer::default()
            .normalize(href, &base())
            .unwrap()
            .to_string()
    }

    #[test]
    fn test_resolve_relative() {
        assert_eq!(norm("other"), "https://example.org/dir/other");
        assert_eq!(norm("../up"), "https://example.org/up");
        assert_eq!(norm("/root"), "https://example.org/root");
    }

    #[test]
    fn test_strip_fragment() {
        assert_eq!(norm("/a#section"), "https://example.org/a");
    }

    #[test]
    fn test_remove_volatile_params() {
        assert_eq!(norm("/a?offset=20"), "https://example.org/a");
        assert_eq!(
            norm("/list?article.offset=10&articleNo=5"),
            "https://example.org/list?articleNo=5"
        );
    }

    #[test]
    fn test_sort_query_params() {
        assert_eq!(norm("/a?z=1&b=2&m=3"), "https://example.org/a?b=2&m=3&z=1");
    }

    #[test]
    fn test_volatile_example_collapses() {
        let a = norm("https://example.org/a?foo=1&offset=20");
        let b = norm("https://example.org/a?offset=40&foo=1#x");
        assert_eq!(a, "https://example.org/a?foo=1");
        assert_eq!(a, b);
    }

    #[test]
    fn test_custom_volatile_params() {
        let normalizer = UrlNormalizer::new(["page"]);
        let url = normalizer.normalize("/a?page=3&offset=1", &base()).unwrap();
        assert_eq!(url.as_str(), "https://example.org/a?offset=1");
    }

    #[test]
    fn test_reject_non_http() {
        let normalizer = UrlNormalizer::default();
        assert!(matches!(
            normalizer.normalize("mailto:someone@example.org", &base()),
            Err(UrlError::InvalidScheme(_))
        ));
        assert!(matches!(
            normalizer.normalize("javascript:void(0)", &base()),
            Err(UrlError::InvalidScheme(_))
        ));
    }

    #[test]
    fn test_fixed_point() {
        let normalizer = UrlNormalizer::default();
        let samples = [
            "/a?foo=1&offset=20",
            "/search?q=hello world&lang=en",
            "/b?x=%2F&y=a+b#frag",
            "../c/./d?k=&k=2&k=1",
            "https://example.org:8443/e?%ED%95%9C=%EA%B8%80",
            "/",
        ];
        for href in samples {
            let once = normalizer.normalize(href, &base()).unwrap();
            let twice = normalizer.normalize(once.as_str(), &base()).unwrap();
            assert_eq!(once, twice, "not idempotent for {}", href);
        }
    }

    #[test]
    fn test_normalize_absolute() {
        let normalizer = UrlNormalizer::default();
        let url = normalizer
            .normalize_absolute("https://example.org/a?b=2&a=1#f")
            .unwrap();
        assert_eq!(url.as_str(), "https://example.org/a?a=1&b=2");
        assert!(normalizer.normalize_absolute("not a url").is_err());
    }
}
