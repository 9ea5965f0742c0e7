//! Link and attachment classification
//!
//! This module splits the anchors of a fetched page into:
//! - Followable links, candidates for the frontier
//! - Attachments, links that signal download intent
//!
//! Classification runs on the original page HTML, not the snapshot fragment.

use crate::config::AttachmentConfig;
use crate::url::UrlNormalizer;
use crate::ConfigResult;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use std::collections::HashSet;
use std::sync::OnceLock;
use url::{Position, Url};

static RE_ATTACHMENT_EXT: OnceLock<Regex> = OnceLock::new();

fn attachment_ext_regex() -> &'static Regex {
    RE_ATTACHMENT_EXT.get_or_init(|| {
        Regex::new(r"(?i)\.(hwpx|hwp|pdf|docx?|xlsx?|pptx?|zip|png|jpe?g)$")
            .expect("attachment extension regex")
    })
}

/// Lowercase attachment extension at the end of a path or link text
///
/// # Example
///
/// ```
/// use snapcrawl::crawler::attachment_extension;
///
/// assert_eq!(attachment_extension("/files/Plan.HWP"), Some("hwp".to_string()));
/// assert_eq!(attachment_extension("/board/view.do"), None);
/// ```
pub fn attachment_extension(text: &str) -> Option<String> {
    attachment_ext_regex()
        .captures(text.trim())
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_ascii_lowercase())
}

/// A link with download intent
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttachmentCandidate {
    /// Normalized absolute URL
    pub url: Url,

    /// Anchor text, whitespace collapsed
    pub text: String,

    /// Extension from the URL path, else from the link text
    pub ext: Option<String>,
}

/// Anchors of one page, classified
#[derive(Debug, Clone, Default)]
pub struct ClassifiedLinks {
    /// Normalized links in document order, each listed once
    pub followable: Vec<Url>,

    /// Download-intent links in document order, each URL listed once
    pub attachments: Vec<AttachmentCandidate>,
}

/// Classifies page anchors into followable links and attachments
///
/// # Link Rules
///
/// **Excluded:**
/// - `mailto:`, `javascript:`, `tel:`, `data:` hrefs
/// - Fragment-only hrefs (same page anchors)
/// - Hrefs that do not normalize to an http(s) URL
///
/// **Download intent** (any of):
/// - The anchor has a `download` attribute
/// - The relative href, or the path and query of the URL, contains a
///   download marker
/// - The anchor class contains a download class
/// - The href, URL path or link text ends in an attachment extension
#[derive(Debug, Clone)]
pub struct LinkClassifier {
    normalizer: UrlNormalizer,
    markers: Vec<String>,
    classes: Vec<String>,
    anchor: Selector,
}

impl LinkClassifier {
    pub fn new(normalizer: UrlNormalizer, config: &AttachmentConfig) -> ConfigResult<Self> {
        let anchor = Selector::parse("a[href]")
            .map_err(|e| crate::ConfigError::InvalidSelector(format!("a[href]: {:?}", e)))?;

        Ok(Self {
            normalizer,
            markers: lowercase_all(&config.download_markers),
            classes: lowercase_all(&config.download_classes),
            anchor,
        })
    }

    /// Classifies every anchor of a page
    ///
    /// # Arguments
    ///
    /// * `document` - The parsed original page
    /// * `page_url` - The page URL, used to resolve relative hrefs
    pub fn classify(&self, document: &Html, page_url: &Url) -> ClassifiedLinks {
        let mut links = ClassifiedLinks::default();
        let mut seen_links: HashSet<String> = HashSet::new();
        let mut seen_attachments: HashSet<String> = HashSet::new();

        for element in document.select(&self.anchor) {
            let Some(href) = element.value().attr("href").map(str::trim) else {
                continue;
            };
            if is_excluded_href(href) {
                continue;
            }

            let url = match self.normalizer.normalize(href, page_url) {
                Ok(url) => url,
                Err(e) => {
                    tracing::debug!(href = %href, page = %page_url, error = %e, "Skipping link");
                    continue;
                }
            };

            let text = collapse_whitespace(&element.text().collect::<String>());

            if self.is_download_intent(&element, href, &url, &text) {
                if seen_attachments.insert(url.to_string()) {
                    let ext = attachment_extension(url.path()).or_else(|| attachment_extension(&text));
                    links.attachments.push(AttachmentCandidate { url, text, ext });
                }
            } else if seen_links.insert(url.to_string()) {
                links.followable.push(url);
            }
        }

        links
    }

    fn is_download_intent(&self, element: &ElementRef, href: &str, url: &Url, text: &str) -> bool {
        if element.value().attr("download").is_some() {
            return true;
        }

        // Markers never match the host: absolute hrefs count through the
        // resolved path and query only
        let href_lower = if has_authority(href) {
            String::new()
        } else {
            href.to_ascii_lowercase()
        };
        let target_lower = url[Position::BeforePath..].to_ascii_lowercase();
        if self
            .markers
            .iter()
            .any(|m| href_lower.contains(m.as_str()) || target_lower.contains(m.as_str()))
        {
            return true;
        }

        let class = element.value().attr("class").unwrap_or("").to_ascii_lowercase();
        if self.classes.iter().any(|c| class.contains(c.as_str())) {
            return true;
        }

        attachment_extension(href).is_some()
            || attachment_extension(url.path()).is_some()
            || attachment_extension(text).is_some()
    }
}

fn is_excluded_href(href: &str) -> bool {
    if href.is_empty() || href.starts_with('#') {
        return true;
    }
    let lower = href.to_ascii_lowercase();
    ["mailto:", "javascript:", "tel:", "data:"]
        .iter()
        .any(|scheme| lower.starts_with(scheme))
}

/// True for `scheme://…` and protocol-relative `//…` hrefs
fn has_authority(href: &str) -> bool {
    href.starts_with("//") || Url::parse(href).is_ok()
}

fn lowercase_all(values: &[String]) -> Vec<String> {
    values
        .iter()
        .map(|v| v.to_lowercase())
        .filter(|v| !v.is_empty())
        .collect()
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn classifier() -> LinkClassifier {
        LinkClassifier::new(UrlNormalizer::default(), &AttachmentConfig::default()).unwrap()
    }

    fn base_url() -> Url {
        Url::parse("https://example.com/board/list").unwrap()
    }

    fn classify(html: &str) -> ClassifiedLinks {
        classifier().classify(&Html::parse_document(html), &base_url())
    }

    fn followable(links: &ClassifiedLinks) -> Vec<&str> {
        links.followable.iter().map(|u| u.as_str()).collect()
    }

    #[test]
    fn test_relative_links_resolve_against_page() {
        let links = classify(
            r#"<html><body><a href="/other">A</a><a href="view?id=2">B</a></body></html>"#,
        );
        assert_eq!(
            followable(&links),
            vec!["https://example.com/other", "https://example.com/board/view?id=2"]
        );
        assert!(links.attachments.is_empty());
    }

    #[test]
    fn test_skip_special_schemes_and_fragments() {
        let links = classify(
            r##"<html><body>
                <a href="javascript:void(0)">js</a>
                <a href="MAILTO:test@example.com">mail</a>
                <a href="tel:+1234567890">call</a>
                <a href="data:text/html,x">data</a>
                <a href="#section">jump</a>
                <a href="">empty</a>
                <a href="ftp://example.com/file">ftp</a>
            </body></html>"##,
        );
        assert!(links.followable.is_empty());
        assert!(links.attachments.is_empty());
    }

    #[test]
    fn test_links_are_normalized_and_deduplicated() {
        let links = classify(
            r#"<html><body>
                <a href="/a?foo=1&offset=20">one</a>
                <a href="/a?foo=1#top">two</a>
                <a href="https://example.com/a?foo=1">three</a>
            </body></html>"#,
        );
        assert_eq!(followable(&links), vec!["https://example.com/a?foo=1"]);
    }

    #[test]
    fn test_download_intent_signals() {
        let links = classify(
            r#"<html><body>
                <a href="/files/plan.HWP">plan</a>
                <a href="/cms/fileDownload.do?id=7">form</a>
                <a href="/get?id=8" class="btn file-down-btn">get</a>
                <a href="/get?id=9" download>save</a>
                <a href="/get?id=10">minutes.pdf</a>
                <a href="/page">page</a>
            </body></html>"#,
        );

        let urls: Vec<&str> = links.attachments.iter().map(|a| a.url.as_str()).collect();
        assert_eq!(
            urls,
            vec![
                "https://example.com/files/plan.HWP",
                "https://example.com/cms/fileDownload.do?id=7",
                "https://example.com/get?id=8",
                "https://example.com/get?id=9",
                "https://example.com/get?id=10",
            ]
        );
        assert_eq!(links.attachments[0].ext.as_deref(), Some("hwp"));
        assert_eq!(links.attachments[1].ext, None);
        assert_eq!(links.attachments[4].ext.as_deref(), Some("pdf"));
        assert_eq!(links.attachments[4].text, "minutes.pdf");
        assert_eq!(followable(&links), vec!["https://example.com/page"]);
    }

    #[test]
    fn test_marker_in_host_is_not_download_intent() {
        let base = Url::parse("https://download.example.com/").unwrap();
        let links = classifier().classify(
            &Html::parse_document(
                r#"<html><body>
                    <a href="/news/1">News</a>
                    <a href="https://download.example.com/about">About</a>
                    <a href="//download.example.com/contact">Contact</a>
                    <a href="https://download.example.com/download/7">File</a>
                </body></html>"#,
            ),
            &base,
        );

        assert_eq!(
            followable(&links),
            vec![
                "https://download.example.com/news/1",
                "https://download.example.com/about",
                "https://download.example.com/contact",
            ]
        );
        let urls: Vec<&str> = links.attachments.iter().map(|a| a.url.as_str()).collect();
        assert_eq!(urls, vec!["https://download.example.com/download/7"]);
    }

    #[test]
    fn test_attachments_deduplicated_per_page() {
        let links = classify(
            r#"<html><body>
                <a href="/f/report.pdf">Report</a>
                <a href="/f/report.pdf">  Report   (PDF) </a>
            </body></html>"#,
        );
        assert_eq!(links.attachments.len(), 1);
        assert_eq!(links.attachments[0].text, "Report");
    }

    #[test]
    fn test_attachment_extension() {
        assert_eq!(attachment_extension("a.jpeg"), Some("jpeg".to_string()));
        assert_eq!(attachment_extension("a.docx "), Some("docx".to_string()));
        assert_eq!(attachment_extension("a.pdf?x=1"), None);
        assert_eq!(attachment_extension("archive.tar"), None);
    }
}
