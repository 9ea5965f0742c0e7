//! Main-content extraction
//!
//! The fragment is serialized by walking the parsed tree instead of mutating
//! it: stripped chrome is skipped during the walk, and `mailto:` anchors are
//! rewritten on the way out when a redactor is supplied.

use crate::config::SnapshotConfig;
use crate::snapshot::EmailRedactor;
use crate::{ConfigError, ConfigResult};
use html_escape::{encode_double_quoted_attribute, encode_text};
use scraper::{ElementRef, Html, Node, Selector};

const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "source", "track",
    "wbr",
];

/// Result of extracting a page
#[derive(Debug, Clone, Default)]
pub struct Extracted {
    /// `<title>` text, trimmed; empty when missing
    pub title: String,

    /// Serialized main-content fragment, chrome removed, e-mails redacted
    pub content_html: String,

    /// Characters of whitespace-collapsed visible text in the fragment
    pub text_length: usize,

    /// Text of the `.title-area` block, when the page has one
    pub title_area: Option<String>,

    /// The content selector that matched, `None` for the body fallback
    pub matched_selector: Option<String>,
}

/// Extracts title and main content from page HTML
#[derive(Debug)]
pub struct ContentExtractor {
    content: Vec<(String, Selector)>,
    strip: Vec<Selector>,
    title: Selector,
    body: Selector,
    title_area: Selector,
}

fn parse_selector(raw: &str) -> ConfigResult<Selector> {
    Selector::parse(raw).map_err(|e| ConfigError::InvalidSelector(format!("'{}': {:?}", raw, e)))
}

impl ContentExtractor {
    pub fn from_config(config: &SnapshotConfig) -> ConfigResult<Self> {
        let content = config
            .content_selectors
            .iter()
            .map(|raw| Ok((raw.clone(), parse_selector(raw)?)))
            .collect::<ConfigResult<Vec<_>>>()?;

        let strip = config
            .strip_selectors
            .iter()
            .map(|raw| parse_selector(raw))
            .collect::<ConfigResult<Vec<_>>>()?;

        Ok(Self {
            content,
            strip,
            title: parse_selector("title")?,
            body: parse_selector("body")?,
            title_area: parse_selector(".title-area")?,
        })
    }

    /// Extracts a page
    ///
    /// # Arguments
    ///
    /// * `document` - The parsed, unmodified page
    /// * `page_url` - Used as the href of redacted `mailto:` anchors
    /// * `redactor` - E-mail redaction, `None` to keep addresses
    pub fn extract(
        &self,
        document: &Html,
        page_url: &str,
        redactor: Option<&EmailRedactor>,
    ) -> Extracted {
        let title = document
            .select(&self.title)
            .next()
            .map(|t| t.text().collect::<String>().trim().to_string())
            .unwrap_or_default();

        let title_area = document
            .select(&self.title_area)
            .next()
            .map(|el| collapse_whitespace(&el.text().collect::<Vec<_>>().join(" ")))
            .filter(|text| !text.is_empty());

        let (container, matched_selector) = self.find_container(document);

        let skip: Vec<ElementRef> = self
            .strip
            .iter()
            .flat_map(|selector| container.select(selector))
            .collect();

        let mut writer = FragmentWriter {
            skip,
            redactor,
            page_url,
            html: String::new(),
            text: String::new(),
        };
        writer.write_element(container);

        let content_html = match redactor {
            Some(redactor) => redactor.redact(&writer.html).into_owned(),
            None => writer.html,
        };

        Extracted {
            title,
            content_html,
            text_length: collapse_whitespace(&writer.text).chars().count(),
            title_area,
            matched_selector,
        }
    }

    fn find_container<'a>(&self, document: &'a Html) -> (ElementRef<'a>, Option<String>) {
        for (raw, selector) in &self.content {
            if let Some(element) = document.select(selector).next() {
                return (element, Some(raw.clone()));
            }
        }

        let fallback = document
            .select(&self.body)
            .next()
            .unwrap_or_else(|| document.root_element());
        (fallback, None)
    }
}

struct FragmentWriter<'a, 'r> {
    skip: Vec<ElementRef<'a>>,
    redactor: Option<&'r EmailRedactor>,
    page_url: &'r str,
    html: String,
    text: String,
}

impl<'a, 'r> FragmentWriter<'a, 'r> {
    fn write_element(&mut self, element: ElementRef<'a>) {
        let value = element.value();
        let name = value.name();

        if name == "a" {
            if let (Some(redactor), Some(href)) = (self.redactor, value.attr("href")) {
                if EmailRedactor::is_mailto(href) {
                    self.write_redacted_anchor(element, redactor);
                    return;
                }
            }
        }

        self.html.push('<');
        self.html.push_str(name);
        for (key, val) in sorted_attrs(element) {
            self.push_attr(key, val);
        }
        self.html.push('>');

        if VOID_ELEMENTS.contains(&name) {
            return;
        }

        let raw_text = matches!(name, "script" | "style");
        for child in element.children() {
            match child.value() {
                Node::Text(text) => {
                    if raw_text {
                        self.html.push_str(text);
                    } else {
                        self.html.push_str(&encode_text(&**text));
                        self.text.push_str(text);
                        self.text.push(' ');
                    }
                }
                Node::Element(_) => {
                    if let Some(child) = ElementRef::wrap(child) {
                        if !self.skip.contains(&child) {
                            self.write_element(child);
                        }
                    }
                }
                _ => {}
            }
        }

        self.html.push_str("</");
        self.html.push_str(name);
        self.html.push('>');
    }

    fn write_redacted_anchor(&mut self, element: ElementRef<'a>, redactor: &EmailRedactor) {
        self.html.push_str("<a");
        for (key, val) in sorted_attrs(element) {
            if key != "href" && key != "data-redacted" {
                self.push_attr(key, val);
            }
        }
        let page_url = self.page_url;
        self.push_attr("href", page_url);
        self.push_attr("data-redacted", "email");
        self.html.push('>');
        self.html.push_str(&encode_text(redactor.placeholder()));
        self.html.push_str("</a>");

        for text in element.text() {
            self.text.push_str(text);
            self.text.push(' ');
        }
    }

    fn push_attr(&mut self, key: &str, val: &str) {
        self.html.push(' ');
        self.html.push_str(key);
        self.html.push_str("=\"");
        self.html.push_str(&encode_double_quoted_attribute(val));
        self.html.push('"');
    }
}

/// Attributes in name order, so identical pages serialize identically
fn sorted_attrs<'a>(element: ElementRef<'a>) -> Vec<(&'a str, &'a str)> {
    let mut attrs: Vec<_> = element.value().attrs().collect();
    attrs.sort();
    attrs
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
