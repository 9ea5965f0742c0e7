//! Sitemap seeding
//!
//! Sitemaps are read with quick_xml for their `<loc>` and `<lastmod>` values.
//! Both `<sitemapindex>` and `<urlset>` documents are handled; an index is
//! traversed breadth-first, optionally restricted to child sitemaps whose
//! first path segment is an allowed section.

use crate::crawler::fetcher::Fetcher;
use crate::url::{extract_authority, first_segment};
use html_escape::decode_html_entities;
use quick_xml::events::{BytesText, Event};
use quick_xml::reader::Reader;
use std::collections::{HashMap, HashSet, VecDeque};
use url::Url;

/// Upper bound on sitemap documents fetched for one seeding pass
const MAX_SITEMAP_DOCUMENTS: usize = 1000;

/// One page listed in a sitemap
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SitemapEntry {
    pub url: String,
    /// W3C datetime as written in the sitemap
    pub lastmod: Option<String>,
}

/// A parsed sitemap document
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SitemapDocument {
    /// `<sitemapindex>`: locations of child sitemaps
    Index(Vec<String>),
    /// `<urlset>`: page entries
    UrlSet(Vec<SitemapEntry>),
}

/// Parses a sitemap or sitemap index
///
/// A malformed document yields whatever was read before the error.
pub fn parse_sitemap(xml: &str) -> SitemapDocument {
    let mut reader = Reader::from_str(xml);
    reader.check_end_names(false);

    let mut is_index = false;
    let mut children = Vec::new();
    let mut entries = Vec::new();
    let mut bare_locs = Vec::new();

    let mut entry: Option<PartialEntry> = None;
    let mut field: Option<Field> = None;
    let mut text = String::new();

    loop {
        let event = match reader.read_event() {
            Ok(event) => event,
            Err(e) => {
                tracing::debug!(
                    position = reader.buffer_position(),
                    error = %e,
                    "Malformed sitemap XML"
                );
                break;
            }
        };

        match event {
            Event::Start(ref e) => match e.local_name().as_ref() {
                b"sitemapindex" => is_index = true,
                b"url" | b"sitemap" => entry = Some(PartialEntry::default()),
                b"loc" => {
                    field = Some(Field::Loc);
                    text.clear();
                }
                b"lastmod" => {
                    field = Some(Field::Lastmod);
                    text.clear();
                }
                _ => {}
            },
            Event::Text(ref e) => {
                if field.is_some() {
                    text.push_str(&unescape_text(e));
                }
            }
            Event::CData(ref e) => {
                if field.is_some() {
                    text.push_str(&String::from_utf8_lossy(e));
                }
            }
            Event::End(ref e) => match e.local_name().as_ref() {
                b"loc" | b"lastmod" => {
                    let value = text.trim().to_string();
                    match (field.take(), entry.as_mut()) {
                        _ if value.is_empty() => {}
                        (Some(Field::Loc), Some(entry)) => {
                            entry.loc.get_or_insert(value);
                        }
                        (Some(Field::Loc), None) => bare_locs.push(value),
                        (Some(Field::Lastmod), Some(entry)) => {
                            entry.lastmod.get_or_insert(value);
                        }
                        _ => {}
                    }
                }
                b"sitemap" => {
                    if let Some(loc) = entry.take().and_then(|e| e.loc) {
                        children.push(loc);
                    }
                }
                b"url" => {
                    if let Some(PartialEntry {
                        loc: Some(url),
                        lastmod,
                    }) = entry.take()
                    {
                        entries.push(SitemapEntry { url, lastmod });
                    }
                }
                _ => {}
            },
            Event::Eof => break,
            _ => {}
        }
    }

    if is_index {
        return SitemapDocument::Index(children);
    }

    // Bare <loc> lists without <url> wrappers
    if entries.is_empty() {
        entries = bare_locs
            .into_iter()
            .map(|url| SitemapEntry { url, lastmod: None })
            .collect();
    }

    SitemapDocument::UrlSet(entries)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Field {
    Loc,
    Lastmod,
}

#[derive(Debug, Default)]
struct PartialEntry {
    loc: Option<String>,
    lastmod: Option<String>,
}

/// XML entities first; HTML named entities some CMSs emit as a fallback
fn unescape_text(text: &BytesText) -> String {
    match text.unescape() {
        Ok(value) => value.into_owned(),
        Err(_) => decode_html_entities(&String::from_utf8_lossy(text)).into_owned(),
    }
}

/// Collects every page entry reachable from a sitemap index
///
/// Fetch failures of individual sitemaps are logged and skipped. Entries are
/// deduplicated by URL (the last listing wins) and returned newest `lastmod`
/// first; entries without `lastmod` come last, in document order.
pub async fn collect_sitemap_entries(
    fetcher: &Fetcher,
    index: &Url,
    allow_sections: Option<&[String]>,
) -> Vec<SitemapEntry> {
    let index_authority = extract_authority(index);
    let mut pending = VecDeque::from([index.clone()]);
    let mut visited: HashSet<String> = HashSet::new();
    let mut order: Vec<String> = Vec::new();
    let mut lastmods: HashMap<String, Option<String>> = HashMap::new();

    while let Some(sitemap_url) = pending.pop_front() {
        if !visited.insert(sitemap_url.to_string()) {
            continue;
        }
        if visited.len() > MAX_SITEMAP_DOCUMENTS {
            tracing::warn!(
                limit = MAX_SITEMAP_DOCUMENTS,
                "Sitemap document limit reached, ignoring the rest"
            );
            break;
        }

        let Some(xml) = fetcher.fetch_text(&sitemap_url).await else {
            continue;
        };

        match parse_sitemap(&xml) {
            SitemapDocument::Index(locs) => {
                tracing::debug!(sitemap = %sitemap_url, children = locs.len(), "Parsed sitemap index");
                for loc in locs {
                    let Some(child) = canonical_loc(&loc, index) else {
                        tracing::debug!(loc = %loc, "Skipping unparseable sitemap location");
                        continue;
                    };
                    if extract_authority(&child) != index_authority {
                        tracing::debug!(loc = %child, "Skipping off-site sitemap");
                        continue;
                    }
                    if let Some(sections) = allow_sections {
                        let section = first_segment(&child);
                        if !sections.iter().any(|s| *s == section) {
                            continue;
                        }
                    }
                    pending.push_back(child);
                }
            }
            SitemapDocument::UrlSet(entries) => {
                tracing::debug!(sitemap = %sitemap_url, entries = entries.len(), "Parsed sitemap");
                for entry in entries {
                    let Some(url) = canonical_loc(&entry.url, index) else {
                        continue;
                    };
                    let url = url.to_string();
                    if !lastmods.contains_key(&url) {
                        order.push(url.clone());
                    }
                    lastmods.insert(url, entry.lastmod);
                }
            }
        }
    }

    let mut entries: Vec<SitemapEntry> = order
        .into_iter()
        .map(|url| {
            let lastmod = lastmods.remove(&url).flatten();
            SitemapEntry { url, lastmod }
        })
        .collect();

    sort_newest_first(&mut entries);
    entries
}

/// Stable sort, newest `lastmod` first, missing values last
pub fn sort_newest_first(entries: &mut [SitemapEntry]) {
    entries.sort_by(|a, b| {
        let a = a.lastmod.as_deref().unwrap_or("");
        let b = b.lastmod.as_deref().unwrap_or("");
        b.cmp(a)
    });
}

/// Repairs a `<loc>` value and parses it
///
/// Some CMSs prepend their own origin to an already absolute URL
/// (`http://hosthttps://host/path`); the last embedded absolute URL is kept.
/// A location on the index's host takes the index's scheme.
fn canonical_loc(loc: &str, index: &Url) -> Option<Url> {
    let head = loc.split('?').next().unwrap_or(loc);
    let start = ["http://", "https://"]
        .iter()
        .filter_map(|scheme| head.rfind(scheme))
        .max()
        .unwrap_or(0);

    let mut url = Url::parse(&loc[start..]).ok()?;
    if url.host_str() == index.host_str()
        && url.port() == index.port()
        && url.scheme() != index.scheme()
    {
        let rebuilt = format!(
            "{}{}",
            index.origin().ascii_serialization(),
            &url[url::Position::BeforePath..]
        );
        url = Url::parse(&rebuilt).ok()?;
    }
    Some(url)
}
