// src/ingest/providers/feed.rs
//! RSS 2.0 / RSS 1.0 / Atom adapter.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use encoding_rs::{Encoding, UTF_8};
use once_cell::sync::OnceCell;
use quick_xml::events::{BytesStart, BytesText, Event};
use quick_xml::name::{Namespace, ResolveResult};
use quick_xml::NsReader;
use regex::Regex;

use crate::error::ImportError;
use crate::http::{HttpClient, RequestOptions};
use crate::ingest::types::{ImportSummary, Item, ItemSink, SourceAdapter, SourceConfig, SourceKind};
use crate::ingest::{clean_text, excerpt, image, parse_timestamp, EXCERPT_LEN};

use super::limit_reached;

const ATOM_NS: &[u8] = b"http://www.w3.org/2005/Atom";
const MEDIA_NS: &[u8] = b"http://search.yahoo.com/mrss/";
const CONTENT_NS: &[u8] = b"http://purl.org/rss/1.0/modules/content/";
const DC_NS: &[u8] = b"http://purl.org/dc/elements/1.1/";
const RSS1_NS: &[u8] = b"http://purl.org/rss/1.0/";

const ACCEPT: &str = "application/rss+xml, application/atom+xml, application/xml;q=0.9, */*;q=0.8";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaContent {
    pub url: String,
    pub mime: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Enclosure {
    pub url: String,
    pub mime: Option<String>,
}

/// One `<item>`/`<entry>` as read from the document, before normalization.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FeedEntry {
    pub title: Option<String>,
    pub link: Option<String>,
    pub guid: Option<String>,
    /// RSS `<description>`.
    pub description: Option<String>,
    /// `content:encoded` or Atom `<content>`.
    pub encoded_content: Option<String>,
    /// Atom `<summary>`.
    pub summary: Option<String>,
    pub author: Option<String>,
    pub published: Option<String>,
    pub updated: Option<String>,
    pub media_thumbnail: Option<String>,
    pub media_content: Vec<MediaContent>,
    pub enclosure: Option<Enclosure>,
}

impl FeedEntry {
    /// Full body: encoded content, falling back to description then summary.
    pub fn content(&self) -> Option<&str> {
        self.encoded_content
            .as_deref()
            .or(self.description.as_deref())
            .or(self.summary.as_deref())
    }

    /// Short body: description or summary, falling back to full content.
    pub fn short_description(&self) -> Option<&str> {
        self.description
            .as_deref()
            .or(self.summary.as_deref())
            .or(self.encoded_content.as_deref())
    }

    pub fn permalink(&self) -> Option<&str> {
        self.link
            .as_deref()
            .or(self.guid.as_deref())
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }

    /// `None` when the entry has nothing to dedup on.
    pub fn to_item(&self) -> Option<Item> {
        let permalink = self.permalink()?.to_string();
        let content = self.content().unwrap_or_default().to_string();
        let summary = self
            .short_description()
            .filter(|s| *s != content)
            .map(str::to_string);

        Some(Item {
            title: clean_text(self.title.as_deref().unwrap_or_default()),
            excerpt: excerpt(&content, EXCERPT_LEN),
            content,
            permalink,
            author: self
                .author
                .as_deref()
                .map(clean_text)
                .filter(|a| !a.is_empty()),
            published_at: self
                .published
                .as_deref()
                .or(self.updated.as_deref())
                .and_then(parse_timestamp)
                .unwrap_or_else(Utc::now),
            image_url: image::resolve_feed(self),
            summary,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Ns {
    None,
    Atom,
    Media,
    Content,
    Dc,
    Rss1,
    Other,
}

fn classify(ns: &ResolveResult) -> Ns {
    match ns {
        ResolveResult::Unbound => Ns::None,
        ResolveResult::Bound(Namespace(uri)) => match *uri {
            ATOM_NS => Ns::Atom,
            MEDIA_NS => Ns::Media,
            CONTENT_NS => Ns::Content,
            DC_NS => Ns::Dc,
            RSS1_NS => Ns::Rss1,
            _ => Ns::Other,
        },
        ResolveResult::Unknown(_) => Ns::Other,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Field {
    Title,
    Link,
    Guid,
    Description,
    Encoded,
    Summary,
    Author,
    Published,
    Updated,
}

/// Field captured from a direct child of an item, keyed by namespace + local name.
fn child_field(ns: Ns, local: &[u8]) -> Option<Field> {
    match (ns, local) {
        (Ns::None | Ns::Rss1 | Ns::Atom, b"title") => Some(Field::Title),
        (Ns::None | Ns::Rss1, b"link") => Some(Field::Link),
        (Ns::None, b"guid") | (Ns::Atom, b"id") => Some(Field::Guid),
        (Ns::None | Ns::Rss1, b"description") => Some(Field::Description),
        (Ns::Content, b"encoded") | (Ns::Atom, b"content") => Some(Field::Encoded),
        (Ns::Atom, b"summary") => Some(Field::Summary),
        (Ns::None, b"author") | (Ns::Dc, b"creator") => Some(Field::Author),
        (Ns::None, b"pubDate") | (Ns::Atom, b"published") | (Ns::Dc, b"date") => {
            Some(Field::Published)
        }
        (Ns::Atom, b"updated") => Some(Field::Updated),
        _ => None,
    }
}

fn attr(e: &BytesStart, name: &[u8]) -> Option<String> {
    e.attributes()
        .flatten()
        .find(|a| a.key.local_name().as_ref() == name)
        .and_then(|a| a.unescape_value().ok().map(|v| v.trim().to_string()))
        .filter(|v| !v.is_empty())
}

fn set_once(slot: &mut Option<String>, value: String) {
    let value = value.trim();
    if slot.is_none() && !value.is_empty() {
        *slot = Some(value.to_string());
    }
}

impl FeedEntry {
    fn commit(&mut self, field: Field, value: String) {
        let slot = match field {
            Field::Title => &mut self.title,
            Field::Link => &mut self.link,
            Field::Guid => &mut self.guid,
            Field::Description => &mut self.description,
            Field::Encoded => &mut self.encoded_content,
            Field::Summary => &mut self.summary,
            Field::Author => &mut self.author,
            Field::Published => &mut self.published,
            Field::Updated => &mut self.updated,
        };
        set_once(slot, value);
    }

    /// Attribute-only elements: Atom links, enclosures, media namespace.
    fn absorb_attributes(&mut self, ns: Ns, local: &[u8], e: &BytesStart, direct_child: bool) {
        match (ns, local) {
            (Ns::Media, b"thumbnail") => {
                if self.media_thumbnail.is_none() {
                    self.media_thumbnail = attr(e, b"url");
                }
            }
            (Ns::Media, b"content") => {
                if let Some(url) = attr(e, b"url") {
                    self.media_content.push(MediaContent {
                        url,
                        mime: attr(e, b"type"),
                    });
                }
            }
            (Ns::None, b"enclosure") if direct_child => {
                if self.enclosure.is_none() {
                    self.enclosure = attr(e, b"url").map(|url| Enclosure {
                        url,
                        mime: attr(e, b"type"),
                    });
                }
            }
            (Ns::Atom, b"link") if direct_child => {
                let Some(href) = attr(e, b"href") else {
                    return;
                };
                match attr(e, b"rel").as_deref().unwrap_or("alternate") {
                    "alternate" => set_once(&mut self.link, href),
                    "enclosure" if self.enclosure.is_none() => {
                        self.enclosure = Some(Enclosure {
                            url: href,
                            mime: attr(e, b"type"),
                        });
                    }
                    _ => {}
                }
            }
            _ => {}
        }
    }
}

/// Replace HTML-only named entities that XML parsers reject.
fn scrub_html_entities_for_xml(s: &str) -> String {
    s.replace("&nbsp;", "&#160;")
        .replace("&ndash;", "&#8211;")
        .replace("&mdash;", "&#8212;")
        .replace("&ldquo;", "&#8220;")
        .replace("&rdquo;", "&#8221;")
        .replace("&lsquo;", "&#8216;")
        .replace("&rsquo;", "&#8217;")
        .replace("&hellip;", "&#8230;")
}

fn re_xml_encoding() -> &'static Regex {
    static RE: OnceCell<Regex> = OnceCell::new();
    RE.get_or_init(|| {
        Regex::new(r#"^\s*<\?xml[^>]*?\sencoding\s*=\s*["']([A-Za-z0-9._:-]+)["']"#).unwrap()
    })
}

fn charset_param(content_type: &str) -> Option<&str> {
    content_type.split(';').skip(1).find_map(|p| {
        let (k, v) = p.split_once('=')?;
        k.trim()
            .eq_ignore_ascii_case("charset")
            .then(|| v.trim().trim_matches('"'))
    })
}

/// Decode a feed body to UTF-8. A byte order mark wins, then the XML
/// declaration, then the `charset` of the Content-Type. UTF-8 otherwise.
/// Unknown labels fall back to UTF-8; undecodable bytes become U+FFFD.
pub fn decode_feed_body(body: &[u8], content_type: Option<&str>) -> String {
    if let Some((enc, bom_len)) = Encoding::for_bom(body) {
        return enc.decode_without_bom_handling(&body[bom_len..]).0.into_owned();
    }

    // the declaration is ASCII in every encoding a feed can declare
    let head = String::from_utf8_lossy(&body[..body.len().min(256)]);
    let declared = re_xml_encoding()
        .captures(&head)
        .and_then(|c| c.get(1))
        .and_then(|m| Encoding::for_label(m.as_str().as_bytes()))
        // an ASCII-readable declaration rules out UTF-16
        .map(Encoding::output_encoding);
    let from_header = || {
        content_type
            .and_then(charset_param)
            .and_then(|l| Encoding::for_label(l.as_bytes()))
    };
    let enc = declared.or_else(from_header).unwrap_or(UTF_8);

    enc.decode_without_bom_handling(body).0.into_owned()
}

/// Parse a whole feed document. Any XML error fails the document; nothing
/// is returned partially.
pub fn parse_feed(xml: &str) -> Result<Vec<FeedEntry>, ImportError> {
    let cleaned = scrub_html_entities_for_xml(xml);
    let mut reader = NsReader::from_str(&cleaned);
    reader.config_mut().trim_text(true);

    let fail = |e: quick_xml::Error| ImportError::UpstreamFormat(format!("parsing feed xml: {e}"));

    let mut out = Vec::new();
    let mut depth = 0usize;
    let mut root: Option<(Ns, Vec<u8>)> = None;
    // (entry, depth of its element)
    let mut current: Option<(FeedEntry, usize)> = None;
    // (field, depth of its element, buffered text)
    let mut capture: Option<(Field, usize, String)> = None;
    // depth of an Atom <author> container
    let mut atom_author: Option<usize> = None;

    loop {
        let (ns, event) = reader.read_resolved_event().map_err(fail)?;
        let ns = classify(&ns);
        match event {
            Event::Start(e) => {
                depth += 1;
                let local = e.local_name().as_ref().to_vec();
                if root.is_none() {
                    root = Some((ns, local.clone()));
                }

                if current.is_none() {
                    let is_item = matches!(
                        (ns, local.as_slice()),
                        (Ns::None | Ns::Rss1, b"item") | (Ns::Atom, b"entry")
                    );
                    if is_item {
                        current = Some((FeedEntry::default(), depth));
                    }
                    continue;
                }
                let Some((entry, item_depth)) = current.as_mut() else {
                    continue;
                };

                let direct_child = depth == *item_depth + 1;
                entry.absorb_attributes(ns, &local, &e, direct_child);

                if capture.is_some() {
                    // nested markup inside a captured field
                } else if direct_child && ns == Ns::Atom && local == b"author" {
                    atom_author = Some(depth);
                } else if atom_author == Some(depth - 1) && local == b"name" {
                    capture = Some((Field::Author, depth, String::new()));
                } else if direct_child {
                    if let Some(field) = child_field(ns, &local) {
                        capture = Some((field, depth, String::new()));
                    }
                }
            }
            Event::Empty(e) => {
                if let Some((entry, item_depth)) = current.as_mut() {
                    let direct_child = depth == *item_depth;
                    entry.absorb_attributes(ns, e.local_name().as_ref(), &e, direct_child);
                }
            }
            Event::Text(t) => {
                if let Some((_, _, buf)) = capture.as_mut() {
                    push_text(buf, &unescape_text(&t));
                }
            }
            Event::CData(c) => {
                if let Some((_, _, buf)) = capture.as_mut() {
                    push_text(buf, &String::from_utf8_lossy(&c));
                }
            }
            Event::End(_) => {
                if capture.as_ref().is_some_and(|(_, d, _)| *d == depth) {
                    if let (Some((field, _, text)), Some((entry, _))) =
                        (capture.take(), current.as_mut())
                    {
                        entry.commit(field, text);
                    }
                }
                if atom_author == Some(depth) {
                    atom_author = None;
                }
                if current.as_ref().is_some_and(|(_, d)| *d == depth) {
                    if let Some((entry, _)) = current.take() {
                        out.push(entry);
                    }
                }
                depth = depth.saturating_sub(1);
            }
            Event::Eof => break,
            _ => {}
        }
    }

    match root {
        Some((_, name)) if matches!(name.as_slice(), b"rss" | b"RDF" | b"feed") => Ok(out),
        Some((_, name)) => Err(ImportError::UpstreamFormat(format!(
            "document root <{}> is not a feed",
            String::from_utf8_lossy(&name)
        ))),
        None => Err(ImportError::UpstreamFormat("empty feed document".into())),
    }
}

/// XML unescape, falling back to the HTML entity table for the named
/// entities XML does not know (`&eacute;`, `&copy;` and the like).
fn unescape_text(t: &BytesText) -> String {
    match t.unescape() {
        Ok(c) => c.into_owned(),
        Err(_) => html_escape::decode_html_entities(&String::from_utf8_lossy(t)).into_owned(),
    }
}

fn push_text(buf: &mut String, text: &str) {
    if !buf.is_empty() && !text.is_empty() {
        buf.push(' ');
    }
    buf.push_str(text);
}

pub struct FeedAdapter {
    http: Arc<dyn HttpClient>,
    timeout: Duration,
}

impl FeedAdapter {
    pub fn new(http: Arc<dyn HttpClient>, timeout: Duration) -> Self {
        Self { http, timeout }
    }
}

#[async_trait]
impl SourceAdapter for FeedAdapter {
    fn kind(&self) -> SourceKind {
        SourceKind::Feed
    }

    async fn import(
        &self,
        source: &SourceConfig,
        limit: Option<usize>,
        sink: &mut dyn ItemSink,
    ) -> Result<ImportSummary, ImportError> {
        let url = source.url.trim();
        if url.is_empty() {
            return Err(ImportError::Configuration("No feed URL specified.".into()));
        }

        let opts = RequestOptions::with_timeout(self.timeout).header("Accept", ACCEPT);
        let resp = self
            .http
            .get(url, &opts)
            .await
            .map_err(|e| ImportError::Fetch(format!("{url}: {e}")))?;
        if !resp.is_success() {
            return Err(ImportError::Fetch(format!(
                "Feed returned status code {}.",
                resp.status
            )));
        }

        let body = decode_feed_body(&resp.body, resp.content_type.as_deref());
        let entries = parse_feed(&body)?;
        tracing::debug!(target: "ingest", source = %source.id, entries = entries.len(), "feed parsed");

        let mut summary = ImportSummary::default();
        for entry in entries {
            if limit_reached(limit, &summary) {
                break;
            }
            let Some(item) = entry.to_item() else {
                tracing::debug!(target: "ingest", source = %source.id, "feed entry without link skipped");
                continue;
            };
            if !sink.admit(&item).await? {
                continue;
            }
            summary.record(sink.accept(item).await?);
        }
        Ok(summary)
    }
}
