// src/ingest/mod.rs
pub mod dedup;
pub mod image;
pub mod orchestrator;
pub mod providers;
pub mod runner;
pub mod scheduler;
pub mod types;

use chrono::{DateTime, NaiveDateTime, Utc};
use once_cell::sync::OnceCell;
use regex::Regex;

pub const EXCERPT_LEN: usize = 250;
pub const ELLIPSIS: &str = "…";

fn re_tags() -> &'static Regex {
    static RE: OnceCell<Regex> = OnceCell::new();
    RE.get_or_init(|| Regex::new(r"(?is)<!--.*?-->|<(script|style)\b.*?</(script|style)>|</?[a-z!][^>]*>").unwrap())
}

/// Publishing-platform shortcodes dropped from excerpts. Other bracketed
/// text ("[Updated]", "[Reuters]") is prose and stays.
const SHORTCODE_TAGS: [&str; 10] = [
    "caption",
    "wp_caption",
    "gallery",
    "embed",
    "video",
    "audio",
    "playlist",
    "wp_video",
    "wp_audio",
    "img",
];

fn re_shortcodes() -> &'static Regex {
    static RE: OnceCell<Regex> = OnceCell::new();
    RE.get_or_init(|| {
        Regex::new(&format!(r"(?i)\[/?(?:{})(?:\s[^\[\]]*)?/?\]", SHORTCODE_TAGS.join("|"))).unwrap()
    })
}

fn re_ws() -> &'static Regex {
    static RE: OnceCell<Regex> = OnceCell::new();
    RE.get_or_init(|| Regex::new(r"\s+").unwrap())
}

/// Plain text from an HTML fragment: tags dropped, entities decoded,
/// whitespace collapsed.
pub fn clean_text(s: &str) -> String {
    let stripped = re_tags().replace_all(s, " ");
    let decoded = html_escape::decode_html_entities(&stripped);
    re_ws().replace_all(&decoded, " ").trim().to_string()
}

/// Excerpt shared by every adapter: markup and shortcodes removed, then cut
/// at the last whitespace at or before `max_len` chars with `…` appended.
pub fn excerpt(content: &str, max_len: usize) -> String {
    let text = clean_text(content);
    let text = re_shortcodes().replace_all(&text, "");
    let text = re_ws().replace_all(&text, " ").trim().to_string();

    if text.chars().count() <= max_len {
        return text;
    }

    // Byte offset of the char just past the limit; a space there is a valid cut.
    let boundary = text
        .char_indices()
        .nth(max_len)
        .map(|(i, _)| i)
        .unwrap_or(text.len());
    let window = &text[..boundary];
    let cut = match text[boundary..].chars().next() {
        Some(c) if c.is_whitespace() => window,
        _ => match window.rfind(char::is_whitespace) {
            Some(i) => &window[..i],
            // one long word: hard cut
            None => window,
        },
    };

    format!("{}{}", cut.trim_end(), ELLIPSIS)
}

/// Case-insensitive substring match over any field. Empty keyword accepts.
pub fn matches_keyword<S: AsRef<str>>(keyword: &str, fields: &[S]) -> bool {
    let needle = keyword.trim().to_lowercase();
    if needle.is_empty() {
        return true;
    }
    fields
        .iter()
        .any(|f| f.as_ref().to_lowercase().contains(&needle))
}

/// Accepts the date shapes seen across feeds and JSON APIs.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let s = raw.trim();
    if s.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = DateTime::parse_from_rfc2822(s) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = DateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%z") {
        return Some(dt.with_timezone(&Utc));
    }
    ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
        .map(|naive| naive.and_utc())
}
