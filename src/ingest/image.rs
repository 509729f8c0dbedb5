//! Representative-image lookup, one fallback chain per source kind.
//!
//! Every function here is pure: the REST chain's media lookup is fetched by
//! the adapter and passed in. A miss is `None`, never an error.

use once_cell::sync::OnceCell;
use regex::Regex;
use serde_json::Value;

use crate::ingest::providers::feed::FeedEntry;
use crate::ingest::providers::rest::{WpMedia, WpPost};
use crate::ingest::providers::search::SearchDoc;

/// Origin used to absolutize scheme-less search multimedia URLs.
pub const SEARCH_IMAGE_ORIGIN: &str = "https://www.nytimes.com/";

const IMAGE_EXTENSIONS: [&str; 5] = ["jpg", "jpeg", "png", "gif", "webp"];

fn re_img_src() -> &'static Regex {
    static RE: OnceCell<Regex> = OnceCell::new();
    RE.get_or_init(|| Regex::new(r#"(?i)<img[^>]+src=["']([^"']+)["'][^>]*>"#).unwrap())
}

/// First `<img src>` in an HTML fragment.
pub fn first_img_src(html: &str) -> Option<String> {
    re_img_src()
        .captures(html)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().trim().to_string())
        .filter(|s| !s.is_empty())
}

/// True when the path ends in a known image extension, optionally followed by a query.
pub fn looks_like_image_url(url: &str) -> bool {
    let path = url.split(['?', '#']).next().unwrap_or_default();
    path.rsplit_once('.')
        .map(|(_, ext)| {
            IMAGE_EXTENSIONS
                .iter()
                .any(|known| ext.eq_ignore_ascii_case(known))
        })
        .unwrap_or(false)
}

fn is_image_mime(mime: &str) -> bool {
    mime.trim().to_ascii_lowercase().starts_with("image/")
}

pub fn resolve_feed(entry: &FeedEntry) -> Option<String> {
    if let Some(url) = &entry.media_thumbnail {
        return Some(url.clone());
    }

    let media_image = entry.media_content.iter().find(|m| match m.mime.as_deref() {
        None => true,
        Some(t) => t.trim().is_empty() || is_image_mime(t),
    });
    if let Some(m) = media_image {
        return Some(m.url.clone());
    }

    if let Some(enc) = &entry.enclosure {
        let accept = match enc.mime.as_deref().filter(|t| !t.trim().is_empty()) {
            Some(t) => is_image_mime(t),
            None => looks_like_image_url(&enc.url),
        };
        if accept {
            return Some(enc.url.clone());
        }
    }

    let content = entry.content();
    if let Some(src) = content.and_then(first_img_src) {
        return Some(src);
    }

    if let Some(desc) = entry.description.as_deref() {
        if Some(desc) != content {
            if let Some(src) = first_img_src(desc) {
                return Some(src);
            }
        }
    }

    entry.summary.as_deref().and_then(first_img_src)
}

pub fn resolve_rest(post: &WpPost, media: Option<&WpMedia>) -> Option<String> {
    if let Some(url) = media.and_then(WpMedia::best_url) {
        return Some(url);
    }

    let og = post
        .yoast_head_json
        .as_ref()
        .and_then(|y| y.og_image.as_ref())
        .and_then(|imgs| imgs.first())
        .and_then(|img| img.url.as_deref())
        .map(str::trim)
        .filter(|u| !u.is_empty());
    if let Some(url) = og {
        return Some(url.to_string());
    }

    first_img_src(&post.content.rendered)
}

pub fn resolve_search(doc: &SearchDoc) -> Option<String> {
    let url = match &doc.multimedia {
        Value::Array(entries) => entries
            .iter()
            .filter_map(|m| m.get("url").and_then(Value::as_str))
            .map(str::trim)
            .find(|u| !u.is_empty()),
        // newer API revisions nest renditions in an object
        Value::Object(obj) => ["default", "thumbnail"]
            .iter()
            .filter_map(|k| obj.get(*k))
            .filter_map(|m| m.get("url").and_then(Value::as_str))
            .map(str::trim)
            .find(|u| !u.is_empty()),
        _ => None,
    }?;

    Some(absolutize(url, SEARCH_IMAGE_ORIGIN))
}

fn absolutize(url: &str, origin: &str) -> String {
    if url.starts_with("http://") || url.starts_with("https://") {
        url.to_string()
    } else {
        format!("{}/{}", origin.trim_end_matches('/'), url.trim_start_matches('/'))
    }
}
