// src/ingest/providers/rest.rs
//! REST content collection adapter (WordPress `wp/v2/posts` shape).

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use serde::Deserialize;
use serde_json::Value;
use url::Url;

use crate::error::ImportError;
use crate::http::{HttpClient, RequestOptions};
use crate::ingest::types::{ImportSummary, Item, ItemSink, SourceAdapter, SourceConfig, SourceKind};
use crate::ingest::{clean_text, excerpt, image, parse_timestamp, EXCERPT_LEN};

use super::limit_reached;

/// Upper bound the collection endpoint accepts for `per_page`.
pub const MAX_PER_PAGE: usize = 100;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Rendered {
    #[serde(default)]
    pub rendered: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct OgImage {
    #[serde(default)]
    pub url: Option<String>,
}

/// SEO plugin head metadata some sites expose alongside posts.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct YoastHead {
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub og_description: Option<String>,
    #[serde(default)]
    pub author: Option<String>,
    #[serde(default)]
    pub og_image: Option<Vec<OgImage>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct WpPost {
    #[serde(default)]
    pub link: Option<String>,
    #[serde(default)]
    pub title: Rendered,
    #[serde(default)]
    pub content: Rendered,
    #[serde(default)]
    pub excerpt: Rendered,
    #[serde(default)]
    pub date: Option<String>,
    #[serde(default)]
    pub date_gmt: Option<String>,
    #[serde(default)]
    pub featured_media: u64,
    #[serde(default)]
    pub yoast_head_json: Option<YoastHead>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct MediaSize {
    #[serde(default)]
    pub source_url: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct MediaDetails {
    #[serde(default)]
    pub sizes: HashMap<String, MediaSize>,
}

/// Response of the media endpoint for a featured image.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct WpMedia {
    #[serde(default)]
    pub source_url: Option<String>,
    #[serde(default)]
    pub media_details: Option<MediaDetails>,
    #[serde(default)]
    pub guid: Option<Rendered>,
}

fn non_empty(s: Option<&str>) -> Option<&str> {
    s.map(str::trim).filter(|s| !s.is_empty())
}

impl WpMedia {
    /// Full-size rendition, then the generic source URL, then the raw asset guid.
    pub fn best_url(&self) -> Option<String> {
        let full = self
            .media_details
            .as_ref()
            .and_then(|d| d.sizes.get("full"))
            .and_then(|s| s.source_url.as_deref());
        non_empty(full)
            .or_else(|| non_empty(self.source_url.as_deref()))
            .or_else(|| non_empty(self.guid.as_ref().map(|g| g.rendered.as_str())))
            .map(str::to_string)
    }
}

impl WpPost {
    pub fn to_item(&self) -> Option<Item> {
        let permalink = non_empty(self.link.as_deref())?.to_string();
        let content = self.content.rendered.clone();

        let yoast = self.yoast_head_json.as_ref();
        let mut short = self.excerpt.rendered.clone();
        if content.trim().is_empty() && short.trim().is_empty() {
            short = yoast
                .and_then(|y| non_empty(y.description.as_deref()).or(non_empty(y.og_description.as_deref())))
                .unwrap_or_default()
                .to_string();
        }
        let excerpt_src = if content.trim().is_empty() { &short } else { &content };

        let published_at = self
            .date_gmt
            .as_deref()
            .and_then(parse_timestamp)
            .or_else(|| self.date.as_deref().and_then(parse_timestamp))
            .unwrap_or_else(Utc::now);

        Some(Item {
            title: clean_text(&self.title.rendered),
            excerpt: excerpt(excerpt_src, EXCERPT_LEN),
            content,
            permalink,
            author: yoast
                .and_then(|y| y.author.as_deref())
                .map(clean_text)
                .filter(|a| !a.is_empty()),
            published_at,
            image_url: None,
            summary: (!short.trim().is_empty()).then_some(short),
        })
    }
}

pub struct RestCollectionAdapter {
    http: Arc<dyn HttpClient>,
    timeout: Duration,
    media_timeout: Duration,
}

impl RestCollectionAdapter {
    pub fn new(http: Arc<dyn HttpClient>, timeout: Duration, media_timeout: Duration) -> Self {
        Self {
            http,
            timeout,
            media_timeout,
        }
    }

    fn json_opts(timeout: Duration) -> RequestOptions {
        RequestOptions::with_timeout(timeout).header("Accept", "application/json")
    }

    /// Featured media lookup. Any failure just means "no featured image".
    async fn fetch_media(&self, base: &str, media_id: u64) -> Option<WpMedia> {
        let url = format!("{base}/wp-json/wp/v2/media/{media_id}");
        match self.http.get(&url, &Self::json_opts(self.media_timeout)).await {
            Ok(resp) if resp.is_success() => serde_json::from_slice(&resp.body)
                .map_err(|e| tracing::debug!(target: "ingest", %url, error = %e, "media json unreadable"))
                .ok(),
            Ok(resp) => {
                tracing::debug!(target: "ingest", %url, status = resp.status, "media lookup refused");
                None
            }
            Err(e) => {
                tracing::debug!(target: "ingest", %url, error = %e, "media lookup failed");
                None
            }
        }
    }

    async fn resolve_image(&self, base: &str, post: &WpPost) -> Option<String> {
        let media = if post.featured_media > 0 {
            self.fetch_media(base, post.featured_media).await
        } else {
            None
        };
        image::resolve_rest(post, media.as_ref())
    }
}

pub fn posts_url(base: &str, per_page: usize, page: u32) -> Result<Url, ImportError> {
    let mut url = Url::parse(&format!("{base}/wp-json/wp/v2/posts"))
        .map_err(|e| ImportError::Configuration(format!("invalid site URL {base:?}: {e}")))?;
    url.query_pairs_mut()
        .append_pair("per_page", &per_page.to_string())
        .append_pair("page", &page.to_string());
    Ok(url)
}

#[async_trait]
impl SourceAdapter for RestCollectionAdapter {
    fn kind(&self) -> SourceKind {
        SourceKind::RestCollection
    }

    async fn import(
        &self,
        source: &SourceConfig,
        limit: Option<usize>,
        sink: &mut dyn ItemSink,
    ) -> Result<ImportSummary, ImportError> {
        let base = source.url.trim().trim_end_matches('/');
        if base.is_empty() {
            return Err(ImportError::Configuration("No site URL specified.".into()));
        }

        let per_page = limit.map_or(MAX_PER_PAGE, |l| l.min(MAX_PER_PAGE));
        let mut summary = ImportSummary::default();
        let mut page: u32 = 1;

        'pages: loop {
            let url = posts_url(base, per_page, page)?;
            let resp = self
                .http
                .get(url.as_str(), &Self::json_opts(self.timeout))
                .await
                .map_err(|e| ImportError::Fetch(format!("{url}: {e}")))?;

            // the collection answers 400 once `page` runs past the last page
            if page > 1 && resp.status == 400 {
                tracing::debug!(target: "ingest", source = %source.id, page, "past last page");
                break;
            }
            if !resp.is_success() {
                return Err(ImportError::Fetch(format!(
                    "API returned status code {}. Please verify the site URL is correct.",
                    resp.status
                )));
            }

            let posts: Vec<Value> = serde_json::from_slice(&resp.body).map_err(|e| {
                ImportError::UpstreamFormat(format!("page {page} is not a JSON array of posts: {e}"))
            })?;
            if posts.is_empty() {
                break;
            }
            let fetched = posts.len();
            tracing::debug!(target: "ingest", source = %source.id, page, fetched, "page fetched");

            for raw in posts {
                if limit_reached(limit, &summary) {
                    break 'pages;
                }
                let post: WpPost = match serde_json::from_value(raw) {
                    Ok(p) => p,
                    Err(e) => {
                        tracing::warn!(target: "ingest", source = %source.id, error = %e, "malformed post skipped");
                        continue;
                    }
                };
                let Some(mut item) = post.to_item() else {
                    continue;
                };
                if !sink.admit(&item).await? {
                    continue;
                }
                item.image_url = self.resolve_image(base, &post).await;
                summary.record(sink.accept(item).await?);
            }

            if fetched < per_page || limit_reached(limit, &summary) {
                break;
            }
            page += 1;
        }

        Ok(summary)
    }
}
