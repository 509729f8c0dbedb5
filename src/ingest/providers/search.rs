// src/ingest/providers/search.rs
//! News search API adapter (article-search JSON document).

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{Days, Utc};
use serde::Deserialize;
use serde_json::Value;
use url::Url;

use crate::error::ImportError;
use crate::http::{HttpClient, RequestOptions};
use crate::ingest::types::{ImportSummary, Item, ItemSink, SourceAdapter, SourceConfig, SourceKind};
use crate::ingest::{clean_text, excerpt, image, parse_timestamp, EXCERPT_LEN};

use super::limit_reached;

pub const SEARCH_ENDPOINT: &str = "https://api.nytimes.com/svc/search/v2/articlesearch.json";
pub const DEFAULT_SEARCH_QUERY: &str =
    r#"timepiece OR horology OR "luxury watches" OR "mechanical watch""#;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Headline {
    #[serde(default)]
    pub main: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Person {
    #[serde(default)]
    pub firstname: Option<String>,
    #[serde(default)]
    pub lastname: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Byline {
    #[serde(default)]
    pub original: Option<String>,
    #[serde(default)]
    pub person: Option<Vec<Person>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SearchDoc {
    #[serde(default)]
    pub web_url: Option<String>,
    #[serde(default)]
    pub headline: Option<Headline>,
    #[serde(default, rename = "abstract")]
    pub abstract_text: Option<String>,
    #[serde(default)]
    pub snippet: Option<String>,
    #[serde(default)]
    pub lead_paragraph: Option<String>,
    #[serde(default)]
    pub pub_date: Option<String>,
    #[serde(default)]
    pub byline: Option<Byline>,
    /// Usually a list of renditions; kept loose because the shape varies.
    #[serde(default)]
    pub multimedia: Value,
}

fn non_empty(s: &Option<String>) -> Option<&str> {
    s.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

impl SearchDoc {
    fn author(&self) -> Option<String> {
        let byline = self.byline.as_ref()?;
        if let Some(original) = non_empty(&byline.original) {
            return Some(clean_text(original));
        }
        let person = byline.person.as_ref()?.first()?;
        match (non_empty(&person.firstname), non_empty(&person.lastname)) {
            (Some(first), Some(last)) => Some(format!("{first} {last}")),
            _ => None,
        }
    }

    pub fn to_item(&self) -> Option<Item> {
        let permalink = non_empty(&self.web_url)?.to_string();
        let abstract_text = non_empty(&self.abstract_text);
        let snippet = non_empty(&self.snippet);

        let body = non_empty(&self.lead_paragraph).or(abstract_text).or(snippet);
        let content = body.map(|b| format!("<p>{b}</p>")).unwrap_or_default();

        let summary = match (abstract_text, snippet) {
            (Some(a), Some(s)) if a != s => Some(format!("{a}\n{s}")),
            (Some(a), _) => Some(a.to_string()),
            (None, s) => s.map(str::to_string),
        };

        Some(Item {
            title: clean_text(
                self.headline
                    .as_ref()
                    .and_then(|h| h.main.as_deref())
                    .unwrap_or_default(),
            ),
            content,
            excerpt: excerpt(abstract_text.or(snippet).unwrap_or_default(), EXCERPT_LEN),
            permalink,
            author: self.author(),
            published_at: self
                .pub_date
                .as_deref()
                .and_then(parse_timestamp)
                .unwrap_or_else(Utc::now),
            image_url: image::resolve_search(self),
            summary,
        })
    }
}

pub struct SearchApiAdapter {
    http: Arc<dyn HttpClient>,
    timeout: Duration,
}

impl SearchApiAdapter {
    pub fn new(http: Arc<dyn HttpClient>, timeout: Duration) -> Self {
        Self { http, timeout }
    }
}

/// Query for page 0, newest first. The API key travels as a query parameter.
pub fn search_url(source: &SourceConfig, api_key: &str) -> Result<Url, ImportError> {
    let endpoint = match source.url.trim() {
        "" => SEARCH_ENDPOINT,
        custom => custom,
    };
    let mut url = Url::parse(endpoint)
        .map_err(|e| ImportError::Configuration(format!("invalid search endpoint {endpoint:?}: {e}")))?;

    let query = source
        .query
        .as_deref()
        .map(str::trim)
        .filter(|q| !q.is_empty())
        .unwrap_or(DEFAULT_SEARCH_QUERY);

    {
        let mut pairs = url.query_pairs_mut();
        pairs
            .append_pair("q", query)
            .append_pair("api-key", api_key)
            .append_pair("sort", "newest")
            .append_pair("page", "0");

        if let Some(section) = source.section.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
            pairs.append_pair("fq", &format!("section_name:(\"{section}\")"));
        }
        if let Some(days) = source.date_window_days.filter(|d| *d > 0) {
            let begin = Utc::now()
                .date_naive()
                .checked_sub_days(Days::new(u64::from(days)));
            if let Some(begin) = begin {
                pairs.append_pair("begin_date", &begin.format("%Y%m%d").to_string());
            }
        }
    }
    Ok(url)
}

#[async_trait]
impl SourceAdapter for SearchApiAdapter {
    fn kind(&self) -> SourceKind {
        SourceKind::SearchApi
    }

    async fn import(
        &self,
        source: &SourceConfig,
        limit: Option<usize>,
        sink: &mut dyn ItemSink,
    ) -> Result<ImportSummary, ImportError> {
        let api_key = source
            .api_key
            .as_deref()
            .map(str::trim)
            .filter(|k| !k.is_empty())
            .ok_or_else(|| ImportError::Configuration("No search API key specified.".into()))?;

        let url = search_url(source, api_key)?;
        let resp = self
            .http
            .get(url.as_str(), &RequestOptions::with_timeout(self.timeout))
            .await
            // the URL carries the key; keep it out of the error text
            .map_err(|e| ImportError::Fetch(format!("search API request failed: {e}")))?;

        if !resp.is_success() {
            return Err(ImportError::Fetch(format!(
                "Search API returned status code {}. Please verify your API key is valid.",
                resp.status
            )));
        }

        let data: Value = serde_json::from_slice(&resp.body)
            .map_err(|e| ImportError::UpstreamFormat(format!("Invalid response from search API: {e}")))?;
        let docs = data
            .pointer("/response/docs")
            .and_then(Value::as_array)
            .ok_or_else(|| {
                ImportError::UpstreamFormat(
                    "Invalid response from search API: missing response.docs".into(),
                )
            })?;
        tracing::debug!(target: "ingest", source = %source.id, docs = docs.len(), "search results");

        let mut summary = ImportSummary::default();
        for raw in docs {
            if limit_reached(limit, &summary) {
                break;
            }
            let doc: SearchDoc = match SearchDoc::deserialize(raw) {
                Ok(d) => d,
                Err(e) => {
                    tracing::warn!(target: "ingest", source = %source.id, error = %e, "malformed search doc skipped");
                    continue;
                }
            };
            let Some(item) = doc.to_item() else {
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

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn doc_maps_to_item() {
        let doc: SearchDoc = serde_json::from_value(json!({
            "web_url": "https://news.test/2024/01/01/watches.html",
            "headline": {"main": "Watches &amp; Time"},
            "abstract": "An abstract.",
            "snippet": "An abstract.",
            "lead_paragraph": "Lead paragraph.",
            "pub_date": "2024-01-01T05:00:00+0000",
            "byline": {"original": null, "person": [{"firstname": "Sam", "lastname": "Hill"}]},
            "multimedia": []
        }))
        .unwrap();

        let item = doc.to_item().unwrap();
        assert_eq!(item.title, "Watches & Time");
        assert_eq!(item.content, "<p>Lead paragraph.</p>");
        assert_eq!(item.excerpt, "An abstract.");
        assert_eq!(item.author.as_deref(), Some("Sam Hill"));
        assert_eq!(item.summary.as_deref(), Some("An abstract."));
        assert_eq!(item.image_url, None);
        assert_eq!(item.published_at.to_rfc3339(), "2024-01-01T05:00:00+00:00");
    }

    #[test]
    fn search_url_defaults_and_filters() {
        let mut src = SourceConfig::new("nyt", "NYT", SourceKind::SearchApi, "");
        let url = search_url(&src, "k3y").unwrap();
        let pairs: Vec<(String, String)> = url.query_pairs().into_owned().collect();
        assert!(url.as_str().starts_with(SEARCH_ENDPOINT));
        assert!(pairs.contains(&("q".into(), DEFAULT_SEARCH_QUERY.into())));
        assert!(pairs.contains(&("api-key".into(), "k3y".into())));
        assert!(pairs.contains(&("sort".into(), "newest".into())));
        assert!(pairs.contains(&("page".into(), "0".into())));
        assert!(!pairs.iter().any(|(k, _)| k == "fq" || k == "begin_date"));

        src.query = Some("watch OR watches".into());
        src.section = Some("Style".into());
        src.date_window_days = Some(30);
        let url = search_url(&src, "k3y").unwrap();
        let pairs: Vec<(String, String)> = url.query_pairs().into_owned().collect();
        assert!(pairs.contains(&("q".into(), "watch OR watches".into())));
        assert!(pairs.contains(&("fq".into(), "section_name:(\"Style\")".into())));
        let begin = pairs.iter().find(|(k, _)| k == "begin_date").unwrap();
        assert_eq!(begin.1.len(), 8);
    }
}
