// src/ingest/types.rs
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ImportError;
use crate::store::RecordId;

/// Upstream shape a source speaks. Closed set: each variant maps to exactly
/// one adapter in `providers`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SourceKind {
    Feed,
    RestCollection,
    SearchApi,
}

impl SourceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceKind::Feed => "feed",
            SourceKind::RestCollection => "rest-collection",
            SourceKind::SearchApi => "search-api",
        }
    }
}

impl std::fmt::Display for SourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

fn default_enabled() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceConfig {
    pub id: String,
    /// Display name; also the attribution tag on imported records.
    pub name: String,
    pub kind: SourceKind,
    /// Feed URL, REST site base, or search endpoint override.
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub query: Option<String>,
    #[serde(default)]
    pub section: Option<String>,
    #[serde(default)]
    pub date_window_days: Option<u32>,
    /// Max items imported per run; 0 = unlimited.
    #[serde(default)]
    pub limit: u32,
    #[serde(default)]
    pub keyword_filter: String,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

impl SourceConfig {
    pub fn new(id: &str, name: &str, kind: SourceKind, url: &str) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            kind,
            url: url.to_string(),
            api_key: None,
            query: None,
            section: None,
            date_window_days: None,
            limit: 0,
            keyword_filter: String::new(),
            enabled: true,
        }
    }

    /// `None` when unlimited.
    pub fn item_limit(&self) -> Option<usize> {
        (self.limit > 0).then_some(self.limit as usize)
    }
}

/// Canonical, source-independent import candidate.
#[derive(Debug, Clone, PartialEq)]
pub struct Item {
    pub title: String,
    pub content: String,
    pub excerpt: String,
    pub permalink: String,
    pub author: Option<String>,
    pub published_at: DateTime<Utc>,
    pub image_url: Option<String>,
    /// Secondary text (description, rendered excerpt, abstract) consulted by
    /// the keyword filter only.
    pub summary: Option<String>,
}

impl Item {
    pub fn filter_fields(&self) -> Vec<&str> {
        let mut fields = vec![self.title.as_str(), self.content.as_str()];
        if let Some(s) = self.summary.as_deref() {
            fields.push(s);
        }
        fields
    }
}

/// Image step failed; the record itself was kept.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageWarning {
    pub record_id: RecordId,
    pub image_url: String,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemOutcome {
    pub record_id: RecordId,
    pub image_warning: Option<ImageWarning>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImportSummary {
    pub imported: u32,
    pub warnings: Vec<ImageWarning>,
}

impl ImportSummary {
    pub fn record(&mut self, outcome: ItemOutcome) {
        self.imported += 1;
        if let Some(w) = outcome.image_warning {
            self.warnings.push(w);
        }
    }
}

/// Receives candidates from an adapter. `admit` runs the keyword filter and
/// dedup gate; `accept` persists an admitted item.
#[async_trait]
pub trait ItemSink: Send {
    async fn admit(&mut self, item: &Item) -> Result<bool, ImportError>;
    async fn accept(&mut self, item: Item) -> Result<ItemOutcome, ImportError>;
}

#[async_trait]
pub trait SourceAdapter: Send + Sync {
    fn kind(&self) -> SourceKind;

    /// Fetch, parse and hand items to `sink` until the upstream is exhausted
    /// or `limit` items were accepted.
    async fn import(
        &self,
        source: &SourceConfig,
        limit: Option<usize>,
        sink: &mut dyn ItemSink,
    ) -> Result<ImportSummary, ImportError>;
}
