//! Content store boundary: records, categories, sources and their run status.

pub mod file;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::StoreError;
use crate::ingest::types::SourceConfig;

pub use file::FileContentStore;

pub type RecordId = u64;
pub type CategoryId = u64;

pub const DEFAULT_CATEGORY_NAME: &str = "News";
pub const DEFAULT_CATEGORY_SLUG: &str = "news";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    pub id: CategoryId,
    pub name: String,
    pub slug: String,
}

/// What the orchestrator hands to [`ContentStore::create`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewRecord {
    pub title: String,
    pub content: String,
    pub excerpt: String,
    pub permalink: String,
    pub author: Option<String>,
    pub published_at: DateTime<Utc>,
    pub image_url: Option<String>,
    pub source_id: String,
    pub source_tag: String,
    pub category_id: CategoryId,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentRecord {
    pub id: RecordId,
    #[serde(flatten)]
    pub record: NewRecord,
    pub imported_at: DateTime<Utc>,
}

/// Snapshot of a source's most recent run attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceRunStatus {
    pub last_run: DateTime<Utc>,
    /// Empty on success.
    pub last_error: String,
    /// `None` when the attempt failed.
    pub imported_count: Option<u32>,
}

impl SourceRunStatus {
    pub fn success(at: DateTime<Utc>, count: u32) -> Self {
        Self {
            last_run: at,
            last_error: String::new(),
            imported_count: Some(count),
        }
    }

    pub fn failure(at: DateTime<Utc>, error: impl Into<String>) -> Self {
        Self {
            last_run: at,
            last_error: error.into(),
            imported_count: None,
        }
    }

    pub fn is_ok(&self) -> bool {
        self.last_error.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SourceFilter {
    /// Enabled sources only.
    #[default]
    Active,
    All,
}

impl SourceFilter {
    pub fn accepts(&self, source: &SourceConfig) -> bool {
        match self {
            SourceFilter::Active => source.enabled,
            SourceFilter::All => true,
        }
    }
}

#[async_trait]
pub trait ContentStore: Send + Sync {
    async fn find_by_permalink(&self, permalink: &str) -> Result<Option<ContentRecord>, StoreError>;
    async fn create(&self, record: NewRecord) -> Result<RecordId, StoreError>;
    async fn find_category_by_slug(&self, slug: &str) -> Result<Option<Category>, StoreError>;
    async fn create_category(&self, name: &str, slug: &str) -> Result<CategoryId, StoreError>;
    async fn list_sources(&self, filter: SourceFilter) -> Result<Vec<SourceConfig>, StoreError>;
    async fn get_source(&self, id: &str) -> Result<Option<SourceConfig>, StoreError>;
    async fn set_source_status(&self, id: &str, status: SourceRunStatus) -> Result<(), StoreError>;
    async fn source_status(&self, id: &str) -> Result<Option<SourceRunStatus>, StoreError>;
}
