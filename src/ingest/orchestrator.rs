// src/ingest/orchestrator.rs
//! One source, one run: adapter dispatch, item admission and persistence,
//! image attachment and the final run status write.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use metrics::counter;

use crate::error::{ImportError, MediaError};
use crate::ingest::dedup::DedupGate;
use crate::ingest::matches_keyword;
use crate::ingest::providers::Adapters;
use crate::ingest::types::{ImageWarning, ImportSummary, Item, ItemOutcome, ItemSink, SourceConfig};
use crate::media::{filename_from_url, mime_for, MediaStore};
use crate::metrics as metrics_names;
use crate::store::{
    CategoryId, ContentStore, NewRecord, RecordId, SourceRunStatus, DEFAULT_CATEGORY_NAME,
    DEFAULT_CATEGORY_SLUG,
};

/// What a single source run produced. The same data is written to the
/// store as [`SourceRunStatus`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceRunReport {
    pub source_id: String,
    pub finished_at: DateTime<Utc>,
    /// `None` when the run failed.
    pub imported: Option<u32>,
    pub error: Option<String>,
    pub warnings: Vec<ImageWarning>,
}

impl SourceRunReport {
    fn from_result(source_id: &str, result: &Result<ImportSummary, ImportError>) -> Self {
        let (imported, error, warnings) = match result {
            Ok(s) => (Some(s.imported), None, s.warnings.clone()),
            Err(e) => (None, Some(e.to_string()), Vec::new()),
        };
        Self {
            source_id: source_id.to_string(),
            finished_at: Utc::now(),
            imported,
            error,
            warnings,
        }
    }

    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }

    pub fn status(&self) -> SourceRunStatus {
        match (&self.error, self.imported) {
            (Some(e), _) => SourceRunStatus::failure(self.finished_at, e.clone()),
            (None, count) => SourceRunStatus::success(self.finished_at, count.unwrap_or(0)),
        }
    }
}

pub struct Orchestrator {
    store: Arc<dyn ContentStore>,
    media: Arc<dyn MediaStore>,
    adapters: Adapters,
    global_limit: u32,
}

impl Orchestrator {
    pub fn new(store: Arc<dyn ContentStore>, media: Arc<dyn MediaStore>, adapters: Adapters) -> Self {
        crate::metrics::ensure_metrics_described();
        Self {
            store,
            media,
            adapters,
            global_limit: 0,
        }
    }

    /// Cap used for sources whose own limit is 0. 0 keeps them unlimited.
    pub fn with_global_limit(mut self, limit: u32) -> Self {
        self.global_limit = limit;
        self
    }

    pub fn store(&self) -> &Arc<dyn ContentStore> {
        &self.store
    }

    fn limit_for(&self, source: &SourceConfig) -> Option<usize> {
        source
            .item_limit()
            .or((self.global_limit > 0).then_some(self.global_limit as usize))
    }

    /// Import one source and record the attempt. Never fails: adapter errors
    /// end up in the report and in the stored run status.
    pub async fn run_source(&self, source: &SourceConfig) -> SourceRunReport {
        let limit = self.limit_for(source);
        tracing::info!(target: "ingest", source = %source.id, kind = %source.kind, ?limit, "import started");

        let adapter = self.adapters.for_kind(source.kind);
        let mut session = ImportSession::new(source, self.store.clone(), self.media.as_ref());
        let result = adapter.import(source, limit, &mut session).await;
        let report = SourceRunReport::from_result(&source.id, &result);

        match &result {
            Ok(summary) => tracing::info!(
                target: "ingest",
                source = %source.id,
                imported = summary.imported,
                image_warnings = summary.warnings.len(),
                "import finished"
            ),
            Err(e) => {
                counter!(metrics_names::SOURCE_ERRORS, "kind" => source.kind.as_str()).increment(1);
                tracing::warn!(
                    target: "ingest",
                    source = %source.id,
                    error = %e,
                    retryable = e.is_retryable(),
                    "import failed"
                );
            }
        }

        if let Err(e) = self.store.set_source_status(&source.id, report.status()).await {
            tracing::error!(target: "ingest", source = %source.id, error = %e, "run status not saved");
        }
        report
    }

    /// Manual trigger for a single configured source, enabled or not.
    pub async fn run_source_by_id(&self, id: &str) -> SourceRunReport {
        match self.store.get_source(id).await {
            Ok(Some(source)) => self.run_source(&source).await,
            Ok(None) => {
                tracing::warn!(target: "ingest", source = id, "unknown source");
                let err = ImportError::Configuration(format!("unknown source id {id:?}"));
                SourceRunReport::from_result(id, &Err(err))
            }
            Err(e) => {
                tracing::warn!(target: "ingest", source = id, error = %e, "source lookup failed");
                SourceRunReport::from_result(id, &Err(e.into()))
            }
        }
    }
}

/// Per-run [`ItemSink`]: keyword filter, dedup gate, record creation and
/// image attachment.
struct ImportSession<'a> {
    source: &'a SourceConfig,
    store: Arc<dyn ContentStore>,
    media: &'a dyn MediaStore,
    gate: DedupGate,
    category: Option<CategoryId>,
}

impl<'a> ImportSession<'a> {
    fn new(source: &'a SourceConfig, store: Arc<dyn ContentStore>, media: &'a dyn MediaStore) -> Self {
        Self {
            source,
            gate: DedupGate::new(store.clone()),
            store,
            media,
            category: None,
        }
    }

    async fn category(&mut self) -> Result<CategoryId, ImportError> {
        if let Some(id) = self.category {
            return Ok(id);
        }
        let id = match self.store.find_category_by_slug(DEFAULT_CATEGORY_SLUG).await? {
            Some(c) => c.id,
            None => {
                self.store
                    .create_category(DEFAULT_CATEGORY_NAME, DEFAULT_CATEGORY_SLUG)
                    .await?
            }
        };
        self.category = Some(id);
        Ok(id)
    }

    async fn attach_image(&self, record: RecordId, url: &str) -> Result<(), MediaError> {
        let file = self.media.download(url).await?;
        let filename = filename_from_url(url);
        let mime = mime_for(&filename, file.content_type.as_deref());
        let media = self.media.store(file, &filename, &mime, record).await?;
        self.media.set_representative_image(record, media).await
    }
}

#[async_trait]
impl<'a> ItemSink for ImportSession<'a> {
    async fn admit(&mut self, item: &Item) -> Result<bool, ImportError> {
        if !matches_keyword(&self.source.keyword_filter, &item.filter_fields()) {
            counter!(metrics_names::ITEMS_SKIPPED, "reason" => "filter").increment(1);
            tracing::debug!(target: "ingest", source = %self.source.id, permalink = %item.permalink, "filtered out");
            return Ok(false);
        }
        if self.gate.exists(&item.permalink).await? {
            counter!(metrics_names::ITEMS_SKIPPED, "reason" => "duplicate").increment(1);
            tracing::debug!(target: "ingest", source = %self.source.id, permalink = %item.permalink, "already imported");
            return Ok(false);
        }
        Ok(true)
    }

    async fn accept(&mut self, item: Item) -> Result<ItemOutcome, ImportError> {
        let category_id = self.category().await?;
        let image_url = item.image_url.clone();
        let permalink = item.permalink.clone();

        let record_id = self
            .store
            .create(NewRecord {
                title: item.title,
                content: item.content,
                excerpt: item.excerpt,
                permalink: item.permalink,
                author: item.author,
                published_at: item.published_at,
                image_url: item.image_url,
                source_id: self.source.id.clone(),
                source_tag: self.source.name.clone(),
                category_id,
            })
            .await?;
        self.gate.remember(&permalink);
        counter!(metrics_names::ITEMS_IMPORTED, "kind" => self.source.kind.as_str()).increment(1);
        tracing::debug!(target: "ingest", source = %self.source.id, record = record_id, %permalink, "record created");

        let image_warning = match image_url {
            Some(url) => match self.attach_image(record_id, &url).await {
                Ok(()) => None,
                Err(e) => {
                    counter!(metrics_names::IMAGE_WARNINGS).increment(1);
                    tracing::warn!(target: "ingest", source = %self.source.id, record = record_id, %url, error = %e, "image not attached");
                    Some(ImageWarning {
                        record_id,
                        image_url: url,
                        reason: e.to_string(),
                    })
                }
            },
            None => None,
        };

        Ok(ItemOutcome {
            record_id,
            image_warning,
        })
    }
}
