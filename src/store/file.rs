use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::Utc;
use serde::{Deserialize, Serialize};

use super::{
    Category, CategoryId, ContentRecord, ContentStore, NewRecord, RecordId, SourceFilter,
    SourceRunStatus,
};
use crate::error::StoreError;
use crate::ingest::types::SourceConfig;

#[derive(Debug, Default, Serialize, Deserialize)]
struct StoreState {
    #[serde(default)]
    next_record_id: RecordId,
    #[serde(default)]
    next_category_id: CategoryId,
    #[serde(default)]
    records: Vec<ContentRecord>,
    #[serde(default)]
    categories: Vec<Category>,
    #[serde(default)]
    statuses: BTreeMap<String, SourceRunStatus>,
}

struct Inner {
    state: StoreState,
    by_permalink: HashMap<String, usize>,
}

impl Inner {
    fn new(state: StoreState) -> Self {
        let by_permalink = state
            .records
            .iter()
            .enumerate()
            .map(|(i, r)| (r.record.permalink.clone(), i))
            .collect();
        Self {
            state,
            by_permalink,
        }
    }
}

/// Reference [`ContentStore`]: everything in memory, optionally written back
/// to a JSON snapshot after each change. A change whose snapshot write fails
/// is undone in memory too. Sources come from configuration and are never
/// written.
pub struct FileContentStore {
    sources: Vec<SourceConfig>,
    inner: Mutex<Inner>,
    path: Option<PathBuf>,
}

impl FileContentStore {
    pub fn in_memory(sources: Vec<SourceConfig>) -> Self {
        Self {
            sources,
            inner: Mutex::new(Inner::new(StoreState::default())),
            path: None,
        }
    }

    /// Load the snapshot at `path` if present; later writes go back there.
    pub fn open(path: impl AsRef<Path>, sources: Vec<SourceConfig>) -> Result<Self, StoreError> {
        let path = path.as_ref().to_path_buf();
        let state = match fs::read_to_string(&path) {
            Ok(s) => serde_json::from_str(&s)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => StoreState::default(),
            Err(e) => return Err(e.into()),
        };
        tracing::debug!(path = %path.display(), records = state.records.len(), "content store opened");
        Ok(Self {
            sources,
            inner: Mutex::new(Inner::new(state)),
            path: Some(path),
        })
    }

    fn lock(&self) -> Result<MutexGuard<'_, Inner>, StoreError> {
        self.inner
            .lock()
            .map_err(|_| StoreError::Unavailable("content store lock poisoned".into()))
    }

    fn persist(&self, inner: &Inner) -> Result<(), StoreError> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
            fs::create_dir_all(dir)?;
        }
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, serde_json::to_vec_pretty(&inner.state)?)?;
        fs::rename(&tmp, path)?;
        Ok(())
    }

    pub fn records(&self) -> Vec<ContentRecord> {
        self.lock()
            .map(|inner| inner.state.records.clone())
            .unwrap_or_default()
    }

    pub fn categories(&self) -> Vec<Category> {
        self.lock()
            .map(|inner| inner.state.categories.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl ContentStore for FileContentStore {
    async fn find_by_permalink(&self, permalink: &str) -> Result<Option<ContentRecord>, StoreError> {
        let inner = self.lock()?;
        Ok(inner
            .by_permalink
            .get(permalink)
            .and_then(|&i| inner.state.records.get(i))
            .cloned())
    }

    async fn create(&self, record: NewRecord) -> Result<RecordId, StoreError> {
        let mut inner = self.lock()?;
        inner.state.next_record_id += 1;
        let id = inner.state.next_record_id;
        let index = inner.state.records.len();
        inner.by_permalink.insert(record.permalink.clone(), index);
        inner.state.records.push(ContentRecord {
            id,
            record,
            imported_at: Utc::now(),
        });
        if let Err(e) = self.persist(&inner) {
            if let Some(r) = inner.state.records.pop() {
                inner.by_permalink.remove(&r.record.permalink);
            }
            inner.state.next_record_id -= 1;
            return Err(e);
        }
        Ok(id)
    }

    async fn find_category_by_slug(&self, slug: &str) -> Result<Option<Category>, StoreError> {
        let inner = self.lock()?;
        Ok(inner
            .state
            .categories
            .iter()
            .find(|c| c.slug == slug)
            .cloned())
    }

    async fn create_category(&self, name: &str, slug: &str) -> Result<CategoryId, StoreError> {
        let mut inner = self.lock()?;
        inner.state.next_category_id += 1;
        let id = inner.state.next_category_id;
        inner.state.categories.push(Category {
            id,
            name: name.to_string(),
            slug: slug.to_string(),
        });
        if let Err(e) = self.persist(&inner) {
            inner.state.categories.pop();
            inner.state.next_category_id -= 1;
            return Err(e);
        }
        Ok(id)
    }

    async fn list_sources(&self, filter: SourceFilter) -> Result<Vec<SourceConfig>, StoreError> {
        Ok(self
            .sources
            .iter()
            .filter(|s| filter.accepts(s))
            .cloned()
            .collect())
    }

    async fn get_source(&self, id: &str) -> Result<Option<SourceConfig>, StoreError> {
        Ok(self.sources.iter().find(|s| s.id == id).cloned())
    }

    async fn set_source_status(&self, id: &str, status: SourceRunStatus) -> Result<(), StoreError> {
        if !self.sources.iter().any(|s| s.id == id) {
            return Err(StoreError::SourceNotFound(id.to_string()));
        }
        let mut inner = self.lock()?;
        let previous = inner.state.statuses.insert(id.to_string(), status);
        if let Err(e) = self.persist(&inner) {
            match previous {
                Some(p) => inner.state.statuses.insert(id.to_string(), p),
                None => inner.state.statuses.remove(id),
            };
            return Err(e);
        }
        Ok(())
    }

    async fn source_status(&self, id: &str) -> Result<Option<SourceRunStatus>, StoreError> {
        Ok(self.lock()?.state.statuses.get(id).cloned())
    }
}
