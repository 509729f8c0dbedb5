// src/ingest/dedup.rs
use std::collections::HashSet;
use std::sync::Arc;

use crate::error::StoreError;
use crate::store::ContentStore;

/// Permalink uniqueness check in front of record creation. Exact,
/// case-sensitive match against the store plus anything this run already
/// accepted.
pub struct DedupGate {
    store: Arc<dyn ContentStore>,
    seen: HashSet<String>,
}

impl DedupGate {
    pub fn new(store: Arc<dyn ContentStore>) -> Self {
        Self {
            store,
            seen: HashSet::new(),
        }
    }

    /// An empty permalink always counts as existing so it is never admitted.
    pub async fn exists(&self, permalink: &str) -> Result<bool, StoreError> {
        if permalink.is_empty() || self.seen.contains(permalink) {
            return Ok(true);
        }
        Ok(self.store.find_by_permalink(permalink).await?.is_some())
    }

    pub fn remember(&mut self, permalink: &str) {
        self.seen.insert(permalink.to_string());
    }
}
