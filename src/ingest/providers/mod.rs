// src/ingest/providers/mod.rs
pub mod feed;
pub mod rest;
pub mod search;

use std::sync::Arc;
use std::time::Duration;

use crate::http::HttpClient;
use crate::ingest::types::{ImportSummary, SourceAdapter, SourceKind};

pub use feed::FeedAdapter;
pub use rest::RestCollectionAdapter;
pub use search::SearchApiAdapter;

/// Per-request bound for feed, page and search fetches.
pub const FETCH_TIMEOUT: Duration = Duration::from_secs(30);
/// Media metadata lookups are secondary and get a shorter bound.
pub const MEDIA_TIMEOUT: Duration = Duration::from_secs(15);

pub(crate) fn limit_reached(limit: Option<usize>, summary: &ImportSummary) -> bool {
    limit.is_some_and(|l| summary.imported as usize >= l)
}

/// The three adapters, one per [`SourceKind`].
pub struct Adapters {
    feed: FeedAdapter,
    rest: RestCollectionAdapter,
    search: SearchApiAdapter,
}

impl Adapters {
    pub fn new(http: Arc<dyn HttpClient>) -> Self {
        Self::with_timeout(http, FETCH_TIMEOUT)
    }

    pub fn with_timeout(http: Arc<dyn HttpClient>, timeout: Duration) -> Self {
        Self {
            feed: FeedAdapter::new(http.clone(), timeout),
            rest: RestCollectionAdapter::new(http.clone(), timeout, MEDIA_TIMEOUT.min(timeout)),
            search: SearchApiAdapter::new(http, timeout),
        }
    }

    pub fn for_kind(&self, kind: SourceKind) -> &dyn SourceAdapter {
        match kind {
            SourceKind::Feed => &self.feed,
            SourceKind::RestCollection => &self.rest,
            SourceKind::SearchApi => &self.search,
        }
    }
}
