// tests/common/mod.rs
#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use feed_importer::error::{HttpError, StoreError};
use feed_importer::http::{HttpClient, HttpResponse, RequestOptions};
use feed_importer::ingest::providers::Adapters;
use feed_importer::media::DirMediaStore;
use feed_importer::store::{
    Category, CategoryId, ContentRecord, ContentStore, FileContentStore, NewRecord, RecordId,
    SourceFilter, SourceRunStatus,
};
use feed_importer::{BatchRunner, Orchestrator, SourceConfig};

#[derive(Clone)]
pub enum Canned {
    Reply {
        status: u16,
        content_type: Option<String>,
        body: Vec<u8>,
    },
    Timeout,
    Fail(String),
}

/// Canned HTTP client. Routes match by URL prefix, longest prefix wins;
/// anything unrouted answers 404.
#[derive(Default)]
pub struct FakeHttp {
    routes: Mutex<Vec<(String, Canned)>>,
    log: Mutex<Vec<String>>,
}

impl FakeHttp {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn route(&self, prefix: &str, canned: Canned) {
        let mut routes = self.routes.lock().unwrap();
        routes.retain(|(p, _)| p != prefix);
        routes.push((prefix.to_string(), canned));
    }

    pub fn reply(&self, prefix: &str, status: u16, content_type: &str, body: impl Into<Vec<u8>>) {
        self.route(
            prefix,
            Canned::Reply {
                status,
                content_type: Some(content_type.to_string()),
                body: body.into(),
            },
        );
    }

    pub fn json(&self, prefix: &str, status: u16, value: serde_json::Value) {
        self.reply(prefix, status, "application/json", value.to_string());
    }

    pub fn xml(&self, prefix: &str, body: &str) {
        self.reply(prefix, 200, "application/rss+xml", body);
    }

    pub fn image(&self, prefix: &str) {
        self.reply(prefix, 200, "image/jpeg", vec![0xFF, 0xD8, 0xFF, 0xE0, 1, 2, 3]);
    }

    pub fn timeout(&self, prefix: &str) {
        self.route(prefix, Canned::Timeout);
    }

    pub fn requests(&self) -> Vec<String> {
        self.log.lock().unwrap().clone()
    }

    pub fn requests_to(&self, prefix: &str) -> Vec<String> {
        self.requests()
            .into_iter()
            .filter(|u| u.starts_with(prefix))
            .collect()
    }
}

#[async_trait]
impl HttpClient for FakeHttp {
    async fn get(&self, url: &str, opts: &RequestOptions) -> Result<HttpResponse, HttpError> {
        self.log.lock().unwrap().push(url.to_string());
        let canned = self
            .routes
            .lock()
            .unwrap()
            .iter()
            .filter(|(p, _)| url.starts_with(p.as_str()))
            .max_by_key(|(p, _)| p.len())
            .map(|(_, c)| c.clone());
        match canned {
            Some(Canned::Reply {
                status,
                content_type,
                body,
            }) => Ok(HttpResponse {
                status,
                content_type,
                body,
            }),
            Some(Canned::Timeout) => Err(HttpError::Timeout(opts.timeout)),
            Some(Canned::Fail(reason)) => Err(HttpError::Transport(reason)),
            None => Ok(HttpResponse {
                status: 404,
                content_type: None,
                body: Vec::new(),
            }),
        }
    }
}

pub struct Harness {
    pub http: Arc<FakeHttp>,
    pub store: Arc<FileContentStore>,
    pub media: Arc<DirMediaStore>,
    pub runner: BatchRunner,
    _dir: tempfile::TempDir,
}

impl Harness {
    pub fn orchestrator(&self) -> &Orchestrator {
        self.runner.orchestrator()
    }
}

pub fn harness(sources: Vec<SourceConfig>) -> Harness {
    harness_with_global_limit(sources, 0)
}

pub fn harness_with_global_limit(sources: Vec<SourceConfig>, global_limit: u32) -> Harness {
    build_harness(sources, global_limit, |store| store as Arc<dyn ContentStore>)
}

/// Harness whose orchestrator sees a store that refuses the `nth` record
/// (1-based, counted across the whole harness). `Harness::store` is the
/// underlying store, so what did get written stays inspectable.
pub fn harness_failing_create(sources: Vec<SourceConfig>, nth: usize) -> Harness {
    build_harness(sources, 0, |store| {
        Arc::new(FailingCreateStore::new(store, nth)) as Arc<dyn ContentStore>
    })
}

fn build_harness(
    sources: Vec<SourceConfig>,
    global_limit: u32,
    wrap: impl FnOnce(Arc<FileContentStore>) -> Arc<dyn ContentStore>,
) -> Harness {
    let dir = tempfile::tempdir().unwrap();
    let http = FakeHttp::new();
    let store = Arc::new(FileContentStore::in_memory(sources));
    let media = Arc::new(DirMediaStore::open(dir.path().join("media"), http.clone()).unwrap());
    let orchestrator = Orchestrator::new(
        wrap(store.clone()),
        media.clone(),
        Adapters::with_timeout(http.clone(), Duration::from_secs(5)),
    )
    .with_global_limit(global_limit);
    Harness {
        http,
        store,
        media,
        runner: BatchRunner::new(Arc::new(orchestrator)),
        _dir: dir,
    }
}

/// Delegates to a [`FileContentStore`] except for one `create` call, which
/// fails the way an unavailable database would.
pub struct FailingCreateStore {
    inner: Arc<FileContentStore>,
    fail_on: usize,
    creates: AtomicUsize,
}

impl FailingCreateStore {
    pub fn new(inner: Arc<FileContentStore>, fail_on: usize) -> Self {
        Self {
            inner,
            fail_on,
            creates: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl ContentStore for FailingCreateStore {
    async fn find_by_permalink(&self, permalink: &str) -> Result<Option<ContentRecord>, StoreError> {
        self.inner.find_by_permalink(permalink).await
    }

    async fn create(&self, record: NewRecord) -> Result<RecordId, StoreError> {
        if self.creates.fetch_add(1, Ordering::SeqCst) + 1 == self.fail_on {
            return Err(StoreError::Unavailable("database went away".into()));
        }
        self.inner.create(record).await
    }

    async fn find_category_by_slug(&self, slug: &str) -> Result<Option<Category>, StoreError> {
        self.inner.find_category_by_slug(slug).await
    }

    async fn create_category(&self, name: &str, slug: &str) -> Result<CategoryId, StoreError> {
        self.inner.create_category(name, slug).await
    }

    async fn list_sources(&self, filter: SourceFilter) -> Result<Vec<SourceConfig>, StoreError> {
        self.inner.list_sources(filter).await
    }

    async fn get_source(&self, id: &str) -> Result<Option<SourceConfig>, StoreError> {
        self.inner.get_source(id).await
    }

    async fn set_source_status(&self, id: &str, status: SourceRunStatus) -> Result<(), StoreError> {
        self.inner.set_source_status(id, status).await
    }

    async fn source_status(&self, id: &str) -> Result<Option<SourceRunStatus>, StoreError> {
        self.inner.source_status(id).await
    }
}

/// RSS 2.0 document with one `<item>` per `(title, link)` pair.
pub fn rss(items: &[(&str, &str)]) -> String {
    let body: String = items
        .iter()
        .map(|(title, link)| {
            format!(
                "<item><title>{title}</title><link>{link}</link>\
                 <description>About {title}</description>\
                 <pubDate>Mon, 01 Jan 2024 10:00:00 +0000</pubDate></item>"
            )
        })
        .collect();
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<rss version="2.0" xmlns:media="http://search.yahoo.com/mrss/"><channel><title>T</title>{body}</channel></rss>"#
    )
}
