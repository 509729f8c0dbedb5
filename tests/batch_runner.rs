// tests/batch_runner.rs
mod common;

use std::time::Duration;

use common::{harness, rss};
use feed_importer::ingest::providers::search::SEARCH_ENDPOINT;
use feed_importer::ingest::scheduler::{spawn_scheduler, ImportSchedulerCfg};
use feed_importer::store::ContentStore;
use feed_importer::{SourceConfig, SourceKind};
use serde_json::json;

fn three_sources() -> Vec<SourceConfig> {
    let feed = SourceConfig::new("feed", "Feed", SourceKind::Feed, "https://feed.test/rss");
    let slow = SourceConfig::new("slow", "Slow Blog", SourceKind::RestCollection, "https://slow.test");
    let mut search = SourceConfig::new("search", "Search", SourceKind::SearchApi, "");
    search.api_key = Some("k".into());
    vec![feed, slow, search]
}

#[tokio::test]
async fn one_timeout_does_not_stop_the_batch() {
    let h = harness(three_sources());
    h.http.xml(
        "https://feed.test/rss",
        &rss(&[("One", "https://feed.test/1"), ("Two", "https://feed.test/2")]),
    );
    h.http.timeout("https://slow.test/");
    h.http.json(
        SEARCH_ENDPOINT,
        200,
        json!({"response": {"docs": [
            {"web_url": "https://news.test/a", "headline": {"main": "A"}},
            {"web_url": "https://news.test/b", "headline": {"main": "B"}},
            {"web_url": "https://news.test/c", "headline": {"main": "C"}}
        ]}}),
    );

    let report = h.runner.run_all().await;
    let order: Vec<&str> = report.runs.iter().map(|r| r.source_id.as_str()).collect();
    assert_eq!(order, vec!["feed", "slow", "search"]);

    assert_eq!(report.get("feed").unwrap().imported, Some(2));
    assert_eq!(report.get("search").unwrap().imported, Some(3));
    let slow = report.get("slow").unwrap();
    assert_eq!(slow.imported, None);
    assert!(slow.error.as_deref().unwrap().contains("timed out"));
    assert_eq!(report.failed().count(), 1);
    assert_eq!(report.imported(), 5);

    let slow_status = h.store.source_status("slow").await.unwrap().unwrap();
    assert!(slow_status.last_error.contains("timed out"));
    assert_eq!(slow_status.imported_count, None);
    assert_eq!(
        h.store.source_status("search").await.unwrap().unwrap().imported_count,
        Some(3)
    );
}

#[tokio::test]
async fn disabled_sources_are_skipped_but_can_run_by_id() {
    let mut sources = three_sources();
    sources.truncate(1);
    sources[0].enabled = false;
    let h = harness(sources);
    h.http.xml("https://feed.test/rss", &rss(&[("One", "https://feed.test/1")]));

    let report = h.runner.run_all().await;
    assert!(report.runs.is_empty());
    assert!(h.store.source_status("feed").await.unwrap().is_none());

    let run = h.orchestrator().run_source_by_id("feed").await;
    assert_eq!(run.imported, Some(1));
}

#[tokio::test]
async fn unknown_source_id_is_reported_not_stored() {
    let h = harness(vec![]);
    let run = h.orchestrator().run_source_by_id("ghost").await;
    assert!(run.error.unwrap().contains("unknown source id"));
    assert!(h.store.source_status("ghost").await.unwrap().is_none());
}

#[tokio::test]
async fn scheduler_runs_a_batch_on_start() {
    let h = harness(vec![SourceConfig::new("feed", "Feed", SourceKind::Feed, "https://feed.test/rss")]);
    h.http.xml("https://feed.test/rss", &rss(&[("One", "https://feed.test/1")]));

    let handle = spawn_scheduler(ImportSchedulerCfg { interval_secs: 3_600 }, h.runner.clone());

    let mut waited = Duration::ZERO;
    while h.store.records().is_empty() && waited < Duration::from_secs(5) {
        tokio::time::sleep(Duration::from_millis(20)).await;
        waited += Duration::from_millis(20);
    }
    handle.abort();

    assert_eq!(h.store.records().len(), 1);
    assert_eq!(h.http.requests_to("https://feed.test/rss").len(), 1);
}
