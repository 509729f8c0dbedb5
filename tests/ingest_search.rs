// tests/ingest_search.rs
mod common;

use common::harness;
use feed_importer::ingest::providers::search::SEARCH_ENDPOINT;
use feed_importer::store::ContentStore;
use feed_importer::{SourceConfig, SourceKind};
use serde_json::json;

fn search_source(key: Option<&str>) -> SourceConfig {
    let mut src = SourceConfig::new("nyt", "NY Times", SourceKind::SearchApi, "");
    src.api_key = key.map(str::to_string);
    src
}

#[tokio::test]
async fn docs_become_records_with_absolute_images() {
    let h = harness(vec![search_source(Some("good-key"))]);
    h.http.json(
        SEARCH_ENDPOINT,
        200,
        json!({
            "status": "OK",
            "response": {"docs": [
                {
                    "web_url": "https://www.nytimes.com/2024/05/01/style/watches.html",
                    "headline": {"main": "The Watch Market"},
                    "abstract": "Prices are up.",
                    "lead_paragraph": "Collectors are paying more.",
                    "pub_date": "2024-05-01T12:00:00+0000",
                    "byline": {"original": "By Pat Writer"},
                    "multimedia": [
                        {"url": ""},
                        {"url": "images/2024/05/01/watch.jpg", "subtype": "xlarge"}
                    ]
                },
                {
                    "web_url": "https://www.nytimes.com/2024/05/02/style/clocks.html",
                    "headline": {"main": "Clocks"},
                    "snippet": "Tick tock.",
                    "multimedia": []
                },
                {"headline": {"main": "No url, dropped"}}
            ]}
        }),
    );

    let run = h.orchestrator().run_source_by_id("nyt").await;
    assert_eq!(run.imported, Some(2));

    let records = h.store.records();
    let watches = &records[0].record;
    assert_eq!(watches.title, "The Watch Market");
    assert_eq!(watches.content, "<p>Collectors are paying more.</p>");
    assert_eq!(watches.excerpt, "Prices are up.");
    assert_eq!(watches.author.as_deref(), Some("By Pat Writer"));
    assert_eq!(
        watches.image_url.as_deref(),
        Some("https://www.nytimes.com/images/2024/05/01/watch.jpg")
    );

    let clocks = &records[1].record;
    assert_eq!(clocks.content, "<p>Tick tock.</p>");
    assert_eq!(clocks.image_url, None);

    // key and fixed paging travel on the query string
    let sent = h.http.requests_to(SEARCH_ENDPOINT);
    assert_eq!(sent.len(), 1);
    assert!(sent[0].contains("api-key=good-key"));
    assert!(sent[0].contains("sort=newest"));
    assert!(sent[0].contains("page=0"));
}

#[tokio::test]
async fn rejected_key_records_status_code_and_no_count() {
    let h = harness(vec![search_source(Some("bad-key"))]);
    h.http.json(SEARCH_ENDPOINT, 401, json!({"fault": {"faultstring": "Invalid ApiKey"}}));

    let run = h.orchestrator().run_source_by_id("nyt").await;
    assert_eq!(run.imported, None);
    let err = run.error.unwrap();
    assert!(err.contains("401"), "{err}");
    assert!(!err.contains("bad-key"), "api key leaked into error: {err}");

    let status = h.store.source_status("nyt").await.unwrap().unwrap();
    assert_eq!(status.imported_count, None);
    assert!(status.last_error.contains("401"));
    assert!(h.store.records().is_empty());
}

#[tokio::test]
async fn missing_docs_is_an_upstream_format_error() {
    let h = harness(vec![search_source(Some("k"))]);
    h.http.json(SEARCH_ENDPOINT, 200, json!({"status": "OK", "response": {}}));

    let run = h.orchestrator().run_source_by_id("nyt").await;
    let err = run.error.unwrap();
    assert!(err.starts_with("upstream format error"), "{err}");
    assert!(h.store.records().is_empty());
}

#[tokio::test]
async fn missing_key_fails_without_a_request() {
    let h = harness(vec![search_source(None)]);
    let run = h.orchestrator().run_source_by_id("nyt").await;
    assert!(run.error.unwrap().contains("No search API key specified."));
    assert!(h.http.requests().is_empty());
}

#[tokio::test]
async fn global_limit_caps_unlimited_sources() {
    let h = common::harness_with_global_limit(vec![search_source(Some("k"))], 1);
    h.http.json(
        SEARCH_ENDPOINT,
        200,
        json!({"response": {"docs": [
            {"web_url": "https://news.test/1", "headline": {"main": "One"}},
            {"web_url": "https://news.test/2", "headline": {"main": "Two"}}
        ]}}),
    );
    assert_eq!(h.orchestrator().run_source_by_id("nyt").await.imported, Some(1));
}
