// tests/metrics_import.rs
mod common;

use common::{harness, rss};
use feed_importer::{SourceConfig, SourceKind};
use metrics_exporter_prometheus::PrometheusBuilder;

#[tokio::test]
async fn counters_exposed_after_batch() {
    // recorder first so descriptions and counters land in it
    let handle = PrometheusBuilder::new().install_recorder().expect("recorder");

    let mut feed = SourceConfig::new("feed", "Feed", SourceKind::Feed, "https://feed.test/rss");
    feed.keyword_filter = "keep".into();
    let broken = SourceConfig::new("broken", "Broken", SourceKind::Feed, "");
    let h = harness(vec![feed, broken]);
    h.http.xml(
        "https://feed.test/rss",
        &rss(&[("keep one", "https://feed.test/1"), ("drop one", "https://feed.test/2")]),
    );

    h.runner.run_all().await;
    h.runner.run_all().await;

    let out = handle.render();
    assert!(out.contains("import_items_imported_total"));
    assert!(out.contains("import_items_skipped_total"));
    assert!(out.contains("reason=\"filter\""));
    assert!(out.contains("reason=\"duplicate\""));
    assert!(out.contains("import_source_errors_total"));
    assert!(out.contains("import_runs_total 2"));
    assert!(out.contains("import_last_run_ts"));
}
