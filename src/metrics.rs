use std::net::SocketAddr;

use metrics::{describe_counter, describe_gauge};
use metrics_exporter_prometheus::PrometheusBuilder;
use once_cell::sync::OnceCell;

pub const ITEMS_IMPORTED: &str = "import_items_imported_total";
pub const ITEMS_SKIPPED: &str = "import_items_skipped_total";
pub const IMAGE_WARNINGS: &str = "import_image_warnings_total";
pub const SOURCE_ERRORS: &str = "import_source_errors_total";
pub const RUNS: &str = "import_runs_total";
pub const LAST_RUN_TS: &str = "import_last_run_ts";

fn describe_all() {
    describe_counter!(ITEMS_IMPORTED, "Records created from upstream items.");
    describe_counter!(ITEMS_SKIPPED, "Items skipped by keyword filter or dedup gate.");
    describe_counter!(IMAGE_WARNINGS, "Records kept without their representative image.");
    describe_counter!(SOURCE_ERRORS, "Source runs that ended in an error.");
    describe_counter!(RUNS, "Completed batch runs.");
    describe_gauge!(LAST_RUN_TS, "Unix timestamp of the last finished batch.");
}

/// Register descriptions once per process. Descriptions only reach a
/// recorder that is already installed.
pub fn ensure_metrics_described() {
    static DESCRIBED: OnceCell<()> = OnceCell::new();
    DESCRIBED.get_or_init(describe_all);
}

/// Install the Prometheus recorder with its own HTTP listener serving
/// `/metrics` on `addr`. Must be called inside a tokio runtime.
pub fn install_prometheus(addr: SocketAddr) -> anyhow::Result<()> {
    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .map_err(|e| anyhow::anyhow!("prometheus exporter on {addr}: {e}"))?;
    describe_all();
    tracing::info!(%addr, "metrics exporter listening");
    Ok(())
}
