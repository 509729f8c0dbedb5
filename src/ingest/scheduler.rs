// src/ingest/scheduler.rs
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::ingest::runner::BatchRunner;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ImportSchedulerCfg {
    pub interval_secs: u64,
}

impl Default for ImportSchedulerCfg {
    fn default() -> Self {
        Self {
            interval_secs: crate::config::INTERVAL_HOURLY,
        }
    }
}

/// Spawn the periodic batch. The first batch runs immediately; a batch that
/// overruns its slot delays the next one instead of stacking ticks.
pub fn spawn_scheduler(cfg: ImportSchedulerCfg, runner: BatchRunner) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(Duration::from_secs(cfg.interval_secs.max(1)));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            let report = runner.run_all().await;
            tracing::info!(
                target: "ingest",
                imported = report.imported(),
                failed = report.failed().count(),
                next_in_secs = cfg.interval_secs,
                "scheduled import tick"
            );
        }
    })
}
