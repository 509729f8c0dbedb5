//! feed-importer binary entrypoint.
//! Wires configuration, stores, HTTP client and adapters, then runs one
//! batch, one source, or the interval scheduler.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use feed_importer::config::{load_sources_default, parse_interval, AppConfig};
use feed_importer::http::{HttpClient, ReqwestHttpClient};
use feed_importer::ingest::providers::Adapters;
use feed_importer::ingest::scheduler::{spawn_scheduler, ImportSchedulerCfg};
use feed_importer::media::DirMediaStore;
use feed_importer::store::{ContentStore, FileContentStore, SourceFilter};
use feed_importer::{BatchRunner, Orchestrator, SourceRunReport};

const ENV_LOG_JSON: &str = "IMPORTER_LOG_JSON";

#[derive(Parser, Debug)]
#[command(name = "feed-importer", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Import every active source once.
    RunAll,
    /// Import one source by id, even if it is disabled.
    RunSource { id: String },
    /// Run a batch now and then on every interval until interrupted.
    Schedule {
        /// hourly, twicedaily, daily or seconds; overrides IMPORTER_INTERVAL.
        #[arg(long)]
        interval: Option<String>,
        /// Serve Prometheus metrics on this address.
        #[arg(long)]
        metrics_addr: Option<SocketAddr>,
    },
    /// Show every configured source with its last run.
    Status,
}

/// Compact logs by default, JSON lines when IMPORTER_LOG_JSON=1.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("feed_importer=info,ingest=info,warn"));
    let json = std::env::var(ENV_LOG_JSON).ok().is_some_and(|v| v == "1");

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry.with(fmt::layer().json()).init();
    } else {
        registry.with(fmt::layer().compact()).init();
    }
}

fn build(cfg: &AppConfig) -> Result<(Arc<FileContentStore>, BatchRunner)> {
    let sources = load_sources_default().context("loading source definitions")?;
    tracing::info!(sources = sources.len(), state = %cfg.state_path.display(), "configuration loaded");

    let store = Arc::new(
        FileContentStore::open(&cfg.state_path, sources)
            .with_context(|| format!("opening content store {}", cfg.state_path.display()))?,
    );
    let http: Arc<dyn HttpClient> =
        Arc::new(ReqwestHttpClient::new(&cfg.user_agent).context("building HTTP client")?);
    let media = Arc::new(
        DirMediaStore::open(&cfg.media_dir, http.clone())
            .with_context(|| format!("opening media dir {}", cfg.media_dir.display()))?
            .with_timeout(cfg.http_timeout),
    );

    let orchestrator = Orchestrator::new(
        store.clone(),
        media,
        Adapters::with_timeout(http, cfg.http_timeout),
    )
    .with_global_limit(cfg.global_limit);

    Ok((store, BatchRunner::new(Arc::new(orchestrator))))
}

fn print_run(run: &SourceRunReport) {
    match (&run.error, run.imported) {
        (Some(err), _) => println!("{}: failed: {}", run.source_id, err),
        (None, count) => println!(
            "{}: imported {} item(s), {} image warning(s)",
            run.source_id,
            count.unwrap_or(0),
            run.warnings.len()
        ),
    }
}

async fn print_status(store: &FileContentStore) -> Result<()> {
    let sources = store.list_sources(SourceFilter::All).await?;
    println!(
        "{:<20} {:<16} {:<8} {:<26} {:>8}  LAST ERROR",
        "SOURCE", "KIND", "ENABLED", "LAST RUN", "IMPORTED"
    );
    for src in sources {
        let status = store.source_status(&src.id).await?;
        let last_run = status
            .as_ref()
            .map(|s| s.last_run.format("%Y-%m-%d %H:%M:%S UTC").to_string())
            .unwrap_or_else(|| "Never".into());
        let imported = status
            .as_ref()
            .and_then(|s| s.imported_count)
            .map(|c| c.to_string())
            .unwrap_or_else(|| "N/A".into());
        let error = status.map(|s| s.last_error).unwrap_or_default();
        println!(
            "{:<20} {:<16} {:<8} {:<26} {:>8}  {}",
            src.id,
            src.kind.as_str(),
            if src.enabled { "yes" } else { "no" },
            last_run,
            imported,
            error
        );
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env when present; no-op otherwise.
    let _ = dotenvy::dotenv();
    init_tracing();

    let cli = Cli::parse();
    let mut cfg = AppConfig::from_env().context("reading environment")?;

    match cli.command {
        Command::RunAll => {
            let (_, runner) = build(&cfg)?;
            let report = runner.run_all().await;
            report.runs.iter().for_each(print_run);
            println!("total imported: {}", report.imported());
        }
        Command::RunSource { id } => {
            let (_, runner) = build(&cfg)?;
            let run = runner.orchestrator().run_source_by_id(&id).await;
            print_run(&run);
            if let Some(err) = run.error {
                return Err(anyhow!("source {id} failed: {err}"));
            }
        }
        Command::Schedule {
            interval,
            metrics_addr,
        } => {
            if let Some(raw) = interval {
                cfg.interval_secs = parse_interval(&raw).context("--interval")?;
            }
            // before build() so metric descriptions reach the recorder
            if let Some(addr) = metrics_addr {
                feed_importer::metrics::install_prometheus(addr)?;
            }
            let (_, runner) = build(&cfg)?;
            let handle = spawn_scheduler(
                ImportSchedulerCfg {
                    interval_secs: cfg.interval_secs,
                },
                runner,
            );
            tracing::info!(interval_secs = cfg.interval_secs, "scheduler started");

            tokio::select! {
                res = handle => res.context("scheduler task ended")?,
                _ = tokio::signal::ctrl_c() => tracing::info!("interrupted, shutting down"),
            }
        }
        Command::Status => {
            let (store, _) = build(&cfg)?;
            print_status(&store).await?;
        }
    }
    Ok(())
}
