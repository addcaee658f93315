//! GTFS-realtime archiver: binary entrypoint.
//! Loads config, starts the polling task and serves health/status/metrics.

use std::sync::Arc;

use anyhow::Context;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use gtfs_realtime_archiver::agency::StaticAgencyDirectory;
use gtfs_realtime_archiver::feed::transport::HttpTransport;
use gtfs_realtime_archiver::metrics::Metrics;
use gtfs_realtime_archiver::readiness::ReadinessGate;
use gtfs_realtime_archiver::{router, ArchiverConfig, ArchiverTask, LoggingArchiveSink};

/// Compact logs by default; `ARCHIVER_LOG_JSON=1` switches to JSON lines.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("gtfs_realtime_archiver=info,archiver=info,warn"));

    let json = std::env::var("ARCHIVER_LOG_JSON")
        .ok()
        .is_some_and(|v| v == "1");

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry.with(fmt::layer().json()).init();
    } else {
        registry.with(fmt::layer().compact()).init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env in local/dev; no-op when absent.
    let _ = dotenvy::dotenv();
    init_tracing();

    let cfg = ArchiverConfig::load_default().context("loading archiver config")?;
    let metrics = Metrics::init()?;

    let directory = Arc::new(StaticAgencyDirectory::new(cfg.agencies.clone()));
    let transport = Arc::new(HttpTransport::new(cfg.http_timeout(), &cfg.http.user_agent)?);
    let gate = ReadinessGate::new();
    let task = ArchiverTask::with_gate(
        cfg.task_config(),
        directory,
        Arc::new(LoggingArchiveSink),
        transport,
        gate.clone(),
    );
    task.start();

    let listener = tokio::net::TcpListener::bind(&cfg.listen_addr)
        .await
        .with_context(|| format!("binding {}", cfg.listen_addr))?;
    tracing::info!(addr = %cfg.listen_addr, "listening");

    // The host is up once the listener is bound.
    gate.signal_ready();

    let app = router(task.clone(), Some(metrics.handle.clone()));
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await?;

    task.stop();
    Ok(())
}
