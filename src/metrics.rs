// src/metrics.rs
use axum::{routing::get, Router};
use metrics::{describe_counter, describe_gauge, describe_histogram, Unit};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use once_cell::sync::OnceCell;

static HANDLE: OnceCell<PrometheusHandle> = OnceCell::new();

pub struct Metrics {
    pub handle: PrometheusHandle,
}

impl Metrics {
    /// Install the Prometheus recorder. The recorder is process-global, so later
    /// calls reuse the first handle.
    pub fn init() -> anyhow::Result<Self> {
        let handle = HANDLE.get_or_try_init(|| {
            let handle = PrometheusBuilder::new().install_recorder()?;
            describe();
            Ok::<_, anyhow::Error>(handle)
        })?;
        Ok(Self {
            handle: handle.clone(),
        })
    }

    /// Returns a router exposing `/metrics` with the Prometheus exposition format.
    pub fn router(&self) -> Router {
        let handle = self.handle.clone();
        Router::new().route(
            "/metrics",
            get(move || {
                let h = handle.clone();
                async move { h.render() }
            }),
        )
    }
}

fn describe() {
    describe_counter!("archiver_cycles_total", "Polling cycles run, successful or not");
    describe_counter!(
        "archiver_cycle_failures_total",
        "Cycles that ended in an error or panic"
    );
    describe_counter!("archiver_fetch_errors_total", "Feed reads that failed, by feed");
    describe_counter!("archiver_dispatch_total", "Snapshots handed to the archive, by feed");
    describe_counter!(
        "archiver_stream_close_errors_total",
        "Feed streams that failed to close"
    );
    describe_gauge!("archiver_feed_entities", "Entities in the latest snapshot, by feed");
    describe_gauge!("archiver_ready", "1 once the host signalled readiness");
    describe_gauge!(
        "archiver_last_cycle_ts",
        Unit::Seconds,
        "Unix time of the last finished cycle"
    );
    describe_histogram!(
        "archiver_fetch_ms",
        Unit::Milliseconds,
        "Time to open, read and decode one feed"
    );
}
