// tests/metrics.rs
//
// The Prometheus exposition carries the archiver series once a cycle has run.

use std::sync::Arc;

use axum::body::{self, Body};
use axum::http::{Request, StatusCode};
use tower::ServiceExt;

use gtfs_realtime_archiver::agency::{resolve_agency_set, LookupContext, StaticAgencyDirectory};
use gtfs_realtime_archiver::archive::RecordingSink;
use gtfs_realtime_archiver::feed::transport::{HttpTransport, DEFAULT_USER_AGENT};
use gtfs_realtime_archiver::feed::FeedSources;
use gtfs_realtime_archiver::metrics::Metrics;
use gtfs_realtime_archiver::poller::{FaultIsolation, FeedPoller};
use gtfs_realtime_archiver::{router, ArchiverTask, TaskConfig};

#[tokio::test]
async fn metrics_endpoint_exposes_cycle_series() {
    let metrics = Metrics::init().unwrap();
    // A second init reuses the installed recorder.
    assert!(Metrics::init().is_ok());

    let dir = StaticAgencyDirectory::default();
    let ctx = LookupContext::build(resolve_agency_set(&["1".to_string()], &dir).unwrap(), &dir);
    let transport = Arc::new(HttpTransport::new(std::time::Duration::from_secs(1), DEFAULT_USER_AGENT).unwrap());
    let poller = Arc::new(FeedPoller::new(
        FeedSources::default(),
        transport.clone(),
        Arc::new(RecordingSink::new()),
        Arc::new(ctx),
        FaultIsolation::Cycle,
    ));
    poller.run_cycle().await.unwrap();

    let task = ArchiverTask::new(
        TaskConfig::default(),
        Arc::new(dir),
        Arc::new(RecordingSink::new()),
        transport,
    );
    let app = router(task, Some(metrics.handle.clone()));
    let resp = app
        .oneshot(Request::get("/metrics").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    let body = body::to_bytes(resp.into_body(), 1_048_576).await.unwrap();
    let text = String::from_utf8(body.to_vec()).unwrap();
    for needle in [
        "archiver_cycles_total",
        "archiver_dispatch_total",
        "archiver_feed_entities",
        "archiver_last_cycle_ts",
    ] {
        assert!(
            text.contains(needle),
            "metrics exposition missing '{needle}'\n{text}"
        );
    }
}
