// tests/fault_isolation.rs
//
// A failing source aborts only the current cycle (default) or only that
// source (`FaultIsolation::Source`). Either way the next cycle runs.

mod common;

use std::sync::Arc;

use common::{encode, trip_updates, url, CountingDirectory, MockTransport, Reply};
use gtfs_realtime_archiver::agency::{resolve_agency_set, LookupContext};
use gtfs_realtime_archiver::archive::RecordingSink;
use gtfs_realtime_archiver::error::CycleError;
use gtfs_realtime_archiver::feed::{FeedKind, FeedSources};
use gtfs_realtime_archiver::poller::{FaultIsolation, FeedPoller};

fn ctx() -> Arc<LookupContext> {
    let dir = CountingDirectory::with_ids(&["1"]);
    Arc::new(LookupContext::build(
        resolve_agency_set(&["1".to_string()], &dir).unwrap(),
        &dir,
    ))
}

fn setup(isolation: FaultIsolation) -> (Arc<FeedPoller>, Arc<MockTransport>, Arc<RecordingSink>) {
    let tu = url("http://feeds.example/tu");
    let vp = url("http://feeds.example/vp");
    let transport = Arc::new(MockTransport::new());
    transport.serve(&tu, Reply::Bytes(encode(&trip_updates(10, &["t1"]))));
    transport.serve(&vp, Reply::ReadError);

    let sink = Arc::new(RecordingSink::new());
    let sources = FeedSources {
        trip_updates: Some(tu),
        vehicle_positions: Some(vp),
        alerts: None,
    };
    let poller = Arc::new(FeedPoller::new(
        sources,
        transport.clone(),
        sink.clone(),
        ctx(),
        isolation,
    ));
    (poller, transport, sink)
}

#[tokio::test]
async fn failing_source_skips_whole_cycle_by_default() {
    let (poller, transport, sink) = setup(FaultIsolation::Cycle);

    let err = poller.run_cycle().await.unwrap_err();
    match &err {
        CycleError::Fetch { kind, .. } => assert_eq!(*kind, FeedKind::VehiclePositions),
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(
        err.url().map(|u| u.as_str()),
        Some("http://feeds.example/vp")
    );
    assert!(sink.kinds().is_empty(), "nothing dispatched on a failed cycle");
    // Both opened streams were closed even though one read failed.
    assert_eq!(transport.closes(), 2);

    // The next cycle is attempted again and fails the same way.
    assert!(poller.run_cycle().await.is_err());
    assert_eq!(transport.opens(), 4);
}

#[tokio::test]
async fn recovered_source_dispatches_on_next_cycle() {
    let (poller, transport, sink) = setup(FaultIsolation::Cycle);
    assert!(poller.run_cycle().await.is_err());

    transport.serve(
        &url("http://feeds.example/vp"),
        Reply::Bytes(encode(&trip_updates(11, &[]))),
    );
    poller.run_cycle().await.unwrap();
    assert_eq!(sink.kinds(), FeedKind::ALL.to_vec());
}

#[tokio::test]
async fn source_isolation_dispatches_healthy_roles() {
    let (poller, _transport, sink) = setup(FaultIsolation::Source);

    let report = poller.run_cycle().await.unwrap();
    assert_eq!(report.dispatched, vec![FeedKind::TripUpdates, FeedKind::Alerts]);
    assert_eq!(report.failed, vec![FeedKind::VehiclePositions]);
    assert_eq!(sink.kinds(), vec![FeedKind::TripUpdates, FeedKind::Alerts]);
}

#[tokio::test]
async fn sink_failure_stops_remaining_dispatches() {
    let transport = Arc::new(MockTransport::new());
    let sink = Arc::new(RecordingSink::failing_on(FeedKind::VehiclePositions));
    let poller = Arc::new(FeedPoller::new(
        FeedSources::default(),
        transport,
        sink.clone(),
        ctx(),
        FaultIsolation::Cycle,
    ));

    let err = poller.run_cycle().await.unwrap_err();
    assert!(matches!(err, CycleError::Dispatch { kind: FeedKind::VehiclePositions, .. }));
    assert_eq!(sink.kinds(), vec![FeedKind::TripUpdates]);
}
