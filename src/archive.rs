// src/archive.rs
use std::sync::Mutex;

use anyhow::Result;
use metrics::counter;

use crate::agency::{AgencyAndId, AgencyId, LookupContext};
use crate::feed::gtfs_realtime::FeedMessage;
use crate::feed::FeedKind;

/// Downstream archival service. Every method must accept an empty
/// (header-only) message.
#[async_trait::async_trait]
pub trait FeedService: Send + Sync {
    async fn archive_trip_updates(&self, feed: &FeedMessage, ctx: &LookupContext) -> Result<()>;

    async fn archive_vehicle_positions(
        &self,
        feed: &FeedMessage,
        ctx: &LookupContext,
    ) -> Result<()>;

    async fn archive_alerts(&self, feed: &FeedMessage, ctx: &LookupContext) -> Result<()>;
}

/// Route a message to the sink method for its role.
pub async fn dispatch(
    sink: &dyn FeedService,
    kind: FeedKind,
    feed: &FeedMessage,
    ctx: &LookupContext,
) -> Result<()> {
    let res = match kind {
        FeedKind::TripUpdates => sink.archive_trip_updates(feed, ctx).await,
        FeedKind::VehiclePositions => sink.archive_vehicle_positions(feed, ctx).await,
        FeedKind::Alerts => sink.archive_alerts(feed, ctx).await,
    };
    if res.is_ok() {
        counter!("archiver_dispatch_total", "feed" => kind.as_str()).increment(1);
    }
    res
}

/// What the logging sink reports for one snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnapshotSummary {
    pub feed: FeedKind,
    pub entities: usize,
    pub primary_agency: Option<AgencyId>,
    /// Alert selectors naming an agency this task tracks.
    pub tracked_alert_refs: usize,
    /// Candidate qualified ids for the first entity.
    pub first_entity: Vec<AgencyAndId>,
}

impl SnapshotSummary {
    pub fn of(kind: FeedKind, feed: &FeedMessage, ctx: &LookupContext) -> Self {
        let tracked_alert_refs = feed
            .entity
            .iter()
            .filter_map(|e| e.alert.as_ref())
            .flat_map(|a| a.informed_entity.iter())
            .filter_map(|sel| sel.agency_id.as_deref())
            .filter(|id| ctx.tracks(id))
            .count();

        Self {
            feed: kind,
            entities: feed.entity.len(),
            primary_agency: ctx.primary_agency().cloned(),
            tracked_alert_refs,
            first_entity: feed
                .entity
                .first()
                .map(|e| ctx.qualify(&e.id))
                .unwrap_or_default(),
        }
    }
}

/// Sink that only logs a summary of each snapshot.
#[derive(Debug, Default)]
pub struct LoggingArchiveSink;

impl LoggingArchiveSink {
    fn log(&self, kind: FeedKind, feed: &FeedMessage, ctx: &LookupContext) {
        let summary = SnapshotSummary::of(kind, feed, ctx);
        tracing::info!(
            target: "archiver",
            feed = %kind,
            entities = summary.entities,
            version = %feed.header.gtfs_realtime_version,
            header_ts = feed.header.timestamp.unwrap_or(0),
            agencies = ?ctx.agency_ids(),
            primary_agency = ?summary.primary_agency,
            tracked_alert_refs = summary.tracked_alert_refs,
            "snapshot archived"
        );
        if !summary.first_entity.is_empty() {
            tracing::debug!(target: "archiver", feed = %kind, first_entity = ?summary.first_entity, "entity attribution");
        }
    }
}

#[async_trait::async_trait]
impl FeedService for LoggingArchiveSink {
    async fn archive_trip_updates(&self, feed: &FeedMessage, ctx: &LookupContext) -> Result<()> {
        self.log(FeedKind::TripUpdates, feed, ctx);
        Ok(())
    }

    async fn archive_vehicle_positions(
        &self,
        feed: &FeedMessage,
        ctx: &LookupContext,
    ) -> Result<()> {
        self.log(FeedKind::VehiclePositions, feed, ctx);
        Ok(())
    }

    async fn archive_alerts(&self, feed: &FeedMessage, ctx: &LookupContext) -> Result<()> {
        self.log(FeedKind::Alerts, feed, ctx);
        Ok(())
    }
}

// --- Test helper ---
/// Keeps every dispatched message, in call order.
#[derive(Default)]
pub struct RecordingSink {
    pub calls: Mutex<Vec<(FeedKind, FeedMessage)>>,
    /// When set, archiving this role fails.
    pub fail_on: Option<FeedKind>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_on(kind: FeedKind) -> Self {
        Self {
            calls: Mutex::new(vec![]),
            fail_on: Some(kind),
        }
    }

    pub fn snapshot(&self) -> Vec<(FeedKind, FeedMessage)> {
        self.calls
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .clone()
    }

    pub fn kinds(&self) -> Vec<FeedKind> {
        self.snapshot().into_iter().map(|(k, _)| k).collect()
    }

    fn record(&self, kind: FeedKind, feed: &FeedMessage) -> Result<()> {
        if self.fail_on == Some(kind) {
            anyhow::bail!("recording sink refuses {kind}");
        }
        self.calls
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .push((kind, feed.clone()));
        Ok(())
    }
}

#[async_trait::async_trait]
impl FeedService for RecordingSink {
    async fn archive_trip_updates(&self, feed: &FeedMessage, _ctx: &LookupContext) -> Result<()> {
        self.record(FeedKind::TripUpdates, feed)
    }

    async fn archive_vehicle_positions(
        &self,
        feed: &FeedMessage,
        _ctx: &LookupContext,
    ) -> Result<()> {
        self.record(FeedKind::VehiclePositions, feed)
    }

    async fn archive_alerts(&self, feed: &FeedMessage, _ctx: &LookupContext) -> Result<()> {
        self.record(FeedKind::Alerts, feed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agency::{resolve_agency_set, StaticAgencyDirectory};

    fn ctx() -> LookupContext {
        let dir = StaticAgencyDirectory::default();
        LookupContext::build(resolve_agency_set(&["1".into()], &dir).unwrap(), &dir)
    }

    #[tokio::test]
    async fn dispatch_routes_by_kind() {
        let sink = RecordingSink::new();
        let ctx = ctx();
        for kind in [FeedKind::Alerts, FeedKind::TripUpdates] {
            dispatch(&sink, kind, &FeedMessage::empty(), &ctx).await.unwrap();
        }
        assert_eq!(sink.kinds(), vec![FeedKind::Alerts, FeedKind::TripUpdates]);
    }

    #[tokio::test]
    async fn logging_sink_accepts_empty_messages() {
        let sink = LoggingArchiveSink;
        let ctx = ctx();
        for kind in FeedKind::ALL {
            dispatch(&sink, kind, &FeedMessage::empty(), &ctx).await.unwrap();
        }
    }

    #[test]
    fn summary_uses_tracked_agencies() {
        use crate::feed::gtfs_realtime::{Alert, EntitySelector, FeedEntity};

        let dir = StaticAgencyDirectory::default();
        let ctx = LookupContext::build(
            resolve_agency_set(&["1".into(), "40".into()], &dir).unwrap(),
            &dir,
        );
        let selector = |agency: &str| EntitySelector {
            agency_id: Some(agency.to_string()),
            ..Default::default()
        };
        let mut feed = FeedMessage::empty();
        feed.entity.push(FeedEntity {
            id: "alert_9".into(),
            alert: Some(Alert {
                informed_entity: vec![selector("1"), selector("77"), selector("40")],
                ..Default::default()
            }),
            ..Default::default()
        });

        let summary = SnapshotSummary::of(FeedKind::Alerts, &feed, &ctx);
        assert_eq!(summary.entities, 1);
        assert_eq!(summary.primary_agency.as_deref(), Some("1"));
        assert_eq!(summary.tracked_alert_refs, 2);
        assert_eq!(summary.first_entity.len(), 2);
        assert_eq!(summary.first_entity[1].agency_id, "40");
        assert_eq!(summary.first_entity[1].id, "alert_9");

        let empty = SnapshotSummary::of(FeedKind::Alerts, &FeedMessage::empty(), &ctx);
        assert_eq!(empty.tracked_alert_refs, 0);
        assert!(empty.first_entity.is_empty());
    }

    #[tokio::test]
    async fn failing_sink_reports_error_and_records_nothing() {
        let sink = RecordingSink::failing_on(FeedKind::VehiclePositions);
        let err = dispatch(&sink, FeedKind::VehiclePositions, &FeedMessage::empty(), &ctx())
            .await
            .unwrap_err();
        assert!(err.to_string().contains("vehicle-positions"));
        assert!(sink.kinds().is_empty());
    }
}
