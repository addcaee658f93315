// src/poller.rs
//! One fetch → decode → dispatch pass over the three feed roles.

use std::sync::Arc;

use metrics::{counter, gauge};
use serde::{Deserialize, Serialize};
use tokio::task::JoinSet;
use tracing::{debug, warn};

use crate::agency::LookupContext;
use crate::archive::{dispatch, FeedService};
use crate::error::{CycleError, FeedError};
use crate::feed::extensions::{registry, ExtensionRegistry};
use crate::feed::gtfs_realtime::FeedMessage;
use crate::feed::transport::FeedTransport;
use crate::feed::{read_or_default, FeedKind, FeedSources};

/// How far a failure reaches inside one cycle.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FaultIsolation {
    /// Any fetch failure cancels every dispatch of the cycle; a sink failure
    /// cancels the dispatches after it.
    #[default]
    Cycle,
    /// Sources that fetched fine are dispatched; failures are logged per source.
    Source,
}

/// What a cycle managed to hand to the sink.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CycleReport {
    pub dispatched: Vec<FeedKind>,
    pub failed: Vec<FeedKind>,
}

pub type CycleOutcome = Result<CycleReport, CycleError>;

pub struct FeedPoller {
    sources: FeedSources,
    transport: Arc<dyn FeedTransport>,
    sink: Arc<dyn FeedService>,
    ctx: Arc<LookupContext>,
    isolation: FaultIsolation,
    registry: &'static ExtensionRegistry,
}

impl FeedPoller {
    pub fn new(
        sources: FeedSources,
        transport: Arc<dyn FeedTransport>,
        sink: Arc<dyn FeedService>,
        ctx: Arc<LookupContext>,
        isolation: FaultIsolation,
    ) -> Self {
        Self {
            sources,
            transport,
            sink,
            ctx,
            isolation,
            registry: registry(),
        }
    }

    /// Read all three roles concurrently; results come back in dispatch order.
    async fn fetch_all(&self) -> Vec<(FeedKind, Result<FeedMessage, FeedError>)> {
        let t = &*self.transport;
        let (tu, vp, al) = tokio::join!(
            read_or_default(t, self.sources.url(FeedKind::TripUpdates), self.registry),
            read_or_default(t, self.sources.url(FeedKind::VehiclePositions), self.registry),
            read_or_default(t, self.sources.url(FeedKind::Alerts), self.registry),
        );

        let out = vec![
            (FeedKind::TripUpdates, tu),
            (FeedKind::VehiclePositions, vp),
            (FeedKind::Alerts, al),
        ];
        for (kind, res) in &out {
            match res {
                Ok(feed) => {
                    gauge!("archiver_feed_entities", "feed" => kind.as_str())
                        .set(feed.entity.len() as f64);
                }
                Err(_) => {
                    counter!("archiver_fetch_errors_total", "feed" => kind.as_str()).increment(1);
                }
            }
        }
        out
    }

    /// Fetch every role, then dispatch in order: trip updates, vehicle
    /// positions, alerts. Errors propagate according to the isolation mode.
    pub async fn update(&self) -> CycleOutcome {
        let fetched = self.fetch_all().await;
        let mut report = CycleReport::default();

        let mut feeds = Vec::with_capacity(fetched.len());
        let mut first_err: Option<CycleError> = None;
        for (kind, res) in fetched {
            match res {
                Ok(feed) => feeds.push((kind, feed)),
                Err(e) => {
                    report.failed.push(kind);
                    match self.isolation {
                        FaultIsolation::Cycle if first_err.is_none() => {
                            first_err = Some(CycleError::Fetch { kind, source: e });
                        }
                        _ => {
                            warn!(target: "archiver", feed = %kind, url = %e.url(), error = %e, "feed fetch failed");
                        }
                    }
                }
            }
        }
        if let Some(e) = first_err {
            return Err(e);
        }

        for (kind, feed) in &feeds {
            match dispatch(&*self.sink, *kind, feed, &self.ctx).await {
                Ok(()) => report.dispatched.push(*kind),
                Err(e) => match self.isolation {
                    FaultIsolation::Cycle => {
                        return Err(CycleError::Dispatch {
                            kind: *kind,
                            source: e.into(),
                        });
                    }
                    FaultIsolation::Source => {
                        warn!(target: "archiver", feed = %kind, error = %format!("{e:#}"), "archiving feed failed");
                        report.failed.push(*kind);
                    }
                },
            }
        }

        Ok(report)
    }

    /// Run one cycle behind a fault boundary. Errors and panics are logged
    /// here and returned for inspection; nothing escapes as a panic.
    pub async fn run_cycle(self: &Arc<Self>) -> CycleOutcome {
        let this = Arc::clone(self);
        let mut set = JoinSet::new();
        set.spawn(async move { this.update().await });

        let outcome = match set.join_next().await {
            Some(Ok(res)) => res,
            Some(Err(join_err)) => Err(CycleError::Panicked(join_err.to_string())),
            None => Err(CycleError::Panicked("cycle task vanished".to_string())),
        };

        counter!("archiver_cycles_total").increment(1);
        gauge!("archiver_last_cycle_ts").set(chrono::Utc::now().timestamp() as f64);

        match &outcome {
            Ok(report) => {
                debug!(
                    target: "archiver",
                    dispatched = ?report.dispatched,
                    failed = ?report.failed,
                    "cycle complete"
                );
            }
            Err(e) => {
                counter!("archiver_cycle_failures_total").increment(1);
                warn!(
                    target: "archiver",
                    url = ?e.url().map(|u| u.as_str()),
                    trip_updates_url = ?self.sources.trip_updates.as_ref().map(|u| u.as_str()),
                    error = %e,
                    "error updating from GTFS-realtime data sources"
                );
            }
        }
        outcome
    }
}
