// src/scheduler.rs
//! Lifecycle of the archiver task: wait for the host, set up once, then poll
//! on a fixed schedule until stopped.
//!
//! State flow: `Uninitialized → WaitingForReady → Setup → Scheduled | Passive`,
//! and `Stopped` from anywhere through [`ArchiverTask::stop`].

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{error, info, warn};

use crate::agency::{resolve_agency_set, AgencyDirectory, AgencyId, LookupContext};
use crate::archive::FeedService;
use crate::feed::transport::FeedTransport;
use crate::feed::{FeedKind, FeedSources};
use crate::poller::{FaultIsolation, FeedPoller};
use crate::readiness::{ReadinessGate, DEFAULT_READY_REMINDER};

/// What the timer does when a cycle overruns the period.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MissedTick {
    /// Fixed rate: late ticks fire back to back until the schedule catches up.
    #[default]
    Burst,
    /// Fixed delay: the next tick is one full period after the late one.
    Delay,
    /// Fixed rate, dropping the ticks that were missed.
    Skip,
}

impl MissedTick {
    fn behavior(self) -> MissedTickBehavior {
        match self {
            MissedTick::Burst => MissedTickBehavior::Burst,
            MissedTick::Delay => MissedTickBehavior::Delay,
            MissedTick::Skip => MissedTickBehavior::Skip,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskState {
    Uninitialized,
    WaitingForReady,
    Setup,
    /// Cycles are firing.
    Scheduled,
    /// Setup finished with polling disabled.
    Passive,
    Stopped,
}

impl fmt::Display for TaskState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TaskState::Uninitialized => "uninitialized",
            TaskState::WaitingForReady => "waiting_for_ready",
            TaskState::Setup => "setup",
            TaskState::Scheduled => "scheduled",
            TaskState::Passive => "passive",
            TaskState::Stopped => "stopped",
        };
        f.write_str(s)
    }
}

/// Immutable inputs fixed at construction.
#[derive(Debug, Clone)]
pub struct TaskConfig {
    pub sources: FeedSources,
    /// `None` or zero disables polling.
    pub refresh_interval: Option<Duration>,
    /// Empty means every agency the directory knows.
    pub agency_ids: Vec<AgencyId>,
    pub fault_isolation: FaultIsolation,
    pub missed_tick: MissedTick,
    pub ready_reminder: Duration,
}

impl Default for TaskConfig {
    fn default() -> Self {
        Self {
            sources: FeedSources::default(),
            refresh_interval: Some(Duration::from_secs(30)),
            agency_ids: Vec::new(),
            fault_isolation: FaultIsolation::default(),
            missed_tick: MissedTick::default(),
            ready_reminder: DEFAULT_READY_REMINDER,
        }
    }
}

/// The registered periodic cycle. Dropping it does not cancel; call `cancel`.
#[derive(Debug)]
pub struct ScheduleHandle {
    task: JoinHandle<()>,
}

impl ScheduleHandle {
    /// Abort the timer task, interrupting an in-flight cycle at its next await.
    pub fn cancel(self) {
        self.task.abort();
    }

    pub fn is_active(&self) -> bool {
        !self.task.is_finished()
    }
}

/// Spawn the timer: first cycle immediately, then every `period`.
/// A zero period registers nothing.
pub fn spawn_schedule(
    poller: Arc<FeedPoller>,
    period: Duration,
    missed: MissedTick,
) -> Option<ScheduleHandle> {
    if period.is_zero() {
        return None;
    }
    let task = tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(missed.behavior());
        loop {
            ticker.tick().await;
            // Already logged at the cycle boundary; the schedule keeps going regardless.
            let _ = poller.run_cycle().await;
        }
    });
    Some(ScheduleHandle { task })
}

/// Serializable snapshot for the status endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct TaskStatus {
    pub state: TaskState,
    pub ready: bool,
    pub refresh_interval_secs: Option<u64>,
    pub agency_ids: Option<Vec<AgencyId>>,
    pub sources: Vec<SourceStatus>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SourceStatus {
    pub feed: FeedKind,
    pub url: Option<String>,
}

struct Inner {
    state: TaskState,
    init_task: Option<JoinHandle<()>>,
    schedule: Option<ScheduleHandle>,
    ctx: Option<Arc<LookupContext>>,
}

struct Shared {
    cfg: TaskConfig,
    directory: Arc<dyn AgencyDirectory>,
    sink: Arc<dyn FeedService>,
    transport: Arc<dyn FeedTransport>,
    gate: ReadinessGate,
    inner: Mutex<Inner>,
}

/// Polls the configured GTFS-realtime feeds and hands every snapshot to the
/// archive sink. Cloning shares the same task.
#[derive(Clone)]
pub struct ArchiverTask {
    shared: Arc<Shared>,
}

impl ArchiverTask {
    pub fn new(
        cfg: TaskConfig,
        directory: Arc<dyn AgencyDirectory>,
        sink: Arc<dyn FeedService>,
        transport: Arc<dyn FeedTransport>,
    ) -> Self {
        Self::with_gate(cfg, directory, sink, transport, ReadinessGate::new())
    }

    /// Use a gate owned by the host.
    pub fn with_gate(
        cfg: TaskConfig,
        directory: Arc<dyn AgencyDirectory>,
        sink: Arc<dyn FeedService>,
        transport: Arc<dyn FeedTransport>,
        gate: ReadinessGate,
    ) -> Self {
        Self {
            shared: Arc::new(Shared {
                cfg,
                directory,
                sink,
                transport,
                gate,
                inner: Mutex::new(Inner {
                    state: TaskState::Uninitialized,
                    init_task: None,
                    schedule: None,
                    ctx: None,
                }),
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.shared
            .inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    pub fn gate(&self) -> &ReadinessGate {
        &self.shared.gate
    }

    /// Called by the host once its own initialization is complete.
    pub fn signal_ready(&self) {
        self.shared.gate.signal_ready();
    }

    pub fn state(&self) -> TaskState {
        self.lock().state
    }

    pub fn is_scheduled(&self) -> bool {
        let inner = self.lock();
        inner.state == TaskState::Scheduled
            && inner.schedule.as_ref().is_some_and(ScheduleHandle::is_active)
    }

    /// Available once setup has run.
    pub fn lookup_context(&self) -> Option<Arc<LookupContext>> {
        self.lock().ctx.clone()
    }

    /// Begin waiting for readiness in the background. Returns immediately.
    /// Must be called from within a Tokio runtime; a second call is ignored.
    pub fn start(&self) {
        let mut inner = self.lock();
        if inner.state != TaskState::Uninitialized {
            warn!(target: "archiver", state = %inner.state, "start ignored");
            return;
        }
        inner.state = TaskState::WaitingForReady;
        let this = self.clone();
        inner.init_task = Some(tokio::spawn(async move { this.initialize().await }));
        info!(target: "archiver", "archiver task started, waiting for host readiness");
    }

    /// Cancel the schedule (or a pending setup). Safe to call repeatedly.
    pub fn stop(&self) {
        let mut inner = self.lock();
        if inner.state != TaskState::Stopped {
            info!(target: "archiver", "stopping");
        }
        if let Some(init) = inner.init_task.take() {
            init.abort();
        }
        if let Some(schedule) = inner.schedule.take() {
            schedule.cancel();
        }
        inner.state = TaskState::Stopped;
    }

    async fn initialize(self) {
        self.shared.gate.wait(self.shared.cfg.ready_reminder).await;

        {
            let mut inner = self.lock();
            if inner.state == TaskState::Stopped {
                return;
            }
            inner.state = TaskState::Setup;
        }

        let ctx = match self.setup() {
            Ok(ctx) => Arc::new(ctx),
            Err(e) => {
                error!(target: "archiver", error = %format!("{e:#}"), "error initializing");
                let mut inner = self.lock();
                inner.state = TaskState::Stopped;
                inner.init_task = None;
                return;
            }
        };

        let cfg = &self.shared.cfg;
        let mut inner = self.lock();
        if inner.state == TaskState::Stopped {
            return;
        }
        inner.ctx = Some(Arc::clone(&ctx));
        inner.init_task = None;

        let period = cfg.refresh_interval.filter(|p| !p.is_zero());
        match period {
            Some(period) => {
                info!(target: "archiver", refresh_secs = period.as_secs(), "scheduling refresh");
                let poller = Arc::new(FeedPoller::new(
                    cfg.sources.clone(),
                    Arc::clone(&self.shared.transport),
                    Arc::clone(&self.shared.sink),
                    ctx,
                    cfg.fault_isolation,
                ));
                inner.schedule = spawn_schedule(poller, period, cfg.missed_tick);
                inner.state = TaskState::Scheduled;
            }
            None => {
                info!(target: "archiver", "refresh interval not positive, polling disabled");
                inner.state = TaskState::Passive;
            }
        }
    }

    fn setup(&self) -> anyhow::Result<LookupContext> {
        let cfg = &self.shared.cfg;
        let agencies = resolve_agency_set(&cfg.agency_ids, &*self.shared.directory)?;
        let ctx = LookupContext::build(agencies, &*self.shared.directory);

        for kind in cfg.sources.missing() {
            warn!(
                target: "archiver",
                feed = %kind,
                "no {kind} url configured; this is most likely a configuration issue"
            );
        }
        Ok(ctx)
    }

    pub fn status(&self) -> TaskStatus {
        let cfg = &self.shared.cfg;
        let inner = self.lock();
        TaskStatus {
            state: inner.state,
            ready: self.shared.gate.is_ready(),
            refresh_interval_secs: cfg.refresh_interval.map(|d| d.as_secs()),
            agency_ids: inner.ctx.as_ref().map(|c| c.agency_ids().to_vec()),
            sources: FeedKind::ALL
                .into_iter()
                .map(|feed| SourceStatus {
                    feed,
                    url: cfg.sources.url(feed).map(|u| u.to_string()),
                })
                .collect(),
        }
    }
}
