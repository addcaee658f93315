// tests/common/mod.rs
//
// Shared fakes for the integration tests: an in-memory transport keyed by
// URL and a directory that counts how often it is listed.
#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use prost::Message;
use url::Url;

use gtfs_realtime_archiver::agency::{AgencyDirectory, AgencyEntry};
use gtfs_realtime_archiver::error::FeedError;
use gtfs_realtime_archiver::feed::gtfs_realtime::{
    FeedEntity, FeedHeader, FeedMessage, TripDescriptor, TripUpdate, GTFS_REALTIME_VERSION,
};
use gtfs_realtime_archiver::feed::transport::{FeedStream, FeedTransport};

#[derive(Clone)]
pub enum Reply {
    Bytes(Vec<u8>),
    OpenError,
    ReadError,
}

/// Serves canned replies; URLs without one fail to open.
#[derive(Default)]
pub struct MockTransport {
    replies: Mutex<HashMap<String, Reply>>,
    pub opens: AtomicUsize,
    pub closes: Arc<AtomicUsize>,
    pub fail_close: bool,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_close() -> Self {
        Self {
            fail_close: true,
            ..Self::default()
        }
    }

    pub fn serve(&self, url: &Url, reply: Reply) {
        self.replies
            .lock()
            .unwrap()
            .insert(url.to_string(), reply);
    }

    pub fn opens(&self) -> usize {
        self.opens.load(Ordering::SeqCst)
    }

    pub fn closes(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }
}

fn io_err(url: &Url, msg: &str) -> FeedError {
    FeedError::Io {
        url: url.clone(),
        source: std::io::Error::new(std::io::ErrorKind::Other, msg.to_string()),
    }
}

#[async_trait]
impl FeedTransport for MockTransport {
    async fn open(&self, url: &Url) -> Result<Box<dyn FeedStream>, FeedError> {
        self.opens.fetch_add(1, Ordering::SeqCst);
        let reply = self.replies.lock().unwrap().get(url.as_str()).cloned();
        match reply {
            None | Some(Reply::OpenError) => Err(io_err(url, "connection refused")),
            Some(reply) => Ok(Box::new(MockStream {
                url: url.clone(),
                reply,
                closes: Arc::clone(&self.closes),
                fail_close: self.fail_close,
            })),
        }
    }
}

struct MockStream {
    url: Url,
    reply: Reply,
    closes: Arc<AtomicUsize>,
    fail_close: bool,
}

#[async_trait]
impl FeedStream for MockStream {
    async fn read_all(&mut self) -> Result<Vec<u8>, FeedError> {
        match &self.reply {
            Reply::Bytes(b) => Ok(b.clone()),
            _ => Err(io_err(&self.url, "connection reset")),
        }
    }

    async fn close(self: Box<Self>) -> Result<(), FeedError> {
        self.closes.fetch_add(1, Ordering::SeqCst);
        if self.fail_close {
            return Err(io_err(&self.url, "close failed"));
        }
        Ok(())
    }
}

/// Directory with a fixed agency list that counts `all_agencies` calls.
#[derive(Default)]
pub struct CountingDirectory {
    pub agencies: Vec<AgencyEntry>,
    pub listings: AtomicUsize,
    pub fail: bool,
}

impl CountingDirectory {
    pub fn with_ids(ids: &[&str]) -> Self {
        Self {
            agencies: ids
                .iter()
                .map(|id| AgencyEntry {
                    id: id.to_string(),
                    name: format!("Agency {id}"),
                    timezone: None,
                })
                .collect(),
            ..Self::default()
        }
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn listings(&self) -> usize {
        self.listings.load(Ordering::SeqCst)
    }
}

impl AgencyDirectory for CountingDirectory {
    fn all_agencies(&self) -> anyhow::Result<Vec<AgencyEntry>> {
        self.listings.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            anyhow::bail!("transit graph not loaded");
        }
        Ok(self.agencies.clone())
    }

    fn agency(&self, id: &str) -> Option<AgencyEntry> {
        self.agencies.iter().find(|a| a.id == id).cloned()
    }
}

pub fn url(s: &str) -> Url {
    Url::parse(s).unwrap()
}

/// A trip-updates feed with one entity per trip id.
pub fn trip_updates(ts: u64, trips: &[&str]) -> FeedMessage {
    FeedMessage {
        header: FeedHeader {
            gtfs_realtime_version: GTFS_REALTIME_VERSION.to_string(),
            timestamp: Some(ts),
            ..Default::default()
        },
        entity: trips
            .iter()
            .map(|t| FeedEntity {
                id: t.to_string(),
                trip_update: Some(TripUpdate {
                    trip: TripDescriptor {
                        trip_id: Some(t.to_string()),
                        ..Default::default()
                    },
                    ..Default::default()
                }),
                ..Default::default()
            })
            .collect(),
    }
}

pub fn encode(feed: &FeedMessage) -> Vec<u8> {
    feed.encode_to_vec()
}

/// One event seen by [`CaptureLayer`], with its fields rendered as strings.
#[derive(Debug, Clone)]
pub struct CapturedEvent {
    pub level: tracing::Level,
    pub target: String,
    pub fields: HashMap<String, String>,
}

impl CapturedEvent {
    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields.get(name).map(String::as_str)
    }

    pub fn message(&self) -> &str {
        self.field("message").unwrap_or_default()
    }
}

#[derive(Default)]
struct FieldMap(HashMap<String, String>);

impl tracing::field::Visit for FieldMap {
    fn record_str(&mut self, field: &tracing::field::Field, value: &str) {
        self.0.insert(field.name().to_string(), value.to_string());
    }

    fn record_debug(&mut self, field: &tracing::field::Field, value: &dyn std::fmt::Debug) {
        self.0.insert(field.name().to_string(), format!("{value:?}"));
    }
}

/// Layer that keeps every event for later assertions.
#[derive(Clone, Default)]
pub struct CaptureLayer {
    events: Arc<Mutex<Vec<CapturedEvent>>>,
}

impl CaptureLayer {
    pub fn events(&self) -> Vec<CapturedEvent> {
        self.events.lock().unwrap().clone()
    }

    pub fn warnings(&self) -> Vec<CapturedEvent> {
        self.events()
            .into_iter()
            .filter(|e| e.level == tracing::Level::WARN)
            .collect()
    }

    /// A subscriber that feeds this layer; install with `with_default` or `set_default`.
    pub fn subscriber(&self) -> impl tracing::Subscriber + Send + Sync {
        use tracing_subscriber::layer::SubscriberExt;
        tracing_subscriber::registry().with(self.clone())
    }
}

impl<S: tracing::Subscriber> tracing_subscriber::Layer<S> for CaptureLayer {
    fn on_event(
        &self,
        event: &tracing::Event<'_>,
        _ctx: tracing_subscriber::layer::Context<'_, S>,
    ) {
        let mut fields = FieldMap::default();
        event.record(&mut fields);
        self.events.lock().unwrap().push(CapturedEvent {
            level: *event.metadata().level(),
            target: event.metadata().target().to_string(),
            fields: fields.0,
        });
    }
}
