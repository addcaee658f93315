// src/feed/mod.rs
pub mod extensions;
pub mod gtfs_realtime;
pub mod transport;

use std::fmt;

use metrics::{counter, histogram};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::FeedError;
use extensions::ExtensionRegistry;
use gtfs_realtime::FeedMessage;
use transport::FeedTransport;

/// The three feed roles a GTFS-realtime producer publishes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FeedKind {
    TripUpdates,
    VehiclePositions,
    Alerts,
}

impl FeedKind {
    /// Dispatch order.
    pub const ALL: [FeedKind; 3] = [
        FeedKind::TripUpdates,
        FeedKind::VehiclePositions,
        FeedKind::Alerts,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            FeedKind::TripUpdates => "trip-updates",
            FeedKind::VehiclePositions => "vehicle-positions",
            FeedKind::Alerts => "alerts",
        }
    }
}

impl fmt::Display for FeedKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Endpoint per role. `None` is a valid configuration: the role is archived
/// as an empty feed.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedSources {
    pub trip_updates: Option<Url>,
    pub vehicle_positions: Option<Url>,
    pub alerts: Option<Url>,
}

impl FeedSources {
    pub fn url(&self, kind: FeedKind) -> Option<&Url> {
        match kind {
            FeedKind::TripUpdates => self.trip_updates.as_ref(),
            FeedKind::VehiclePositions => self.vehicle_positions.as_ref(),
            FeedKind::Alerts => self.alerts.as_ref(),
        }
    }

    /// Roles with no endpoint, in dispatch order.
    pub fn missing(&self) -> Vec<FeedKind> {
        FeedKind::ALL
            .into_iter()
            .filter(|k| self.url(*k).is_none())
            .collect()
    }
}

/// Decode a GTFS-realtime payload and drop extensions `registry` does not know.
pub fn decode_feed(
    bytes: &[u8],
    registry: &ExtensionRegistry,
) -> Result<FeedMessage, prost::DecodeError> {
    use prost::Message;
    let mut feed = FeedMessage::decode(bytes)?;
    registry.retain_registered(&mut feed);
    Ok(feed)
}

/// Fetch and decode one endpoint.
///
/// The stream is closed on every path. A failed close is logged and never
/// replaces the outcome of the read.
pub async fn read_feed(
    transport: &dyn FeedTransport,
    url: &Url,
    registry: &ExtensionRegistry,
) -> Result<FeedMessage, FeedError> {
    let t0 = std::time::Instant::now();
    let mut stream = transport.open(url).await?;

    let decoded = match stream.read_all().await {
        Ok(bytes) => decode_feed(&bytes, registry).map_err(|source| FeedError::Decode {
            url: url.clone(),
            source,
        }),
        Err(e) => Err(e),
    };

    if let Err(e) = stream.close().await {
        tracing::error!(url = %url, error = %e, "error closing feed stream");
        counter!("archiver_stream_close_errors_total").increment(1);
    }

    histogram!("archiver_fetch_ms").record(t0.elapsed().as_secs_f64() * 1_000.0);
    decoded
}

/// `read_feed` for a configured role, or the empty feed when the role has no endpoint.
pub async fn read_or_default(
    transport: &dyn FeedTransport,
    url: Option<&Url>,
    registry: &ExtensionRegistry,
) -> Result<FeedMessage, FeedError> {
    match url {
        Some(url) => read_feed(transport, url, registry).await,
        None => Ok(FeedMessage::empty()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use prost::Message;

    #[test]
    fn kinds_are_ordered_for_dispatch() {
        let names: Vec<_> = FeedKind::ALL.iter().map(|k| k.as_str()).collect();
        assert_eq!(names, vec!["trip-updates", "vehicle-positions", "alerts"]);
    }

    #[test]
    fn missing_lists_unset_roles() {
        let sources = FeedSources {
            trip_updates: Some(Url::parse("https://x.test/tu").unwrap()),
            ..Default::default()
        };
        assert_eq!(
            sources.missing(),
            vec![FeedKind::VehiclePositions, FeedKind::Alerts]
        );
    }

    #[test]
    fn garbage_does_not_decode() {
        let err = decode_feed(&[0xff, 0xff, 0xff], extensions::registry());
        assert!(err.is_err());
    }

    #[test]
    fn decode_keeps_entities() {
        let mut m = FeedMessage::empty();
        m.header.timestamp = Some(1_700_000_000);
        m.entity.push(gtfs_realtime::FeedEntity {
            id: "v1".into(),
            ..Default::default()
        });
        let back = decode_feed(&m.encode_to_vec(), extensions::registry()).unwrap();
        assert_eq!(back.entity.len(), 1);
        assert_eq!(back.header.timestamp, Some(1_700_000_000));
    }
}
