//! # GTFS-realtime messages
//!
//! Rust representations of the GTFS-realtime `FeedMessage` container and the
//! OneBusAway extension messages, decoded with `prost`. Only the parts of the
//! schema that archival consumers read are modelled; unknown fields are
//! skipped by the decoder.
//!
//! Extension fields are declared as ordinary fields at their extension tag
//! (`1000`). Whether they survive decoding is decided by the
//! [`ExtensionRegistry`](super::extensions::ExtensionRegistry).

use prost::Message;

/// Protocol version stamped into synthesized headers.
pub const GTFS_REALTIME_VERSION: &str = "1.0";

/// Top-level container served by every GTFS-realtime endpoint.
#[derive(Clone, PartialEq, Message)]
pub struct FeedMessage {
    /// Metadata about this feed and feed message.
    #[prost(message, required, tag = "1")]
    pub header: FeedHeader,

    /// Contents of the feed.
    #[prost(message, repeated, tag = "2")]
    pub entity: Vec<FeedEntity>,
}

impl FeedMessage {
    /// Header-only message stamped with [`GTFS_REALTIME_VERSION`].
    ///
    /// Used in place of a fetch when a source has no endpoint configured.
    pub fn empty() -> Self {
        Self {
            header: FeedHeader {
                gtfs_realtime_version: GTFS_REALTIME_VERSION.to_string(),
                incrementality: None,
                timestamp: None,
            },
            entity: Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.entity.is_empty()
    }
}

/// Metadata about a feed, included in feed messages.
#[derive(Clone, PartialEq, Message)]
pub struct FeedHeader {
    #[prost(string, required, tag = "1")]
    pub gtfs_realtime_version: String,

    /// Maps to [`Incrementality`].
    #[prost(enumeration = "Incrementality", optional, tag = "2")]
    pub incrementality: Option<i32>,

    /// POSIX time at which the content of this feed was created.
    #[prost(uint64, optional, tag = "3")]
    pub timestamp: Option<u64>,
}

/// Whether the feed replaces the previous snapshot or adds to it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, prost::Enumeration)]
#[repr(i32)]
pub enum Incrementality {
    FullDataset = 0,
    Differential = 1,
}

/// A definition (or update) of an entity in the transit feed.
#[derive(Clone, PartialEq, Message)]
pub struct FeedEntity {
    #[prost(string, required, tag = "1")]
    pub id: String,

    #[prost(bool, optional, tag = "2")]
    pub is_deleted: Option<bool>,

    #[prost(message, optional, tag = "3")]
    pub trip_update: Option<TripUpdate>,

    #[prost(message, optional, tag = "4")]
    pub vehicle: Option<VehiclePosition>,

    #[prost(message, optional, tag = "5")]
    pub alert: Option<Alert>,

    /// `obaFeedEntity` extension.
    #[prost(message, optional, tag = "1000")]
    pub oba_feed_entity: Option<OneBusAwayFeedEntity>,
}

/// Realtime update on the progress of a vehicle along a trip.
#[derive(Clone, PartialEq, Message)]
pub struct TripUpdate {
    #[prost(message, required, tag = "1")]
    pub trip: TripDescriptor,

    #[prost(message, repeated, tag = "2")]
    pub stop_time_update: Vec<StopTimeUpdate>,

    #[prost(message, optional, tag = "3")]
    pub vehicle: Option<VehicleDescriptor>,

    #[prost(uint64, optional, tag = "4")]
    pub timestamp: Option<u64>,

    #[prost(int32, optional, tag = "5")]
    pub delay: Option<i32>,

    /// `obaTripUpdate` extension.
    #[prost(message, optional, tag = "1000")]
    pub oba_trip_update: Option<OneBusAwayTripUpdate>,
}

#[derive(Clone, PartialEq, Message)]
pub struct StopTimeUpdate {
    #[prost(uint32, optional, tag = "1")]
    pub stop_sequence: Option<u32>,

    #[prost(message, optional, tag = "2")]
    pub arrival: Option<StopTimeEvent>,

    #[prost(message, optional, tag = "3")]
    pub departure: Option<StopTimeEvent>,

    #[prost(string, optional, tag = "4")]
    pub stop_id: Option<String>,

    /// Maps to [`StopScheduleRelationship`].
    #[prost(enumeration = "StopScheduleRelationship", optional, tag = "5")]
    pub schedule_relationship: Option<i32>,
}

#[derive(Clone, PartialEq, Message)]
pub struct StopTimeEvent {
    #[prost(int32, optional, tag = "1")]
    pub delay: Option<i32>,

    #[prost(int64, optional, tag = "2")]
    pub time: Option<i64>,

    #[prost(int32, optional, tag = "3")]
    pub uncertainty: Option<i32>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, prost::Enumeration)]
#[repr(i32)]
pub enum StopScheduleRelationship {
    Scheduled = 0,
    Skipped = 1,
    NoData = 2,
}

/// Realtime positioning information for a given vehicle.
#[derive(Clone, PartialEq, Message)]
pub struct VehiclePosition {
    #[prost(message, optional, tag = "1")]
    pub trip: Option<TripDescriptor>,

    #[prost(message, optional, tag = "2")]
    pub position: Option<Position>,

    #[prost(uint32, optional, tag = "3")]
    pub current_stop_sequence: Option<u32>,

    /// Maps to [`VehicleStopStatus`].
    #[prost(enumeration = "VehicleStopStatus", optional, tag = "4")]
    pub current_status: Option<i32>,

    #[prost(uint64, optional, tag = "5")]
    pub timestamp: Option<u64>,

    #[prost(string, optional, tag = "7")]
    pub stop_id: Option<String>,

    #[prost(message, optional, tag = "8")]
    pub vehicle: Option<VehicleDescriptor>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, prost::Enumeration)]
#[repr(i32)]
pub enum VehicleStopStatus {
    IncomingAt = 0,
    StoppedAt = 1,
    InTransitTo = 2,
}

/// A geographic position of a vehicle (WGS-84).
#[derive(Clone, PartialEq, Message)]
pub struct Position {
    #[prost(float, required, tag = "1")]
    pub latitude: f32,

    #[prost(float, required, tag = "2")]
    pub longitude: f32,

    #[prost(float, optional, tag = "3")]
    pub bearing: Option<f32>,

    #[prost(double, optional, tag = "4")]
    pub odometer: Option<f64>,

    /// Momentary speed in meters per second.
    #[prost(float, optional, tag = "5")]
    pub speed: Option<f32>,
}

/// An alert, indicating some sort of incident in the public transit network.
#[derive(Clone, PartialEq, Message)]
pub struct Alert {
    #[prost(message, repeated, tag = "1")]
    pub active_period: Vec<TimeRange>,

    #[prost(message, repeated, tag = "5")]
    pub informed_entity: Vec<EntitySelector>,

    /// Maps to [`AlertCause`].
    #[prost(enumeration = "AlertCause", optional, tag = "6")]
    pub cause: Option<i32>,

    /// Maps to [`AlertEffect`].
    #[prost(enumeration = "AlertEffect", optional, tag = "7")]
    pub effect: Option<i32>,

    #[prost(message, optional, tag = "8")]
    pub url: Option<TranslatedString>,

    #[prost(message, optional, tag = "10")]
    pub header_text: Option<TranslatedString>,

    #[prost(message, optional, tag = "11")]
    pub description_text: Option<TranslatedString>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, prost::Enumeration)]
#[repr(i32)]
pub enum AlertCause {
    UnknownCause = 1,
    OtherCause = 2,
    TechnicalProblem = 3,
    Strike = 4,
    Demonstration = 5,
    Accident = 6,
    Holiday = 7,
    Weather = 8,
    Maintenance = 9,
    Construction = 10,
    PoliceActivity = 11,
    MedicalEmergency = 12,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, prost::Enumeration)]
#[repr(i32)]
pub enum AlertEffect {
    NoService = 1,
    ReducedService = 2,
    SignificantDelays = 3,
    Detour = 4,
    AdditionalService = 5,
    ModifiedService = 6,
    OtherEffect = 7,
    UnknownEffect = 8,
    StopMoved = 9,
}

#[derive(Clone, PartialEq, Message)]
pub struct TimeRange {
    #[prost(uint64, optional, tag = "1")]
    pub start: Option<u64>,

    #[prost(uint64, optional, tag = "2")]
    pub end: Option<u64>,
}

/// A selector for an entity in a GTFS feed.
#[derive(Clone, PartialEq, Message)]
pub struct EntitySelector {
    #[prost(string, optional, tag = "1")]
    pub agency_id: Option<String>,

    #[prost(string, optional, tag = "2")]
    pub route_id: Option<String>,

    #[prost(int32, optional, tag = "3")]
    pub route_type: Option<i32>,

    #[prost(message, optional, tag = "4")]
    pub trip: Option<TripDescriptor>,

    #[prost(string, optional, tag = "5")]
    pub stop_id: Option<String>,
}

#[derive(Clone, PartialEq, Message)]
pub struct TranslatedString {
    #[prost(message, repeated, tag = "1")]
    pub translation: Vec<Translation>,
}

#[derive(Clone, PartialEq, Message)]
pub struct Translation {
    #[prost(string, required, tag = "1")]
    pub text: String,

    #[prost(string, optional, tag = "2")]
    pub language: Option<String>,
}

/// Identifies an instance of a GTFS trip.
#[derive(Clone, PartialEq, Message)]
pub struct TripDescriptor {
    #[prost(string, optional, tag = "1")]
    pub trip_id: Option<String>,

    #[prost(string, optional, tag = "2")]
    pub start_time: Option<String>,

    #[prost(string, optional, tag = "3")]
    pub start_date: Option<String>,

    /// Maps to [`TripScheduleRelationship`].
    #[prost(enumeration = "TripScheduleRelationship", optional, tag = "4")]
    pub schedule_relationship: Option<i32>,

    #[prost(string, optional, tag = "5")]
    pub route_id: Option<String>,

    #[prost(uint32, optional, tag = "6")]
    pub direction_id: Option<u32>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, prost::Enumeration)]
#[repr(i32)]
pub enum TripScheduleRelationship {
    Scheduled = 0,
    Added = 1,
    Unscheduled = 2,
    Canceled = 3,
}

/// Identification information for the vehicle performing the trip.
#[derive(Clone, PartialEq, Message)]
pub struct VehicleDescriptor {
    #[prost(string, optional, tag = "1")]
    pub id: Option<String>,

    #[prost(string, optional, tag = "2")]
    pub label: Option<String>,

    #[prost(string, optional, tag = "3")]
    pub license_plate: Option<String>,
}

/// OneBusAway extension carried on `FeedEntity`.
#[derive(Clone, PartialEq, Message)]
pub struct OneBusAwayFeedEntity {
    /// Identifies the upstream system that produced the entity.
    #[prost(string, optional, tag = "1")]
    pub source: Option<String>,
}

/// OneBusAway extension carried on `TripUpdate`.
#[derive(Clone, PartialEq, Message)]
pub struct OneBusAwayTripUpdate {
    #[prost(int32, optional, tag = "1")]
    pub delay: Option<i32>,

    #[prost(uint64, optional, tag = "2")]
    pub timestamp: Option<u64>,
}
