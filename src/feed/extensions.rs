// src/feed/extensions.rs
//! Process-wide registry of the feed extensions the decoder recognizes.

use once_cell::sync::Lazy;

use super::gtfs_realtime::FeedMessage;

/// Message type an extension attaches to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Extendee {
    FeedEntity,
    TripUpdate,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Extension {
    pub extendee: Extendee,
    pub field_number: u32,
    pub name: &'static str,
}

pub const OBA_FEED_ENTITY: Extension = Extension {
    extendee: Extendee::FeedEntity,
    field_number: 1000,
    name: "obaFeedEntity",
};

pub const OBA_TRIP_UPDATE: Extension = Extension {
    extendee: Extendee::TripUpdate,
    field_number: 1000,
    name: "obaTripUpdate",
};

/// Set of extensions applied to every decoded feed.
///
/// Extension payloads whose field is not registered are discarded after
/// decoding, the same way a protobuf runtime leaves unregistered extensions
/// unparsed.
#[derive(Clone, Debug, Default)]
pub struct ExtensionRegistry {
    extensions: Vec<Extension>,
}

impl ExtensionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the OneBusAway entity and trip-update extensions.
    pub fn onebusaway() -> Self {
        Self::new().with(OBA_FEED_ENTITY).with(OBA_TRIP_UPDATE)
    }

    pub fn with(mut self, ext: Extension) -> Self {
        if !self.extensions.contains(&ext) {
            self.extensions.push(ext);
        }
        self
    }

    pub fn contains(&self, extendee: Extendee, field_number: u32) -> bool {
        self.extensions
            .iter()
            .any(|e| e.extendee == extendee && e.field_number == field_number)
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.extensions.iter().map(|e| e.name).collect()
    }

    /// Drop extension payloads this registry does not know about.
    pub fn retain_registered(&self, feed: &mut FeedMessage) {
        let keep_entity = self.contains(OBA_FEED_ENTITY.extendee, OBA_FEED_ENTITY.field_number);
        let keep_trip = self.contains(OBA_TRIP_UPDATE.extendee, OBA_TRIP_UPDATE.field_number);

        for entity in &mut feed.entity {
            if !keep_entity {
                entity.oba_feed_entity = None;
            }
            if !keep_trip {
                if let Some(tu) = entity.trip_update.as_mut() {
                    tu.oba_trip_update = None;
                }
            }
        }
    }
}

static REGISTRY: Lazy<ExtensionRegistry> = Lazy::new(ExtensionRegistry::onebusaway);

/// The shared registry used by every source role.
pub fn registry() -> &'static ExtensionRegistry {
    &REGISTRY
}
