//! Event records, before and after they are handed to the store.
use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::Event;

/// String-keyed event metadata.
///
/// A `BTreeMap` keeps the keys ordered, so two metadata maps compare equal
/// regardless of insertion order.
pub type Metadata = BTreeMap<String, String>;

/// An event recorded by an aggregate that has not been persisted yet.
///
/// Metadata can only be changed through the [`MetadataWriter`]. The event is
/// frozen into a [`StoredEvent`] when a strategy hands it to the store.
///
/// [`MetadataWriter`]: crate::MetadataWriter
#[derive(Debug, Clone)]
pub struct PendingEvent<E: Event> {
    version: i64,
    payload: E,
    pub(crate) metadata: Metadata,
}

impl<E: Event> PendingEvent<E> {
    /// Creates a pending event with empty metadata.
    pub fn new(version: i64, payload: E) -> Self {
        Self {
            version,
            payload,
            metadata: Metadata::new(),
        }
    }

    /// Returns the version of the aggregate after this event is applied.
    pub fn version(&self) -> i64 {
        self.version
    }

    /// Returns the event payload.
    pub fn payload(&self) -> &E {
        &self.payload
    }

    /// Returns the metadata stamped so far.
    pub fn metadata(&self) -> &Metadata {
        &self.metadata
    }

    /// Freezes the event. The schema name and version are captured from the
    /// payload at this point.
    pub(crate) fn freeze(self) -> StoredEvent<E> {
        StoredEvent {
            version: self.version,
            event_type: self.payload.event_type().to_string(),
            event_version: self.payload.event_version(),
            metadata: self.metadata,
            payload: self.payload,
        }
    }
}

/// An immutable, persisted event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(bound(
    serialize = "E: Serialize",
    deserialize = "E: serde::de::DeserializeOwned"
))]
pub struct StoredEvent<E: Event> {
    /// The version of the aggregate after this event was applied.
    version: i64,
    /// The type of the event.
    event_type: String,
    /// The version of the event's schema.
    event_version: u16,
    /// Routing metadata, e.g. `aggregate_id` and `aggregate_type`.
    metadata: Metadata,
    /// The event payload itself.
    payload: E,
}

impl<E: Event> StoredEvent<E> {
    /// Rebuilds a stored event from its persisted parts.
    ///
    /// Adapters use this when reading a stream back.
    pub fn new(
        version: i64,
        event_type: String,
        event_version: u16,
        metadata: Metadata,
        payload: E,
    ) -> Self {
        Self {
            version,
            event_type,
            event_version,
            metadata,
            payload,
        }
    }

    /// Returns the version of the aggregate after this event was applied.
    pub fn version(&self) -> i64 {
        self.version
    }
    /// Returns the type of the event.
    pub fn event_type(&self) -> &str {
        &self.event_type
    }
    /// Returns the version of the event's schema.
    pub fn event_version(&self) -> u16 {
        self.event_version
    }
    /// Returns the event metadata.
    pub fn metadata(&self) -> &Metadata {
        &self.metadata
    }
    /// Returns a single metadata value.
    pub fn metadata_value(&self, key: &str) -> Option<&str> {
        self.metadata.get(key).map(String::as_str)
    }
    /// Returns the event payload itself.
    pub fn payload(&self) -> &E {
        &self.payload
    }
    /// Consumes the stored event and returns the payload.
    pub fn into_payload(self) -> E {
        self.payload
    }

    /// Returns `true` when every entry of `filter` is present with the same
    /// value in this event's metadata.
    pub fn matches(&self, filter: &Metadata) -> bool {
        filter
            .iter()
            .all(|(key, value)| self.metadata.get(key) == Some(value))
    }
}
