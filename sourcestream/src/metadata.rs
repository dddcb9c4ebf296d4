//! Stamping metadata onto events before they are persisted.
use crate::{Event, PendingEvent};

/// Metadata key holding the concrete type name of the aggregate root that
/// recorded the event.
pub const AGGREGATE_TYPE_KEY: &str = "aggregate_type";

/// Metadata key holding the identifier of the aggregate root that recorded
/// the event.
pub const AGGREGATE_ID_KEY: &str = "aggregate_id";

/// Writes metadata onto pending events.
///
/// Stored events are immutable; this is the only way to change an event's
/// metadata, and only while it is still pending.
#[derive(Debug, Clone, Copy, Default)]
pub struct MetadataWriter;

impl MetadataWriter {
    /// Sets `key` to `value` on the event, replacing any previous value.
    pub fn set_metadata_key<E: Event>(
        event: &mut PendingEvent<E>,
        key: impl Into<String>,
        value: impl Into<String>,
    ) {
        event.metadata.insert(key.into(), value.into());
    }
}

#[cfg(test)]
mod tests {
    use serde::{Deserialize, Serialize};

    use super::*;

    #[derive(Debug, Clone, Serialize, Deserialize)]
    struct Noted;

    impl Event for Noted {
        fn event_type(&self) -> &'static str {
            "Noted"
        }

        fn event_version(&self) -> u16 {
            1
        }
    }

    #[test]
    fn last_write_wins() {
        let mut event = PendingEvent::new(1, Noted);
        MetadataWriter::set_metadata_key(&mut event, AGGREGATE_ID_KEY, "a");
        MetadataWriter::set_metadata_key(&mut event, AGGREGATE_ID_KEY, "b");

        assert_eq!(event.metadata().len(), 1);
        assert_eq!(event.metadata()[AGGREGATE_ID_KEY], "b");
    }

    #[test]
    fn other_keys_are_left_alone() {
        let mut event = PendingEvent::new(1, Noted);
        MetadataWriter::set_metadata_key(&mut event, "correlation_id", "c-1");
        MetadataWriter::set_metadata_key(&mut event, AGGREGATE_TYPE_KEY, "User");

        let stored = event.freeze();
        assert_eq!(stored.metadata_value("correlation_id"), Some("c-1"));
        assert_eq!(stored.metadata_value(AGGREGATE_TYPE_KEY), Some("User"));
        assert_eq!(stored.event_type(), "Noted");
    }
}
