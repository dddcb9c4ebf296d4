//! The storage adapter contract and its implementations.
//!
//! An [`Adapter`] owns the physical streams. Strategies never touch storage
//! directly; they only call the three operations below through the
//! [`EventStore`](crate::store::EventStore).

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::{Error, Event, Metadata, Result, StoredEvent, StreamName};

// The in-memory implementation is compiled when the `in-memory` feature is
// enabled (this is the default).
#[cfg(feature = "in-memory")]
/// An in-memory adapter.
pub mod in_memory;

#[cfg(feature = "sled-storage")]
/// A persistent adapter using `sled`.
pub mod sled;

#[cfg(feature = "postgres-storage")]
pub mod sqlx_postgres;

/// The version an append expects the aggregate to be at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExpectedVersion {
    /// Skip the check.
    Any,
    /// The highest stored version must equal this value; `Exact(0)` means no
    /// event may exist yet.
    Exact(i64),
}

impl ExpectedVersion {
    /// Checks the expectation against the version currently stored.
    pub fn check(self, actual: i64) -> Result<()> {
        match self {
            Self::Exact(expected) if expected != actual => {
                Err(Error::ConcurrencyConflict { expected, actual })
            }
            _ => Ok(()),
        }
    }
}

/// Guards an append: the highest version among the stream's events matching
/// `filter` must satisfy `expected_version`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppendCondition {
    /// Selects the events that belong to the aggregate being written.
    pub filter: Metadata,
    /// The version those events must currently be at.
    pub expected_version: ExpectedVersion,
}

impl AppendCondition {
    /// A condition that always holds.
    pub fn none() -> Self {
        Self {
            filter: Metadata::new(),
            expected_version: ExpectedVersion::Any,
        }
    }

    /// Checks the condition against the events currently in the stream.
    pub fn check<'a, E, I>(&self, existing: I) -> Result<()>
    where
        E: Event,
        I: IntoIterator<Item = &'a StoredEvent<E>>,
    {
        if self.expected_version == ExpectedVersion::Any {
            return Ok(());
        }
        let actual = existing
            .into_iter()
            .filter(|e| e.matches(&self.filter))
            .map(StoredEvent::version)
            .max()
            .unwrap_or(0);
        self.expected_version.check(actual)
    }
}

/// The contract a storage backend must satisfy.
///
/// Implementations must make each `create`/`append` call atomic: readers see
/// either the whole batch or none of it, and batches of concurrent calls to
/// the same stream never interleave.
#[async_trait]
pub trait Adapter<E: Event>: Send + Sync {
    /// Creates `stream` with its first batch of events.
    ///
    /// Fails with [`Error::StreamAlreadyExists`] if the stream already holds
    /// events.
    async fn create(&self, stream: &StreamName, events: Vec<StoredEvent<E>>) -> Result<()>;

    /// Appends `events` to `stream` in the given order, creating the stream
    /// when it does not exist yet.
    ///
    /// The `condition` is checked inside the same atomic section as the write
    /// and fails with [`Error::ConcurrencyConflict`] when it does not hold.
    async fn append(
        &self,
        stream: &StreamName,
        events: Vec<StoredEvent<E>>,
        condition: &AppendCondition,
    ) -> Result<()>;

    /// Returns every event of `stream` whose metadata contains all entries of
    /// `filter` and whose version is at least `min_version`, ascending by
    /// version. Unknown streams yield an empty list.
    async fn read_by_metadata(
        &self,
        stream: &StreamName,
        filter: &Metadata,
        min_version: Option<i64>,
    ) -> Result<Vec<StoredEvent<E>>>;
}

/// Filters and orders events the way [`Adapter::read_by_metadata`] requires.
///
/// Only matching events are cloned. The sort is stable, so events sharing a
/// version keep their append order.
pub(crate) fn select<'a, E: Event>(
    events: impl IntoIterator<Item = &'a StoredEvent<E>>,
    filter: &Metadata,
    min_version: Option<i64>,
) -> Vec<StoredEvent<E>> {
    let mut selected: Vec<_> = events
        .into_iter()
        .filter(|e| e.matches(filter))
        .filter(|e| min_version.is_none_or(|min| e.version() >= min))
        .cloned()
        .collect();
    selected.sort_by_key(StoredEvent::version);
    selected
}

#[cfg(test)]
mod tests {
    use serde::{Deserialize, Serialize};

    use super::*;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Noted(u8);

    impl Event for Noted {
        fn event_type(&self) -> &'static str {
            "Noted"
        }

        fn event_version(&self) -> u16 {
            1
        }
    }

    fn event(version: i64, owner: &str) -> StoredEvent<Noted> {
        let metadata = Metadata::from([("owner".to_string(), owner.to_string())]);
        StoredEvent::new(version, "Noted".to_string(), 1, metadata, Noted(0))
    }

    #[test]
    fn select_keeps_matching_events_from_min_version() {
        let stream = vec![event(2, "a"), event(1, "b"), event(1, "a"), event(3, "a")];
        let filter = Metadata::from([("owner".to_string(), "a".to_string())]);

        let versions: Vec<_> = select(&stream, &filter, Some(2))
            .iter()
            .map(StoredEvent::version)
            .collect();
        assert_eq!(versions, vec![2, 3]);

        let all: Vec<_> = select(&stream, &Metadata::new(), None)
            .iter()
            .map(StoredEvent::version)
            .collect();
        assert_eq!(all, vec![1, 1, 2, 3]);
        assert_eq!(stream.len(), 4, "the source stream is left untouched");
    }

    #[test]
    fn exact_expectation_uses_the_highest_matching_version() {
        let stream = vec![event(1, "a"), event(5, "b"), event(2, "a")];
        let condition = AppendCondition {
            filter: Metadata::from([("owner".to_string(), "a".to_string())]),
            expected_version: ExpectedVersion::Exact(1),
        };
        assert_eq!(
            condition.check(&stream),
            Err(Error::ConcurrencyConflict {
                expected: 1,
                actual: 2
            })
        );
        assert!(AppendCondition::none().check(&stream).is_ok());
    }
}
