//! An in-memory adapter, useful for testing and development.

use std::sync::Arc;

use async_trait::async_trait;
use dashmap::{DashMap, mapref::entry::Entry};
use tracing::{debug, instrument};

use crate::{
    Error, Event, Metadata, Result, StoredEvent, StreamName,
    adapter::{Adapter, AppendCondition, select},
};

// Type aliases to keep complex generic types readable and satisfy clippy::type-complexity.
type EventStream<E> = Vec<StoredEvent<E>>;

/// Thread-safe map keyed by stream name
type StreamMap<E> = DashMap<StreamName, EventStream<E>>;

/// An in-memory, thread-safe adapter.
///
/// Each stream is a vector in append order. A write holds the stream's map
/// entry for its whole duration, which makes the condition check and the
/// append a single atomic step.
pub struct InMemoryAdapter<E: Event> {
    streams: Arc<StreamMap<E>>,
}

impl<E: Event> Default for InMemoryAdapter<E> {
    fn default() -> Self {
        Self {
            streams: Arc::new(DashMap::new()),
        }
    }
}

impl<E: Event> Clone for InMemoryAdapter<E> {
    fn clone(&self) -> Self {
        Self {
            streams: Arc::clone(&self.streams),
        }
    }
}

impl<E: Event> InMemoryAdapter<E> {
    /// Returns the names of all streams holding at least one event.
    pub fn stream_names(&self) -> Vec<StreamName> {
        let mut names: Vec<_> = self
            .streams
            .iter()
            .filter(|entry| !entry.value().is_empty())
            .map(|entry| entry.key().clone())
            .collect();
        names.sort();
        names
    }

    /// Returns the number of events in `stream`, in any aggregate.
    pub fn stream_len(&self, stream: &StreamName) -> usize {
        self.streams.get(stream).map_or(0, |s| s.len())
    }
}

#[async_trait]
impl<E: Event> Adapter<E> for InMemoryAdapter<E> {
    #[instrument(skip(self, events), fields(stream = %stream, count = events.len()))]
    async fn create(&self, stream: &StreamName, events: Vec<StoredEvent<E>>) -> Result<()> {
        match self.streams.entry(stream.clone()) {
            Entry::Occupied(mut entry) => {
                if !entry.get().is_empty() {
                    return Err(Error::StreamAlreadyExists(stream.to_string()));
                }
                entry.get_mut().extend(events);
            }
            Entry::Vacant(entry) => {
                entry.insert(events);
            }
        }
        debug!("stream created");
        Ok(())
    }

    #[instrument(skip(self, events, condition), fields(stream = %stream, count = events.len()))]
    async fn append(
        &self,
        stream: &StreamName,
        events: Vec<StoredEvent<E>>,
        condition: &AppendCondition,
    ) -> Result<()> {
        let mut entry = self.streams.entry(stream.clone()).or_default();

        condition.check(entry.iter())?;
        entry.extend(events);

        Ok(())
    }

    #[instrument(skip(self, filter), fields(stream = %stream))]
    async fn read_by_metadata(
        &self,
        stream: &StreamName,
        filter: &Metadata,
        min_version: Option<i64>,
    ) -> Result<Vec<StoredEvent<E>>> {
        match self.streams.get(stream) {
            Some(events) => Ok(select(events.iter(), filter, min_version)),
            None => Ok(Vec::new()),
        }
    }
}
