//! All events of all aggregates in one stream.
use async_trait::async_trait;
use tracing::{instrument, warn};

use crate::{
    AggregateType, AggregateTypeProvider, AppendCondition, Error, Event, ExpectedVersion,
    PendingEvent, Result, StoredEvent, StreamName,
    store::EventStore,
    strategy::{
        StreamStrategy, aggregate_filter, ensure_aggregate_id, ensure_min_version, stamp,
        type_of_first_event,
    },
};

/// Keeps the events of every aggregate in a single shared stream.
///
/// Only the aggregate id is used to find an aggregate's events again, so ids
/// must be unique across all aggregate types. The repository aggregate type
/// is ignored entirely, which also makes this strategy suitable for
/// aggregate hierarchies: each event carries the concrete type of the root
/// that recorded it, and [`get_aggregate_root_type`] reads it back from the
/// first event.
///
/// [`get_aggregate_root_type`]: StreamStrategy::get_aggregate_root_type
#[derive(Debug, Clone)]
pub struct SingleStreamStrategy<E: Event> {
    store: EventStore<E>,
    stream_name: StreamName,
}

impl<E: Event> SingleStreamStrategy<E> {
    /// Creates a strategy writing to `stream_name`.
    pub fn new(store: EventStore<E>, stream_name: StreamName) -> Self {
        Self { store, stream_name }
    }

    /// Creates a strategy writing to the default `event_stream`.
    pub fn with_default_stream(store: EventStore<E>) -> Self {
        Self::new(store, StreamName::default_stream())
    }

    /// Returns the shared stream.
    pub fn stream_name(&self) -> &StreamName {
        &self.stream_name
    }

    async fn write(
        &self,
        aggregate_id: &str,
        events: Vec<PendingEvent<E>>,
        aggregate_root: &dyn AggregateTypeProvider,
        expected_version: ExpectedVersion,
    ) -> Result<()> {
        let events = stamp(
            events,
            &aggregate_root.aggregate_type(),
            aggregate_id,
            expected_version,
        )?;
        let condition = AppendCondition {
            filter: aggregate_filter(aggregate_id),
            expected_version,
        };
        self.store
            .append_to(&self.stream_name, events, &condition)
            .await
    }
}

#[async_trait]
impl<E: Event> StreamStrategy<E> for SingleStreamStrategy<E> {
    #[instrument(skip(self, events, aggregate_root), fields(stream = %self.stream_name, repository_aggregate_type = %repository_aggregate_type))]
    async fn add_events_for_new_aggregate_root(
        &self,
        repository_aggregate_type: &AggregateType,
        aggregate_id: &str,
        events: Vec<PendingEvent<E>>,
        aggregate_root: &dyn AggregateTypeProvider,
        expected_version: ExpectedVersion,
    ) -> Result<()> {
        // The shared stream already exists or is created lazily by the
        // adapter, so there is no separate create step.
        self.write(aggregate_id, events, aggregate_root, expected_version)
            .await
    }

    #[instrument(skip(self, events, aggregate_root), fields(stream = %self.stream_name, repository_aggregate_type = %repository_aggregate_type))]
    async fn append_events(
        &self,
        repository_aggregate_type: &AggregateType,
        aggregate_id: &str,
        events: Vec<PendingEvent<E>>,
        aggregate_root: &dyn AggregateTypeProvider,
        expected_version: ExpectedVersion,
    ) -> Result<()> {
        self.write(aggregate_id, events, aggregate_root, expected_version)
            .await
    }

    #[instrument(skip(self), fields(stream = %self.stream_name, repository_aggregate_type = %repository_aggregate_type))]
    async fn read(
        &self,
        repository_aggregate_type: &AggregateType,
        aggregate_id: &str,
        min_version: Option<i64>,
    ) -> Result<Vec<StoredEvent<E>>> {
        ensure_aggregate_id(aggregate_id)?;
        ensure_min_version(min_version)?;

        self.store
            .load_events_by_metadata_from(
                &self.stream_name,
                &aggregate_filter(aggregate_id),
                min_version,
            )
            .await
    }

    fn get_aggregate_root_type(
        &self,
        _repository_aggregate_type: &AggregateType,
        events: &[StoredEvent<E>],
    ) -> Result<AggregateType> {
        type_of_first_event(events).ok_or_else(|| {
            warn!(
                stream = %self.stream_name,
                events = events.len(),
                "aggregate type missing from history"
            );
            Error::TypeUndetectable
        })
    }
}
