//! One stream per aggregate type.
use std::collections::BTreeMap;

use async_trait::async_trait;
use tracing::instrument;

use crate::{
    AggregateType, AggregateTypeProvider, AppendCondition, Event, ExpectedVersion, PendingEvent,
    Result, StoredEvent, StreamName,
    store::EventStore,
    strategy::{
        StreamStrategy, aggregate_filter, ensure_aggregate_id, ensure_min_version, stamp,
        type_of_first_event,
    },
};

/// Keeps all aggregates of one repository type in a shared stream.
///
/// The stream is looked up in the stream map by repository aggregate type;
/// unmapped types use their own name. Within the stream, aggregates are told
/// apart by their `aggregate_id` metadata.
#[derive(Debug, Clone)]
pub struct AggregateTypeStreamStrategy<E: Event> {
    store: EventStore<E>,
    stream_map: BTreeMap<AggregateType, StreamName>,
}

impl<E: Event> AggregateTypeStreamStrategy<E> {
    /// Creates the strategy; every type is stored under its own name.
    pub fn new(store: EventStore<E>) -> Self {
        Self::with_stream_map(store, BTreeMap::new())
    }

    /// Creates the strategy with explicit stream names for some types.
    pub fn with_stream_map(
        store: EventStore<E>,
        stream_map: BTreeMap<AggregateType, StreamName>,
    ) -> Self {
        Self { store, stream_map }
    }

    /// Returns the stream holding aggregates of `repository_aggregate_type`.
    pub fn stream_name(&self, repository_aggregate_type: &AggregateType) -> Result<StreamName> {
        match self.stream_map.get(repository_aggregate_type) {
            Some(stream) => Ok(stream.clone()),
            None => StreamName::new(repository_aggregate_type.as_str()),
        }
    }

    async fn write(
        &self,
        repository_aggregate_type: &AggregateType,
        aggregate_id: &str,
        events: Vec<PendingEvent<E>>,
        aggregate_root: &dyn AggregateTypeProvider,
        expected_version: ExpectedVersion,
    ) -> Result<()> {
        let stream = self.stream_name(repository_aggregate_type)?;
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
        self.store.append_to(&stream, events, &condition).await
    }
}

#[async_trait]
impl<E: Event> StreamStrategy<E> for AggregateTypeStreamStrategy<E> {
    #[instrument(skip(self, events, aggregate_root), fields(repository_aggregate_type = %repository_aggregate_type))]
    async fn add_events_for_new_aggregate_root(
        &self,
        repository_aggregate_type: &AggregateType,
        aggregate_id: &str,
        events: Vec<PendingEvent<E>>,
        aggregate_root: &dyn AggregateTypeProvider,
        expected_version: ExpectedVersion,
    ) -> Result<()> {
        self.write(
            repository_aggregate_type,
            aggregate_id,
            events,
            aggregate_root,
            expected_version,
        )
        .await
    }

    #[instrument(skip(self, events, aggregate_root), fields(repository_aggregate_type = %repository_aggregate_type))]
    async fn append_events(
        &self,
        repository_aggregate_type: &AggregateType,
        aggregate_id: &str,
        events: Vec<PendingEvent<E>>,
        aggregate_root: &dyn AggregateTypeProvider,
        expected_version: ExpectedVersion,
    ) -> Result<()> {
        self.write(
            repository_aggregate_type,
            aggregate_id,
            events,
            aggregate_root,
            expected_version,
        )
        .await
    }

    #[instrument(skip(self), fields(repository_aggregate_type = %repository_aggregate_type))]
    async fn read(
        &self,
        repository_aggregate_type: &AggregateType,
        aggregate_id: &str,
        min_version: Option<i64>,
    ) -> Result<Vec<StoredEvent<E>>> {
        ensure_aggregate_id(aggregate_id)?;
        ensure_min_version(min_version)?;
        let stream = self.stream_name(repository_aggregate_type)?;

        self.store
            .load_events_by_metadata_from(&stream, &aggregate_filter(aggregate_id), min_version)
            .await
    }

    fn get_aggregate_root_type(
        &self,
        repository_aggregate_type: &AggregateType,
        events: &[StoredEvent<E>],
    ) -> Result<AggregateType> {
        Ok(type_of_first_event(events).unwrap_or_else(|| repository_aggregate_type.clone()))
    }
}
