//! One stream per aggregate instance.
use async_trait::async_trait;
use tracing::instrument;

use crate::{
    AggregateType, AggregateTypeProvider, AppendCondition, Error, Event, ExpectedVersion, Metadata,
    PendingEvent, Result, StoredEvent, StreamName,
    store::EventStore,
    strategy::{StreamStrategy, ensure_aggregate_id, ensure_min_version, stamp, type_of_first_event},
};

const SEPARATOR: char = '-';

/// Gives every aggregate instance its own stream, named
/// `"{repository_aggregate_type}-{aggregate_id}"`.
///
/// A new aggregate root creates its stream, so reusing an id fails with
/// [`Error::StreamAlreadyExists`](crate::Error::StreamAlreadyExists).
/// Reads take the whole stream without a metadata filter.
#[derive(Debug, Clone)]
pub struct AggregateStreamStrategy<E: Event> {
    store: EventStore<E>,
}

impl<E: Event> AggregateStreamStrategy<E> {
    /// Creates the strategy.
    pub fn new(store: EventStore<E>) -> Self {
        Self { store }
    }

    /// Returns the stream holding one aggregate's events.
    ///
    /// The type name must not contain `-`, otherwise `a-b` with id `c` and
    /// `a` with id `b-c` would share a stream. Ids may contain it.
    pub fn stream_name(
        &self,
        repository_aggregate_type: &AggregateType,
        aggregate_id: &str,
    ) -> Result<StreamName> {
        ensure_aggregate_id(aggregate_id)?;
        if repository_aggregate_type.as_str().contains(SEPARATOR) {
            return Err(Error::InvalidArgument(format!(
                "aggregate type {repository_aggregate_type} contains the stream separator {SEPARATOR:?}"
            )));
        }
        StreamName::new(format!(
            "{repository_aggregate_type}{SEPARATOR}{aggregate_id}"
        ))
    }
}

#[async_trait]
impl<E: Event> StreamStrategy<E> for AggregateStreamStrategy<E> {
    #[instrument(skip(self, events, aggregate_root), fields(repository_aggregate_type = %repository_aggregate_type))]
    async fn add_events_for_new_aggregate_root(
        &self,
        repository_aggregate_type: &AggregateType,
        aggregate_id: &str,
        events: Vec<PendingEvent<E>>,
        aggregate_root: &dyn AggregateTypeProvider,
        expected_version: ExpectedVersion,
    ) -> Result<()> {
        let stream = self.stream_name(repository_aggregate_type, aggregate_id)?;
        let events = stamp(
            events,
            &aggregate_root.aggregate_type(),
            aggregate_id,
            expected_version,
        )?;
        // A fresh stream is at version 0.
        expected_version.check(0)?;
        self.store.create(&stream, events).await
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
        let stream = self.stream_name(repository_aggregate_type, aggregate_id)?;
        let events = stamp(
            events,
            &aggregate_root.aggregate_type(),
            aggregate_id,
            expected_version,
        )?;
        let condition = AppendCondition {
            filter: Metadata::new(),
            expected_version,
        };
        self.store.append_to(&stream, events, &condition).await
    }

    #[instrument(skip(self), fields(repository_aggregate_type = %repository_aggregate_type))]
    async fn read(
        &self,
        repository_aggregate_type: &AggregateType,
        aggregate_id: &str,
        min_version: Option<i64>,
    ) -> Result<Vec<StoredEvent<E>>> {
        ensure_min_version(min_version)?;
        let stream = self.stream_name(repository_aggregate_type, aggregate_id)?;

        self.store
            .load_events_by_metadata_from(&stream, &Metadata::new(), min_version)
            .await
    }

    /// The stream is already specific to the repository type, so a history
    /// without `aggregate_type` metadata belongs to that type.
    fn get_aggregate_root_type(
        &self,
        repository_aggregate_type: &AggregateType,
        events: &[StoredEvent<E>],
    ) -> Result<AggregateType> {
        Ok(type_of_first_event(events).unwrap_or_else(|| repository_aggregate_type.clone()))
    }
}
