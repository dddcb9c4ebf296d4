//! Provides a repository for loading and saving aggregate roots through a
//! stream strategy.
use std::{marker::PhantomData, sync::Arc};

use async_trait::async_trait;
use tracing::{debug, instrument};

use crate::{
    AggregateRoot, AggregateType, AggregateTypeProvider, Error, ExpectedVersion, PendingEvent,
    Result, StoredEvent, StreamStrategy,
};

/// Defines the standard interface for a repository.
#[async_trait]
pub trait Repository<A: AggregateRoot>: Send + Sync {
    /// Loads an aggregate root by replaying its history.
    async fn load(&self, aggregate_id: &str) -> Result<A>;
    /// Persists the events recorded by a new aggregate root.
    async fn add(&self, aggregate: &mut A) -> Result<()>;
    /// Persists the events recorded by an existing aggregate root since it
    /// was loaded or last saved.
    async fn save(&self, aggregate: &mut A) -> Result<()>;
}

/// A repository for one aggregate type, backed by a [`StreamStrategy`].
///
/// Besides the load/add/save cycle it exposes the strategy's four
/// operations, forwarding them unchanged with the repository's aggregate
/// type filled in.
pub struct AggregateRepository<A, S>
where
    A: AggregateRoot,
    S: StreamStrategy<A::Event>,
{
    strategy: Arc<S>,
    aggregate_type: AggregateType,
    _phantom: PhantomData<A>,
}

impl<A, S> AggregateRepository<A, S>
where
    A: AggregateRoot,
    S: StreamStrategy<A::Event>,
{
    /// Creates a repository whose aggregate type is the Rust type `A`.
    pub fn new(strategy: Arc<S>) -> Self {
        Self::with_aggregate_type(strategy, AggregateType::of::<A>())
    }

    /// Creates a repository with an explicit aggregate type, e.g. a base
    /// type shared by a family of aggregates.
    pub fn with_aggregate_type(strategy: Arc<S>, aggregate_type: AggregateType) -> Self {
        Self {
            strategy,
            aggregate_type,
            _phantom: PhantomData,
        }
    }

    /// Returns the repository's aggregate type.
    pub fn aggregate_type(&self) -> &AggregateType {
        &self.aggregate_type
    }

    /// Forwards to [`StreamStrategy::add_events_for_new_aggregate_root`].
    pub async fn add_events_for_new_aggregate_root(
        &self,
        aggregate_id: &str,
        events: Vec<PendingEvent<A::Event>>,
        aggregate_root: &dyn AggregateTypeProvider,
        expected_version: ExpectedVersion,
    ) -> Result<()> {
        self.strategy
            .add_events_for_new_aggregate_root(
                &self.aggregate_type,
                aggregate_id,
                events,
                aggregate_root,
                expected_version,
            )
            .await
    }

    /// Forwards to [`StreamStrategy::append_events`].
    pub async fn append_events(
        &self,
        aggregate_id: &str,
        events: Vec<PendingEvent<A::Event>>,
        aggregate_root: &dyn AggregateTypeProvider,
        expected_version: ExpectedVersion,
    ) -> Result<()> {
        self.strategy
            .append_events(
                &self.aggregate_type,
                aggregate_id,
                events,
                aggregate_root,
                expected_version,
            )
            .await
    }

    /// Forwards to [`StreamStrategy::read`].
    pub async fn read(
        &self,
        aggregate_id: &str,
        min_version: Option<i64>,
    ) -> Result<Vec<StoredEvent<A::Event>>> {
        self.strategy
            .read(&self.aggregate_type, aggregate_id, min_version)
            .await
    }

    /// Forwards to [`StreamStrategy::get_aggregate_root_type`].
    pub fn get_aggregate_root_type(
        &self,
        events: &[StoredEvent<A::Event>],
    ) -> Result<AggregateType> {
        self.strategy
            .get_aggregate_root_type(&self.aggregate_type, events)
    }
}

/// The version the store must hold before a batch starting at
/// `first_version` is appended.
fn expected_before(first_version: Option<i64>) -> Result<ExpectedVersion> {
    match first_version {
        None => Ok(ExpectedVersion::Any),
        Some(version) => version
            .checked_sub(1)
            .map(ExpectedVersion::Exact)
            .ok_or_else(|| {
                Error::InvalidArgument(format!("event version {version} has no predecessor"))
            }),
    }
}

#[async_trait]
impl<A, S> Repository<A> for AggregateRepository<A, S>
where
    A: AggregateRoot,
    S: StreamStrategy<A::Event> + 'static,
{
    #[instrument(skip(self), fields(aggregate_type = %self.aggregate_type))]
    async fn load(&self, aggregate_id: &str) -> Result<A> {
        let history = self.read(aggregate_id, None).await?;

        // Guard against loading a non-existing aggregate.
        if history.is_empty() {
            return Err(Error::NotFound);
        }

        let aggregate_type = self.get_aggregate_root_type(&history)?;
        debug!(
            discovered = %aggregate_type,
            events = history.len(),
            "replaying history"
        );
        A::reconstitute(&aggregate_type, history)
    }

    #[instrument(skip(self, aggregate), fields(aggregate.id = %aggregate.aggregate_id()))]
    async fn add(&self, aggregate: &mut A) -> Result<()> {
        // Recorded events stay on the aggregate until the write succeeded.
        let events = aggregate.recorded_events().to_vec();
        let expected_version = expected_before(events.first().map(PendingEvent::version))?;
        let aggregate_id = aggregate.aggregate_id();

        self.add_events_for_new_aggregate_root(
            &aggregate_id,
            events,
            &*aggregate,
            expected_version,
        )
        .await?;
        aggregate.pop_recorded_events();
        Ok(())
    }

    #[instrument(skip(self, aggregate), fields(aggregate.id = %aggregate.aggregate_id()))]
    async fn save(&self, aggregate: &mut A) -> Result<()> {
        let events = aggregate.recorded_events().to_vec();
        if events.is_empty() {
            return Ok(());
        }
        let expected_version = expected_before(events.first().map(PendingEvent::version))?;
        let aggregate_id = aggregate.aggregate_id();

        self.append_events(&aggregate_id, events, &*aggregate, expected_version)
            .await?;
        aggregate.pop_recorded_events();
        Ok(())
    }
}

#[async_trait]
impl<A, R> Repository<A> for Arc<R>
where
    A: AggregateRoot,
    R: Repository<A> + Send + Sync,
{
    async fn load(&self, aggregate_id: &str) -> Result<A> {
        (**self).load(aggregate_id).await
    }

    async fn add(&self, aggregate: &mut A) -> Result<()> {
        (**self).add(aggregate).await
    }

    async fn save(&self, aggregate: &mut A) -> Result<()> {
        (**self).save(aggregate).await
    }
}
