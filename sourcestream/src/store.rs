//! The event store: the configured adapter plus the features set up on it.
use std::{fmt, sync::Arc};

use tracing::{debug, instrument};

use crate::{Adapter, AppendCondition, Event, Metadata, Result, StoredEvent, StreamName};

/// A cross-cutting extension set up once per [`EventStore`].
///
/// Features typically register [`CommitListener`]s, e.g. to feed projections
/// or to log every commit.
pub trait Feature<E: Event>: Send + Sync {
    /// Called exactly once, while the store is being built.
    fn set_up(&self, store: &mut EventStore<E>) -> Result<()>;
}

/// Observes events after they were written.
pub trait CommitListener<E: Event>: Send + Sync {
    /// Called after `events` were committed to `stream`.
    fn on_commit(&self, stream: &StreamName, events: &[StoredEvent<E>]);
}

/// Everything needed to build an [`EventStore`].
pub struct Configuration<E: Event> {
    adapter: Arc<dyn Adapter<E>>,
    features: Vec<Arc<dyn Feature<E>>>,
}

impl<E: Event> Configuration<E> {
    /// Creates a configuration using `adapter` for storage.
    pub fn new(adapter: Arc<dyn Adapter<E>>) -> Self {
        Self {
            adapter,
            features: Vec::new(),
        }
    }

    /// Adds a feature; features are set up in the order they were added.
    pub fn with_feature<F: Feature<E> + 'static>(mut self, feature: F) -> Self {
        self.features.push(Arc::new(feature));
        self
    }
}

/// Routes strategy calls to the adapter and notifies commit listeners.
///
/// Cloning is cheap; clones share the adapter and the listeners.
pub struct EventStore<E: Event> {
    adapter: Arc<dyn Adapter<E>>,
    listeners: Vec<Arc<dyn CommitListener<E>>>,
}

impl<E: Event> Clone for EventStore<E> {
    fn clone(&self) -> Self {
        Self {
            adapter: Arc::clone(&self.adapter),
            listeners: self.listeners.clone(),
        }
    }
}

impl<E: Event> fmt::Debug for EventStore<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventStore")
            .field("listeners", &self.listeners.len())
            .finish_non_exhaustive()
    }
}

impl<E: Event> EventStore<E> {
    /// Builds the store and sets up every configured feature.
    ///
    /// The first feature that fails aborts construction.
    pub fn new(config: Configuration<E>) -> Result<Self> {
        let mut store = Self {
            adapter: config.adapter,
            listeners: Vec::new(),
        };
        for feature in &config.features {
            feature.set_up(&mut store)?;
        }
        debug!(
            features = config.features.len(),
            listeners = store.listeners.len(),
            "event store ready"
        );
        Ok(store)
    }

    /// Registers a listener notified after every successful write.
    pub fn add_listener<L: CommitListener<E> + 'static>(&mut self, listener: L) {
        self.listeners.push(Arc::new(listener));
    }

    /// Returns the underlying adapter.
    pub fn adapter(&self) -> &Arc<dyn Adapter<E>> {
        &self.adapter
    }

    /// Creates `stream` with its first batch of events.
    #[instrument(skip(self, events), fields(stream = %stream, count = events.len()))]
    pub async fn create(&self, stream: &StreamName, events: Vec<StoredEvent<E>>) -> Result<()> {
        let committed = self.committed_copy(&events);
        self.adapter.create(stream, events).await?;
        self.notify(stream, committed);
        Ok(())
    }

    /// Appends events to `stream` under `condition`.
    #[instrument(skip(self, events, condition), fields(stream = %stream, count = events.len()))]
    pub async fn append_to(
        &self,
        stream: &StreamName,
        events: Vec<StoredEvent<E>>,
        condition: &AppendCondition,
    ) -> Result<()> {
        let committed = self.committed_copy(&events);
        self.adapter.append(stream, events, condition).await?;
        self.notify(stream, committed);
        Ok(())
    }

    /// Loads the events of `stream` matching `filter`, from `min_version`
    /// on, ascending by version.
    pub async fn load_events_by_metadata_from(
        &self,
        stream: &StreamName,
        filter: &Metadata,
        min_version: Option<i64>,
    ) -> Result<Vec<StoredEvent<E>>> {
        self.adapter
            .read_by_metadata(stream, filter, min_version)
            .await
    }

    fn committed_copy(&self, events: &[StoredEvent<E>]) -> Option<Vec<StoredEvent<E>>> {
        (!self.listeners.is_empty()).then(|| events.to_vec())
    }

    fn notify(&self, stream: &StreamName, committed: Option<Vec<StoredEvent<E>>>) {
        if let Some(events) = committed {
            for listener in &self.listeners {
                listener.on_commit(stream, &events);
            }
        }
    }
}
