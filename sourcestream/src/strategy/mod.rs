//! Stream strategies decide how aggregates are mapped onto physical streams.
//!
//! Three strategies are available, each behind the same [`StreamStrategy`]
//! interface:
//!
//! - [`SingleStreamStrategy`]: every aggregate in one shared stream.
//! - [`AggregateStreamStrategy`]: one stream per aggregate instance.
//! - [`AggregateTypeStreamStrategy`]: one stream per aggregate type.
//!
//! [`StrategyConfig`] selects one of them when the store is configured and
//! produces an [`AnyStreamStrategy`].
use std::collections::BTreeMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{
    AGGREGATE_ID_KEY, AGGREGATE_TYPE_KEY, AggregateType, AggregateTypeProvider, Error, Event,
    ExpectedVersion, Metadata, MetadataWriter, PendingEvent, Result, StoredEvent, StreamName,
    store::EventStore,
};

mod aggregate_stream;
mod aggregate_type_stream;
mod single_stream;

pub use aggregate_stream::AggregateStreamStrategy;
pub use aggregate_type_stream::AggregateTypeStreamStrategy;
pub use single_stream::SingleStreamStrategy;

/// Maps aggregates onto streams for writing and reading.
///
/// Implementations hold no mutable state and are safe to share between
/// tasks. Adapter errors are passed through unchanged.
#[async_trait]
pub trait StreamStrategy<E: Event>: Send + Sync {
    /// Persists the first events of a new aggregate root.
    ///
    /// Every event is stamped with the root's concrete `aggregate_type` and
    /// with `aggregate_id` before the batch is appended in order.
    async fn add_events_for_new_aggregate_root(
        &self,
        repository_aggregate_type: &AggregateType,
        aggregate_id: &str,
        events: Vec<PendingEvent<E>>,
        aggregate_root: &dyn AggregateTypeProvider,
        expected_version: ExpectedVersion,
    ) -> Result<()>;

    /// Persists further events of an existing aggregate root. Same contract as
    /// [`StreamStrategy::add_events_for_new_aggregate_root`].
    async fn append_events(
        &self,
        repository_aggregate_type: &AggregateType,
        aggregate_id: &str,
        events: Vec<PendingEvent<E>>,
        aggregate_root: &dyn AggregateTypeProvider,
        expected_version: ExpectedVersion,
    ) -> Result<()>;

    /// Loads the history of one aggregate, ascending by version, starting at
    /// `min_version` (inclusive) when given. Unknown ids yield an empty list.
    async fn read(
        &self,
        repository_aggregate_type: &AggregateType,
        aggregate_id: &str,
        min_version: Option<i64>,
    ) -> Result<Vec<StoredEvent<E>>>;

    /// Determines the concrete aggregate type of a history returned by
    /// [`StreamStrategy::read`].
    fn get_aggregate_root_type(
        &self,
        repository_aggregate_type: &AggregateType,
        events: &[StoredEvent<E>],
    ) -> Result<AggregateType>;
}

pub(crate) fn ensure_aggregate_id(aggregate_id: &str) -> Result<()> {
    if aggregate_id.is_empty() {
        return Err(Error::InvalidArgument(
            "aggregate id must be a non-empty string".to_string(),
        ));
    }
    Ok(())
}

pub(crate) fn ensure_min_version(min_version: Option<i64>) -> Result<()> {
    match min_version {
        Some(v) if v < 1 => Err(Error::InvalidArgument(format!(
            "min version must be positive, got {v}"
        ))),
        _ => Ok(()),
    }
}

/// The read filter selecting one aggregate's events.
pub(crate) fn aggregate_filter(aggregate_id: &str) -> Metadata {
    Metadata::from([(AGGREGATE_ID_KEY.to_string(), aggregate_id.to_string())])
}

/// Validates a batch and stamps the ownership metadata on every event.
pub(crate) fn stamp<E: Event>(
    events: Vec<PendingEvent<E>>,
    aggregate_type: &AggregateType,
    aggregate_id: &str,
    expected_version: ExpectedVersion,
) -> Result<Vec<StoredEvent<E>>> {
    ensure_aggregate_id(aggregate_id)?;

    let Some(first) = events.first() else {
        return Err(Error::InvalidArgument(format!(
            "no events given for aggregate {aggregate_id}"
        )));
    };
    if first.version() < 1 {
        return Err(Error::InvalidArgument(format!(
            "event versions start at 1, got {}",
            first.version()
        )));
    }
    if let ExpectedVersion::Exact(expected) = expected_version {
        if expected < 0 {
            return Err(Error::InvalidArgument(format!(
                "expected version must not be negative, got {expected}"
            )));
        }
        if expected.checked_add(1) != Some(first.version()) {
            return Err(Error::InvalidArgument(format!(
                "first event has version {} but version {expected} is expected to be stored",
                first.version()
            )));
        }
    }
    if let Some(pair) = events
        .windows(2)
        .find(|pair| pair[1].version() <= pair[0].version())
    {
        return Err(Error::InvalidArgument(format!(
            "event versions must be ascending, got {} after {}",
            pair[1].version(),
            pair[0].version()
        )));
    }

    debug!(
        aggregate.id = aggregate_id,
        aggregate_type = %aggregate_type,
        count = events.len(),
        "stamping events"
    );
    Ok(events
        .into_iter()
        .map(|mut event| {
            MetadataWriter::set_metadata_key(
                &mut event,
                AGGREGATE_TYPE_KEY,
                aggregate_type.as_str(),
            );
            MetadataWriter::set_metadata_key(&mut event, AGGREGATE_ID_KEY, aggregate_id);
            event.freeze()
        })
        .collect())
}

/// The `aggregate_type` stamped on the first event, if any.
pub(crate) fn type_of_first_event<E: Event>(events: &[StoredEvent<E>]) -> Option<AggregateType> {
    events
        .first()
        .and_then(|e| e.metadata_value(AGGREGATE_TYPE_KEY))
        .map(AggregateType::from_aggregate_root_class)
}

/// Selects and configures a stream strategy.
///
/// Deserializes from e.g. `{"strategy": "single_stream", "stream_name":
/// "events"}`. The default is a single stream named
/// [`DEFAULT_STREAM_NAME`](crate::DEFAULT_STREAM_NAME).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "strategy", rename_all = "snake_case")]
pub enum StrategyConfig {
    /// See [`SingleStreamStrategy`].
    SingleStream {
        /// The shared stream.
        #[serde(default = "StreamName::default_stream")]
        stream_name: StreamName,
    },
    /// See [`AggregateStreamStrategy`].
    AggregateStream,
    /// See [`AggregateTypeStreamStrategy`].
    AggregateTypeStream {
        /// Stream names keyed by aggregate type name. Unmapped types use
        /// their own name as stream name.
        #[serde(default)]
        stream_map: BTreeMap<String, StreamName>,
    },
}

impl Default for StrategyConfig {
    fn default() -> Self {
        Self::SingleStream {
            stream_name: StreamName::default_stream(),
        }
    }
}

impl StrategyConfig {
    /// Builds the configured strategy on top of `store`.
    pub fn build<E: Event>(self, store: EventStore<E>) -> AnyStreamStrategy<E> {
        match self {
            Self::SingleStream { stream_name } => {
                AnyStreamStrategy::Single(SingleStreamStrategy::new(store, stream_name))
            }
            Self::AggregateStream => {
                AnyStreamStrategy::Aggregate(AggregateStreamStrategy::new(store))
            }
            Self::AggregateTypeStream { stream_map } => {
                let stream_map = stream_map
                    .into_iter()
                    .map(|(ty, stream)| (AggregateType::from_aggregate_root_class(ty), stream))
                    .collect();
                AnyStreamStrategy::AggregateType(AggregateTypeStreamStrategy::with_stream_map(
                    store, stream_map,
                ))
            }
        }
    }
}

/// One of the available strategies, chosen at configuration time.
#[derive(Debug, Clone)]
pub enum AnyStreamStrategy<E: Event> {
    /// All aggregates in one stream.
    Single(SingleStreamStrategy<E>),
    /// One stream per aggregate.
    Aggregate(AggregateStreamStrategy<E>),
    /// One stream per aggregate type.
    AggregateType(AggregateTypeStreamStrategy<E>),
}

#[async_trait]
impl<E: Event> StreamStrategy<E> for AnyStreamStrategy<E> {
    async fn add_events_for_new_aggregate_root(
        &self,
        repository_aggregate_type: &AggregateType,
        aggregate_id: &str,
        events: Vec<PendingEvent<E>>,
        aggregate_root: &dyn AggregateTypeProvider,
        expected_version: ExpectedVersion,
    ) -> Result<()> {
        match self {
            Self::Single(s) => {
                s.add_events_for_new_aggregate_root(
                    repository_aggregate_type,
                    aggregate_id,
                    events,
                    aggregate_root,
                    expected_version,
                )
                .await
            }
            Self::Aggregate(s) => {
                s.add_events_for_new_aggregate_root(
                    repository_aggregate_type,
                    aggregate_id,
                    events,
                    aggregate_root,
                    expected_version,
                )
                .await
            }
            Self::AggregateType(s) => {
                s.add_events_for_new_aggregate_root(
                    repository_aggregate_type,
                    aggregate_id,
                    events,
                    aggregate_root,
                    expected_version,
                )
                .await
            }
        }
    }

    async fn append_events(
        &self,
        repository_aggregate_type: &AggregateType,
        aggregate_id: &str,
        events: Vec<PendingEvent<E>>,
        aggregate_root: &dyn AggregateTypeProvider,
        expected_version: ExpectedVersion,
    ) -> Result<()> {
        match self {
            Self::Single(s) => {
                s.append_events(
                    repository_aggregate_type,
                    aggregate_id,
                    events,
                    aggregate_root,
                    expected_version,
                )
                .await
            }
            Self::Aggregate(s) => {
                s.append_events(
                    repository_aggregate_type,
                    aggregate_id,
                    events,
                    aggregate_root,
                    expected_version,
                )
                .await
            }
            Self::AggregateType(s) => {
                s.append_events(
                    repository_aggregate_type,
                    aggregate_id,
                    events,
                    aggregate_root,
                    expected_version,
                )
                .await
            }
        }
    }

    async fn read(
        &self,
        repository_aggregate_type: &AggregateType,
        aggregate_id: &str,
        min_version: Option<i64>,
    ) -> Result<Vec<StoredEvent<E>>> {
        match self {
            Self::Single(s) => s.read(repository_aggregate_type, aggregate_id, min_version).await,
            Self::Aggregate(s) => s.read(repository_aggregate_type, aggregate_id, min_version).await,
            Self::AggregateType(s) => {
                s.read(repository_aggregate_type, aggregate_id, min_version)
                    .await
            }
        }
    }

    fn get_aggregate_root_type(
        &self,
        repository_aggregate_type: &AggregateType,
        events: &[StoredEvent<E>],
    ) -> Result<AggregateType> {
        match self {
            Self::Single(s) => s.get_aggregate_root_type(repository_aggregate_type, events),
            Self::Aggregate(s) => s.get_aggregate_root_type(repository_aggregate_type, events),
            Self::AggregateType(s) => s.get_aggregate_root_type(repository_aggregate_type, events),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_the_event_stream() {
        assert_eq!(
            StrategyConfig::default(),
            StrategyConfig::SingleStream {
                stream_name: StreamName::new(crate::DEFAULT_STREAM_NAME).expect("valid name"),
            }
        );
    }

    #[test]
    fn config_deserializes_each_variant() {
        let single: StrategyConfig =
            serde_json::from_str(r#"{"strategy": "single_stream"}"#).expect("single");
        assert_eq!(single, StrategyConfig::default());

        let per_aggregate: StrategyConfig =
            serde_json::from_str(r#"{"strategy": "aggregate_stream"}"#).expect("per aggregate");
        assert_eq!(per_aggregate, StrategyConfig::AggregateStream);

        let per_type: StrategyConfig = serde_json::from_str(
            r#"{"strategy": "aggregate_type_stream", "stream_map": {"User": "users"}}"#,
        )
        .expect("per type");
        let StrategyConfig::AggregateTypeStream { stream_map } = per_type else {
            panic!("expected the per-type variant");
        };
        assert_eq!(stream_map["User"].as_str(), "users");
    }

    #[test]
    fn empty_stream_name_in_config_is_rejected() {
        let result = serde_json::from_str::<StrategyConfig>(
            r#"{"strategy": "single_stream", "stream_name": ""}"#,
        );
        assert!(result.is_err());
    }

    #[test]
    fn min_version_must_be_positive() {
        assert!(ensure_min_version(None).is_ok());
        assert!(ensure_min_version(Some(1)).is_ok());
        assert!(matches!(
            ensure_min_version(Some(0)),
            Err(Error::InvalidArgument(_))
        ));
    }
}
