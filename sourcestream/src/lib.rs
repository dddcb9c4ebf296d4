//! # Event Stream Persistence
//!
//! `sourcestream` records the events produced by aggregates into named,
//! append-only streams and reads them back to rebuild aggregate state. The
//! central piece is the [`StreamStrategy`]: it decides which physical stream
//! an aggregate's events land in, stamps the metadata needed to find them
//! again, and recovers the concrete aggregate type from replayed history.
//!
//! ## Core Concepts
//!
//! - **[`Event`]**: A serializable domain fact carried as an event payload.
//! - **[`PendingEvent`] / [`StoredEvent`]**: An event before and after it was
//!   handed to the store. Metadata is only writable on the pending side, and
//!   only through the [`MetadataWriter`].
//! - **[`StreamName`]**: A validated name of a physical stream.
//! - **[`AggregateType`]**: A descriptor for a class of aggregates.
//! - **[`Adapter`]**: The storage backend contract (append, metadata-filtered
//!   read).
//! - **[`StreamStrategy`]**: Maps aggregates onto streams. See
//!   [`strategy::SingleStreamStrategy`], [`strategy::AggregateStreamStrategy`]
//!   and [`strategy::AggregateTypeStreamStrategy`].
//! - **[`repository::AggregateRepository`]**: Loads and saves aggregate roots
//!   through a strategy.
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use serde::{Deserialize, Serialize};
//! use sourcestream::{
//!     Adapter, AggregateType, AggregateTypeProvider, Event, ExpectedVersion, PendingEvent,
//!     StreamStrategy,
//!     adapter::in_memory::InMemoryAdapter,
//!     store::{Configuration, EventStore},
//!     strategy::SingleStreamStrategy,
//! };
//!
//! #[derive(Debug, Clone, Serialize, Deserialize)]
//! enum UserEvent {
//!     Registered { name: String },
//! }
//!
//! impl Event for UserEvent {
//!     fn event_type(&self) -> &'static str {
//!         "Registered"
//!     }
//!     fn event_version(&self) -> u16 {
//!         1
//!     }
//! }
//!
//! struct User;
//!
//! impl AggregateTypeProvider for User {
//!     fn aggregate_type(&self) -> AggregateType {
//!         AggregateType::of::<User>()
//!     }
//! }
//!
//! async fn single_stream_example() -> sourcestream::Result<()> {
//!     let adapter: Arc<dyn Adapter<UserEvent>> = Arc::new(InMemoryAdapter::default());
//!     let store = EventStore::new(Configuration::new(adapter))?;
//!     let strategy = SingleStreamStrategy::with_default_stream(store);
//!
//!     let user_type = AggregateType::of::<User>();
//!     let events = vec![PendingEvent::new(
//!         1,
//!         UserEvent::Registered { name: "Alex".into() },
//!     )];
//!     strategy
//!         .add_events_for_new_aggregate_root(
//!             &user_type,
//!             "u-1",
//!             events,
//!             &User,
//!             ExpectedVersion::Exact(0),
//!         )
//!         .await?;
//!
//!     let history = strategy.read(&user_type, "u-1", None).await?;
//!     let discovered = strategy.get_aggregate_root_type(&user_type, &history)?;
//!     assert_eq!(discovered, user_type);
//!     Ok(())
//! }
//! ```
#![deny(missing_docs)]

use std::fmt::Debug;

pub use async_trait::async_trait;
use serde::{Serialize, de::DeserializeOwned};

pub mod adapter;
pub mod aggregate;
pub mod event;
pub mod metadata;
pub mod repository;
pub mod store;
pub mod strategy;
pub mod stream;

pub use adapter::{Adapter, AppendCondition, ExpectedVersion};
pub use aggregate::{AggregateRoot, AggregateType, AggregateTypeProvider};
pub use event::{Metadata, PendingEvent, StoredEvent};
pub use metadata::{AGGREGATE_ID_KEY, AGGREGATE_TYPE_KEY, MetadataWriter};
pub use strategy::StreamStrategy;
pub use stream::{DEFAULT_STREAM_NAME, StreamName};

/// The error type for this crate.
#[derive(Debug, thiserror::Error, Clone, PartialEq, Eq)]
pub enum Error {
    /// Occurs when an identifier, version or event batch is malformed. Raised
    /// before anything is handed to the adapter.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    /// Occurs when the aggregate type cannot be recovered from a history.
    #[error("the aggregate type cannot be detected")]
    TypeUndetectable,
    /// Occurs when the version an append expected does not match the version
    /// currently stored for the aggregate.
    #[error("concurrency conflict: expected version {expected}, actual version {actual}")]
    ConcurrencyConflict {
        /// The version the writer expected.
        expected: i64,
        /// The version found in the stream.
        actual: i64,
    },
    /// Occurs when a stream that should be new already holds events.
    #[error("stream already exists: {0}")]
    StreamAlreadyExists(String),
    /// Occurs when two aggregate type descriptors were expected to match.
    #[error("aggregate type mismatch: expected {expected}, got {actual}")]
    AggregateTypeMismatch {
        /// The type the caller asked for.
        expected: String,
        /// The type that was found.
        actual: String,
    },
    /// Occurs when an aggregate could not be found.
    #[error("aggregate not found")]
    NotFound,
    /// Wraps an error from the underlying adapter.
    #[error("event store error: {0}")]
    Store(String),
}

/// A specialized `Result` type for this crate's operations.
pub type Result<T> = std::result::Result<T, Error>;

/// A trait for event payloads.
///
/// Payloads must be serializable, deserializable, clonable and debuggable.
/// The `Event` derive macro from `sourcestream-derive` implements it for enums.
pub trait Event: Serialize + DeserializeOwned + Clone + Debug + Send + Sync + 'static {
    /// Returns a static string slice representing the type of the event.
    fn event_type(&self) -> &'static str;

    /// Returns the version of the event's schema.
    fn event_version(&self) -> u16;
}
