//! Aggregate type descriptors and the aggregate root contract.
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::{Error, Event, PendingEvent, Result, StoredEvent};

/// Identifies a class of aggregates by its concrete type name.
///
/// Two descriptors are equal when their names are equal. A descriptor is
/// either built from a Rust type ([`AggregateType::of`]) or from a name read
/// back out of event metadata ([`AggregateType::from_aggregate_root_class`]).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AggregateType(String);

impl AggregateType {
    /// Builds the descriptor of a Rust type from its fully-qualified name.
    pub fn of<T: ?Sized>() -> Self {
        Self(std::any::type_name::<T>().to_string())
    }

    /// Builds a descriptor from a type name, typically the `aggregate_type`
    /// value of a stored event.
    pub fn from_aggregate_root_class(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// Returns the descriptor of an aggregate root instance.
    pub fn from_aggregate_root(root: &dyn AggregateTypeProvider) -> Self {
        root.aggregate_type()
    }

    /// Returns the type name.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Fails with [`Error::AggregateTypeMismatch`] unless `other` names the
    /// same type.
    pub fn assert_same(&self, other: &AggregateType) -> Result<()> {
        if self == other {
            Ok(())
        } else {
            Err(Error::AggregateTypeMismatch {
                expected: self.0.clone(),
                actual: other.0.clone(),
            })
        }
    }
}

impl fmt::Display for AggregateType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Reports the concrete type of an aggregate root instance.
///
/// For a family of aggregates behind one enum, the enum reports the type of
/// the variant it currently holds, not its own name. The
/// `AggregateTypeProvider` derive macro from `sourcestream-derive` covers
/// both the struct and the enum case.
pub trait AggregateTypeProvider: Send + Sync {
    /// Returns the concrete type of this instance.
    fn aggregate_type(&self) -> AggregateType;
}

/// An event-sourced aggregate root as seen by the
/// [`AggregateRepository`](crate::repository::AggregateRepository).
pub trait AggregateRoot: AggregateTypeProvider + Sized + 'static {
    /// The type of events this aggregate records.
    type Event: Event;

    /// Returns the identifier of this aggregate instance.
    fn aggregate_id(&self) -> String;

    /// Returns the version of the last event applied or recorded.
    fn version(&self) -> i64;

    /// Returns the events recorded and not yet persisted, in recording order.
    fn recorded_events(&self) -> &[PendingEvent<Self::Event>];

    /// Takes the events recorded since the last call, in recording order.
    ///
    /// The repository calls this only after the events were written.
    fn pop_recorded_events(&mut self) -> Vec<PendingEvent<Self::Event>>;

    /// Rebuilds an instance of `aggregate_type` from its history.
    ///
    /// `history` is never empty and is ordered by version.
    fn reconstitute(
        aggregate_type: &AggregateType,
        history: Vec<StoredEvent<Self::Event>>,
    ) -> Result<Self>;
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Order;

    #[test]
    fn descriptors_compare_by_name() {
        let from_type = AggregateType::of::<Order>();
        let from_metadata = AggregateType::from_aggregate_root_class(from_type.as_str());
        assert_eq!(from_type, from_metadata);
        assert!(from_type.as_str().ends_with("Order"));
    }

    #[test]
    fn assert_same_reports_both_names() {
        let order = AggregateType::from_aggregate_root_class("Order");
        let invoice = AggregateType::from_aggregate_root_class("Invoice");

        assert!(order.assert_same(&order.clone()).is_ok());
        assert_eq!(
            order.assert_same(&invoice),
            Err(Error::AggregateTypeMismatch {
                expected: "Order".into(),
                actual: "Invoice".into(),
            })
        );
    }
}
