#![allow(missing_docs)]
use serde::{Deserialize, Serialize};
use sourcestream::{AggregateType, AggregateTypeProvider, Event};
use sourcestream_derive::{
    AggregateTypeProvider as DeriveAggregateTypeProvider, Event as DeriveEvent,
};

#[derive(Clone, Debug, Serialize, Deserialize, DeriveEvent)]
#[event(version = 7)]
enum CustomEvent {
    Something,
    #[event(version = 9)]
    Else { reason: String },
    Tuple(u32),
}

#[derive(Clone, Debug, Serialize, Deserialize, DeriveEvent)]
enum PlainEvent {
    Happened,
}

#[derive(DeriveAggregateTypeProvider)]
struct Invoice;

#[derive(DeriveAggregateTypeProvider)]
#[aggregate_type(name = "billing.CreditNote")]
struct CreditNote;

#[derive(DeriveAggregateTypeProvider)]
enum Document {
    Invoice(Invoice),
    CreditNote(CreditNote),
}

#[test]
fn derive_event_configurable_version() {
    assert_eq!(CustomEvent::Something.event_version(), 7);
    assert_eq!(CustomEvent::Something.event_type(), "Something");

    // Variant override
    let other = CustomEvent::Else {
        reason: "late".into(),
    };
    assert_eq!(other.event_version(), 9);
    assert_eq!(other.event_type(), "Else");

    assert_eq!(CustomEvent::Tuple(1).event_type(), "Tuple");
    assert_eq!(CustomEvent::Tuple(1).event_version(), 7);
    assert_eq!(PlainEvent::Happened.event_version(), 1);
}

#[test]
fn derive_aggregate_type_provider() {
    assert_eq!(Invoice.aggregate_type(), AggregateType::of::<Invoice>());
    assert_eq!(
        CreditNote.aggregate_type(),
        AggregateType::from_aggregate_root_class("billing.CreditNote")
    );

    // Enums report the type of the root they hold.
    assert_eq!(
        Document::Invoice(Invoice).aggregate_type(),
        Invoice.aggregate_type()
    );
    assert_eq!(
        Document::CreditNote(CreditNote).aggregate_type().as_str(),
        "billing.CreditNote"
    );
}
