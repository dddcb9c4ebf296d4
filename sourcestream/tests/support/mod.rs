//! Aggregates and helpers shared by the integration tests.
#![allow(missing_docs)]

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use sourcestream::{
    Adapter, AggregateRoot, AggregateType, Error, PendingEvent, Result, StoredEvent,
    adapter::in_memory::InMemoryAdapter,
    store::{Configuration, EventStore},
};
use sourcestream_derive::{AggregateTypeProvider, Event};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, Event)]
pub enum UserEvent {
    UserCreated {
        user_id: String,
        name: String,
        email: String,
    },
    #[event(version = 2)]
    UsernameChanged { old_name: String, new_name: String },
}

/// A user aggregate recording its own events, versions starting at 1.
#[derive(Debug, Default, AggregateTypeProvider)]
#[aggregate_type(name = "User")]
pub struct User {
    id: String,
    name: String,
    email: String,
    version: i64,
    recorded: Vec<PendingEvent<UserEvent>>,
}

impl User {
    pub fn create(id: &str, name: &str, email: &str) -> Self {
        let mut user = Self::default();
        user.record_that(UserEvent::UserCreated {
            user_id: id.to_string(),
            name: name.to_string(),
            email: email.to_string(),
        });
        user
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn email(&self) -> &str {
        &self.email
    }

    pub fn change_name(&mut self, new_name: &str) {
        self.record_that(UserEvent::UsernameChanged {
            old_name: self.name.clone(),
            new_name: new_name.to_string(),
        });
    }

    fn record_that(&mut self, event: UserEvent) {
        self.apply(&event);
        self.version += 1;
        self.recorded.push(PendingEvent::new(self.version, event));
    }

    fn apply(&mut self, event: &UserEvent) {
        match event {
            UserEvent::UserCreated {
                user_id,
                name,
                email,
            } => {
                self.id = user_id.clone();
                self.name = name.clone();
                self.email = email.clone();
            }
            UserEvent::UsernameChanged { new_name, .. } => {
                self.name = new_name.clone();
            }
        }
    }

    fn replay(history: Vec<StoredEvent<UserEvent>>) -> Self {
        let mut user = Self::default();
        for event in history {
            user.apply(event.payload());
            user.version = event.version();
        }
        user
    }
}

impl AggregateRoot for User {
    type Event = UserEvent;

    fn aggregate_id(&self) -> String {
        self.id.clone()
    }

    fn version(&self) -> i64 {
        self.version
    }

    fn recorded_events(&self) -> &[PendingEvent<UserEvent>] {
        &self.recorded
    }

    fn pop_recorded_events(&mut self) -> Vec<PendingEvent<UserEvent>> {
        std::mem::take(&mut self.recorded)
    }

    fn reconstitute(
        aggregate_type: &AggregateType,
        history: Vec<StoredEvent<UserEvent>>,
    ) -> Result<Self> {
        AggregateType::from_aggregate_root_class("User").assert_same(aggregate_type)?;
        Ok(Self::replay(history))
    }
}

/// A user with elevated rights; shares the user's events.
#[derive(Debug, Default, AggregateTypeProvider)]
#[aggregate_type(name = "Admin")]
pub struct Admin(pub User);

/// The account family: users and admins behind one repository.
#[derive(Debug, AggregateTypeProvider)]
pub enum Account {
    User(User),
    Admin(Admin),
}

impl Account {
    fn user_mut(&mut self) -> &mut User {
        match self {
            Self::User(user) | Self::Admin(Admin(user)) => user,
        }
    }

    fn user(&self) -> &User {
        match self {
            Self::User(user) | Self::Admin(Admin(user)) => user,
        }
    }

    pub fn change_name(&mut self, new_name: &str) {
        self.user_mut().change_name(new_name);
    }

    pub fn name(&self) -> &str {
        self.user().name()
    }
}

impl AggregateRoot for Account {
    type Event = UserEvent;

    fn aggregate_id(&self) -> String {
        self.user().aggregate_id()
    }

    fn version(&self) -> i64 {
        self.user().version()
    }

    fn recorded_events(&self) -> &[PendingEvent<UserEvent>] {
        self.user().recorded_events()
    }

    fn pop_recorded_events(&mut self) -> Vec<PendingEvent<UserEvent>> {
        self.user_mut().pop_recorded_events()
    }

    fn reconstitute(
        aggregate_type: &AggregateType,
        history: Vec<StoredEvent<UserEvent>>,
    ) -> Result<Self> {
        match aggregate_type.as_str() {
            "User" => Ok(Self::User(User::replay(history))),
            "Admin" => Ok(Self::Admin(Admin(User::replay(history)))),
            other => Err(Error::AggregateTypeMismatch {
                expected: "User or Admin".to_string(),
                actual: other.to_string(),
            }),
        }
    }
}

/// An in-memory adapter plus a store built on it without features.
pub fn in_memory_store() -> (Arc<InMemoryAdapter<UserEvent>>, EventStore<UserEvent>) {
    let adapter = Arc::new(InMemoryAdapter::<UserEvent>::default());
    let shared: Arc<dyn Adapter<UserEvent>> = adapter.clone();
    let store = EventStore::new(Configuration::new(shared)).expect("store builds");
    (adapter, store)
}

pub fn created(version: i64, id: &str) -> PendingEvent<UserEvent> {
    PendingEvent::new(
        version,
        UserEvent::UserCreated {
            user_id: id.to_string(),
            name: "Alex".to_string(),
            email: "alex@example.com".to_string(),
        },
    )
}

pub fn renamed(version: i64, old_name: &str, new_name: &str) -> PendingEvent<UserEvent> {
    PendingEvent::new(
        version,
        UserEvent::UsernameChanged {
            old_name: old_name.to_string(),
            new_name: new_name.to_string(),
        },
    )
}
