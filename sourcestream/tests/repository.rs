//! Integration tests for the aggregate repository.

mod support;

use std::sync::Arc;

use futures::executor::block_on;
use sourcestream::{
    AggregateRoot, AggregateType, AggregateTypeProvider, Error, ExpectedVersion,
    repository::{AggregateRepository, Repository},
    strategy::{AggregateStreamStrategy, SingleStreamStrategy},
};
use support::{Account, Admin, User, UserEvent, created, in_memory_store};
use uuid::Uuid;

fn user_repository() -> AggregateRepository<User, SingleStreamStrategy<UserEvent>> {
    let (_, store) = in_memory_store();
    AggregateRepository::with_aggregate_type(
        Arc::new(SingleStreamStrategy::with_default_stream(store)),
        AggregateType::from_aggregate_root_class("User"),
    )
}

#[test_log::test]
fn add_save_and_load() {
    let repo = user_repository();
    let id = Uuid::new_v4().to_string();

    let mut user = User::create(&id, "Alex", "alex@example.com");
    block_on(repo.add(&mut user)).expect("add");
    user.change_name("Sam");
    user.change_name("Kim");
    block_on(repo.save(&mut user)).expect("save");

    let loaded = block_on(repo.load(&id)).expect("load");
    assert_eq!(loaded.name(), "Kim");
    assert_eq!(loaded.email(), "alex@example.com");
    assert_eq!(loaded.version(), 3);
    assert_eq!(loaded.aggregate_id(), id);
}

#[test]
fn saving_without_new_events_is_a_no_op() {
    let repo = user_repository();
    let mut user = User::create("quiet", "Alex", "alex@example.com");
    block_on(repo.add(&mut user)).expect("add");

    block_on(repo.save(&mut user)).expect("nothing to save");
    assert_eq!(block_on(repo.read("quiet", None)).expect("read").len(), 1);
}

#[test]
fn loading_an_unknown_aggregate_is_not_found() {
    let repo = user_repository();
    assert!(matches!(
        block_on(repo.load("missing")),
        Err(Error::NotFound)
    ));
}

#[test]
fn concurrent_writers_conflict() {
    let repo = user_repository();
    let mut user = User::create("shared", "Alex", "alex@example.com");
    block_on(repo.add(&mut user)).expect("add");

    let mut first = block_on(repo.load("shared")).expect("load first");
    let mut second = block_on(repo.load("shared")).expect("load second");

    first.change_name("First");
    block_on(repo.save(&mut first)).expect("first save wins");

    second.change_name("Second");
    assert_eq!(
        block_on(repo.save(&mut second)),
        Err(Error::ConcurrencyConflict {
            expected: 1,
            actual: 2
        })
    );
    assert_eq!(block_on(repo.load("shared")).expect("load").name(), "First");
}

#[test]
fn failed_save_keeps_the_recorded_events() {
    let repo = user_repository();
    let mut user = User::create("retry", "Alex", "alex@example.com");
    block_on(repo.add(&mut user)).expect("add");

    let mut first = block_on(repo.load("retry")).expect("load first");
    let mut stale = block_on(repo.load("retry")).expect("load stale");
    first.change_name("A2");
    block_on(repo.save(&mut first)).expect("first save wins");
    assert!(first.recorded_events().is_empty(), "popped after success");

    stale.change_name("B2");
    let conflict = Err(Error::ConcurrencyConflict {
        expected: 1,
        actual: 2,
    });
    assert_eq!(block_on(repo.save(&mut stale)), conflict);
    assert_eq!(stale.recorded_events().len(), 1);

    // Retrying reports the same conflict instead of a silent success.
    assert_eq!(block_on(repo.save(&mut stale)), conflict);
    assert_eq!(stale.recorded_events().len(), 1);
    assert_eq!(block_on(repo.load("retry")).expect("load").name(), "A2");
}

#[test]
fn family_of_aggregates_shares_one_repository() {
    let (_, store) = in_memory_store();
    let repo: AggregateRepository<Account, _> = AggregateRepository::with_aggregate_type(
        Arc::new(SingleStreamStrategy::with_default_stream(store)),
        AggregateType::from_aggregate_root_class("Account"),
    );

    let mut admin = Account::Admin(Admin(User::create("root", "Root", "root@example.com")));
    let mut user = Account::User(User::create("guest", "Guest", "guest@example.com"));
    block_on(repo.add(&mut admin)).expect("add admin");
    block_on(repo.add(&mut user)).expect("add user");

    let loaded = block_on(repo.load("root")).expect("load admin");
    assert!(matches!(loaded, Account::Admin(_)));
    assert_eq!(
        loaded.aggregate_type(),
        AggregateType::from_aggregate_root_class("Admin")
    );

    let mut loaded = block_on(repo.load("guest")).expect("load user");
    assert!(matches!(loaded, Account::User(_)));
    loaded.change_name("Member");
    block_on(repo.save(&mut loaded)).expect("save user");
    assert_eq!(
        block_on(repo.load("guest")).expect("reload").name(),
        "Member"
    );
}

#[test]
fn reconstitution_rejects_a_foreign_type() {
    let repo = user_repository();
    block_on(repo.add_events_for_new_aggregate_root(
        "intruder",
        vec![created(1, "intruder")],
        &Admin::default(),
        ExpectedVersion::Exact(0),
    ))
    .expect("write as admin");

    let history = block_on(repo.read("intruder", None)).expect("read");
    assert_eq!(
        repo.get_aggregate_root_type(&history),
        Ok(AggregateType::from_aggregate_root_class("Admin"))
    );
    assert_eq!(
        block_on(repo.load("intruder")).map(|u| u.aggregate_id()),
        Err(Error::AggregateTypeMismatch {
            expected: "User".to_string(),
            actual: "Admin".to_string(),
        })
    );
}

#[test]
fn repository_type_defaults_to_the_rust_type() {
    let (_, store) = in_memory_store();
    let strategy = Arc::new(AggregateStreamStrategy::new(store));
    let repo: AggregateRepository<User, _> = AggregateRepository::new(strategy);
    assert_eq!(repo.aggregate_type(), &AggregateType::of::<User>());

    let mut user = User::create("u-7", "Alex", "alex@example.com");
    block_on(repo.add(&mut user)).expect("add");

    let shared = Arc::new(repo);
    let loaded = block_on(Repository::<User>::load(&shared, "u-7")).expect("load via Arc");
    assert_eq!(loaded.name(), "Alex");
}
