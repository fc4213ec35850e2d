//! Integration tests for realtime subscriptions.

#[path = "../support/mod.rs"]
mod support;

use std::sync::{Arc, Mutex};

use doclist::{CollectionError, ListChange, Predicate, StoreCall, StoreError};
use support::{fixture, ids, seed, Task};

type Deliveries = Arc<Mutex<Vec<Result<Vec<Task>, CollectionError>>>>;

fn recorder() -> (Deliveries, impl Fn(Result<Vec<Task>, CollectionError>) + Send + Sync + 'static) {
    let deliveries: Deliveries = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&deliveries);
    (deliveries, move |update| sink.lock().unwrap().push(update))
}

fn sizes(deliveries: &Deliveries) -> Vec<usize> {
    deliveries
        .lock()
        .unwrap()
        .iter()
        .map(|d| d.as_ref().map(Vec::len).unwrap_or(usize::MAX))
        .collect()
}

#[tokio::test]
async fn every_delivery_is_the_full_matched_set() {
    let (store, tasks) = fixture("u1");
    seed(&store, "a", "u1", 1);
    seed(&store, "b", "u1", 2);

    let (deliveries, on_change) = recorder();
    let predicates = [
        Predicate::equals("owner", "u1"),
        Predicate::order_by("created_at", false),
    ];
    tasks.subscribe(&predicates, on_change).unwrap();
    assert_eq!(sizes(&deliveries), vec![2]);
    assert_eq!(ids(&tasks.items().unwrap()), vec!["a", "b"]);

    seed(&store, "c", "u1", 3);
    seed(&store, "x", "u2", 4);

    assert_eq!(sizes(&deliveries), vec![2, 3, 3]);
    let last = deliveries.lock().unwrap().last().cloned().unwrap().unwrap();
    assert_eq!(ids(&last), vec!["a", "b", "c"]);
    assert_eq!(ids(&tasks.items().unwrap()), vec!["a", "b", "c"]);
}

#[tokio::test]
async fn created_documents_are_not_listed_twice() {
    let (_store, tasks) = fixture("u1");
    let (deliveries, on_change) = recorder();
    tasks.subscribe(&[], on_change).unwrap();

    let task = tasks.create(Task::new("u1", "Once")).await.unwrap();

    assert_eq!(sizes(&deliveries), vec![0, 1]);
    assert_eq!(ids(&tasks.items().unwrap()), ids(&[task]));
}

#[tokio::test]
async fn deliveries_announce_replacements() {
    let (store, tasks) = fixture("u1");
    let changes = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&changes);
    tasks.on_change(move |change| sink.lock().unwrap().push(change)).unwrap();

    let (_deliveries, on_change) = recorder();
    tasks.subscribe(&[], on_change).unwrap();
    seed(&store, "a", "u1", 1);

    assert_eq!(
        *changes.lock().unwrap(),
        vec![ListChange::Replaced { len: 0 }, ListChange::Replaced { len: 1 }]
    );
}

#[tokio::test]
async fn an_error_is_delivered_once_and_ends_the_subscription() {
    let (store, tasks) = fixture("u1");
    let (deliveries, on_change) = recorder();
    let handle = tasks.subscribe(&[], on_change).unwrap();

    store.fail_listeners("tasks", StoreError::PermissionDenied("signed out".into()));
    seed(&store, "a", "u1", 1);
    seed(&store, "b", "u1", 2);

    {
        let deliveries = deliveries.lock().unwrap();
        assert_eq!(deliveries.len(), 2);
        assert_eq!(
            deliveries[1],
            Err(CollectionError::Store(StoreError::PermissionDenied("signed out".into())))
        );
    }
    assert_eq!(store.listener_count(), 0);

    // Releasing an ended subscription is still fine.
    assert!(tasks.unsubscribe(handle).unwrap());
}

#[tokio::test]
async fn unsubscribe_is_idempotent() {
    let (store, tasks) = fixture("u1");
    let (deliveries, on_change) = recorder();
    let handle = tasks.subscribe(&[], on_change).unwrap();

    assert!(tasks.unsubscribe(handle).unwrap());
    assert!(!tasks.unsubscribe(handle).unwrap());
    seed(&store, "a", "u1", 1);

    assert_eq!(sizes(&deliveries), vec![0]);
    assert_eq!(store.listener_count(), 0);
    assert_eq!(tasks.active_subscriptions(), 0);
    let unsubscribes = store
        .calls()
        .into_iter()
        .filter(|call| matches!(call, StoreCall::Unsubscribe { .. }))
        .count();
    assert_eq!(unsubscribes, 1);
}

#[tokio::test]
async fn failed_subscribe_registers_nothing() {
    let (store, tasks) = fixture("u1");
    store.fail_next(StoreError::Unavailable("offline".into()));

    let (deliveries, on_change) = recorder();
    let err = tasks.subscribe(&[], on_change).unwrap_err();

    assert_eq!(err, CollectionError::Store(StoreError::Unavailable("offline".into())));
    assert!(deliveries.lock().unwrap().is_empty());
    assert_eq!(tasks.active_subscriptions(), 0);
    assert_eq!(store.listener_count(), 0);
}

#[tokio::test]
async fn dropping_the_collection_releases_its_subscriptions() {
    let (store, tasks) = fixture("u1");
    let (_a, first) = recorder();
    let (_b, second) = recorder();
    tasks.subscribe(&[], first).unwrap();
    tasks.subscribe(&[Predicate::equals("done", true)], second).unwrap();
    assert_eq!(store.listener_count(), 2);

    drop(tasks);

    assert_eq!(store.listener_count(), 0);
}
