//! Integration tests for the Collection façade over the in-memory store.

#[path = "../support/mod.rs"]
mod support;

use std::sync::{Arc, Mutex};

use doclist::{
    BatchWrite, Collection, CollectionConfig, CollectionError, Document, InsertPosition, ListChange,
    Predicate, Session, StoreCall, StoreError, UpdateStrategy,
};
use serde_json::json;
use support::{fixture, ids, object, seed, Task};

#[tokio::test]
async fn crud_round_trip() {
    let (store, tasks) = fixture("u1");

    let groceries = tasks.create(Task::new("u1", "Buy groceries")).await.unwrap();
    let laundry = tasks.create(Task::new("u1", "Laundry")).await.unwrap();
    assert_eq!(store.len("tasks"), 2);

    let fetched = tasks.get_one(groceries.id().unwrap()).await.unwrap().unwrap();
    assert_eq!(fetched.title, "Buy groceries");
    assert_eq!(fetched.meta.created_by(), Some("u1"));
    assert!(fetched.meta.created_at().is_some());

    let mut done = laundry.clone();
    done.done = true;
    tasks.update(done, UpdateStrategy::Local).await.unwrap();
    let open = tasks.get_many(&[Predicate::equals("done", false)]).await.unwrap();
    assert_eq!(ids(&open), vec![groceries.id().unwrap().to_string()]);

    tasks.delete(&groceries).await.unwrap();
    assert_eq!(tasks.get_one(groceries.id().unwrap()).await.unwrap(), None);
    assert!(tasks.items().unwrap().is_empty());
}

#[tokio::test]
async fn local_update_never_reads_back() {
    let (store, tasks) = fixture("u1");
    let task = tasks.create(Task::new("u1", "Draft")).await.unwrap();
    store.clear_calls();

    let mut renamed = task.clone();
    renamed.title = "Final".into();
    let updated = tasks.update(renamed, UpdateStrategy::Local).await.unwrap();

    let id = task.id().unwrap().to_string();
    assert_eq!(store.calls(), vec![StoreCall::Set { path: "tasks".into(), id, merge: true }]);
    assert!(updated.meta.updated_at() >= task.meta.updated_at());
    assert_eq!(tasks.items().unwrap()[0].title, "Final");
}

#[tokio::test]
async fn server_confirmed_update_reads_back_exactly_once() {
    let (store, tasks) = fixture("u1");
    let task = tasks.create(Task::new("u1", "Draft")).await.unwrap();
    store.clear_calls();

    let mut renamed = task.clone();
    renamed.title = "Final".into();
    let updated = tasks.update(renamed, UpdateStrategy::ServerConfirmed).await.unwrap();

    let id = task.id().unwrap().to_string();
    assert_eq!(
        store.calls(),
        vec![
            StoreCall::Set { path: "tasks".into(), id: id.clone(), merge: true },
            StoreCall::Get { path: "tasks".into(), id },
        ]
    );
    // The stored creator and creation time survive the merge.
    assert_eq!(updated.title, "Final");
    assert_eq!(updated.meta.created_by(), Some("u1"));
    assert!(updated.meta.created_at().is_some());
    assert_eq!(tasks.items().unwrap(), vec![updated]);
}

#[tokio::test]
async fn save_follows_the_configured_strategy() {
    let store = Arc::new(doclist::InMemoryDocumentStore::new());
    let config =
        CollectionConfig::from_json(r#"{ "update_strategy": "server_confirmed" }"#).unwrap();
    let tasks: Collection<Task, _> =
        Collection::with_config(Arc::clone(&store), Arc::new(Session::for_user("u1")), config);

    let task = tasks.create(Task::new("u1", "Draft")).await.unwrap();
    store.clear_calls();
    tasks.save(task).await.unwrap();

    assert!(matches!(store.calls().last(), Some(StoreCall::Get { .. })));
}

#[tokio::test]
async fn configured_path_and_insert_position() {
    let store = Arc::new(doclist::InMemoryDocumentStore::new());
    let mut config = CollectionConfig::at_path("users/u1/tasks");
    config.insert_position = InsertPosition::Start;
    let tasks: Collection<Task, _> =
        Collection::with_config(Arc::clone(&store), Arc::new(Session::for_user("u1")), config);

    let first = tasks.create(Task::new("u1", "first")).await.unwrap();
    let second = tasks.create(Task::new("u1", "second")).await.unwrap();

    assert_eq!(tasks.path(), "users/u1/tasks");
    assert_eq!(store.len("users/u1/tasks"), 2);
    assert!(store.is_empty("tasks"));
    assert_eq!(ids(&tasks.items().unwrap()), ids(&[second, first]));
}

#[tokio::test]
async fn create_with_id_uses_the_given_id() {
    let (store, tasks) = fixture("u1");

    let task = tasks.create_with_id("inbox", Task::new("u1", "Inbox zero")).await.unwrap();

    assert_eq!(task.id(), Some("inbox"));
    assert_eq!(
        store.calls(),
        vec![StoreCall::Set { path: "tasks".into(), id: "inbox".into(), merge: false }]
    );
    assert_eq!(store.raw("tasks", "inbox").unwrap().data["created_by"], json!("u1"));
}

#[tokio::test]
async fn get_one_where_returns_the_first_match() {
    let (store, tasks) = fixture("u1");
    seed(&store, "a", "u1", 1);
    seed(&store, "b", "u1", 2);
    seed(&store, "c", "u2", 3);

    let newest = tasks
        .get_one_where(&[Predicate::equals("owner", "u1"), Predicate::order_by("created_at", true)])
        .await
        .unwrap()
        .unwrap();
    assert_eq!(newest.id(), Some("b"));

    let nobody = tasks.get_one_where(&[Predicate::equals("owner", "u9")]).await.unwrap();
    assert_eq!(nobody, None);
}

#[tokio::test]
async fn undecodable_documents_are_skipped() {
    let (store, tasks) = fixture("u1");
    seed(&store, "a", "u1", 1);
    store
        .insert_raw("tasks", "broken", object(json!({ "owner": "u1", "title": 7 })))
        .unwrap();

    let all = tasks.get_many(&[]).await.unwrap();

    assert_eq!(ids(&all), vec!["a".to_string()]);
}

#[tokio::test]
async fn count_uses_store_aggregation() {
    let (store, tasks) = fixture("u1");
    seed(&store, "a", "u1", 1);
    seed(&store, "b", "u1", 2);
    seed(&store, "c", "u2", 3);
    store.clear_calls();

    let count = tasks.get_count(&[Predicate::equals("owner", "u1")]).await.unwrap();

    assert_eq!(count, 2);
    assert_eq!(store.calls(), vec![StoreCall::Count { path: "tasks".into() }]);
}

#[tokio::test]
async fn increment_and_decrement_apply_store_side() {
    let (store, tasks) = fixture("u1");
    let task = tasks.create(Task::new("u1", "Popular")).await.unwrap();
    let id = task.id().unwrap().to_string();

    assert!(tasks.increment_field("views", 10, &task).await.unwrap());
    assert!(tasks.decrement_field("views", 3, &task).await.unwrap());

    assert_eq!(store.raw("tasks", &id).unwrap().data["views"], json!(7));
    assert_eq!(tasks.items().unwrap()[0].views, 7);
}

#[tokio::test]
async fn non_positive_increment_is_a_no_op() {
    let (store, tasks) = fixture("u1");
    let task = tasks.create(Task::new("u1", "Quiet")).await.unwrap();
    let before = store.raw("tasks", task.id().unwrap());
    store.clear_calls();

    assert!(!tasks.increment_field("views", 0, &task).await.unwrap());
    assert!(!tasks.increment_field("views", -1, &task).await.unwrap());
    assert!(!tasks.decrement_field("views", 0, &task).await.unwrap());

    assert!(store.calls().is_empty());
    assert_eq!(store.raw("tasks", task.id().unwrap()), before);
    assert_eq!(tasks.items().unwrap(), vec![task]);
}

#[tokio::test]
async fn batch_applies_every_write() {
    let (store, tasks) = fixture("u1");
    seed(&store, "b", "u1", 2);
    seed(&store, "c", "u1", 3);
    tasks.get_many(&[]).await.unwrap();
    store.clear_calls();

    let mut b = tasks.get_one("b").await.unwrap().unwrap();
    b.done = true;
    let c = tasks.get_one("c").await.unwrap().unwrap();

    let written = tasks
        .apply_batch(vec![
            BatchWrite::Create(Task::new("u1", "A")),
            BatchWrite::Update(b),
            BatchWrite::Delete(c),
        ])
        .await
        .unwrap();

    let a_id = written[0].id().unwrap().to_string();
    let a = store.raw("tasks", &a_id).unwrap();
    assert_eq!(a.data["title"], json!("A"));
    assert_eq!(a.data["created_by"], json!("u1"));
    assert!(a.data["created_at"].is_string());

    let b = store.raw("tasks", "b").unwrap();
    assert_eq!(b.data["done"], json!(true));
    assert_eq!(b.data["created_at"], json!("2024-01-02T00:00:00.000000Z"));
    assert!(store.raw("tasks", "c").is_none());

    assert!(store.calls().contains(&StoreCall::CommitBatch { ops: 3 }));
    let mut listed = ids(&tasks.items().unwrap());
    listed.sort();
    let mut expected = vec![a_id, "b".to_string()];
    expected.sort();
    assert_eq!(listed, expected);
}

#[tokio::test]
async fn batch_is_all_or_nothing() {
    let (store, tasks) = fixture("u1");
    seed(&store, "c", "u1", 3);
    tasks.get_many(&[]).await.unwrap();
    let before = store.raw("tasks", "c");

    let mut ghost = Task::new("u1", "ghost");
    ghost.id = Some("missing".into());
    let c = tasks.get_one("c").await.unwrap().unwrap();

    let err = tasks
        .apply_batch(vec![
            BatchWrite::Create(Task::new("u1", "A")),
            BatchWrite::Update(ghost),
            BatchWrite::Delete(c),
        ])
        .await
        .unwrap_err();

    assert!(matches!(err, CollectionError::Store(StoreError::NotFound { .. })));
    assert_eq!(store.len("tasks"), 1);
    assert_eq!(store.raw("tasks", "c"), before);
    assert_eq!(ids(&tasks.items().unwrap()), vec!["c".to_string()]);
}

#[tokio::test]
async fn batch_with_missing_id_never_commits() {
    let (store, tasks) = fixture("u1");

    let err = tasks
        .apply_batch(vec![
            BatchWrite::Create(Task::new("u1", "A")),
            BatchWrite::Delete(Task::new("u1", "no id")),
        ])
        .await
        .unwrap_err();

    assert_eq!(err, CollectionError::MissingId("tasks".into()));
    assert!(store.calls().is_empty());
    assert!(store.is_empty("tasks"));
}

#[tokio::test]
async fn list_changes_are_announced() {
    let (_store, tasks) = fixture("u1");
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    let listener = tasks.on_change(move |change| sink.lock().unwrap().push(change)).unwrap();

    let task = tasks.create(Task::new("u1", "Watch me")).await.unwrap();
    tasks.delete(&task).await.unwrap();
    assert!(tasks.remove_listener(&listener).unwrap());
    tasks.create(Task::new("u1", "Unseen")).await.unwrap();

    let id = task.id().unwrap().to_string();
    assert_eq!(
        *seen.lock().unwrap(),
        vec![
            ListChange::Inserted { id: id.clone(), index: 0 },
            ListChange::Removed { id, index: 0 },
        ]
    );
}

#[tokio::test]
async fn batch_changes_arrive_in_batch_order() {
    let (_store, tasks) = fixture("u1");
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    tasks.on_change(move |change| sink.lock().unwrap().push(change)).unwrap();

    for round in 0..20 {
        seen.lock().unwrap().clear();
        let writes = (0..6)
            .map(|n| BatchWrite::Create(Task::new("u1", &format!("round {round} task {n}"))))
            .collect();
        let written = tasks.apply_batch(writes).await.unwrap();

        let inserted: Vec<String> = seen
            .lock()
            .unwrap()
            .iter()
            .filter_map(|change| match change {
                ListChange::Inserted { id, .. } => Some(id.clone()),
                _ => None,
            })
            .collect();
        assert_eq!(inserted, ids(&written), "round {round}");
    }

    let listed = tasks.items().unwrap();
    let indices: Vec<usize> = seen
        .lock()
        .unwrap()
        .iter()
        .filter_map(|change| match change {
            ListChange::Inserted { index, .. } => Some(*index),
            _ => None,
        })
        .collect();
    assert_eq!(indices, (listed.len() - 6..listed.len()).collect::<Vec<_>>());
}

#[tokio::test]
async fn store_failures_propagate_unchanged() {
    let (store, tasks) = fixture("u1");
    store.fail_next(StoreError::PermissionDenied("tasks are read-only".into()));

    let err = tasks.create(Task::new("u1", "Denied")).await.unwrap_err();

    assert_eq!(
        err,
        CollectionError::Store(StoreError::PermissionDenied("tasks are read-only".into()))
    );
    assert!(store.is_empty("tasks"));
    assert!(tasks.items().unwrap().is_empty());
}
