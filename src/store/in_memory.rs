//! InMemoryDocumentStore - HashMap-backed document store for testing and development.

use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};

use async_trait::async_trait;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::{SecondsFormat, Utc};
use serde_json::{Map, Value};
use tracing::{debug, warn};
use uuid::Uuid;

use super::{
    increment_value, DocumentStore, RawDocument, SnapshotListener, SubscriptionId, Transform,
    WriteData, WriteOp,
};
use crate::error::StoreError;
use crate::query::{evaluate, Query};

type Documents = BTreeMap<String, Map<String, Value>>;
type Storage = HashMap<String, Documents>;

/// A store operation, as recorded in the call log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreCall {
    Get { path: String, id: String },
    Query { path: String },
    Count { path: String },
    Create { path: String },
    Set { path: String, id: String, merge: bool },
    Delete { path: String, id: String },
    CommitBatch { ops: usize },
    Subscribe { path: String },
    Unsubscribe { id: SubscriptionId },
}

struct Subscription {
    query: Query,
    listener: SnapshotListener,
}

/// In-memory document store.
///
/// Features:
/// - Query evaluation with document-database filter and ordering semantics
/// - Server timestamps and increment transforms
/// - Atomic batches (applied to a copy, swapped in on success)
/// - Realtime listeners, re-run after every write to their path
/// - A call log and failure injection for tests
///
/// Clone-friendly via Arc; clones share documents, listeners and the call log.
#[derive(Clone, Default)]
pub struct InMemoryDocumentStore {
    storage: Arc<RwLock<Storage>>,
    subscriptions: Arc<Mutex<BTreeMap<SubscriptionId, Subscription>>>,
    next_subscription: Arc<AtomicU64>,
    calls: Arc<Mutex<Vec<StoreCall>>>,
    failures: Arc<Mutex<VecDeque<StoreError>>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

fn poisoned(_: impl std::fmt::Display) -> StoreError {
    StoreError::Internal("store lock poisoned".into())
}

fn server_now() -> Value {
    Value::String(Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true))
}

/// Produce the stored fields after writing `data` over `existing`.
fn apply_write(
    existing: Option<&Map<String, Value>>,
    data: &WriteData,
    merge: bool,
) -> Map<String, Value> {
    let mut fields = match (merge, existing) {
        (true, Some(current)) => current.clone(),
        _ => Map::new(),
    };

    for (key, value) in &data.fields {
        fields.insert(key.clone(), value.clone());
    }

    for transform in &data.transforms {
        let value = match transform.transform {
            Transform::ServerTimestamp => server_now(),
            Transform::Increment(amount) => increment_value(fields.get(&transform.field), amount),
        };
        fields.insert(transform.field.clone(), value);
    }

    fields
}

/// Apply one batch operation to `storage`, returning the path it touched.
fn apply_op(storage: &mut Storage, op: &WriteOp) -> Result<String, StoreError> {
    match op {
        WriteOp::Create { path, id, data } => {
            let docs = storage.entry(path.clone()).or_default();
            if docs.contains_key(id) {
                return Err(StoreError::AlreadyExists {
                    path: path.clone(),
                    id: id.clone(),
                });
            }
            docs.insert(id.clone(), apply_write(None, data, false));
            Ok(path.clone())
        }
        WriteOp::Set {
            path,
            id,
            data,
            merge,
        } => {
            let docs = storage.entry(path.clone()).or_default();
            let fields = apply_write(docs.get(id), data, *merge);
            docs.insert(id.clone(), fields);
            Ok(path.clone())
        }
        WriteOp::Update { path, id, data } => {
            let docs = storage.entry(path.clone()).or_default();
            let current = docs.get(id).ok_or_else(|| StoreError::NotFound {
                path: path.clone(),
                id: id.clone(),
            })?;
            let fields = apply_write(Some(current), data, true);
            docs.insert(id.clone(), fields);
            Ok(path.clone())
        }
        WriteOp::Delete { path, id } => {
            if let Some(docs) = storage.get_mut(path) {
                docs.remove(id);
            }
            Ok(path.clone())
        }
    }
}

fn documents_at(storage: &Storage, path: &str) -> Vec<RawDocument> {
    storage
        .get(path)
        .map(|docs| {
            docs.iter()
                .map(|(id, data)| RawDocument::new(id.clone(), data.clone()))
                .collect()
        })
        .unwrap_or_default()
}

impl InMemoryDocumentStore {
    /// Create a new empty store.
    pub fn new() -> Self {
        Self::default()
    }

    fn record(&self, call: StoreCall) {
        lock(&self.calls).push(call);
    }

    fn injected_failure(&self) -> Result<(), StoreError> {
        match lock(&self.failures).pop_front() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    /// Apply writes under the storage lock, then notify listeners of every
    /// touched path once the lock is released.
    fn write(&self, ops: &[WriteOp]) -> Result<(), StoreError> {
        let touched = {
            let mut storage = self.storage.write().map_err(poisoned)?;
            let mut staged = storage.clone();
            let mut touched = HashSet::new();
            for op in ops {
                touched.insert(apply_op(&mut staged, op)?);
            }
            *storage = staged;
            touched
        };

        self.notify(&touched);
        Ok(())
    }

    fn notify(&self, paths: &HashSet<String>) {
        let deliveries: Vec<(SnapshotListener, Vec<RawDocument>)> = {
            let Ok(storage) = self.storage.read() else {
                warn!(paths = ?paths, "store lock poisoned, listeners not notified");
                return;
            };
            let subs = lock(&self.subscriptions);
            let pending = subs
                .values()
                .filter(|sub| paths.contains(sub.query.path()))
                .map(|sub| {
                    let docs = evaluate(&sub.query, documents_at(&storage, sub.query.path()));
                    (Arc::clone(&sub.listener), docs)
                })
                .collect();
            pending
        };

        for (listener, docs) in deliveries {
            listener(Ok(docs));
        }
    }

    /// Store a document directly, bypassing the call log and injected
    /// failures. Listeners on the path are notified.
    pub fn insert_raw(
        &self,
        path: &str,
        id: &str,
        data: Map<String, Value>,
    ) -> Result<(), StoreError> {
        self.write(&[WriteOp::Set {
            path: path.to_string(),
            id: id.to_string(),
            data: WriteData::new(data),
            merge: false,
        }])
    }

    /// Peek at a stored document without recording a call.
    pub fn raw(&self, path: &str, id: &str) -> Option<RawDocument> {
        let storage = self.storage.read().ok()?;
        storage
            .get(path)?
            .get(id)
            .map(|data| RawDocument::new(id, data.clone()))
    }

    /// Number of documents stored under `path`.
    pub fn len(&self, path: &str) -> usize {
        self.storage
            .read()
            .map(|storage| storage.get(path).map_or(0, BTreeMap::len))
            .unwrap_or(0)
    }

    pub fn is_empty(&self, path: &str) -> bool {
        self.len(path) == 0
    }

    /// Every store operation issued so far, in order.
    pub fn calls(&self) -> Vec<StoreCall> {
        lock(&self.calls).clone()
    }

    pub fn clear_calls(&self) {
        lock(&self.calls).clear();
    }

    /// Make the next store operation fail with `err`. Failures queue up.
    pub fn fail_next(&self, err: StoreError) {
        lock(&self.failures).push_back(err);
    }

    /// Deliver `err` to every listener on `path` and end those listeners.
    pub fn fail_listeners(&self, path: &str, err: StoreError) {
        let ended: Vec<Subscription> = {
            let mut subs = lock(&self.subscriptions);
            let ids: Vec<SubscriptionId> = subs
                .iter()
                .filter(|(_, sub)| sub.query.path() == path)
                .map(|(id, _)| *id)
                .collect();
            let removed = ids.into_iter().filter_map(|id| subs.remove(&id)).collect();
            removed
        };

        for sub in ended {
            (sub.listener)(Err(err.clone()));
        }
    }

    /// Number of live listeners.
    pub fn listener_count(&self) -> usize {
        lock(&self.subscriptions).len()
    }
}

#[async_trait]
impl DocumentStore for InMemoryDocumentStore {
    async fn get(&self, path: &str, id: &str) -> Result<Option<RawDocument>, StoreError> {
        self.record(StoreCall::Get {
            path: path.to_string(),
            id: id.to_string(),
        });
        self.injected_failure()?;

        let storage = self.storage.read().map_err(poisoned)?;
        Ok(storage
            .get(path)
            .and_then(|docs| docs.get(id))
            .map(|data| RawDocument::new(id, data.clone())))
    }

    async fn query(&self, query: &Query) -> Result<Vec<RawDocument>, StoreError> {
        self.record(StoreCall::Query {
            path: query.path().to_string(),
        });
        self.injected_failure()?;

        let storage = self.storage.read().map_err(poisoned)?;
        let docs = evaluate(query, documents_at(&storage, query.path()));
        debug!(path = query.path(), count = docs.len(), "in-memory query");
        Ok(docs)
    }

    async fn count(&self, query: &Query) -> Result<u64, StoreError> {
        self.record(StoreCall::Count {
            path: query.path().to_string(),
        });
        self.injected_failure()?;

        let storage = self.storage.read().map_err(poisoned)?;
        Ok(evaluate(query, documents_at(&storage, query.path())).len() as u64)
    }

    async fn create(&self, path: &str, data: WriteData) -> Result<String, StoreError> {
        self.record(StoreCall::Create {
            path: path.to_string(),
        });
        self.injected_failure()?;

        let id = self.new_document_id();
        self.write(&[WriteOp::Create {
            path: path.to_string(),
            id: id.clone(),
            data,
        }])?;
        Ok(id)
    }

    async fn set(
        &self,
        path: &str,
        id: &str,
        data: WriteData,
        merge: bool,
    ) -> Result<(), StoreError> {
        self.record(StoreCall::Set {
            path: path.to_string(),
            id: id.to_string(),
            merge,
        });
        self.injected_failure()?;

        self.write(&[WriteOp::Set {
            path: path.to_string(),
            id: id.to_string(),
            data,
            merge,
        }])
    }

    async fn delete(&self, path: &str, id: &str) -> Result<(), StoreError> {
        self.record(StoreCall::Delete {
            path: path.to_string(),
            id: id.to_string(),
        });
        self.injected_failure()?;

        self.write(&[WriteOp::Delete {
            path: path.to_string(),
            id: id.to_string(),
        }])
    }

    async fn commit_batch(&self, ops: Vec<WriteOp>) -> Result<(), StoreError> {
        self.record(StoreCall::CommitBatch { ops: ops.len() });
        self.injected_failure()?;

        self.write(&ops)
    }

    fn subscribe(
        &self,
        query: &Query,
        listener: SnapshotListener,
    ) -> Result<SubscriptionId, StoreError> {
        self.record(StoreCall::Subscribe {
            path: query.path().to_string(),
        });
        self.injected_failure()?;

        let id = SubscriptionId(self.next_subscription.fetch_add(1, Ordering::SeqCst) + 1);
        let initial = {
            let storage = self.storage.read().map_err(poisoned)?;
            evaluate(query, documents_at(&storage, query.path()))
        };

        lock(&self.subscriptions).insert(
            id,
            Subscription {
                query: query.clone(),
                listener: Arc::clone(&listener),
            },
        );

        listener(Ok(initial));
        Ok(id)
    }

    fn unsubscribe(&self, id: SubscriptionId) {
        self.record(StoreCall::Unsubscribe { id });
        lock(&self.subscriptions).remove(&id);
    }

    fn new_document_id(&self) -> String {
        URL_SAFE_NO_PAD.encode(Uuid::new_v4().as_bytes())
    }
}
