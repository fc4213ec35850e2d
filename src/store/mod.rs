//! Document store - the remote database seam.
//!
//! `DocumentStore` is the narrow async interface the collection layer needs
//! from a document database client. Connection pooling, retries and timeouts
//! belong to the implementation.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────┐
//! │          Collection<D, S> (per path)         │
//! │  typed CRUD · pages · batches · listeners    │
//! └──────────────────────────────────────────────┘
//!                       │
//!                       ▼
//! ┌──────────────────────────────────────────────┐
//! │             DocumentStore trait              │
//! │  get / query / count / create / set / delete │
//! │  commit_batch / subscribe / unsubscribe      │
//! └──────────────────────────────────────────────┘
//!            │                          │
//!            ▼                          ▼
//! ┌───────────────────────┐   ┌───────────────────────┐
//! │ InMemoryDocumentStore │   │   Firestore client    │
//! │      (included)       │   │      (external)       │
//! └───────────────────────┘   └───────────────────────┘
//! ```

mod in_memory;

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Map, Number, Value};

use crate::error::StoreError;
use crate::query::Query;

pub use in_memory::{InMemoryDocumentStore, StoreCall};

/// A document as the store sees it: an id and a JSON field map.
#[derive(Debug, Clone, PartialEq)]
pub struct RawDocument {
    pub id: String,
    pub data: Map<String, Value>,
}

impl RawDocument {
    pub fn new(id: impl Into<String>, data: Map<String, Value>) -> Self {
        Self { id: id.into(), data }
    }
}

/// Result of adding `amount` to a stored value, following increment-transform
/// rules: integers stay integers unless they overflow, floats stay floats, and
/// anything else is replaced by the amount.
pub(crate) fn increment_value(current: Option<&Value>, amount: i64) -> Value {
    match current {
        Some(Value::Number(n)) => {
            if let Some(i) = n.as_i64() {
                match i.checked_add(amount) {
                    Some(sum) => Value::Number(sum.into()),
                    None => Number::from_f64(i as f64 + amount as f64)
                        .map(Value::Number)
                        .unwrap_or(Value::Null),
                }
            } else {
                n.as_f64()
                    .and_then(|f| Number::from_f64(f + amount as f64))
                    .map(Value::Number)
                    .unwrap_or(Value::Null)
            }
        }
        _ => Value::Number(amount.into()),
    }
}

/// Store-side change applied to a single field during a write.
#[derive(Debug, Clone, PartialEq)]
pub enum Transform {
    /// Set the field to the store's clock at commit time.
    ServerTimestamp,
    /// Add to the field's numeric value; a missing or non-numeric field
    /// becomes the amount itself.
    Increment(i64),
}

#[derive(Debug, Clone, PartialEq)]
pub struct FieldTransform {
    pub field: String,
    pub transform: Transform,
}

/// Field values plus store-side transforms for one write.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WriteData {
    pub fields: Map<String, Value>,
    pub transforms: Vec<FieldTransform>,
}

impl WriteData {
    pub fn new(fields: Map<String, Value>) -> Self {
        Self {
            fields,
            transforms: Vec::new(),
        }
    }

    /// Set a plain field value.
    pub fn field(mut self, name: impl Into<String>, value: Value) -> Self {
        self.fields.insert(name.into(), value);
        self
    }

    pub fn server_timestamp(mut self, field: impl Into<String>) -> Self {
        self.transforms.push(FieldTransform {
            field: field.into(),
            transform: Transform::ServerTimestamp,
        });
        self
    }

    pub fn increment(mut self, field: impl Into<String>, amount: i64) -> Self {
        self.transforms.push(FieldTransform {
            field: field.into(),
            transform: Transform::Increment(amount),
        });
        self
    }
}

/// One entry of an atomic batch.
#[derive(Debug, Clone, PartialEq)]
pub enum WriteOp {
    /// Write a new document; fails if the id is taken.
    Create { path: String, id: String, data: WriteData },
    /// Write a document, replacing it or merging into it.
    Set {
        path: String,
        id: String,
        data: WriteData,
        merge: bool,
    },
    /// Merge into an existing document; fails if it does not exist.
    Update { path: String, id: String, data: WriteData },
    /// Remove a document; removing a missing document succeeds.
    Delete { path: String, id: String },
}

/// Handle of a realtime listener registered with a store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(pub u64);

/// Callback receiving the full matched document set on every change, or the
/// error that ended the listener.
pub type SnapshotListener = Arc<dyn Fn(Result<Vec<RawDocument>, StoreError>) + Send + Sync>;

/// Async interface to a document database.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Read one document. `Ok(None)` when it does not exist.
    async fn get(&self, path: &str, id: &str) -> Result<Option<RawDocument>, StoreError>;

    /// Run a query and return the matching documents in query order.
    async fn query(&self, query: &Query) -> Result<Vec<RawDocument>, StoreError>;

    /// Count the documents a query matches, computed by the store.
    async fn count(&self, query: &Query) -> Result<u64, StoreError>;

    /// Write a new document under a store-assigned id and return the id.
    async fn create(&self, path: &str, data: WriteData) -> Result<String, StoreError>;

    /// Write a document by id, replacing it or merging into it.
    async fn set(
        &self,
        path: &str,
        id: &str,
        data: WriteData,
        merge: bool,
    ) -> Result<(), StoreError>;

    /// Remove a document by id.
    async fn delete(&self, path: &str, id: &str) -> Result<(), StoreError>;

    /// Apply every operation or none of them.
    async fn commit_batch(&self, ops: Vec<WriteOp>) -> Result<(), StoreError>;

    /// Register a realtime listener for a query.
    ///
    /// The listener receives the full result set on registration and after
    /// every change. An error is delivered once and ends the listener.
    fn subscribe(
        &self,
        query: &Query,
        listener: SnapshotListener,
    ) -> Result<SubscriptionId, StoreError>;

    /// Remove a listener. Removing an unknown or ended listener does nothing.
    fn unsubscribe(&self, id: SubscriptionId);

    /// A fresh id for a document written later (e.g. inside a batch).
    fn new_document_id(&self) -> String;
}
