use std::collections::HashSet;
use std::sync::{Arc, Mutex, PoisonError};

use chrono::Utc;
use serde_json::Value;
use tracing::{debug, warn};

use super::batch::BatchWrite;
use super::config::{CollectionConfig, UpdateStrategy};
use super::observable::{ListChange, ObservableList, Pending};
use crate::auth::AuthProvider;
use crate::document::{decode, decode_all, encode_for_write, fields, Document};
use crate::error::{CollectionError, StoreError};
use crate::pagination::{FetchOutcome, PaginationOptions, Paginator};
use crate::query::{compile, Predicate};
use crate::store::{
    increment_value, DocumentStore, RawDocument, SnapshotListener, SubscriptionId, WriteData,
    WriteOp,
};

/// An active realtime subscription created by [`Collection::subscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionHandle {
    id: SubscriptionId,
}

impl SubscriptionHandle {
    pub fn id(&self) -> SubscriptionId {
        self.id
    }
}

/// Typed access to one collection path, mirrored into an [`ObservableList`].
///
/// Every read and write goes straight to the store; results are then applied
/// to the list and announced to its change listeners. Dropping the collection
/// releases its realtime subscriptions.
pub struct Collection<D: Document, S: DocumentStore + ?Sized> {
    store: Arc<S>,
    auth: Arc<dyn AuthProvider>,
    config: CollectionConfig,
    path: String,
    list: Arc<Mutex<ObservableList<D>>>,
    paginator: Paginator,
    subscriptions: Mutex<HashSet<SubscriptionId>>,
}

impl<D: Document, S: DocumentStore + ?Sized> Collection<D, S> {
    /// A collection at `D::COLLECTION` with default settings.
    pub fn new(store: Arc<S>, auth: Arc<dyn AuthProvider>) -> Self {
        Self::with_config(store, auth, CollectionConfig::default())
    }

    pub fn with_config(
        store: Arc<S>,
        auth: Arc<dyn AuthProvider>,
        config: CollectionConfig,
    ) -> Self {
        let path = config
            .path
            .clone()
            .unwrap_or_else(|| D::COLLECTION.to_string());

        Self {
            store,
            auth,
            paginator: Paginator::new(path.as_str()),
            path,
            config,
            list: Arc::new(Mutex::new(ObservableList::new())),
            subscriptions: Mutex::new(HashSet::new()),
        }
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn config(&self) -> &CollectionConfig {
        &self.config
    }

    /// Snapshot of the listed documents.
    pub fn items(&self) -> Result<Vec<D>, CollectionError> {
        let list = self
            .list
            .lock()
            .map_err(|_| CollectionError::LockPoisoned("items"))?;
        Ok(list.items().to_vec())
    }

    /// Register a listener for list changes.
    ///
    /// Returns an id for [`remove_listener`](Self::remove_listener).
    pub fn on_change<F>(&self, listener: F) -> Result<String, CollectionError>
    where
        F: Fn(ListChange) + Send + Sync + 'static,
    {
        let mut list = self
            .list
            .lock()
            .map_err(|_| CollectionError::LockPoisoned("on_change"))?;
        Ok(list.on_change(listener))
    }

    pub fn remove_listener(&self, id: &str) -> Result<bool, CollectionError> {
        let mut list = self
            .list
            .lock()
            .map_err(|_| CollectionError::LockPoisoned("remove_listener"))?;
        Ok(list.remove_listener(id))
    }

    /// Forget the pagination cursor; the next continuation reports `NoCursor`.
    pub fn reset_pagination(&mut self) {
        self.paginator.reset();
    }

    /// Apply a list mutation, then wait for its listeners with the lock released.
    fn mutate<F>(&self, operation: &'static str, f: F) -> Result<(), CollectionError>
    where
        F: FnOnce(&mut ObservableList<D>) -> Pending,
    {
        let pending = {
            let mut list = self
                .list
                .lock()
                .map_err(|_| CollectionError::LockPoisoned(operation))?;
            f(&mut list)
        };
        pending.wait();
        Ok(())
    }

    fn require_id<'a>(&self, doc: &'a D) -> Result<&'a str, CollectionError> {
        doc.id()
            .ok_or_else(|| CollectionError::MissingId(self.path.clone()))
    }

    /// Field data for a new document: caller values plus creator and server timestamps.
    fn creation_data(
        &self,
        doc: &D,
        created_by: Option<&str>,
    ) -> Result<WriteData, CollectionError> {
        let mut data = WriteData::new(encode_for_write(doc)?)
            .server_timestamp(fields::CREATED_AT)
            .server_timestamp(fields::UPDATED_AT);
        if let Some(user) = created_by {
            data = data.field(fields::CREATED_BY, Value::String(user.to_string()));
        }
        Ok(data)
    }

    fn update_data(&self, doc: &D) -> Result<WriteData, CollectionError> {
        Ok(WriteData::new(encode_for_write(doc)?).server_timestamp(fields::UPDATED_AT))
    }

    /// The local copy of a freshly created document.
    fn stamped_created(mut doc: D, id: String, created_by: Option<String>) -> D {
        let now = Utc::now();
        doc.set_id(id);
        let managed = doc.managed_mut();
        managed.created_by = created_by;
        managed.created_at = Some(now);
        managed.updated_at = Some(now);
        doc
    }

    fn touched(mut doc: D) -> D {
        doc.managed_mut().updated_at = Some(Utc::now());
        doc
    }

    /// The local copy after a merge write. A merge never changes `created_by`
    /// or `created_at`, so those come from the listed copy (unset when the
    /// document is not listed), never from the caller.
    fn stamped_updated(&self, mut doc: D) -> Result<D, CollectionError> {
        let listed = {
            let list = self
                .list
                .lock()
                .map_err(|_| CollectionError::LockPoisoned("update"))?;
            doc.id()
                .and_then(|id| list.get(id))
                .map(|listed| listed.managed().clone())
        };
        *doc.managed_mut() = listed.unwrap_or_default();
        Ok(Self::touched(doc))
    }

    // ---- reads ----

    /// Fetch one document by id. Missing and undecodable documents are `None`.
    pub async fn get_one(&self, id: &str) -> Result<Option<D>, CollectionError> {
        let raw = self.store.get(&self.path, id).await?;
        debug!(path = %self.path, id, found = raw.is_some(), "get_one");

        Ok(raw.and_then(|raw| decode_all::<D>(std::slice::from_ref(&raw)).pop()))
    }

    /// Fetch the first document matching the predicates.
    pub async fn get_one_where(
        &self,
        predicates: &[Predicate],
    ) -> Result<Option<D>, CollectionError> {
        let query = compile(&self.path, predicates).limit(1);
        let raws = self.store.query(&query).await?;

        Ok(decode_all::<D>(&raws).into_iter().next())
    }

    /// Fetch every matching document and make them the list contents.
    pub async fn get_many(&self, predicates: &[Predicate]) -> Result<Vec<D>, CollectionError> {
        let query = compile(&self.path, predicates);
        let raws = self.store.query(&query).await?;
        let docs = decode_all::<D>(&raws);
        debug!(path = %self.path, fetched = raws.len(), decoded = docs.len(), "get_many");

        self.mutate("get_many", |list| list.replace_all(docs.clone()))?;
        Ok(docs)
    }

    /// Fetch a page. A first page replaces the list contents, a continuation
    /// appends to them.
    ///
    /// A page whose documents all fail to decode is skipped, so `Fetched`
    /// always carries at least one document. A first page followed only by
    /// such pages reports `Empty`.
    pub async fn get_page(
        &mut self,
        options: &PaginationOptions,
        predicates: &[Predicate],
        continuation: bool,
    ) -> Result<FetchOutcome<D>, CollectionError> {
        let mut raw = if continuation {
            self.paginator
                .fetch_next(self.store.as_ref(), options, predicates)
                .await?
        } else {
            self.paginator
                .fetch_first(self.store.as_ref(), options, predicates)
                .await?
        };

        let outcome = loop {
            match raw {
                FetchOutcome::Fetched(raws) => {
                    let docs = decode_all::<D>(&raws);
                    if !docs.is_empty() {
                        break FetchOutcome::Fetched(docs);
                    }
                    warn!(
                        path = %self.path,
                        skipped = raws.len(),
                        "page had no decodable documents"
                    );
                    raw = self
                        .paginator
                        .fetch_next(self.store.as_ref(), options, predicates)
                        .await?;
                    if !continuation && matches!(raw, FetchOutcome::Exhausted) {
                        break FetchOutcome::Empty;
                    }
                }
                other => break other.map(|raws| decode_all::<D>(&raws)),
            }
        };

        match &outcome {
            FetchOutcome::Fetched(docs) if continuation => {
                self.mutate("get_page", |list| list.append(docs.clone()))?;
            }
            FetchOutcome::Fetched(docs) => {
                self.mutate("get_page", |list| list.replace_all(docs.clone()))?;
            }
            FetchOutcome::Empty => {
                self.mutate("get_page", |list| list.replace_all(Vec::new()))?;
            }
            FetchOutcome::Exhausted | FetchOutcome::NoCursor => {}
        }

        Ok(outcome)
    }

    /// Count matching documents with the store's aggregation.
    pub async fn get_count(&self, predicates: &[Predicate]) -> Result<u64, CollectionError> {
        let query = compile(&self.path, predicates);
        Ok(self.store.count(&query).await?)
    }

    // ---- writes ----

    /// Write a new document under a store-assigned id.
    ///
    /// The creator comes from the auth provider and both timestamps from the
    /// store clock. The returned copy carries local approximations of them.
    pub async fn create(&self, doc: D) -> Result<D, CollectionError> {
        let created_by = self.auth.current_user_id();
        let data = self.creation_data(&doc, created_by.as_deref())?;

        let id = self.store.create(&self.path, data).await?;
        debug!(path = %self.path, %id, "created document");

        let created = Self::stamped_created(doc, id, created_by);
        let at = self.config.insert_position;
        self.mutate("create", |list| list.insert(created.clone(), at))?;
        Ok(created)
    }

    /// Write a new document under a caller-chosen id, replacing any document
    /// already stored there.
    pub async fn create_with_id(&self, id: &str, doc: D) -> Result<D, CollectionError> {
        let created_by = self.auth.current_user_id();
        let data = self.creation_data(&doc, created_by.as_deref())?;

        self.store.set(&self.path, id, data, false).await?;
        debug!(path = %self.path, id, "created document with id");

        let created = Self::stamped_created(doc, id.to_string(), created_by);
        let at = self.config.insert_position;
        self.mutate("create_with_id", |list| list.insert(created.clone(), at))?;
        Ok(created)
    }

    /// Merge the document onto the stored one.
    ///
    /// `Local` stamps `updated_at` with the local clock and never reads back.
    /// `ServerConfirmed` reads the document back once and lists that version.
    pub async fn update(&self, doc: D, strategy: UpdateStrategy) -> Result<D, CollectionError> {
        let id = self.require_id(&doc)?.to_string();
        let data = self.update_data(&doc)?;

        self.store.set(&self.path, &id, data, true).await?;
        debug!(path = %self.path, %id, ?strategy, "updated document");

        let updated = match strategy {
            UpdateStrategy::Local => self.stamped_updated(doc)?,
            UpdateStrategy::ServerConfirmed => {
                let raw = self
                    .store
                    .get(&self.path, &id)
                    .await?
                    .ok_or_else(|| CollectionError::NotFound {
                        path: self.path.clone(),
                        id: id.clone(),
                    })?;
                decode::<D>(&raw)?
            }
        };

        self.mutate("update", |list| list.replace(updated.clone()))?;
        Ok(updated)
    }

    /// Update with the configured strategy.
    pub async fn save(&self, doc: D) -> Result<D, CollectionError> {
        self.update(doc, self.config.update_strategy).await
    }

    pub async fn delete(&self, doc: &D) -> Result<(), CollectionError> {
        let id = self.require_id(doc)?;

        self.store.delete(&self.path, id).await?;
        debug!(path = %self.path, id, "deleted document");

        self.mutate("delete", |list| list.remove(id))
    }

    /// Add `amount` to a numeric field with a store-side increment.
    ///
    /// Returns `false` without touching the store when `amount` is not positive.
    pub async fn increment_field(
        &self,
        field: &str,
        amount: i64,
        target: &D,
    ) -> Result<bool, CollectionError> {
        if amount <= 0 {
            debug!(path = %self.path, field, amount, "ignoring non-positive increment");
            return Ok(false);
        }
        self.apply_increment(field, amount, target).await
    }

    /// Subtract `amount` from a numeric field with a store-side increment.
    ///
    /// Returns `false` without touching the store when `amount` is not positive.
    pub async fn decrement_field(
        &self,
        field: &str,
        amount: i64,
        target: &D,
    ) -> Result<bool, CollectionError> {
        if amount <= 0 {
            debug!(path = %self.path, field, amount, "ignoring non-positive decrement");
            return Ok(false);
        }
        self.apply_increment(field, -amount, target).await
    }

    async fn apply_increment(
        &self,
        field: &str,
        delta: i64,
        target: &D,
    ) -> Result<bool, CollectionError> {
        let id = self.require_id(target)?;
        let data = WriteData::default()
            .increment(field, delta)
            .server_timestamp(fields::UPDATED_AT);

        self.store.set(&self.path, id, data, true).await?;
        debug!(path = %self.path, id, field, delta, "incremented field");

        let listed = self
            .list
            .lock()
            .map_err(|_| CollectionError::LockPoisoned("increment"))?
            .get(id)
            .cloned();
        if let Some(listed) = listed {
            match Self::incremented(&listed, field, delta) {
                Ok(updated) => self.mutate("increment", |list| list.replace(updated))?,
                Err(err) => warn!(
                    path = %self.path,
                    id,
                    field,
                    error = %err,
                    "could not mirror increment locally"
                ),
            }
        }
        Ok(true)
    }

    /// The listed copy of a document after an increment of `field` by `delta`.
    fn incremented(target: &D, field: &str, delta: i64) -> Result<D, serde_json::Error> {
        let mut value = serde_json::to_value(target)?;
        if let Value::Object(map) = &mut value {
            let next = increment_value(map.get(field), delta);
            map.insert(field.to_string(), next);
        }
        let doc: D = serde_json::from_value(value)?;
        Ok(Self::touched(doc))
    }

    /// Apply the writes atomically, in order.
    ///
    /// Creates get fresh ids, the creator and server timestamps. Updates
    /// merge onto existing documents; a missing one fails the whole batch.
    /// The list changes only after the store has committed. Returns the
    /// local copy of each written document.
    pub async fn apply_batch(&self, writes: Vec<BatchWrite<D>>) -> Result<Vec<D>, CollectionError> {
        let created_by = self.auth.current_user_id();
        let mut ops = Vec::with_capacity(writes.len());
        let mut results = Vec::with_capacity(writes.len());

        for write in writes {
            match write {
                BatchWrite::Create(doc) => {
                    let id = self.store.new_document_id();
                    ops.push(WriteOp::Create {
                        path: self.path.clone(),
                        id: id.clone(),
                        data: self.creation_data(&doc, created_by.as_deref())?,
                    });
                    let created = Self::stamped_created(doc, id, created_by.clone());
                    results.push(BatchWrite::Create(created));
                }
                BatchWrite::Update(doc) => {
                    ops.push(WriteOp::Update {
                        path: self.path.clone(),
                        id: self.require_id(&doc)?.to_string(),
                        data: self.update_data(&doc)?,
                    });
                    results.push(BatchWrite::Update(self.stamped_updated(doc)?));
                }
                BatchWrite::Delete(doc) => {
                    ops.push(WriteOp::Delete {
                        path: self.path.clone(),
                        id: self.require_id(&doc)?.to_string(),
                    });
                    results.push(BatchWrite::Delete(doc));
                }
            }
        }

        let count = ops.len();
        self.store.commit_batch(ops).await?;
        debug!(path = %self.path, count, "committed batch");

        // One list change at a time, so listeners see them in batch order.
        let at = self.config.insert_position;
        for write in &results {
            debug!(kind = write.kind(), id = write.document().id(), "applying batch entry to list");
            self.mutate("apply_batch", |list| match write {
                BatchWrite::Create(doc) => list.insert(doc.clone(), at),
                BatchWrite::Update(doc) => list.replace(doc.clone()),
                BatchWrite::Delete(doc) => match doc.id() {
                    Some(id) => list.remove(id),
                    None => Pending::default(),
                },
            })?;
        }

        Ok(results
            .into_iter()
            .map(|write| match write {
                BatchWrite::Create(doc) | BatchWrite::Update(doc) | BatchWrite::Delete(doc) => doc,
            })
            .collect())
    }

    // ---- subscriptions ----

    /// Listen to the documents matching the predicates.
    ///
    /// Every delivery replaces the list contents and is then passed to
    /// `on_change`. A store error is passed on once and ends the subscription.
    pub fn subscribe<F>(
        &self,
        predicates: &[Predicate],
        on_change: F,
    ) -> Result<SubscriptionHandle, CollectionError>
    where
        F: Fn(Result<Vec<D>, CollectionError>) + Send + Sync + 'static,
    {
        let query = compile(&self.path, predicates);
        let list = Arc::clone(&self.list);
        let path = self.path.clone();

        let listener: SnapshotListener =
            Arc::new(move |snapshot: Result<Vec<RawDocument>, StoreError>| match snapshot {
                Ok(raws) => {
                    let docs = decode_all::<D>(&raws);
                    let pending = match list.lock() {
                        Ok(mut list) => list.replace_all(docs.clone()),
                        Err(_) => {
                            warn!(path = %path, "list lock poisoned, snapshot not listed");
                            Pending::default()
                        }
                    };
                    pending.wait();
                    on_change(Ok(docs));
                }
                Err(err) => {
                    warn!(path = %path, error = %err, "subscription ended with error");
                    on_change(Err(err.into()));
                }
            });

        let id = self.store.subscribe(&query, listener)?;
        self.subscriptions
            .lock()
            .map_err(|_| CollectionError::LockPoisoned("subscribe"))?
            .insert(id);
        debug!(path = %self.path, subscription = id.0, "subscribed");

        Ok(SubscriptionHandle { id })
    }

    /// Stop a subscription. Returns `false` if it was already stopped.
    pub fn unsubscribe(&self, handle: SubscriptionHandle) -> Result<bool, CollectionError> {
        let removed = self
            .subscriptions
            .lock()
            .map_err(|_| CollectionError::LockPoisoned("unsubscribe"))?
            .remove(&handle.id);

        if removed {
            self.store.unsubscribe(handle.id);
            debug!(path = %self.path, subscription = handle.id.0, "unsubscribed");
        }
        Ok(removed)
    }

    /// Number of subscriptions not yet stopped through this collection.
    pub fn active_subscriptions(&self) -> usize {
        self.subscriptions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

impl<D: Document, S: DocumentStore + ?Sized> Drop for Collection<D, S> {
    fn drop(&mut self) {
        let ids: Vec<SubscriptionId> = self
            .subscriptions
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner)
            .drain()
            .collect();

        for id in ids {
            self.store.unsubscribe(id);
        }
    }
}
