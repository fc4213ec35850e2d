//! ObservableList - the in-memory document list a UI layer watches.

use std::thread::JoinHandle;

use event_emitter_rs::EventEmitter;
use serde::{Deserialize, Serialize};
use tracing::warn;

use super::config::InsertPosition;
use crate::document::Document;

const LIST_CHANGED: &str = "list_changed";

/// A change applied to an [`ObservableList`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ListChange {
    /// The whole list was replaced (fetch or subscription delivery).
    Replaced { len: usize },
    /// Documents were added at the end (continuation page).
    Appended { ids: Vec<String> },
    Inserted { id: String, index: usize },
    Updated { id: String, index: usize },
    Removed { id: String, index: usize },
}

/// Listener deliveries still running. Wait on them once the list lock is
/// released, so listeners may read the list themselves.
#[must_use = "pending notifications should be waited on"]
#[derive(Default)]
pub(crate) struct Pending(Vec<JoinHandle<()>>);

impl Pending {
    pub(crate) fn wait(self) {
        for handle in self.0 {
            if handle.join().is_err() {
                warn!("list change listener panicked");
            }
        }
    }
}

/// Ordered documents plus change listeners.
pub struct ObservableList<D> {
    items: Vec<D>,
    emitter: EventEmitter,
}

impl<D: Document> Default for ObservableList<D> {
    fn default() -> Self {
        Self::new()
    }
}

impl<D: Document> ObservableList<D> {
    pub fn new() -> Self {
        Self {
            items: Vec::new(),
            emitter: EventEmitter::new(),
        }
    }

    pub fn items(&self) -> &[D] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&D> {
        self.items.iter().find(|item| item.id() == Some(id))
    }

    fn position(&self, id: &str) -> Option<usize> {
        self.items.iter().position(|item| item.id() == Some(id))
    }

    /// Register a change listener. Returns an id for [`remove_listener`](Self::remove_listener).
    pub fn on_change<F>(&mut self, listener: F) -> String
    where
        F: Fn(ListChange) + Send + Sync + 'static,
    {
        self.emitter.on(LIST_CHANGED, listener)
    }

    pub fn remove_listener(&mut self, id: &str) -> bool {
        self.emitter.remove_listener(id).is_some()
    }

    fn emit(&mut self, change: ListChange) -> Pending {
        Pending(self.emitter.emit(LIST_CHANGED, change))
    }

    pub(crate) fn replace_all(&mut self, items: Vec<D>) -> Pending {
        self.items = items;
        let len = self.items.len();
        self.emit(ListChange::Replaced { len })
    }

    pub(crate) fn append(&mut self, items: Vec<D>) -> Pending {
        let ids = items.iter().filter_map(|d| d.id().map(str::to_string)).collect();
        self.items.extend(items);
        self.emit(ListChange::Appended { ids })
    }

    /// Insert a document, or replace it in place if its id is already listed.
    pub(crate) fn insert(&mut self, item: D, at: InsertPosition) -> Pending {
        if let Some(id) = item.id() {
            if self.position(id).is_some() {
                return self.replace(item);
            }
        }

        let id = item.id().unwrap_or_default().to_string();
        let index = match at {
            InsertPosition::Start => 0,
            InsertPosition::End => self.items.len(),
        };
        self.items.insert(index, item);
        self.emit(ListChange::Inserted { id, index })
    }

    /// Replace the listed document with the same id. Unlisted documents are ignored.
    pub(crate) fn replace(&mut self, item: D) -> Pending {
        let Some(id) = item.id().map(str::to_string) else {
            return Pending::default();
        };
        let Some(index) = self.position(&id) else {
            return Pending::default();
        };

        if self.items[index] == item {
            return Pending::default();
        }
        self.items[index] = item;
        self.emit(ListChange::Updated { id, index })
    }

    pub(crate) fn remove(&mut self, id: &str) -> Pending {
        let Some(index) = self.position(id) else {
            return Pending::default();
        };
        self.items.remove(index);
        self.emit(ListChange::Removed {
            id: id.to_string(),
            index,
        })
    }
}
