pub mod auth;
pub mod collection;
pub mod document;
mod error;
pub mod pagination;
pub mod query;
pub mod store;

pub use auth::{AuthProvider, Session};
pub use collection::{
    BatchWrite, Collection, CollectionConfig, InsertPosition, ListChange, ObservableList,
    SubscriptionHandle, UpdateStrategy,
};
pub use document::{Document, ManagedFields};
pub use error::{CollectionError, StoreError};
pub use pagination::{Cursor, FetchOutcome, PaginationOptions, Paginator};
pub use query::{compile, Direction, Predicate, Query};
pub use store::{
    DocumentStore, InMemoryDocumentStore, RawDocument, SnapshotListener, StoreCall,
    SubscriptionId, WriteData, WriteOp,
};

// Derive macro for `Document`
pub use doclist_macros::Document;
