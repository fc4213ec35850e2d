//! Error types for store and collection operations.

use thiserror::Error;

/// Failure reported by a [`DocumentStore`](crate::DocumentStore).
///
/// Store errors are propagated to the caller unchanged. They are `Clone` so a
/// single failure can be delivered to every listener of a subscription.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// The target document does not exist (e.g. an update inside a batch).
    #[error("document not found: {path}/{id}")]
    NotFound { path: String, id: String },
    /// A create targeted an id that is already taken.
    #[error("document already exists: {path}/{id}")]
    AlreadyExists { path: String, id: String },
    /// The backend could not be reached.
    #[error("store unavailable: {0}")]
    Unavailable(String),
    /// The current identity may not perform the operation.
    #[error("permission denied: {0}")]
    PermissionDenied(String),
    /// The request was malformed (bad field path, invalid operand, ...).
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    /// Any other backend failure.
    #[error("store error: {0}")]
    Internal(String),
}

/// Error type for collection operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CollectionError {
    #[error(transparent)]
    Store(#[from] StoreError),
    /// A document could not be turned into a JSON object for writing.
    #[error("failed to encode document: {0}")]
    Encode(String),
    /// A raw document could not be mapped into the typed model.
    #[error("failed to decode document {id}: {message}")]
    Decode { id: String, message: String },
    /// The operation needs a document id and the document has none.
    #[error("document in {0} has no id")]
    MissingId(String),
    /// A read-back after a write found nothing.
    #[error("document not found: {path}/{id}")]
    NotFound { path: String, id: String },
    /// The pagination request is malformed (zero page size, conflicting predicates).
    #[error("invalid pagination request: {0}")]
    InvalidPagination(String),
    /// Collection settings could not be parsed.
    #[error("invalid collection config: {0}")]
    Config(String),
    #[error("collection lock poisoned during {0}")]
    LockPoisoned(&'static str),
}

impl From<serde_json::Error> for CollectionError {
    fn from(err: serde_json::Error) -> Self {
        CollectionError::Encode(err.to_string())
    }
}
