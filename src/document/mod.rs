//! Documents - typed records stored in a collection.
//!
//! A document is any serde type with an optional id and the three managed
//! fields the store owns. Implement [`Document`] by hand or derive it:
//!
//! ```ignore
//! use doclist::{Document, ManagedFields};
//!
//! #[derive(Clone, Debug, PartialEq, Serialize, Deserialize, Document)]
//! #[document(collection = "tasks")]
//! struct Task {
//!     #[document(id)]
//!     pub id: Option<String>,
//!     pub title: String,
//!     #[serde(flatten)]
//!     #[document(managed)]
//!     pub meta: ManagedFields,
//! }
//! ```

mod codec;

use chrono::{DateTime, Utc};
use serde::{de::DeserializeOwned, Deserialize, Serialize};

pub(crate) use codec::{decode, decode_all, encode_for_write};

/// Stored field names of the managed fields.
pub mod fields {
    pub const CREATED_BY: &str = "created_by";
    pub const CREATED_AT: &str = "created_at";
    pub const UPDATED_AT: &str = "updated_at";
}

/// Trait for types that can be stored in a collection.
pub trait Document: Serialize + DeserializeOwned + Clone + PartialEq + Send + Sync + 'static {
    /// The collection path this type lives under (e.g. "tasks", "users/u1/notes").
    const COLLECTION: &'static str;

    /// Name of the id field in the serialized form. The id is never written
    /// into the stored data; it is restored from the document key on decode.
    const ID_FIELD: &'static str = "id";

    /// The document id, `None` until the store assigns one.
    fn id(&self) -> Option<&str>;

    fn set_id(&mut self, id: String);

    fn managed(&self) -> &ManagedFields;

    fn managed_mut(&mut self) -> &mut ManagedFields;
}

/// Fields owned by the store and the collection layer, never by the caller.
///
/// Flatten this into a document with `#[serde(flatten)]` so the values sit
/// next to the document's own fields in storage.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ManagedFields {
    pub created_by: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl ManagedFields {
    pub fn created_by(&self) -> Option<&str> {
        self.created_by.as_deref()
    }

    pub fn created_at(&self) -> Option<DateTime<Utc>> {
        self.created_at
    }

    pub fn updated_at(&self) -> Option<DateTime<Utc>> {
        self.updated_at
    }
}
