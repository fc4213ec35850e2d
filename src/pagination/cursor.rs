use serde_json::Value;

use crate::query::lookup;
use crate::store::RawDocument;

/// Position of the last document returned by a page fetch.
///
/// Holds the document's value for the page's order field and its id, which
/// breaks ties between equal order values. Opaque to callers.
#[derive(Debug, Clone, PartialEq)]
pub struct Cursor {
    order_value: Value,
    document_id: String,
}

impl Cursor {
    pub(crate) fn new(order_value: Value, document_id: impl Into<String>) -> Self {
        Self {
            order_value,
            document_id: document_id.into(),
        }
    }

    /// Cursor at `doc`, for a query ordered by `order_field`.
    pub(crate) fn at(doc: &RawDocument, order_field: &str) -> Self {
        let order_value = lookup(&doc.data, order_field).cloned().unwrap_or(Value::Null);
        Self::new(order_value, doc.id.clone())
    }

    pub fn order_value(&self) -> &Value {
        &self.order_value
    }

    pub fn document_id(&self) -> &str {
        &self.document_id
    }
}
