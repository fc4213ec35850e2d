use crate::document::Document;

/// One entry of [`Collection::apply_batch`](super::Collection::apply_batch).
#[derive(Debug, Clone, PartialEq)]
pub enum BatchWrite<D> {
    /// Write the document under a fresh id with stamped managed fields.
    Create(D),
    /// Merge the document onto the stored one with the same id.
    Update(D),
    /// Remove the document with this id.
    Delete(D),
}

impl<D: Document> BatchWrite<D> {
    pub fn document(&self) -> &D {
        match self {
            BatchWrite::Create(doc) | BatchWrite::Update(doc) | BatchWrite::Delete(doc) => doc,
        }
    }

    pub(crate) fn kind(&self) -> &'static str {
        match self {
            BatchWrite::Create(_) => "create",
            BatchWrite::Update(_) => "update",
            BatchWrite::Delete(_) => "delete",
        }
    }
}
