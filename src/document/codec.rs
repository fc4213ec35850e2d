//! JSON mapping between typed documents and raw store documents.

use serde_json::{Map, Value};
use tracing::warn;

use super::{fields, Document};
use crate::error::CollectionError;
use crate::store::RawDocument;

/// Serialize a document into the field map sent to the store.
///
/// The id and every managed field are removed; the collection layer adds
/// back the ones it owns (creator, server timestamps) explicitly.
pub(crate) fn encode_for_write<D: Document>(
    doc: &D,
) -> Result<Map<String, Value>, CollectionError> {
    let mut data = match serde_json::to_value(doc)? {
        Value::Object(map) => map,
        other => {
            return Err(CollectionError::Encode(format!(
                "{} documents must serialize to an object, got {}",
                D::COLLECTION,
                other
            )))
        }
    };

    data.remove(D::ID_FIELD);
    data.remove(fields::CREATED_BY);
    data.remove(fields::CREATED_AT);
    data.remove(fields::UPDATED_AT);
    Ok(data)
}

/// Map a raw document into the typed model, restoring its id.
pub(crate) fn decode<D: Document>(raw: &RawDocument) -> Result<D, CollectionError> {
    let mut data = raw.data.clone();
    data.insert(D::ID_FIELD.to_string(), Value::String(raw.id.clone()));

    serde_json::from_value(Value::Object(data)).map_err(|e| CollectionError::Decode {
        id: raw.id.clone(),
        message: e.to_string(),
    })
}

/// Decode a result set, dropping documents that do not fit the model.
pub(crate) fn decode_all<D: Document>(raws: &[RawDocument]) -> Vec<D> {
    raws.iter()
        .filter_map(|raw| match decode::<D>(raw) {
            Ok(doc) => Some(doc),
            Err(err) => {
                warn!(
                    collection = D::COLLECTION,
                    id = %raw.id,
                    error = %err,
                    "skipping undecodable document"
                );
                None
            }
        })
        .collect()
}
