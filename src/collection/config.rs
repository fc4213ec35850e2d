use serde::Deserialize;

use crate::error::CollectionError;

/// Where newly created documents enter the observable list.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InsertPosition {
    Start,
    #[default]
    End,
}

/// How an update settles the in-memory copy.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UpdateStrategy {
    /// Stamp `updated_at` with the local clock; no read after the write.
    #[default]
    Local,
    /// Read the document back once after the write and list the stored version.
    ServerConfirmed,
}

/// Per-collection settings.
///
/// ```json
/// { "path": "users/u1/tasks", "insert_position": "start", "update_strategy": "server_confirmed" }
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct CollectionConfig {
    /// Collection path; the document type's `COLLECTION` when unset.
    pub path: Option<String>,
    pub insert_position: InsertPosition,
    /// Strategy used by `Collection::save`.
    pub update_strategy: UpdateStrategy,
}

impl CollectionConfig {
    pub fn at_path(path: impl Into<String>) -> Self {
        Self {
            path: Some(path.into()),
            ..Self::default()
        }
    }

    pub fn from_json(json: &str) -> Result<Self, CollectionError> {
        serde_json::from_str(json).map_err(|e| CollectionError::Config(e.to_string()))
    }
}
