mod document;

use proc_macro::TokenStream;

// ============================================================================
// #[derive(Document)] derive macro
// ============================================================================

/// Derive macro for the `Document` trait.
///
/// # Usage
///
/// ```ignore
/// #[derive(Clone, Debug, PartialEq, Serialize, Deserialize, Document)]
/// #[document(collection = "tasks")]
/// struct Task {
///     #[document(id)]
///     pub id: Option<String>,
///     pub title: String,
///     #[serde(flatten)]
///     pub meta: ManagedFields,
/// }
/// ```
///
/// - `#[document(collection = "...")]` sets the collection path.
///   If omitted, defaults to snake_case struct name + "s".
/// - `#[document(id)]` marks the `Option<String>` id field.
///   If omitted, defaults to a field named `id`. A `#[serde(rename = "...")]`
///   on that field becomes the document's `ID_FIELD`.
/// - `#[document(managed)]` marks the `ManagedFields` field.
///   If omitted, defaults to the field whose type is `ManagedFields`.
#[proc_macro_derive(Document, attributes(document))]
pub fn derive_document(input: TokenStream) -> TokenStream {
    document::derive_document(input)
}
