//! Pagination - forward-only cursor paging over a collection query.
//!
//! ```ignore
//! let mut pages = Paginator::new("tasks");
//! let options = PaginationOptions::new(20, "created_at").descending();
//!
//! match pages.fetch_first(&store, &options, &[Predicate::equals("owner", "u1")]).await? {
//!     FetchOutcome::Fetched(docs) => render(docs),
//!     FetchOutcome::Empty => show_placeholder(),
//!     _ => unreachable!(),
//! }
//!
//! // later, when the user scrolls to the bottom
//! let more = pages.fetch_next(&store, &options, &predicates).await?;
//! ```

mod cursor;
mod paginator;

pub use cursor::Cursor;
pub use paginator::Paginator;

use serde::Deserialize;

use crate::error::CollectionError;
use crate::query::Predicate;

/// Page size and ordering for a paginated listing.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PaginationOptions {
    pub limit: usize,
    pub order_by_field: String,
    #[serde(default)]
    pub descending: bool,
}

impl PaginationOptions {
    /// Ascending pages of `limit` documents ordered by `order_by_field`.
    pub fn new(limit: usize, order_by_field: impl Into<String>) -> Self {
        Self {
            limit,
            order_by_field: order_by_field.into(),
            descending: false,
        }
    }

    pub fn descending(mut self) -> Self {
        self.descending = true;
        self
    }

    /// Reject requests the paginator cannot honor: a zero page size, or
    /// predicates that would fight over the ordering or the limit.
    pub fn validate(&self, predicates: &[Predicate]) -> Result<(), CollectionError> {
        if self.limit == 0 {
            return Err(CollectionError::InvalidPagination(
                "page size must be positive".into(),
            ));
        }

        if let Some(conflict) = predicates.iter().find(|p| p.is_structural()) {
            return Err(CollectionError::InvalidPagination(format!(
                "{:?} predicate conflicts with pagination options",
                conflict.kind()
            )));
        }

        Ok(())
    }
}

/// Result of a page fetch. These are expected outcomes, not errors.
#[derive(Debug, Clone, PartialEq)]
pub enum FetchOutcome<T> {
    /// The first page matched no documents.
    Empty,
    /// One or more documents; the cursor now points at the last of them.
    Fetched(Vec<T>),
    /// A continuation found nothing past the cursor.
    Exhausted,
    /// A continuation was requested before any first page.
    NoCursor,
}

impl<T> FetchOutcome<T> {
    pub fn is_fetched(&self) -> bool {
        matches!(self, FetchOutcome::Fetched(_))
    }

    /// Items of a `Fetched` outcome; empty for every other state.
    pub fn items(&self) -> &[T] {
        match self {
            FetchOutcome::Fetched(items) => items,
            _ => &[],
        }
    }

    pub fn into_items(self) -> Vec<T> {
        match self {
            FetchOutcome::Fetched(items) => items,
            _ => Vec::new(),
        }
    }

    /// Convert the items of a `Fetched` outcome, keeping every other state.
    pub fn map<U>(self, f: impl FnOnce(Vec<T>) -> Vec<U>) -> FetchOutcome<U> {
        match self {
            FetchOutcome::Empty => FetchOutcome::Empty,
            FetchOutcome::Fetched(items) => FetchOutcome::Fetched(f(items)),
            FetchOutcome::Exhausted => FetchOutcome::Exhausted,
            FetchOutcome::NoCursor => FetchOutcome::NoCursor,
        }
    }
}
