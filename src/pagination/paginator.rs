use tracing::debug;

use super::{Cursor, FetchOutcome, PaginationOptions};
use crate::error::CollectionError;
use crate::query::{compile, Direction, Predicate, Query};
use crate::store::{DocumentStore, RawDocument};

/// Forward-only pagination over one collection path.
///
/// Holds the cursor for a single listing session. Methods take `&mut self`,
/// so a paginator serves one page request at a time; share it across tasks
/// behind a mutex. The cursor is only written once a store call has
/// completed, so a dropped (cancelled) or failed fetch leaves it unchanged.
#[derive(Debug, Clone)]
pub struct Paginator {
    path: String,
    cursor: Option<Cursor>,
    /// The last page came back shorter than the page size.
    exhausted: bool,
}

impl Paginator {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            cursor: None,
            exhausted: false,
        }
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn cursor(&self) -> Option<&Cursor> {
        self.cursor.as_ref()
    }

    /// Forget the cursor without fetching.
    pub fn reset(&mut self) {
        self.cursor = None;
        self.exhausted = false;
    }

    fn page_query(&self, options: &PaginationOptions, predicates: &[Predicate]) -> Query {
        compile(&self.path, predicates)
            .order_by(
                options.order_by_field.as_str(),
                Direction::from_descending(options.descending),
            )
            .limit(options.limit)
    }

    fn advance(&mut self, options: &PaginationOptions, page: &[RawDocument]) {
        if let Some(last) = page.last() {
            self.cursor = Some(Cursor::at(last, &options.order_by_field));
        }
        self.exhausted = page.len() < options.limit;
    }

    /// Fetch the first page, discarding any previous cursor.
    pub async fn fetch_first<S>(
        &mut self,
        store: &S,
        options: &PaginationOptions,
        predicates: &[Predicate],
    ) -> Result<FetchOutcome<RawDocument>, CollectionError>
    where
        S: DocumentStore + ?Sized,
    {
        options.validate(predicates)?;

        let query = self.page_query(options, predicates);
        let page = store.query(&query).await?;
        debug!(path = %self.path, count = page.len(), "fetched first page");

        self.reset();
        if page.is_empty() {
            return Ok(FetchOutcome::Empty);
        }

        self.advance(options, &page);
        Ok(FetchOutcome::Fetched(page))
    }

    /// Fetch the page after the cursor.
    ///
    /// Returns `NoCursor` before any non-empty first page and `Exhausted`
    /// once the listing has run out; neither touches the store.
    pub async fn fetch_next<S>(
        &mut self,
        store: &S,
        options: &PaginationOptions,
        predicates: &[Predicate],
    ) -> Result<FetchOutcome<RawDocument>, CollectionError>
    where
        S: DocumentStore + ?Sized,
    {
        options.validate(predicates)?;

        let Some(cursor) = self.cursor.clone() else {
            return Ok(FetchOutcome::NoCursor);
        };
        if self.exhausted {
            return Ok(FetchOutcome::Exhausted);
        }

        let query = self.page_query(options, predicates).start_after(cursor);
        let page = store.query(&query).await?;
        debug!(path = %self.path, count = page.len(), "fetched next page");

        if page.is_empty() {
            self.exhausted = true;
            return Ok(FetchOutcome::Exhausted);
        }

        self.advance(options, &page);
        Ok(FetchOutcome::Fetched(page))
    }
}
