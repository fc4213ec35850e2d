//! Query descriptors and the predicate compiler.

use serde_json::Value;

use super::predicate::Predicate;
use crate::pagination::Cursor;

/// Comparison applied by a [`Filter`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FilterOp {
    Equal,
    In,
    NotIn,
    ArrayContains,
    ArrayContainsAny,
    LessThan,
    GreaterThan,
    LessOrEqual,
    GreaterOrEqual,
}

/// A single field constraint.
#[derive(Debug, Clone, PartialEq)]
pub struct Filter {
    pub field: String,
    pub op: FilterOp,
    pub value: Value,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Direction {
    #[default]
    Ascending,
    Descending,
}

impl Direction {
    pub fn from_descending(descending: bool) -> Self {
        if descending {
            Direction::Descending
        } else {
            Direction::Ascending
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct OrderBy {
    pub field: String,
    pub direction: Direction,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Limit {
    /// Keep the first `n` documents of the ordered result.
    First(usize),
    /// Keep the last `n` documents of the ordered result.
    Last(usize),
}

/// A composed query against one collection path.
///
/// Filters accumulate; the ordering, the limit and the start cursor are
/// single slots where the last value applied wins.
#[derive(Debug, Clone, PartialEq)]
pub struct Query {
    path: String,
    filters: Vec<Filter>,
    order_by: Option<OrderBy>,
    limit: Option<Limit>,
    start_after: Option<Cursor>,
}

impl Query {
    /// All documents at `path`.
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            filters: Vec::new(),
            order_by: None,
            limit: None,
            start_after: None,
        }
    }

    pub fn filter(mut self, field: impl Into<String>, op: FilterOp, value: Value) -> Self {
        self.filters.push(Filter {
            field: field.into(),
            op,
            value,
        });
        self
    }

    pub fn order_by(mut self, field: impl Into<String>, direction: Direction) -> Self {
        self.order_by = Some(OrderBy {
            field: field.into(),
            direction,
        });
        self
    }

    pub fn limit(mut self, count: usize) -> Self {
        self.limit = Some(Limit::First(count));
        self
    }

    pub fn limit_to_last(mut self, count: usize) -> Self {
        self.limit = Some(Limit::Last(count));
        self
    }

    /// Resume strictly after the given position.
    pub fn start_after(mut self, cursor: Cursor) -> Self {
        self.start_after = Some(cursor);
        self
    }

    /// Apply one predicate on top of this query.
    pub fn apply(self, predicate: &Predicate) -> Self {
        match predicate {
            Predicate::Equals { field, value } => {
                self.filter(field, FilterOp::Equal, value.clone())
            }
            Predicate::In { field, values } => {
                self.filter(field, FilterOp::In, Value::Array(values.clone()))
            }
            Predicate::NotIn { field, values } => {
                self.filter(field, FilterOp::NotIn, Value::Array(values.clone()))
            }
            Predicate::ArrayContains { field, value } => {
                self.filter(field, FilterOp::ArrayContains, value.clone())
            }
            Predicate::ArrayContainsAny { field, values } => {
                self.filter(field, FilterOp::ArrayContainsAny, Value::Array(values.clone()))
            }
            Predicate::LessThan { field, value } => {
                self.filter(field, FilterOp::LessThan, value.clone())
            }
            Predicate::GreaterThan { field, value } => {
                self.filter(field, FilterOp::GreaterThan, value.clone())
            }
            Predicate::LessOrEqual { field, value } => {
                self.filter(field, FilterOp::LessOrEqual, value.clone())
            }
            Predicate::GreaterOrEqual { field, value } => {
                self.filter(field, FilterOp::GreaterOrEqual, value.clone())
            }
            Predicate::OrderBy { field, descending } => {
                self.order_by(field, Direction::from_descending(*descending))
            }
            Predicate::Limit(count) => self.limit(*count),
            Predicate::LimitToLast(count) => self.limit_to_last(*count),
        }
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn filters(&self) -> &[Filter] {
        &self.filters
    }

    pub fn ordering(&self) -> Option<&OrderBy> {
        self.order_by.as_ref()
    }

    pub fn limit_clause(&self) -> Option<Limit> {
        self.limit
    }

    pub fn cursor(&self) -> Option<&Cursor> {
        self.start_after.as_ref()
    }
}

/// Translate an ordered predicate list into one query against `base_path`.
///
/// Pure: builds a descriptor only. Predicates the store cannot execute fail
/// when the query runs.
pub fn compile(base_path: &str, predicates: &[Predicate]) -> Query {
    predicates
        .iter()
        .fold(Query::new(base_path), |query, predicate| query.apply(predicate))
}
