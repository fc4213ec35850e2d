//! In-process query evaluation over raw documents.
//!
//! Follows document-database semantics: range and equality filters only
//! match values of the same type class, documents missing an order field are
//! excluded, and ties are broken by document id in the order's direction.

use std::cmp::Ordering;

use serde_json::{Map, Number, Value};

use super::compile::{Direction, Filter, FilterOp, Limit, Query};
use crate::pagination::Cursor;
use crate::store::RawDocument;

/// Rank of a value's type in the cross-type ordering.
fn type_rank(value: &Value) -> u8 {
    match value {
        Value::Null => 0,
        Value::Bool(_) => 1,
        Value::Number(_) => 2,
        Value::String(_) => 3,
        Value::Array(_) => 4,
        Value::Object(_) => 5,
    }
}

/// Total order over JSON values: type class first, then value.
pub fn compare_values(a: &Value, b: &Value) -> Ordering {
    match (a, b) {
        (Value::Null, Value::Null) => Ordering::Equal,
        (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
        (Value::Number(x), Value::Number(y)) => compare_numbers(x, y),
        (Value::String(x), Value::String(y)) => x.cmp(y),
        (Value::Array(x), Value::Array(y)) => x
            .iter()
            .zip(y.iter())
            .map(|(l, r)| compare_values(l, r))
            .find(|o| o.is_ne())
            .unwrap_or_else(|| x.len().cmp(&y.len())),
        (Value::Object(x), Value::Object(y)) => {
            let mut left: Vec<_> = x.iter().collect();
            let mut right: Vec<_> = y.iter().collect();
            left.sort_by(|l, r| l.0.cmp(r.0));
            right.sort_by(|l, r| l.0.cmp(r.0));
            left.iter()
                .zip(right.iter())
                .map(|((lk, lv), (rk, rv))| lk.cmp(rk).then_with(|| compare_values(lv, rv)))
                .find(|o| o.is_ne())
                .unwrap_or_else(|| left.len().cmp(&right.len()))
        }
        _ => type_rank(a).cmp(&type_rank(b)),
    }
}

fn integer(n: &Number) -> Option<i128> {
    n.as_i64()
        .map(i128::from)
        .or_else(|| n.as_u64().map(i128::from))
}

/// Integers compare exactly; floats and mixed pairs go through `f64`.
fn compare_numbers(x: &Number, y: &Number) -> Ordering {
    if let (Some(a), Some(b)) = (integer(x), integer(y)) {
        return a.cmp(&b);
    }
    let a = x.as_f64().unwrap_or(f64::NAN);
    let b = y.as_f64().unwrap_or(f64::NAN);
    a.total_cmp(&b)
}

fn same_value(a: &Value, b: &Value) -> bool {
    type_rank(a) == type_rank(b) && compare_values(a, b).is_eq()
}

/// Resolve a dotted field path (`"address.city"`) inside a document.
pub fn lookup<'a>(data: &'a Map<String, Value>, field: &str) -> Option<&'a Value> {
    let mut segments = field.split('.');
    let mut current = data.get(segments.next()?)?;
    for segment in segments {
        current = current.as_object()?.get(segment)?;
    }
    Some(current)
}

fn candidates(value: &Value) -> &[Value] {
    match value {
        Value::Array(items) => items,
        _ => &[],
    }
}

impl Filter {
    /// Whether a document's data satisfies this filter.
    pub fn matches(&self, data: &Map<String, Value>) -> bool {
        let Some(actual) = lookup(data, &self.field) else {
            return false;
        };

        let ordered = |accept: fn(Ordering) -> bool| {
            type_rank(actual) == type_rank(&self.value)
                && accept(compare_values(actual, &self.value))
        };

        match self.op {
            FilterOp::Equal => same_value(actual, &self.value),
            FilterOp::In => candidates(&self.value).iter().any(|c| same_value(actual, c)),
            FilterOp::NotIn => {
                !actual.is_null() && !candidates(&self.value).iter().any(|c| same_value(actual, c))
            }
            FilterOp::ArrayContains => candidates(actual)
                .iter()
                .any(|item| same_value(item, &self.value)),
            FilterOp::ArrayContainsAny => candidates(actual)
                .iter()
                .any(|item| candidates(&self.value).iter().any(|c| same_value(item, c))),
            FilterOp::LessThan => ordered(Ordering::is_lt),
            FilterOp::GreaterThan => ordered(Ordering::is_gt),
            FilterOp::LessOrEqual => ordered(Ordering::is_le),
            FilterOp::GreaterOrEqual => ordered(Ordering::is_ge),
        }
    }
}

/// Position of a document in a query's ordering.
fn position<'a>(doc: &'a RawDocument, order_field: Option<&str>) -> (&'a Value, &'a str) {
    const NULL: &Value = &Value::Null;
    let value = order_field
        .and_then(|field| lookup(&doc.data, field))
        .unwrap_or(NULL);
    (value, doc.id.as_str())
}

fn compare_positions(a: (&Value, &str), b: (&Value, &str), direction: Direction) -> Ordering {
    let ordering = compare_values(a.0, b.0).then_with(|| a.1.cmp(b.1));
    match direction {
        Direction::Ascending => ordering,
        Direction::Descending => ordering.reverse(),
    }
}

fn after_cursor(
    doc: &RawDocument,
    cursor: &Cursor,
    order_field: Option<&str>,
    direction: Direction,
) -> bool {
    let cursor_position = (cursor.order_value(), cursor.document_id());
    compare_positions(position(doc, order_field), cursor_position, direction).is_gt()
}

/// Run `query` over a set of documents belonging to its path.
pub fn evaluate(
    query: &Query,
    documents: impl IntoIterator<Item = RawDocument>,
) -> Vec<RawDocument> {
    let order_field = query.ordering().map(|o| o.field.as_str());
    let direction = query.ordering().map(|o| o.direction).unwrap_or_default();

    let mut matched: Vec<RawDocument> = documents
        .into_iter()
        .filter(|doc| query.filters().iter().all(|f| f.matches(&doc.data)))
        .filter(|doc| order_field.map_or(true, |field| lookup(&doc.data, field).is_some()))
        .collect();

    matched.sort_by(|a, b| {
        compare_positions(position(a, order_field), position(b, order_field), direction)
    });

    if let Some(cursor) = query.cursor() {
        matched.retain(|doc| after_cursor(doc, cursor, order_field, direction));
    }

    match query.limit_clause() {
        Some(Limit::First(n)) => matched.truncate(n),
        Some(Limit::Last(n)) => {
            let skip = matched.len().saturating_sub(n);
            matched.drain(..skip);
        }
        None => {}
    }

    matched
}
