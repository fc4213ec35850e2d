//! Declarative filter/sort/limit clauses.

use serde_json::Value;

/// One declarative clause of a collection query.
///
/// Predicates are applied to the query in the order they are supplied.
#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    Equals { field: String, value: Value },
    In { field: String, values: Vec<Value> },
    NotIn { field: String, values: Vec<Value> },
    ArrayContains { field: String, value: Value },
    ArrayContainsAny { field: String, values: Vec<Value> },
    LessThan { field: String, value: Value },
    GreaterThan { field: String, value: Value },
    LessOrEqual { field: String, value: Value },
    GreaterOrEqual { field: String, value: Value },
    OrderBy { field: String, descending: bool },
    Limit(usize),
    LimitToLast(usize),
}

/// The kind of a [`Predicate`], without its field and operand.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PredicateKind {
    Equals,
    In,
    NotIn,
    ArrayContains,
    ArrayContainsAny,
    LessThan,
    GreaterThan,
    LessOrEqual,
    GreaterOrEqual,
    OrderBy,
    Limit,
    LimitToLast,
}

fn values<I, V>(values: I) -> Vec<Value>
where
    I: IntoIterator<Item = V>,
    V: Into<Value>,
{
    values.into_iter().map(Into::into).collect()
}

impl Predicate {
    pub fn equals(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Predicate::Equals {
            field: field.into(),
            value: value.into(),
        }
    }

    pub fn is_in<I, V>(field: impl Into<String>, candidates: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        Predicate::In {
            field: field.into(),
            values: values(candidates),
        }
    }

    pub fn not_in<I, V>(field: impl Into<String>, excluded: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        Predicate::NotIn {
            field: field.into(),
            values: values(excluded),
        }
    }

    pub fn array_contains(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Predicate::ArrayContains {
            field: field.into(),
            value: value.into(),
        }
    }

    pub fn array_contains_any<I, V>(field: impl Into<String>, candidates: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        Predicate::ArrayContainsAny {
            field: field.into(),
            values: values(candidates),
        }
    }

    pub fn less_than(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Predicate::LessThan {
            field: field.into(),
            value: value.into(),
        }
    }

    pub fn greater_than(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Predicate::GreaterThan {
            field: field.into(),
            value: value.into(),
        }
    }

    pub fn less_or_equal(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Predicate::LessOrEqual {
            field: field.into(),
            value: value.into(),
        }
    }

    pub fn greater_or_equal(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Predicate::GreaterOrEqual {
            field: field.into(),
            value: value.into(),
        }
    }

    pub fn order_by(field: impl Into<String>, descending: bool) -> Self {
        Predicate::OrderBy {
            field: field.into(),
            descending,
        }
    }

    pub fn limit(count: usize) -> Self {
        Predicate::Limit(count)
    }

    pub fn limit_to_last(count: usize) -> Self {
        Predicate::LimitToLast(count)
    }

    pub fn kind(&self) -> PredicateKind {
        match self {
            Predicate::Equals { .. } => PredicateKind::Equals,
            Predicate::In { .. } => PredicateKind::In,
            Predicate::NotIn { .. } => PredicateKind::NotIn,
            Predicate::ArrayContains { .. } => PredicateKind::ArrayContains,
            Predicate::ArrayContainsAny { .. } => PredicateKind::ArrayContainsAny,
            Predicate::LessThan { .. } => PredicateKind::LessThan,
            Predicate::GreaterThan { .. } => PredicateKind::GreaterThan,
            Predicate::LessOrEqual { .. } => PredicateKind::LessOrEqual,
            Predicate::GreaterOrEqual { .. } => PredicateKind::GreaterOrEqual,
            Predicate::OrderBy { .. } => PredicateKind::OrderBy,
            Predicate::Limit(_) => PredicateKind::Limit,
            Predicate::LimitToLast(_) => PredicateKind::LimitToLast,
        }
    }

    /// Field the clause applies to; `None` for limits.
    pub fn field(&self) -> Option<&str> {
        match self {
            Predicate::Equals { field, .. }
            | Predicate::In { field, .. }
            | Predicate::NotIn { field, .. }
            | Predicate::ArrayContains { field, .. }
            | Predicate::ArrayContainsAny { field, .. }
            | Predicate::LessThan { field, .. }
            | Predicate::GreaterThan { field, .. }
            | Predicate::LessOrEqual { field, .. }
            | Predicate::GreaterOrEqual { field, .. }
            | Predicate::OrderBy { field, .. } => Some(field),
            Predicate::Limit(_) | Predicate::LimitToLast(_) => None,
        }
    }

    /// True for clauses that shape ordering or result size rather than filter.
    pub fn is_structural(&self) -> bool {
        matches!(
            self.kind(),
            PredicateKind::OrderBy | PredicateKind::Limit | PredicateKind::LimitToLast
        )
    }
}
