//! Query compiler - ordered predicates to composed queries.
//!
//! ```ignore
//! use doclist::query::{compile, Predicate};
//!
//! let query = compile(
//!     "tasks",
//!     &[
//!         Predicate::equals("owner", "u1"),
//!         Predicate::order_by("created_at", true),
//!         Predicate::limit(20),
//!     ],
//! );
//! ```

mod compile;
mod eval;
mod predicate;

pub use compile::{compile, Direction, Filter, FilterOp, Limit, OrderBy, Query};
pub use eval::{compare_values, evaluate, lookup};
pub use predicate::{Predicate, PredicateKind};
