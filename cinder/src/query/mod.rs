//! Structured queries: predicates, ordering, cursors and limits.

mod fluent;
mod predicate;
mod query_engine;
mod query_options;

pub use fluent::*;
pub use predicate::{Operator, QueryPredicate};
pub use query_engine::*;
pub use query_options::{limit_to, order_by, where_, Cursor, OrderBy, QueryOptions};
