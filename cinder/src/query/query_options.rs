use crate::collection::Document;
use crate::common::{SortOrder, Value};
use crate::query::QueryPredicate;

/// One ordering clause of a query.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderBy {
    pub field: String,
    pub order: SortOrder,
}

/// A position in an ordered result set.
///
/// `Values` are compared against the query's ordering fields, first value
/// against the first ordering and so on; fewer values than orderings compare
/// as a prefix. `Document` takes the ordering-field values from a document
/// previously returned by the store and additionally breaks ties on its ID,
/// so paging by documents never skips or repeats equal-valued entries.
#[derive(Debug, Clone, PartialEq)]
pub enum Cursor {
    Values(Vec<Value>),
    Document(Document),
}

impl Cursor {
    pub fn values(values: Vec<Value>) -> Self {
        Cursor::Values(values)
    }

    /// A cursor on a single ordering value.
    pub fn value<T: Into<Value>>(value: T) -> Self {
        Cursor::Values(vec![value.into()])
    }

    pub fn document(document: &Document) -> Self {
        Cursor::Document(document.clone())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Bound {
    Inclusive,
    Exclusive,
}

/// Filters, ordering, cursors and limit for a collection query.
///
/// Predicates are conjunctive. Results are sorted by the ordering clauses in
/// priority order with ties broken by document ID, then windowed by the
/// cursors, and finally truncated to the limit.
///
/// ```rust
/// use cinder::common::SortOrder;
/// use cinder::query::{field, Cursor, QueryOptions};
///
/// let options = QueryOptions::new()
///     .filter(field("value").gt(15))
///     .order_by("value", SortOrder::Descending)
///     .start_after(Cursor::value(40))
///     .limit(2);
/// assert_eq!(options.get_limit(), Some(2));
/// ```
#[derive(Debug, Clone, Default)]
pub struct QueryOptions {
    pub(crate) predicates: Vec<QueryPredicate>,
    pub(crate) orderings: Vec<OrderBy>,
    pub(crate) limit: Option<usize>,
    pub(crate) start: Option<(Cursor, Bound)>,
    pub(crate) end: Option<(Cursor, Bound)>,
}

/// Creates `QueryOptions` holding one predicate.
pub fn where_(predicate: QueryPredicate) -> QueryOptions {
    QueryOptions::new().filter(predicate)
}

/// Creates `QueryOptions` ordered by one field.
pub fn order_by(field_name: &str, order: SortOrder) -> QueryOptions {
    QueryOptions::new().order_by(field_name, order)
}

/// Creates `QueryOptions` with only a limit.
pub fn limit_to(limit: usize) -> QueryOptions {
    QueryOptions::new().limit(limit)
}

impl QueryOptions {
    pub fn new() -> Self {
        QueryOptions::default()
    }

    /// Adds a predicate; every predicate must match.
    pub fn filter(mut self, predicate: QueryPredicate) -> Self {
        self.predicates.push(predicate);
        self
    }

    /// Adds an ordering clause with lower priority than the existing ones.
    pub fn order_by(mut self, field_name: &str, order: SortOrder) -> Self {
        self.orderings.push(OrderBy {
            field: field_name.to_string(),
            order,
        });
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn start_at(mut self, cursor: Cursor) -> Self {
        self.start = Some((cursor, Bound::Inclusive));
        self
    }

    pub fn start_after(mut self, cursor: Cursor) -> Self {
        self.start = Some((cursor, Bound::Exclusive));
        self
    }

    pub fn end_at(mut self, cursor: Cursor) -> Self {
        self.end = Some((cursor, Bound::Inclusive));
        self
    }

    pub fn end_before(mut self, cursor: Cursor) -> Self {
        self.end = Some((cursor, Bound::Exclusive));
        self
    }

    pub fn predicates(&self) -> &[QueryPredicate] {
        &self.predicates
    }

    pub fn orderings(&self) -> &[OrderBy] {
        &self.orderings
    }

    pub fn get_limit(&self) -> Option<usize> {
        self.limit
    }

    pub fn has_cursor(&self) -> bool {
        self.start.is_some() || self.end.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::field;

    #[test]
    fn test_builder_accumulates() {
        let options = QueryOptions::new()
            .filter(field("a").eq(1))
            .filter(field("b").gt(2))
            .order_by("a", SortOrder::Ascending)
            .order_by("b", SortOrder::Descending)
            .limit(5);
        assert_eq!(options.predicates().len(), 2);
        assert_eq!(options.orderings()[1].field, "b");
        assert_eq!(options.orderings()[1].order, SortOrder::Descending);
        assert_eq!(options.get_limit(), Some(5));
        assert!(!options.has_cursor());
    }

    #[test]
    fn test_cursors_replace_previous_bound() {
        let options = order_by("a", SortOrder::Ascending)
            .start_at(Cursor::value(1))
            .start_after(Cursor::value(2));
        assert_eq!(options.start, Some((Cursor::value(2), Bound::Exclusive)));
        assert!(options.has_cursor());
    }

    #[test]
    fn test_shorthand_constructors() {
        assert_eq!(where_(field("a").eq(1)).predicates().len(), 1);
        assert_eq!(limit_to(3).get_limit(), Some(3));
    }
}
