use crate::codec::{from_storage, lookup, to_storage, to_storage_value, StoredFields, StoredValue};
use crate::collection::Document;
use crate::errors::CinderResult;
use crate::path::ParsedPath;
use crate::query::predicate::{invalid_query, CompiledPredicate};
use crate::query::query_options::Bound;
use crate::query::{Cursor, OrderBy, QueryOptions};
use crate::store::Backend;
use std::cmp::Ordering;

/// Evaluates [QueryOptions] over the documents of one collection.
///
/// Execution order is fixed: filter, sort, apply cursors, then limit. The
/// limit is never applied before the cursor window is established.
///
/// Documents lacking any ordering field are excluded from ordered results.
#[derive(Clone)]
pub struct QueryEngine {
    backend: Backend,
}

impl QueryEngine {
    pub fn new(backend: Backend) -> Self {
        QueryEngine { backend }
    }

    /// Runs the query and decodes the matching documents.
    pub fn execute(&self, collection: &ParsedPath, options: &QueryOptions) -> CinderResult<Vec<Document>> {
        self.select(collection, options)?
            .into_iter()
            .map(|(id, fields)| from_storage(&fields, &id))
            .collect()
    }

    /// Number of documents the query would return.
    pub fn count(&self, collection: &ParsedPath, options: &QueryOptions) -> CinderResult<usize> {
        Ok(self.select(collection, options)?.len())
    }

    fn select(
        &self,
        collection: &ParsedPath,
        options: &QueryOptions,
    ) -> CinderResult<Vec<(String, StoredFields)>> {
        let plan = QueryPlan::compile(options)?;
        let scanned = self.backend.scan(collection.as_str())?;
        let total = scanned.len();
        let results = plan.run(scanned);
        log::debug!(
            "Query on {} matched {} of {} documents",
            collection,
            results.len(),
            total
        );
        Ok(results)
    }
}

struct CompiledCursor {
    values: Vec<StoredValue>,
    document_id: Option<String>,
    bound: Bound,
}

struct QueryPlan {
    predicates: Vec<CompiledPredicate>,
    orderings: Vec<OrderBy>,
    start: Option<CompiledCursor>,
    end: Option<CompiledCursor>,
    limit: Option<usize>,
}

impl QueryPlan {
    fn compile(options: &QueryOptions) -> CinderResult<QueryPlan> {
        let predicates = options
            .predicates
            .iter()
            .map(|predicate| predicate.compile())
            .collect::<CinderResult<Vec<_>>>()?;

        if options.orderings.iter().any(|ordering| ordering.field.is_empty()) {
            return Err(invalid_query("Ordering clauses need a non-empty field"));
        }
        if options.has_cursor() && options.orderings.is_empty() {
            return Err(invalid_query(
                "Cursor pagination needs at least one ordering clause",
            ));
        }

        let cursor_for = |entry: &Option<(Cursor, Bound)>| -> CinderResult<Option<CompiledCursor>> {
            match entry {
                Some((cursor, bound)) => Ok(Some(compile_cursor(cursor, *bound, &options.orderings)?)),
                None => Ok(None),
            }
        };

        Ok(QueryPlan {
            predicates,
            orderings: options.orderings.clone(),
            start: cursor_for(&options.start)?,
            end: cursor_for(&options.end)?,
            limit: options.limit,
        })
    }

    fn run(&self, scanned: Vec<(String, StoredFields)>) -> Vec<(String, StoredFields)> {
        let mut results: Vec<(String, StoredFields)> = scanned
            .into_iter()
            .filter(|(_, fields)| self.predicates.iter().all(|p| p.matches(fields)))
            .filter(|(_, fields)| {
                self.orderings
                    .iter()
                    .all(|ordering| lookup(fields, &ordering.field).is_some())
            })
            .collect();

        results.sort_by(|(a_id, a), (b_id, b)| self.compare(a_id, a, b_id, b));

        results.retain(|(id, fields)| {
            let after_start = match &self.start {
                Some(cursor) => match self.position(cursor, id, fields) {
                    Ordering::Greater => true,
                    Ordering::Equal => cursor.bound == Bound::Inclusive,
                    Ordering::Less => false,
                },
                None => true,
            };
            let before_end = match &self.end {
                Some(cursor) => match self.position(cursor, id, fields) {
                    Ordering::Less => true,
                    Ordering::Equal => cursor.bound == Bound::Inclusive,
                    Ordering::Greater => false,
                },
                None => true,
            };
            after_start && before_end
        });

        if let Some(limit) = self.limit {
            results.truncate(limit);
        }
        results
    }

    fn compare(&self, a_id: &str, a: &StoredFields, b_id: &str, b: &StoredFields) -> Ordering {
        for ordering in &self.orderings {
            let result = ordering
                .order
                .apply(lookup(a, &ordering.field).cmp(&lookup(b, &ordering.field)));
            if result != Ordering::Equal {
                return result;
            }
        }
        a_id.cmp(b_id)
    }

    /// Where a document sits relative to a cursor in result order.
    fn position(&self, cursor: &CompiledCursor, id: &str, fields: &StoredFields) -> Ordering {
        for (ordering, value) in self.orderings.iter().zip(cursor.values.iter()) {
            let result = ordering
                .order
                .apply(lookup(fields, &ordering.field).cmp(&Some(value)));
            if result != Ordering::Equal {
                return result;
            }
        }
        match &cursor.document_id {
            Some(cursor_id) => id.cmp(cursor_id.as_str()),
            None => Ordering::Equal,
        }
    }
}

fn compile_cursor(cursor: &Cursor, bound: Bound, orderings: &[OrderBy]) -> CinderResult<CompiledCursor> {
    match cursor {
        Cursor::Values(values) => {
            if values.is_empty() {
                return Err(invalid_query("Cursors need at least one value"));
            }
            if values.len() > orderings.len() {
                return Err(invalid_query(&format!(
                    "Cursor has {} values but the query has only {} ordering clauses",
                    values.len(),
                    orderings.len()
                )));
            }
            let values = values
                .iter()
                .map(|value| match to_storage_value(value) {
                    Ok(Some(stored)) => Ok(stored),
                    _ => Err(invalid_query(&format!("Cursor value {} cannot be compared", value))),
                })
                .collect::<CinderResult<Vec<_>>>()?;
            Ok(CompiledCursor {
                values,
                document_id: None,
                bound,
            })
        }
        Cursor::Document(document) => {
            let Some(id) = document.id() else {
                return Err(invalid_query(
                    "Document cursors need a document read from the store",
                ));
            };
            let fields = to_storage(Some(document))
                .map_err(|_| invalid_query("Cursor document cannot be compared"))?;
            let values = orderings
                .iter()
                .map(|ordering| {
                    lookup(&fields, &ordering.field).cloned().ok_or_else(|| {
                        invalid_query(&format!(
                            "Cursor document {} has no value for ordering field '{}'",
                            id, ordering.field
                        ))
                    })
                })
                .collect::<CinderResult<Vec<_>>>()?;
            Ok(CompiledCursor {
                values,
                document_id: Some(id.to_string()),
                bound,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::SortOrder;
    use crate::doc;
    use crate::errors::ErrorKind;
    use crate::path::validate_collection_path;
    use crate::query::field;
    use crate::store::{DocumentKey, MemoryBackend, Mutation};

    fn engine_with(documents: Vec<(&str, Document)>) -> (QueryEngine, ParsedPath) {
        let backend = Backend::new(MemoryBackend::new());
        let mutations: Vec<Mutation> = documents
            .into_iter()
            .map(|(id, document)| Mutation::Put {
                key: DocumentKey::new("items", id),
                fields: to_storage(Some(&document)).unwrap(),
            })
            .collect();
        backend.apply(&mutations).unwrap();
        (QueryEngine::new(backend), validate_collection_path("items").unwrap())
    }

    fn values(results: &[Document]) -> Vec<i64> {
        results.iter().map(|d| d.get_as::<i64>("value").unwrap()).collect()
    }

    fn ids(results: &[Document]) -> Vec<&str> {
        results.iter().filter_map(|d| d.id()).collect()
    }

    fn three_values() -> (QueryEngine, ParsedPath) {
        engine_with(vec![
            ("a", doc! { value: 10 }),
            ("b", doc! { value: 20 }),
            ("c", doc! { value: 30 }),
        ])
    }

    #[test]
    fn test_limit_is_applied_after_ordering() {
        let (engine, path) = three_values();
        let options = QueryOptions::new()
            .filter(field("value").gt(15))
            .order_by("value", SortOrder::Descending);

        let one = engine.execute(&path, &options.clone().limit(1)).unwrap();
        assert_eq!(values(&one), vec![30]);

        let two = engine.execute(&path, &options.limit(2)).unwrap();
        assert_eq!(values(&two), vec![30, 20]);
    }

    #[test]
    fn test_ties_break_on_id() {
        let (engine, path) = engine_with(vec![
            ("z", doc! { value: 1 }),
            ("m", doc! { value: 1 }),
            ("a", doc! { value: 1 }),
        ]);
        let results = engine
            .execute(&path, &QueryOptions::new().order_by("value", SortOrder::Descending))
            .unwrap();
        assert_eq!(ids(&results), vec!["a", "m", "z"]);
    }

    #[test]
    fn test_multiple_orderings_in_priority() {
        let (engine, path) = engine_with(vec![
            ("a", doc! { group: 1, value: 5 }),
            ("b", doc! { group: 2, value: 9 }),
            ("c", doc! { group: 1, value: 7 }),
        ]);
        let options = QueryOptions::new()
            .order_by("group", SortOrder::Ascending)
            .order_by("value", SortOrder::Descending);
        let results = engine.execute(&path, &options).unwrap();
        assert_eq!(ids(&results), vec!["c", "a", "b"]);
    }

    #[test]
    fn test_value_cursors() {
        let (engine, path) = three_values();
        let ascending = QueryOptions::new().order_by("value", SortOrder::Ascending);

        let after = engine
            .execute(&path, &ascending.clone().start_after(Cursor::value(10)))
            .unwrap();
        assert_eq!(values(&after), vec![20, 30]);

        let at = engine
            .execute(&path, &ascending.clone().start_at(Cursor::value(20)))
            .unwrap();
        assert_eq!(values(&at), vec![20, 30]);

        let before = engine
            .execute(&path, &ascending.clone().end_before(Cursor::value(30)))
            .unwrap();
        assert_eq!(values(&before), vec![10, 20]);

        let window = engine
            .execute(
                &path,
                &ascending.start_after(Cursor::value(10)).end_at(Cursor::value(30)).limit(1),
            )
            .unwrap();
        assert_eq!(values(&window), vec![20]);
    }

    #[test]
    fn test_cursor_follows_descending_order() {
        let (engine, path) = three_values();
        let options = QueryOptions::new()
            .order_by("value", SortOrder::Descending)
            .start_after(Cursor::value(30));
        assert_eq!(values(&engine.execute(&path, &options).unwrap()), vec![20, 10]);
    }

    #[test]
    fn test_document_cursor_pages_through_duplicates() {
        let (engine, path) = engine_with(vec![
            ("a", doc! { value: 1 }),
            ("b", doc! { value: 1 }),
            ("c", doc! { value: 1 }),
            ("d", doc! { value: 2 }),
        ]);
        let base = QueryOptions::new().order_by("value", SortOrder::Ascending).limit(2);

        let first = engine.execute(&path, &base).unwrap();
        assert_eq!(ids(&first), vec!["a", "b"]);

        let second = engine
            .execute(&path, &base.clone().start_after(Cursor::document(&first[1])))
            .unwrap();
        assert_eq!(ids(&second), vec!["c", "d"]);
    }

    #[test]
    fn test_cursor_without_ordering_is_rejected() {
        let (engine, path) = three_values();
        let err = engine
            .execute(&path, &QueryOptions::new().start_after(Cursor::value(10)))
            .unwrap_err();
        assert_eq!(err.kind(), &ErrorKind::InvalidQuery);
    }

    #[test]
    fn test_cursor_with_too_many_values_is_rejected() {
        let (engine, path) = three_values();
        let options = QueryOptions::new()
            .order_by("value", SortOrder::Ascending)
            .start_at(Cursor::values(vec![1.into(), 2.into()]));
        assert_eq!(
            engine.execute(&path, &options).unwrap_err().kind(),
            &ErrorKind::InvalidQuery
        );
    }

    #[test]
    fn test_document_cursor_needs_an_id() {
        let (engine, path) = three_values();
        let options = QueryOptions::new()
            .order_by("value", SortOrder::Ascending)
            .start_after(Cursor::document(&doc! { value: 10 }));
        assert_eq!(
            engine.execute(&path, &options).unwrap_err().kind(),
            &ErrorKind::InvalidQuery
        );
    }

    #[test]
    fn test_documents_missing_order_field_are_excluded() {
        let (engine, path) = engine_with(vec![
            ("a", doc! { value: 1 }),
            ("b", doc! { other: 1 }),
        ]);
        let ordered = engine
            .execute(&path, &QueryOptions::new().order_by("value", SortOrder::Ascending))
            .unwrap();
        assert_eq!(ids(&ordered), vec!["a"]);
        assert_eq!(engine.count(&path, &QueryOptions::new()).unwrap(), 2);
    }

    #[test]
    fn test_empty_collection() {
        let (engine, _) = three_values();
        let empty = validate_collection_path("nothing").unwrap();
        assert!(engine.execute(&empty, &QueryOptions::new()).unwrap().is_empty());
    }
}
