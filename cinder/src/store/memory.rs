use crate::codec::StoredFields;
use crate::errors::{CinderError, CinderResult, ErrorKind};
use crate::store::{BackendProvider, DocumentKey, Mutation};
use crossbeam_skiplist::SkipMap;
use parking_lot::RwLock;
use std::ops::Bound::{Included, Unbounded};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Volatile backend built on a concurrent skip list.
///
/// Reads share a read lock and `apply` takes the write lock, so a mutation
/// list becomes visible all at once. Clones share the same data.
#[derive(Clone, Default)]
pub struct MemoryBackend {
    inner: Arc<MemoryBackendInner>,
}

#[derive(Default)]
struct MemoryBackendInner {
    entries: SkipMap<DocumentKey, StoredFields>,
    visibility: RwLock<()>,
    closed: AtomicBool,
}

impl MemoryBackend {
    pub fn new() -> Self {
        MemoryBackend::default()
    }

    /// Number of stored documents across all collections.
    pub fn len(&self) -> usize {
        self.inner.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.entries.is_empty()
    }

    /// A consistent copy of every stored document, in key order.
    pub(crate) fn snapshot(&self) -> Vec<(DocumentKey, StoredFields)> {
        let _guard = self.inner.visibility.read();
        self.inner
            .entries
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().clone()))
            .collect()
    }

    /// Applies mutations without the closed check; used while replaying.
    pub(crate) fn apply_unchecked(&self, mutations: &[Mutation]) {
        let _guard = self.inner.visibility.write();
        for mutation in mutations {
            match mutation {
                Mutation::Put { key, fields } => {
                    self.inner.entries.insert(key.clone(), fields.clone());
                }
                Mutation::Delete { key } => {
                    self.inner.entries.remove(key);
                }
            }
        }
    }

    fn check_opened(&self) -> CinderResult<()> {
        if self.inner.closed.load(Ordering::Acquire) {
            log::error!("Memory backend is closed");
            return Err(CinderError::new("Backend is closed", ErrorKind::StoreClosed));
        }
        Ok(())
    }
}

impl BackendProvider for MemoryBackend {
    fn get(&self, key: &DocumentKey) -> CinderResult<Option<StoredFields>> {
        self.check_opened()?;
        let _guard = self.inner.visibility.read();
        Ok(self.inner.entries.get(key).map(|entry| entry.value().clone()))
    }

    fn scan(&self, collection: &str) -> CinderResult<Vec<(String, StoredFields)>> {
        self.check_opened()?;
        let _guard = self.inner.visibility.read();
        let start = DocumentKey::new(collection, "");
        Ok(self
            .inner
            .entries
            .range((Included(start), Unbounded))
            .take_while(|entry| entry.key().collection == collection)
            .map(|entry| (entry.key().id.clone(), entry.value().clone()))
            .collect())
    }

    fn apply(&self, mutations: &[Mutation]) -> CinderResult<()> {
        self.check_opened()?;
        self.apply_unchecked(mutations);
        Ok(())
    }

    fn close(&self) -> CinderResult<()> {
        self.inner.closed.store(true, Ordering::Release);
        Ok(())
    }

    fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::Acquire)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::StoredValue;

    fn fields(value: i64) -> StoredFields {
        let mut fields = StoredFields::new();
        fields.insert("value".to_string(), StoredValue::Integer(value));
        fields
    }

    fn put(collection: &str, id: &str, value: i64) -> Mutation {
        Mutation::Put {
            key: DocumentKey::new(collection, id),
            fields: fields(value),
        }
    }

    #[test]
    fn test_put_get_delete() {
        let backend = MemoryBackend::new();
        backend.apply(&[put("users", "u1", 1)]).unwrap();
        assert_eq!(backend.get(&DocumentKey::new("users", "u1")).unwrap(), Some(fields(1)));

        backend
            .apply(&[Mutation::Delete {
                key: DocumentKey::new("users", "u1"),
            }])
            .unwrap();
        assert_eq!(backend.get(&DocumentKey::new("users", "u1")).unwrap(), None);
    }

    #[test]
    fn test_scan_excludes_other_collections() {
        let backend = MemoryBackend::new();
        backend
            .apply(&[
                put("users", "b", 2),
                put("users", "a", 1),
                put("users/a/items", "i1", 3),
                put("usersx", "z", 4),
                put("orders", "o1", 5),
            ])
            .unwrap();

        let ids: Vec<String> = backend.scan("users").unwrap().into_iter().map(|(id, _)| id).collect();
        assert_eq!(ids, vec!["a".to_string(), "b".to_string()]);
        assert_eq!(backend.scan("users/a/items").unwrap().len(), 1);
        assert!(backend.scan("missing").unwrap().is_empty());
    }

    #[test]
    fn test_later_mutations_in_a_list_win() {
        let backend = MemoryBackend::new();
        backend.apply(&[put("c", "d", 1), put("c", "d", 2)]).unwrap();
        assert_eq!(backend.get(&DocumentKey::new("c", "d")).unwrap(), Some(fields(2)));
    }

    #[test]
    fn test_closed_backend_rejects_operations() {
        let backend = MemoryBackend::new();
        backend.close().unwrap();
        assert!(backend.is_closed());
        let err = backend.get(&DocumentKey::new("c", "d")).unwrap_err();
        assert_eq!(err.kind(), &ErrorKind::StoreClosed);
        assert!(backend.apply(&[put("c", "d", 1)]).is_err());
    }
}
