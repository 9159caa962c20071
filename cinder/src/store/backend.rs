use crate::codec::StoredFields;
use crate::errors::CinderResult;
use std::fmt::{Display, Formatter};
use std::ops::Deref;
use std::sync::Arc;

/// Identity of one stored document: its collection path and its ID.
///
/// Keys order by collection first, so all documents of one collection are
/// contiguous in an ordered backend.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize)]
pub struct DocumentKey {
    pub collection: String,
    pub id: String,
}

impl DocumentKey {
    pub fn new(collection: &str, id: &str) -> Self {
        DocumentKey {
            collection: collection.to_string(),
            id: id.to_string(),
        }
    }
}

impl Display for DocumentKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.collection, self.id)
    }
}

/// One change to apply to a backend.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub enum Mutation {
    /// Stores `fields` as the full content of the document.
    Put { key: DocumentKey, fields: StoredFields },
    /// Removes the document. Removing a missing document is not an error.
    Delete { key: DocumentKey },
}

impl Mutation {
    pub fn key(&self) -> &DocumentKey {
        match self {
            Mutation::Put { key, .. } => key,
            Mutation::Delete { key } => key,
        }
    }
}

/// Storage contract the document store writes through.
///
/// # Atomicity
/// [`BackendProvider::apply`] must make a whole mutation list visible at once:
/// a concurrent `get` or `scan` observes either none or all of it, and a
/// failed `apply` leaves nothing applied.
///
/// # Implementations
/// - `MemoryBackend`: volatile, concurrent skip list
/// - `JournalBackend`: `MemoryBackend` state made durable by an append-only
///   journal file
pub trait BackendProvider: Send + Sync {
    /// Reads one document's stored fields.
    fn get(&self, key: &DocumentKey) -> CinderResult<Option<StoredFields>>;

    /// Reads every document directly inside `collection`, ordered by ID.
    /// Documents of subcollections are not included.
    fn scan(&self, collection: &str) -> CinderResult<Vec<(String, StoredFields)>>;

    /// Applies a list of mutations atomically, in order.
    fn apply(&self, mutations: &[Mutation]) -> CinderResult<()>;

    /// Reclaims space held by superseded state. A no-op for volatile backends.
    fn compact(&self) -> CinderResult<()> {
        Ok(())
    }

    /// Releases the backend's resources. Later calls fail with `StoreClosed`.
    fn close(&self) -> CinderResult<()>;

    fn is_closed(&self) -> bool;
}

/// Shared handle to a [BackendProvider].
#[derive(Clone)]
pub struct Backend {
    inner: Arc<dyn BackendProvider>,
}

impl Backend {
    pub fn new<T: BackendProvider + 'static>(inner: T) -> Self {
        Backend {
            inner: Arc::new(inner),
        }
    }
}

impl Deref for Backend {
    type Target = Arc<dyn BackendProvider>;

    fn deref(&self) -> &Self::Target {
        &self.inner
    }
}

impl Default for Backend {
    fn default() -> Self {
        Backend::new(crate::store::MemoryBackend::new())
    }
}
