use crate::codec::to_storage;
use crate::collection::document_store::PreparedWrite;
use crate::collection::{Document, DocumentStore};
use crate::errors::{CinderError, CinderResult, ErrorKind};
use crate::path::validate_document_path;

/// One write queued in a [WriteBatch].
#[derive(Debug, Clone, PartialEq)]
pub enum BatchOperation {
    Set {
        path: String,
        data: Document,
        merge: bool,
    },
    Update {
        path: String,
        data: Document,
    },
    Delete {
        path: String,
    },
}

impl BatchOperation {
    pub fn set(path: &str, data: Document, merge: bool) -> Self {
        BatchOperation::Set {
            path: path.to_string(),
            data,
            merge,
        }
    }

    pub fn update(path: &str, data: Document) -> Self {
        BatchOperation::Update {
            path: path.to_string(),
            data,
        }
    }

    pub fn delete(path: &str) -> Self {
        BatchOperation::Delete {
            path: path.to_string(),
        }
    }

    pub fn path(&self) -> &str {
        match self {
            BatchOperation::Set { path, .. } => path,
            BatchOperation::Update { path, .. } => path,
            BatchOperation::Delete { path } => path,
        }
    }

    fn prepare(self) -> CinderResult<PreparedWrite> {
        let path = validate_document_path(self.path())?;
        Ok(match self {
            BatchOperation::Set { data, merge, .. } => PreparedWrite::Set {
                path,
                fields: to_storage(Some(&data))?,
                merge,
            },
            BatchOperation::Update { data, .. } => PreparedWrite::Update {
                path,
                fields: to_storage(Some(&data))?,
            },
            BatchOperation::Delete { .. } => PreparedWrite::Delete { path },
        })
    }
}

/// A single-use group of writes applied atomically.
///
/// Paths and payloads are validated when an operation is added, so a bad
/// operation is reported immediately and never enters the batch. On commit,
/// either every operation takes effect or none does (for example when an
/// update targets a missing document). After the first commit attempt the
/// batch is spent: further `add` or `commit` calls fail with
/// [`ErrorKind::BatchSpent`].
///
/// Operations on the same path apply in the order they were added, and
/// subscribers see one notification per document carrying its final state.
///
/// ```rust
/// use cinder::{doc, Cinder};
///
/// let db = Cinder::builder().open().unwrap();
/// let mut batch = db.batch();
/// batch.set("users/a", doc! { n: 1 }, false).unwrap();
/// batch.set("users/b", doc! { n: 2 }, false).unwrap();
/// assert!(batch.set("users", doc! { n: 3 }, false).is_err());
/// batch.commit().unwrap();
///
/// assert_eq!(db.list("users").unwrap().len(), 2);
/// assert!(batch.commit().is_err());
/// ```
pub struct WriteBatch {
    store: DocumentStore,
    writes: Vec<PreparedWrite>,
    spent: bool,
}

impl std::fmt::Debug for WriteBatch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WriteBatch").finish_non_exhaustive()
    }
}

impl WriteBatch {
    pub(crate) fn new(store: DocumentStore) -> Self {
        WriteBatch {
            store,
            writes: Vec::new(),
            spent: false,
        }
    }

    /// Validates and queues an operation.
    pub fn add(&mut self, operation: BatchOperation) -> CinderResult<&mut Self> {
        self.check_unspent()?;
        let write = operation.prepare()?;
        self.writes.push(write);
        Ok(self)
    }

    pub fn set(&mut self, path: &str, data: Document, merge: bool) -> CinderResult<&mut Self> {
        self.add(BatchOperation::set(path, data, merge))
    }

    pub fn update(&mut self, path: &str, data: Document) -> CinderResult<&mut Self> {
        self.add(BatchOperation::update(path, data))
    }

    pub fn delete(&mut self, path: &str) -> CinderResult<&mut Self> {
        self.add(BatchOperation::delete(path))
    }

    pub fn len(&self) -> usize {
        self.writes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.writes.is_empty()
    }

    pub fn is_spent(&self) -> bool {
        self.spent
    }

    /// Applies every queued operation atomically and spends the batch.
    ///
    /// A commit rejected with [`ErrorKind::RateLimited`] or
    /// [`ErrorKind::StoreClosed`] leaves the batch untouched, so it can be
    /// retried after backoff. Any later failure spends it.
    pub fn commit(&mut self) -> CinderResult<()> {
        self.check_unspent()?;
        self.store.admit_writes(&self.writes)?;
        self.spent = true;
        let writes = std::mem::take(&mut self.writes);
        self.store.commit_writes(&writes)
    }

    fn check_unspent(&self) -> CinderResult<()> {
        if self.spent {
            log::error!("Attempt to reuse a committed batch");
            return Err(CinderError::new(
                "Batch has already been committed",
                ErrorKind::BatchSpent,
            ));
        }
        Ok(())
    }
}
