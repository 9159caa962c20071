use crate::cinder_builder::CinderBuilder;
use crate::cinder_config::CinderConfig;
use crate::codec::Convertible;
use crate::collection::{Document, DocumentStore, TypedCollection, WriteBatch};
use crate::errors::CinderResult;
use crate::feed::{ChangeListener, ChangeStream, Subscription};
use crate::governor::{OperationClass, RateGovernor};
use crate::query::QueryOptions;
use crate::store::Backend;
use std::sync::Arc;

/// An open document store.
///
/// `Cinder` is a cheap, cloneable handle; clones share the same documents,
/// rate windows and subscriptions. Separate stores opened from separate
/// builders share nothing.
///
/// Paths alternate collection and document segments: `users` is a
/// collection, `users/alice` a document in it and `users/alice/posts` a
/// subcollection of that document.
///
/// ```rust
/// use cinder::common::SortOrder;
/// use cinder::query::{field, QueryOptions};
/// use cinder::{doc, Cinder};
///
/// let db = Cinder::builder().open().unwrap();
/// db.set("scores/a", doc! { value: 10 }, false).unwrap();
/// db.set("scores/b", doc! { value: 20 }, false).unwrap();
/// db.set("scores/c", doc! { value: 30 }, false).unwrap();
///
/// let top = db
///     .query(
///         "scores",
///         &QueryOptions::new()
///             .filter(field("value").gt(15))
///             .order_by("value", SortOrder::Descending)
///             .limit(1),
///     )
///     .unwrap();
/// assert_eq!(top[0].id(), Some("c"));
/// db.close().unwrap();
/// ```
#[derive(Clone)]
pub struct Cinder {
    inner: Arc<CinderInner>,
}

struct CinderInner {
    config: CinderConfig,
    store: DocumentStore,
}

impl Cinder {
    pub fn builder() -> CinderBuilder {
        CinderBuilder::new()
    }

    pub(crate) fn open(config: CinderConfig) -> CinderResult<Cinder> {
        let backend: Backend = config.open_backend()?;
        let governor = RateGovernor::new(config.rate_limits(), config.clock());
        let store = DocumentStore::new(backend, governor, config.auto_id_length());
        Ok(Cinder {
            inner: Arc::new(CinderInner { config, store }),
        })
    }

    pub fn config(&self) -> &CinderConfig {
        &self.inner.config
    }

    /// Reads the document at `path`, or `None` if there is none.
    pub fn get(&self, path: &str) -> CinderResult<Option<Document>> {
        self.inner.store.get(path)
    }

    pub fn exists(&self, path: &str) -> CinderResult<bool> {
        self.inner.store.exists(path)
    }

    /// Adds a document with a generated ID to `collection` and returns the ID.
    pub fn add(&self, collection: &str, data: Document) -> CinderResult<String> {
        self.inner.store.add(collection, data)
    }

    /// Shallow-merges `patch` into the existing document at `path`.
    pub fn update(&self, path: &str, patch: Document) -> CinderResult<()> {
        self.inner.store.update(path, patch)
    }

    /// Writes `data` to `path`, replacing the document or, with `merge`,
    /// shallow-merging into it.
    pub fn set(&self, path: &str, data: Document, merge: bool) -> CinderResult<()> {
        self.inner.store.set(path, data, merge)
    }

    pub fn delete(&self, path: &str) -> CinderResult<()> {
        self.inner.store.delete(path)
    }

    pub fn list(&self, collection: &str) -> CinderResult<Vec<Document>> {
        self.inner.store.list(collection)
    }

    pub fn query(&self, collection: &str, options: &QueryOptions) -> CinderResult<Vec<Document>> {
        self.inner.store.query(collection, options)
    }

    pub fn count(&self, collection: &str, options: &QueryOptions) -> CinderResult<usize> {
        self.inner.store.count(collection, options)
    }

    pub fn subscribe_document(&self, path: &str, listener: ChangeListener) -> CinderResult<Subscription> {
        self.inner.store.subscribe_document(path, listener)
    }

    pub fn subscribe_collection(&self, collection: &str, listener: ChangeListener) -> CinderResult<Subscription> {
        self.inner.store.subscribe_collection(collection, listener)
    }

    pub fn watch_document(&self, path: &str) -> CinderResult<ChangeStream> {
        self.inner.store.watch_document(path)
    }

    pub fn watch_collection(&self, collection: &str) -> CinderResult<ChangeStream> {
        self.inner.store.watch_collection(collection)
    }

    pub fn batch(&self) -> WriteBatch {
        WriteBatch::new(self.inner.store.clone())
    }

    /// A view of `collection` whose documents decode into `T`.
    pub fn collection<T: Convertible>(&self, collection: &str) -> CinderResult<TypedCollection<T>> {
        self.inner.store.check_opened()?;
        TypedCollection::new(self.inner.store.clone(), collection)
    }

    /// Requests of `class` currently counted in the rate window for `path`.
    pub fn rate_usage(&self, class: OperationClass, path: Option<&str>) -> usize {
        self.inner.store.governor().usage(class, path)
    }

    /// Compacts the backend's persistent state, if it has any.
    pub fn compact(&self) -> CinderResult<()> {
        self.inner.store.check_opened()?;
        self.inner.store.backend().compact()
    }

    /// Cancels all subscriptions and closes the backend. Later operations
    /// fail with `StoreClosed`. Closing twice is a no-op.
    pub fn close(&self) -> CinderResult<()> {
        self.inner.store.close()?;
        log::info!("Store closed");
        Ok(())
    }

    pub fn is_closed(&self) -> bool {
        self.inner.store.is_closed()
    }
}
