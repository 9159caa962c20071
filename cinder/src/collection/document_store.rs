use crate::codec::{from_storage, to_storage, StoredFields};
use crate::collection::Document;
use crate::common::{auto_id, LockRegistry};
use crate::errors::{CinderError, CinderResult, ErrorKind};
use crate::feed::{ChangeEvent, ChangeFeed, ChangeListener, ChangeStream, Subscription, SubscriptionTarget};
use crate::governor::{OperationClass, RateGovernor};
use crate::path::{validate_collection_path, validate_document_path, ParsedPath};
use crate::query::{QueryEngine, QueryOptions};
use crate::store::{Backend, DocumentKey, Mutation};
use itertools::Itertools;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::channel;
use std::sync::Arc;

/// Document CRUD, listing, queries and subscriptions over one backend.
///
/// Every operation validates its path first and only then records the
/// request with the rate governor, so an invalid path never consumes quota.
///
/// Writes to one document path are serialized: each writer reads the state
/// committed by the previous one. Writes to distinct paths proceed in
/// parallel until their final, short commit step, which applies the backend
/// mutation and queues notifications under a single commit lock. That lock
/// fixes the order in which each subscriber sees changes.
#[derive(Clone)]
pub struct DocumentStore {
    inner: Arc<DocumentStoreInner>,
}

struct DocumentStoreInner {
    backend: Backend,
    governor: RateGovernor,
    feed: ChangeFeed,
    engine: QueryEngine,
    locks: LockRegistry,
    commit_lock: Mutex<()>,
    auto_id_length: usize,
    closed: AtomicBool,
}

/// A fully validated and encoded write, ready to be committed.
#[derive(Debug, Clone)]
pub(crate) enum PreparedWrite {
    Set {
        path: ParsedPath,
        fields: StoredFields,
        merge: bool,
    },
    Update {
        path: ParsedPath,
        fields: StoredFields,
    },
    Delete {
        path: ParsedPath,
    },
}

impl PreparedWrite {
    pub(crate) fn path(&self) -> &ParsedPath {
        match self {
            PreparedWrite::Set { path, .. } => path,
            PreparedWrite::Update { path, .. } => path,
            PreparedWrite::Delete { path } => path,
        }
    }

    /// The stored state after this write, given the state before it.
    fn apply_to(&self, current: Option<StoredFields>) -> CinderResult<Option<StoredFields>> {
        match self {
            PreparedWrite::Set {
                fields,
                merge: false,
                ..
            } => Ok(Some(fields.clone())),
            PreparedWrite::Set {
                fields,
                merge: true,
                ..
            } => Ok(Some(shallow_merge(current.unwrap_or_default(), fields))),
            PreparedWrite::Update { path, fields } => match current {
                Some(current) => Ok(Some(shallow_merge(current, fields))),
                None => {
                    log::error!("Cannot update missing document {}", path);
                    Err(CinderError::new(
                        &format!("No document to update at {}", path),
                        ErrorKind::NotFound,
                    ))
                }
            },
            PreparedWrite::Delete { .. } => Ok(None),
        }
    }
}

fn shallow_merge(mut current: StoredFields, patch: &StoredFields) -> StoredFields {
    for (key, value) in patch {
        current.insert(key.clone(), value.clone());
    }
    current
}

/// The collection holding a document followed by every ancestor collection:
/// `users/u1/items` yields `users/u1/items`, then `users`.
fn enclosing_collections(collection: &str) -> Vec<String> {
    let mut chain = Vec::new();
    let mut current = validate_collection_path(collection).ok();
    while let Some(path) = current {
        current = path.parent().and_then(|document| document.parent());
        chain.push(path.to_string());
    }
    chain
}

fn key_of(path: &ParsedPath) -> CinderResult<DocumentKey> {
    match path.parent() {
        Some(collection) => Ok(DocumentKey::new(collection.as_str(), path.id())),
        None => Err(CinderError::new(
            &format!("Document path {} has no collection", path),
            ErrorKind::InternalError,
        )),
    }
}

impl DocumentStore {
    pub fn new(backend: Backend, governor: RateGovernor, auto_id_length: usize) -> Self {
        DocumentStore {
            inner: Arc::new(DocumentStoreInner {
                engine: QueryEngine::new(backend.clone()),
                backend,
                governor,
                feed: ChangeFeed::new(),
                locks: LockRegistry::new(),
                commit_lock: Mutex::new(()),
                auto_id_length,
                closed: AtomicBool::new(false),
            }),
        }
    }

    /// Reads a document. A missing document is `Ok(None)`, not an error.
    pub fn get(&self, path: &str) -> CinderResult<Option<Document>> {
        self.inner.check_opened()?;
        let path = validate_document_path(path)?;
        self.inner
            .governor
            .record(OperationClass::DocumentRead, Some(path.as_str()))?;
        self.inner.read(&path)
    }

    pub fn exists(&self, path: &str) -> CinderResult<bool> {
        self.inner.check_opened()?;
        let path = validate_document_path(path)?;
        self.inner
            .governor
            .record(OperationClass::DocumentRead, Some(path.as_str()))?;
        Ok(self.inner.backend.get(&key_of(&path)?)?.is_some())
    }

    /// Stores `data` under a fresh store-assigned ID and returns the ID.
    pub fn add(&self, collection: &str, data: Document) -> CinderResult<String> {
        self.inner.check_opened()?;
        let collection = validate_collection_path(collection)?;
        self.inner.governor.record(OperationClass::General, None)?;
        let fields = to_storage(Some(&data))?;

        loop {
            let id = auto_id(self.inner.auto_id_length);
            let path = collection.child(&id)?;
            let lock = self.inner.locks.get_lock(path.as_str());
            let _guard = lock.lock();
            if self.inner.backend.get(&key_of(&path)?)?.is_some() {
                log::warn!("Generated ID {} already exists in {}, retrying", id, collection);
                continue;
            }
            self.inner.commit(vec![Mutation::Put {
                key: key_of(&path)?,
                fields,
            }])?;
            log::debug!("Added document {}", path);
            return Ok(id);
        }
    }

    /// Shallow-merges `patch` into an existing document.
    ///
    /// # Errors
    ///
    /// Fails with [`ErrorKind::NotFound`] if the document does not exist.
    pub fn update(&self, path: &str, patch: Document) -> CinderResult<()> {
        let write = self.prepare(path, |path, fields| PreparedWrite::Update { path, fields }, Some(patch))?;
        self.inner.write(write)
    }

    /// Replaces a document, or with `merge` shallow-merges into it. Both
    /// forms create the document if it does not exist.
    pub fn set(&self, path: &str, data: Document, merge: bool) -> CinderResult<()> {
        let write = self.prepare(
            path,
            |path, fields| PreparedWrite::Set { path, fields, merge },
            Some(data),
        )?;
        self.inner.write(write)
    }

    /// Deletes a document. Deleting a missing document is a no-op.
    pub fn delete(&self, path: &str) -> CinderResult<()> {
        let write = self.prepare(path, |path, _| PreparedWrite::Delete { path }, None)?;
        self.inner.write(write)
    }

    fn prepare<F>(&self, path: &str, build: F, data: Option<Document>) -> CinderResult<PreparedWrite>
    where
        F: FnOnce(ParsedPath, StoredFields) -> PreparedWrite,
    {
        self.inner.check_opened()?;
        let path = validate_document_path(path)?;
        self.inner.governor.record(OperationClass::General, None)?;
        let fields = to_storage(data.as_ref())?;
        Ok(build(path, fields))
    }

    /// Every document directly inside `collection`, ordered by ID.
    pub fn list(&self, collection: &str) -> CinderResult<Vec<Document>> {
        self.inner.check_opened()?;
        let collection = validate_collection_path(collection)?;
        self.inner
            .governor
            .record(OperationClass::CollectionScan, Some(collection.as_str()))?;
        self.inner.members(&collection)
    }

    pub fn query(&self, collection: &str, options: &QueryOptions) -> CinderResult<Vec<Document>> {
        self.inner.check_opened()?;
        let collection = validate_collection_path(collection)?;
        self.inner
            .governor
            .record(OperationClass::CollectionScan, Some(collection.as_str()))?;
        self.inner.engine.execute(&collection, options)
    }

    pub fn count(&self, collection: &str, options: &QueryOptions) -> CinderResult<usize> {
        self.inner.check_opened()?;
        let collection = validate_collection_path(collection)?;
        self.inner
            .governor
            .record(OperationClass::CollectionScan, Some(collection.as_str()))?;
        self.inner.engine.count(&collection, options)
    }

    /// Calls `listener` with the document's current state, then after every
    /// committed change to it.
    pub fn subscribe_document(&self, path: &str, listener: ChangeListener) -> CinderResult<Subscription> {
        self.inner.check_opened()?;
        let path = validate_document_path(path)?;
        self.inner
            .governor
            .record(OperationClass::Subscription, Some(path.as_str()))?;

        let _commit = self.inner.commit_lock.lock();
        let initial = ChangeEvent::Document {
            path: path.to_string(),
            document: self.inner.read(&path)?,
        };
        self.inner
            .feed
            .subscribe(SubscriptionTarget::Document(path.to_string()), listener, initial)
    }

    /// Calls `listener` with the collection's current members, then after
    /// every committed change to a document inside it or inside any of its
    /// subcollections.
    pub fn subscribe_collection(&self, collection: &str, listener: ChangeListener) -> CinderResult<Subscription> {
        self.inner.check_opened()?;
        let collection = validate_collection_path(collection)?;
        self.inner
            .governor
            .record(OperationClass::Subscription, Some(collection.as_str()))?;

        let _commit = self.inner.commit_lock.lock();
        let initial = ChangeEvent::Collection {
            path: collection.to_string(),
            documents: self.inner.members(&collection)?,
        };
        self.inner.feed.subscribe(
            SubscriptionTarget::Collection(collection.to_string()),
            listener,
            initial,
        )
    }

    pub fn watch_document(&self, path: &str) -> CinderResult<ChangeStream> {
        let (listener, receiver) = stream_listener();
        let subscription = self.subscribe_document(path, listener)?;
        Ok(ChangeStream::new(receiver, subscription))
    }

    pub fn watch_collection(&self, collection: &str) -> CinderResult<ChangeStream> {
        let (listener, receiver) = stream_listener();
        let subscription = self.subscribe_collection(collection, listener)?;
        Ok(ChangeStream::new(receiver, subscription))
    }

    /// Charges a batch commit against the general rate window. An empty
    /// batch costs nothing.
    pub(crate) fn admit_writes(&self, writes: &[PreparedWrite]) -> CinderResult<()> {
        self.inner.check_opened()?;
        if writes.is_empty() {
            return Ok(());
        }
        self.inner.governor.record(OperationClass::General, None)
    }

    /// Applies prepared writes atomically: either all become visible or none.
    /// The caller has already passed [`DocumentStore::admit_writes`].
    pub(crate) fn commit_writes(&self, writes: &[PreparedWrite]) -> CinderResult<()> {
        self.inner.check_opened()?;
        if writes.is_empty() {
            return Ok(());
        }

        let handles = self
            .inner
            .locks
            .get_locks(writes.iter().map(|write| write.path().as_str()));
        let _guards = handles.iter().map(|handle| handle.lock()).collect::<Vec<_>>();

        let mut states: HashMap<String, Option<StoredFields>> = HashMap::new();
        let mut order: Vec<(&ParsedPath, bool)> = Vec::new();
        for write in writes {
            let path = write.path();
            let current = match states.remove(path.as_str()) {
                Some(state) => state,
                None => {
                    let current = self.inner.backend.get(&key_of(path)?)?;
                    order.push((path, current.is_some()));
                    current
                }
            };
            states.insert(path.to_string(), write.apply_to(current)?);
        }

        let mut mutations = Vec::with_capacity(order.len());
        for (path, existed) in order {
            let key = key_of(path)?;
            match states.remove(path.as_str()).flatten() {
                Some(fields) => mutations.push(Mutation::Put { key, fields }),
                // deleting a document that never existed changes nothing
                None if existed => mutations.push(Mutation::Delete { key }),
                None => {}
            }
        }
        if mutations.is_empty() {
            return Ok(());
        }

        self.inner.commit(mutations)?;
        log::debug!("Committed batch of {} writes", writes.len());
        Ok(())
    }

    pub(crate) fn check_opened(&self) -> CinderResult<()> {
        self.inner.check_opened()
    }

    pub fn backend(&self) -> &Backend {
        &self.inner.backend
    }

    pub fn governor(&self) -> &RateGovernor {
        &self.inner.governor
    }

    pub fn feed(&self) -> &ChangeFeed {
        &self.inner.feed
    }

    pub fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::Acquire)
    }

    /// Cancels all subscriptions and closes the backend.
    pub fn close(&self) -> CinderResult<()> {
        if self.inner.closed.swap(true, Ordering::AcqRel) {
            return Ok(());
        }
        let _commit = self.inner.commit_lock.lock();
        self.inner.feed.close();
        self.inner.backend.close()
    }
}

fn stream_listener() -> (ChangeListener, std::sync::mpsc::Receiver<ChangeEvent>) {
    let (sender, receiver) = channel();
    let sender = Mutex::new(sender);
    let listener = ChangeListener::new(move |event| {
        sender.lock().send(event).map_err(|_| {
            CinderError::new("Change stream was dropped", ErrorKind::SubscriptionError)
        })
    });
    (listener, receiver)
}

impl DocumentStoreInner {
    fn check_opened(&self) -> CinderResult<()> {
        if self.closed.load(Ordering::Acquire) {
            log::error!("Operation on a closed store");
            return Err(CinderError::new("Store is closed", ErrorKind::StoreClosed));
        }
        Ok(())
    }

    fn read(&self, path: &ParsedPath) -> CinderResult<Option<Document>> {
        match self.backend.get(&key_of(path)?)? {
            Some(fields) => Ok(Some(from_storage(&fields, path.id())?)),
            None => Ok(None),
        }
    }

    fn members(&self, collection: &ParsedPath) -> CinderResult<Vec<Document>> {
        self.backend
            .scan(collection.as_str())?
            .into_iter()
            .map(|(id, fields)| from_storage(&fields, &id))
            .collect()
    }

    /// Applies a single write under its path lock.
    fn write(&self, write: PreparedWrite) -> CinderResult<()> {
        let path = write.path().clone();
        let key = key_of(&path)?;
        let lock = self.locks.get_lock(path.as_str());
        let _guard = lock.lock();

        let current = self.backend.get(&key)?;
        if current.is_none() && matches!(write, PreparedWrite::Delete { .. }) {
            log::debug!("Delete of missing document {} ignored", path);
            return Ok(());
        }

        let mutation = match write.apply_to(current)? {
            Some(fields) => Mutation::Put { key, fields },
            None => Mutation::Delete { key },
        };
        self.commit(vec![mutation])?;
        log::debug!("Wrote document {}", path);
        Ok(())
    }

    /// Applies mutations to the backend and queues notifications for them.
    fn commit(&self, mutations: Vec<Mutation>) -> CinderResult<()> {
        let _commit = self.commit_lock.lock();
        self.check_opened()?;
        self.backend.apply(&mutations)?;
        self.notify(&mutations);
        Ok(())
    }

    fn notify(&self, mutations: &[Mutation]) {
        for mutation in mutations {
            let key = mutation.key();
            let target = SubscriptionTarget::Document(key.to_string());
            if !self.feed.has_subscribers(&target) {
                continue;
            }
            let document = match mutation {
                Mutation::Put { fields, .. } => match from_storage(fields, &key.id) {
                    Ok(document) => Some(document),
                    Err(err) => {
                        log::warn!("Cannot decode {} for subscribers: {}", key, err);
                        continue;
                    }
                },
                Mutation::Delete { .. } => None,
            };
            let path = key.to_string();
            self.feed.publish(&target, ChangeEvent::Document { path, document });
        }

        let collections = mutations
            .iter()
            .flat_map(|m| enclosing_collections(&m.key().collection))
            .unique();
        for collection in collections {
            let collection = collection.as_str();
            let target = SubscriptionTarget::Collection(collection.to_string());
            if !self.feed.has_subscribers(&target) {
                continue;
            }
            let documents = self.backend.scan(collection).and_then(|scanned| {
                scanned
                    .into_iter()
                    .map(|(id, fields)| from_storage(&fields, &id))
                    .collect::<CinderResult<Vec<_>>>()
            });
            match documents {
                Ok(documents) => self.feed.publish(
                    &target,
                    ChangeEvent::Collection {
                        path: collection.to_string(),
                        documents,
                    },
                ),
                Err(err) => log::warn!("Cannot read {} for subscribers: {}", collection, err),
            }
        }
    }
}
