use crate::codec::Convertible;
use crate::collection::{Document, DocumentStore};
use crate::errors::CinderResult;
use crate::feed::{ChangeEvent, ChangeListener, Subscription};
use crate::path::{validate_collection_path, ParsedPath};
use crate::query::QueryOptions;
use std::marker::PhantomData;

/// An entity decoded from the store together with its document ID.
#[derive(Debug, Clone, PartialEq)]
pub struct TypedDocument<T> {
    pub id: String,
    pub data: T,
}

/// A collection whose documents are decoded into `T`.
///
/// Paths are derived from the collection path with [`ParsedPath::child`];
/// entities hold only data and never know where they are stored.
///
/// ```rust
/// use cinder::codec::Convertible;
/// use cinder::collection::Document;
/// use cinder::errors::CinderResult;
/// use cinder::{doc, Cinder};
///
/// #[derive(Debug, PartialEq)]
/// struct Task {
///     title: String,
///     done: bool,
/// }
///
/// impl Convertible for Task {
///     fn to_document(&self) -> CinderResult<Document> {
///         Ok(doc! { title: (self.title.clone()), done: (self.done) })
///     }
///
///     fn from_document(document: &Document) -> CinderResult<Self> {
///         Ok(Task {
///             title: document.get_as("title")?,
///             done: document.get_as("done")?,
///         })
///     }
/// }
///
/// let db = Cinder::builder().open().unwrap();
/// let tasks = db.collection::<Task>("users/alice/tasks").unwrap();
/// let id = tasks.add(&Task { title: "write docs".into(), done: false }).unwrap();
/// let task = tasks.get(&id).unwrap().unwrap();
/// assert_eq!(task.data.title, "write docs");
/// ```
pub struct TypedCollection<T: Convertible> {
    store: DocumentStore,
    path: ParsedPath,
    _phantom: PhantomData<fn() -> T>,
}

impl<T: Convertible> Clone for TypedCollection<T> {
    fn clone(&self) -> Self {
        TypedCollection {
            store: self.store.clone(),
            path: self.path.clone(),
            _phantom: PhantomData,
        }
    }
}

fn decode<T: Convertible>(document: &Document) -> CinderResult<TypedDocument<T>> {
    Ok(TypedDocument {
        id: document.id().unwrap_or_default().to_string(),
        data: T::from_document(document)?,
    })
}

impl<T: Convertible> TypedCollection<T> {
    pub(crate) fn new(store: DocumentStore, path: &str) -> CinderResult<Self> {
        Ok(TypedCollection {
            store,
            path: validate_collection_path(path)?,
            _phantom: PhantomData,
        })
    }

    pub fn path(&self) -> &ParsedPath {
        &self.path
    }

    fn document_path(&self, id: &str) -> CinderResult<String> {
        Ok(self.path.child(id)?.to_string())
    }

    pub fn add(&self, entity: &T) -> CinderResult<String> {
        self.store.add(self.path.as_str(), entity.to_document()?)
    }

    pub fn get(&self, id: &str) -> CinderResult<Option<TypedDocument<T>>> {
        match self.store.get(&self.document_path(id)?)? {
            Some(document) => Ok(Some(decode(&document)?)),
            None => Ok(None),
        }
    }

    pub fn set(&self, id: &str, entity: &T) -> CinderResult<()> {
        self.store
            .set(&self.document_path(id)?, entity.to_document()?, false)
    }

    /// Shallow-merges a partial document into an existing entity.
    pub fn update(&self, id: &str, patch: Document) -> CinderResult<()> {
        self.store.update(&self.document_path(id)?, patch)
    }

    pub fn delete(&self, id: &str) -> CinderResult<()> {
        self.store.delete(&self.document_path(id)?)
    }

    pub fn list(&self) -> CinderResult<Vec<TypedDocument<T>>> {
        self.store
            .list(self.path.as_str())?
            .iter()
            .map(decode)
            .collect()
    }

    pub fn query(&self, options: &QueryOptions) -> CinderResult<Vec<TypedDocument<T>>> {
        self.store
            .query(self.path.as_str(), options)?
            .iter()
            .map(decode)
            .collect()
    }

    /// Subscribes to the collection, decoding every member list.
    ///
    /// Members that fail to decode make the callback fail for that event.
    pub fn subscribe<F>(&self, on_change: F) -> CinderResult<Subscription>
    where
        F: Fn(Vec<TypedDocument<T>>) -> CinderResult<()> + Send + Sync + 'static,
        T: 'static,
    {
        let listener = ChangeListener::new(move |event: ChangeEvent| {
            let decoded = event
                .documents()
                .iter()
                .map(decode)
                .collect::<CinderResult<Vec<_>>>()?;
            on_change(decoded)
        });
        self.store.subscribe_collection(self.path.as_str(), listener)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::{Clock, SortOrder};
    use crate::doc;
    use crate::errors::ErrorKind;
    use crate::governor::{RateGovernor, RateLimits};
    use crate::query::field;
    use crate::store::{Backend, MemoryBackend};

    #[derive(Debug, Clone, PartialEq)]
    struct Player {
        name: String,
        score: i64,
    }

    impl Convertible for Player {
        fn to_document(&self) -> CinderResult<Document> {
            Ok(doc! { name: (self.name.clone()), score: (self.score) })
        }

        fn from_document(document: &Document) -> CinderResult<Self> {
            Ok(Player {
                name: document.get_as("name")?,
                score: document.get_as("score")?,
            })
        }
    }

    fn players() -> TypedCollection<Player> {
        let store = DocumentStore::new(
            Backend::new(MemoryBackend::new()),
            RateGovernor::new(RateLimits::unlimited(), Clock::manual(0)),
            20,
        );
        TypedCollection::new(store, "games/g1/players").unwrap()
    }

    fn player(name: &str, score: i64) -> Player {
        Player {
            name: name.to_string(),
            score,
        }
    }

    #[test]
    fn test_typed_round_trip() {
        let players = players();
        let id = players.add(&player("ann", 10)).unwrap();
        let found = players.get(&id).unwrap().unwrap();
        assert_eq!(found.id, id);
        assert_eq!(found.data, player("ann", 10));

        players.update(&id, doc! { score: 11 }).unwrap();
        assert_eq!(players.get(&id).unwrap().unwrap().data.score, 11);

        players.delete(&id).unwrap();
        assert!(players.get(&id).unwrap().is_none());
    }

    #[test]
    fn test_typed_query() {
        let players = players();
        players.set("a", &player("ann", 10)).unwrap();
        players.set("b", &player("bob", 30)).unwrap();
        players.set("c", &player("cid", 20)).unwrap();

        let top = players
            .query(
                &QueryOptions::new()
                    .filter(field("score").gte(20))
                    .order_by("score", SortOrder::Descending),
            )
            .unwrap();
        let names: Vec<&str> = top.iter().map(|p| p.data.name.as_str()).collect();
        assert_eq!(names, vec!["bob", "cid"]);
        assert_eq!(players.list().unwrap().len(), 3);
    }

    #[test]
    fn test_decode_failure_is_codec_error() {
        let players = players();
        players.update("missing", doc! { score: 1 }).unwrap_err();
        players.store.set("games/g1/players/x", doc! { name: "x" }, false).unwrap();
        let err = players.get("x").unwrap_err();
        assert_eq!(err.kind(), &ErrorKind::CodecError);
    }

    #[test]
    fn test_invalid_collection_path() {
        let store = players().store.clone();
        assert!(TypedCollection::<Player>::new(store, "games/g1").is_err());
    }
}
