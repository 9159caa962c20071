use crate::common::{FromValue, Value};
use crate::errors::{CinderError, CinderResult, ErrorKind};
use im::OrdMap;
use itertools::Itertools;
use std::fmt::{Debug, Display, Formatter};

/// A document: a mapping from field name to [Value], plus the identity the
/// store assigned to it.
///
/// Fields are kept in a persistent ordered map, so cloning a document is
/// O(1) and a clone can be mutated without affecting the original. Nested
/// mappings are embedded as [`Value::Document`]; there are no references
/// between documents.
///
/// Documents returned by the store carry their ID (see [`Document::id`]).
/// The ID is not part of equality: two documents are equal when their
/// fields are.
///
/// ```rust
/// use cinder::doc;
///
/// let user = doc! {
///     name: "Alice",
///     age: 30,
///     address: { city: "Paris" },
///     tags: ["admin", "ops"],
/// };
/// assert_eq!(user.get("age").and_then(|v| v.as_i64()), Some(30));
/// ```
#[derive(Clone, Default)]
pub struct Document {
    id: Option<String>,
    data: OrdMap<String, Value>,
}

impl Document {
    pub fn new() -> Self {
        Document {
            id: None,
            data: OrdMap::new(),
        }
    }

    /// Returns this document annotated with `id`.
    pub fn with_id(mut self, id: &str) -> Self {
        self.id = Some(id.to_string());
        self
    }

    /// The store-assigned ID, present on documents read from the store.
    pub fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    pub(crate) fn set_id(&mut self, id: &str) {
        self.id = Some(id.to_string());
    }

    /// Associates `value` with `key`, replacing any previous value.
    ///
    /// # Errors
    ///
    /// Fails with [`ErrorKind::InvalidFieldName`] if `key` is empty.
    pub fn put<T: Into<Value>>(&mut self, key: &str, value: T) -> CinderResult<()> {
        if key.is_empty() {
            log::error!("Attempt to put a value under an empty field name");
            return Err(CinderError::new(
                "Document field names must not be empty",
                ErrorKind::InvalidFieldName,
            ));
        }
        self.data.insert(key.to_string(), value.into());
        Ok(())
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.data.get(key)
    }

    /// Reads and decodes a top-level field.
    ///
    /// A missing field decodes through [`FromValue::from_missing`], so
    /// `Option<T>` targets yield `None` while required targets fail with
    /// [`ErrorKind::CodecError`].
    pub fn get_as<T: FromValue>(&self, key: &str) -> CinderResult<T> {
        match self.data.get(key) {
            Some(value) => T::from_value(value),
            None => T::from_missing(key),
        }
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.data.remove(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.data.contains_key(key)
    }

    /// Top-level field names in sorted order.
    pub fn fields(&self) -> Vec<String> {
        self.data.keys().cloned().collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.data.iter()
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Shallow merge: every top-level field of `other` replaces the field of
    /// the same name here. Nested documents are replaced wholesale, never
    /// combined.
    pub fn merge(&mut self, other: &Document) {
        for (key, value) in other.data.iter() {
            self.data.insert(key.clone(), value.clone());
        }
    }
}

impl PartialEq for Document {
    fn eq(&self, other: &Self) -> bool {
        self.data == other.data
    }
}

impl Debug for Document {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let mut debug = f.debug_struct("Document");
        if let Some(id) = &self.id {
            debug.field("id", id);
        }
        debug.field("data", &self.data).finish()
    }
}

impl Display for Document {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{{{}}}",
            self.data
                .iter()
                .map(|(key, value)| format!("\"{}\": {}", key, value))
                .join(", ")
        )
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for Document {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Document {
            id: None,
            data: iter
                .into_iter()
                .map(|(key, value)| (key.into(), value.into()))
                .collect(),
        }
    }
}

pub fn normalize(value: &str) -> String {
    value.trim_matches('"').to_string()
}

/// Creates a [Document] with JSON-like syntax.
///
/// ```rust
/// use cinder::doc;
///
/// let empty = doc! {};
/// let base = 100;
/// let nested = doc! {
///     name: "Bob",
///     score: (base * 2),
///     profile: { tags: ["a", "b"] },
/// };
/// assert!(empty.is_empty());
/// assert_eq!(nested.len(), 3);
/// ```
#[macro_export]
macro_rules! doc {
    ({}) => {
        $crate::collection::Document::new()
    };

    () => {
        $crate::collection::Document::new()
    };

    ($($key:tt : $value:tt),* $(,)?) => {
        {
            let mut doc = $crate::collection::Document::new();
            $(
                doc.put(&$crate::collection::normalize(stringify!($key)), $crate::doc_value!($value))
                    .expect(&format!("Failed to put value {} in document", stringify!($value)));
            )*
            doc
        }
    };
}

/// Helper macro converting the values of a [`doc!`] invocation.
#[macro_export]
macro_rules! doc_value {
    ({ $($key:tt : $value:tt),* $(,)? }) => {
        $crate::common::Value::Document($crate::doc!{ $($key : $value),* })
    };

    ([ $($value:tt),* $(,)? ]) => {
        $crate::common::Value::Array(vec![$($crate::doc_value!($value)),*])
    };

    ($value:expr) => {
        $crate::common::Value::from($value)
    };
}
