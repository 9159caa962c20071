use crate::collection::Document;
use crate::errors::CinderResult;

/// Explicit conversion between an entity type and a [Document].
///
/// Each entity type supplies its own decode function rather than being
/// rebuilt through reflection. [`crate::collection::TypedCollection`] uses
/// these two functions on every write and read.
///
/// ```rust
/// use cinder::codec::Convertible;
/// use cinder::collection::Document;
/// use cinder::doc;
/// use cinder::errors::CinderResult;
///
/// struct User {
///     name: String,
///     age: i64,
/// }
///
/// impl Convertible for User {
///     fn to_document(&self) -> CinderResult<Document> {
///         Ok(doc! { name: (self.name.clone()), age: (self.age) })
///     }
///
///     fn from_document(document: &Document) -> CinderResult<Self> {
///         Ok(User {
///             name: document.get_as("name")?,
///             age: document.get_as("age")?,
///         })
///     }
/// }
/// ```
pub trait Convertible: Sized {
    fn to_document(&self) -> CinderResult<Document>;

    fn from_document(document: &Document) -> CinderResult<Self>;
}

impl Convertible for Document {
    fn to_document(&self) -> CinderResult<Document> {
        Ok(self.clone())
    }

    fn from_document(document: &Document) -> CinderResult<Self> {
        Ok(document.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::doc;
    use crate::errors::ErrorKind;

    #[derive(Debug, PartialEq)]
    struct Point {
        x: i64,
        label: Option<String>,
    }

    impl Convertible for Point {
        fn to_document(&self) -> CinderResult<Document> {
            let mut document = doc! { x: (self.x) };
            document.put("label", self.label.clone())?;
            Ok(document)
        }

        fn from_document(document: &Document) -> CinderResult<Self> {
            Ok(Point {
                x: document.get_as("x")?,
                label: document.get_as("label")?,
            })
        }
    }

    #[test]
    fn test_entity_round_trip() {
        let point = Point { x: 3, label: None };
        let document = point.to_document().unwrap();
        assert_eq!(Point::from_document(&document).unwrap(), point);
    }

    #[test]
    fn test_decode_reports_missing_required_field() {
        let err = Point::from_document(&doc! { label: "no x" }).unwrap_err();
        assert_eq!(err.kind(), &ErrorKind::CodecError);
    }

    #[test]
    fn test_document_is_its_own_entity() {
        let document = doc! { a: 1 };
        assert_eq!(Document::from_document(&document).unwrap(), document);
    }
}
