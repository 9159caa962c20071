//! Validation and decomposition of slash-separated resource paths.
//!
//! Paths alternate collection and document segments:
//!
//! ```text
//! users                 collection (1 segment)
//! users/u1              document   (2 segments)
//! users/u1/items        collection (3 segments)
//! users/u1/items/i9     document   (4 segments)
//! ```
//!
//! A collection path has an odd number of segments and a document path an
//! even, non-zero number. Segments are never empty and the raw string never
//! starts or ends with the separator.
//!
//! Validation checks the general shape (emptiness, leading or trailing
//! separator, empty segments) before segment-count parity, so a path that is
//! both malformed and of the wrong kind reports the shape problem.

use crate::common::PATH_SEPARATOR;
use crate::errors::{CinderError, CinderResult, ErrorKind};
use itertools::Itertools;
use smallvec::SmallVec;
use std::fmt::{Display, Formatter};

type Segments = SmallVec<[String; 4]>;

/// Whether a path addresses a collection or a document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PathKind {
    Collection,
    Document,
}

impl Display for PathKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            PathKind::Collection => write!(f, "collection"),
            PathKind::Document => write!(f, "document"),
        }
    }
}

/// A validated path, split into its segments.
///
/// `ParsedPath` is also the path-building capability of the crate: typed
/// collections and callers derive child and parent paths from it instead of
/// concatenating strings.
///
/// ```rust
/// use cinder::path::{validate_collection_path, PathKind};
///
/// let users = validate_collection_path("users").unwrap();
/// let alice = users.child("alice").unwrap();
/// assert_eq!(alice.as_str(), "users/alice");
/// assert_eq!(alice.kind(), PathKind::Document);
/// assert_eq!(alice.parent().unwrap(), users);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ParsedPath {
    raw: String,
    segments: Segments,
}

impl ParsedPath {
    fn from_segments(segments: Segments) -> Self {
        ParsedPath {
            raw: segments.iter().join(&PATH_SEPARATOR.to_string()),
            segments,
        }
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn kind(&self) -> PathKind {
        if self.segments.len() % 2 == 0 {
            PathKind::Document
        } else {
            PathKind::Collection
        }
    }

    pub fn is_document(&self) -> bool {
        self.kind() == PathKind::Document
    }

    pub fn is_collection(&self) -> bool {
        self.kind() == PathKind::Collection
    }

    /// The last segment: the document ID, or the collection's own name.
    pub fn id(&self) -> &str {
        self.segments.last().map(String::as_str).unwrap_or_default()
    }

    /// The enclosing path: a document's collection, or a subcollection's
    /// parent document. Root collections have no parent.
    pub fn parent(&self) -> Option<ParsedPath> {
        if self.segments.len() <= 1 {
            return None;
        }
        let mut segments = self.segments.clone();
        segments.pop();
        Some(ParsedPath::from_segments(segments))
    }

    /// Appends one segment, flipping the path kind.
    pub fn child(&self, segment: &str) -> CinderResult<ParsedPath> {
        if segment.is_empty() || segment.contains(PATH_SEPARATOR) {
            log::error!("Invalid path segment '{}' under {}", segment, self.raw);
            return Err(CinderError::new(
                &format!(
                    "Path segment '{}' must be non-empty and must not contain '{}'",
                    segment, PATH_SEPARATOR
                ),
                ErrorKind::InvalidPath,
            ));
        }
        let mut segments = self.segments.clone();
        segments.push(segment.to_string());
        Ok(ParsedPath::from_segments(segments))
    }
}

impl Display for ParsedPath {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.raw)
    }
}

impl AsRef<str> for ParsedPath {
    fn as_ref(&self) -> &str {
        &self.raw
    }
}

fn invalid_path(path: &str, reason: &str) -> CinderError {
    CinderError::new(&format!("Invalid path '{}': {}", path, reason), ErrorKind::InvalidPath)
}

fn parse_shape(path: &str) -> CinderResult<ParsedPath> {
    if path.is_empty() {
        return Err(invalid_path(path, "path must not be empty"));
    }
    if path.starts_with(PATH_SEPARATOR) || path.ends_with(PATH_SEPARATOR) {
        return Err(invalid_path(
            path,
            &format!("path must not start or end with '{}'", PATH_SEPARATOR),
        ));
    }

    let segments: Segments = path.split(PATH_SEPARATOR).map(str::to_string).collect();
    if segments.iter().any(String::is_empty) {
        return Err(invalid_path(path, "path segments must not be empty"));
    }

    Ok(ParsedPath {
        raw: path.to_string(),
        segments,
    })
}

/// Validates `path` as a path of the given kind.
pub fn validate_path(path: &str, kind: PathKind) -> CinderResult<ParsedPath> {
    let parsed = parse_shape(path)?;
    if parsed.kind() != kind {
        let expected = match kind {
            PathKind::Collection => "an odd",
            PathKind::Document => "an even",
        };
        return Err(invalid_path(
            path,
            &format!(
                "a {} path needs {} number of segments, found {}",
                kind,
                expected,
                parsed.len()
            ),
        ));
    }
    Ok(parsed)
}

/// Validates a collection path (odd segment count).
pub fn validate_collection_path(path: &str) -> CinderResult<ParsedPath> {
    validate_path(path, PathKind::Collection)
}

/// Validates a document path (even segment count, at least two).
pub fn validate_document_path(path: &str) -> CinderResult<ParsedPath> {
    validate_path(path, PathKind::Document)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collection_paths() {
        assert!(validate_collection_path("users").is_ok());
        assert!(validate_collection_path("users/u1/items").is_ok());
        assert!(validate_collection_path("users/u1").is_err());
    }

    #[test]
    fn test_document_paths() {
        assert!(validate_document_path("users/u1").is_ok());
        assert!(validate_document_path("users/u1/items/i1").is_ok());
        assert!(validate_document_path("users").is_err());
    }

    #[test]
    fn test_malformed_paths_always_rejected() {
        for path in ["", "/users", "users/", "/", "users//u1", "//"] {
            for kind in [PathKind::Collection, PathKind::Document] {
                let err = validate_path(path, kind).unwrap_err();
                assert_eq!(err.kind(), &ErrorKind::InvalidPath, "path {:?}", path);
            }
        }
    }

    #[test]
    fn test_shape_errors_reported_before_parity() {
        // "users/" is malformed and would also have the wrong parity for a document
        let err = validate_document_path("users/").unwrap_err();
        assert!(err.message().contains("start or end"));

        let err = validate_document_path("").unwrap_err();
        assert!(err.message().contains("empty"));

        let err = validate_document_path("users").unwrap_err();
        assert!(err.message().contains("even"));
    }

    #[test]
    fn test_parsed_path_navigation() {
        let path = validate_document_path("users/u1/items/i1").unwrap();
        assert_eq!(path.id(), "i1");
        assert_eq!(path.segments(), ["users", "u1", "items", "i1"]);

        let items = path.parent().unwrap();
        assert_eq!(items.as_str(), "users/u1/items");
        assert!(items.is_collection());

        let user = items.parent().unwrap();
        assert_eq!(user.as_str(), "users/u1");
        assert!(user.is_document());

        let users = user.parent().unwrap();
        assert_eq!(users.as_str(), "users");
        assert!(users.parent().is_none());
    }

    #[test]
    fn test_child_rejects_bad_segments() {
        let users = validate_collection_path("users").unwrap();
        assert!(users.child("").is_err());
        assert!(users.child("a/b").is_err());
        assert_eq!(users.child("u1").unwrap().to_string(), "users/u1");
    }
}
