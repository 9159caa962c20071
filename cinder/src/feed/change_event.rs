use crate::collection::Document;
use std::fmt::{Display, Formatter};

/// A notification delivered to a subscriber.
///
/// Events carry full state, never a diff: the document as it now is (`None`
/// once deleted), or the complete current member list of a collection.
#[derive(Debug, Clone, PartialEq)]
pub enum ChangeEvent {
    Document {
        path: String,
        document: Option<Document>,
    },
    Collection {
        path: String,
        documents: Vec<Document>,
    },
}

impl ChangeEvent {
    /// The subscribed path this event is about.
    pub fn path(&self) -> &str {
        match self {
            ChangeEvent::Document { path, .. } => path,
            ChangeEvent::Collection { path, .. } => path,
        }
    }

    /// The document state carried by a document event.
    pub fn document(&self) -> Option<&Document> {
        match self {
            ChangeEvent::Document { document, .. } => document.as_ref(),
            ChangeEvent::Collection { .. } => None,
        }
    }

    /// The member list carried by a collection event; empty for document events.
    pub fn documents(&self) -> &[Document] {
        match self {
            ChangeEvent::Collection { documents, .. } => documents,
            ChangeEvent::Document { .. } => &[],
        }
    }
}

impl Display for ChangeEvent {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            ChangeEvent::Document { path, document: Some(_) } => write!(f, "document {} changed", path),
            ChangeEvent::Document { path, document: None } => write!(f, "document {} absent", path),
            ChangeEvent::Collection { path, documents } => {
                write!(f, "collection {} has {} documents", path, documents.len())
            }
        }
    }
}
