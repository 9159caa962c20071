//! Documents, the document store, batches and typed collections.

mod batch;
mod document;
mod document_store;
mod typed_collection;

pub use batch::*;
pub use document::*;
pub use document_store::DocumentStore;
pub use typed_collection::*;
