//! # Cinder
//!
//! An embeddable document store with hierarchical paths, structured
//! queries, atomic batches, change notifications and advisory rate
//! limiting.
//!
//! ## Data model
//!
//! Documents live in collections addressed by slash-separated paths.
//! Odd-length paths name collections (`users`, `users/alice/posts`), even
//! length paths name documents (`users/alice`). A document is a mapping of
//! field names to [`common::Value`]s and may embed further documents; a
//! document may also own subcollections.
//!
//! ## Quick start
//!
//! ```rust
//! use cinder::{doc, Cinder};
//!
//! let db = Cinder::builder().open().unwrap();
//!
//! let id = db.add("users", doc! { name: "Alice", age: 30 }).unwrap();
//! let path = format!("users/{}", id);
//!
//! db.update(&path, doc! { age: 31 }).unwrap();
//! let alice = db.get(&path).unwrap().unwrap();
//! assert_eq!(alice.get_as::<i64>("age").unwrap(), 31);
//!
//! db.delete(&path).unwrap();
//! assert!(db.get(&path).unwrap().is_none());
//! ```
//!
//! ## Modules
//!
//! - [`path`]: path validation and navigation
//! - [`codec`]: conversion between native and stored values
//! - [`collection`]: documents, the document store, batches, typed collections
//! - [`query`]: predicates, ordering, cursors
//! - [`feed`]: subscriptions and change streams
//! - [`governor`]: sliding-window rate limiting
//! - [`store`]: in-memory and journal backends
//!
//! Logging goes through the `log` facade; install any logger to see it.

pub mod cinder;
pub mod cinder_builder;
pub mod cinder_config;
pub mod codec;
pub mod collection;
pub mod common;
pub mod errors;
pub mod feed;
pub mod governor;
pub mod path;
pub mod query;
pub mod store;

pub use crate::cinder::Cinder;
pub use crate::cinder_builder::CinderBuilder;
pub use crate::cinder_config::CinderConfig;
