//! Conversion between native documents and their stored representation.
//!
//! The store never persists a [`crate::collection::Document`] directly. Every
//! write passes through [`to_storage`], which fixes date/times into
//! [`crate::common::Timestamp`]s and strips values that cannot be stored,
//! and every read passes through [`from_storage`], which reverses that and
//! annotates the document with its ID.

mod convertible;
mod data_codec;
mod stored_value;

pub use convertible::*;
pub use data_codec::*;
pub use stored_value::*;
