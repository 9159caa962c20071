//! Shared building blocks: values, timestamps, clocks and locks.

mod auto_id;
mod clock;
mod lock;
mod sort_order;
mod timestamp;
mod value;

pub(crate) use auto_id::*;
pub use clock::*;
pub use lock::*;
pub use sort_order::*;
pub use timestamp::*;
pub use value::*;

/// Separator between path segments.
pub const PATH_SEPARATOR: char = '/';

/// Separator between the parts of a nested field path such as `address.city`.
pub const FIELD_SEPARATOR: char = '.';
