//! Storage backends the document store writes through.

mod backend;
mod journal;
mod memory;

pub use backend::*;
pub use journal::*;
pub use memory::*;
