//! Advisory, in-process request throttling.

mod rate_governor;
mod rate_limits;

pub use rate_governor::*;
pub use rate_limits::*;
