//! Change notifications for documents and collections.

mod change_event;
mod change_feed;
mod change_stream;
mod subscription;

pub use change_event::*;
pub use change_feed::*;
pub use change_stream::*;
pub use subscription::{ChangeCallback, ChangeListener, Subscription, SubscriptionTarget};
