use crate::feed::{ChangeEvent, Subscription};
use std::sync::mpsc::{Receiver, RecvTimeoutError, TryRecvError};
use std::time::Duration;

/// A subscription consumed as a blocking stream of events.
///
/// The stream ends once the subscription is cancelled. Dropping the stream
/// cancels its subscription.
///
/// ```rust
/// use cinder::{doc, Cinder};
/// use std::time::Duration;
///
/// let db = Cinder::builder().open().unwrap();
/// let mut stream = db.watch_document("users/alice").unwrap();
///
/// // the first event is the current state
/// let initial = stream.recv_timeout(Duration::from_secs(5)).unwrap();
/// assert!(initial.document().is_none());
///
/// db.set("users/alice", doc! { age: 30 }, false).unwrap();
/// let changed = stream.recv_timeout(Duration::from_secs(5)).unwrap();
/// assert!(changed.document().is_some());
/// ```
pub struct ChangeStream {
    receiver: Receiver<ChangeEvent>,
    subscription: Subscription,
}

impl std::fmt::Debug for ChangeStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChangeStream").finish_non_exhaustive()
    }
}

impl ChangeStream {
    pub(crate) fn new(receiver: Receiver<ChangeEvent>, subscription: Subscription) -> Self {
        ChangeStream {
            receiver,
            subscription,
        }
    }

    /// Blocks for the next event. `None` once the stream is closed.
    pub fn recv(&self) -> Option<ChangeEvent> {
        self.receiver.recv().ok()
    }

    /// Waits at most `timeout` for the next event.
    pub fn recv_timeout(&self, timeout: Duration) -> Option<ChangeEvent> {
        match self.receiver.recv_timeout(timeout) {
            Ok(event) => Some(event),
            Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => None,
        }
    }

    /// Returns an already delivered event without blocking.
    pub fn try_recv(&self) -> Option<ChangeEvent> {
        match self.receiver.try_recv() {
            Ok(event) => Some(event),
            Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => None,
        }
    }

    pub fn subscription(&self) -> &Subscription {
        &self.subscription
    }

    pub fn close(&self) {
        self.subscription.unsubscribe();
    }
}

impl Iterator for ChangeStream {
    type Item = ChangeEvent;

    fn next(&mut self) -> Option<Self::Item> {
        self.recv()
    }
}

impl Drop for ChangeStream {
    fn drop(&mut self) {
        self.subscription.unsubscribe();
    }
}
