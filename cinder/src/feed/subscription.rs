use crate::errors::{CinderError, CinderResult, ErrorKind};
use crate::feed::change_feed::ChangeFeedInner;
use crate::feed::ChangeEvent;
use parking_lot::Mutex;
use std::fmt::{Debug, Display, Formatter};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{channel, Receiver, Sender};
use std::sync::{Arc, Weak};
use uuid::Uuid;

/// Signature of subscriber callbacks.
///
/// Any `Fn(ChangeEvent) -> CinderResult<()>` closure that is `Send + Sync`
/// implements it. Returning an error (or panicking) is logged and affects no
/// other subscriber.
pub trait ChangeCallback: Send + Sync + Fn(ChangeEvent) -> CinderResult<()> {}

impl<F> ChangeCallback for F where F: Send + Sync + Fn(ChangeEvent) -> CinderResult<()> {}

/// A subscriber callback.
///
/// ```rust
/// use cinder::feed::ChangeListener;
///
/// let listener = ChangeListener::new(|event| {
///     println!("{}", event);
///     Ok(())
/// });
/// ```
#[derive(Clone)]
pub struct ChangeListener {
    on_change: Arc<dyn ChangeCallback>,
}

impl ChangeListener {
    pub fn new(on_change: impl ChangeCallback + 'static) -> Self {
        ChangeListener {
            on_change: Arc::new(on_change),
        }
    }

    pub(crate) fn notify(&self, event: ChangeEvent) -> CinderResult<()> {
        (self.on_change)(event)
    }
}

impl Debug for ChangeListener {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChangeListener").finish()
    }
}

/// What a subscription watches.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum SubscriptionTarget {
    Document(String),
    Collection(String),
}

impl SubscriptionTarget {
    pub fn path(&self) -> &str {
        match self {
            SubscriptionTarget::Document(path) => path,
            SubscriptionTarget::Collection(path) => path,
        }
    }
}

impl Display for SubscriptionTarget {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            SubscriptionTarget::Document(path) => write!(f, "document {}", path),
            SubscriptionTarget::Collection(path) => write!(f, "collection {}", path),
        }
    }
}

/// Registry entry of one live subscription.
///
/// Events are queued on a channel and delivered in order by a dedicated
/// thread, so writers never wait on callbacks.
pub(crate) struct Subscriber {
    id: Uuid,
    target: SubscriptionTarget,
    active: Arc<AtomicBool>,
    sender: Mutex<Option<Sender<ChangeEvent>>>,
}

impl Subscriber {
    /// Creates the subscriber and starts its delivery thread.
    pub(crate) fn start(target: SubscriptionTarget, listener: ChangeListener) -> CinderResult<Arc<Subscriber>> {
        let id = Uuid::new_v4();
        let active = Arc::new(AtomicBool::new(true));
        let (sender, receiver) = channel();

        let worker_active = active.clone();
        let worker_target = target.clone();
        std::thread::Builder::new()
            .name(format!("cinder-feed-{}", id))
            .spawn(move || deliver(receiver, listener, worker_active, worker_target))
            .map_err(|err| {
                log::error!("Failed to start delivery thread for {}: {}", target, err);
                CinderError::new_with_cause(
                    "Failed to start subscription delivery",
                    ErrorKind::SubscriptionError,
                    err.into(),
                )
            })?;

        Ok(Arc::new(Subscriber {
            id,
            target,
            active,
            sender: Mutex::new(Some(sender)),
        }))
    }

    pub(crate) fn id(&self) -> Uuid {
        self.id
    }

    pub(crate) fn target(&self) -> &SubscriptionTarget {
        &self.target
    }

    pub(crate) fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    /// Queues an event; a no-op once deactivated.
    pub(crate) fn enqueue(&self, event: ChangeEvent) {
        if !self.is_active() {
            return;
        }
        if let Some(sender) = self.sender.lock().as_ref() {
            if sender.send(event).is_err() {
                log::debug!("Delivery thread for {} has stopped", self.target);
            }
        }
    }

    /// Stops delivery. Events already being delivered may still complete.
    pub(crate) fn deactivate(&self) {
        self.active.store(false, Ordering::Release);
        // dropping the sender ends the delivery thread
        self.sender.lock().take();
    }
}

fn deliver(
    receiver: Receiver<ChangeEvent>,
    listener: ChangeListener,
    active: Arc<AtomicBool>,
    target: SubscriptionTarget,
) {
    for event in receiver {
        if !active.load(Ordering::Acquire) {
            break;
        }
        match catch_unwind(AssertUnwindSafe(|| listener.notify(event))) {
            Ok(Ok(())) => {}
            Ok(Err(err)) => log::warn!("Subscriber of {} failed: {}", target, err),
            Err(_) => log::warn!("Subscriber of {} panicked", target),
        }
    }
    log::debug!("Delivery for {} stopped", target);
}

/// Handle to a live subscription.
///
/// The subscription stays active until [`Subscription::unsubscribe`] is
/// called or the store is closed; dropping the handle does not cancel it.
/// Clones refer to the same subscription.
#[derive(Clone)]
pub struct Subscription {
    subscriber: Arc<Subscriber>,
    feed: Weak<ChangeFeedInner>,
}

impl Subscription {
    pub(crate) fn new(subscriber: Arc<Subscriber>, feed: Weak<ChangeFeedInner>) -> Self {
        Subscription { subscriber, feed }
    }

    pub fn id(&self) -> String {
        self.subscriber.id().to_string()
    }

    pub fn target(&self) -> &SubscriptionTarget {
        self.subscriber.target()
    }

    pub fn is_active(&self) -> bool {
        self.subscriber.is_active()
    }

    /// Cancels the subscription. Safe to call any number of times, from any
    /// thread, including after the store has been closed.
    pub fn unsubscribe(&self) {
        if !self.subscriber.is_active() {
            return;
        }
        self.subscriber.deactivate();
        if let Some(feed) = self.feed.upgrade() {
            feed.remove(&self.subscriber);
        }
        log::debug!("Unsubscribed from {}", self.subscriber.target());
    }
}

impl Debug for Subscription {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.subscriber.id())
            .field("target", self.subscriber.target())
            .field("active", &self.is_active())
            .finish()
    }
}
