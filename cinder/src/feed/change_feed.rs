use crate::errors::{CinderError, CinderResult, ErrorKind};
use crate::feed::subscription::Subscriber;
use crate::feed::{ChangeEvent, ChangeListener, Subscription, SubscriptionTarget};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Registry of live subscriptions keyed by their target path.
///
/// Publishing only enqueues events; each subscriber's own delivery thread
/// runs its callback. Events published to one subscriber are delivered in
/// publish order. The store publishes while holding its commit lock, so that
/// order is commit order.
#[derive(Clone, Default)]
pub struct ChangeFeed {
    inner: Arc<ChangeFeedInner>,
}

#[derive(Default)]
pub(crate) struct ChangeFeedInner {
    subscribers: RwLock<HashMap<SubscriptionTarget, Vec<Arc<Subscriber>>>>,
    closed: AtomicBool,
}

impl ChangeFeed {
    pub fn new() -> Self {
        ChangeFeed::default()
    }

    /// Registers `listener` on `target`.
    ///
    /// `initial` is queued ahead of every later event, so the subscriber
    /// always starts from a snapshot of the current state.
    pub fn subscribe(
        &self,
        target: SubscriptionTarget,
        listener: ChangeListener,
        initial: ChangeEvent,
    ) -> CinderResult<Subscription> {
        if self.inner.closed.load(Ordering::Acquire) {
            log::error!("Cannot subscribe to {}, change feed is closed", target);
            return Err(CinderError::new("Change feed is closed", ErrorKind::StoreClosed));
        }

        let subscriber = Subscriber::start(target.clone(), listener)?;
        subscriber.enqueue(initial);
        self.inner
            .subscribers
            .write()
            .entry(target.clone())
            .or_default()
            .push(subscriber.clone());

        log::debug!("Subscribed {} to {}", subscriber.id(), target);
        Ok(Subscription::new(subscriber, Arc::downgrade(&self.inner)))
    }

    pub fn has_subscribers(&self, target: &SubscriptionTarget) -> bool {
        self.inner
            .subscribers
            .read()
            .get(target)
            .is_some_and(|subscribers| !subscribers.is_empty())
    }

    /// Total number of live subscriptions.
    pub fn subscriber_count(&self) -> usize {
        self.inner.subscribers.read().values().map(Vec::len).sum()
    }

    /// Queues `event` for every subscriber of `target`.
    pub fn publish(&self, target: &SubscriptionTarget, event: ChangeEvent) {
        let subscribers = self.inner.subscribers.read();
        if let Some(subscribers) = subscribers.get(target) {
            for subscriber in subscribers {
                subscriber.enqueue(event.clone());
            }
        }
    }

    /// Cancels every subscription. Later subscribes fail with `StoreClosed`.
    pub fn close(&self) {
        self.inner.closed.store(true, Ordering::Release);
        let drained: Vec<Arc<Subscriber>> = self
            .inner
            .subscribers
            .write()
            .drain()
            .flat_map(|(_, subscribers)| subscribers)
            .collect();
        for subscriber in drained.iter() {
            subscriber.deactivate();
        }
        log::debug!("Change feed closed, cancelled {} subscriptions", drained.len());
    }
}

impl ChangeFeedInner {
    pub(crate) fn remove(&self, subscriber: &Arc<Subscriber>) {
        let mut subscribers = self.subscribers.write();
        if let Some(list) = subscribers.get_mut(subscriber.target()) {
            list.retain(|s| s.id() != subscriber.id());
            if list.is_empty() {
                subscribers.remove(subscriber.target());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::doc;
    use parking_lot::Mutex;
    use std::time::Duration;

    fn document_event(path: &str, value: i64) -> ChangeEvent {
        ChangeEvent::Document {
            path: path.to_string(),
            document: Some(doc! { value: value }),
        }
    }

    fn recording_listener() -> (ChangeListener, Arc<Mutex<Vec<ChangeEvent>>>) {
        let events = Arc::new(Mutex::new(Vec::new()));
        let sink = events.clone();
        let listener = ChangeListener::new(move |event| {
            sink.lock().push(event);
            Ok(())
        });
        (listener, events)
    }

    #[test]
    fn test_events_delivered_in_publish_order() {
        let feed = ChangeFeed::new();
        let target = SubscriptionTarget::Document("c/d".into());
        let (listener, events) = recording_listener();
        let _subscription = feed
            .subscribe(target.clone(), listener, document_event("c/d", 0))
            .unwrap();

        for i in 1..=50 {
            feed.publish(&target, document_event("c/d", i));
        }

        awaitility::at_most(Duration::from_secs(5)).until(|| events.lock().len() == 51);
        let values: Vec<i64> = events
            .lock()
            .iter()
            .map(|e| e.document().unwrap().get_as::<i64>("value").unwrap())
            .collect();
        assert_eq!(values, (0..=50).collect::<Vec<_>>());
    }

    #[test]
    fn test_failing_subscriber_does_not_affect_others() {
        let feed = ChangeFeed::new();
        let target = SubscriptionTarget::Document("c/d".into());
        let failing = ChangeListener::new(|_| {
            Err(CinderError::new("boom", ErrorKind::SubscriptionError))
        });
        let panicking = ChangeListener::new(|_| panic!("subscriber bug"));
        let (listener, events) = recording_listener();

        let _a = feed.subscribe(target.clone(), failing, document_event("c/d", 0)).unwrap();
        let _b = feed.subscribe(target.clone(), panicking, document_event("c/d", 0)).unwrap();
        let _c = feed.subscribe(target.clone(), listener, document_event("c/d", 0)).unwrap();
        feed.publish(&target, document_event("c/d", 1));

        awaitility::at_most(Duration::from_secs(5)).until(|| events.lock().len() == 2);
    }

    #[test]
    fn test_unsubscribe_is_idempotent() {
        let feed = ChangeFeed::new();
        let target = SubscriptionTarget::Collection("c".into());
        let (listener, _) = recording_listener();
        let initial = ChangeEvent::Collection {
            path: "c".into(),
            documents: vec![],
        };
        let subscription = feed.subscribe(target.clone(), listener, initial).unwrap();
        assert!(feed.has_subscribers(&target));

        subscription.unsubscribe();
        subscription.unsubscribe();
        assert!(!subscription.is_active());
        assert!(!feed.has_subscribers(&target));
        assert_eq!(feed.subscriber_count(), 0);
    }

    #[test]
    fn test_close_cancels_everything() {
        let feed = ChangeFeed::new();
        let target = SubscriptionTarget::Document("c/d".into());
        let (listener, _) = recording_listener();
        let subscription = feed
            .subscribe(target.clone(), listener.clone(), document_event("c/d", 0))
            .unwrap();

        feed.close();
        assert!(!subscription.is_active());
        subscription.unsubscribe();

        let err = feed
            .subscribe(target, listener, document_event("c/d", 0))
            .unwrap_err();
        assert_eq!(err.kind(), &ErrorKind::StoreClosed);
    }
}
