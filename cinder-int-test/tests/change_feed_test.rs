use cinder::collection::Document;
use cinder::doc;
use cinder::errors::{CinderError, ErrorKind};
use cinder::feed::{ChangeEvent, ChangeListener};
use cinder_int_test::test_util::{cleanup, create_test_context, ids, run_test};
use std::sync::{Arc, Mutex};
use std::time::Duration;

#[ctor::ctor]
fn init() {
    colog::init();
}

fn wait_for_event<F: Fn() -> bool>(timeout_ms: u64, check: F) {
    awaitility::at_most(Duration::from_millis(timeout_ms)).until(check);
}

fn recording_listener() -> (ChangeListener, Arc<Mutex<Vec<ChangeEvent>>>) {
    let events = Arc::new(Mutex::new(Vec::new()));
    let sink = events.clone();
    let listener = ChangeListener::new(move |event| {
        sink.lock().unwrap().push(event);
        Ok(())
    });
    (listener, events)
}

fn document_states(events: &Mutex<Vec<ChangeEvent>>) -> Vec<Option<Document>> {
    events
        .lock()
        .unwrap()
        .iter()
        .map(|event| event.document().cloned())
        .collect()
}

#[test]
fn test_document_subscription_receives_initial_state_and_changes() {
    run_test(
        create_test_context,
        |ctx| {
            let db = ctx.db();
            db.set("users/alice", doc! { age: 30 }, false)?;

            let (listener, events) = recording_listener();
            let subscription = db.subscribe_document("users/alice", listener)?;
            db.update("users/alice", doc! { age: 31 })?;
            db.delete("users/alice")?;

            wait_for_event(5000, || events.lock().unwrap().len() == 3);
            assert_eq!(
                document_states(&events),
                vec![Some(doc! { age: 30 }), Some(doc! { age: 31 }), None]
            );
            subscription.unsubscribe();
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_collection_subscription_receives_full_member_lists() {
    run_test(
        create_test_context,
        |ctx| {
            let db = ctx.db();
            let (listener, events) = recording_listener();
            let _subscription = db.subscribe_collection("rooms", listener)?;

            db.set("rooms/a", doc! { open: true }, false)?;
            db.set("rooms/b", doc! { open: false }, false)?;
            db.delete("rooms/a")?;

            wait_for_event(5000, || events.lock().unwrap().len() == 4);
            let member_ids: Vec<Vec<String>> = events
                .lock()
                .unwrap()
                .iter()
                .map(|event| ids(event.documents()))
                .collect();
            assert_eq!(
                member_ids,
                vec![
                    vec![],
                    vec!["a".to_string()],
                    vec!["a".to_string(), "b".to_string()],
                    vec!["b".to_string()],
                ]
            );
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_subcollection_changes_reach_ancestor_collections() {
    run_test(
        create_test_context,
        |ctx| {
            let db = ctx.db();
            db.set("users/alice", doc! { name: "Alice" }, false)?;
            let (users_listener, user_events) = recording_listener();
            let _users = db.subscribe_collection("users", users_listener)?;
            let (posts_listener, post_events) = recording_listener();
            let _posts = db.subscribe_collection("users/alice/posts", posts_listener)?;

            db.set("users/alice/posts/p1", doc! { title: "hi" }, false)?;
            db.set("users/bob", doc! { name: "Bob" }, false)?;

            wait_for_event(5000, || user_events.lock().unwrap().len() == 3);
            wait_for_event(5000, || post_events.lock().unwrap().len() == 2);

            let user_events = user_events.lock().unwrap();
            assert!(user_events.iter().all(|event| event.path() == "users"));
            // the post write leaves the member list of users unchanged
            assert_eq!(ids(user_events[1].documents()), vec!["alice"]);
            assert_eq!(ids(user_events[2].documents()), vec!["alice", "bob"]);

            let post_events = post_events.lock().unwrap();
            assert_eq!(ids(post_events[1].documents()), vec!["p1"]);
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_failing_subscriber_does_not_affect_others() {
    run_test(
        create_test_context,
        |ctx| {
            let db = ctx.db();
            let _failing = db.subscribe_document(
                "users/alice",
                ChangeListener::new(|_| Err(CinderError::new("boom", ErrorKind::SubscriptionError))),
            )?;
            let _panicking = db.subscribe_document(
                "users/alice",
                ChangeListener::new(|event: ChangeEvent| {
                    if event.document().is_some() {
                        panic!("subscriber panic");
                    }
                    Ok(())
                }),
            )?;
            let (listener, events) = recording_listener();
            let _healthy = db.subscribe_document("users/alice", listener)?;

            db.set("users/alice", doc! { v: 1 }, false)?;
            db.set("users/alice", doc! { v: 2 }, false)?;

            wait_for_event(5000, || events.lock().unwrap().len() == 3);
            assert_eq!(
                document_states(&events),
                vec![None, Some(doc! { v: 1 }), Some(doc! { v: 2 })]
            );
            assert_eq!(db.get("users/alice")?.unwrap(), doc! { v: 2 });
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_events_arrive_in_commit_order() {
    run_test(
        create_test_context,
        |ctx| {
            let db = ctx.db();
            let (listener, events) = recording_listener();
            let _subscription = db.subscribe_document("counters/c", listener)?;

            for i in 0..50 {
                db.set("counters/c", doc! { n: i }, false)?;
            }

            wait_for_event(5000, || events.lock().unwrap().len() == 51);
            let seen: Vec<i64> = document_states(&events)
                .into_iter()
                .skip(1)
                .map(|d| d.and_then(|d| d.get("n").and_then(|v| v.as_i64())).unwrap_or(-1))
                .collect();
            assert_eq!(seen, (0..50).collect::<Vec<i64>>());
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_unsubscribe_stops_delivery() {
    run_test(
        create_test_context,
        |ctx| {
            let db = ctx.db();
            let (listener, events) = recording_listener();
            let subscription = db.subscribe_document("users/alice", listener)?;
            wait_for_event(5000, || events.lock().unwrap().len() == 1);

            subscription.unsubscribe();
            subscription.unsubscribe();
            assert!(!subscription.is_active());

            db.set("users/alice", doc! { v: 1 }, false)?;
            std::thread::sleep(Duration::from_millis(100));
            assert_eq!(events.lock().unwrap().len(), 1);
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_change_stream() {
    run_test(
        create_test_context,
        |ctx| {
            let db = ctx.db();
            let stream = db.watch_collection("tasks")?;
            let timeout = Duration::from_secs(5);

            let initial = stream.recv_timeout(timeout).expect("initial snapshot");
            assert!(initial.documents().is_empty());

            db.set("tasks/t1", doc! { done: false }, false)?;
            let changed = stream.recv_timeout(timeout).expect("change event");
            assert_eq!(ids(changed.documents()), vec!["t1"]);

            stream.close();
            assert!(!stream.subscription().is_active());
            db.set("tasks/t2", doc! { done: true }, false)?;
            assert!(stream.recv_timeout(Duration::from_millis(200)).is_none());
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_close_cancels_subscriptions() {
    run_test(
        create_test_context,
        |ctx| {
            let db = ctx.db();
            let (listener, _events) = recording_listener();
            let subscription = db.subscribe_document("users/alice", listener)?;
            db.close()?;
            assert!(!subscription.is_active());

            let (listener, _) = recording_listener();
            let err = db.subscribe_document("users/alice", listener).unwrap_err();
            assert_eq!(err.kind(), &ErrorKind::StoreClosed);
            Ok(())
        },
        cleanup,
    )
}
