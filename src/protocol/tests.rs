// test-only module included via protocol/mod.rs
#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use crate::core::connection::test_support::loopback_pair;
use crate::protocol::{Event, EventHub};

#[test]
fn test_handlers_run_in_registration_order() {
    let hub: EventHub<u32> = EventHub::new();
    let seen = Arc::new(Mutex::new(Vec::new()));

    for tag in ["first", "second", "third"] {
        let seen = Arc::clone(&seen);
        hub.subscribe(move |v: &u32| seen.lock().unwrap().push((tag, *v)));
    }

    assert_eq!(hub.emit(&7), 3);
    assert_eq!(
        *seen.lock().unwrap(),
        vec![("first", 7), ("second", 7), ("third", 7)]
    );
}

#[test]
fn test_unsubscribe_by_token_detaches_exactly_that_handler() {
    let hub: EventHub<()> = EventHub::new();
    let a = Arc::new(AtomicUsize::new(0));
    let b = Arc::new(AtomicUsize::new(0));

    let a2 = Arc::clone(&a);
    let sub_a = hub.subscribe(move |_| {
        a2.fetch_add(1, Ordering::SeqCst);
    });
    let b2 = Arc::clone(&b);
    hub.subscribe(move |_| {
        b2.fetch_add(1, Ordering::SeqCst);
    });

    hub.emit(&());
    assert!(hub.unsubscribe(sub_a));
    hub.emit(&());

    assert_eq!(a.load(Ordering::SeqCst), 1);
    assert_eq!(b.load(Ordering::SeqCst), 2);
    assert_eq!(hub.subscriber_count(), 1);
}

#[test]
fn test_unsubscribe_twice_reports_unknown_token() {
    let hub: EventHub<()> = EventHub::new();
    let id = hub.subscribe(|_| {});
    assert!(hub.unsubscribe(id));
    assert!(!hub.unsubscribe(id));
}

#[test]
fn test_identical_closures_get_distinct_tokens() {
    // Two registrations of the same-looking closure must stay independently removable
    let hub: EventHub<()> = EventHub::new();
    let first = hub.subscribe(|_| {});
    let second = hub.subscribe(|_| {});
    assert_ne!(first, second);

    assert!(hub.unsubscribe(first));
    assert_eq!(hub.subscriber_count(), 1);
}

#[test]
fn test_handler_may_unsubscribe_itself_during_emit() {
    let hub: Arc<EventHub<()>> = Arc::new(EventHub::new());
    let slot: Arc<Mutex<Option<crate::protocol::SubscriptionId>>> = Arc::new(Mutex::new(None));

    let hub2 = Arc::clone(&hub);
    let slot2 = Arc::clone(&slot);
    let id = hub.subscribe(move |_| {
        if let Some(id) = slot2.lock().unwrap().take() {
            hub2.unsubscribe(id);
        }
    });
    *slot.lock().unwrap() = Some(id);

    assert_eq!(hub.emit(&()), 1);
    assert_eq!(hub.emit(&()), 0);
}

#[tokio::test]
async fn test_event_accessors() {
    let (conn, _peer) = loopback_pair().await;
    let event = Event::Connected(Arc::clone(&conn));
    assert_eq!(event.connection_id(), conn.id());
    assert_eq!(event.name(), "CONNECTED");

    let fault = Event::SendFault {
        connection: conn.clone(),
        kind: std::io::ErrorKind::BrokenPipe,
        message: "broken pipe".into(),
    };
    assert!(Arc::ptr_eq(fault.connection(), &conn));
    assert_eq!(fault.name(), "SEND_FAULT");
}
