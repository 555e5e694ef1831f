//! Several engines sharing one store.

use std::thread;
use std::time::Duration;

use outbox_relay::{
    CycleOutcome, InMemoryBroker, InMemoryStore, MessageId, NewMessage, Outbox, OutboxConfig,
    Store,
};

use crate::support::{wait_until, RecordingBroker, RecordingStore, POLL};

fn worker<B>(
    store: &InMemoryStore,
    broker: B,
    id: &str,
    lease: Duration,
) -> Outbox<InMemoryStore, B> {
    let outbox = Outbox::from_config(
        store.clone(),
        broker,
        OutboxConfig::new(POLL).with_worker_id(id).with_lease(lease),
    );
    outbox.set_leader(true);
    outbox
}

#[test]
fn concurrent_leaders_never_publish_the_same_message() {
    let seeded = RecordingStore::new();
    let payloads: Vec<String> = (1..=50).map(|n| n.to_string()).collect();
    let refs: Vec<&str> = payloads.iter().map(String::as_str).collect();
    seeded.seed(&refs);
    let store = seeded.inner().clone();

    let broker_a = InMemoryBroker::new();
    let broker_b = InMemoryBroker::new();
    let a = worker(&store, broker_a.clone(), "a", Duration::from_secs(60));
    let b = worker(&store, broker_b.clone(), "b", Duration::from_secs(60));
    a.start().unwrap();
    b.start().unwrap();

    assert!(wait_until(Duration::from_secs(5), || store
        .pending()
        .unwrap()
        .is_empty()));
    a.stop().unwrap();
    b.stop().unwrap();

    assert_eq!(broker_a.len() + broker_b.len(), 50);
}

#[test]
fn abandoned_batch_is_taken_over_after_lease_expires() {
    let store = InMemoryStore::new();
    let mut tx = store.begin();
    for payload in ["1", "2"] {
        store
            .enlist_insert(&mut tx, NewMessage::new("handover", payload))
            .unwrap();
    }
    store.commit(tx).unwrap();

    let failing = RecordingBroker::new();
    failing.fail_on("2");
    let old_leader = worker(&store, failing.clone(), "old", Duration::from_millis(50));
    let new_broker = InMemoryBroker::new();
    let new_leader = worker(&store, new_broker.clone(), "new", Duration::from_millis(50));

    assert!(matches!(old_leader.tick(), CycleOutcome::PublishFailed { .. }));
    assert_eq!(
        store.lease_holder(MessageId(1)).unwrap().as_deref(),
        Some("old")
    );
    old_leader.set_leader(false);

    assert_eq!(new_leader.tick(), CycleOutcome::Empty);

    thread::sleep(Duration::from_millis(80));

    assert_eq!(new_leader.tick(), CycleOutcome::Delivered { count: 2 });
    assert_eq!(new_broker.len(), 2);
    assert_eq!(failing.attempts(), vec!["1", "2"]);
    assert!(store.pending().unwrap().is_empty());
}
