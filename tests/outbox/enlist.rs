//! Enlisting messages on the caller's transaction.

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use outbox_relay::{InMemoryBroker, InMemoryStore, Outbox, StoreError};
use serde_json::json;

use crate::support::{engine, wait_until, RecordingBroker, RecordingStore, StoreCall};

#[test]
fn add_message_goes_through_the_store() {
    let store = RecordingStore::new();
    let outbox = engine(store.clone(), RecordingBroker::new(), "w1");

    let mut tx = store.inner().begin();
    outbox.add_message(&mut tx, "orders.created", "a").unwrap();
    outbox.add_message(&mut tx, "orders.paid", "b").unwrap();

    assert_eq!(
        store.calls(),
        vec![
            StoreCall::Enlist("orders.created".into()),
            StoreCall::Enlist("orders.paid".into()),
        ]
    );
    assert!(store.pending_ids().is_empty());

    store.inner().commit(tx).unwrap();

    let pending = store.inner().pending().unwrap();
    assert_eq!(pending.len(), 2);
    assert_eq!(pending[0].subject, "orders.created");
    assert_eq!(pending[0].payload, b"a".to_vec());
    assert_eq!(pending[1].subject, "orders.paid");
    assert!(pending.iter().all(|m| m.sent_at.is_none()));
}

#[test]
fn add_message_returns_store_error_unchanged() {
    let store = RecordingStore::new();
    store.reject_enlist(true);
    let outbox = engine(store.clone(), RecordingBroker::new(), "w1");

    let mut tx = store.inner().begin();
    let err = outbox.add_message(&mut tx, "orders.created", "a").unwrap_err();

    assert_eq!(err, StoreError::Backend("enlist rejected".into()));
    assert!(tx.is_empty());
}

#[test]
fn business_row_and_message_commit_together() {
    let store = InMemoryStore::new();
    let outbox = Outbox::new(store.clone(), InMemoryBroker::new(), Duration::from_secs(1));

    let mut tx = store.begin();
    tx.insert_row("orders", json!({ "name": "book", "total": 12 }));
    outbox
        .add_message(&mut tx, "orders.created", r#"{"name":"book"}"#)
        .unwrap();
    let ids = store.commit(tx).unwrap();

    assert_eq!(ids.len(), 1);
    assert_eq!(store.rows("orders").unwrap().len(), 1);
    assert_eq!(store.pending().unwrap()[0].id, ids[0]);
}

#[test]
fn rolled_back_transaction_leaves_nothing_behind() {
    let store = InMemoryStore::new();
    let outbox = Outbox::new(store.clone(), InMemoryBroker::new(), Duration::from_secs(1));

    let mut tx = store.begin();
    tx.insert_row("orders", json!({ "name": "book" }));
    outbox.add_message(&mut tx, "orders.created", "x").unwrap();
    drop(tx);

    assert!(store.rows("orders").unwrap().is_empty());
    assert!(store.messages().unwrap().is_empty());
    outbox.set_leader(true);
    assert_eq!(outbox.tick(), outbox_relay::CycleOutcome::Empty);
}

#[test]
fn empty_payload_and_subject_are_accepted() {
    let store = InMemoryStore::new();
    let broker = InMemoryBroker::new();
    let outbox = Outbox::new(store.clone(), broker.clone(), Duration::from_secs(1));

    let mut tx = store.begin();
    outbox.add_message(&mut tx, "", Vec::new()).unwrap();
    store.commit(tx).unwrap();

    outbox.set_leader(true);
    outbox.tick();

    let published = broker.published();
    assert_eq!(published.len(), 1);
    assert_eq!(published[0].subject, "");
    assert!(published[0].payload.is_empty());
}

#[test]
fn messages_added_while_dispatching_are_delivered() {
    let store = InMemoryStore::new();
    let broker = InMemoryBroker::new();
    let outbox = Arc::new(crate::support::engine(store.clone(), broker.clone(), "w1"));
    outbox.set_leader(true);
    outbox.start().unwrap();

    let writers: Vec<_> = (0..4)
        .map(|writer| {
            let outbox = Arc::clone(&outbox);
            let store = store.clone();
            thread::spawn(move || {
                for n in 0..25 {
                    let mut tx = store.begin();
                    outbox
                        .add_message(&mut tx, "load", format!("{}-{}", writer, n))
                        .unwrap();
                    store.commit(tx).unwrap();
                }
            })
        })
        .collect();
    for writer in writers {
        writer.join().unwrap();
    }

    assert!(wait_until(Duration::from_secs(5), || store
        .pending()
        .unwrap()
        .is_empty()));
    let stats = outbox.stop().unwrap();

    assert_eq!(stats.messages_sent, 100);
    assert_eq!(broker.len(), 100);
}
