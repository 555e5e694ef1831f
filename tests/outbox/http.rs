//! HTTP order service tests.
//!
//! Starts an axum server on an ephemeral port and exercises it with reqwest.

use std::sync::Arc;
use std::time::Duration;

use outbox_relay::http::{self, OrderCreated, OrderOutbox, ORDER_CREATED_SUBJECT, ORDERS_TABLE};
use outbox_relay::{InMemoryBroker, InMemoryStore, Outbox};
use serde_json::json;

use crate::support::POLL;

fn order_outbox() -> OrderOutbox<InMemoryBroker> {
    Arc::new(Outbox::new(InMemoryStore::new(), InMemoryBroker::new(), POLL))
}

/// Bind to port 0 and return the base url.
async fn start_server(outbox: OrderOutbox<InMemoryBroker>) -> String {
    let app = http::router(outbox);
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}")
}

#[tokio::test]
async fn health_reports_leader_and_running() {
    let outbox = order_outbox();
    outbox.set_leader(true);
    let base = start_server(outbox.clone()).await;
    let client = reqwest::Client::new();

    let resp = client.get(format!("{base}/health")).send().await.unwrap();
    assert_eq!(resp.status(), 200);

    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body, json!({ "ok": true, "leader": true, "running": false }));
}

#[tokio::test]
async fn create_order_commits_row_and_message() {
    let outbox = order_outbox();
    let base = start_server(outbox.clone()).await;
    let client = reqwest::Client::new();

    let resp = client
        .post(format!("{base}/orders"))
        .json(&json!({ "name": "book", "total": 12 }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 201);

    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body, json!({ "status": "created", "message_ids": [1] }));

    let store = outbox.store();
    assert_eq!(
        store.rows(ORDERS_TABLE).unwrap(),
        vec![json!({ "name": "book", "total": 12 })]
    );

    let resp = client
        .get(format!("{base}/outbox/pending"))
        .send()
        .await
        .unwrap();
    let pending: serde_json::Value = resp.json().await.unwrap();
    let pending = pending.as_array().unwrap();
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0]["id"], 1);
    assert_eq!(pending[0]["subject"], ORDER_CREATED_SUBJECT);
}

#[tokio::test]
async fn malformed_order_is_rejected_without_side_effects() {
    let outbox = order_outbox();
    let base = start_server(outbox.clone()).await;
    let client = reqwest::Client::new();

    let resp = client
        .post(format!("{base}/orders"))
        .header("content-type", "application/json")
        .body("{not json")
        .send()
        .await
        .unwrap();
    assert!(resp.status().is_client_error());

    assert!(outbox.store().rows(ORDERS_TABLE).unwrap().is_empty());
    assert!(outbox.store().messages().unwrap().is_empty());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn leader_delivers_created_order_to_subscribers() {
    let outbox = order_outbox();
    let deliveries = outbox.broker().subscribe(ORDER_CREATED_SUBJECT);
    outbox.set_leader(true);
    outbox.start().unwrap();
    let base = start_server(outbox.clone()).await;
    let client = reqwest::Client::new();

    let resp = client
        .post(format!("{base}/orders"))
        .json(&json!({ "name": "lamp", "total": 40 }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 201);

    let delivery = tokio::task::spawn_blocking(move || {
        deliveries.recv_timeout(Duration::from_secs(2))
    })
    .await
    .unwrap()
    .unwrap();

    let event: OrderCreated = serde_json::from_slice(&delivery.payload).unwrap();
    assert_eq!(event.event_type, "order_created");
    assert_eq!(event.order.name, "lamp");
    assert_eq!(event.order.total, 40);

    let stopper = outbox.clone();
    let stats = tokio::task::spawn_blocking(move || stopper.stop())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stats.messages_sent, 1);
    assert!(outbox.store().pending().unwrap().is_empty());
}
