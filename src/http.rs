//! HTTP front for an order service that writes through the outbox.
//!
//! Requires the `http` feature. Uses axum for routing.
//!
//! ## Routes
//!
//! - `POST /orders`: insert an order and enlist an `orders.created` message
//!   in the same transaction.
//! - `GET /outbox/pending`: messages not yet marked sent.
//! - `GET /health`: `{ "ok": true, "leader": .., "running": .. }`.
//!
//! ## Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use std::time::Duration;
//! use outbox_relay::{http, InMemoryStore, LogBroker, Outbox};
//!
//! let outbox = Arc::new(Outbox::new(InMemoryStore::new(), LogBroker::new(), Duration::from_secs(10)));
//! outbox.set_leader(true);
//! outbox.start()?;
//!
//! http::serve(outbox, "0.0.0.0:8080").await?;
//! ```

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::broker::Broker;
use crate::error::StoreError;
use crate::message::NewMessage;
use crate::outbox::Outbox;
use crate::store::InMemoryStore;

pub const ORDERS_TABLE: &str = "orders";
pub const ORDER_CREATED_SUBJECT: &str = "orders.created";

/// Shared engine handle used as router state.
pub type OrderOutbox<B> = Arc<Outbox<InMemoryStore, B>>;

/// Request body for `POST /orders`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateOrder {
    pub name: String,
    pub total: i64,
}

/// Payload published on `orders.created`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderCreated {
    pub event_type: String,
    pub order: CreateOrder,
}

impl OrderCreated {
    pub fn new(order: CreateOrder) -> Self {
        OrderCreated {
            event_type: "order_created".to_string(),
            order,
        }
    }
}

#[derive(Debug, thiserror::Error)]
enum ApiError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("failed to encode event: {0}")]
    Encode(#[from] serde_json::Error),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        tracing::error!(error = %self, "order request failed");
        let body = json!({ "error": self.to_string() });
        (StatusCode::INTERNAL_SERVER_ERROR, Json(body)).into_response()
    }
}

/// Build an axum `Router` for the order service.
pub fn router<B: Broker + 'static>(outbox: OrderOutbox<B>) -> Router {
    Router::new()
        .route("/health", get(health_handler::<B>))
        .route("/orders", post(create_order_handler::<B>))
        .route("/outbox/pending", get(pending_handler::<B>))
        .with_state(outbox)
}

/// Serve the order service over HTTP at the given address (e.g. `"0.0.0.0:8080"`).
pub async fn serve<B: Broker + 'static>(
    outbox: OrderOutbox<B>,
    addr: &str,
) -> Result<(), std::io::Error> {
    let app = router(outbox);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await
}

/// `GET /health`: leader and dispatcher state.
async fn health_handler<B: Broker + 'static>(
    State(outbox): State<OrderOutbox<B>>,
) -> impl IntoResponse {
    Json(json!({
        "ok": true,
        "leader": outbox.is_leader(),
        "running": outbox.is_running(),
    }))
}

/// `POST /orders`: order row and outbox message commit together or not at all.
async fn create_order_handler<B: Broker + 'static>(
    State(outbox): State<OrderOutbox<B>>,
    Json(order): Json<CreateOrder>,
) -> Result<Response, ApiError> {
    let store = outbox.store();
    let mut tx = store.begin();

    tx.insert_row(ORDERS_TABLE, serde_json::to_value(&order)?);
    let event = NewMessage::json(ORDER_CREATED_SUBJECT, &OrderCreated::new(order))?;
    outbox.enlist(&mut tx, event)?;

    let message_ids = store.commit(tx)?;
    tracing::info!(?message_ids, "order created");

    let body = json!({ "status": "created", "message_ids": message_ids });
    Ok((StatusCode::CREATED, Json(body)).into_response())
}

/// `GET /outbox/pending`: pending messages, oldest first.
async fn pending_handler<B: Broker + 'static>(
    State(outbox): State<OrderOutbox<B>>,
) -> Result<Response, ApiError> {
    let pending = outbox.store().pending()?;
    Ok(Json(pending).into_response())
}
