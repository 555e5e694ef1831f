//! Transactional outbox.
//!
//! Record "events to publish" in the same storage transaction as the
//! business write that caused them, then relay them to a message broker in
//! the background with at-least-once delivery.
//!
//! - [`Outbox`] - the engine: enlistment plus the dispatch loop
//! - [`Store`] / [`Broker`] - the collaborator seams
//! - [`InMemoryStore`], [`InMemoryBroker`], [`LogBroker`] - bundled adapters
//! - [`LeaderFlag`] - the externally driven dispatch gate

pub mod broker;
mod config;
mod error;
mod leader;
mod message;
mod outbox;
pub mod store;

#[cfg(feature = "http")]
pub mod http;

pub use broker::{Broker, Delivery, InMemoryBroker, LogBroker};
pub use config::{
    OutboxConfig, DEFAULT_BATCH_SIZE, DEFAULT_LEASE, DEFAULT_POLL_INTERVAL, MAX_DURATION,
};
pub use error::{BrokerError, ConfigError, OutboxError, StoreError};
pub use leader::LeaderFlag;
pub use message::{Message, MessageId, NewMessage};
pub use outbox::{CycleOutcome, DispatchStats, Outbox};
pub use store::{InMemoryStore, InMemoryTx, Store};
