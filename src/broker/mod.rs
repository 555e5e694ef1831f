//! Message brokers the outbox publishes to.
//!
//! ```text
//! ┌──────────────┐   publish(subject, payload)   ┌─────────────────────┐
//! │ Outbox loop  │ ─────────────────────────────▶ │ Broker              │
//! └──────────────┘                                │  InMemoryBroker     │
//!                                                 │  LogBroker          │
//!                                                 │  NATS, Kafka, ...   │
//!                                                 │  (external)         │
//!                                                 └─────────────────────┘
//! ```
//!
//! A successful publish only means the transport accepted the message. The
//! outbox delivers at least once, so consumers must tolerate duplicates.

mod broker;
mod in_memory;
mod log;

pub use broker::Broker;
pub use in_memory::{Delivery, InMemoryBroker};
pub use log::LogBroker;
