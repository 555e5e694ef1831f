//! Outbox engine - enlists messages and relays them to a broker.
//!
//! The outbox pattern has two distinct phases:
//! 1. **Enlist phase** - `Outbox::add_message` stages a message on the same
//!    transaction as the business write
//! 2. **Dispatch phase** - a background thread claims pending messages,
//!    publishes them and marks them sent
//!
//! ```text
//!   caller tx ──add_message──▶ Store ◀──claim / mark_sent── dispatch thread
//!                                                               │
//!                                                            publish
//!                                                               ▼
//!                                                            Broker
//! ```

mod dispatch;
mod outbox;
mod thread;

pub use dispatch::{CycleOutcome, DispatchStats};
pub use outbox::Outbox;
