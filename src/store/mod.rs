//! Outbox storage.
//!
//! The [`Store`] trait is the seam between the engine and whatever database
//! holds the outbox table. [`InMemoryStore`] is a transactional, lease-claiming
//! implementation for tests and single-process services; production adapters
//! (Postgres, MySQL, ...) live outside this crate.
//!
//! ## Claiming
//!
//! `claim_pending` hands out leases rather than relying on a database row
//! lock that may be released before the batch is published. A row is
//! claimable when it is unsent and either unleased, leased by the same
//! worker, or its lease has expired. In SQL this is typically:
//!
//! ```text
//! UPDATE outbox SET claimed_by = $1, claimed_until = now() + $3
//!  WHERE id IN (SELECT id FROM outbox
//!                WHERE sent_at IS NULL
//!                  AND (claimed_until IS NULL OR claimed_until <= now() OR claimed_by = $1)
//!                ORDER BY id LIMIT $2
//!                FOR UPDATE SKIP LOCKED)
//! RETURNING id, subject, data, created_at, sent_at
//! ```

mod in_memory;
mod store;

pub use in_memory::{InMemoryStore, InMemoryTx};
pub use store::Store;
