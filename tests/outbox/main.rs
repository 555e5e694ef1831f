//! Outbox integration tests.

mod enlist;
mod handover;

#[cfg(feature = "http")]
mod http;
