use std::io;

use crate::message::MessageId;

/// Error type for the in-memory store.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    #[error("store lock poisoned during {0}")]
    LockPoisoned(&'static str),
    #[error("outbox message {0} not found")]
    NotFound(MessageId),
    #[error("store backend error: {0}")]
    Backend(String),
}

/// Error type for the bundled brokers.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BrokerError {
    #[error("broker lock poisoned during {0}")]
    LockPoisoned(&'static str),
    #[error("broker rejected message for subject {subject}: {reason}")]
    Rejected { subject: String, reason: String },
    #[error("broker unavailable: {0}")]
    Unavailable(String),
}

/// Invalid engine configuration.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid value for {key}: {reason}")]
    Invalid { key: &'static str, reason: String },
    #[error("{0} must be greater than zero")]
    Zero(&'static str),
    #[error("{key} must not exceed {max:?}")]
    TooLarge {
        key: &'static str,
        max: std::time::Duration,
    },
}

/// Errors returned by the engine's lifecycle operations.
#[derive(Debug, thiserror::Error)]
pub enum OutboxError {
    #[error("outbox dispatcher is already running")]
    AlreadyRunning,
    #[error("outbox dispatcher has been stopped and cannot be restarted")]
    Stopped,
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("outbox lock poisoned during {0}")]
    LockPoisoned(&'static str),
    #[error("outbox dispatch thread panicked")]
    WorkerPanicked,
    #[error("failed to spawn outbox dispatch thread: {0}")]
    Spawn(#[from] io::Error),
}
