use std::sync::{Arc, Mutex};

use super::Broker;
use crate::error::BrokerError;

/// A broker that logs each message instead of sending it anywhere.
///
/// With a buffer attached, lines are appended to it instead of being logged,
/// which makes it usable as a test double.
#[derive(Clone, Default)]
pub struct LogBroker {
    buffer: Option<Arc<Mutex<Vec<String>>>>,
}

impl LogBroker {
    pub fn new() -> Self {
        LogBroker { buffer: None }
    }

    pub fn with_buffer(buffer: Arc<Mutex<Vec<String>>>) -> Self {
        LogBroker {
            buffer: Some(buffer),
        }
    }
}

impl Broker for LogBroker {
    type Error = BrokerError;

    fn publish(&self, subject: &str, payload: &[u8]) -> Result<(), BrokerError> {
        let payload = String::from_utf8_lossy(payload);
        match &self.buffer {
            Some(buffer) => {
                let mut buffer = buffer
                    .lock()
                    .map_err(|_| BrokerError::LockPoisoned("log buffer"))?;
                buffer.push(format!("[OUTBOX] {} {}", subject, payload));
            }
            None => tracing::info!(subject, payload = %payload, "outbox message published"),
        }
        Ok(())
    }
}
