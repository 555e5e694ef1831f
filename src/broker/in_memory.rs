//! In-memory broker for tests and single-process setups.

use std::collections::HashMap;
use std::sync::mpsc::{channel, Receiver, Sender};
use std::sync::{Arc, Mutex, RwLock};

use super::Broker;
use crate::error::BrokerError;

/// A message accepted by an [`InMemoryBroker`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Delivery {
    pub subject: String,
    pub payload: Vec<u8>,
}

impl Delivery {
    pub fn payload_str(&self) -> Option<&str> {
        std::str::from_utf8(&self.payload).ok()
    }
}

/// Records every publish and fans it out to per-subject subscribers.
///
/// Cloning shares the log and the subscriber list.
///
/// ```
/// use outbox_relay::broker::{Broker, InMemoryBroker};
///
/// let broker = InMemoryBroker::new();
/// let orders = broker.subscribe("orders.created");
///
/// broker.publish("orders.created", b"{\"id\":1}").unwrap();
///
/// assert_eq!(orders.recv().unwrap().payload_str(), Some("{\"id\":1}"));
/// assert_eq!(broker.subjects(), vec!["orders.created".to_string()]);
/// ```
#[derive(Clone, Default)]
pub struct InMemoryBroker {
    log: Arc<RwLock<Vec<Delivery>>>,
    subscribers: Arc<Mutex<HashMap<String, Vec<Sender<Delivery>>>>>,
}

impl InMemoryBroker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Receive every message published to `subject` from now on.
    pub fn subscribe(&self, subject: impl Into<String>) -> Receiver<Delivery> {
        let (tx, rx) = channel();
        let mut subscribers = self
            .subscribers
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        subscribers.entry(subject.into()).or_default().push(tx);
        rx
    }

    /// Everything published so far, in publish order.
    pub fn published(&self) -> Vec<Delivery> {
        self.log
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    /// Subjects of everything published so far, in publish order.
    pub fn subjects(&self) -> Vec<String> {
        self.published().into_iter().map(|d| d.subject).collect()
    }

    pub fn len(&self) -> usize {
        self.log
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Broker for InMemoryBroker {
    type Error = BrokerError;

    fn publish(&self, subject: &str, payload: &[u8]) -> Result<(), BrokerError> {
        let delivery = Delivery {
            subject: subject.to_string(),
            payload: payload.to_vec(),
        };

        self.log
            .write()
            .map_err(|_| BrokerError::LockPoisoned("publish"))?
            .push(delivery.clone());

        let mut subscribers = self
            .subscribers
            .lock()
            .map_err(|_| BrokerError::LockPoisoned("fan out"))?;
        if let Some(listeners) = subscribers.get_mut(subject) {
            // Drop subscribers whose receiver has gone away.
            listeners.retain(|listener| listener.send(delivery.clone()).is_ok());
        }

        Ok(())
    }
}
