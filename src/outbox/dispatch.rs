use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use tracing::{debug, error, info, warn};

use crate::broker::Broker;
use crate::leader::LeaderFlag;
use crate::message::MessageId;
use crate::store::Store;

/// Result of a single dispatch tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleOutcome {
    /// This instance is not the leader; nothing was touched.
    Skipped,
    /// The claim returned no pending messages.
    Empty,
    /// Every claimed message was published and marked sent.
    Delivered { count: usize },
    /// The store could not claim a batch.
    ClaimFailed,
    /// Publishing `message_id` failed after `published` earlier messages of
    /// the batch went out. The whole batch stays pending.
    PublishFailed {
        message_id: MessageId,
        published: usize,
    },
    /// All `count` messages were published but could not be marked sent. They
    /// stay pending and will be published again.
    MarkSentFailed { count: usize },
}

impl CycleOutcome {
    /// Whether the cycle reached the store at all.
    pub fn did_work(&self) -> bool {
        !matches!(self, CycleOutcome::Skipped)
    }
}

/// Counters accumulated by the dispatch loop.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct DispatchStats {
    pub ticks: usize,
    pub cycles: usize,
    pub messages_sent: usize,
    pub claim_failures: usize,
    pub publish_failures: usize,
    pub mark_failures: usize,
}

impl DispatchStats {
    pub fn record(&mut self, outcome: CycleOutcome) {
        self.ticks += 1;
        if outcome.did_work() {
            self.cycles += 1;
        }
        match outcome {
            CycleOutcome::Delivered { count } => self.messages_sent += count,
            CycleOutcome::ClaimFailed => self.claim_failures += 1,
            CycleOutcome::PublishFailed { .. } => self.publish_failures += 1,
            CycleOutcome::MarkSentFailed { .. } => self.mark_failures += 1,
            CycleOutcome::Skipped | CycleOutcome::Empty => {}
        }
    }
}

/// Claims, publishes and marks one batch at a time.
pub(crate) struct Dispatcher<S, B> {
    store: S,
    broker: B,
    leader: LeaderFlag,
    worker_id: String,
    batch_size: usize,
    lease: Duration,
    in_flight: Mutex<()>,
}

impl<S, B> Dispatcher<S, B> {
    pub(crate) fn new(
        store: S,
        broker: B,
        leader: LeaderFlag,
        worker_id: String,
        batch_size: usize,
        lease: Duration,
    ) -> Self {
        Dispatcher {
            store,
            broker,
            leader,
            worker_id,
            batch_size,
            lease,
            in_flight: Mutex::new(()),
        }
    }

    pub(crate) fn store(&self) -> &S {
        &self.store
    }

    pub(crate) fn broker(&self) -> &B {
        &self.broker
    }

    pub(crate) fn leader(&self) -> &LeaderFlag {
        &self.leader
    }

    pub(crate) fn worker_id(&self) -> &str {
        &self.worker_id
    }
}

impl<S: Store, B: Broker> Dispatcher<S, B> {
    /// Run a cycle if this instance currently holds leadership.
    pub(crate) fn tick(&self) -> CycleOutcome {
        if !self.leader.get() {
            return CycleOutcome::Skipped;
        }
        self.run_cycle()
    }

    /// Claim a batch, publish it in order and mark it sent.
    ///
    /// Never runs concurrently with another cycle of the same dispatcher.
    pub(crate) fn run_cycle(&self) -> CycleOutcome {
        // Guards no data, so poisoning is ignored.
        let _in_flight = self.in_flight.lock().unwrap_or_else(PoisonError::into_inner);

        let messages = match self
            .store
            .claim_pending(&self.worker_id, self.batch_size, self.lease)
        {
            Ok(messages) => messages,
            Err(err) => {
                warn!(worker_id = %self.worker_id, error = %err, "failed to claim outbox messages");
                return CycleOutcome::ClaimFailed;
            }
        };

        if messages.is_empty() {
            debug!(worker_id = %self.worker_id, "no pending outbox messages");
            return CycleOutcome::Empty;
        }

        let mut ids = Vec::with_capacity(messages.len());
        for message in &messages {
            if let Err(err) = self.broker.publish(&message.subject, &message.payload) {
                warn!(
                    worker_id = %self.worker_id,
                    message_id = %message.id,
                    subject = %message.subject,
                    published = ids.len(),
                    error = %err,
                    "failed to publish outbox message, batch left pending"
                );
                return CycleOutcome::PublishFailed {
                    message_id: message.id,
                    published: ids.len(),
                };
            }
            ids.push(message.id);
        }

        if let Err(err) = self.store.mark_sent(&ids) {
            error!(
                worker_id = %self.worker_id,
                count = ids.len(),
                error = %err,
                "failed to mark outbox messages sent, batch will be redelivered"
            );
            return CycleOutcome::MarkSentFailed { count: ids.len() };
        }

        info!(worker_id = %self.worker_id, count = ids.len(), "processed outbox messages");
        CycleOutcome::Delivered { count: ids.len() }
    }
}
