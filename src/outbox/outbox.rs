use std::mem;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use super::dispatch::{CycleOutcome, DispatchStats, Dispatcher};
use super::thread::DispatchThread;
use crate::broker::Broker;
use crate::config::OutboxConfig;
use crate::error::OutboxError;
use crate::leader::LeaderFlag;
use crate::message::NewMessage;
use crate::store::Store;

enum Lifecycle {
    Idle,
    Running(DispatchThread),
    Stopped,
}

/// The transactional outbox engine.
///
/// `Outbox` does two independent things:
///
/// 1. [`add_message`](Outbox::add_message) enlists a message on the caller's
///    open transaction, so it commits or rolls back together with the
///    business write it describes.
/// 2. Once [`start`](Outbox::start)ed, a background thread wakes every poll
///    interval and, while this instance is the leader, claims a batch of
///    pending messages, publishes them in id order and marks them sent.
///
/// Delivery is at-least-once. A publish failure leaves the whole batch
/// pending (including messages that already went out), and a failed
/// mark-sent leaves everything pending after a successful publish. Consumers
/// must be idempotent.
///
/// ## Example
///
/// ```
/// use std::time::Duration;
/// use outbox_relay::{InMemoryBroker, InMemoryStore, Outbox};
///
/// let store = InMemoryStore::new();
/// let broker = InMemoryBroker::new();
/// let outbox = Outbox::new(store.clone(), broker.clone(), Duration::from_millis(10));
///
/// let mut tx = store.begin();
/// tx.insert_row("orders", serde_json::json!({ "name": "book" }));
/// outbox.add_message(&mut tx, "orders.created", b"{\"name\":\"book\"}".to_vec()).unwrap();
/// store.commit(tx).unwrap();
///
/// outbox.set_leader(true);
/// outbox.start().unwrap();
/// std::thread::sleep(Duration::from_millis(100));
/// let stats = outbox.stop().unwrap();
///
/// assert_eq!(stats.messages_sent, 1);
/// assert_eq!(broker.subjects(), vec!["orders.created".to_string()]);
/// ```
pub struct Outbox<S, B> {
    dispatcher: Arc<Dispatcher<S, B>>,
    config: OutboxConfig,
    lifecycle: Mutex<Lifecycle>,
}

impl<S, B> Outbox<S, B> {
    /// Create an engine with default batch size, lease and worker id.
    pub fn new(store: S, broker: B, poll_interval: Duration) -> Self {
        Self::from_config(store, broker, OutboxConfig::new(poll_interval))
    }

    pub fn from_config(store: S, broker: B, config: OutboxConfig) -> Self {
        let dispatcher = Dispatcher::new(
            store,
            broker,
            LeaderFlag::default(),
            config.worker_id.clone(),
            config.batch_size,
            config.lease,
        );
        Outbox {
            dispatcher: Arc::new(dispatcher),
            config,
            lifecycle: Mutex::new(Lifecycle::Idle),
        }
    }

    /// Allow or forbid this instance to dispatch.
    ///
    /// Callers must make sure at most one instance is leader at a time, or
    /// accept that messages may be published twice.
    pub fn set_leader(&self, is_leader: bool) {
        self.dispatcher.leader().set(is_leader);
    }

    pub fn is_leader(&self) -> bool {
        self.dispatcher.leader().get()
    }

    /// Shared handle to the leader gate, for an external election task.
    pub fn leader_flag(&self) -> LeaderFlag {
        self.dispatcher.leader().clone()
    }

    pub fn worker_id(&self) -> &str {
        self.dispatcher.worker_id()
    }

    pub fn poll_interval(&self) -> Duration {
        self.config.poll_interval
    }

    pub fn config(&self) -> &OutboxConfig {
        &self.config
    }

    pub fn store(&self) -> &S {
        self.dispatcher.store()
    }

    pub fn broker(&self) -> &B {
        self.dispatcher.broker()
    }

    /// Whether the background dispatch thread is running.
    pub fn is_running(&self) -> bool {
        self.lifecycle
            .lock()
            .map(|state| matches!(*state, Lifecycle::Running(_)))
            .unwrap_or(false)
    }
}

impl<S: Store, B: Broker> Outbox<S, B> {
    /// Enlist a message on the caller's transaction.
    ///
    /// The store's error is returned unchanged; the caller is expected to roll
    /// back. Nothing becomes visible to the dispatcher until the caller
    /// commits.
    pub fn add_message(
        &self,
        tx: &mut S::Tx,
        subject: impl Into<String>,
        payload: impl Into<Vec<u8>>,
    ) -> Result<(), S::Error> {
        self.enlist(tx, NewMessage::new(subject, payload))
    }

    /// Enlist an already built message on the caller's transaction.
    pub fn enlist(&self, tx: &mut S::Tx, message: NewMessage) -> Result<(), S::Error> {
        self.dispatcher.store().enlist_insert(tx, message)
    }

    /// Run one tick on the calling thread: a full cycle if this instance is
    /// the leader, nothing otherwise.
    pub fn tick(&self) -> CycleOutcome {
        self.dispatcher.tick()
    }

    /// Run one cycle on the calling thread regardless of leadership.
    pub fn dispatch_once(&self) -> CycleOutcome {
        self.dispatcher.run_cycle()
    }
}

impl<S, B> Outbox<S, B>
where
    S: Store + 'static,
    B: Broker + 'static,
{
    /// Spawn the background dispatch loop.
    ///
    /// Fails with [`OutboxError::AlreadyRunning`] if the loop is running, with
    /// [`OutboxError::Stopped`] once the engine has been stopped, and with
    /// [`OutboxError::Config`] if the configuration does not validate.
    pub fn start(&self) -> Result<(), OutboxError> {
        let mut state = self
            .lifecycle
            .lock()
            .map_err(|_| OutboxError::LockPoisoned("start"))?;

        match *state {
            Lifecycle::Idle => {}
            Lifecycle::Running(_) => return Err(OutboxError::AlreadyRunning),
            Lifecycle::Stopped => return Err(OutboxError::Stopped),
        }

        self.config.validate()?;

        let thread =
            DispatchThread::spawn(Arc::clone(&self.dispatcher), self.config.poll_interval)?;
        *state = Lifecycle::Running(thread);
        Ok(())
    }

    /// Stop the background loop.
    ///
    /// Waits for an in-progress cycle (including its mark-sent call) to
    /// finish, then returns the loop's counters. Stopping an engine that never
    /// started, or stopping twice, returns empty stats.
    pub fn stop(&self) -> Result<DispatchStats, OutboxError> {
        let previous = {
            let mut state = self
                .lifecycle
                .lock()
                .map_err(|_| OutboxError::LockPoisoned("stop"))?;
            mem::replace(&mut *state, Lifecycle::Stopped)
        };

        match previous {
            Lifecycle::Running(thread) => thread.stop(),
            Lifecycle::Idle | Lifecycle::Stopped => Ok(DispatchStats::default()),
        }
    }
}
