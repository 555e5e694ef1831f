//! Background thread driving the dispatch loop.

use std::sync::mpsc::{channel, Receiver, RecvTimeoutError, Sender};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use tracing::{info, warn};

use super::dispatch::{DispatchStats, Dispatcher};
use crate::broker::Broker;
use crate::error::OutboxError;
use crate::store::Store;

/// Handle to a running dispatch thread.
pub(crate) struct DispatchThread {
    stop_tx: Sender<()>,
    handle: Option<JoinHandle<DispatchStats>>,
}

impl DispatchThread {
    pub(crate) fn spawn<S, B>(
        dispatcher: Arc<Dispatcher<S, B>>,
        poll_interval: Duration,
    ) -> Result<Self, OutboxError>
    where
        S: Store + 'static,
        B: Broker + 'static,
    {
        let (stop_tx, stop_rx) = channel();

        let handle = thread::Builder::new()
            .name(dispatcher.worker_id().to_string())
            .spawn(move || run(&dispatcher, poll_interval, stop_rx))?;

        Ok(Self {
            stop_tx,
            handle: Some(handle),
        })
    }

    /// Signal the loop to stop and wait for the current tick to finish.
    pub(crate) fn stop(mut self) -> Result<DispatchStats, OutboxError> {
        let _ = self.stop_tx.send(());
        match self.handle.take() {
            Some(handle) => handle.join().map_err(|_| OutboxError::WorkerPanicked),
            None => Ok(DispatchStats::default()),
        }
    }
}

impl Drop for DispatchThread {
    fn drop(&mut self) {
        let _ = self.stop_tx.send(());
        // Don't join on drop - let the thread finish its tick naturally
    }
}

fn run<S, B>(
    dispatcher: &Dispatcher<S, B>,
    poll_interval: Duration,
    stop_rx: Receiver<()>,
) -> DispatchStats
where
    S: Store,
    B: Broker,
{
    let span = tracing::info_span!("outbox", worker_id = %dispatcher.worker_id());
    let _entered = span.enter();
    info!(
        poll_interval_ms = u64::try_from(poll_interval.as_millis()).unwrap_or(u64::MAX),
        "outbox dispatcher started"
    );

    let mut stats = DispatchStats::default();
    let mut next_tick = schedule(Instant::now(), poll_interval);

    loop {
        let signal = match next_tick {
            Some(at) => stop_rx.recv_timeout(at.saturating_duration_since(Instant::now())),
            None => stop_rx.recv().map_err(|_| RecvTimeoutError::Disconnected),
        };
        match signal {
            Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
            Err(RecvTimeoutError::Timeout) => {}
        }

        stats.record(dispatcher.tick());

        // Ticks missed while a slow cycle ran are dropped, not replayed.
        let now = Instant::now();
        next_tick = match next_tick.and_then(|at| schedule(at, poll_interval)) {
            Some(at) if at > now => Some(at),
            _ => schedule(now, poll_interval),
        };
    }

    info!(
        ticks = stats.ticks,
        messages_sent = stats.messages_sent,
        "outbox dispatcher stopped"
    );
    stats
}

/// The instant one interval after `from`, or `None` if the clock cannot
/// represent it. `None` means the loop only wakes for the stop signal.
fn schedule(from: Instant, poll_interval: Duration) -> Option<Instant> {
    let next = from.checked_add(poll_interval);
    if next.is_none() {
        warn!(
            poll_interval = ?poll_interval,
            "poll interval too large to schedule, waiting for stop"
        );
    }
    next
}
