use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Shared "may this instance dispatch?" gate.
///
/// The flag carries no election logic of its own. Whatever decides
/// leadership (a lease in the database, a distributed lock, a CLI flag) holds
/// a clone and pushes the current answer with [`LeaderFlag::set`]; the
/// dispatcher reads it once per tick.
#[derive(Clone, Debug, Default)]
pub struct LeaderFlag {
    inner: Arc<AtomicBool>,
}

impl LeaderFlag {
    pub fn new(is_leader: bool) -> Self {
        LeaderFlag {
            inner: Arc::new(AtomicBool::new(is_leader)),
        }
    }

    pub fn set(&self, is_leader: bool) {
        self.inner.store(is_leader, Ordering::Release);
    }

    pub fn get(&self) -> bool {
        self.inner.load(Ordering::Acquire)
    }
}
