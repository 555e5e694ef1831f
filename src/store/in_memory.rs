use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, RwLock};
use std::time::{Duration, SystemTime};

use serde_json::Value;

use super::Store;
use crate::error::StoreError;
use crate::message::{Message, MessageId, NewMessage};

#[derive(Clone, Debug)]
struct Lease {
    worker_id: String,
    until: SystemTime,
}

impl Lease {
    fn blocks(&self, worker_id: &str, now: SystemTime) -> bool {
        self.worker_id != worker_id && self.until > now
    }
}

#[derive(Clone, Debug)]
struct StoredMessage {
    message: Message,
    lease: Option<Lease>,
}

#[derive(Debug, Default)]
struct Tables {
    outbox: BTreeMap<MessageId, StoredMessage>,
    rows: HashMap<String, Vec<Value>>,
    last_id: i64,
}

/// Writes staged against an [`InMemoryStore`].
///
/// Nothing is visible to readers until [`InMemoryStore::commit`]. Dropping an
/// uncommitted transaction discards everything staged on it.
#[derive(Debug, Default)]
pub struct InMemoryTx {
    messages: Vec<NewMessage>,
    rows: Vec<(String, Value)>,
}

impl InMemoryTx {
    /// Stage a business row in `table`.
    pub fn insert_row(&mut self, table: impl Into<String>, row: Value) {
        self.rows.push((table.into(), row));
    }

    /// Number of outbox messages staged so far.
    pub fn staged_messages(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty() && self.rows.is_empty()
    }
}

/// In-memory outbox store with transactions and lease-based claiming.
///
/// Cloning creates another handle to the same storage, so several engines
/// (or an engine and an HTTP handler) can share one store across threads.
#[derive(Clone, Debug, Default)]
pub struct InMemoryStore {
    tables: Arc<RwLock<Tables>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a new transaction.
    pub fn begin(&self) -> InMemoryTx {
        InMemoryTx::default()
    }

    /// Apply every staged row and message atomically.
    ///
    /// Returns the ids assigned to the committed outbox messages, in the order
    /// they were enlisted.
    pub fn commit(&self, tx: InMemoryTx) -> Result<Vec<MessageId>, StoreError> {
        let mut tables = self
            .tables
            .write()
            .map_err(|_| StoreError::LockPoisoned("commit"))?;
        let now = SystemTime::now();

        for (table, row) in tx.rows {
            tables.rows.entry(table).or_default().push(row);
        }

        let mut ids = Vec::with_capacity(tx.messages.len());
        for new in tx.messages {
            tables.last_id += 1;
            let id = MessageId(tables.last_id);
            tables.outbox.insert(
                id,
                StoredMessage {
                    message: Message {
                        id,
                        subject: new.subject,
                        payload: new.payload,
                        created_at: now,
                        sent_at: None,
                    },
                    lease: None,
                },
            );
            ids.push(id);
        }

        Ok(ids)
    }

    pub fn get(&self, id: MessageId) -> Result<Option<Message>, StoreError> {
        let tables = self
            .tables
            .read()
            .map_err(|_| StoreError::LockPoisoned("read"))?;
        Ok(tables.outbox.get(&id).map(|stored| stored.message.clone()))
    }

    /// All committed messages, ascending by id.
    pub fn messages(&self) -> Result<Vec<Message>, StoreError> {
        let tables = self
            .tables
            .read()
            .map_err(|_| StoreError::LockPoisoned("read"))?;
        Ok(tables
            .outbox
            .values()
            .map(|stored| stored.message.clone())
            .collect())
    }

    /// Committed messages that have not been marked sent, ascending by id.
    pub fn pending(&self) -> Result<Vec<Message>, StoreError> {
        Ok(self
            .messages()?
            .into_iter()
            .filter(Message::is_pending)
            .collect())
    }

    /// Committed business rows of `table`, in insertion order.
    pub fn rows(&self, table: &str) -> Result<Vec<Value>, StoreError> {
        let tables = self
            .tables
            .read()
            .map_err(|_| StoreError::LockPoisoned("read"))?;
        Ok(tables.rows.get(table).cloned().unwrap_or_default())
    }

    /// The worker currently holding a live lease on `id`, if any.
    pub fn lease_holder(&self, id: MessageId) -> Result<Option<String>, StoreError> {
        let tables = self
            .tables
            .read()
            .map_err(|_| StoreError::LockPoisoned("read"))?;
        let now = SystemTime::now();
        Ok(tables
            .outbox
            .get(&id)
            .and_then(|stored| stored.lease.as_ref())
            .filter(|lease| lease.until > now)
            .map(|lease| lease.worker_id.clone()))
    }
}

impl Store for InMemoryStore {
    type Tx = InMemoryTx;
    type Error = StoreError;

    fn enlist_insert(&self, tx: &mut InMemoryTx, message: NewMessage) -> Result<(), StoreError> {
        tx.messages.push(message);
        Ok(())
    }

    fn claim_pending(
        &self,
        worker_id: &str,
        limit: usize,
        lease: Duration,
    ) -> Result<Vec<Message>, StoreError> {
        let now = SystemTime::now();
        let until = now.checked_add(lease).ok_or_else(|| {
            StoreError::Backend(format!("lease of {:?} overflows the clock", lease))
        })?;

        let mut tables = self
            .tables
            .write()
            .map_err(|_| StoreError::LockPoisoned("claim"))?;

        let mut claimed = Vec::new();
        for stored in tables.outbox.values_mut() {
            if claimed.len() >= limit {
                break;
            }
            if stored.message.is_sent() {
                continue;
            }
            if let Some(existing) = &stored.lease {
                if existing.blocks(worker_id, now) {
                    continue;
                }
            }

            stored.lease = Some(Lease {
                worker_id: worker_id.to_string(),
                until,
            });
            claimed.push(stored.message.clone());
        }

        Ok(claimed)
    }

    fn mark_sent(&self, ids: &[MessageId]) -> Result<(), StoreError> {
        let mut tables = self
            .tables
            .write()
            .map_err(|_| StoreError::LockPoisoned("mark sent"))?;

        if let Some(missing) = ids.iter().find(|id| !tables.outbox.contains_key(*id)) {
            return Err(StoreError::NotFound(*missing));
        }

        let now = SystemTime::now();
        for id in ids {
            if let Some(stored) = tables.outbox.get_mut(id) {
                stored.message.sent_at.get_or_insert(now);
                stored.lease = None;
            }
        }

        Ok(())
    }
}
