use std::time::Duration;

use crate::message::{Message, MessageId, NewMessage};

/// Durable storage for outbox messages.
///
/// Implementations share one transaction type with the business writes they
/// sit next to: `enlist_insert` must stage the row on the caller's
/// transaction and never commit on its own, so the message and the business
/// change become visible together or not at all.
pub trait Store: Send + Sync {
    /// Caller-owned transaction handle.
    type Tx;
    type Error: std::error::Error + Send + Sync + 'static;

    /// Stage a pending message on the caller's open transaction.
    fn enlist_insert(&self, tx: &mut Self::Tx, message: NewMessage) -> Result<(), Self::Error>;

    /// Claim up to `limit` pending messages for `worker_id`, ordered by
    /// ascending id.
    ///
    /// Messages returned here are leased to `worker_id` until `lease` has
    /// elapsed. Other workers must not receive them while the lease is live;
    /// `worker_id` itself may receive them again.
    fn claim_pending(
        &self,
        worker_id: &str,
        limit: usize,
        lease: Duration,
    ) -> Result<Vec<Message>, Self::Error>;

    /// Set `sent_at` on exactly the given messages.
    ///
    /// The engine treats any error as "nothing was marked".
    fn mark_sent(&self, ids: &[MessageId]) -> Result<(), Self::Error>;
}

impl<S: Store + ?Sized> Store for std::sync::Arc<S> {
    type Tx = S::Tx;
    type Error = S::Error;

    fn enlist_insert(&self, tx: &mut Self::Tx, message: NewMessage) -> Result<(), Self::Error> {
        (**self).enlist_insert(tx, message)
    }

    fn claim_pending(
        &self,
        worker_id: &str,
        limit: usize,
        lease: Duration,
    ) -> Result<Vec<Message>, Self::Error> {
        (**self).claim_pending(worker_id, limit, lease)
    }

    fn mark_sent(&self, ids: &[MessageId]) -> Result<(), Self::Error> {
        (**self).mark_sent(ids)
    }
}
