//! Pending request slots and the caller-side response handle.
//!
//! Lifecycle of one request:
//!
//! ```text
//! Sent ──► Resolved   (dispatch loop matched a response)
//!   │
//!   ├────► TimedOut   (caller's deadline elapsed, slot removed)
//!   │
//!   └────► Cancelled  (router shut down or handle dropped)
//! ```

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::oneshot;

use crate::error::{Error, Result};
use crate::protocol::{Message, MessageId};

use super::table::CorrelationTable;

pub(crate) type SlotResult<P> = Result<Message<P>>;

/// Single-assignment cell for one outstanding request.
///
/// Resolving or cancelling consumes the slot, so it can complete at most once.
#[derive(Debug)]
pub struct PendingSlot<P> {
    id: MessageId,
    ticket: u64,
    sent_at: Instant,
    sender: oneshot::Sender<SlotResult<P>>,
}

impl<P> PendingSlot<P> {
    pub(crate) fn new(id: MessageId, ticket: u64) -> (Self, oneshot::Receiver<SlotResult<P>>) {
        let (sender, receiver) = oneshot::channel();
        let slot = Self {
            id,
            ticket,
            sent_at: Instant::now(),
            sender,
        };
        (slot, receiver)
    }

    pub fn id(&self) -> &MessageId {
        &self.id
    }

    pub(crate) fn ticket(&self) -> u64 {
        self.ticket
    }

    pub fn elapsed(&self) -> Duration {
        self.sent_at.elapsed()
    }

    /// Complete the slot with its matched response.
    pub(crate) fn resolve(self, message: Message<P>) {
        let elapsed = self.elapsed();
        if self.sender.send(Ok(message)).is_err() {
            tracing::debug!(id = %self.id, "Response dropped, waiter already gone");
        } else {
            tracing::trace!(id = %self.id, ?elapsed, "Resolved pending request");
        }
    }

    /// Fail the slot with `RouterClosed`.
    pub(crate) fn cancel(self) {
        let _ = self.sender.send(Err(Error::RouterClosed));
    }
}

/// Handle returned by `send`, used to wait for the matching response.
///
/// Dropping a handle that has not produced an outcome abandons the request
/// and removes its slot from the table.
pub struct ResponseHandle<P> {
    id: MessageId,
    ticket: u64,
    receiver: oneshot::Receiver<SlotResult<P>>,
    table: Arc<CorrelationTable<P>>,
    settled: bool,
}

impl<P> ResponseHandle<P> {
    pub(crate) fn new(
        id: MessageId,
        ticket: u64,
        receiver: oneshot::Receiver<SlotResult<P>>,
        table: Arc<CorrelationTable<P>>,
    ) -> Self {
        Self {
            id,
            ticket,
            receiver,
            table,
            settled: false,
        }
    }

    /// Id of the request this handle waits on.
    pub fn id(&self) -> &MessageId {
        &self.id
    }

    /// Wait for the response, failing with `Timeout` after `timeout`.
    ///
    /// A response that lands in the same instant as the deadline resolves to
    /// exactly one outcome: the slot is either still in the table (timed out,
    /// removed here) or already taken by the dispatch loop, in which case its
    /// result is already in the channel.
    pub async fn wait(mut self, timeout: Duration) -> Result<Message<P>> {
        let waited = tokio::time::timeout(timeout, &mut self.receiver).await;
        let outcome = match waited {
            Ok(received) => flatten(received),
            Err(_) => {
                if self.table.remove(&self.id, self.ticket) {
                    self.table.stats().record_timed_out();
                    tracing::debug!(id = %self.id, ?timeout, "Request timed out");
                    Err(Error::Timeout {
                        id: self.id.clone(),
                        after: timeout,
                    })
                } else {
                    match self.receiver.try_recv() {
                        Ok(result) => result,
                        Err(_) => Err(Error::RouterClosed),
                    }
                }
            }
        };
        self.settled = true;
        outcome
    }

    /// Wait without a deadline. Still returns `RouterClosed` on shutdown.
    pub async fn wait_forever(mut self) -> Result<Message<P>> {
        let outcome = flatten((&mut self.receiver).await);
        self.settled = true;
        outcome
    }
}

fn flatten<P>(received: std::result::Result<SlotResult<P>, oneshot::error::RecvError>) -> SlotResult<P> {
    match received {
        Ok(result) => result,
        // Slot dropped without an outcome.
        Err(_) => Err(Error::RouterClosed),
    }
}

impl<P> Drop for ResponseHandle<P> {
    fn drop(&mut self) {
        if !self.settled && self.table.remove(&self.id, self.ticket) {
            tracing::debug!(id = %self.id, "Abandoned pending request");
        }
    }
}

impl<P> std::fmt::Debug for ResponseHandle<P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResponseHandle")
            .field("id", &self.id)
            .field("settled", &self.settled)
            .finish()
    }
}
