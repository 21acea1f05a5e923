//! Correlation table mapping request ids to pending slots.
//!
//! One mutex covers the map and the closed flag. Every operation (register,
//! resolve, remove, close) runs as a single critical section, and slots are
//! completed while the lock is held. A waiter that fails to remove its slot
//! therefore knows the outcome is already in its channel.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::error::{Error, Result};
use crate::protocol::{Message, MessageId};

use super::slot::{PendingSlot, ResponseHandle};
use super::stats::RouterStats;

struct TableState<P> {
    slots: HashMap<MessageId, PendingSlot<P>>,
    closed: bool,
}

/// Pending requests keyed by id.
pub struct CorrelationTable<P> {
    state: Mutex<TableState<P>>,
    /// Distinguishes successive slots that reuse the same id.
    next_ticket: AtomicU64,
    stats: RouterStats,
}

impl<P> CorrelationTable<P> {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(TableState {
                slots: HashMap::new(),
                closed: false,
            }),
            next_ticket: AtomicU64::new(1),
            stats: RouterStats::default(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, TableState<P>> {
        // Nothing inside the critical sections can leave the map half-updated.
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Insert a slot for `id` and return the handle waiting on it.
    pub fn register(self: &Arc<Self>, id: MessageId) -> Result<ResponseHandle<P>> {
        let ticket = self.next_ticket.fetch_add(1, Ordering::Relaxed);
        let (slot, receiver) = PendingSlot::new(id.clone(), ticket);

        {
            let mut state = self.lock();
            if state.closed {
                return Err(Error::RouterClosed);
            }
            if state.slots.contains_key(&id) {
                return Err(Error::DuplicateRequestId(id));
            }
            state.slots.insert(id.clone(), slot);
        }

        Ok(ResponseHandle::new(id, ticket, receiver, Arc::clone(self)))
    }

    /// Complete and remove the slot matching `message`'s id.
    ///
    /// Returns `UnmatchedResponse` when no request with that id is pending.
    pub fn resolve(&self, message: Message<P>) -> Result<()> {
        let mut state = self.lock();
        match state.slots.remove(message.id()) {
            Some(slot) => {
                slot.resolve(message);
                self.stats.record_resolved();
                Ok(())
            }
            None => Err(Error::UnmatchedResponse(message.id().clone())),
        }
    }

    /// Remove the slot for `id` if it is still the one identified by `ticket`.
    pub(crate) fn remove(&self, id: &MessageId, ticket: u64) -> bool {
        let mut state = self.lock();
        match state.slots.get(id) {
            Some(slot) if slot.ticket() == ticket => {
                state.slots.remove(id);
                true
            }
            _ => false,
        }
    }

    /// Refuse new registrations and cancel every pending slot.
    ///
    /// Returns the number of cancelled slots.
    pub fn close(&self) -> usize {
        let mut state = self.lock();
        state.closed = true;
        let cancelled = state.slots.len();
        for (_, slot) in state.slots.drain() {
            slot.cancel();
        }
        self.stats.record_cancelled(cancelled as u64);
        cancelled
    }

    pub fn len(&self) -> usize {
        self.lock().slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains(&self, id: &MessageId) -> bool {
        self.lock().slots.contains_key(id)
    }

    pub fn is_closed(&self) -> bool {
        self.lock().closed
    }

    pub fn stats(&self) -> &RouterStats {
        &self.stats
    }
}

impl<P> Default for CorrelationTable<P> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn table() -> Arc<CorrelationTable<String>> {
        Arc::new(CorrelationTable::new())
    }

    #[tokio::test]
    async fn test_register_and_resolve() {
        let table = table();
        let handle = table.register(MessageId::new("1")).unwrap();
        assert!(table.contains(&MessageId::new("1")));

        table.resolve(Message::response("1", "ok".to_string())).unwrap();
        assert!(table.is_empty());

        let response = handle.wait(Duration::from_secs(1)).await.unwrap();
        assert_eq!(response.payload(), "ok");
        assert_eq!(table.stats().snapshot().resolved, 1);
    }

    #[test]
    fn test_duplicate_id_rejected() {
        let table = table();
        let _handle = table.register(MessageId::new("1")).unwrap();

        let err = table.register(MessageId::new("1")).unwrap_err();
        assert!(matches!(err, Error::DuplicateRequestId(id) if id.as_str() == "1"));
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn test_unmatched_response() {
        let table = table();
        let err = table.resolve(Message::response("9", "late".to_string())).unwrap_err();
        assert!(matches!(err, Error::UnmatchedResponse(_)));
    }

    #[test]
    fn test_slot_resolved_at_most_once() {
        let table = table();
        let _handle = table.register(MessageId::new("1")).unwrap();

        assert!(table.resolve(Message::response("1", "a".to_string())).is_ok());
        assert!(table.resolve(Message::response("1", "b".to_string())).is_err());
        assert_eq!(table.stats().snapshot().resolved, 1);
    }

    #[test]
    fn test_dropped_handle_removes_slot() {
        let table = table();
        let handle = table.register(MessageId::new("1")).unwrap();
        drop(handle);
        assert!(table.is_empty());
    }

    #[test]
    fn test_stale_ticket_does_not_remove_newer_slot() {
        let table = table();
        let first = table.register(MessageId::new("1")).unwrap();
        table.resolve(Message::response("1", "a".to_string())).unwrap();

        // Same id reused after the first request completed.
        let _second = table.register(MessageId::new("1")).unwrap();
        drop(first);

        assert!(table.contains(&MessageId::new("1")));
    }

    #[tokio::test]
    async fn test_close_cancels_pending() {
        let table = table();
        let a = table.register(MessageId::new("a")).unwrap();
        let b = table.register(MessageId::new("b")).unwrap();

        assert_eq!(table.close(), 2);
        assert!(table.is_closed());

        assert!(matches!(a.wait_forever().await, Err(Error::RouterClosed)));
        assert!(matches!(b.wait(Duration::from_secs(1)).await, Err(Error::RouterClosed)));
        assert!(matches!(
            table.register(MessageId::new("c")),
            Err(Error::RouterClosed)
        ));
        assert_eq!(table.stats().snapshot().cancelled, 2);
    }

    #[tokio::test]
    async fn test_timeout_removes_slot() {
        let table = table();
        let handle = table.register(MessageId::new("1")).unwrap();

        let err = handle.wait(Duration::from_millis(20)).await.unwrap_err();
        assert!(matches!(err, Error::Timeout { .. }));
        assert!(table.is_empty());
        assert_eq!(table.stats().snapshot().timed_out, 1);

        let late = table.resolve(Message::response("1", "late".to_string()));
        assert!(matches!(late, Err(Error::UnmatchedResponse(_))));
    }
}
