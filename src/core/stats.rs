//! Router counters.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

/// Live counters updated by senders, waiters and the dispatch loop.
#[derive(Debug, Default)]
pub struct RouterStats {
    sent: AtomicU64,
    resolved: AtomicU64,
    relayed: AtomicU64,
    unmatched: AtomicU64,
    timed_out: AtomicU64,
    cancelled: AtomicU64,
    discarded: AtomicU64,
}

impl RouterStats {
    pub(crate) fn record_sent(&self) {
        self.sent.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_resolved(&self) {
        self.resolved.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_relayed(&self) {
        self.relayed.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_unmatched(&self) {
        self.unmatched.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_timed_out(&self) {
        self.timed_out.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_cancelled(&self, count: u64) {
        self.cancelled.fetch_add(count, Ordering::Relaxed);
    }

    /// Inbound messages dropped by shutdown or a failing handler.
    pub(crate) fn record_discarded(&self, count: u64) {
        self.discarded.fetch_add(count, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            sent: self.sent.load(Ordering::Relaxed),
            resolved: self.resolved.load(Ordering::Relaxed),
            relayed: self.relayed.load(Ordering::Relaxed),
            unmatched: self.unmatched.load(Ordering::Relaxed),
            timed_out: self.timed_out.load(Ordering::Relaxed),
            cancelled: self.cancelled.load(Ordering::Relaxed),
            discarded: self.discarded.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time copy of [`RouterStats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatsSnapshot {
    pub sent: u64,
    pub resolved: u64,
    pub relayed: u64,
    pub unmatched: u64,
    pub timed_out: u64,
    pub cancelled: u64,
    #[serde(default)]
    pub discarded: u64,
}
