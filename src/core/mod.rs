//! Core module - queues, correlation and dispatch.
//!
//! This module contains the heart of msgrelay:
//! - Bounded outbound/inbound/relay queues
//! - The correlation table of pending requests
//! - Inbound dispatch strategies (plain and relay)
//! - The router tying them together

pub mod dispatch;
pub mod queue;
pub mod router;
pub mod slot;
pub mod stats;
pub mod table;

pub use dispatch::{Correlate, InboundHandler, Relay};
pub use queue::{relay_stream, QueueReceiver, QueueSender, RouterQueues};
pub use router::MessageRouter;
pub use slot::{PendingSlot, ResponseHandle};
pub use stats::{RouterStats, StatsSnapshot};
pub use table::CorrelationTable;
