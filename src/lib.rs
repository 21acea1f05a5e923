//! msgrelay library root.
//!
//! Correlates asynchronously delivered responses with the requests that
//! triggered them, optionally diverting relay-flagged traffic to a separate
//! queue.

pub mod cli;
pub mod config;
pub mod core;
pub mod error;
pub mod logging;
pub mod protocol;
pub mod simulation;
pub mod worker;

pub use config::{load_settings, QueueSettings, Settings};
pub use crate::core::{
    relay_stream, Correlate, CorrelationTable, InboundHandler, MessageRouter, Relay,
    ResponseHandle, RouterQueues, StatsSnapshot,
};
pub use error::{Error, Result};
pub use protocol::{Control, Message, MessageId};
pub use simulation::{run_simulation, SimulationReport};
pub use worker::{run_worker, EchoWorker, Outbox, Worker};
