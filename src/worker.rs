//! Worker side of the queue pair.
//!
//! A worker drains the outbound queue and publishes answers and relay events
//! onto the inbound queue. In production this sits behind a process boundary;
//! here it is an async trait so the router can be driven in-process.

use std::time::Duration;

use async_trait::async_trait;

use crate::core::queue::{QueueReceiver, QueueSender};
use crate::error::{Error, Result};
use crate::protocol::Message;

/// Inbound publisher handed to a worker.
#[derive(Clone)]
pub struct Outbox<P> {
    inbound: QueueSender<P>,
}

impl<P> Outbox<P>
where
    P: Send + 'static,
{
    pub fn new(inbound: QueueSender<P>) -> Self {
        Self { inbound }
    }

    /// Publish any inbound message as-is.
    pub async fn publish(&self, message: Message<P>) -> Result<()> {
        self.inbound
            .send(message)
            .await
            .map_err(|_| Error::Worker("inbound queue closed".to_string()))
    }

    /// Answer `request` with `payload`.
    pub async fn reply(&self, request: &Message<P>, payload: P) -> Result<()> {
        self.publish(request.reply(payload)).await
    }

    /// Publish a relay event tied to `request`.
    pub async fn relay(&self, request: &Message<P>, payload: P) -> Result<()> {
        self.publish(request.relay_event(payload)).await
    }
}

#[async_trait]
pub trait Worker<P>: Send + Sync
where
    P: Send + 'static,
{
    async fn handle(&self, request: Message<P>, outbox: &Outbox<P>) -> Result<()>;
}

/// Drain `outbound` until it closes, handing each request to `worker`.
///
/// Returns the number of requests handled successfully.
pub async fn run_worker<P, W>(mut outbound: QueueReceiver<P>, inbound: QueueSender<P>, worker: W) -> usize
where
    P: Send + 'static,
    W: Worker<P>,
{
    let outbox = Outbox::new(inbound);
    let mut handled = 0;

    while let Some(request) = outbound.recv().await {
        let id = request.id().clone();
        match worker.handle(request, &outbox).await {
            Ok(()) => handled += 1,
            Err(e) => tracing::warn!(id = %id, "Worker failed to handle request: {}", e),
        }
    }

    tracing::info!(handled, "Outbound queue closed, worker exiting");
    handled
}

/// Emits `progress_events` relay messages, then echoes the request payload.
#[derive(Debug, Clone, Default)]
pub struct EchoWorker {
    pub progress_events: usize,
    pub delay: Duration,
}

impl EchoWorker {
    pub fn new(progress_events: usize) -> Self {
        Self {
            progress_events,
            delay: Duration::ZERO,
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }
}

#[async_trait]
impl Worker<String> for EchoWorker {
    async fn handle(&self, request: Message<String>, outbox: &Outbox<String>) -> Result<()> {
        for step in 1..=self.progress_events {
            outbox
                .relay(&request, format!("progress {}/{}", step, self.progress_events))
                .await?;
        }
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        outbox.reply(&request, request.payload().clone()).await
    }
}
