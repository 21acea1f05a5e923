//! Request/response router over an outbound and an inbound queue.
//!
//! ```text
//! caller ──send──► outbound queue ──► worker
//!   ▲                                   │
//!   │                                   ▼
//!  wait ◄── pending slot ◄── dispatch loop ◄── inbound queue
//!                                │
//!                                └──► relay queue (Relay handler only)
//! ```
//!
//! One dispatch task per router drains the inbound queue and is the only
//! place slots are resolved or messages relayed.

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::error::{Error, Result};
use crate::protocol::Message;

use super::dispatch::{Correlate, InboundHandler, Relay};
use super::queue::{QueueReceiver, QueueSender};
use super::slot::ResponseHandle;
use super::stats::StatsSnapshot;
use super::table::CorrelationTable;

/// Turns a fire-and-forget queue pair into a request/response API.
pub struct MessageRouter<P>
where
    P: Send + 'static,
{
    outbound: QueueSender<P>,
    table: Arc<CorrelationTable<P>>,
    shutdown_tx: watch::Sender<bool>,
    shutdown_rx: watch::Receiver<bool>,
    dispatch: Mutex<Option<JoinHandle<()>>>,
    handler_name: &'static str,
}

impl<P> MessageRouter<P>
where
    P: Send + 'static,
{
    /// Build a router with the given inbound handler and start its dispatch
    /// loop. Must be called from within a Tokio runtime.
    pub fn new<H>(outbound: QueueSender<P>, inbound: QueueReceiver<P>, handler: H) -> Self
    where
        H: InboundHandler<P> + 'static,
    {
        let table = Arc::new(CorrelationTable::new());
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let handler_name = handler.name();

        let task = tokio::spawn(dispatch_loop(
            inbound,
            Arc::new(handler),
            Arc::clone(&table),
            shutdown_rx.clone(),
        ));

        tracing::info!(handler = handler_name, "Message router started");

        Self {
            outbound,
            table,
            shutdown_tx,
            shutdown_rx,
            dispatch: Mutex::new(Some(task)),
            handler_name,
        }
    }

    /// Router doing plain correlation.
    pub fn plain(outbound: QueueSender<P>, inbound: QueueReceiver<P>) -> Self {
        Self::new(outbound, inbound, Correlate)
    }

    /// Router diverting relay-flagged inbound messages to `relay`.
    pub fn with_relay(
        outbound: QueueSender<P>,
        inbound: QueueReceiver<P>,
        relay: QueueSender<P>,
    ) -> Result<Self> {
        let handler = Relay::new(relay)?;
        Ok(Self::new(outbound, inbound, handler))
    }

    /// Register a pending slot for `request` and enqueue it outbound.
    ///
    /// The slot exists before the request becomes visible to the worker, so
    /// a response can never overtake its own registration. Waiting for
    /// outbound capacity ends with `RouterClosed` once shutdown is signalled.
    pub async fn send(&self, request: Message<P>) -> Result<ResponseHandle<P>> {
        if request.id().is_empty() {
            return Err(Error::InvalidRequest("request id must not be empty".to_string()));
        }

        let handle = self.table.register(request.id().clone())?;

        // The stored receiver never marks a value as seen, so a shutdown
        // signalled before this point fires `changed` immediately.
        let mut shutdown = self.shutdown_rx.clone();
        let permit = tokio::select! {
            biased;
            _ = shutdown.changed() => None,
            reserved = self.outbound.reserve() => reserved.ok(),
        };

        // Dropping the handle removes the slot again.
        let Some(permit) = permit else {
            tracing::warn!(id = %handle.id(), "Router closing, request not sent");
            drop(handle);
            return Err(Error::RouterClosed);
        };
        permit.send(request);

        self.table.stats().record_sent();
        tracing::debug!(id = %handle.id(), "Sent request");
        Ok(handle)
    }

    /// Send a request carrying `payload` under a freshly generated id.
    pub async fn request(&self, payload: P) -> Result<ResponseHandle<P>> {
        self.send(Message::new_request(payload)).await
    }

    /// Wait for the response to a previously sent request.
    pub async fn wait(&self, handle: ResponseHandle<P>, timeout: Duration) -> Result<Message<P>> {
        handle.wait(timeout).await
    }

    /// Send a request and wait for its response.
    pub async fn send_and_wait(&self, request: Message<P>, timeout: Duration) -> Result<Message<P>> {
        let handle = self.send(request).await?;
        handle.wait(timeout).await
    }

    /// Stop the dispatch loop and cancel all pending requests.
    ///
    /// Outstanding waits return `RouterClosed`. Calling this more than once
    /// is harmless.
    pub async fn shutdown(&self) {
        let _ = self.shutdown_tx.send(true);

        let task = self
            .dispatch
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();

        if let Some(task) = task {
            if let Err(e) = task.await {
                tracing::error!("Dispatch task failed: {}", e);
            }
            tracing::info!(handler = self.handler_name, "Message router stopped");
        }

        self.table.close();
    }

    /// Number of requests still awaiting a response.
    pub fn pending_count(&self) -> usize {
        self.table.len()
    }

    /// True once the router no longer accepts requests.
    pub fn is_closed(&self) -> bool {
        self.table.is_closed()
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.table.stats().snapshot()
    }

    pub fn handler_name(&self) -> &'static str {
        self.handler_name
    }
}

/// Closes the table when the dispatch task ends, including by panic.
struct CloseOnExit<P>(Arc<CorrelationTable<P>>);

impl<P> Drop for CloseOnExit<P> {
    fn drop(&mut self) {
        let cancelled = self.0.close();
        if cancelled > 0 {
            tracing::warn!(cancelled, "Cancelled pending requests, router closed");
        }
    }
}

async fn dispatch_loop<P>(
    mut inbound: QueueReceiver<P>,
    handler: Arc<dyn InboundHandler<P>>,
    table: Arc<CorrelationTable<P>>,
    mut shutdown: watch::Receiver<bool>,
) where
    P: Send + 'static,
{
    let _close = CloseOnExit(Arc::clone(&table));

    loop {
        // A dropped router also ends the loop: `changed` errors once the
        // sender is gone.
        let message = tokio::select! {
            biased;
            _ = shutdown.changed() => {
                tracing::debug!("Dispatch loop received shutdown");
                break;
            }
            received = inbound.recv() => match received {
                Some(message) => message,
                None => {
                    tracing::info!("Inbound queue closed, stopping dispatch loop");
                    break;
                }
            },
        };

        // Each message runs in its own task so a panicking handler loses
        // only that message. Messages are still handled one at a time.
        let id = message.id().clone();
        let mut task = tokio::spawn({
            let handler = Arc::clone(&handler);
            let table = Arc::clone(&table);
            async move { handler.handle(message, &table).await }
        });

        tokio::select! {
            biased;
            joined = &mut task => match joined {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    tracing::error!(id = %id, handler = handler.name(), "Failed to dispatch inbound message: {}", e);
                }
                Err(e) => {
                    tracing::error!(id = %id, handler = handler.name(), "Inbound handler panicked, message dropped: {}", e);
                    table.stats().record_discarded(1);
                }
            },
            _ = shutdown.changed() => {
                task.abort();
                tracing::warn!(id = %id, "Shutdown interrupted dispatch of inbound message");
                table.stats().record_discarded(1);
                break;
            }
        }
    }

    // Whatever the worker already delivered is dropped, but never silently.
    inbound.close();
    let mut discarded = 0u64;
    while inbound.try_recv().is_ok() {
        discarded += 1;
    }
    if discarded > 0 {
        table.stats().record_discarded(discarded);
        tracing::warn!(discarded, "Discarded buffered inbound messages on shutdown");
    }
}
