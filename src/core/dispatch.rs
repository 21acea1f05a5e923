//! Inbound dispatch strategies.
//!
//! The dispatch loop hands every inbound message to one [`InboundHandler`],
//! chosen when the router is built:
//! - [`Correlate`]: resolve the pending request with the same id
//! - [`Relay`]: divert relay-flagged messages to the relay queue, correlate
//!   everything else

use async_trait::async_trait;

use crate::error::{Error, Result};
use crate::protocol::Message;

use super::queue::QueueSender;
use super::table::CorrelationTable;

/// Strategy invoked by the dispatch loop for each inbound message.
///
/// Errors are logged by the loop, which then moves on to the next message.
/// A panic in `handle` loses only the message being handled, except under
/// the release profile, where `panic = "abort"` ends the process.
#[async_trait]
pub trait InboundHandler<P>: Send + Sync
where
    P: Send + 'static,
{
    /// Handler name for logs.
    fn name(&self) -> &'static str;

    async fn handle(&self, message: Message<P>, table: &CorrelationTable<P>) -> Result<()>;
}

/// Plain request/response correlation.
#[derive(Debug, Clone, Copy, Default)]
pub struct Correlate;

#[async_trait]
impl<P> InboundHandler<P> for Correlate
where
    P: Send + 'static,
{
    fn name(&self) -> &'static str {
        "correlate"
    }

    async fn handle(&self, message: Message<P>, table: &CorrelationTable<P>) -> Result<()> {
        if message.id().is_empty() {
            tracing::debug!("Dropping inbound message without id");
            return Ok(());
        }

        match table.resolve(message) {
            Err(Error::UnmatchedResponse(id)) => {
                // Expected when a waiter timed out just before its response arrived.
                table.stats().record_unmatched();
                tracing::warn!(id = %id, "No listener found for response, dropping");
                Ok(())
            }
            other => other,
        }
    }
}

/// Correlation with relay diversion.
pub struct Relay<P> {
    relay: QueueSender<P>,
    inner: Correlate,
}

impl<P> Relay<P> {
    /// Fails if the relay queue has no consumer left.
    pub fn new(relay: QueueSender<P>) -> Result<Self> {
        if relay.is_closed() {
            return Err(Error::Config(
                "relay queue has no consumer; cannot build relay router".to_string(),
            ));
        }
        Ok(Self {
            relay,
            inner: Correlate,
        })
    }
}

#[async_trait]
impl<P> InboundHandler<P> for Relay<P>
where
    P: Send + 'static,
{
    fn name(&self) -> &'static str {
        "relay"
    }

    async fn handle(&self, message: Message<P>, table: &CorrelationTable<P>) -> Result<()> {
        if !message.is_relay() {
            return self.inner.handle(message, table).await;
        }

        let id = message.id().clone();
        // Waits for capacity: relayed messages are never dropped to keep up.
        match self.relay.send(message).await {
            Ok(()) => {
                table.stats().record_relayed();
                tracing::trace!(id = %id, "Relayed inbound message");
                Ok(())
            }
            Err(_) => Err(Error::Relay(format!(
                "relay consumer gone, dropped message {}",
                id
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::MessageId;
    use std::sync::Arc;
    use std::time::Duration;
    use tokio::sync::mpsc;

    #[tokio::test]
    async fn test_correlate_resolves_matching_slot() {
        let table: Arc<CorrelationTable<&str>> = Arc::new(CorrelationTable::new());
        let handle = table.register(MessageId::new("1")).unwrap();

        Correlate
            .handle(Message::response("1", "ok"), &table)
            .await
            .unwrap();

        let response = handle.wait(Duration::from_secs(1)).await.unwrap();
        assert_eq!(*response.payload(), "ok");
    }

    #[tokio::test]
    async fn test_correlate_drops_unmatched() {
        let table: CorrelationTable<&str> = CorrelationTable::new();
        let result = Correlate.handle(Message::response("404", "late"), &table).await;

        assert!(result.is_ok());
        assert_eq!(table.stats().snapshot().unmatched, 1);
    }

    #[tokio::test]
    async fn test_correlate_ignores_empty_id() {
        let table: CorrelationTable<&str> = CorrelationTable::new();
        let result = Correlate.handle(Message::response("", "noise"), &table).await;

        assert!(result.is_ok());
        assert_eq!(table.stats().snapshot().unmatched, 0);
    }

    #[tokio::test]
    async fn test_relay_bypasses_matching_slot() {
        let table: Arc<CorrelationTable<&str>> = Arc::new(CorrelationTable::new());
        let _handle = table.register(MessageId::new("2")).unwrap();
        let (relay_tx, mut relay_rx) = mpsc::channel::<Message<&str>>(4);
        let relay = Relay::new(relay_tx).unwrap();

        relay
            .handle(Message::relay("2", "progress"), &table)
            .await
            .unwrap();

        let relayed = relay_rx.recv().await.unwrap();
        assert_eq!(*relayed.payload(), "progress");
        assert!(table.contains(&MessageId::new("2")));
        assert_eq!(table.stats().snapshot().resolved, 0);
    }

    #[tokio::test]
    async fn test_relay_delegates_unflagged() {
        let table: Arc<CorrelationTable<&str>> = Arc::new(CorrelationTable::new());
        let handle = table.register(MessageId::new("3")).unwrap();
        let (relay_tx, mut relay_rx) = mpsc::channel::<Message<&str>>(4);
        let relay = Relay::new(relay_tx).unwrap();

        relay
            .handle(Message::response("3", "done"), &table)
            .await
            .unwrap();

        assert_eq!(*handle.wait(Duration::from_secs(1)).await.unwrap().payload(), "done");
        assert!(relay_rx.try_recv().is_err());
    }

    #[test]
    fn test_relay_requires_live_consumer() {
        let (relay_tx, relay_rx) = mpsc::channel::<Message<&str>>(1);
        drop(relay_rx);

        assert!(matches!(Relay::new(relay_tx), Err(Error::Config(_))));
    }

    #[tokio::test]
    async fn test_relay_consumer_gone_is_error() {
        let table: CorrelationTable<&str> = CorrelationTable::new();
        let (relay_tx, relay_rx) = mpsc::channel::<Message<&str>>(1);
        let relay = Relay::new(relay_tx).unwrap();
        drop(relay_rx);

        let result = relay.handle(Message::relay("5", "event"), &table).await;
        assert!(matches!(result, Err(Error::Relay(_))));
    }
}
