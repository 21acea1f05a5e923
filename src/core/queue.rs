//! Bounded in-process queues connecting router, worker and relay consumer.
//!
//! Queue layout:
//! - outbound: requests, router -> worker
//! - inbound : responses and relay events, worker -> router
//! - relay   : relay-flagged inbound messages, router -> side-channel consumer

use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;

use crate::config::QueueSettings;
use crate::protocol::Message;

pub type QueueSender<P> = mpsc::Sender<Message<P>>;
pub type QueueReceiver<P> = mpsc::Receiver<Message<P>>;

/// All three queues, freshly created and not yet handed out.
pub struct RouterQueues<P> {
    pub outbound_tx: QueueSender<P>,
    pub outbound_rx: QueueReceiver<P>,
    pub inbound_tx: QueueSender<P>,
    pub inbound_rx: QueueReceiver<P>,
    pub relay_tx: QueueSender<P>,
    pub relay_rx: QueueReceiver<P>,
}

impl<P> RouterQueues<P> {
    /// Create the queues with the configured capacities.
    pub fn bounded(settings: &QueueSettings) -> Self {
        let (outbound_tx, outbound_rx) = mpsc::channel(settings.outbound_capacity);
        let (inbound_tx, inbound_rx) = mpsc::channel(settings.inbound_capacity);
        let (relay_tx, relay_rx) = mpsc::channel(settings.relay_capacity);

        tracing::debug!(
            outbound = settings.outbound_capacity,
            inbound = settings.inbound_capacity,
            relay = settings.relay_capacity,
            "Created router queues"
        );

        Self {
            outbound_tx,
            outbound_rx,
            inbound_tx,
            inbound_rx,
            relay_tx,
            relay_rx,
        }
    }
}

/// Expose the relay queue as a `Stream` for side-channel consumers.
pub fn relay_stream<P>(relay_rx: QueueReceiver<P>) -> ReceiverStream<Message<P>> {
    ReceiverStream::new(relay_rx)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_stream::StreamExt;

    #[tokio::test]
    async fn test_queues_are_fifo_and_independent() {
        let mut queues = RouterQueues::<u32>::bounded(&QueueSettings::default());

        queues.inbound_tx.send(Message::response(1u64, 10)).await.unwrap();
        queues.inbound_tx.send(Message::response(2u64, 20)).await.unwrap();
        queues.relay_tx.send(Message::relay(3u64, 30)).await.unwrap();

        assert_eq!(queues.inbound_rx.recv().await.unwrap().into_payload(), 10);
        assert_eq!(queues.inbound_rx.recv().await.unwrap().into_payload(), 20);
        assert!(queues.outbound_rx.try_recv().is_err());

        let mut stream = relay_stream(queues.relay_rx);
        assert_eq!(stream.next().await.unwrap().into_payload(), 30);
    }

    #[tokio::test]
    async fn test_capacity_is_enforced() {
        let settings = QueueSettings {
            outbound_capacity: 1,
            ..QueueSettings::default()
        };
        let queues = RouterQueues::<u32>::bounded(&settings);

        queues.outbound_tx.try_send(Message::request(1u64, 1)).unwrap();
        assert!(queues.outbound_tx.try_send(Message::request(2u64, 2)).is_err());
    }
}
