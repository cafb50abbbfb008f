//! Async message bus decoupling channels from the relay loop.
//!
//! Channels publish [`InboundMessage`]s onto a bounded queue the relay loop
//! consumes; the relay loop publishes [`OutboundMessage`]s that are routed to
//! the subscriber registered for the target channel.

use crate::error::{BusError, BusResult};
use crate::events::{InboundMessage, OutboundMessage};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{RwLock, mpsc};
use tracing::trace;

/// Default capacity for message queues.
const DEFAULT_QUEUE_CAPACITY: usize = 256;

/// Async message bus shared by channels and the relay loop.
#[derive(Clone)]
pub struct MessageBus {
    inner: Arc<MessageBusInner>,
}

impl std::fmt::Debug for MessageBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MessageBus").finish_non_exhaustive()
    }
}

struct MessageBusInner {
    inbound_tx: mpsc::Sender<InboundMessage>,
    inbound_rx: RwLock<Option<mpsc::Receiver<InboundMessage>>>,
    subscribers: RwLock<HashMap<String, mpsc::Sender<OutboundMessage>>>,
    stats: RwLock<BusStats>,
}

/// Message bus counters.
#[derive(Debug, Default, Clone, Copy)]
pub struct BusStats {
    /// Total inbound messages accepted.
    pub inbound_count: u64,
    /// Total outbound messages delivered to a subscriber.
    pub outbound_count: u64,
    /// Outbound messages dropped for lack of a subscriber.
    pub dropped_count: u64,
}

impl MessageBus {
    /// Create a new message bus with default capacity.
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_QUEUE_CAPACITY)
    }

    /// Create a new message bus with the given inbound queue capacity.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        let (inbound_tx, inbound_rx) = mpsc::channel(capacity);
        Self {
            inner: Arc::new(MessageBusInner {
                inbound_tx,
                inbound_rx: RwLock::new(Some(inbound_rx)),
                subscribers: RwLock::new(HashMap::new()),
                stats: RwLock::new(BusStats::default()),
            }),
        }
    }

    /// Publish an inbound message from a channel.
    ///
    /// # Errors
    ///
    /// Returns [`BusError::InboundClosed`] when the relay loop is gone.
    pub async fn publish_inbound(&self, msg: InboundMessage) -> BusResult<()> {
        trace!(channel = %msg.channel, chat = %msg.chat_id, "publishing inbound message");
        self.inner
            .inbound_tx
            .send(msg)
            .await
            .map_err(|_| BusError::InboundClosed)?;
        self.inner.stats.write().await.inbound_count += 1;
        Ok(())
    }

    /// Consume the next inbound message. Only the relay loop should call this.
    ///
    /// Returns `None` when the bus is closed.
    pub async fn consume_inbound(&self) -> Option<InboundMessage> {
        let mut rx_guard = self.inner.inbound_rx.write().await;
        match rx_guard.as_mut() {
            Some(rx) => rx.recv().await,
            None => None,
        }
    }

    /// Consume the next inbound message, giving up after `timeout`.
    pub async fn consume_inbound_timeout(
        &self,
        timeout: std::time::Duration,
    ) -> Option<InboundMessage> {
        let mut rx_guard = self.inner.inbound_rx.write().await;
        match rx_guard.as_mut() {
            Some(rx) => tokio::time::timeout(timeout, rx.recv()).await.ok().flatten(),
            None => None,
        }
    }

    /// Subscribe to outbound messages for a channel.
    ///
    /// Replaces any previous subscriber for the same channel name.
    pub async fn subscribe_channel(&self, channel: &str) -> mpsc::Receiver<OutboundMessage> {
        let (tx, rx) = mpsc::channel(DEFAULT_QUEUE_CAPACITY);
        self.inner
            .subscribers
            .write()
            .await
            .insert(channel.to_string(), tx);
        rx
    }

    /// Publish an outbound message to the target channel's subscriber.
    ///
    /// # Errors
    ///
    /// Returns [`BusError::NoSubscriber`] when no channel is listening; the
    /// message is counted as dropped.
    pub async fn publish_outbound(&self, msg: OutboundMessage) -> BusResult<()> {
        trace!(channel = %msg.channel, chat = %msg.chat_id, "publishing outbound message");
        let sent = {
            let subscribers = self.inner.subscribers.read().await;
            match subscribers.get(&msg.channel) {
                Some(tx) => tx.send(msg.clone()).await.is_ok(),
                None => false,
            }
        };

        let mut stats = self.inner.stats.write().await;
        if sent {
            stats.outbound_count += 1;
            Ok(())
        } else {
            stats.dropped_count += 1;
            Err(BusError::NoSubscriber(msg.channel))
        }
    }

    /// Lightweight handle for publishing inbound messages from channel tasks.
    #[must_use]
    pub fn inbound_handle(&self) -> InboundHandle {
        InboundHandle {
            tx: self.inner.inbound_tx.clone(),
        }
    }

    /// Current bus counters.
    pub async fn stats(&self) -> BusStats {
        *self.inner.stats.read().await
    }
}

impl Default for MessageBus {
    fn default() -> Self {
        Self::new()
    }
}

/// Cheap clonable handle for publishing inbound messages.
#[derive(Debug, Clone)]
pub struct InboundHandle {
    tx: mpsc::Sender<InboundMessage>,
}

impl InboundHandle {
    /// Publish an inbound message.
    ///
    /// # Errors
    ///
    /// Returns [`BusError::InboundClosed`] when the relay loop is gone.
    pub async fn publish(&self, msg: InboundMessage) -> BusResult<()> {
        self.tx.send(msg).await.map_err(|_| BusError::InboundClosed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::{ChatKind, MessageBody};
    use std::time::Duration;

    fn text_msg(content: &str) -> InboundMessage {
        InboundMessage::new(
            "test",
            "sender",
            "chat1",
            ChatKind::Private,
            MessageBody::Text(content.into()),
        )
    }

    #[tokio::test]
    async fn test_inbound_flow() {
        let bus = MessageBus::new();
        bus.publish_inbound(text_msg("hello")).await.unwrap();

        let received = bus
            .consume_inbound_timeout(Duration::from_millis(100))
            .await;
        assert_eq!(received.unwrap().text(), Some("hello"));
    }

    #[tokio::test]
    async fn test_outbound_routes_to_subscriber() {
        let bus = MessageBus::new();
        let mut telegram_rx = bus.subscribe_channel("telegram").await;

        bus.publish_outbound(OutboundMessage::new("telegram", "chat1", "for telegram"))
            .await
            .unwrap();

        let received = tokio::time::timeout(Duration::from_millis(100), telegram_rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(received.text, "for telegram");
    }

    #[tokio::test]
    async fn test_outbound_without_subscriber_is_dropped() {
        let bus = MessageBus::new();
        let result = bus
            .publish_outbound(OutboundMessage::new("nowhere", "chat1", "lost"))
            .await;
        assert!(matches!(result, Err(BusError::NoSubscriber(_))));
        assert_eq!(bus.stats().await.dropped_count, 1);
    }

    #[tokio::test]
    async fn test_stats() {
        let bus = MessageBus::new();
        let _rx = bus.subscribe_channel("test").await;

        bus.publish_inbound(text_msg("in")).await.unwrap();
        bus.publish_outbound(OutboundMessage::new("test", "c", "out"))
            .await
            .unwrap();

        let stats = bus.stats().await;
        assert_eq!(stats.inbound_count, 1);
        assert_eq!(stats.outbound_count, 1);
    }
}
