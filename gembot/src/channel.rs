//! Channel abstraction for messaging platforms.

use crate::bus::MessageBus;
use crate::error::ChannelResult;
use crate::events::OutboundMessage;
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, error, info};

/// Channel lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ChannelState {
    /// Not started.
    #[default]
    Stopped,
    /// Starting up.
    Starting,
    /// Connected and processing messages.
    Running,
    /// Shutting down.
    Stopping,
}

/// Channel status snapshot.
#[derive(Debug, Clone)]
pub struct ChannelStatus {
    /// Channel name.
    pub name: String,
    /// Current state.
    pub state: ChannelState,
    /// Messages received from the platform.
    pub messages_received: u64,
    /// Messages sent to the platform.
    pub messages_sent: u64,
    /// Last recorded error, if any.
    pub last_error: Option<String>,
}

/// A messaging platform integration.
///
/// A channel connects to its platform, publishes what it receives onto the
/// bus, and subscribes to `bus.subscribe_channel(self.name())` to deliver
/// what the relay loop produces.
#[async_trait]
pub trait Channel: Send + Sync {
    /// Unique name of this channel; also its bus subscription key.
    fn name(&self) -> &str;

    /// Connect and start processing messages.
    async fn start(&self, bus: &MessageBus) -> ChannelResult<()>;

    /// Disconnect and stop background tasks.
    async fn stop(&self) -> ChannelResult<()>;

    /// Send a single outbound message directly.
    async fn send(&self, msg: &OutboundMessage) -> ChannelResult<()>;

    /// Current status.
    async fn status(&self) -> ChannelStatus;
}

/// Lifecycle manager for the registered channels.
pub struct ChannelManager {
    channels: RwLock<Vec<Arc<dyn Channel>>>,
    bus: MessageBus,
}

impl std::fmt::Debug for ChannelManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChannelManager").finish_non_exhaustive()
    }
}

impl ChannelManager {
    /// Create a manager bound to the given bus.
    #[must_use]
    pub fn new(bus: MessageBus) -> Self {
        Self {
            channels: RwLock::new(Vec::new()),
            bus,
        }
    }

    /// Register a channel.
    pub async fn register(&self, channel: impl Channel + 'static) {
        let channel: Arc<dyn Channel> = Arc::new(channel);
        info!(channel = %channel.name(), "channel registered");
        self.channels.write().await.push(channel);
    }

    /// Start every registered channel, logging failures.
    pub async fn start_all(&self) -> Vec<ChannelResult<()>> {
        let channels = self.channels.read().await;
        let mut results = Vec::with_capacity(channels.len());
        for channel in channels.iter() {
            info!(channel = %channel.name(), "starting channel");
            let result = channel.start(&self.bus).await;
            if let Err(ref e) = result {
                error!(channel = %channel.name(), error = %e, "failed to start channel");
            }
            results.push(result);
        }
        results
    }

    /// Stop every registered channel.
    pub async fn stop_all(&self) {
        let channels = self.channels.read().await;
        for channel in channels.iter() {
            info!(channel = %channel.name(), "stopping channel");
            if let Err(e) = channel.stop().await {
                error!(channel = %channel.name(), error = %e, "failed to stop channel");
            }
        }
    }

    /// Status of every registered channel.
    pub async fn status_all(&self) -> Vec<ChannelStatus> {
        let channels = self.channels.read().await;
        let mut statuses = Vec::with_capacity(channels.len());
        for channel in channels.iter() {
            statuses.push(channel.status().await);
        }
        statuses
    }

    /// Number of registered channels.
    pub async fn count(&self) -> usize {
        self.channels.read().await.len()
    }
}

/// Shared bookkeeping for channel implementations.
pub struct ChannelBase {
    name: String,
    state: RwLock<ChannelState>,
    stats: RwLock<ChannelStats>,
}

impl std::fmt::Debug for ChannelBase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChannelBase")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Default)]
struct ChannelStats {
    messages_received: u64,
    messages_sent: u64,
    last_error: Option<String>,
}

impl ChannelBase {
    /// Create bookkeeping for the named channel.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            state: RwLock::new(ChannelState::default()),
            stats: RwLock::new(ChannelStats::default()),
        }
    }

    /// Channel name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Current state.
    pub async fn state(&self) -> ChannelState {
        *self.state.read().await
    }

    /// Record a state change.
    pub async fn set_state(&self, state: ChannelState) {
        *self.state.write().await = state;
        debug!(channel = %self.name, ?state, "channel state changed");
    }

    /// Count a received message.
    pub async fn record_received(&self) {
        self.stats.write().await.messages_received += 1;
    }

    /// Count a sent message.
    pub async fn record_sent(&self) {
        self.stats.write().await.messages_sent += 1;
    }

    /// Record an error for the status report.
    pub async fn record_error(&self, error: impl Into<String>) {
        let error = error.into();
        error!(channel = %self.name, %error, "channel error");
        self.stats.write().await.last_error = Some(error);
    }

    /// Build a status snapshot.
    pub async fn build_status(&self) -> ChannelStatus {
        let state = *self.state.read().await;
        let stats = self.stats.read().await;
        ChannelStatus {
            name: self.name.clone(),
            state,
            messages_received: stats.messages_received,
            messages_sent: stats.messages_sent,
            last_error: stats.last_error.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_channel_base_bookkeeping() {
        let base = ChannelBase::new("test");
        assert_eq!(base.name(), "test");
        assert_eq!(base.state().await, ChannelState::Stopped);

        base.set_state(ChannelState::Running).await;
        base.record_received().await;
        base.record_sent().await;
        base.record_error("transient").await;

        let status = base.build_status().await;
        assert_eq!(status.state, ChannelState::Running);
        assert_eq!(status.messages_received, 1);
        assert_eq!(status.messages_sent, 1);
        assert_eq!(status.last_error.as_deref(), Some("transient"));
    }
}
