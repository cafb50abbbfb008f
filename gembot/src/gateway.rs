//! Gateway: wires the bus, channels, session store, responder and relay loop
//! together and runs them until shutdown.

use crate::bus::MessageBus;
use crate::channel::ChannelManager;
use crate::channels::CliChannel;
use crate::config::BotConfig;
use crate::error::{BotError, Result};
use crate::relay::RelayLoop;
use crate::responder::Responder;
use crate::router::Router;
use crate::session::SessionStore;
use std::sync::Arc;
use tracing::{info, warn};

#[cfg(feature = "telegram")]
use crate::channels::telegram::{TelegramChannel, TelegramChannelConfig};
#[cfg(feature = "telegram")]
use crate::config::TELEGRAM_TOKEN_ENV;

/// Fallback bot id used when no platform identity is available (e.g. a
/// CLI-only run); private chats never consult it.
const DEFAULT_BOT_ID: &str = "gembot";

/// The assembled bot.
pub struct Gateway {
    config: BotConfig,
    bus: MessageBus,
    channels: ChannelManager,
    store: Arc<SessionStore>,
    responder: Arc<Responder>,
}

impl std::fmt::Debug for Gateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Gateway").finish_non_exhaustive()
    }
}

impl Gateway {
    /// Assemble a gateway from configuration.
    #[must_use]
    pub fn new(config: BotConfig) -> Self {
        let bus = MessageBus::new();
        let store = Arc::new(SessionStore::new(config.session.max_turns));
        let responder = Arc::new(Responder::new(Arc::clone(&store)));
        Self {
            channels: ChannelManager::new(bus.clone()),
            bus,
            store,
            responder,
            config,
        }
    }

    /// The message bus, for wiring extra producers (e.g. interactive CLI).
    #[must_use]
    pub const fn bus(&self) -> &MessageBus {
        &self.bus
    }

    /// Run the bot until the relay loop ends or ctrl-c arrives.
    ///
    /// A missing Telegram token (with Telegram enabled) is the one fatal
    /// configuration error. A failed Gemini configuration only warns: the bot
    /// stays up and answers with the not-ready apology until reconfigured.
    ///
    /// # Errors
    ///
    /// Fatal configuration or channel-connection problems during startup.
    pub async fn run(&self) -> Result<()> {
        info!("gateway starting");

        if let Err(e) = self.responder.configure(&self.config.gemini).await {
            warn!(error = %e, "Gemini configuration failed; replies will report the model as not ready");
        }

        let bot_id = self.setup_channels().await?;
        self.channels.start_all().await;

        let router = Router::new(bot_id, self.config.channels.telegram.triggers.clone());
        let relay = RelayLoop::new(
            self.bus.clone(),
            router,
            Arc::clone(&self.responder),
            Arc::clone(&self.store),
        );

        info!("gateway started");
        tokio::select! {
            result = relay.run() => result?,
            _ = tokio::signal::ctrl_c() => {
                info!("shutdown signal received");
            }
        }

        self.channels.stop_all().await;
        info!("gateway stopped");
        Ok(())
    }

    /// Register the configured channels. Returns the bot id the router uses
    /// to recognize replies addressed to the bot.
    async fn setup_channels(&self) -> Result<String> {
        #[allow(unused_mut)]
        let mut bot_id = DEFAULT_BOT_ID.to_string();

        #[cfg(feature = "telegram")]
        if self.config.channels.telegram.enabled {
            let token = self
                .config
                .channels
                .telegram
                .resolved_token()
                .ok_or_else(|| {
                    BotError::config(format!(
                        "telegram is enabled but no bot token is configured \
                         (set channels.telegram.token or {TELEGRAM_TOKEN_ENV})"
                    ))
                })?;

            let telegram = TelegramChannel::new(TelegramChannelConfig::new(token));
            let identity = telegram.connect().await?;
            bot_id = identity.id;
            self.channels.register(telegram).await;
        }

        if self.config.channels.cli.enabled {
            self.channels.register(CliChannel::new()).await;
        }

        Ok(bot_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_gateway_assembles_without_channels() {
        let mut config = BotConfig::default();
        config.channels.telegram.enabled = false;
        config.channels.cli.enabled = false;

        let gateway = Gateway::new(config);
        let bot_id = gateway.setup_channels().await.unwrap();
        assert_eq!(bot_id, DEFAULT_BOT_ID);
        assert_eq!(gateway.channels.count().await, 0);
    }

    #[tokio::test]
    async fn test_cli_channel_is_registered_when_enabled() {
        let mut config = BotConfig::default();
        config.channels.telegram.enabled = false;
        config.channels.cli.enabled = true;

        let gateway = Gateway::new(config);
        gateway.setup_channels().await.unwrap();
        assert_eq!(gateway.channels.count().await, 1);
    }

    #[cfg(feature = "telegram")]
    #[tokio::test]
    async fn test_missing_telegram_token_is_fatal() {
        let mut config = BotConfig::default();
        config.channels.telegram.enabled = true;
        config.channels.telegram.token = None;

        // Only meaningful when the environment provides no token either.
        if std::env::var(TELEGRAM_TOKEN_ENV).is_err() {
            let gateway = Gateway::new(config);
            assert!(gateway.setup_channels().await.is_err());
        }
    }
}
