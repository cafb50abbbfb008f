//! Local stdin/stdout channel, mostly for trying the bot without Telegram.
//!
//! A CLI conversation is routed like a private chat: every line is answered.
//! Slash commands mirror the Telegram command surface.

use crate::bus::MessageBus;
use crate::channel::{Channel, ChannelBase, ChannelState, ChannelStatus};
use crate::error::{ChannelError, ChannelResult};
use crate::events::{BotCommand, ChatKind, InboundMessage, MessageBody, OutboundMessage};
use async_trait::async_trait;
use std::io::{self, BufRead, Write};
use tokio::sync::{RwLock, mpsc};
use tracing::{debug, info};

/// CLI channel configuration.
#[derive(Debug, Clone)]
pub struct CliChannelConfig {
    /// Prompt string shown before user input.
    pub prompt: String,
    /// Conversation id for this CLI session.
    pub session_id: String,
}

impl Default for CliChannelConfig {
    fn default() -> Self {
        Self {
            prompt: "> ".to_string(),
            session_id: "cli".to_string(),
        }
    }
}

impl CliChannelConfig {
    /// Create a default config.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the prompt string.
    #[must_use]
    pub fn prompt(mut self, prompt: impl Into<String>) -> Self {
        self.prompt = prompt.into();
        self
    }

    /// Set the conversation id.
    #[must_use]
    pub fn session_id(mut self, id: impl Into<String>) -> Self {
        self.session_id = id.into();
        self
    }
}

/// Stdin/stdout channel.
#[derive(Debug)]
pub struct CliChannel {
    base: ChannelBase,
    config: CliChannelConfig,
    shutdown_tx: RwLock<Option<mpsc::Sender<()>>>,
}

impl CliChannel {
    /// Create a CLI channel with default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(CliChannelConfig::default())
    }

    /// Create a CLI channel with the given configuration.
    #[must_use]
    pub fn with_config(config: CliChannelConfig) -> Self {
        Self {
            base: ChannelBase::new("cli"),
            config,
            shutdown_tx: RwLock::new(None),
        }
    }

    /// The configured conversation id.
    #[must_use]
    pub fn session_id(&self) -> &str {
        &self.config.session_id
    }
}

impl Default for CliChannel {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Channel for CliChannel {
    fn name(&self) -> &str {
        self.base.name()
    }

    async fn start(&self, bus: &MessageBus) -> ChannelResult<()> {
        self.base.set_state(ChannelState::Starting).await;

        let (shutdown_tx, mut shutdown_rx) = mpsc::channel::<()>(1);
        *self.shutdown_tx.write().await = Some(shutdown_tx);

        let mut outbound_rx = bus.subscribe_channel("cli").await;

        #[allow(clippy::print_stdout)] // this channel's output is stdout
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    Some(msg) = outbound_rx.recv() => {
                        println!("\n{}\n", msg.text);
                    }
                    _ = shutdown_rx.recv() => {
                        debug!("cli output task shutting down");
                        break;
                    }
                }
            }
        });

        self.base.set_state(ChannelState::Running).await;
        info!("cli channel started");
        Ok(())
    }

    async fn stop(&self) -> ChannelResult<()> {
        self.base.set_state(ChannelState::Stopping).await;

        {
            let guard = self.shutdown_tx.write().await;
            if let Some(tx) = &*guard {
                let _ = tx.send(()).await;
            }
        }

        self.base.set_state(ChannelState::Stopped).await;
        info!("cli channel stopped");
        Ok(())
    }

    #[allow(clippy::print_stdout)] // this channel's output is stdout
    async fn send(&self, msg: &OutboundMessage) -> ChannelResult<()> {
        println!("\n{}\n", msg.text);
        self.base.record_sent().await;
        Ok(())
    }

    async fn status(&self) -> ChannelStatus {
        self.base.build_status().await
    }
}

/// Parse one input line into an inbound message, mapping the slash commands
/// the Telegram surface understands. Blank lines yield nothing.
fn parse_line(line: &str, session_id: &str) -> Option<InboundMessage> {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return None;
    }
    let body = match trimmed {
        "/start" => MessageBody::Command(BotCommand::Start),
        "/reset" => MessageBody::Command(BotCommand::Reset),
        "/help" => MessageBody::Command(BotCommand::Help),
        "/about" => MessageBody::Command(BotCommand::About),
        text => MessageBody::Text(text.to_string()),
    };
    Some(InboundMessage::new(
        "cli",
        "user",
        session_id,
        ChatKind::Private,
        body,
    ))
}

/// Run an interactive session: read stdin lines, publish them, print replies.
///
/// Blocks its task on stdin; run it on a multi-threaded runtime alongside the
/// gateway. Returns when the user types `exit` or input ends.
///
/// # Errors
///
/// IO errors reading stdin and bus errors publishing input.
#[allow(clippy::print_stdout)] // interactive session intentionally uses stdout
pub async fn run_interactive(bus: &MessageBus, config: CliChannelConfig) -> ChannelResult<()> {
    let prompt = config.prompt.clone();
    let mut outbound_rx = bus.subscribe_channel("cli").await;

    let output_prompt = prompt.clone();
    let output_handle = tokio::spawn(async move {
        while let Some(msg) = outbound_rx.recv().await {
            println!("\n{}\n", msg.text);
            print!("{output_prompt}");
            let _ = io::stdout().flush();
        }
    });

    let stdin = io::stdin();
    print!("{prompt}");
    let _ = io::stdout().flush();

    for line in stdin.lock().lines() {
        let line = line.map_err(|e| ChannelError::SendFailed(e.to_string()))?;
        let trimmed = line.trim();

        if trimmed == "exit" || trimmed == "quit" || trimmed == "/quit" {
            break;
        }

        match parse_line(&line, &config.session_id) {
            Some(msg) => {
                bus.publish_inbound(msg)
                    .await
                    .map_err(|e| ChannelError::SendFailed(e.to_string()))?;
            }
            None => {
                print!("{prompt}");
                let _ = io::stdout().flush();
            }
        }
    }

    output_handle.abort();
    Ok(())
}
