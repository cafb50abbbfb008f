//! Telegram channel built on teloxide.
//!
//! Inbound: a dispatcher turns Telegram updates into [`InboundMessage`]s —
//! commands parsed by the `BotCommands` derive, text messages annotated with
//! the chat kind and the sender of any replied-to message (the router's
//! reply-to-bot consent signal).
//!
//! Outbound: replies are attempted as Markdown first; when Telegram rejects
//! the markup ("can't parse entities") the same text is resent once as plain
//! text, and if sending keeps failing a single fixed apology goes out. No
//! delivery error escapes this module.

use crate::bus::MessageBus;
use crate::channel::{Channel, ChannelBase, ChannelState, ChannelStatus};
use crate::error::{ChannelError, ChannelResult};
use crate::events::{BotCommand, ChatKind, InboundMessage, MessageBody, MessageFormat, OutboundMessage, ReplyRef};
use async_trait::async_trait;
use teloxide::prelude::*;
use teloxide::types::{ChatAction, MessageId, ParseMode, ReplyParameters};
use teloxide::utils::command::BotCommands;
use teloxide::{ApiError, RequestError};
use tokio::sync::{RwLock, mpsc};
use tracing::{debug, error, info, warn};

/// Telegram's message length limit.
const MAX_MESSAGE_LENGTH: usize = 4096;

/// Fixed user-facing apology when delivery keeps failing.
const DELIVERY_APOLOGY: &str = "Sorry, I had trouble sending my reply. Please try again.";

/// Telegram channel configuration.
#[derive(Debug, Clone)]
pub struct TelegramChannelConfig {
    /// Bot token from @BotFather.
    pub token: String,
    /// Maximum message length before splitting.
    pub max_message_length: usize,
}

impl TelegramChannelConfig {
    /// Create a config with the given token.
    #[must_use]
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            max_message_length: MAX_MESSAGE_LENGTH,
        }
    }
}

/// The bot's own platform identity, resolved at connect time.
#[derive(Debug, Clone)]
pub struct BotIdentity {
    /// Numeric user id as a string, comparable to message sender ids.
    pub id: String,
    /// Bot username, when Telegram reports one.
    pub username: Option<String>,
}

/// Telegram channel.
pub struct TelegramChannel {
    base: ChannelBase,
    config: TelegramChannelConfig,
    bot: RwLock<Option<Bot>>,
    identity: RwLock<Option<BotIdentity>>,
    shutdown_tx: RwLock<Option<mpsc::Sender<()>>>,
}

impl std::fmt::Debug for TelegramChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TelegramChannel")
            .field("base", &self.base)
            .finish_non_exhaustive()
    }
}

/// Commands understood by the bot, registered with Telegram's command menu.
#[derive(BotCommands, Clone, Copy, Debug)]
#[command(rename_rule = "lowercase")]
enum Command {
    #[command(description = "start over")]
    Start,
    #[command(description = "forget this conversation")]
    Reset,
    #[command(description = "show usage help")]
    Help,
    #[command(description = "about this bot")]
    About,
}

impl From<Command> for BotCommand {
    fn from(cmd: Command) -> Self {
        match cmd {
            Command::Start => Self::Start,
            Command::Reset => Self::Reset,
            Command::Help => Self::Help,
            Command::About => Self::About,
        }
    }
}

impl TelegramChannel {
    /// Create a Telegram channel with the given configuration.
    #[must_use]
    pub fn new(config: TelegramChannelConfig) -> Self {
        Self {
            base: ChannelBase::new("telegram"),
            config,
            bot: RwLock::new(None),
            identity: RwLock::new(None),
            shutdown_tx: RwLock::new(None),
        }
    }

    /// Connect to the Bot API and resolve the bot's own identity, which the
    /// router needs to recognize replies to the bot.
    ///
    /// # Errors
    ///
    /// [`ChannelError::StartFailed`] when `getMe` fails.
    pub async fn connect(&self) -> ChannelResult<BotIdentity> {
        let bot = Bot::new(&self.config.token);
        let me = bot
            .get_me()
            .await
            .map_err(|e| ChannelError::start(format!("getMe failed: {e}")))?;

        let identity = BotIdentity {
            id: me.user.id.0.to_string(),
            username: me.user.username.clone(),
        };
        info!(
            bot_id = %identity.id,
            username = identity.username.as_deref().unwrap_or("-"),
            "connected to Telegram"
        );

        *self.bot.write().await = Some(bot);
        *self.identity.write().await = Some(identity.clone());
        Ok(identity)
    }

    /// The identity resolved by [`connect`](Self::connect), if any.
    pub async fn identity(&self) -> Option<BotIdentity> {
        self.identity.read().await.clone()
    }
}

#[async_trait]
impl Channel for TelegramChannel {
    fn name(&self) -> &str {
        self.base.name()
    }

    async fn start(&self, bus: &MessageBus) -> ChannelResult<()> {
        self.base.set_state(ChannelState::Starting).await;

        if self.bot.read().await.is_none() {
            self.connect().await?;
        }
        let bot = self
            .bot
            .read()
            .await
            .clone()
            .ok_or(ChannelError::NotConnected)?;

        let (shutdown_tx, mut shutdown_rx) = mpsc::channel::<()>(1);
        *self.shutdown_tx.write().await = Some(shutdown_tx);

        // Outbound delivery task.
        let mut outbound_rx = bus.subscribe_channel("telegram").await;
        let bot_for_output = bot.clone();
        let max_len = self.config.max_message_length;
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    Some(msg) = outbound_rx.recv() => {
                        deliver(&bot_for_output, &msg, max_len).await;
                    }
                    _ = shutdown_rx.recv() => {
                        debug!("telegram delivery task shutting down");
                        break;
                    }
                }
            }
        });

        // Inbound dispatcher.
        let bus_for_commands = bus.inbound_handle();
        let command_handler =
            dptree::entry()
                .filter_command::<Command>()
                .endpoint(move |msg: Message, cmd: Command| {
                    let bus_handle = bus_for_commands.clone();
                    async move {
                        let inbound =
                            inbound_from(&msg, MessageBody::Command(BotCommand::from(cmd)));
                        if let Err(e) = bus_handle.publish(inbound).await {
                            error!(error = %e, "failed to publish telegram command");
                        }
                        Ok::<(), RequestError>(())
                    }
                });

        let bus_for_text = bus.inbound_handle();
        let text_handler = dptree::endpoint(move |bot: Bot, msg: Message| {
            let bus_handle = bus_for_text.clone();
            async move {
                let Some(text) = msg.text() else {
                    debug!(chat = %msg.chat.id, "ignoring non-text message");
                    return Ok(());
                };

                // The original behavior: show "typing…" for every text
                // message taken off the wire, before any generation happens.
                if let Err(e) = bot.send_chat_action(msg.chat.id, ChatAction::Typing).await {
                    debug!(chat = %msg.chat.id, error = %e, "typing indicator failed");
                }

                let inbound = inbound_from(&msg, MessageBody::Text(text.to_string()));
                if let Err(e) = bus_handle.publish(inbound).await {
                    error!(error = %e, "failed to publish telegram message");
                }
                Ok::<(), RequestError>(())
            }
        });

        let handler = Update::filter_message()
            .branch(command_handler)
            .branch(text_handler);

        let mut dispatcher = Dispatcher::builder(bot, handler)
            .enable_ctrlc_handler()
            .build();
        tokio::spawn(async move {
            dispatcher.dispatch().await;
        });

        self.base.set_state(ChannelState::Running).await;
        info!("telegram channel started");
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
        *self.bot.write().await = None;

        self.base.set_state(ChannelState::Stopped).await;
        info!("telegram channel stopped");
        Ok(())
    }

    async fn send(&self, msg: &OutboundMessage) -> ChannelResult<()> {
        let bot = self
            .bot
            .read()
            .await
            .clone()
            .ok_or(ChannelError::NotConnected)?;
        deliver(&bot, msg, self.config.max_message_length).await;
        self.base.record_sent().await;
        Ok(())
    }

    async fn status(&self) -> ChannelStatus {
        self.base.build_status().await
    }
}

/// Build an [`InboundMessage`] from a Telegram message.
fn inbound_from(msg: &Message, body: MessageBody) -> InboundMessage {
    let chat_kind = if msg.chat.is_private() {
        ChatKind::Private
    } else {
        ChatKind::Group
    };
    let sender_id = msg
        .from
        .as_ref()
        .map(|u| u.id.0.to_string())
        .unwrap_or_default();

    let mut inbound = InboundMessage::new(
        "telegram",
        sender_id,
        msg.chat.id.0.to_string(),
        chat_kind,
        body,
    )
    .with_message_ref(msg.id.0.to_string());

    if let Some(user) = msg.from.as_ref() {
        inbound = inbound.with_sender_name(user.first_name.clone());
    }
    if let Some(replied) = msg.reply_to_message() {
        inbound = inbound.with_reply_to(ReplyRef {
            message_id: replied.id.0.to_string(),
            sender_id: replied.from.as_ref().map(|u| u.id.0.to_string()),
        });
    }
    inbound
}

/// One step of the delivery downgrade sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DeliveryStep {
    /// Send with Markdown formatting.
    Formatted,
    /// Send as plain text.
    Plain,
    /// Send the fixed apology.
    Apology,
}

/// Pick the next step after a failed send: a markup parse rejection of the
/// formatted attempt downgrades to plain text (once); every other failure,
/// and a plain-text failure, falls through to the single apology; a failed
/// apology ends delivery.
fn next_step(step: DeliveryStep, err: &RequestError) -> Option<DeliveryStep> {
    match (step, err) {
        (DeliveryStep::Formatted, RequestError::Api(ApiError::CantParseEntities(_))) => {
            Some(DeliveryStep::Plain)
        }
        (DeliveryStep::Formatted | DeliveryStep::Plain, _) => Some(DeliveryStep::Apology),
        (DeliveryStep::Apology, _) => None,
    }
}

/// Deliver an outbound message, chunked to the platform limit.
async fn deliver(bot: &Bot, msg: &OutboundMessage, max_len: usize) {
    let Ok(id) = msg.chat_id.parse::<i64>() else {
        error!(chat = %msg.chat_id, "invalid telegram chat id");
        return;
    };
    let chat = ChatId(id);
    let reply = msg
        .reply_to
        .as_ref()
        .and_then(|s| s.parse::<i32>().ok())
        .map(|mid| ReplyParameters::new(MessageId(mid)));

    for chunk in split_message(&msg.text, max_len) {
        if !deliver_chunk(bot, chat, reply.clone(), &chunk, msg.format).await {
            // Delivery gave up; don't spam the remaining chunks.
            return;
        }
    }
}

/// Walk the downgrade sequence for one chunk. Returns `false` once delivery
/// has given up (the apology path ran, successfully or not).
async fn deliver_chunk(
    bot: &Bot,
    chat: ChatId,
    reply: Option<ReplyParameters>,
    text: &str,
    format: MessageFormat,
) -> bool {
    let mut step = match format {
        MessageFormat::Markdown => DeliveryStep::Formatted,
        MessageFormat::Plain => DeliveryStep::Plain,
    };

    loop {
        match send_step(bot, chat, reply.clone(), text, step).await {
            Ok(()) => return step != DeliveryStep::Apology,
            Err(err) => match next_step(step, &err) {
                Some(next) => {
                    if next == DeliveryStep::Plain {
                        warn!(chat = %chat, error = %err, "markup rejected, retrying as plain text");
                    } else {
                        error!(chat = %chat, error = %err, ?step, "failed to send reply");
                    }
                    step = next;
                }
                None => {
                    error!(chat = %chat, error = %err, "failed to deliver apology message");
                    return false;
                }
            },
        }
    }
}

async fn send_step(
    bot: &Bot,
    chat: ChatId,
    reply: Option<ReplyParameters>,
    text: &str,
    step: DeliveryStep,
) -> Result<(), RequestError> {
    let mut request = match step {
        DeliveryStep::Formatted => bot.send_message(chat, text).parse_mode(ParseMode::Markdown),
        DeliveryStep::Plain => bot.send_message(chat, text),
        DeliveryStep::Apology => bot.send_message(chat, DELIVERY_APOLOGY),
    };
    if let Some(reply) = reply {
        request = request.reply_parameters(reply);
    }
    request.await.map(|_| ())
}

/// Split a long message into chunks that fit the platform limit.
fn split_message(text: &str, max_len: usize) -> Vec<String> {
    if text.len() <= max_len {
        return vec![text.to_string()];
    }

    let mut chunks = Vec::new();
    let mut current = String::new();

    for line in text.lines() {
        if current.len() + line.len() + 1 > max_len {
            if !current.is_empty() {
                chunks.push(current);
                current = String::new();
            }
            if line.len() > max_len {
                // A single oversized line is cut at character boundaries.
                let mut piece = String::new();
                for ch in line.chars() {
                    if piece.len() + ch.len_utf8() > max_len {
                        chunks.push(piece);
                        piece = String::new();
                    }
                    piece.push(ch);
                }
                if !piece.is_empty() {
                    chunks.push(piece);
                }
                continue;
            }
        }
        if !current.is_empty() {
            current.push('\n');
        }
        current.push_str(line);
    }

    if !current.is_empty() {
        chunks.push(current);
    }
    chunks
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse_error() -> RequestError {
        RequestError::Api(ApiError::CantParseEntities(
            "Bad Request: can't parse entities".to_string(),
        ))
    }

    fn other_error() -> RequestError {
        RequestError::Api(ApiError::BotBlocked)
    }

    #[test]
    fn test_markup_rejection_downgrades_to_plain_once() {
        let step = next_step(DeliveryStep::Formatted, &parse_error());
        assert_eq!(step, Some(DeliveryStep::Plain));

        // A second parse rejection does not loop back to another retry.
        let step = next_step(DeliveryStep::Plain, &parse_error());
        assert_eq!(step, Some(DeliveryStep::Apology));
    }

    #[test]
    fn test_non_parse_failure_goes_straight_to_apology() {
        assert_eq!(
            next_step(DeliveryStep::Formatted, &other_error()),
            Some(DeliveryStep::Apology)
        );
        assert_eq!(
            next_step(DeliveryStep::Plain, &other_error()),
            Some(DeliveryStep::Apology)
        );
    }

    #[test]
    fn test_failed_apology_ends_delivery() {
        assert_eq!(next_step(DeliveryStep::Apology, &other_error()), None);
        assert_eq!(next_step(DeliveryStep::Apology, &parse_error()), None);
    }

    #[test]
    fn test_split_short_message_is_untouched() {
        let chunks = split_message("Hello, world!", 100);
        assert_eq!(chunks, vec!["Hello, world!".to_string()]);
    }

    #[test]
    fn test_split_on_line_boundaries() {
        let chunks = split_message("line 1\nline 2\nline 3\nline 4", 15);
        assert!(chunks.len() > 1);
        assert!(chunks.iter().all(|c| c.len() <= 15));
        assert_eq!(chunks.join("\n"), "line 1\nline 2\nline 3\nline 4");
    }

    #[test]
    fn test_split_oversized_single_line() {
        let long = "x".repeat(50);
        let chunks = split_message(&long, 20);
        assert_eq!(chunks.len(), 3);
        assert!(chunks.iter().all(|c| c.len() <= 20));
    }

    #[test]
    fn test_command_mapping() {
        assert_eq!(BotCommand::from(Command::Start), BotCommand::Start);
        assert_eq!(BotCommand::from(Command::Reset), BotCommand::Reset);
        assert_eq!(BotCommand::from(Command::Help), BotCommand::Help);
        assert_eq!(BotCommand::from(Command::About), BotCommand::About);
    }
}
