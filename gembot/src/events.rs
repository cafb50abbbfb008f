//! Message events flowing between channels and the relay loop.

use crate::util::{generate_message_id, timestamp_ms};
use serde::{Deserialize, Serialize};

/// Kind of conversation a message arrived from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChatKind {
    /// One-on-one conversation with the bot.
    Private,
    /// Multi-participant conversation; the bot only answers when addressed.
    Group,
}

/// Reference to the message an inbound message replies to.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReplyRef {
    /// Platform id of the replied-to message.
    pub message_id: String,
    /// Sender of the replied-to message, if the platform exposes it.
    pub sender_id: Option<String>,
}

/// A bot command recognized by the command surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BotCommand {
    /// Greet the user and start over.
    Start,
    /// Forget the conversation history for this chat.
    Reset,
    /// Show usage help.
    Help,
    /// Describe the bot.
    About,
}

/// Payload of an inbound message: free text or a parsed command.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageBody {
    /// Plain text content.
    Text(String),
    /// A command parsed by the channel.
    Command(BotCommand),
}

/// An inbound message from a channel to the relay loop.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InboundMessage {
    /// Unique internal message id.
    pub id: String,
    /// Channel identifier (e.g., "telegram", "cli").
    pub channel: String,
    /// Sender's identifier within the channel.
    pub sender_id: String,
    /// Sender's display name, when the platform provides one.
    pub sender_name: Option<String>,
    /// Chat/conversation identifier.
    pub chat_id: String,
    /// Whether this is a private or group conversation.
    pub chat_kind: ChatKind,
    /// Message payload.
    pub body: MessageBody,
    /// Platform message id, used to thread the reply.
    pub message_ref: Option<String>,
    /// The message this one replies to, if any.
    pub reply_to: Option<ReplyRef>,
    /// Receive timestamp (Unix milliseconds).
    pub timestamp: u64,
}

impl InboundMessage {
    /// Create a new inbound message.
    pub fn new(
        channel: impl Into<String>,
        sender_id: impl Into<String>,
        chat_id: impl Into<String>,
        chat_kind: ChatKind,
        body: MessageBody,
    ) -> Self {
        Self {
            id: generate_message_id(),
            channel: channel.into(),
            sender_id: sender_id.into(),
            sender_name: None,
            chat_id: chat_id.into(),
            chat_kind,
            body,
            message_ref: None,
            reply_to: None,
            timestamp: timestamp_ms(),
        }
    }

    /// Text content, if this is a text message.
    #[must_use]
    pub fn text(&self) -> Option<&str> {
        match &self.body {
            MessageBody::Text(t) => Some(t),
            MessageBody::Command(_) => None,
        }
    }

    /// Unique session key for this conversation.
    #[must_use]
    pub fn session_key(&self) -> String {
        format!("{}:{}", self.channel, self.chat_id)
    }

    /// Set the sender's display name.
    #[must_use]
    pub fn with_sender_name(mut self, name: impl Into<String>) -> Self {
        self.sender_name = Some(name.into());
        self
    }

    /// Set the platform message id used for reply threading.
    #[must_use]
    pub fn with_message_ref(mut self, message_ref: impl Into<String>) -> Self {
        self.message_ref = Some(message_ref.into());
        self
    }

    /// Set the replied-to message reference.
    #[must_use]
    pub fn with_reply_to(mut self, reply: ReplyRef) -> Self {
        self.reply_to = Some(reply);
        self
    }
}

/// Rendering hint for outbound text.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageFormat {
    /// Plain text, no formatting.
    #[default]
    Plain,
    /// Markdown formatted text; channels may downgrade to plain on rejection.
    Markdown,
}

/// An outbound message from the relay loop to a channel.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutboundMessage {
    /// Unique internal message id.
    pub id: String,
    /// Target channel identifier.
    pub channel: String,
    /// Target chat/conversation identifier.
    pub chat_id: String,
    /// Message text content.
    pub text: String,
    /// Platform message id to reply to, if threading is wanted.
    pub reply_to: Option<String>,
    /// Rendering hint for the channel.
    pub format: MessageFormat,
}

impl OutboundMessage {
    /// Create a new outbound message.
    pub fn new(
        channel: impl Into<String>,
        chat_id: impl Into<String>,
        text: impl Into<String>,
    ) -> Self {
        Self {
            id: generate_message_id(),
            channel: channel.into(),
            chat_id: chat_id.into(),
            text: text.into(),
            reply_to: None,
            format: MessageFormat::default(),
        }
    }

    /// Create a reply to an inbound message, threaded to its platform id.
    pub fn reply_to(msg: &InboundMessage, text: impl Into<String>) -> Self {
        Self {
            id: generate_message_id(),
            channel: msg.channel.clone(),
            chat_id: msg.chat_id.clone(),
            text: text.into(),
            reply_to: msg.message_ref.clone(),
            format: MessageFormat::default(),
        }
    }

    /// Set the message format.
    #[must_use]
    pub const fn with_format(mut self, format: MessageFormat) -> Self {
        self.format = format;
        self
    }
}
