//! gembot - a Telegram chat bot relaying conversations to Gemini.
//!
//! The bot receives chat messages, decides per conversation whether and what
//! to answer, keeps per-conversation dialogue history in memory, and relays
//! Gemini's replies back with a format-downgrade fallback on delivery.
//!
//! # Architecture
//!
//! - **Message bus** ([`bus`]) - queue between channels and the relay loop
//! - **Channels** ([`channels`]) - Telegram and local CLI integrations
//! - **Router** ([`router`]) - respond-or-ignore decision and query extraction
//! - **Sessions** ([`session`]) - in-memory per-conversation dialogue history
//! - **Responder** ([`responder`]) - Gemini calls with context and outcome
//!   interpretation
//! - **Relay loop** ([`relay`]) - ties routing, generation and delivery
//!   together
//! - **Gateway** ([`gateway`]) - assembles and runs all of the above
//!
//! # Features
//!
//! - `telegram` (default) - Telegram support via teloxide

pub mod bus;
pub mod channel;
pub mod channels;
pub mod commands;
pub mod config;
pub mod error;
pub mod events;
pub mod gateway;
pub mod gemini;
pub mod relay;
pub mod responder;
pub mod router;
pub mod session;
pub mod util;

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::error::{
        BotError, BusError, BusResult, ChannelError, ChannelResult, ConfigError, ConfigResult,
        GenerateError, GenerateResult, Result,
    };

    pub use crate::bus::{InboundHandle, MessageBus};
    pub use crate::channel::{Channel, ChannelBase, ChannelManager, ChannelState, ChannelStatus};
    pub use crate::channels::CliChannel;
    #[cfg(feature = "telegram")]
    pub use crate::channels::telegram::{TelegramChannel, TelegramChannelConfig};
    pub use crate::config::{
        BotConfig, ChannelsConfig, CliConfig, ConfigIssue, GeminiConfig, IssueLevel,
        SessionConfig, TelegramConfig, config_path, init_config, load_config, save_config,
    };
    pub use crate::events::{
        BotCommand, ChatKind, InboundMessage, MessageBody, MessageFormat, OutboundMessage,
        ReplyRef,
    };
    pub use crate::gateway::Gateway;
    pub use crate::gemini::{GeminiClient, GeminiClientBuilder};
    pub use crate::relay::RelayLoop;
    pub use crate::responder::{Responder, ResponseOutcome};
    pub use crate::router::{RouteDecision, Router};
    pub use crate::session::{DialogueSession, Role, SessionHandle, SessionStore, Turn};
    pub use crate::util::{config_dir, generate_message_id, timestamp_ms, truncate_str};
}
