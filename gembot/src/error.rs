//! Error types for the relay bot.
//!
//! Each concern gets its own `thiserror` enum with a matching `Result` alias;
//! everything converges into [`BotError`] at the application boundary.

/// The top-level error type for bot operations.
#[derive(Debug, thiserror::Error)]
pub enum BotError {
    /// Channel error.
    #[error("channel: {0}")]
    Channel(#[from] ChannelError),

    /// Response generation error.
    #[error("generate: {0}")]
    Generate(#[from] GenerateError),

    /// Configuration error.
    #[error("config: {0}")]
    Config(#[from] ConfigError),

    /// Message bus error.
    #[error("bus: {0}")]
    Bus(#[from] BusError),

    /// IO error.
    #[error("io: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error.
    #[error("json: {0}")]
    Json(#[from] serde_json::Error),

    /// Generic internal error.
    #[error("{0}")]
    Internal(String),
}

impl BotError {
    /// Create a config error from a string.
    #[inline]
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(ConfigError::Invalid(msg.into()))
    }

    /// Create an internal error.
    #[inline]
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }
}

/// Result type alias for bot operations.
pub type Result<T> = std::result::Result<T, BotError>;

/// Error type for message bus operations.
#[derive(Debug, thiserror::Error)]
pub enum BusError {
    /// The inbound queue is closed; the relay loop is gone.
    #[error("inbound channel closed")]
    InboundClosed,

    /// No subscriber was registered for the target channel.
    #[error("no subscriber for channel: {0}")]
    NoSubscriber(String),
}

/// Result type for message bus operations.
pub type BusResult<T> = std::result::Result<T, BusError>;

/// Error type for channel operations.
#[derive(Debug, thiserror::Error)]
pub enum ChannelError {
    /// Failed to start the channel.
    #[error("start failed: {0}")]
    StartFailed(String),

    /// Failed to stop the channel.
    #[error("stop failed: {0}")]
    StopFailed(String),

    /// Failed to send a message.
    #[error("send failed: {0}")]
    SendFailed(String),

    /// The platform rejected the message because it could not parse the
    /// formatting markup. Recoverable by resending as plain text.
    #[error("markup rejected: {0}")]
    MarkupRejected(String),

    /// Channel is not connected.
    #[error("not connected")]
    NotConnected,

    /// Configuration error.
    #[error("config: {0}")]
    Config(String),
}

impl ChannelError {
    /// Create a start failed error.
    #[inline]
    pub fn start(msg: impl Into<String>) -> Self {
        Self::StartFailed(msg.into())
    }

    /// Create a send failed error.
    #[inline]
    pub fn send(msg: impl Into<String>) -> Self {
        Self::SendFailed(msg.into())
    }
}

/// Result type for channel operations.
pub type ChannelResult<T> = std::result::Result<T, ChannelError>;

/// Error type for response generation.
///
/// Everything the remote call can go wrong with ends up here; the responder
/// converts these into user-visible apologies and nothing propagates further.
#[derive(Debug, Clone, thiserror::Error)]
pub enum GenerateError {
    /// The model has not been configured yet.
    #[error("model not ready")]
    NotReady,

    /// The API returned a non-success status.
    #[error("api error {status}: {message}")]
    Api {
        /// HTTP status code.
        status: u16,
        /// Error message from the response body, or the status line.
        message: String,
    },

    /// Transport-level failure reaching the service.
    #[error("transport: {0}")]
    Transport(String),

    /// The request exceeded the configured deadline.
    #[error("timed out after {0}s")]
    Timeout(u64),

    /// The service answered with a payload we could not use.
    #[error("invalid response: {0}")]
    InvalidResponse(String),
}

/// Result type for generation operations.
pub type GenerateResult<T> = std::result::Result<T, GenerateError>;

/// Error type for configuration operations.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// IO error.
    #[error("io: {0}")]
    Io(#[from] std::io::Error),

    /// JSON parsing error.
    #[error("parse: {0}")]
    Parse(#[from] serde_json::Error),

    /// Missing required field.
    #[error("missing: {0}")]
    Missing(String),

    /// Invalid value.
    #[error("invalid: {0}")]
    Invalid(String),
}

impl ConfigError {
    /// Create a missing field error.
    #[inline]
    pub fn missing(field: impl Into<String>) -> Self {
        Self::Missing(field.into())
    }

    /// Create an invalid value error.
    #[inline]
    pub fn invalid(msg: impl Into<String>) -> Self {
        Self::Invalid(msg.into())
    }
}

/// Result type for configuration operations.
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;
