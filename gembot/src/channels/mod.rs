//! Channel implementations.

pub mod cli;
#[cfg(feature = "telegram")]
pub mod telegram;

pub use cli::CliChannel;
#[cfg(feature = "telegram")]
pub use telegram::TelegramChannel;
