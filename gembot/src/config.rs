//! Bot configuration: a JSON file under `~/.gembot/` plus environment
//! variables for the secrets.
//!
//! Secrets are resolved from the config file first and fall back to the
//! environment (`TELEGRAM_BOT_TOKEN`, `GEMINI_API_KEY`), so the file can be
//! committed to a dotfiles repo without keys in it.

use crate::error::ConfigResult;
use crate::util::config_dir;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Environment variable carrying the Telegram bot token.
pub const TELEGRAM_TOKEN_ENV: &str = "TELEGRAM_BOT_TOKEN";

/// Environment variable carrying the Gemini API key.
pub const GEMINI_API_KEY_ENV: &str = "GEMINI_API_KEY";

/// Top-level bot configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct BotConfig {
    /// Generative model settings.
    pub gemini: GeminiConfig,
    /// Channel settings.
    pub channels: ChannelsConfig,
    /// Dialogue session settings.
    pub session: SessionConfig,
}

/// Gemini model settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeminiConfig {
    /// API key. Falls back to `GEMINI_API_KEY` when unset.
    pub api_key: Option<String>,
    /// Model id to generate with.
    pub model: String,
    /// Optional persona / system instruction.
    pub system_prompt: Option<String>,
    /// Custom API base URL (for testing or proxies).
    pub base_url: Option<String>,
    /// Request timeout in seconds.
    pub timeout_secs: u64,
}

impl Default for GeminiConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            model: "gemini-1.5-flash-latest".to_string(),
            system_prompt: None,
            base_url: None,
            timeout_secs: 90,
        }
    }
}

impl GeminiConfig {
    /// API key from the config file or the environment.
    #[must_use]
    pub fn resolved_api_key(&self) -> Option<String> {
        non_empty(self.api_key.clone())
            .or_else(|| non_empty(std::env::var(GEMINI_API_KEY_ENV).ok()))
    }
}

/// Per-channel settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ChannelsConfig {
    /// Telegram channel.
    pub telegram: TelegramConfig,
    /// Local CLI channel.
    pub cli: CliConfig,
}

/// Telegram channel settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TelegramConfig {
    /// Whether the Telegram channel runs at all.
    pub enabled: bool,
    /// Bot token. Falls back to `TELEGRAM_BOT_TOKEN` when unset.
    pub token: Option<String>,
    /// Trigger prefixes answered in group chats, scanned in this order.
    pub triggers: Vec<String>,
}

impl Default for TelegramConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            token: None,
            triggers: vec!["/ai".to_string()],
        }
    }
}

impl TelegramConfig {
    /// Bot token from the config file or the environment.
    #[must_use]
    pub fn resolved_token(&self) -> Option<String> {
        non_empty(self.token.clone())
            .or_else(|| non_empty(std::env::var(TELEGRAM_TOKEN_ENV).ok()))
    }
}

/// CLI channel settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CliConfig {
    /// Whether the CLI channel is registered when running the gateway.
    pub enabled: bool,
}

/// Dialogue session settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Per-conversation history cap in turns; 0 disables the cap.
    pub max_turns: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self { max_turns: 50 }
    }
}

/// Severity of a configuration issue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IssueLevel {
    /// The bot can run, but something is off.
    Warning,
    /// The bot cannot run like this.
    Error,
}

/// One finding from [`BotConfig::validate`].
#[derive(Debug, Clone)]
pub struct ConfigIssue {
    /// Severity.
    pub level: IssueLevel,
    /// Human-readable description.
    pub message: String,
}

impl ConfigIssue {
    fn error(message: impl Into<String>) -> Self {
        Self {
            level: IssueLevel::Error,
            message: message.into(),
        }
    }

    fn warning(message: impl Into<String>) -> Self {
        Self {
            level: IssueLevel::Warning,
            message: message.into(),
        }
    }
}

impl BotConfig {
    /// Check the configuration for problems. Error-level issues should abort
    /// startup; warnings are informational.
    #[must_use]
    pub fn validate(&self) -> Vec<ConfigIssue> {
        let mut issues = Vec::new();

        if self.channels.telegram.enabled {
            if self.channels.telegram.resolved_token().is_none() {
                issues.push(ConfigIssue::error(format!(
                    "telegram is enabled but no bot token is configured \
                     (set channels.telegram.token or {TELEGRAM_TOKEN_ENV})"
                )));
            }
            if self.channels.telegram.triggers.is_empty() {
                issues.push(ConfigIssue::warning(
                    "no group triggers configured; in groups the bot only \
                     answers replies to its own messages",
                ));
            }
            if self
                .channels
                .telegram
                .triggers
                .iter()
                .any(|t| t.trim().is_empty())
            {
                issues.push(ConfigIssue::error(
                    "empty trigger configured; it would match every group message",
                ));
            }
        }

        if self.gemini.resolved_api_key().is_none() {
            issues.push(ConfigIssue::warning(format!(
                "no Gemini API key configured (set gemini.api_key or \
                 {GEMINI_API_KEY_ENV}); every message will get the not-ready apology"
            )));
        }

        issues
    }

    /// Whether any error-level issue is present.
    #[must_use]
    pub fn has_errors(&self) -> bool {
        self.validate()
            .iter()
            .any(|i| i.level == IssueLevel::Error)
    }
}

/// Path of the configuration file (`~/.gembot/config.json`).
#[must_use]
pub fn config_path() -> PathBuf {
    config_dir().join("config.json")
}

/// Load the configuration from the default path.
///
/// # Errors
///
/// IO errors (including a missing file) and JSON parse errors.
pub async fn load_config() -> ConfigResult<BotConfig> {
    load_config_from(&config_path()).await
}

/// Load the configuration from a specific path.
///
/// # Errors
///
/// IO errors and JSON parse errors.
pub async fn load_config_from(path: &Path) -> ConfigResult<BotConfig> {
    let content = tokio::fs::read_to_string(path).await?;
    let config = serde_json::from_str(&content)?;
    Ok(config)
}

/// Save the configuration to the default path, creating the directory.
///
/// # Errors
///
/// IO errors.
pub async fn save_config(config: &BotConfig) -> ConfigResult<()> {
    tokio::fs::create_dir_all(config_dir()).await?;
    let content = serde_json::to_string_pretty(config)?;
    tokio::fs::write(config_path(), content).await?;
    Ok(())
}

/// Write a default configuration file and return its path.
///
/// # Errors
///
/// IO errors.
pub async fn init_config() -> ConfigResult<PathBuf> {
    save_config(&BotConfig::default()).await?;
    Ok(config_path())
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = BotConfig::default();
        assert_eq!(config.gemini.model, "gemini-1.5-flash-latest");
        assert_eq!(config.gemini.timeout_secs, 90);
        assert!(config.channels.telegram.enabled);
        assert_eq!(config.channels.telegram.triggers, vec!["/ai"]);
        assert!(!config.channels.cli.enabled);
        assert_eq!(config.session.max_turns, 50);
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let config: BotConfig = serde_json::from_str(
            r#"{"gemini": {"model": "gemini-1.5-pro"}, "channels": {"telegram": {"triggers": ["/bot", "hey bot"]}}}"#,
        )
        .unwrap();
        assert_eq!(config.gemini.model, "gemini-1.5-pro");
        assert_eq!(config.gemini.timeout_secs, 90);
        assert_eq!(
            config.channels.telegram.triggers,
            vec!["/bot", "hey bot"]
        );
        assert_eq!(config.session.max_turns, 50);
    }

    #[test]
    fn test_configured_token_passes_validation() {
        let mut config = BotConfig::default();
        config.channels.telegram.token = Some("123:abc".into());
        config.gemini.api_key = Some("key".into());
        assert!(!config.has_errors());
    }

    #[test]
    fn test_empty_trigger_is_an_error() {
        let mut config = BotConfig::default();
        config.channels.telegram.token = Some("123:abc".into());
        config.gemini.api_key = Some("key".into());
        config.channels.telegram.triggers = vec![String::new()];
        assert!(config.has_errors());
    }

    #[test]
    fn test_blank_config_secret_is_treated_as_unset() {
        let config = GeminiConfig {
            api_key: Some("   ".into()),
            ..GeminiConfig::default()
        };
        // Blank entries fall through to the environment (which may or may
        // not provide a key), never resolve to whitespace.
        if let Some(key) = config.resolved_api_key() {
            assert!(!key.trim().is_empty());
        }
    }
}
