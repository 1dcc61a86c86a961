//! Configuration types.

use std::time::Duration;

use crate::error::ConfigError;
use crate::render::DEFAULT_BOT_NAME;

/// Entry point used when `CHATBOT_ENTRY_POINT` is not set.
pub const DEFAULT_ENTRY_POINT: &str = "language_select";

/// Data source used when `CHATBOT_DATA` is not set.
pub const DEFAULT_DATA_SOURCE: &str = "chatbot-data.json";

/// Chat configuration.
#[derive(Debug, Clone)]
pub struct ChatConfig {
    /// Where the decision tree is loaded from: a file path or an http(s) URL.
    pub data_source: String,
    /// State every conversation starts from (and returns to on reset).
    pub entry_point: String,
    /// Simulated typing delay before a selected state is rendered.
    pub typing_delay: Duration,
    /// Port for the HTTP/WebSocket server.
    pub port: u16,
    /// Avatar image reference shown in the conversation header.
    pub avatar: String,
    /// Bot name, used as the header avatar's alt text.
    pub bot_name: String,
    /// Session idle timeout (tracked sessions are pruned after this duration).
    pub session_idle_timeout: Duration,
    /// Whether to run the terminal frontend alongside the server.
    pub cli_enabled: bool,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            data_source: DEFAULT_DATA_SOURCE.to_string(),
            entry_point: DEFAULT_ENTRY_POINT.to_string(),
            typing_delay: Duration::from_millis(300),
            port: 8080,
            avatar: "robot.gif".to_string(),
            bot_name: DEFAULT_BOT_NAME.to_string(),
            session_idle_timeout: Duration::from_secs(1800), // 30 minutes
            cli_enabled: true,
        }
    }
}

impl ChatConfig {
    /// Build configuration from `CHATBOT_*` environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let typing_delay = match get("CHATBOT_TYPING_DELAY_MS") {
            Some(raw) => Duration::from_millis(parse_value("CHATBOT_TYPING_DELAY_MS", &raw)?),
            None => defaults.typing_delay,
        };

        let port = match get("CHATBOT_PORT") {
            Some(raw) => parse_value("CHATBOT_PORT", &raw)?,
            None => defaults.port,
        };

        let session_idle_timeout = match get("CHATBOT_SESSION_IDLE_SECS") {
            Some(raw) => Duration::from_secs(parse_value("CHATBOT_SESSION_IDLE_SECS", &raw)?),
            None => defaults.session_idle_timeout,
        };
        if session_idle_timeout.is_zero() {
            return Err(ConfigError::InvalidValue {
                key: "CHATBOT_SESSION_IDLE_SECS".to_string(),
                message: "must be greater than zero".to_string(),
            });
        }

        let cli_enabled = match get("CHATBOT_CLI") {
            Some(raw) => parse_flag("CHATBOT_CLI", &raw)?,
            None => defaults.cli_enabled,
        };

        Ok(Self {
            data_source: get("CHATBOT_DATA").unwrap_or(defaults.data_source),
            entry_point: get("CHATBOT_ENTRY_POINT").unwrap_or(defaults.entry_point),
            typing_delay,
            port,
            avatar: get("CHATBOT_AVATAR").unwrap_or(defaults.avatar),
            bot_name: get("CHATBOT_BOT_NAME").unwrap_or(defaults.bot_name),
            session_idle_timeout,
            cli_enabled,
        })
    }
}

fn parse_value<T>(key: &str, raw: &str) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    raw.trim()
        .parse()
        .map_err(|e: T::Err| ConfigError::InvalidValue {
            key: key.to_string(),
            message: e.to_string(),
        })
}

fn parse_flag(key: &str, raw: &str) -> Result<bool, ConfigError> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => Err(ConfigError::InvalidValue {
            key: key.to_string(),
            message: format!("expected a boolean, got {other:?}"),
        }),
    }
}
