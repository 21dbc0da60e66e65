//! Configuration loading and management.
//!
//! Configuration is read from a TOML file, then every knob can be overridden
//! by a `VEILBOT_*` environment variable so containerized deployments never
//! need to mount a file for a one-line change. Validation runs once at
//! startup; a bad config refuses to boot.

mod defaults;

use defaults::{
    default_auto_ban_days, default_auto_ban_threshold, default_chat_per_minute,
    default_chat_timeout_secs, default_max_queue_size, default_messages_per_minute,
    default_next_per_minute, default_store_url,
};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Top-level configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Bot identity and privileged users.
    pub bot: BotConfig,
    /// Session store connection.
    #[serde(default)]
    pub store: StoreConfig,
    /// Matching and session lifetimes.
    #[serde(default)]
    pub matching: MatchingConfig,
    /// Per-user command and message rate windows.
    #[serde(default)]
    pub limits: LimitsConfig,
    /// Moderation thresholds and the content filter.
    #[serde(default)]
    pub moderation: ModerationConfig,
    /// Logging output.
    #[serde(default)]
    pub log: LogConfig,
}

/// Bot identity configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct BotConfig {
    /// Telegram bot API token.
    #[serde(default)]
    pub token: String,
    /// User ids permitted to run admin commands.
    #[serde(default)]
    pub admins: Vec<i64>,
}

/// Session store configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct StoreConfig {
    /// Redis connection URL.
    #[serde(default = "default_store_url")]
    pub url: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            url: default_store_url(),
        }
    }
}

/// Matching configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct MatchingConfig {
    /// Seconds of inactivity after which a chat (or queue residency) ends.
    #[serde(default = "default_chat_timeout_secs")]
    pub chat_timeout_secs: u64,
    /// Maximum number of users allowed to wait in the queue.
    #[serde(default = "default_max_queue_size")]
    pub max_queue_size: usize,
}

impl Default for MatchingConfig {
    fn default() -> Self {
        Self {
            chat_timeout_secs: default_chat_timeout_secs(),
            max_queue_size: default_max_queue_size(),
        }
    }
}

impl MatchingConfig {
    /// Chat timeout as a [`Duration`].
    pub fn chat_timeout(&self) -> Duration {
        Duration::from_secs(self.chat_timeout_secs)
    }
}

/// Rate-limit windows (all fixed 60-second windows).
#[derive(Debug, Clone, Deserialize)]
pub struct LimitsConfig {
    /// Relayed messages per user per minute.
    #[serde(default = "default_messages_per_minute")]
    pub messages_per_minute: u32,
    /// `/chat` invocations per user per minute.
    #[serde(default = "default_chat_per_minute")]
    pub chat_per_minute: u32,
    /// `/next` invocations per user per minute.
    #[serde(default = "default_next_per_minute")]
    pub next_per_minute: u32,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            messages_per_minute: default_messages_per_minute(),
            chat_per_minute: default_chat_per_minute(),
            next_per_minute: default_next_per_minute(),
        }
    }
}

/// Moderation configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ModerationConfig {
    /// Report count at which a user is auto-banned.
    #[serde(default = "default_auto_ban_threshold")]
    pub auto_ban_threshold: i64,
    /// Duration of an auto-ban, in days.
    #[serde(default = "default_auto_ban_days")]
    pub auto_ban_days: i64,
    /// Case-insensitive substrings that block a text message from relaying.
    #[serde(default)]
    pub blocked_terms: Vec<String>,
}

impl Default for ModerationConfig {
    fn default() -> Self {
        Self {
            auto_ban_threshold: default_auto_ban_threshold(),
            auto_ban_days: default_auto_ban_days(),
            blocked_terms: Vec::new(),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LogConfig {
    /// Output format for the tracing subscriber.
    #[serde(default)]
    pub format: LogFormat,
}

impl Config {
    /// Load configuration from a TOML file, then apply environment
    /// overrides.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let mut config: Config = toml::from_str(&content)?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// A config built purely from defaults and environment variables, for
    /// deployments that run without a file at all.
    pub fn from_env() -> Self {
        let mut config = Config {
            bot: BotConfig {
                token: String::new(),
                admins: Vec::new(),
            },
            store: StoreConfig::default(),
            matching: MatchingConfig::default(),
            limits: LimitsConfig::default(),
            moderation: ModerationConfig::default(),
            log: LogConfig::default(),
        };
        config.apply_env_overrides();
        config
    }

    /// Apply `VEILBOT_*` environment variable overrides in place.
    fn apply_env_overrides(&mut self) {
        if let Ok(token) = std::env::var("VEILBOT_TOKEN") {
            self.bot.token = token;
        }
        if let Ok(url) = std::env::var("VEILBOT_STORE_URL") {
            self.store.url = url;
        }
        if let Ok(admins) = std::env::var("VEILBOT_ADMINS") {
            self.bot.admins = admins
                .split(',')
                .filter_map(|s| s.trim().parse().ok())
                .collect();
        }
        override_parse(&mut self.matching.chat_timeout_secs, "VEILBOT_CHAT_TIMEOUT_SECS");
        override_parse(&mut self.matching.max_queue_size, "VEILBOT_MAX_QUEUE_SIZE");
        override_parse(&mut self.limits.messages_per_minute, "VEILBOT_MESSAGES_PER_MINUTE");
        override_parse(&mut self.limits.chat_per_minute, "VEILBOT_CHAT_PER_MINUTE");
        override_parse(&mut self.limits.next_per_minute, "VEILBOT_NEXT_PER_MINUTE");
        override_parse(&mut self.moderation.auto_ban_threshold, "VEILBOT_AUTO_BAN_THRESHOLD");
        override_parse(&mut self.moderation.auto_ban_days, "VEILBOT_AUTO_BAN_DAYS");
    }
}

fn override_parse<T: std::str::FromStr>(slot: &mut T, var: &str) {
    if let Ok(raw) = std::env::var(var) {
        if let Ok(value) = raw.parse() {
            *slot = value;
        } else {
            tracing::warn!(var = var, value = %raw, "Ignoring unparseable env override");
        }
    }
}

/// Validate a loaded configuration. Returns all problems, not just the
/// first, so an operator fixes the file in one pass.
pub fn validate(config: &Config) -> Result<(), Vec<String>> {
    let mut errors = Vec::new();

    if config.bot.token.is_empty() {
        errors.push("bot.token is required (or set VEILBOT_TOKEN)".to_string());
    }
    if config.matching.chat_timeout_secs == 0 {
        errors.push("matching.chat_timeout_secs must be greater than zero".to_string());
    }
    if config.matching.max_queue_size == 0 {
        errors.push("matching.max_queue_size must be greater than zero".to_string());
    }
    if config.limits.messages_per_minute == 0 {
        errors.push("limits.messages_per_minute must be greater than zero".to_string());
    }
    if config.moderation.auto_ban_threshold <= 0 {
        errors.push("moderation.auto_ban_threshold must be positive".to_string());
    }
    if config.moderation.auto_ban_days <= 0 {
        errors.push("moderation.auto_ban_days must be positive".to_string());
    }

    if errors.is_empty() { Ok(()) } else { Err(errors) }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minimal_config_parses_with_defaults() {
        let config: Config = toml::from_str(
            r#"
            [bot]
            token = "123:abc"
            admins = [42]
            "#,
        )
        .unwrap();

        assert_eq!(config.bot.admins, vec![42]);
        assert_eq!(config.store.url, "redis://127.0.0.1/");
        assert_eq!(config.matching.chat_timeout_secs, 600);
        assert_eq!(config.matching.max_queue_size, 1000);
        assert_eq!(config.limits.messages_per_minute, 20);
        assert_eq!(config.moderation.auto_ban_threshold, 5);
        assert_eq!(config.log.format, LogFormat::Pretty);
    }

    #[test]
    fn test_validate_rejects_empty_token() {
        let config: Config = toml::from_str("[bot]\n").unwrap();
        let errors = validate(&config).unwrap_err();
        assert!(errors.iter().any(|e| e.contains("bot.token")));
    }

    #[test]
    fn test_validate_rejects_zero_timeout() {
        let config: Config = toml::from_str(
            r#"
            [bot]
            token = "t"
            [matching]
            chat_timeout_secs = 0
            "#,
        )
        .unwrap();
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_log_format_parses() {
        let config: Config = toml::from_str(
            r#"
            [bot]
            token = "t"
            [log]
            format = "json"
            "#,
        )
        .unwrap();
        assert_eq!(config.log.format, LogFormat::Json);
    }
}
