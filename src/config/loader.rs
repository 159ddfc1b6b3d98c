//! Configuration Loader
//!
//! Loads and validates configuration from TOML files matching config.toml
//! structure. Secrets (bot token, chat id) can live in the file or come
//! from the environment / .env; missing credentials are fatal at startup.

use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

use crate::domain::FilterConfig;

/// Main configuration structure matching config.toml
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub service: ServiceSection,
    #[serde(default)]
    pub provider: ProviderSection,
    pub telegram: TelegramSection,
    #[serde(default)]
    pub stream: StreamSection,
    pub filters: Vec<FilterConfig>,
}

/// Service-wide intervals and paths
#[derive(Debug, Clone, Deserialize)]
pub struct ServiceSection {
    /// Discovery cycle interval in seconds
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,
    /// Per-filter evaluation interval in seconds
    #[serde(default = "default_filter_poll_secs")]
    pub filter_poll_secs: u64,
    /// Extra horizon past a filter's max age before a known token is purged
    #[serde(default = "default_cleanup_buffer_hours")]
    pub cleanup_buffer_hours: f64,
    /// Directory for the JSON state files
    #[serde(default = "default_data_dir")]
    pub data_dir: String,
}

impl Default for ServiceSection {
    fn default() -> Self {
        Self {
            poll_interval_secs: default_poll_interval_secs(),
            filter_poll_secs: default_filter_poll_secs(),
            cleanup_buffer_hours: default_cleanup_buffer_hours(),
            data_dir: default_data_dir(),
        }
    }
}

impl ServiceSection {
    /// Data directory with environment override and `~` expansion.
    /// Checks PUMPWATCH_DATA_DIR first, falls back to the config value.
    pub fn resolved_data_dir(&self) -> PathBuf {
        let raw = std::env::var("PUMPWATCH_DATA_DIR").unwrap_or_else(|_| self.data_dir.clone());
        PathBuf::from(shellexpand::tilde(&raw).to_string())
    }
}

/// Market-data provider (DexScreener)
#[derive(Debug, Clone, Deserialize)]
pub struct ProviderSection {
    #[serde(default = "default_provider_base_url")]
    pub base_url: String,
    #[serde(default = "default_provider_timeout_secs")]
    pub timeout_secs: u64,
    /// Chain to keep, e.g. "solana"
    #[serde(default = "default_chain_id")]
    pub chain_id: String,
    /// Substring the venue identifier must contain, e.g. "pump"
    #[serde(default = "default_venue_marker")]
    pub venue_marker: String,
    /// Fixed free-text queries run every discovery cycle
    #[serde(default = "default_search_queries")]
    pub search_queries: Vec<String>,
}

impl Default for ProviderSection {
    fn default() -> Self {
        Self {
            base_url: default_provider_base_url(),
            timeout_secs: default_provider_timeout_secs(),
            chain_id: default_chain_id(),
            venue_marker: default_venue_marker(),
            search_queries: default_search_queries(),
        }
    }
}

/// Telegram credentials and limits
#[derive(Debug, Clone, Deserialize)]
pub struct TelegramSection {
    /// Bot token; prefer TELEGRAM_BOT_TOKEN in .env over committing it here
    #[serde(default)]
    pub bot_token: String,
    /// Target chat id
    #[serde(default)]
    pub chat_id: String,
    #[serde(default = "default_telegram_timeout_secs")]
    pub timeout_secs: u64,
}

impl TelegramSection {
    /// Bot token with environment override.
    /// Checks TELEGRAM_BOT_TOKEN first, falls back to the config value.
    pub fn resolved_bot_token(&self) -> String {
        match std::env::var("TELEGRAM_BOT_TOKEN") {
            Ok(token) if !token.is_empty() => token,
            _ => self.bot_token.clone(),
        }
    }

    /// Chat id with environment override.
    /// Checks TELEGRAM_CHAT_ID first, falls back to the config value.
    pub fn resolved_chat_id(&self) -> String {
        match std::env::var("TELEGRAM_CHAT_ID") {
            Ok(chat_id) if !chat_id.is_empty() => chat_id,
            _ => self.chat_id.clone(),
        }
    }

    /// The resolved chat id as the integer Telegram uses.
    pub fn chat_id_i64(&self) -> Option<i64> {
        self.resolved_chat_id().parse().ok()
    }
}

/// PumpPortal graduation stream
#[derive(Debug, Clone, Deserialize)]
pub struct StreamSection {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_ws_url")]
    pub ws_url: String,
    /// Fixed reconnect delay after a disconnect
    #[serde(default = "default_reconnect_secs")]
    pub reconnect_secs: u64,
    /// Metadata lookup attempts for a just-graduated mint
    #[serde(default = "default_meta_retries")]
    pub meta_retries: u32,
    #[serde(default = "default_meta_retry_delay_secs")]
    pub meta_retry_delay_secs: u64,
}

impl Default for StreamSection {
    fn default() -> Self {
        Self {
            enabled: default_true(),
            ws_url: default_ws_url(),
            reconnect_secs: default_reconnect_secs(),
            meta_retries: default_meta_retries(),
            meta_retry_delay_secs: default_meta_retry_delay_secs(),
        }
    }
}

// Default value functions
fn default_poll_interval_secs() -> u64 {
    180
}
fn default_filter_poll_secs() -> u64 {
    90
}
fn default_cleanup_buffer_hours() -> f64 {
    48.0
}
fn default_data_dir() -> String {
    "data".to_string()
}
fn default_provider_base_url() -> String {
    "https://api.dexscreener.com".to_string()
}
fn default_provider_timeout_secs() -> u64 {
    15
}
fn default_chain_id() -> String {
    "solana".to_string()
}
fn default_venue_marker() -> String {
    "pump".to_string()
}
fn default_search_queries() -> Vec<String> {
    ["pumpswap", "pump fun", "pump sol", "pump.fun", "pump swap"]
        .into_iter()
        .map(String::from)
        .collect()
}
fn default_telegram_timeout_secs() -> u64 {
    10
}
fn default_true() -> bool {
    true
}
fn default_ws_url() -> String {
    "wss://pumpportal.fun/api/data".to_string()
}
fn default_reconnect_secs() -> u64 {
    5
}
fn default_meta_retries() -> u32 {
    6
}
fn default_meta_retry_delay_secs() -> u64 {
    5
}

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    IoError(#[from] std::io::Error),
    #[error("Failed to parse TOML: {0}")]
    ParseError(#[from] toml::de::Error),
    #[error("Validation failed: {0}")]
    ValidationError(String),
}

/// Load configuration from a TOML file
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<Config, ConfigError> {
    let content = std::fs::read_to_string(path)?;
    let config: Config = toml::from_str(&content)?;
    config.validate()?;
    Ok(config)
}

impl Config {
    /// Validate all configuration parameters. Credentials are checked in
    /// their resolved form so an .env-only setup passes.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.service.poll_interval_secs == 0 {
            return Err(ConfigError::ValidationError(
                "poll_interval_secs must be > 0".to_string(),
            ));
        }
        if self.service.filter_poll_secs == 0 {
            return Err(ConfigError::ValidationError(
                "filter_poll_secs must be > 0".to_string(),
            ));
        }
        if self.service.cleanup_buffer_hours < 0.0 {
            return Err(ConfigError::ValidationError(format!(
                "cleanup_buffer_hours must be >= 0, got {}",
                self.service.cleanup_buffer_hours
            )));
        }

        if self.provider.base_url.is_empty() {
            return Err(ConfigError::ValidationError(
                "provider.base_url cannot be empty".to_string(),
            ));
        }
        if self.provider.chain_id.is_empty() {
            return Err(ConfigError::ValidationError(
                "provider.chain_id cannot be empty".to_string(),
            ));
        }
        if self.provider.venue_marker.is_empty() {
            return Err(ConfigError::ValidationError(
                "provider.venue_marker cannot be empty".to_string(),
            ));
        }
        if self.provider.timeout_secs == 0 {
            return Err(ConfigError::ValidationError(
                "provider.timeout_secs must be > 0".to_string(),
            ));
        }

        if self.telegram.resolved_bot_token().is_empty() {
            return Err(ConfigError::ValidationError(
                "telegram bot token missing: set telegram.bot_token or TELEGRAM_BOT_TOKEN"
                    .to_string(),
            ));
        }
        if self.telegram.resolved_chat_id().is_empty() {
            return Err(ConfigError::ValidationError(
                "telegram chat id missing: set telegram.chat_id or TELEGRAM_CHAT_ID".to_string(),
            ));
        }
        if self.telegram.chat_id_i64().is_none() {
            return Err(ConfigError::ValidationError(format!(
                "telegram chat id must be an integer, got {:?}",
                self.telegram.resolved_chat_id()
            )));
        }

        if self.filters.is_empty() {
            return Err(ConfigError::ValidationError(
                "at least one [[filters]] entry is required".to_string(),
            ));
        }
        let mut keys = std::collections::HashSet::new();
        for filter in &self.filters {
            if filter.key.is_empty() {
                return Err(ConfigError::ValidationError(
                    "filter key cannot be empty".to_string(),
                ));
            }
            // Keys namespace state files on disk.
            if !filter
                .key
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
            {
                return Err(ConfigError::ValidationError(format!(
                    "filter key {:?} may only contain [a-zA-Z0-9-_]",
                    filter.key
                )));
            }
            if !keys.insert(filter.key.clone()) {
                return Err(ConfigError::ValidationError(format!(
                    "duplicate filter key {:?}",
                    filter.key
                )));
            }
            if filter.min_market_cap < 0.0 {
                return Err(ConfigError::ValidationError(format!(
                    "[{}] min_market_cap must be >= 0",
                    filter.key
                )));
            }
            if filter.min_market_cap > filter.max_market_cap {
                return Err(ConfigError::ValidationError(format!(
                    "[{}] min_market_cap exceeds max_market_cap",
                    filter.key
                )));
            }
            if filter.min_age_hours < 0.0 || filter.min_age_hours > filter.max_age_hours {
                return Err(ConfigError::ValidationError(format!(
                    "[{}] age bounds invalid: {} - {}",
                    filter.key, filter.min_age_hours, filter.max_age_hours
                )));
            }
            if filter.max_age_hours <= 0.0 {
                return Err(ConfigError::ValidationError(format!(
                    "[{}] max_age_hours must be > 0",
                    filter.key
                )));
            }
        }

        if self.stream.enabled {
            if self.stream.ws_url.is_empty() {
                return Err(ConfigError::ValidationError(
                    "stream.ws_url cannot be empty".to_string(),
                ));
            }
            if self.stream.reconnect_secs == 0 {
                return Err(ConfigError::ValidationError(
                    "stream.reconnect_secs must be > 0".to_string(),
                ));
            }
        }

        Ok(())
    }

    /// Largest max-age across active filters; the cleanup horizon must not
    /// purge a token any filter still wants to watch.
    pub fn max_filter_age_hours(&self) -> f64 {
        self.filters
            .iter()
            .map(|f| f.max_age_hours)
            .fold(0.0, f64::max)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn create_valid_config() -> String {
        r#"
[service]
poll_interval_secs = 180
filter_poll_secs = 90
cleanup_buffer_hours = 48.0
data_dir = "data"

[provider]
chain_id = "solana"
venue_marker = "pump"
search_queries = ["pumpswap", "pump fun"]

[telegram]
bot_token = "123:abc"
chat_id = "-100200300"

[stream]
enabled = true

[[filters]]
key = "f2"
label = "Gem Alert — MCap $200K-$1M"
min_market_cap = 200000.0
max_market_cap = 1000000.0
min_age_hours = 24.0
max_age_hours = 720.0
min_volume_24h = 100000.0
min_change_24h_pct = 10.0
require_profile = true
alert_policy = "on-entry"

[[filters]]
key = "f3"
label = "Moonshot Alert — MCap >$1M"
min_market_cap = 1000000.0
min_age_hours = 24.0
max_age_hours = 720.0
min_volume_24h = 100000.0
min_change_24h_pct = 10.0
"#
        .to_string()
    }

    fn load(content: &str) -> Result<Config, ConfigError> {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        load_config(file.path())
    }

    #[test]
    fn test_load_valid_config() {
        let config = load(&create_valid_config()).unwrap();

        assert_eq!(config.service.poll_interval_secs, 180);
        assert_eq!(config.service.filter_poll_secs, 90);
        assert_eq!(config.provider.chain_id, "solana");
        assert_eq!(config.filters.len(), 2);
        assert_eq!(config.filters[0].key, "f2");
        assert!(config.filters[1].max_market_cap.is_infinite());
        assert_eq!(config.telegram.chat_id_i64(), Some(-100_200_300));
        assert!(config.stream.enabled);
    }

    #[test]
    fn test_defaults_fill_missing_sections() {
        let minimal = r#"
[telegram]
bot_token = "123:abc"
chat_id = "42"

[[filters]]
key = "f2"
label = "Gem"
"#;
        let config = load(minimal).unwrap();
        assert_eq!(config.service.poll_interval_secs, 180);
        assert_eq!(config.provider.base_url, "https://api.dexscreener.com");
        assert_eq!(config.provider.search_queries.len(), 5);
        assert_eq!(config.stream.meta_retries, 6);
        assert_eq!(config.filters[0].max_age_hours, 720.0);
    }

    #[test]
    fn test_load_missing_file() {
        let result = load_config("/nonexistent/path/config.toml");
        assert!(matches!(result.unwrap_err(), ConfigError::IoError(_)));
    }

    #[test]
    fn test_missing_filters_rejected() {
        let content = r#"
filters = []

[telegram]
bot_token = "123:abc"
chat_id = "42"
"#;
        let result = load(content);
        assert!(matches!(
            result.unwrap_err(),
            ConfigError::ValidationError(_)
        ));
    }

    #[test]
    fn test_duplicate_filter_keys_rejected() {
        let mut content = create_valid_config();
        content = content.replace("key = \"f3\"", "key = \"f2\"");
        let result = load(&content);
        assert!(matches!(
            result.unwrap_err(),
            ConfigError::ValidationError(_)
        ));
    }

    #[test]
    fn test_non_numeric_chat_id_rejected() {
        let content = create_valid_config().replace("-100200300", "not-a-number");
        let result = load(&content);
        assert!(matches!(
            result.unwrap_err(),
            ConfigError::ValidationError(_)
        ));
    }

    #[test]
    fn test_unsafe_filter_key_rejected() {
        let content = create_valid_config().replace("key = \"f2\"", "key = \"f2/../x\"");
        let result = load(&content);
        assert!(matches!(
            result.unwrap_err(),
            ConfigError::ValidationError(_)
        ));
    }

    #[test]
    fn test_inverted_market_cap_band_rejected() {
        let content =
            create_valid_config().replace("min_market_cap = 200000.0", "min_market_cap = 2000000.0");
        let result = load(&content);
        assert!(matches!(
            result.unwrap_err(),
            ConfigError::ValidationError(_)
        ));
    }

    #[test]
    fn test_zero_poll_interval_rejected() {
        let content =
            create_valid_config().replace("poll_interval_secs = 180", "poll_interval_secs = 0");
        let result = load(&content);
        assert!(matches!(
            result.unwrap_err(),
            ConfigError::ValidationError(_)
        ));
    }

    #[test]
    fn test_max_filter_age_hours() {
        let mut config = load(&create_valid_config()).unwrap();
        assert_eq!(config.max_filter_age_hours(), 720.0);
        config.filters[1].max_age_hours = 1_000.0;
        assert_eq!(config.max_filter_age_hours(), 1_000.0);
    }
}
