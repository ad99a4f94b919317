//! Configuration for poly-watch.
//!
//! Supports loading from a TOML file with environment variable and CLI
//! overrides. Stream timing parameters default to the values the engine
//! expects (30 s heartbeat, fixed 2 s reconnect delay).

use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::types::BotName;

/// Top-level configuration for the monitor client.
#[derive(Debug, Clone)]
pub struct WatchConfig {
    /// Base HTTP(S) endpoint of the engine API. The stream address is
    /// derived from it by upgrading the scheme.
    pub base_url: String,

    /// Interval between client keep-alive `"ping"` frames.
    pub heartbeat_interval: Duration,

    /// Fixed delay before a reconnect attempt. There is deliberately no
    /// backoff growth and no attempt cap: the stream reconnects forever
    /// while a credential remains valid.
    pub reconnect_delay: Duration,

    /// Timeout for the WebSocket handshake.
    pub connect_timeout: Duration,

    /// The one bot whose scan activity feeds the shared history.
    pub scan_feed_bot: BotName,

    /// Logging level.
    pub log_level: String,

    /// Interval between status summaries logged by the binary.
    pub status_interval: Duration,
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8000".to_string(),
            heartbeat_interval: Duration::from_secs(30),
            reconnect_delay: Duration::from_secs(2),
            connect_timeout: Duration::from_secs(10),
            scan_feed_bot: BotName::Sniper,
            log_level: "info".to_string(),
            status_interval: Duration::from_secs(30),
        }
    }
}

impl WatchConfig {
    /// Load configuration from a TOML file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read config file: {:?}", path.as_ref()))?;
        Self::from_toml_str(&content)
    }

    /// Parse configuration from a TOML string.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let file: TomlConfig = toml::from_str(content).context("Failed to parse TOML config")?;
        Ok(Self::from(file))
    }

    /// Apply environment variable overrides.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(url) = std::env::var("POLY_WATCH_BASE_URL") {
            self.base_url = url;
        }
        if let Ok(level) = std::env::var("POLY_WATCH_LOG_LEVEL") {
            self.log_level = level;
        }
    }

    /// Apply CLI overrides.
    pub fn apply_cli_overrides(&mut self, base_url: Option<String>, log_level: Option<String>) {
        if let Some(url) = base_url {
            self.base_url = url;
        }
        if let Some(level) = log_level {
            self.log_level = level;
        }
    }

    /// Full stream address, credential included. Never log this —
    /// use [`WatchConfig::redacted_stream_url`] for diagnostics.
    pub fn stream_url(&self, token: &str) -> String {
        format!("{}/ws?token={}", ws_base(&self.base_url), token)
    }

    /// Stream address with the credential redacted, safe to log.
    pub fn redacted_stream_url(&self) -> String {
        format!("{}/ws?token=<redacted>", ws_base(&self.base_url))
    }
}

/// Derive the streaming variant of the base endpoint, preserving
/// secure/insecure parity with the configured scheme.
fn ws_base(base: &str) -> String {
    let trimmed = base.trim_end_matches('/');
    if let Some(rest) = trimmed.strip_prefix("https://") {
        format!("wss://{rest}")
    } else if let Some(rest) = trimmed.strip_prefix("http://") {
        format!("ws://{rest}")
    } else if trimmed.starts_with("ws://") || trimmed.starts_with("wss://") {
        trimmed.to_string()
    } else {
        format!("ws://{trimmed}")
    }
}

// ============================================================================
// TOML file shape
// ============================================================================

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct TomlConfig {
    general: TomlGeneral,
    stream: TomlStream,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
struct TomlGeneral {
    log_level: String,
    status_interval_secs: u64,
}

impl Default for TomlGeneral {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            status_interval_secs: 30,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
struct TomlStream {
    base_url: String,
    heartbeat_secs: u64,
    reconnect_delay_secs: u64,
    connect_timeout_secs: u64,
    scan_feed_bot: String,
}

impl Default for TomlStream {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8000".to_string(),
            heartbeat_secs: 30,
            reconnect_delay_secs: 2,
            connect_timeout_secs: 10,
            scan_feed_bot: "sniper".to_string(),
        }
    }
}

impl From<TomlConfig> for WatchConfig {
    fn from(toml: TomlConfig) -> Self {
        Self {
            base_url: toml.stream.base_url,
            heartbeat_interval: Duration::from_secs(toml.stream.heartbeat_secs),
            reconnect_delay: Duration::from_secs(toml.stream.reconnect_delay_secs),
            connect_timeout: Duration::from_secs(toml.stream.connect_timeout_secs),
            scan_feed_bot: toml
                .stream
                .scan_feed_bot
                .parse()
                .unwrap_or(BotName::Sniper),
            log_level: toml.general.log_level,
            status_interval: Duration::from_secs(toml.general.status_interval_secs),
        }
    }
}
