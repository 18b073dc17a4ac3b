//! Configuration file support.
//!
//! Loads settings from `~/.config/adsb-feed/config.toml` on Linux
//! (or platform-appropriate location on other OSes).

use anyhow::{Context, Result, bail};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::client::{DEFAULT_FEED_HOST, DEFAULT_FEED_PORT, FeedConfig};

/// Deserialize a human-readable duration string like "500ms" or "5s".
fn deserialize_duration<'de, D>(deserializer: D) -> Result<Duration, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let s = String::deserialize(deserializer)?;
    parse_duration(&s).map_err(serde::de::Error::custom)
}

/// Parse a human-readable duration string.
///
/// Supports: ms, s, m, h (case-insensitive). A bare number is seconds.
/// Examples: "250ms", "5", "5s", "1.5s", "2m"
pub fn parse_duration(s: &str) -> Result<Duration, String> {
    let s = s.trim();
    if s.is_empty() {
        return Err("empty duration string".to_string());
    }

    let s_lower = s.to_ascii_lowercase();

    // Find where the numeric part ends
    let num_end = s_lower
        .find(|c: char| !c.is_ascii_digit() && c != '.')
        .unwrap_or(s_lower.len());

    let (num_str, unit) = s_lower.split_at(num_end);
    let num: f64 = num_str
        .parse()
        .map_err(|_| format!("invalid number in duration: {}", s))?;

    let seconds_per_unit = match unit.trim() {
        "ms" => 0.001,
        "" | "s" => 1.0,
        "m" => 60.0,
        "h" => 3600.0,
        _ => return Err(format!("unknown duration unit: {}", unit)),
    };

    Duration::try_from_secs_f64(num * seconds_per_unit)
        .map_err(|e| format!("duration out of range: {}: {}", s, e))
}

/// Application configuration loaded from TOML file.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Hostname of the SBS feed used when a start request names none.
    pub feed_host: String,

    /// Port of the SBS feed.
    pub feed_port: u16,

    /// TCP connect timeout.
    #[serde(deserialize_with = "deserialize_duration")]
    pub connect_timeout: Duration,

    /// Read timeout; also bounds how long a stop request can take.
    #[serde(deserialize_with = "deserialize_duration")]
    pub read_timeout: Duration,

    /// Delay between reconnection attempts.
    #[serde(deserialize_with = "deserialize_duration")]
    pub reconnect_delay: Duration,

    /// Minimum time between aircraft snapshot publishes.
    #[serde(deserialize_with = "deserialize_duration")]
    pub publish_interval: Duration,

    /// Idle time before a subscriber receives a keepalive.
    #[serde(deserialize_with = "deserialize_duration")]
    pub keepalive_interval: Duration,

    /// Events a subscriber may fall behind before it starts skipping.
    pub event_buffer: usize,

    /// Port for the HTTP server.
    pub listen_port: u16,

    /// Start the feed immediately at boot.
    pub auto_start: bool,

    /// Print statistics every N seconds (0 disables).
    pub stats_interval: u64,
}

impl Default for Config {
    fn default() -> Self {
        let feed = FeedConfig::default();
        Self {
            feed_host: DEFAULT_FEED_HOST.to_string(),
            feed_port: DEFAULT_FEED_PORT,
            connect_timeout: feed.connect_timeout,
            read_timeout: feed.read_timeout,
            reconnect_delay: feed.reconnect_delay,
            publish_interval: feed.publish_interval,
            keepalive_interval: Duration::from_secs(1),
            event_buffer: 1024,
            listen_port: 5050,
            auto_start: false,
            stats_interval: 30,
        }
    }
}

impl Config {
    /// Load configuration from the default config file location.
    ///
    /// Returns default config if the file doesn't exist.
    /// Returns an error if the file exists but is malformed.
    pub fn load() -> Result<Self> {
        match Self::config_path() {
            Some(path) if path.exists() => Self::load_from(&path),
            _ => Ok(Config::default()),
        }
    }

    /// Load configuration from a specific file.
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        toml::from_str(&content)
            .with_context(|| format!("Invalid TOML in config file: {}", path.display()))
    }

    /// Returns the path to the config file.
    pub fn config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("adsb-feed/config.toml"))
    }

    /// Validate all configuration settings.
    pub fn validate(&self) -> Result<()> {
        if self.feed_host.trim().is_empty() {
            bail!("feed_host must not be empty");
        }
        for (name, value) in [
            ("read_timeout", self.read_timeout),
            ("connect_timeout", self.connect_timeout),
            ("publish_interval", self.publish_interval),
            ("keepalive_interval", self.keepalive_interval),
        ] {
            if value.is_zero() {
                bail!("{} must be greater than zero", name);
            }
        }
        if self.event_buffer == 0 {
            bail!("event_buffer must be greater than zero");
        }
        Ok(())
    }

    /// Runtime settings for the feed client.
    pub fn feed_config(&self) -> FeedConfig {
        FeedConfig {
            host: self.feed_host.clone(),
            port: self.feed_port,
            connect_timeout: self.connect_timeout,
            read_timeout: self.read_timeout,
            reconnect_delay: self.reconnect_delay,
            publish_interval: self.publish_interval,
        }
    }
}
