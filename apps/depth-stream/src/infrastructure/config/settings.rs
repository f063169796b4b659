//! Client Configuration Settings
//!
//! Configuration types for the depth stream client, loaded from environment
//! variables.

use std::time::Duration;

use crate::infrastructure::binance::transport::DEFAULT_STREAM_URL;
use crate::infrastructure::delivery::DEFAULT_CAPACITY;

/// Default subscription symbol.
pub const DEFAULT_SYMBOL: &str = "btcusdt";

/// Reconnection settings.
#[derive(Debug, Clone)]
pub struct ReconnectSettings {
    /// Whether to reconnect automatically after a connection failure.
    pub enabled: bool,
    /// Delay before the first reconnect attempt.
    pub delay_initial: Duration,
    /// Maximum delay between reconnect attempts.
    pub delay_max: Duration,
    /// Delay multiplier for exponential backoff.
    pub delay_multiplier: f64,
    /// Consecutive failed attempts before giving up (0 = unlimited).
    pub max_attempts: u32,
}

impl Default for ReconnectSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            delay_initial: Duration::from_secs(5),
            delay_max: Duration::from_secs(300),
            delay_multiplier: 2.0,
            max_attempts: 5,
        }
    }
}

/// Complete client configuration.
#[derive(Debug, Clone)]
pub struct ClientSettings {
    /// Stream endpoint.
    pub url: String,
    /// Symbol to subscribe to (lower case).
    pub symbol: String,
    /// Delivery channel capacity (0 = strict hand-off).
    pub channel_capacity: usize,
    /// Reconnection settings.
    pub reconnect: ReconnectSettings,
    /// Prometheus listener port (0 = disabled).
    pub metrics_port: u16,
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            url: DEFAULT_STREAM_URL.to_string(),
            symbol: DEFAULT_SYMBOL.to_string(),
            channel_capacity: DEFAULT_CAPACITY,
            reconnect: ReconnectSettings::default(),
            metrics_port: 9090,
        }
    }
}

impl ClientSettings {
    /// Create configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if the symbol or endpoint is set but empty.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Create configuration from an arbitrary key lookup.
    ///
    /// # Errors
    ///
    /// Returns an error if the symbol or endpoint is set but empty.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let url = match lookup("DEPTH_STREAM_URL") {
            Some(url) if url.trim().is_empty() => {
                return Err(ConfigError::EmptyValue("DEPTH_STREAM_URL".to_string()));
            }
            Some(url) => url.trim().to_string(),
            None => defaults.url,
        };

        let symbol = match lookup("DEPTH_STREAM_SYMBOL") {
            Some(symbol) if symbol.trim().is_empty() => {
                return Err(ConfigError::EmptyValue("DEPTH_STREAM_SYMBOL".to_string()));
            }
            Some(symbol) => symbol.trim().to_lowercase(),
            None => defaults.symbol,
        };

        let reconnect = ReconnectSettings {
            enabled: parse_bool(
                lookup("DEPTH_STREAM_RECONNECT"),
                defaults.reconnect.enabled,
            ),
            delay_initial: parse_duration_millis(
                lookup("DEPTH_STREAM_RECONNECT_DELAY_INITIAL_MS"),
                defaults.reconnect.delay_initial,
            ),
            delay_max: parse_duration_secs(
                lookup("DEPTH_STREAM_RECONNECT_DELAY_MAX_SECS"),
                defaults.reconnect.delay_max,
            ),
            delay_multiplier: parse_multiplier(
                lookup("DEPTH_STREAM_RECONNECT_DELAY_MULTIPLIER"),
                defaults.reconnect.delay_multiplier,
            ),
            max_attempts: parse_or(
                lookup("DEPTH_STREAM_MAX_RECONNECT_ATTEMPTS"),
                defaults.reconnect.max_attempts,
            ),
        };

        Ok(Self {
            url,
            symbol,
            channel_capacity: parse_or(
                lookup("DEPTH_STREAM_CHANNEL_CAPACITY"),
                defaults.channel_capacity,
            ),
            reconnect,
            metrics_port: parse_or(lookup("DEPTH_STREAM_METRICS_PORT"), defaults.metrics_port),
        })
    }
}

/// Configuration error.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Environment variable has empty value.
    #[error("environment variable {0} cannot be empty")]
    EmptyValue(String),
}

fn parse_or<T: std::str::FromStr>(value: Option<String>, default: T) -> T {
    value.and_then(|v| v.trim().parse().ok()).unwrap_or(default)
}

fn parse_bool(value: Option<String>, default: bool) -> bool {
    match value.map(|v| v.trim().to_lowercase()).as_deref() {
        Some("true" | "1" | "yes" | "on") => true,
        Some("false" | "0" | "no" | "off") => false,
        _ => default,
    }
}

/// Backoff must not shrink: anything below 1.0 or non-finite keeps the default.
fn parse_multiplier(value: Option<String>, default: f64) -> f64 {
    match value.map(|v| v.trim().parse::<f64>()) {
        Some(Ok(multiplier)) if multiplier.is_finite() && multiplier >= 1.0 => multiplier,
        Some(_) => {
            tracing::warn!(default, "Invalid reconnect delay multiplier, using default");
            default
        }
        None => default,
    }
}

/// Zero durations keep the default.
fn parse_duration_secs(value: Option<String>, default: Duration) -> Duration {
    value
        .and_then(|v| v.trim().parse::<u64>().ok())
        .filter(|secs| *secs > 0)
        .map_or(default, Duration::from_secs)
}

/// Zero durations keep the default.
fn parse_duration_millis(value: Option<String>, default: Duration) -> Duration {
    value
        .and_then(|v| v.trim().parse::<u64>().ok())
        .filter(|millis| *millis > 0)
        .map_or(default, Duration::from_millis)
}
