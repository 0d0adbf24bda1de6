//! Connection manager configuration

use crate::error::ConfigError;
use crate::heartbeat::HeartbeatSettings;
use crate::policy::ReconnectPolicy;
use chatlink_shared::defaults;
use std::fmt;
use std::time::Duration;

/// Configuration for connection manager
#[derive(Clone)]
pub struct ConnectionConfig {
    /// Endpoint URL, e.g. `wss://chat.example.com/ws`
    pub url: String,
    /// Reconnect automatically after transport failures
    pub auto_reconnect: bool,
    /// Failed attempts after which the manager gives up
    pub max_reconnect_attempts: u32,
    /// Reconnection delay (initial, doubled per attempt)
    pub reconnect_base_delay: Duration,
    /// Maximum reconnection delay before jitter
    pub max_reconnect_delay: Duration,
    /// Upper bound of the random delay added to every backoff
    pub reconnect_jitter: Duration,
    /// Time between heartbeat pings
    pub heartbeat_interval: Duration,
    /// Time allowed for a pong (independent of the interval)
    pub heartbeat_timeout: Duration,
    /// Outbound queue capacity
    pub max_queue_size: usize,
    /// Connection establishment timeout
    pub connect_timeout: Duration,
    /// Sends admitted per trailing second
    pub rate_limit_per_second: u32,
    /// Token sent in an `auth` envelope on every open
    pub auth_token: Option<String>,
}

impl ConnectionConfig {
    /// Default configuration for the given endpoint
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Default::default()
        }
    }

    /// Check that every setting is usable
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.url.trim().is_empty() {
            return Err(ConfigError::MissingUrl);
        }
        if self.max_queue_size == 0 {
            return Err(ConfigError::Zero("max_queue_size"));
        }
        if self.rate_limit_per_second == 0 {
            return Err(ConfigError::Zero("rate_limit_per_second"));
        }
        if self.heartbeat_interval.is_zero() {
            return Err(ConfigError::Zero("heartbeat_interval"));
        }
        if self.heartbeat_timeout.is_zero() {
            return Err(ConfigError::Zero("heartbeat_timeout"));
        }
        if self.connect_timeout.is_zero() {
            return Err(ConfigError::Zero("connect_timeout"));
        }
        Ok(())
    }

    pub fn reconnect_policy(&self) -> ReconnectPolicy {
        ReconnectPolicy::new(
            self.reconnect_base_delay,
            self.max_reconnect_delay,
            self.reconnect_jitter,
            self.max_reconnect_attempts,
        )
    }

    pub fn heartbeat_settings(&self) -> HeartbeatSettings {
        HeartbeatSettings {
            interval: self.heartbeat_interval,
            timeout: self.heartbeat_timeout,
        }
    }
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            url: "ws://127.0.0.1:8080/ws".into(),
            auto_reconnect: true,
            max_reconnect_attempts: defaults::MAX_RECONNECT_ATTEMPTS,
            reconnect_base_delay: Duration::from_millis(defaults::RECONNECT_BASE_MS),
            max_reconnect_delay: Duration::from_millis(defaults::RECONNECT_CAP_MS),
            reconnect_jitter: Duration::from_millis(defaults::RECONNECT_JITTER_MS),
            heartbeat_interval: Duration::from_millis(defaults::HEARTBEAT_INTERVAL_MS),
            heartbeat_timeout: Duration::from_millis(defaults::HEARTBEAT_TIMEOUT_MS),
            max_queue_size: defaults::MAX_QUEUE_SIZE,
            connect_timeout: Duration::from_millis(defaults::CONNECT_TIMEOUT_MS),
            rate_limit_per_second: defaults::RATE_LIMIT_PER_SECOND,
            auth_token: None,
        }
    }
}

// Hand-written so the auth token never reaches the logs
impl fmt::Debug for ConnectionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionConfig")
            .field("url", &self.url)
            .field("auto_reconnect", &self.auto_reconnect)
            .field("max_reconnect_attempts", &self.max_reconnect_attempts)
            .field("reconnect_base_delay", &self.reconnect_base_delay)
            .field("max_reconnect_delay", &self.max_reconnect_delay)
            .field("reconnect_jitter", &self.reconnect_jitter)
            .field("heartbeat_interval", &self.heartbeat_interval)
            .field("heartbeat_timeout", &self.heartbeat_timeout)
            .field("max_queue_size", &self.max_queue_size)
            .field("connect_timeout", &self.connect_timeout)
            .field("rate_limit_per_second", &self.rate_limit_per_second)
            .field("auth_token", &self.auth_token.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}
