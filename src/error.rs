//! Errors reported by the connection manager

use std::time::Duration;
use thiserror::Error;

/// Failures delivered to on-error callbacks.
///
/// None of these escape the public API as a `Result`; the manager reacts to
/// them internally and reports them here.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LinkError {
    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Connection attempt timed out after {0:?}")]
    ConnectTimeout(Duration),

    #[error("No pong within {0:?} of heartbeat ping")]
    HeartbeatTimeout(Duration),

    #[error("Connection closed by peer (code {code}): {reason}")]
    Closed { code: u16, reason: String },

    #[error("Connection stream ended unexpectedly")]
    StreamEnded,

    #[error("Authentication rejected: {0}")]
    AuthRejected(String),

    #[error("Gave up after {0} reconnect attempts")]
    ReconnectExhausted(u32),
}

/// Invalid connection configuration
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Endpoint URL is empty")]
    MissingUrl,

    #[error("{0} must be greater than zero")]
    Zero(&'static str),

    #[error("Connection manager must be created inside a tokio runtime")]
    NoRuntime,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = LinkError::Closed {
            code: 1011,
            reason: "server restart".into(),
        };
        assert_eq!(
            err.to_string(),
            "Connection closed by peer (code 1011): server restart"
        );
        assert_eq!(
            ConfigError::Zero("max_queue_size").to_string(),
            "max_queue_size must be greater than zero"
        );
    }
}
