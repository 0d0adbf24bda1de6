//! chatlink shared protocol types
//!
//! This crate provides the envelope type, the JSON frame codec and the
//! connection state machine shared by the connection manager and any peer
//! that speaks the same wire format.

pub mod codec;
pub mod state_machine;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::fs;
use std::io;
use std::path::Path;

pub use state_machine::ConnectionState;

/// Envelope types intercepted by the connection manager
pub mod reserved {
    pub const PING: &str = "ping";
    pub const PONG: &str = "pong";
    pub const AUTH: &str = "auth";
    pub const AUTH_RESPONSE: &str = "auth_response";

    /// Returns true if `kind` is handled by the manager itself
    pub fn is_reserved(kind: &str) -> bool {
        matches!(kind, PING | PONG | AUTH | AUTH_RESPONSE)
    }
}

/// Default timing and sizing parameters for a link
pub mod defaults {
    /// Heartbeat ping interval in milliseconds
    pub const HEARTBEAT_INTERVAL_MS: u64 = 30_000;

    /// Time allowed for a pong after a ping
    pub const HEARTBEAT_TIMEOUT_MS: u64 = 10_000;

    /// Connection establishment timeout
    pub const CONNECT_TIMEOUT_MS: u64 = 15_000;

    /// Base reconnect delay, doubled per attempt
    pub const RECONNECT_BASE_MS: u64 = 1_000;

    /// Upper bound on the exponential part of the reconnect delay
    pub const RECONNECT_CAP_MS: u64 = 30_000;

    /// Upper bound of the uniform jitter added to every reconnect delay
    pub const RECONNECT_JITTER_MS: u64 = 1_000;

    /// Automatic reconnect attempts before giving up
    pub const MAX_RECONNECT_ATTEMPTS: u32 = 10;

    /// Outbound queue capacity
    pub const MAX_QUEUE_SIZE: usize = 100;

    /// Sends admitted per trailing second
    pub const RATE_LIMIT_PER_SECOND: u32 = 10;

    /// WebSocket close code for a clean shutdown
    pub const NORMAL_CLOSURE: u16 = 1000;

    /// Reported when the peer closes without a status code
    pub const NO_STATUS_RECEIVED: u16 = 1005;
}

/// Stable identifier for this installation, attached to every envelope
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ClientIdentity(String);

impl ClientIdentity {
    /// Wrap an identity that was persisted elsewhere
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Generate a fresh random identity
    pub fn generate() -> Self {
        Self(format!("client_{}", uuid::Uuid::new_v4().simple()))
    }

    /// Read the identity stored at `path`, creating and storing one if absent
    pub fn load_or_create(path: impl AsRef<Path>) -> io::Result<Self> {
        let path = path.as_ref();
        match fs::read_to_string(path) {
            Ok(contents) if !contents.trim().is_empty() => Ok(Self(contents.trim().to_owned())),
            Ok(_) => Self::create_at(path),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Self::create_at(path),
            Err(e) => Err(e),
        }
    }

    fn create_at(path: &Path) -> io::Result<Self> {
        let identity = Self::generate();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, identity.as_str())?;
        Ok(identity)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ClientIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// The unit of transmission and queuing.
///
/// The payload is opaque to the connection manager. Envelopes are immutable
/// once built; use [`Envelope::with_correlation_id`] while constructing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Envelope {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    payload: Value,
    timestamp: DateTime<Utc>,
    #[serde(default)]
    client_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    correlation_id: Option<String>,
}

impl Envelope {
    /// Create an envelope stamped with the current time
    pub fn new(kind: impl Into<String>, payload: Value, client: &ClientIdentity) -> Self {
        Self {
            kind: kind.into(),
            payload,
            timestamp: Utc::now(),
            client_id: client.as_str().to_owned(),
            correlation_id: None,
        }
    }

    /// Heartbeat probe
    pub fn ping(client: &ClientIdentity) -> Self {
        Self::new(reserved::PING, Value::Null, client)
    }

    /// Reply to a peer's ping, echoing its correlation id
    pub fn pong(client: &ClientIdentity, correlation_id: Option<String>) -> Self {
        Self {
            correlation_id,
            ..Self::new(reserved::PONG, Value::Null, client)
        }
    }

    /// Authentication request carrying an externally stored token
    pub fn auth(client: &ClientIdentity, token: &str) -> Self {
        Self::new(reserved::AUTH, serde_json::json!({ "token": token }), client)
    }

    pub fn with_correlation_id(mut self, id: impl Into<String>) -> Self {
        self.correlation_id = Some(id.into());
        self
    }

    pub fn kind(&self) -> &str {
        &self.kind
    }

    pub fn payload(&self) -> &Value {
        &self.payload
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    pub fn correlation_id(&self) -> Option<&str> {
        self.correlation_id.as_deref()
    }

    /// Whether this envelope is handled by the manager rather than callers
    pub fn is_reserved(&self) -> bool {
        reserved::is_reserved(&self.kind)
    }
}

/// Outcome of an `auth_response` envelope
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct AuthResponse {
    pub success: bool,
    #[serde(default)]
    pub error: Option<String>,
}

impl AuthResponse {
    /// Interpret the payload of an `auth_response` envelope
    pub fn from_envelope(envelope: &Envelope) -> Option<Self> {
        serde_json::from_value(envelope.payload.clone()).ok()
    }
}
