//! chatlink: resilient real-time connection manager
//!
//! Keeps a chat client's messaging link logically connected across an
//! unreliable network. See [`ConnectionManager`] for the entry point.

pub mod connection;
pub mod error;
pub mod heartbeat;
pub mod policy;
pub mod queue;
pub mod transport;

pub use chatlink_shared::{
    codec, defaults, reserved, AuthResponse, ClientIdentity, ConnectionState, Envelope,
};
pub use connection::{
    ConnectionConfig, ConnectionManager, DisconnectEvent, DisconnectReason, SendOutcome,
    Subscription,
};
pub use error::{ConfigError, LinkError};
