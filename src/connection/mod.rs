//! Connection management for a persistent bidirectional chat link
//!
//! This module handles:
//! - The connection state machine and automatic reconnection
//! - Heartbeat liveness probing
//! - Queued, rate-limited outbound delivery
//! - Callback registration for inbound messages and link events

mod callbacks;
mod config;
mod manager;

pub use callbacks::Subscription;
pub use config::ConnectionConfig;
pub use manager::{ConnectionManager, DisconnectEvent, DisconnectReason, SendOutcome};
