//! Pacing policies for the link
//!
//! - Exponential reconnect backoff with jitter and an attempt ceiling
//! - Sliding-window admission control for outbound sends

mod rate_limit;
mod reconnect;

pub use rate_limit::RateLimiter;
pub use reconnect::{ReconnectDecision, ReconnectPolicy, ReconnectState};
