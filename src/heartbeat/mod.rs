//! Application-level liveness probing
//!
//! A half-open connection may never surface a close event, so the link sends
//! its own pings and treats a missing pong as a transport failure.

mod monitor;

pub use monitor::{HeartbeatMonitor, HeartbeatSettings, HeartbeatState};
pub(crate) use monitor::FAR_FUTURE;
