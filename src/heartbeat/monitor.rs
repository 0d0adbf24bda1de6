//! Heartbeat Monitor
//!
//! Tracks when the next ping is due and whether a pong is overdue. The
//! connection task owns one monitor per open link and drives it from its
//! event loop.

use chatlink_shared::defaults;
use std::time::Duration;
use tokio::time::Instant;

/// Stand-in for deadlines that do not fit in an `Instant`
pub(crate) const FAR_FUTURE: Duration = Duration::from_secs(365 * 24 * 60 * 60);

/// `now + delay`, clamped to a far-future deadline instead of overflowing
fn deadline_after(now: Instant, delay: Duration) -> Instant {
    now.checked_add(delay).unwrap_or_else(|| now + FAR_FUTURE)
}

/// Ping cadence and pong allowance
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeartbeatSettings {
    pub interval: Duration,
    pub timeout: Duration,
}

impl Default for HeartbeatSettings {
    fn default() -> Self {
        Self {
            interval: Duration::from_millis(defaults::HEARTBEAT_INTERVAL_MS),
            timeout: Duration::from_millis(defaults::HEARTBEAT_TIMEOUT_MS),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HeartbeatState {
    pub last_ping_sent_at: Option<Instant>,
    pub pending_pong_deadline: Option<Instant>,
}

#[derive(Debug)]
pub struct HeartbeatMonitor {
    settings: HeartbeatSettings,
    next_ping: Instant,
    state: HeartbeatState,
}

impl HeartbeatMonitor {
    /// Start monitoring a link that opened at `now`; the first ping is due
    /// one interval later
    pub fn start(settings: HeartbeatSettings, now: Instant) -> Self {
        Self {
            settings,
            next_ping: deadline_after(now, settings.interval),
            state: HeartbeatState::default(),
        }
    }

    pub fn settings(&self) -> HeartbeatSettings {
        self.settings
    }

    #[cfg(test)]
    pub fn state(&self) -> HeartbeatState {
        self.state
    }

    pub fn next_ping(&self) -> Instant {
        self.next_ping
    }

    pub fn pong_deadline(&self) -> Option<Instant> {
        self.state.pending_pong_deadline
    }

    /// Record a ping sent at `now`. An already pending deadline is kept so
    /// that back-to-back pings cannot postpone detection.
    pub fn ping_sent(&mut self, now: Instant) {
        self.state.last_ping_sent_at = Some(now);
        self.next_ping = deadline_after(now, self.settings.interval);
        if self.state.pending_pong_deadline.is_none() {
            self.state.pending_pong_deadline = Some(deadline_after(now, self.settings.timeout));
        }
    }

    /// Record a pong; returns true if it answered an outstanding ping
    pub fn pong_received(&mut self) -> bool {
        self.state.pending_pong_deadline.take().is_some()
    }

    /// Apply new settings. A changed interval restarts the ping timer from
    /// `now`; a changed timeout applies from the next ping.
    pub fn reconfigure(&mut self, settings: HeartbeatSettings, now: Instant) {
        if settings.interval != self.settings.interval {
            self.next_ping = deadline_after(now, settings.interval);
        }
        self.settings = settings;
    }

    /// Forget any outstanding ping
    pub fn clear(&mut self) {
        self.state = HeartbeatState::default();
    }
}
