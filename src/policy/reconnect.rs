//! Reconnect backoff policy

use rand::Rng;
use std::time::Duration;

/// Counters for the current run of failed attempts
#[derive(Debug, Default, Clone)]
pub struct ReconnectState {
    attempt_count: u32,
}

impl ReconnectState {
    /// Record a failed attempt and return the new count
    pub fn record_failure(&mut self) -> u32 {
        self.attempt_count = self.attempt_count.saturating_add(1);
        self.attempt_count
    }

    /// Clear the counters after a successful open or an explicit connect
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    pub fn attempts(&self) -> u32 {
        self.attempt_count
    }
}

/// What to do after a failed attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconnectDecision {
    /// Wait `delay`, then make attempt number `attempt + 1`
    Retry { attempt: u32, delay: Duration },
    /// The ceiling was reached; stay failed until an explicit connect
    GiveUp { attempts: u32 },
}

/// Exponential backoff: `min(cap, base * 2^attempt) + uniform(0, jitter)`
#[derive(Debug, Clone)]
pub struct ReconnectPolicy {
    base: Duration,
    cap: Duration,
    jitter: Duration,
    max_attempts: u32,
}

impl ReconnectPolicy {
    pub fn new(base: Duration, cap: Duration, jitter: Duration, max_attempts: u32) -> Self {
        Self {
            base,
            cap,
            jitter,
            max_attempts,
        }
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Delay without jitter for the given attempt count
    pub fn base_delay(&self, attempt: u32) -> Duration {
        let factor = 1u64.checked_shl(attempt).unwrap_or(u64::MAX);
        let base_ms = millis(self.base);
        let cap_ms = millis(self.cap);
        Duration::from_millis(base_ms.saturating_mul(factor).min(cap_ms))
    }

    /// Delay with jitter drawn from the thread-local RNG
    pub fn delay(&self, attempt: u32) -> Duration {
        self.delay_with(attempt, &mut rand::thread_rng())
    }

    /// Delay with jitter drawn from `rng`
    pub fn delay_with<R: Rng + ?Sized>(&self, attempt: u32, rng: &mut R) -> Duration {
        let jitter_ms = millis(self.jitter);
        let jitter = if jitter_ms == 0 {
            0
        } else {
            rng.gen_range(0..jitter_ms)
        };
        self.base_delay(attempt)
            .saturating_add(Duration::from_millis(jitter))
    }

    /// Count a failed attempt and decide whether to try again
    pub fn on_failure(&self, state: &mut ReconnectState) -> ReconnectDecision {
        let attempt = state.record_failure();
        if attempt >= self.max_attempts {
            ReconnectDecision::GiveUp { attempts: attempt }
        } else {
            ReconnectDecision::Retry {
                attempt,
                delay: self.delay(attempt),
            }
        }
    }
}

/// Whole milliseconds, saturating for durations beyond `u64::MAX` ms
fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        use chatlink_shared::defaults;
        Self::new(
            Duration::from_millis(defaults::RECONNECT_BASE_MS),
            Duration::from_millis(defaults::RECONNECT_CAP_MS),
            Duration::from_millis(defaults::RECONNECT_JITTER_MS),
            defaults::MAX_RECONNECT_ATTEMPTS,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_base_delay_doubles_until_cap() {
        let policy = ReconnectPolicy::default();
        assert_eq!(policy.base_delay(0), Duration::from_millis(1000));
        assert_eq!(policy.base_delay(1), Duration::from_millis(2000));
        assert_eq!(policy.base_delay(4), Duration::from_millis(16000));
        assert_eq!(policy.base_delay(5), Duration::from_millis(30000));
        assert_eq!(policy.base_delay(200), Duration::from_millis(30000));
    }

    #[test]
    fn test_base_delay_is_non_decreasing() {
        let policy = ReconnectPolicy::default();
        let mut previous = Duration::ZERO;
        for attempt in 0..64 {
            let delay = policy.base_delay(attempt);
            assert!(delay >= previous, "attempt {attempt} shrank the delay");
            assert!(delay <= Duration::from_secs(30));
            previous = delay;
        }
    }

    #[test]
    fn test_jitter_stays_in_range() {
        let policy = ReconnectPolicy::default();
        let mut rng = StdRng::seed_from_u64(7);
        for attempt in 1..12 {
            let base = policy.base_delay(attempt);
            let delay = policy.delay_with(attempt, &mut rng);
            assert!(delay >= base);
            assert!(delay < base + Duration::from_secs(1));
        }
    }

    #[test]
    fn test_zero_jitter_is_exact() {
        let policy = ReconnectPolicy::new(
            Duration::from_millis(100),
            Duration::from_secs(1),
            Duration::ZERO,
            5,
        );
        assert_eq!(policy.delay(2), Duration::from_millis(400));
    }

    #[test]
    fn test_gives_up_on_nth_failure() {
        let policy = ReconnectPolicy::new(
            Duration::from_millis(1000),
            Duration::from_secs(30),
            Duration::from_secs(1),
            3,
        );
        let mut state = ReconnectState::default();

        assert!(matches!(
            policy.on_failure(&mut state),
            ReconnectDecision::Retry { attempt: 1, .. }
        ));
        assert!(matches!(
            policy.on_failure(&mut state),
            ReconnectDecision::Retry { attempt: 2, .. }
        ));
        assert_eq!(
            policy.on_failure(&mut state),
            ReconnectDecision::GiveUp { attempts: 3 }
        );

        state.reset();
        assert_eq!(state.attempts(), 0);
    }

    #[test]
    fn test_huge_durations_saturate() {
        let policy = ReconnectPolicy::new(
            Duration::MAX,
            Duration::MAX,
            Duration::ZERO,
            10,
        );
        assert_eq!(policy.base_delay(3), Duration::from_millis(u64::MAX));
        assert_eq!(millis(Duration::MAX), u64::MAX);

        let capped = ReconnectPolicy::new(
            Duration::from_secs(1),
            Duration::from_secs(u64::MAX),
            Duration::ZERO,
            10,
        );
        assert_eq!(capped.base_delay(70), Duration::from_millis(u64::MAX));
    }

    #[test]
    fn test_retry_delay_counts_the_incremented_attempt() {
        let policy = ReconnectPolicy::new(
            Duration::from_millis(1000),
            Duration::from_secs(30),
            Duration::ZERO,
            10,
        );
        let mut state = ReconnectState::default();
        let decision = policy.on_failure(&mut state);
        assert_eq!(
            decision,
            ReconnectDecision::Retry {
                attempt: 1,
                delay: Duration::from_millis(2000)
            }
        );
    }
}
