//! Sliding-window rate limiter for outbound sends

use std::collections::VecDeque;
use std::time::Duration;
use tokio::time::Instant;

/// Length of the trailing window
const WINDOW: Duration = Duration::from_millis(1000);

/// Admits at most `limit` sends in any trailing one-second window.
///
/// Old timestamps are only purged inside [`RateLimiter::admit_at`], so an idle
/// limiter may hold up to `limit` stale entries until the next send.
#[derive(Debug, Clone)]
pub struct RateLimiter {
    limit: usize,
    sent: VecDeque<Instant>,
}

impl RateLimiter {
    pub fn new(limit_per_second: u32) -> Self {
        let limit = limit_per_second as usize;
        Self {
            limit,
            sent: VecDeque::with_capacity(limit),
        }
    }

    /// Try to admit a send now
    pub fn admit(&mut self) -> bool {
        self.admit_at(Instant::now())
    }

    /// Try to admit a send at `now`, recording it on success
    pub fn admit_at(&mut self, now: Instant) -> bool {
        while let Some(&oldest) = self.sent.front() {
            if now.saturating_duration_since(oldest) >= WINDOW {
                self.sent.pop_front();
            } else {
                break;
            }
        }

        if self.sent.len() < self.limit {
            self.sent.push_back(now);
            true
        } else {
            false
        }
    }

    /// Earliest instant at which `admit_at` can succeed, or `None` if it
    /// would succeed at `now`. Does not purge.
    pub fn next_slot(&self, now: Instant) -> Option<Instant> {
        let live: Vec<Instant> = self
            .sent
            .iter()
            .copied()
            .filter(|t| now.saturating_duration_since(*t) < WINDOW)
            .collect();

        if live.len() < self.limit {
            return None;
        }
        live.get(live.len() - self.limit).map(|t| *t + WINDOW)
    }

    /// Timestamps currently held, including any not yet purged
    #[cfg(test)]
    pub fn window_len(&self) -> usize {
        self.sent.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    #[test]
    fn test_burst_is_capped() {
        let mut limiter = RateLimiter::new(2);
        let t0 = Instant::now();

        assert!(limiter.admit_at(t0));
        assert!(limiter.admit_at(t0 + Duration::from_millis(40)));
        assert!(!limiter.admit_at(t0 + Duration::from_millis(80)));
    }

    #[test]
    fn test_window_slides() {
        let mut limiter = RateLimiter::new(2);
        let t0 = Instant::now();

        assert!(limiter.admit_at(t0));
        assert!(limiter.admit_at(t0 + Duration::from_millis(500)));
        assert!(!limiter.admit_at(t0 + Duration::from_millis(999)));

        // First entry has aged out
        assert!(limiter.admit_at(t0 + Duration::from_millis(1000)));
        assert!(!limiter.admit_at(t0 + Duration::from_millis(1400)));
        assert!(limiter.admit_at(t0 + Duration::from_millis(1500)));
    }

    #[test]
    fn test_purge_is_lazy() {
        let mut limiter = RateLimiter::new(3);
        let t0 = Instant::now();
        limiter.admit_at(t0);
        limiter.admit_at(t0);
        assert_eq!(limiter.window_len(), 2);

        // Nothing is dropped until the next admission check
        assert_eq!(limiter.next_slot(t0 + Duration::from_secs(60)), None);
        assert_eq!(limiter.window_len(), 2);

        limiter.admit_at(t0 + Duration::from_secs(60));
        assert_eq!(limiter.window_len(), 1);
    }

    #[test]
    fn test_next_slot() {
        let mut limiter = RateLimiter::new(2);
        let t0 = Instant::now();
        assert_eq!(limiter.next_slot(t0), None);

        limiter.admit_at(t0);
        limiter.admit_at(t0 + Duration::from_millis(300));
        assert_eq!(
            limiter.next_slot(t0 + Duration::from_millis(400)),
            Some(t0 + Duration::from_millis(1000))
        );
        assert_eq!(limiter.next_slot(t0 + Duration::from_millis(1000)), None);
    }

    #[test]
    fn test_never_exceeds_limit_in_any_window() {
        let mut rng = StdRng::seed_from_u64(42);
        let t0 = Instant::now();

        for limit in [1u32, 2, 5, 10] {
            let mut limiter = RateLimiter::new(limit);
            let mut accepted = Vec::new();
            let mut offset_ms = 0u64;

            for _ in 0..2_000 {
                offset_ms += rng.gen_range(0..120);
                let now = t0 + Duration::from_millis(offset_ms);
                if limiter.admit_at(now) {
                    accepted.push(offset_ms);
                }
            }

            for (i, &start) in accepted.iter().enumerate() {
                let in_window = accepted[i..].iter().take_while(|&&t| t < start + 1000).count();
                assert!(
                    in_window <= limit as usize,
                    "limit {limit}: {in_window} sends in window starting at {start}ms"
                );
            }
        }
    }
}
