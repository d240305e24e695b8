//! Circuit breaker for feed rate limiting and IP bans.
//!
//! HTTP 403 trips the breaker immediately; repeated failures trip it after a
//! threshold. While open, every request is refused until the cooldown passes.

use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BreakerState {
    /// Requests are allowed.
    Closed,
    /// Requests are refused until the cooldown expires.
    Open { tripped_at: Instant },
}

#[derive(Debug)]
struct Inner {
    state: BreakerState,
    consecutive_failures: u32,
}

#[derive(Debug)]
pub struct CircuitBreaker {
    inner: Mutex<Inner>,
    cooldown: Duration,
    failure_threshold: u32,
}

impl CircuitBreaker {
    pub fn new(cooldown: Duration, failure_threshold: u32) -> Self {
        Self {
            inner: Mutex::new(Inner {
                state: BreakerState::Closed,
                consecutive_failures: 0,
            }),
            cooldown,
            failure_threshold: failure_threshold.max(1),
        }
    }

    /// 30-minute cooldown, trips after 3 consecutive failures.
    pub fn default_provider() -> Self {
        Self::new(Duration::from_secs(30 * 60), 3)
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        // Recover from poisoning; the state is two plain fields.
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Check if requests are currently allowed, closing the breaker once the cooldown passed.
    pub fn is_allowed(&self) -> bool {
        let mut inner = self.lock();
        match inner.state {
            BreakerState::Closed => true,
            BreakerState::Open { tripped_at } if tripped_at.elapsed() >= self.cooldown => {
                inner.state = BreakerState::Closed;
                inner.consecutive_failures = 0;
                true
            }
            BreakerState::Open { .. } => false,
        }
    }

    pub fn record_success(&self) {
        self.lock().consecutive_failures = 0;
    }

    pub fn record_failure(&self) {
        let mut inner = self.lock();
        inner.consecutive_failures += 1;
        if inner.consecutive_failures >= self.failure_threshold {
            inner.state = BreakerState::Open {
                tripped_at: Instant::now(),
            };
        }
    }

    /// Immediately open the breaker (403 Forbidden).
    pub fn trip(&self) {
        self.lock().state = BreakerState::Open {
            tripped_at: Instant::now(),
        };
    }

    pub fn state(&self) -> BreakerState {
        self.lock().state
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_closed() {
        let cb = CircuitBreaker::default_provider();
        assert!(cb.is_allowed());
        assert_eq!(cb.state(), BreakerState::Closed);
    }

    #[test]
    fn trips_after_threshold() {
        let cb = CircuitBreaker::new(Duration::from_secs(60), 3);
        cb.record_failure();
        cb.record_failure();
        assert!(cb.is_allowed());
        cb.record_failure();
        assert!(!cb.is_allowed());
    }

    #[test]
    fn success_resets_failures() {
        let cb = CircuitBreaker::new(Duration::from_secs(60), 2);
        cb.record_failure();
        cb.record_success();
        cb.record_failure();
        assert!(cb.is_allowed());
    }

    #[test]
    fn trip_is_immediate_and_cooldown_reopens() {
        let cb = CircuitBreaker::new(Duration::ZERO, 3);
        cb.trip();
        assert!(matches!(cb.state(), BreakerState::Open { .. }));
        // Zero cooldown: the next check closes it again.
        assert!(cb.is_allowed());
        assert_eq!(cb.state(), BreakerState::Closed);
    }

    #[test]
    fn long_cooldown_blocks() {
        let cb = CircuitBreaker::new(Duration::from_secs(3600), 3);
        cb.trip();
        assert!(!cb.is_allowed());
    }
}
