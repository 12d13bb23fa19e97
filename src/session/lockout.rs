//! Exponential backoff after repeated failed unlocks.
//!
//! The first `max_attempts` failures cost nothing. From then on every
//! failure blocks further attempts for `base * 2^(failures - max)`,
//! with the exponent capped at 10.

use std::time::{Duration, Instant};

/// Exponent cap for the backoff multiplier.
const MAX_EXPONENT: u32 = 10;

/// Backoff policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LockoutPolicy {
    pub max_attempts: u32,
    pub base: Duration,
}

impl Default for LockoutPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base: Duration::from_secs(30),
        }
    }
}

impl LockoutPolicy {
    /// How long to block after `failures` consecutive failures.
    pub fn delay_for(&self, failures: u32) -> Option<Duration> {
        if self.max_attempts == 0 || failures < self.max_attempts {
            return None;
        }
        let exponent = (failures - self.max_attempts).min(MAX_EXPONENT);
        Some(self.base.saturating_mul(1 << exponent))
    }
}

/// Failure counter for one session.
#[derive(Debug)]
pub struct LockoutTracker {
    policy: LockoutPolicy,
    failures: u32,
    blocked_until: Option<Instant>,
}

impl LockoutTracker {
    pub fn new(policy: LockoutPolicy) -> Self {
        Self {
            policy,
            failures: 0,
            blocked_until: None,
        }
    }

    /// Time left before another attempt is allowed, if blocked.
    pub fn retry_after(&self, now: Instant) -> Option<Duration> {
        self.blocked_until
            .and_then(|until| until.checked_duration_since(now))
            .filter(|left| !left.is_zero())
    }

    pub fn record_failure(&mut self, now: Instant) {
        self.failures = self.failures.saturating_add(1);
        if let Some(delay) = self.policy.delay_for(self.failures) {
            self.blocked_until = Some(now + delay);
            tracing::warn!(
                failures = self.failures,
                delay_secs = delay.as_secs(),
                "unlock blocked after repeated failures"
            );
        }
    }

    pub fn record_success(&mut self) {
        self.failures = 0;
        self.blocked_until = None;
    }

    pub fn failures(&self) -> u32 {
        self.failures
    }
}
