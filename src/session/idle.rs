//! Inactivity timer for the optional idle auto-lock.

use std::time::{Duration, Instant};

/// Tracks the last activity and whether the idle timeout has passed.
#[derive(Debug)]
pub struct IdleTimer {
    last_activity: Instant,
    timeout: Option<Duration>,
}

impl IdleTimer {
    /// `None` disables the timer.
    pub fn new(timeout: Option<Duration>) -> Self {
        Self {
            last_activity: Instant::now(),
            timeout,
        }
    }

    pub fn record_activity(&mut self) {
        self.last_activity = Instant::now();
    }

    /// `true` once the timeout has elapsed since the last activity.
    pub fn expired(&self) -> bool {
        self.timeout
            .is_some_and(|timeout| self.last_activity.elapsed() > timeout)
    }

    /// Time left before the timer expires; `None` when disabled.
    pub fn remaining(&self) -> Option<Duration> {
        let timeout = self.timeout?;
        Some(timeout.saturating_sub(self.last_activity.elapsed()))
    }
}
