//! Reconnect delays

use std::time::Duration;

/// How a client retries a lost connection
#[derive(Debug, Clone, PartialEq)]
pub struct ReconnectPolicy {
    /// Delay before the first retry
    pub base_delay: Duration,
    /// Upper bound of any single delay
    pub max_delay: Duration,
    /// Retries before giving up; 0 retries forever
    pub max_attempts: u32,
    /// Time allowed for one connect attempt
    pub connect_timeout: Duration,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            base_delay: Duration::from_millis(1000),
            max_delay: Duration::from_millis(30_000),
            max_attempts: 10,
            connect_timeout: Duration::from_secs(10),
        }
    }
}

impl ReconnectPolicy {
    /// A fresh delay sequence for this policy
    pub fn backoff(&self) -> ExponentialBackoff {
        ExponentialBackoff::new(self.base_delay, self.max_delay, self.max_attempts)
    }
}

/// Doubling delay sequence: `min(base * 2^attempt, max)`.
#[derive(Debug, Clone)]
pub struct ExponentialBackoff {
    base_delay: Duration,
    max_delay: Duration,
    max_attempts: Option<u32>,
    attempt: u32,
}

impl ExponentialBackoff {
    /// `max_attempts` of 0 means unlimited attempts.
    pub fn new(base_delay: Duration, max_delay: Duration, max_attempts: u32) -> Self {
        Self {
            base_delay,
            max_delay,
            max_attempts: (max_attempts > 0).then_some(max_attempts),
            attempt: 0,
        }
    }

    /// Next delay, or `None` once the attempts are used up
    pub fn next_delay(&mut self) -> Option<Duration> {
        if self.is_exhausted() {
            return None;
        }

        let base_ms = self.base_delay.as_millis();
        let max_ms = self.max_delay.as_millis();
        let multiplier = 1u128.checked_shl(self.attempt.min(63)).unwrap_or(u128::MAX);
        let delay_ms = base_ms.saturating_mul(multiplier).min(max_ms);

        self.attempt = self.attempt.saturating_add(1);
        Some(Duration::from_millis(
            delay_ms.min(u128::from(u64::MAX)) as u64,
        ))
    }

    /// Start over after a successful connection
    pub fn reset(&mut self) {
        self.attempt = 0;
    }

    /// Delays handed out since the last reset
    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    pub fn is_exhausted(&self) -> bool {
        self.max_attempts.is_some_and(|max| self.attempt >= max)
    }
}
