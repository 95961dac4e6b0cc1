//! Bounded retry policy for external-service calls.
//!
//! A policy object injected into the client wrapper, decoupled from pipeline
//! logic. One retry after a fixed backoff is the default; repeated failure
//! degrades the calling stage to its documented failure mode instead of
//! aborting the pipeline.

use std::time::Duration;

use crate::config::Config;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    max_attempts: u32,
    backoff: Duration,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, backoff: Duration) -> Self {
        Self {
            max_attempts,
            backoff,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(
            config.max_attempts,
            Duration::from_millis(config.retry_backoff_ms),
        )
    }

    /// Total attempts, never less than one.
    pub fn attempts(&self) -> u32 {
        self.max_attempts.max(1)
    }

    pub fn backoff(&self) -> Duration {
        self.backoff
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        // single retry after a fixed backoff
        Self::new(2, Duration::from_millis(1000))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_single_retry() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.attempts(), 2);
        assert_eq!(policy.backoff(), Duration::from_millis(1000));
    }

    #[test]
    fn zero_attempts_clamps_to_one() {
        let policy = RetryPolicy::new(0, Duration::ZERO);
        assert_eq!(policy.attempts(), 1);
    }
}
