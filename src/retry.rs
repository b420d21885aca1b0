//! Retry schedule for probes
//!
//! Kept separate from the request code so the schedule can be tested
//! without a network.

use crate::config::ProbeConfig;
use crate::probe::FailureReason;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the first attempt
    pub max_retries: u32,
    /// Delay step; the n-th retry waits `backoff * n`
    pub backoff: Duration,
}

impl RetryPolicy {
    pub fn from_config(config: &ProbeConfig) -> Self {
        Self {
            max_retries: config.retries,
            backoff: Duration::from_millis(config.backoff_ms),
        }
    }

    pub fn none() -> Self {
        Self {
            max_retries: 0,
            backoff: Duration::ZERO,
        }
    }
}

/// Delay before the next attempt, or `None` to give up.
///
/// `attempts` is the number of attempts already made (1 after the first
/// failure). Only transient failures are retried.
pub fn next_delay(policy: &RetryPolicy, attempts: u32, failure: FailureReason) -> Option<Duration> {
    if !failure.is_transient() || attempts == 0 || attempts > policy.max_retries {
        return None;
    }
    Some(policy.backoff * attempts)
}
