//! Delay policy between refresh cycles.

use std::time::Duration;

use crate::config::BackoffConfig;

/// Largest doubling exponent applied; the cap is reached long before this.
const MAX_DOUBLINGS: u32 = 20;

/// Computes the wait before the next cycle from the number of consecutive
/// failures. With backoff disabled the delay is always the base interval.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Backoff {
    base: Duration,
    max: Duration,
    enabled: bool,
}

impl Backoff {
    pub fn new(base: Duration, config: &BackoffConfig) -> Self {
        Self {
            base,
            max: Duration::from_millis(config.max_interval_ms).max(base),
            enabled: config.enabled,
        }
    }

    /// Fixed cadence.
    pub fn fixed(base: Duration) -> Self {
        Self {
            base,
            max: base,
            enabled: false,
        }
    }

    /// `base * 2^failures`, capped at `max`.
    pub fn delay(&self, consecutive_failures: u32) -> Duration {
        if !self.enabled || consecutive_failures == 0 {
            return self.base;
        }
        let factor = 1u32 << consecutive_failures.min(MAX_DOUBLINGS);
        self.base
            .checked_mul(factor)
            .unwrap_or(self.max)
            .min(self.max)
    }
}
