// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Exponential backoff with jitter for retryable reconciliation failures.

use rand::Rng;
use std::time::Duration;

/// Delay schedule between passes after a retryable failure
#[derive(Debug, Clone, PartialEq)]
pub struct BackoffPolicy {
    pub initial: Duration,
    pub max: Duration,
    pub multiplier: f64,
}

impl BackoffPolicy {
    pub fn new(initial: Duration, max: Duration, multiplier: f64) -> Self {
        Self {
            initial,
            max,
            multiplier,
        }
    }

    /// Delay before retry number `attempt` (1-based), before jitter
    pub fn base_delay(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(63) as i32;
        let secs = self.initial.as_secs_f64() * self.multiplier.powi(exponent);
        if !secs.is_finite() || secs >= self.max.as_secs_f64() {
            self.max
        } else {
            Duration::from_secs_f64(secs)
        }
    }

    /// Jittered delay (0.5x to 1.5x of the base), never above `max`
    pub fn delay(&self, attempt: u32) -> Duration {
        let jitter = rand::rng().random_range(0.5..1.5);
        let jittered = Duration::from_secs_f64(self.base_delay(attempt).as_secs_f64() * jitter);
        jittered.min(self.max)
    }
}
