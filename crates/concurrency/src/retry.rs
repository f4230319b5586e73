//! Opt-in retry of operations that failed without mutating stock
//!
//! Only `LockNotAcquired` and `TransactionConflict` are retried; each attempt
//! starts the whole operation from scratch. Everything else, including
//! business rejections and store outages, is returned on the first failure.

use rand::Rng;
use serde::{Deserialize, Serialize};
use std::thread;
use std::time::Duration;
use stockguard_core::duration_ms;
use stockguard_core::error::Result;

/// Attempts and backoff for retryable failures
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Total attempts, including the first one
    pub max_attempts: u32,
    /// Pause before the second attempt
    #[serde(with = "duration_ms")]
    pub initial_backoff: Duration,
    /// Upper bound for any single pause
    #[serde(with = "duration_ms")]
    pub max_backoff: Duration,
    /// Randomize each pause within `[0, backoff]`
    pub jitter: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::single_attempt()
    }
}

impl RetryPolicy {
    /// Fail fast: one attempt, no retries
    pub const fn single_attempt() -> Self {
        Self {
            max_attempts: 1,
            initial_backoff: Duration::ZERO,
            max_backoff: Duration::ZERO,
            jitter: false,
        }
    }

    /// `attempts` tries with a short jittered exponential backoff
    pub fn with_attempts(attempts: u32) -> Self {
        Self {
            max_attempts: attempts.max(1),
            initial_backoff: Duration::from_millis(1),
            max_backoff: Duration::from_millis(50),
            jitter: true,
        }
    }

    /// Set the backoff bounds
    pub fn backoff(mut self, initial: Duration, max: Duration) -> Self {
        self.initial_backoff = initial;
        self.max_backoff = max.max(initial);
        self
    }

    /// Enable or disable jitter
    pub fn jitter(mut self, jitter: bool) -> Self {
        self.jitter = jitter;
        self
    }

    /// Pause after failed attempt number `attempt` (1-based), before jitter
    pub fn backoff_for(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(31);
        self.initial_backoff
            .saturating_mul(1u32 << exponent)
            .min(self.max_backoff)
    }

    /// Run `op` until it succeeds, fails with a non-retryable error, or the
    /// attempts run out. `op` receives the 1-based attempt number.
    pub fn run<T>(&self, mut op: impl FnMut(u32) -> Result<T>) -> Result<T> {
        let max_attempts = self.max_attempts.max(1);
        let mut attempt = 1;
        loop {
            match op(attempt) {
                Ok(value) => return Ok(value),
                Err(e) if e.is_retryable() && attempt < max_attempts => {
                    let pause = self.pause_for(attempt);
                    tracing::debug!(attempt, max_attempts, pause_ms = pause.as_millis() as u64, error = %e, "retrying");
                    if !pause.is_zero() {
                        thread::sleep(pause);
                    }
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    fn pause_for(&self, attempt: u32) -> Duration {
        let backoff = self.backoff_for(attempt);
        if !self.jitter || backoff.is_zero() {
            return backoff;
        }
        let nanos = u64::try_from(backoff.as_nanos()).unwrap_or(u64::MAX);
        Duration::from_nanos(rand::thread_rng().gen_range(0..=nanos))
    }
}
