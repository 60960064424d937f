//! Bounded exponential backoff for catalog requests.

use crate::error::PipelineError;
use log::warn;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Retry policy for calls against the catalog source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Total attempts, including the first one.
    pub max_attempts: u32,
    pub initial_backoff_ms: u64,
    /// Cap for exponential growth.
    pub max_backoff_ms: u64,
    pub backoff_multiplier: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            initial_backoff_ms: 500,
            max_backoff_ms: 30_000,
            backoff_multiplier: 2.0,
        }
    }
}

impl RetryPolicy {
    /// A policy that never sleeps. Handy for tests and offline catalogs.
    #[must_use]
    pub fn immediate(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            initial_backoff_ms: 0,
            max_backoff_ms: 0,
            backoff_multiplier: 1.0,
        }
    }

    /// Backoff before retry number `attempt` (0-based):
    /// `initial * multiplier^attempt`, capped at `max_backoff_ms`.
    #[must_use]
    pub fn backoff(&self, attempt: u32) -> Duration {
        let exponent = i32::try_from(attempt).unwrap_or(i32::MAX);
        #[allow(clippy::cast_precision_loss)]
        let raw = self.initial_backoff_ms as f64 * self.backoff_multiplier.powi(exponent);
        #[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let capped = raw.min(self.max_backoff_ms as f64).max(0.0) as u64;
        Duration::from_millis(capped)
    }

    /// Run `call` until it succeeds, fails with a non-retryable error, or the
    /// attempt budget is spent.
    ///
    /// # Errors
    ///
    /// Returns the first non-retryable error unchanged, or
    /// [`PipelineError::RetriesExhausted`] wrapping the last failure.
    pub fn run<T>(
        &self,
        operation: &'static str,
        mut call: impl FnMut() -> Result<T, PipelineError>,
    ) -> Result<T, PipelineError> {
        let attempts = self.max_attempts.max(1);
        let mut attempt = 0;
        loop {
            match call() {
                Ok(value) => return Ok(value),
                Err(err) if !err.is_retryable() => return Err(err),
                Err(err) => {
                    attempt += 1;
                    if attempt >= attempts {
                        return Err(PipelineError::RetriesExhausted {
                            operation,
                            attempts,
                            last: Box::new(err),
                        });
                    }
                    let wait = self.backoff(attempt - 1);
                    warn!("{err}; retry {attempt}/{} in {wait:?}", attempts - 1);
                    if !wait.is_zero() {
                        std::thread::sleep(wait);
                    }
                }
            }
        }
    }
}
