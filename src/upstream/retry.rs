// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Bounded retry with exponential backoff.
//!
//! One policy object replaces the per-route retry loops: a classification
//! predicate decides which transport failures are transient, the backoff
//! doubles from `base_delay` up to `max_delay`, and `max_retries` caps the
//! number of extra attempts.

use std::{future::Future, time::Duration};

use tracing::warn;

use super::transport::TransportError;

/// Default number of retries after the first attempt.
pub const DEFAULT_MAX_RETRIES: u32 = 3;
/// Default backoff base delay.
pub const DEFAULT_BASE_DELAY: Duration = Duration::from_millis(1000);
/// Default backoff cap.
pub const DEFAULT_MAX_DELAY: Duration = Duration::from_millis(10_000);

/// Decides whether a transport failure is worth another attempt.
pub type RetryClassifier = fn(&TransportError) -> bool;

/// Only connection resets are retried by default. Timeouts and refused
/// connections surface immediately.
pub fn is_connection_reset(error: &TransportError) -> bool {
    matches!(error, TransportError::ConnectionReset(_))
}

#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
    classifier: RetryClassifier,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_RETRIES, DEFAULT_BASE_DELAY, DEFAULT_MAX_DELAY)
    }
}

impl RetryPolicy {
    pub fn new(max_retries: u32, base_delay: Duration, max_delay: Duration) -> Self {
        Self {
            max_retries,
            base_delay,
            max_delay,
            classifier: is_connection_reset,
        }
    }

    /// A policy that never retries.
    pub fn disabled() -> Self {
        Self::new(0, Duration::ZERO, Duration::ZERO)
    }

    /// Replace the retryable-error predicate.
    #[must_use]
    pub fn with_classifier(mut self, classifier: RetryClassifier) -> Self {
        self.classifier = classifier;
        self
    }

    /// Delay before retry number `attempt` (0-based):
    /// `min(base_delay * 2^attempt, max_delay)`.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = 2u32.checked_pow(attempt).unwrap_or(u32::MAX);
        self.base_delay.saturating_mul(factor).min(self.max_delay)
    }

    pub fn is_retryable(&self, error: &TransportError) -> bool {
        (self.classifier)(error)
    }

    /// Run `operation` until it succeeds, fails with a non-retryable
    /// error, or `max_retries` retries have been spent.
    pub async fn run<T, F, Fut>(&self, mut operation: F) -> Result<T, TransportError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, TransportError>>,
    {
        let mut attempt = 0;
        loop {
            match operation().await {
                Ok(value) => return Ok(value),
                Err(error) if attempt < self.max_retries && self.is_retryable(&error) => {
                    let delay = self.delay_for(attempt);
                    warn!(
                        retry = attempt + 1,
                        max_retries = self.max_retries,
                        delay_ms = delay.as_millis() as u64,
                        error = %error,
                        "Transient upstream failure, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(error) => return Err(error),
            }
        }
    }
}
