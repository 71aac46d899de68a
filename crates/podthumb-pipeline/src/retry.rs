//! Bounded retry with linear backoff around remote generation calls.
//!
//! A generation call can succeed at the transport level and still produce
//! nothing, so every attempt is classified into a [`CallOutcome`]. Empty
//! results and retryable transport errors are retried; blocked content and
//! every other error fail immediately.

use std::future::Future;
use std::time::Duration;

use podthumb_models::Stage;
use tracing::{debug, warn};

use crate::error::{PipelineError, PipelineResult};
use crate::metrics;

/// Classified result of one remote attempt.
#[derive(Debug, Clone, PartialEq)]
pub enum CallOutcome<T> {
    /// At least one usable artifact.
    Produced(T),
    /// Nothing usable; carries a diagnostic describing the response.
    Empty(String),
    /// Refused by a safety filter. Never retried.
    Blocked(String),
}

#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total attempts, including the first.
    pub max_attempts: u32,
    /// Delay unit: attempt `n` is followed by `base_delay * n`.
    pub base_delay: Duration,
    pub operation: String,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(2),
            operation: "generation".to_string(),
        }
    }
}

impl RetryPolicy {
    pub fn new(operation: impl Into<String>) -> Self {
        Self {
            operation: operation.into(),
            ..Default::default()
        }
    }

    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts.max(1);
        self
    }

    pub fn with_base_delay(mut self, base_delay: Duration) -> Self {
        self.base_delay = base_delay;
        self
    }

    /// Linear backoff after the given 1-based attempt.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        self.base_delay.saturating_mul(attempt)
    }

    /// Run `call` until it produces, fails permanently, or attempts run out.
    ///
    /// `call` receives the 1-based attempt number. Exhaustion surfaces the
    /// last failure unchanged.
    pub async fn run<T, F, Fut>(&self, stage: Stage, mut call: F) -> RetryResult<T>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = PipelineResult<CallOutcome<T>>>,
    {
        let mut attempt = 1u32;

        loop {
            let failure = match call(attempt).await {
                Ok(CallOutcome::Produced(value)) => {
                    return RetryResult::Success {
                        value,
                        attempts: attempt,
                    }
                }
                Ok(CallOutcome::Blocked(reason)) => {
                    return RetryResult::Failed {
                        error: PipelineError::blocked(stage, reason),
                        attempts: attempt,
                    }
                }
                Ok(CallOutcome::Empty(diagnostic)) => PipelineError::NoArtifacts {
                    attempts: attempt,
                    diagnostic,
                },
                Err(e) if e.is_retryable() => e,
                Err(e) => {
                    return RetryResult::Failed {
                        error: e,
                        attempts: attempt,
                    }
                }
            };

            if attempt >= self.max_attempts {
                debug!(
                    operation = %self.operation,
                    attempts = attempt,
                    "Retry budget exhausted"
                );
                return RetryResult::Failed {
                    error: failure,
                    attempts: attempt,
                };
            }

            let delay = self.delay_for_attempt(attempt);
            warn!(
                operation = %self.operation,
                stage = %stage,
                attempt,
                max_attempts = self.max_attempts,
                delay_ms = delay.as_millis() as u64,
                error = %failure,
                "Remote call failed, retrying"
            );
            metrics::record_retry(&self.operation);
            tokio::time::sleep(delay).await;
            attempt += 1;
        }
    }
}

/// Result of a retried call, with the number of attempts actually made.
#[derive(Debug)]
pub enum RetryResult<T> {
    Success { value: T, attempts: u32 },
    Failed { error: PipelineError, attempts: u32 },
}

impl<T> RetryResult<T> {
    pub fn is_success(&self) -> bool {
        matches!(self, RetryResult::Success { .. })
    }

    pub fn attempts(&self) -> u32 {
        match self {
            RetryResult::Success { attempts, .. } | RetryResult::Failed { attempts, .. } => {
                *attempts
            }
        }
    }

    pub fn into_result(self) -> PipelineResult<T> {
        match self {
            RetryResult::Success { value, .. } => Ok(value),
            RetryResult::Failed { error, .. } => Err(error),
        }
    }
}
