//! Retry policy wrapped around every generator call.
//!
//! ## Strategy
//!
//! Rate limits and 5xx errors are frequent under concurrent load and nearly
//! always transient. Exponential backoff (`base * 2^(attempt-1)`, capped at
//! `max_backoff`) avoids thundering-herd: with 500 ms base and 2 retries a
//! batch waits 500 ms then 1 s. A server `retry_after` hint replaces the
//! computed delay (still capped). `Unauthenticated` and `ContentRejected`
//! are never retried.
//!
//! A retried batch *replaces* its failed attempt: the wrapper returns at most
//! one `BatchResult`, so retries cannot duplicate aggregated content.

use crate::error::GenerationError;
use crate::generate::{ContentGenerator, GenerationRequest};
use crate::model::BatchResult;
use std::time::Duration;
use tokio::time::{sleep, timeout};
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub base_backoff: Duration,
    pub max_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 2,
            base_backoff: Duration::from_millis(500),
            max_backoff: Duration::from_secs(8),
        }
    }
}

impl RetryPolicy {
    /// Delay before retry number `attempt` (1-based).
    pub fn delay_for(&self, attempt: u32, error: &GenerationError) -> Duration {
        let computed = self
            .base_backoff
            .saturating_mul(2u32.saturating_pow(attempt.saturating_sub(1)));
        let hinted = match error {
            GenerationError::RateLimited {
                retry_after_secs: Some(secs),
            } => Duration::from_secs(*secs),
            _ => computed,
        };
        hinted.min(self.max_backoff)
    }
}

/// Result of driving one batch through the retry policy.
#[derive(Debug)]
pub struct RetryOutcome {
    pub result: Result<BatchResult, GenerationError>,
    /// Generator calls made, including the first.
    pub attempts: u32,
}

/// Call the generator for `request`, retrying retryable failures.
///
/// `call_timeout` bounds each individual call; an elapsed timeout is
/// reported as [`GenerationError::Transient`].
pub async fn generate_with_retry(
    generator: &dyn ContentGenerator,
    request: &GenerationRequest,
    policy: &RetryPolicy,
    call_timeout: Duration,
) -> RetryOutcome {
    let mut attempt: u32 = 0;
    loop {
        attempt += 1;
        let result = match timeout(call_timeout, generator.generate(request)).await {
            Ok(r) => r,
            Err(_) => Err(GenerationError::Transient(format!(
                "call timed out after {}s",
                call_timeout.as_secs()
            ))),
        };

        match result {
            Ok(batch) => {
                debug!(
                    "Batch {}: generated on attempt {}",
                    request.ordinal, attempt
                );
                return RetryOutcome {
                    result: Ok(batch),
                    attempts: attempt,
                };
            }
            Err(e) if e.is_retryable() && attempt <= policy.max_retries => {
                let delay = policy.delay_for(attempt, &e);
                warn!(
                    "Batch {}: attempt {} failed ({}), retry {}/{} in {}ms",
                    request.ordinal,
                    attempt,
                    e,
                    attempt,
                    policy.max_retries,
                    delay.as_millis()
                );
                sleep(delay).await;
            }
            Err(e) => {
                warn!(
                    "Batch {}: giving up after {} attempt(s): {}",
                    request.ordinal, attempt, e
                );
                return RetryOutcome {
                    result: Err(e),
                    attempts: attempt,
                };
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generate::scripted::ScriptedGenerator;
    use crate::model::{BatchScope, DocumentType};

    fn request() -> GenerationRequest {
        GenerationRequest {
            batch_id: "batch-000".into(),
            ordinal: 0,
            scope: BatchScope::Topic,
            text: "Cardiology".into(),
            document_type: DocumentType::ExpositoryNotes,
        }
    }

    fn fast_policy(max_retries: u32) -> RetryPolicy {
        RetryPolicy {
            max_retries,
            base_backoff: Duration::from_millis(1),
            max_backoff: Duration::from_millis(5),
        }
    }

    #[test]
    fn backoff_doubles_and_caps() {
        let p = RetryPolicy {
            max_retries: 5,
            base_backoff: Duration::from_millis(500),
            max_backoff: Duration::from_millis(1500),
        };
        let e = GenerationError::Transient("503".into());
        assert_eq!(p.delay_for(1, &e), Duration::from_millis(500));
        assert_eq!(p.delay_for(2, &e), Duration::from_millis(1000));
        assert_eq!(p.delay_for(3, &e), Duration::from_millis(1500));
    }

    #[test]
    fn retry_after_hint_wins_but_is_capped() {
        let p = RetryPolicy::default();
        let hinted = GenerationError::RateLimited {
            retry_after_secs: Some(2),
        };
        assert_eq!(p.delay_for(1, &hinted), Duration::from_secs(2));
        let huge = GenerationError::RateLimited {
            retry_after_secs: Some(600),
        };
        assert_eq!(p.delay_for(1, &huge), p.max_backoff);
    }

    #[tokio::test]
    async fn transient_then_success() {
        let gen = ScriptedGenerator::new()
            .fail_then_succeed(0, GenerationError::Transient("503".into()), 2);
        let out = generate_with_retry(&gen, &request(), &fast_policy(2), Duration::from_secs(5)).await;
        assert!(out.result.is_ok());
        assert_eq!(out.attempts, 3);
        assert_eq!(gen.call_count(), 3);
    }

    #[tokio::test]
    async fn budget_exhaustion_returns_last_error() {
        let gen = ScriptedGenerator::new()
            .always_fail(0, GenerationError::RateLimited { retry_after_secs: None });
        let out = generate_with_retry(&gen, &request(), &fast_policy(2), Duration::from_secs(5)).await;
        assert!(matches!(out.result, Err(GenerationError::RateLimited { .. })));
        assert_eq!(out.attempts, 3);
    }

    #[tokio::test]
    async fn permanent_errors_are_not_retried() {
        let gen = ScriptedGenerator::new()
            .always_fail(0, GenerationError::Unauthenticated("401".into()));
        let out = generate_with_retry(&gen, &request(), &fast_policy(3), Duration::from_secs(5)).await;
        assert!(matches!(out.result, Err(GenerationError::Unauthenticated(_))));
        assert_eq!(out.attempts, 1);
        assert_eq!(gen.call_count(), 1);
    }

    #[tokio::test]
    async fn slow_calls_time_out_as_transient() {
        let gen = ScriptedGenerator::new().with_delay(Duration::from_millis(200));
        let out = generate_with_retry(&gen, &request(), &fast_policy(0), Duration::from_millis(20)).await;
        assert!(matches!(out.result, Err(GenerationError::Transient(_))));
    }
}
