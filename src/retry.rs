//! Deadline, cancellation and bounded retry for remote calls.
//!
//! Every remote call in one invocation shares a single deadline. Transient
//! upstream failures are retried with exponential backoff until the attempt
//! budget or the deadline runs out.

use std::future::Future;
use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::error::{PipelineError, PipelineResult, Stage};

#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Extra attempts after the first one.
    pub attempts: u32,
    pub base_delay_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: 2,
            base_delay_ms: 500,
        }
    }
}

/// Absolute deadline plus the total budget it was derived from, for error reporting.
#[derive(Debug, Clone, Copy)]
pub struct Deadline {
    at: Instant,
    budget: Duration,
}

impl Deadline {
    pub fn after(budget: Duration) -> Self {
        Self {
            at: Instant::now() + budget,
            budget,
        }
    }

    fn timeout(&self, stage: Stage) -> PipelineError {
        PipelineError::Timeout {
            stage,
            timeout_ms: self.budget.as_millis() as u64,
        }
    }
}

/// Whether an upstream failure is worth another attempt.
///
/// Rate limits (429) and server errors (5xx) are; so are connection and
/// timeout failures that never produced a status. Body or decode failures
/// after a response are not. Deadlines and cancellation are final.
pub fn is_retryable(error: &PipelineError) -> bool {
    match error {
        PipelineError::UpstreamUpload {
            status_code,
            transient,
            ..
        }
        | PipelineError::UpstreamChat {
            status_code,
            transient,
            ..
        } => match status_code {
            Some(code) => *code == 429 || (500..=599).contains(code),
            None => *transient,
        },
        _ => false,
    }
}

/// `base_delay * 2^attempt`, capped at 30 seconds.
pub fn backoff_duration(attempt: u32, base_delay_ms: u64) -> Duration {
    let delay = base_delay_ms.saturating_mul(2u64.saturating_pow(attempt));
    Duration::from_millis(delay.min(30_000))
}

/// Run `op` under the deadline, retrying transient failures.
pub async fn run<T, F, Fut>(
    stage: Stage,
    policy: &RetryPolicy,
    deadline: &Deadline,
    cancel: &CancellationToken,
    mut op: F,
) -> PipelineResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = PipelineResult<T>>,
{
    let mut attempt = 0u32;
    loop {
        if attempt > 0 {
            let delay = backoff_duration(attempt - 1, policy.base_delay_ms);
            tracing::warn!(
                "retry {}/{} for {} after {:?}",
                attempt,
                policy.attempts,
                stage,
                delay
            );
            tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(PipelineError::Cancelled { stage }),
                _ = tokio::time::sleep_until(deadline.at) => return Err(deadline.timeout(stage)),
                _ = tokio::time::sleep(delay) => {}
            }
        }

        let outcome = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(PipelineError::Cancelled { stage }),
            result = tokio::time::timeout_at(deadline.at, op()) => result,
        };

        match outcome {
            Err(_) => return Err(deadline.timeout(stage)),
            Ok(Ok(value)) => return Ok(value),
            Ok(Err(e)) if attempt < policy.attempts && is_retryable(&e) => {
                tracing::warn!("{} failed: {}", stage, e);
                attempt += 1;
            }
            Ok(Err(e)) => return Err(e),
        }
    }
}
