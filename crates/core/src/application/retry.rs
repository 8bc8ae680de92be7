// Retry logic
use crate::application::queue::constants::MAX_BACKOFF_EXPONENT;
use crate::domain::Job;
use std::time::Duration;
use tracing::{info, warn};

/// Retry decision result
#[derive(Debug, PartialEq, Eq)]
pub enum RetryDecision {
    /// Run the job again after this delay
    Retry(Duration),
    /// Attempt budget spent; the job leaves the queue
    Exhausted,
}

/// Decide what happens after a failed attempt.
///
/// Must be called after `Job::record_attempt` for the failed attempt:
/// eligibility is `attempt <= max_retries`, so a job with `max_retries = 3`
/// runs four times in total.
pub fn decide(job: &Job) -> RetryDecision {
    if !job.has_retries_left() {
        warn!(
            job_id = %job.id,
            attempt = job.attempt,
            max_retries = job.max_retries,
            "Max retry attempts reached"
        );
        return RetryDecision::Exhausted;
    }

    let delay = backoff_delay(job.retry_base_delay_ms, job.attempt);

    info!(
        job_id = %job.id,
        attempt = job.attempt,
        max_retries = job.max_retries,
        delay_ms = delay.as_millis() as u64,
        "Scheduling retry"
    );

    RetryDecision::Retry(delay)
}

/// Exponential backoff: base * 2^max(0, attempt - 1)
pub fn backoff_delay(base_delay_ms: u64, attempt: u32) -> Duration {
    let exponent = attempt.saturating_sub(1).min(MAX_BACKOFF_EXPONENT);
    Duration::from_millis(base_delay_ms.saturating_mul(1u64 << exponent))
}

/// 5xx and 429 are worth another try; every other non-2xx is final
pub fn is_retryable_status(status: u16) -> bool {
    status >= 500 || status == 429
}
