// Flush results reported to callers

use crate::domain::http::HttpResponse;
use crate::domain::job::JobId;
use thiserror::Error;

/// Why a single attempt failed
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum JobError {
    #[error("Request timed out after {0}ms")]
    Timeout(u64),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Server responded with retryable status {0}")]
    RetryableStatus(u16),
}

/// Outcome of one job within a flush batch
#[derive(Debug, Clone, PartialEq)]
pub enum FlushOutcome {
    /// The server answered and the job is gone from the queue.
    /// Non-2xx answers that will not be retried land here too.
    Delivered(HttpResponse),
    /// The attempt failed; `will_retry` tells whether the job is still queued
    Failed { error: JobError, will_retry: bool },
}

#[derive(Debug, Clone, PartialEq)]
pub struct FlushResult {
    pub job_id: JobId,
    pub outcome: FlushOutcome,
}

impl FlushResult {
    pub fn delivered(job_id: impl Into<JobId>, response: HttpResponse) -> Self {
        Self {
            job_id: job_id.into(),
            outcome: FlushOutcome::Delivered(response),
        }
    }

    pub fn failed(job_id: impl Into<JobId>, error: JobError, will_retry: bool) -> Self {
        Self {
            job_id: job_id.into(),
            outcome: FlushOutcome::Failed { error, will_retry },
        }
    }

    pub fn is_delivered(&self) -> bool {
        matches!(self.outcome, FlushOutcome::Delivered(_))
    }

    pub fn will_retry(&self) -> bool {
        matches!(self.outcome, FlushOutcome::Failed { will_retry: true, .. })
    }

    pub fn response(&self) -> Option<&HttpResponse> {
        match &self.outcome {
            FlushOutcome::Delivered(response) => Some(response),
            FlushOutcome::Failed { .. } => None,
        }
    }

    pub fn error(&self) -> Option<&JobError> {
        match &self.outcome {
            FlushOutcome::Delivered(_) => None,
            FlushOutcome::Failed { error, .. } => Some(error),
        }
    }
}
