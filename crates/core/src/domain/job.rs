// Job Domain Model

use crate::domain::http::HttpMethod;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

/// Job ID (UUID v4 unless supplied by the caller)
pub type JobId = String;

/// Logical identity used to supersede older queued jobs
pub type DedupeKey = String;

/// Job Payload (JSON serializable)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobPayload(serde_json::Value);

impl JobPayload {
    pub fn new(value: serde_json::Value) -> Self {
        Self(value)
    }

    pub fn as_value(&self) -> &serde_json::Value {
        &self.0
    }
}

/// A single deferred HTTP operation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    pub id: JobId,
    pub url: String,
    pub method: HttpMethod,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<JobPayload>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub headers: BTreeMap<String, String>,

    pub created_at: i64, // epoch ms

    // Retry bookkeeping
    pub attempt: u32,
    pub max_retries: u32,
    pub retry_base_delay_ms: u64,
    pub timeout_ms: u64,

    #[serde(default)]
    pub raw_body: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dedupe_key: Option<DedupeKey>,
}

impl Job {
    /// Create a job with an injected id and timestamp.
    ///
    /// Retry settings start at zero; the enqueue path fills them from
    /// configuration and caller options.
    pub fn new(
        id: impl Into<String>,
        created_at: i64,
        method: HttpMethod,
        url: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            url: url.into(),
            method,
            body: None,
            headers: BTreeMap::new(),
            created_at,
            attempt: 0,
            max_retries: 0,
            retry_base_delay_ms: 0,
            timeout_ms: 0,
            raw_body: false,
            dedupe_key: None,
        }
    }

    /// Bump the attempt counter before an execution. Never decreases.
    pub fn record_attempt(&mut self) -> u32 {
        self.attempt = self.attempt.saturating_add(1);
        self.attempt
    }

    /// Whether another attempt is allowed after the current one fails.
    ///
    /// Evaluated after the counter has been bumped, so a job runs
    /// `max_retries + 1` times in total.
    pub fn has_retries_left(&self) -> bool {
        self.attempt <= self.max_retries
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Whether `other` supersedes this job (same id, or same dedupe key)
    pub fn is_superseded_by(&self, other: &Job) -> bool {
        if self.id == other.id {
            return true;
        }
        matches!(
            (&self.dedupe_key, &other.dedupe_key),
            (Some(mine), Some(theirs)) if mine == theirs
        )
    }

    /// Wire body for this job.
    ///
    /// GET/HEAD never send a body. Raw bodies pass string payloads through
    /// verbatim; everything else is JSON-encoded.
    pub fn encoded_body(&self) -> Option<Vec<u8>> {
        if !self.method.allows_body() {
            return None;
        }
        let payload = self.body.as_ref()?;
        let bytes = match (self.raw_body, payload.as_value()) {
            (true, serde_json::Value::String(raw)) => raw.clone().into_bytes(),
            (_, value) => value.to_string().into_bytes(),
        };
        Some(bytes)
    }

    /// JSON content type applies only to non-raw jobs that send a body
    pub fn sends_json(&self) -> bool {
        !self.raw_body && self.method.allows_body() && self.body.is_some()
    }
}
