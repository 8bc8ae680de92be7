// Enqueue Use Case: options -> validated Job

use super::config::QueueConfig;
use super::constants::{MIN_RETRY_BASE_DELAY_MS, MIN_TIMEOUT_MS};
use crate::domain::{DedupeKey, DomainError, HttpMethod, Job, JobId, JobPayload};
use crate::port::{IdProvider, TimeProvider};
use std::collections::BTreeMap;

/// Caller-supplied description of a deferred request
#[derive(Debug, Clone, PartialEq)]
pub struct EnqueueOptions {
    pub id: Option<JobId>,
    pub url: String,
    pub method: HttpMethod,
    pub body: Option<serde_json::Value>,
    pub headers: BTreeMap<String, String>,
    pub dedupe_key: Option<DedupeKey>,
    pub max_retries: Option<u32>,
    pub retry_base_delay_ms: Option<u64>,
    pub timeout_ms: Option<u64>,
    pub raw_body: bool,
}

impl EnqueueOptions {
    pub fn new(method: HttpMethod, url: impl Into<String>) -> Self {
        Self {
            id: None,
            url: url.into(),
            method,
            body: None,
            headers: BTreeMap::new(),
            dedupe_key: None,
            max_retries: None,
            retry_base_delay_ms: None,
            timeout_ms: None,
            raw_body: false,
        }
    }

    pub fn id(mut self, id: impl Into<JobId>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn body(mut self, body: serde_json::Value) -> Self {
        self.body = Some(body);
        self
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    pub fn dedupe_key(mut self, key: impl Into<DedupeKey>) -> Self {
        self.dedupe_key = Some(key.into());
        self
    }

    pub fn max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = Some(max_retries);
        self
    }

    pub fn retry_base_delay_ms(mut self, delay_ms: u64) -> Self {
        self.retry_base_delay_ms = Some(delay_ms);
        self
    }

    pub fn timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = Some(timeout_ms);
        self
    }

    pub fn raw_body(mut self, raw: bool) -> Self {
        self.raw_body = raw;
        self
    }

    fn validate(&self) -> Result<(), DomainError> {
        if self.url.trim().is_empty() {
            return Err(DomainError::ValidationError(
                "url must not be empty".to_string(),
            ));
        }
        if matches!(&self.id, Some(id) if id.trim().is_empty()) {
            return Err(DomainError::ValidationError(
                "job id must not be empty when supplied".to_string(),
            ));
        }
        if matches!(&self.dedupe_key, Some(key) if key.is_empty()) {
            return Err(DomainError::ValidationError(
                "dedupe key must not be empty when supplied".to_string(),
            ));
        }
        if self.headers.keys().any(|name| name.trim().is_empty()) {
            return Err(DomainError::ValidationError(
                "header names must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}

/// Build a job from options, applying configured defaults and floors
///
/// # Arguments
///
/// * `options` - Caller options
/// * `config` - Queue defaults
/// * `id_provider` - ID generator (used when the caller supplies none)
/// * `time_provider` - Clock for `created_at`
pub(crate) fn build_job(
    options: EnqueueOptions,
    config: &QueueConfig,
    id_provider: &dyn IdProvider,
    time_provider: &dyn TimeProvider,
) -> Result<Job, DomainError> {
    options.validate()?;

    let id = options.id.unwrap_or_else(|| id_provider.generate_id());
    let mut job = Job::new(id, time_provider.now_millis(), options.method, options.url);

    job.body = options.body.map(JobPayload::new);
    job.headers = options.headers;
    job.dedupe_key = options.dedupe_key;
    job.raw_body = options.raw_body;
    job.max_retries = options.max_retries.unwrap_or(config.default_max_retries);
    job.retry_base_delay_ms = options
        .retry_base_delay_ms
        .unwrap_or(config.default_retry_base_delay_ms)
        .max(MIN_RETRY_BASE_DELAY_MS);
    job.timeout_ms = options
        .timeout_ms
        .unwrap_or(config.default_timeout_ms)
        .max(MIN_TIMEOUT_MS);

    Ok(job)
}
