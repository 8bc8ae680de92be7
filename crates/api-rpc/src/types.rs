//! RPC Request/Response Types
//!
//! Method parameters and results. Methods without parameters take none.

use outbox_core::domain::{FlushOutcome, FlushResult, Job};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// queue.enqueue.v1 - Queue a deferred request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnqueueRequest {
    pub url: String,
    pub method: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub headers: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dedupe_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_retries: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retry_base_delay_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_ms: Option<u64>,
    #[serde(default)]
    pub raw_body: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnqueueResponse {
    pub job_id: String,
}

/// queue.flush.v1 - Run one batch now
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlushResponse {
    pub results: Vec<FlushResultView>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlushResultView {
    pub job_id: String,
    pub delivered: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub will_retry: bool,
}

impl From<FlushResult> for FlushResultView {
    fn from(result: FlushResult) -> Self {
        match result.outcome {
            FlushOutcome::Delivered(response) => Self {
                job_id: result.job_id,
                delivered: true,
                status: Some(response.status),
                error: None,
                will_retry: false,
            },
            FlushOutcome::Failed { error, will_retry } => Self {
                job_id: result.job_id,
                delivered: false,
                status: None,
                error: Some(error.to_string()),
                will_retry,
            },
        }
    }
}

/// queue.reset.v1 - Drop every pending job
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResetResponse {
    pub cleared: usize,
}

/// queue.status.v1 - Queue summary
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusResponse {
    pub pending: usize,
    pub in_flight: usize,
    pub online: bool,
    pub uptime_seconds: u64,
}

/// queue.list.v1 - Pending jobs in insertion order
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListResponse {
    pub jobs: Vec<Job>,
}

/// connectivity.set.v1 - Manual online/offline override
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SetConnectivityRequest {
    pub online: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SetConnectivityResponse {
    pub online: bool,
}
