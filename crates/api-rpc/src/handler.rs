//! RPC Method Handlers
//!
//! Thin translation between wire types and the queue engine.

use crate::error::to_rpc_error;
use crate::types::{
    EnqueueRequest, EnqueueResponse, FlushResponse, ListResponse, ResetResponse,
    SetConnectivityRequest, SetConnectivityResponse, StatusResponse,
};
use jsonrpsee::types::ErrorObjectOwned;
use outbox_core::application::{EnqueueOptions, QueueEngine};
use outbox_core::domain::HttpMethod;
use outbox_core::error::QueueError;
use tracing::debug;

/// RPC Handler with injected dependencies
pub struct RpcHandler {
    engine: QueueEngine,
    start_time: std::time::Instant,
}

impl RpcHandler {
    pub fn new(engine: QueueEngine) -> Self {
        Self {
            engine,
            start_time: std::time::Instant::now(),
        }
    }

    /// queue.enqueue.v1
    pub async fn enqueue(
        &self,
        params: EnqueueRequest,
    ) -> Result<EnqueueResponse, ErrorObjectOwned> {
        let method: HttpMethod = params
            .method
            .parse()
            .map_err(|e| to_rpc_error(QueueError::Domain(e)))?;

        let mut options = EnqueueOptions::new(method, params.url);
        options.id = params.id;
        options.body = params.body;
        options.headers = params.headers;
        options.dedupe_key = params.dedupe_key;
        options.max_retries = params.max_retries;
        options.retry_base_delay_ms = params.retry_base_delay_ms;
        options.timeout_ms = params.timeout_ms;
        options.raw_body = params.raw_body;

        let job_id = self.engine.enqueue(options).await.map_err(to_rpc_error)?;
        Ok(EnqueueResponse { job_id })
    }

    /// queue.flush.v1
    pub async fn flush(&self) -> Result<FlushResponse, ErrorObjectOwned> {
        let results = self.engine.flush().await;
        debug!(count = results.len(), "Manual flush finished");
        Ok(FlushResponse {
            results: results.into_iter().map(Into::into).collect(),
        })
    }

    /// queue.reset.v1
    pub async fn reset(&self) -> Result<ResetResponse, ErrorObjectOwned> {
        let cleared = self.engine.reset().await;
        Ok(ResetResponse { cleared })
    }

    /// queue.status.v1
    pub async fn status(&self) -> Result<StatusResponse, ErrorObjectOwned> {
        let status = self.engine.status();
        Ok(StatusResponse {
            pending: status.pending,
            in_flight: status.in_flight,
            online: status.online,
            uptime_seconds: self.start_time.elapsed().as_secs(),
        })
    }

    /// queue.list.v1
    pub async fn list(&self) -> Result<ListResponse, ErrorObjectOwned> {
        Ok(ListResponse {
            jobs: self.engine.jobs(),
        })
    }

    /// connectivity.set.v1
    pub async fn set_connectivity(
        &self,
        params: SetConnectivityRequest,
    ) -> Result<SetConnectivityResponse, ErrorObjectOwned> {
        self.engine.set_online(params.online);
        Ok(SetConnectivityResponse {
            online: self.engine.is_online(),
        })
    }
}
