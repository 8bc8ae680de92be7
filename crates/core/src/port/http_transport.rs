// HTTP Transport Port
// Abstraction over the network client used to deliver queued jobs

use crate::domain::{HttpRequest, HttpResponse};
use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;

/// Transport-level failures.
///
/// A response with a non-2xx status is NOT an error at this layer; it comes
/// back as `Ok(HttpResponse)` so the engine can tell "server said 500" apart
/// from "request never completed".
#[derive(Error, Debug)]
pub enum TransportError {
    #[error("Connection failed: {0}")]
    Connect(String),

    #[error("Request failed: {0}")]
    Request(String),

    #[error("Request timed out")]
    Timeout,

    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

#[async_trait]
pub trait HttpTransport: Send + Sync {
    /// Issue the request and report whatever status the server answered with
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, TransportError>;
}

/// Rewrites a job URL before sending (e.g. joins a base URL)
pub type UrlTransform = Arc<dyn Fn(&str) -> String + Send + Sync>;

/// Last-moment request customisation (e.g. auth headers)
pub type RequestTransform = Arc<dyn Fn(&mut HttpRequest) + Send + Sync>;

// ============================================================================
// Mock Implementations for Testing
// ============================================================================

pub mod mocks {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Mutex, PoisonError};
    use std::time::Duration;
    use tokio::time::Instant;

    /// Scripted reply for one call
    #[derive(Debug, Clone)]
    pub enum MockReply {
        /// Respond with this status
        Status(u16),
        /// Fail before any response
        NetworkError(String),
        /// Never complete (exercises the per-attempt timeout)
        Hang,
    }

    /// A call as seen by the transport
    #[derive(Debug, Clone)]
    pub struct RecordedCall {
        pub request: HttpRequest,
        pub at: Instant,
    }

    /// Transport that replays a script, then falls back to a fixed reply
    pub struct ScriptedTransport {
        script: Mutex<VecDeque<MockReply>>,
        fallback: MockReply,
        latency: Duration,
        calls: Mutex<Vec<RecordedCall>>,
        active: Arc<AtomicUsize>,
        peak: AtomicUsize,
    }

    struct ActiveGuard(Arc<AtomicUsize>);

    impl Drop for ActiveGuard {
        fn drop(&mut self) {
            self.0.fetch_sub(1, Ordering::SeqCst);
        }
    }

    impl ScriptedTransport {
        pub fn new(fallback: MockReply) -> Self {
            Self {
                script: Mutex::new(VecDeque::new()),
                fallback,
                latency: Duration::ZERO,
                calls: Mutex::new(Vec::new()),
                active: Arc::new(AtomicUsize::new(0)),
                peak: AtomicUsize::new(0),
            }
        }

        pub fn always(status: u16) -> Self {
            Self::new(MockReply::Status(status))
        }

        pub fn with_script(self, replies: impl IntoIterator<Item = MockReply>) -> Self {
            *self.script.lock().unwrap_or_else(PoisonError::into_inner) = replies.into_iter().collect();
            self
        }

        /// Delay every reply (lets concurrent calls overlap)
        pub fn with_latency(mut self, latency: Duration) -> Self {
            self.latency = latency;
            self
        }

        pub fn calls(&self) -> Vec<RecordedCall> {
            self.calls.lock().unwrap_or_else(PoisonError::into_inner).clone()
        }

        pub fn call_count(&self) -> usize {
            self.calls.lock().unwrap_or_else(PoisonError::into_inner).len()
        }

        /// Highest number of calls that were in progress at the same time
        pub fn peak_concurrency(&self) -> usize {
            self.peak.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl HttpTransport for ScriptedTransport {
        async fn send(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
            self.calls.lock().unwrap_or_else(PoisonError::into_inner).push(RecordedCall {
                request,
                at: Instant::now(),
            });
            let reply = self
                .script
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .pop_front()
                .unwrap_or_else(|| self.fallback.clone());

            let now_active = self.active.fetch_add(1, Ordering::SeqCst) + 1;
            let _guard = ActiveGuard(Arc::clone(&self.active));
            self.peak.fetch_max(now_active, Ordering::SeqCst);

            if !self.latency.is_zero() {
                tokio::time::sleep(self.latency).await;
            }

            match reply {
                MockReply::Status(status) => Ok(HttpResponse::new(status)),
                MockReply::NetworkError(msg) => Err(TransportError::Request(msg)),
                MockReply::Hang => std::future::pending().await,
            }
        }
    }

    #[cfg(test)]
    mod tests {
        use super::*;
        use crate::domain::HttpMethod;
        use std::collections::BTreeMap;

        fn request(url: &str) -> HttpRequest {
            HttpRequest {
                method: HttpMethod::Post,
                url: url.to_string(),
                headers: BTreeMap::new(),
                body: None,
                timeout: Duration::from_secs(1),
            }
        }

        #[tokio::test]
        async fn test_poisoned_lock_still_records_calls() {
            let transport = ScriptedTransport::always(200);
            let poisoned = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
                let _calls = transport.calls.lock().unwrap_or_else(PoisonError::into_inner);
                panic!("panic while holding the call log");
            }));
            assert!(poisoned.is_err());
            assert!(transport.calls.is_poisoned());

            let response = transport.send(request("/api/objects")).await.unwrap();
            assert_eq!(response.status, 200);
            assert_eq!(transport.call_count(), 1);
            assert_eq!(transport.calls()[0].request.url, "/api/objects");
        }

        #[tokio::test]
        async fn test_script_then_fallback() {
            let transport = ScriptedTransport::always(201)
                .with_script([MockReply::NetworkError("reset".to_string())]);

            assert!(transport.send(request("/a")).await.is_err());
            assert_eq!(transport.send(request("/b")).await.unwrap().status, 201);
            assert_eq!(transport.peak_concurrency(), 1);
        }
    }
}
