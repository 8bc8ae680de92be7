//! JSON-RPC Server
//!
//! JSON-RPC 2.0 over TCP, bound to localhost only.

use crate::handler::RpcHandler;
use crate::types::{EnqueueRequest, SetConnectivityRequest};
use jsonrpsee::server::{Server, ServerHandle};
use jsonrpsee::RpcModule;
use outbox_core::application::QueueEngine;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::info;

const DEFAULT_RPC_HOST: &str = "127.0.0.1";
pub const DEFAULT_RPC_PORT: u16 = 9633;

/// RPC Server Configuration
pub struct RpcServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for RpcServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_RPC_HOST.to_string(),
            port: DEFAULT_RPC_PORT,
        }
    }
}

/// RPC Server
pub struct RpcServer {
    config: RpcServerConfig,
    handler: Arc<RpcHandler>,
}

impl RpcServer {
    pub fn new(config: RpcServerConfig, engine: QueueEngine) -> Self {
        Self {
            config,
            handler: Arc::new(RpcHandler::new(engine)),
        }
    }

    /// Start the JSON-RPC server; returns the bound address (useful with port 0)
    pub async fn start(self) -> Result<(SocketAddr, ServerHandle), String> {
        let addr = format!("{}:{}", self.config.host, self.config.port);

        let server = Server::builder()
            .build(&addr)
            .await
            .map_err(|e| format!("Failed to build server on {}: {}", addr, e))?;
        let local_addr = server
            .local_addr()
            .map_err(|e| format!("Failed to read bound address: {}", e))?;

        let mut module = RpcModule::new(());

        let handler = self.handler.clone();
        module
            .register_async_method("queue.enqueue.v1", move |params, _, _| {
                let handler = handler.clone();
                async move {
                    let req: EnqueueRequest = params.parse()?;
                    handler.enqueue(req).await
                }
            })
            .map_err(|e| e.to_string())?;

        let handler = self.handler.clone();
        module
            .register_async_method("queue.flush.v1", move |_, _, _| {
                let handler = handler.clone();
                async move { handler.flush().await }
            })
            .map_err(|e| e.to_string())?;

        let handler = self.handler.clone();
        module
            .register_async_method("queue.reset.v1", move |_, _, _| {
                let handler = handler.clone();
                async move { handler.reset().await }
            })
            .map_err(|e| e.to_string())?;

        let handler = self.handler.clone();
        module
            .register_async_method("queue.status.v1", move |_, _, _| {
                let handler = handler.clone();
                async move { handler.status().await }
            })
            .map_err(|e| e.to_string())?;

        let handler = self.handler.clone();
        module
            .register_async_method("queue.list.v1", move |_, _, _| {
                let handler = handler.clone();
                async move { handler.list().await }
            })
            .map_err(|e| e.to_string())?;

        let handler = self.handler.clone();
        module
            .register_async_method("connectivity.set.v1", move |params, _, _| {
                let handler = handler.clone();
                async move {
                    let req: SetConnectivityRequest = params.parse()?;
                    handler.set_connectivity(req).await
                }
            })
            .map_err(|e| e.to_string())?;

        info!(addr = %local_addr, "JSON-RPC server listening (localhost only)");

        let handle = server.start(module);
        Ok((local_addr, handle))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use outbox_core::port::connectivity::mocks::StaticProbe;
    use outbox_core::port::http_transport::mocks::ScriptedTransport;
    use outbox_core::port::MemoryStore;
    use serde_json::{json, Value};

    async fn call(addr: SocketAddr, method: &str, params: Value) -> Value {
        reqwest::Client::new()
            .post(format!("http://{}", addr))
            .json(&json!({"jsonrpc": "2.0", "id": 1, "method": method, "params": params}))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_round_trip_over_tcp() {
        let engine = QueueEngine::builder(
            Arc::new(MemoryStore::new()),
            Arc::new(ScriptedTransport::always(200)),
        )
        .probe(Arc::new(StaticProbe(false)))
        .build();
        let config = RpcServerConfig {
            host: "127.0.0.1".to_string(),
            port: 0,
        };
        let (addr, handle) = RpcServer::new(config, engine).start().await.unwrap();

        let enqueued = call(
            addr,
            "queue.enqueue.v1",
            json!({"url": "/api/objects", "method": "POST", "body": {"a": 1}}),
        )
        .await;
        assert!(enqueued["result"]["job_id"].is_string());

        let status = call(addr, "queue.status.v1", json!([])).await;
        assert_eq!(status["result"]["pending"], 1);
        assert_eq!(status["result"]["online"], false);

        let rejected = call(
            addr,
            "queue.enqueue.v1",
            json!({"url": "/x", "method": "TRACE"}),
        )
        .await;
        assert_eq!(rejected["error"]["code"], 4000);

        handle.stop().unwrap();
    }
}
