//! Shared fixtures: a recording HTTP server and SQLite-backed engines

#![allow(dead_code)]

use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, Method, StatusCode, Uri};
use axum::Router;
use outbox_core::application::QueueEngine;
use outbox_core::port::connectivity::mocks::StaticProbe;
use outbox_core::port::time_provider::SystemTimeProvider;
use outbox_infra_http::ReqwestTransport;
use outbox_infra_sqlite::{create_pool, run_migrations, SqliteDurableStore};
use sqlx::SqlitePool;
use std::collections::VecDeque;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// One request as received by the test server
#[derive(Debug, Clone)]
pub struct Received {
    pub method: String,
    pub path: String,
    pub content_type: Option<String>,
    pub authorization: Option<String>,
    pub body: Vec<u8>,
}

impl Received {
    pub fn json(&self) -> serde_json::Value {
        serde_json::from_slice(&self.body).unwrap()
    }
}

#[derive(Default)]
struct ServerState {
    received: Mutex<Vec<Received>>,
    /// Statuses answered in order; 200 once exhausted
    script: Mutex<VecDeque<u16>>,
}

pub struct TestServer {
    pub base_url: String,
    state: Arc<ServerState>,
}

impl TestServer {
    pub async fn start(script: impl IntoIterator<Item = u16>) -> Self {
        let state = Arc::new(ServerState::default());
        *state.script.lock().unwrap() = script.into_iter().collect();

        let app = Router::new().fallback(record).with_state(state.clone());
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            base_url: format!("http://{}", addr),
            state,
        }
    }

    pub fn received(&self) -> Vec<Received> {
        self.state.received.lock().unwrap().clone()
    }
}

async fn record(
    State(state): State<Arc<ServerState>>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> StatusCode {
    let header = |name: &str| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
    };
    state.received.lock().unwrap().push(Received {
        method: method.to_string(),
        path: uri.path().to_string(),
        content_type: header("content-type"),
        authorization: header("authorization"),
        body: body.to_vec(),
    });

    let status = state.script.lock().unwrap().pop_front().unwrap_or(200);
    StatusCode::from_u16(status).unwrap_or(StatusCode::OK)
}

/// A SQLite file under the system temp dir, removed on drop
pub struct TempDb {
    pub path: PathBuf,
}

impl TempDb {
    pub fn new(name: &str) -> Self {
        let path = std::env::temp_dir().join(format!("outbox_{}_{}.db", name, uuid::Uuid::new_v4()));
        Self { path }
    }

    pub async fn open(&self) -> SqlitePool {
        let pool = create_pool(&self.path.to_string_lossy()).await.unwrap();
        run_migrations(&pool).await.unwrap();
        pool
    }
}

impl Drop for TempDb {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.path);
        for suffix in ["-wal", "-shm"] {
            let mut side = self.path.clone().into_os_string();
            side.push(suffix);
            let _ = std::fs::remove_file(side);
        }
    }
}

/// Engine over SQLite + reqwest, with relative URLs joined to `base_url`
pub fn engine(pool: SqlitePool, base_url: &str, online: bool) -> QueueEngine {
    let base_url = base_url.to_string();
    QueueEngine::builder(
        Arc::new(SqliteDurableStore::new(pool, Arc::new(SystemTimeProvider))),
        Arc::new(ReqwestTransport::new()),
    )
    .probe(Arc::new(StaticProbe(online)))
    .url_transform(move |url| format!("{}{}", base_url, url))
    .build()
}

/// Poll until the queue is empty (panics after 10s)
pub async fn wait_until_drained(engine: &QueueEngine) {
    tokio::time::timeout(Duration::from_secs(10), async {
        while engine.status().pending > 0 || engine.status().in_flight > 0 {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("queue did not drain in time");
}
