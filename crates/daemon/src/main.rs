//! Outbox Daemon - Main Entry Point
//! Hosts the queue engine, its durable store and the JSON-RPC surface

mod config;

use anyhow::Result;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use config::{join_base_url, DaemonConfig, LogFormat, StoreKind};
use outbox_api_rpc::{RpcServer, RpcServerConfig};
use outbox_core::application::{shutdown_channel, QueueConfig, QueueEngine};
use outbox_core::port::time_provider::SystemTimeProvider;
use outbox_core::port::{DurableStore, MemoryStore};
use outbox_infra_http::{ReqwestTransport, TcpConnectivityMonitor};
use outbox_infra_sqlite::{create_pool, run_migrations, SqliteDurableStore};

const VERSION: &str = env!("CARGO_PKG_VERSION");

fn init_logging(format: LogFormat) -> Result<()> {
    let env_filter =
        EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new("outbox=info"))?;

    match format {
        LogFormat::Json => {
            // Production: JSON structured logging
            tracing_subscriber::registry()
                .with(env_filter)
                .with(fmt::layer().json())
                .init();
        }
        LogFormat::Pretty => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(fmt::layer().pretty())
                .init();
        }
    }
    Ok(())
}

async fn open_store(config: &DaemonConfig) -> Result<Arc<dyn DurableStore>> {
    match config.store {
        StoreKind::Memory => {
            info!("Using in-memory store (queue is lost on exit)");
            Ok(Arc::new(MemoryStore::new()))
        }
        StoreKind::Sqlite => {
            info!(db_path = %config.db_path, "Initializing database...");
            if let Some(parent) = std::path::Path::new(&config.db_path).parent() {
                tokio::fs::create_dir_all(parent).await?;
            }
            let pool = create_pool(&config.db_path)
                .await
                .map_err(|e| anyhow::anyhow!("DB pool creation failed: {}", e))?;
            run_migrations(&pool)
                .await
                .map_err(|e| anyhow::anyhow!("Migration failed: {}", e))?;
            Ok(Arc::new(SqliteDurableStore::new(
                pool,
                Arc::new(SystemTimeProvider),
            )))
        }
    }
}

fn build_engine(config: &DaemonConfig, store: Arc<dyn DurableStore>) -> QueueEngine {
    let mut builder = QueueEngine::builder(store, Arc::new(ReqwestTransport::new()))
        .config(QueueConfig::default().with_concurrency(config.concurrency));

    if let Some(base_url) = config.base_url.clone() {
        builder = builder.url_transform(move |url| join_base_url(&base_url, url));
    }
    if let Some(token) = config.auth_token.clone() {
        builder = builder.request_transform(move |request| {
            if request.header("Authorization").is_none() {
                request.set_header("Authorization", format!("Bearer {}", token));
            }
        });
    }

    builder.build()
}

#[tokio::main]
async fn main() -> Result<()> {
    // 1. Configuration + logging
    let config = DaemonConfig::from_env()?;
    init_logging(config.log_format)?;

    info!("Outbox daemon v{} starting...", VERSION);

    // 2. Store + engine (DI wiring)
    let store = open_store(&config).await?;
    let engine = build_engine(&config, store);

    // 3. Load what was pending before the last shutdown
    let restored = engine.hydrate().await;
    info!(restored, "Queue restored");

    // 4. Start JSON-RPC server
    let rpc_config = RpcServerConfig {
        port: config.rpc_port,
        ..Default::default()
    };
    let (rpc_addr, rpc_handle) = RpcServer::new(rpc_config, engine.clone())
        .start()
        .await
        .map_err(|e| anyhow::anyhow!("RPC server start failed: {}", e))?;

    // 5. Optional reachability monitor
    let (shutdown_tx, shutdown_rx) = shutdown_channel();
    let monitor_handle = config.probe_addr.clone().map(|addr| {
        let monitor = TcpConnectivityMonitor::new(addr, config.probe_interval);
        tokio::spawn(monitor.run(engine.clone(), shutdown_rx.clone()))
    });

    info!(rpc_addr = %rpc_addr, "System ready");
    info!("Press Ctrl+C to shutdown");

    // 6. Wait for shutdown signal
    tokio::signal::ctrl_c().await?;

    info!("Shutdown signal received. Exiting gracefully...");

    // 7. Graceful shutdown: no new timers, in-flight requests may finish
    shutdown_tx.shutdown();
    engine.dispose();
    rpc_handle
        .stop()
        .map_err(|e| anyhow::anyhow!("RPC server stop failed: {}", e))?;
    if let Some(handle) = monitor_handle {
        let _ = tokio::time::timeout(Duration::from_secs(5), handle).await;
    }

    info!(pending = engine.status().pending, "Shutdown complete.");

    Ok(())
}
