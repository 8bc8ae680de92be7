// Connectivity monitor: periodic TCP reachability check feeding the engine's gate
use outbox_core::application::{QueueEngine, ShutdownToken};
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info};

const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(3);

/// Treats "a TCP connection to `addr` opens" as online
pub struct TcpConnectivityMonitor {
    addr: String,
    interval: Duration,
    connect_timeout: Duration,
}

impl TcpConnectivityMonitor {
    pub fn new(addr: impl Into<String>, interval: Duration) -> Self {
        Self {
            addr: addr.into(),
            interval,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT.min(interval),
        }
    }

    pub fn with_connect_timeout(mut self, connect_timeout: Duration) -> Self {
        self.connect_timeout = connect_timeout;
        self
    }

    pub async fn probe_once(&self) -> bool {
        matches!(
            tokio::time::timeout(self.connect_timeout, TcpStream::connect(&self.addr)).await,
            Ok(Ok(_))
        )
    }

    /// Probe every `interval` until shutdown, reporting each result to the engine
    pub async fn run(self, engine: QueueEngine, mut shutdown: ShutdownToken) {
        info!(
            addr = %self.addr,
            interval_ms = self.interval.as_millis() as u64,
            "Connectivity monitor started"
        );

        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {}
                _ = shutdown.wait() => break,
            }

            let online = self.probe_once().await;
            debug!(addr = %self.addr, online, "Probe finished");
            engine.set_online(online);
        }

        info!("Connectivity monitor stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use outbox_core::application::shutdown_channel;
    use outbox_core::port::connectivity::mocks::StaticProbe;
    use outbox_core::port::http_transport::mocks::ScriptedTransport;
    use outbox_core::port::MemoryStore;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_probe_once() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();

        let monitor = TcpConnectivityMonitor::new(addr.clone(), Duration::from_secs(1));
        assert!(monitor.probe_once().await);

        drop(listener);
        assert!(!monitor.probe_once().await);
    }

    #[tokio::test]
    async fn test_run_marks_engine_online() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();

        let engine = QueueEngine::builder(
            Arc::new(MemoryStore::new()),
            Arc::new(ScriptedTransport::always(200)),
        )
        .probe(Arc::new(StaticProbe(false)))
        .build();
        assert!(!engine.is_online());

        let (shutdown_tx, shutdown) = shutdown_channel();
        let monitor = TcpConnectivityMonitor::new(addr, Duration::from_millis(20));
        let handle = tokio::spawn(monitor.run(engine.clone(), shutdown));

        let mut status = engine.watch_status();
        tokio::time::timeout(Duration::from_secs(5), status.wait_for(|s| s.online))
            .await
            .unwrap()
            .unwrap();

        shutdown_tx.shutdown();
        handle.await.unwrap();
        drop(listener);
    }
}
