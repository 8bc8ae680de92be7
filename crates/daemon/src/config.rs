//! Daemon configuration from environment variables

use anyhow::{bail, Result};
use outbox_api_rpc::server::DEFAULT_RPC_PORT;
use outbox_core::application::queue::constants::DEFAULT_CONCURRENCY;
use std::time::Duration;

const DEFAULT_DB_PATH: &str = "~/.outbox/queue.db";
const DEFAULT_PROBE_INTERVAL_MS: u64 = 5_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreKind {
    Sqlite,
    Memory,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Pretty,
    Json,
}

#[derive(Debug, Clone)]
pub struct DaemonConfig {
    pub log_format: LogFormat,
    pub db_path: String,
    pub store: StoreKind,
    pub rpc_port: u16,
    pub concurrency: usize,
    /// Joined in front of relative job URLs
    pub base_url: Option<String>,
    /// Sent as a bearer token unless the job sets Authorization itself
    pub auth_token: Option<String>,
    /// host:port probed to decide online/offline; absent means always online
    pub probe_addr: Option<String>,
    pub probe_interval: Duration,
}

impl DaemonConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let non_empty = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        let log_format = match non_empty("OUTBOX_LOG_FORMAT").as_deref() {
            Some("json") => LogFormat::Json,
            _ => LogFormat::Pretty,
        };

        let store = match non_empty("OUTBOX_STORE").as_deref() {
            None | Some("sqlite") => StoreKind::Sqlite,
            Some("memory") => StoreKind::Memory,
            Some(other) => bail!("OUTBOX_STORE must be 'sqlite' or 'memory', got '{}'", other),
        };

        let db_path = non_empty("OUTBOX_DB_PATH").unwrap_or_else(|| DEFAULT_DB_PATH.to_string());
        let db_path = shellexpand::tilde(&db_path).into_owned();

        let rpc_port: u16 = non_empty("OUTBOX_RPC_PORT")
            .and_then(|s| s.parse().ok())
            .unwrap_or(DEFAULT_RPC_PORT);

        let concurrency: usize = non_empty("OUTBOX_CONCURRENCY")
            .and_then(|s| s.parse().ok())
            .unwrap_or(DEFAULT_CONCURRENCY);

        let probe_interval_ms: u64 = non_empty("OUTBOX_PROBE_INTERVAL_MS")
            .and_then(|s| s.parse().ok())
            .filter(|ms| *ms > 0)
            .unwrap_or(DEFAULT_PROBE_INTERVAL_MS);

        Ok(Self {
            log_format,
            db_path,
            store,
            rpc_port,
            concurrency,
            base_url: non_empty("OUTBOX_BASE_URL"),
            auth_token: non_empty("OUTBOX_AUTH_TOKEN"),
            probe_addr: non_empty("OUTBOX_PROBE_ADDR"),
            probe_interval: Duration::from_millis(probe_interval_ms),
        })
    }
}

/// Prefix a relative job URL with the configured base; absolute URLs pass through
pub fn join_base_url(base: &str, url: &str) -> String {
    if url.starts_with("http://") || url.starts_with("https://") {
        return url.to_string();
    }
    format!(
        "{}/{}",
        base.trim_end_matches('/'),
        url.trim_start_matches('/')
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(vars: &[(&str, &str)]) -> Result<DaemonConfig> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        DaemonConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = config(&[]).unwrap();
        assert_eq!(config.log_format, LogFormat::Pretty);
        assert_eq!(config.store, StoreKind::Sqlite);
        assert_eq!(config.rpc_port, 9633);
        assert_eq!(config.concurrency, 2);
        assert!(config.db_path.ends_with(".outbox/queue.db"));
        assert!(!config.db_path.starts_with('~'));
        assert!(config.base_url.is_none());
        assert!(config.probe_addr.is_none());
        assert_eq!(config.probe_interval, Duration::from_secs(5));
    }

    #[test]
    fn test_overrides() {
        let config = config(&[
            ("OUTBOX_LOG_FORMAT", "json"),
            ("OUTBOX_STORE", "memory"),
            ("OUTBOX_DB_PATH", "/var/lib/outbox/q.db"),
            ("OUTBOX_RPC_PORT", "9700"),
            ("OUTBOX_CONCURRENCY", "8"),
            ("OUTBOX_BASE_URL", "https://api.example.test"),
            ("OUTBOX_AUTH_TOKEN", "secret"),
            ("OUTBOX_PROBE_ADDR", "api.example.test:443"),
            ("OUTBOX_PROBE_INTERVAL_MS", "250"),
        ])
        .unwrap();

        assert_eq!(config.log_format, LogFormat::Json);
        assert_eq!(config.store, StoreKind::Memory);
        assert_eq!(config.db_path, "/var/lib/outbox/q.db");
        assert_eq!(config.rpc_port, 9700);
        assert_eq!(config.concurrency, 8);
        assert_eq!(config.base_url.as_deref(), Some("https://api.example.test"));
        assert_eq!(config.auth_token.as_deref(), Some("secret"));
        assert_eq!(config.probe_addr.as_deref(), Some("api.example.test:443"));
        assert_eq!(config.probe_interval, Duration::from_millis(250));
    }

    #[test]
    fn test_unparseable_numbers_fall_back() {
        let config = config(&[("OUTBOX_RPC_PORT", "abc"), ("OUTBOX_PROBE_INTERVAL_MS", "0")]).unwrap();
        assert_eq!(config.rpc_port, 9633);
        assert_eq!(config.probe_interval, Duration::from_secs(5));
    }

    #[test]
    fn test_unknown_store_rejected() {
        assert!(config(&[("OUTBOX_STORE", "redis")]).is_err());
    }

    #[test]
    fn test_join_base_url() {
        assert_eq!(
            join_base_url("https://api.example.test/", "/api/objects"),
            "https://api.example.test/api/objects"
        );
        assert_eq!(
            join_base_url("https://api.example.test", "api/objects"),
            "https://api.example.test/api/objects"
        );
        assert_eq!(
            join_base_url("https://api.example.test", "https://other.test/x"),
            "https://other.test/x"
        );
    }
}
