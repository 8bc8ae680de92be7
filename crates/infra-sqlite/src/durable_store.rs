// SQLite DurableStore Implementation

use crate::map_sqlx_error;
use async_trait::async_trait;
use outbox_core::error::Result;
use outbox_core::port::{DurableStore, TimeProvider};
use sqlx::SqlitePool;
use std::sync::Arc;
use tracing::{error, trace};

/// Prefix applied to every key, so the table can be shared with other data
pub const KEY_PREFIX: &str = "outbox:";

pub struct SqliteDurableStore {
    pool: SqlitePool,
    time_provider: Arc<dyn TimeProvider>,
}

impl SqliteDurableStore {
    pub fn new(pool: SqlitePool, time_provider: Arc<dyn TimeProvider>) -> Self {
        Self {
            pool,
            time_provider,
        }
    }

    fn storage_key(key: &str) -> String {
        format!("{}{}", KEY_PREFIX, key)
    }
}

#[async_trait]
impl DurableStore for SqliteDurableStore {
    async fn get(&self, key: &str) -> Option<String> {
        let result: std::result::Result<Option<String>, sqlx::Error> =
            sqlx::query_scalar("SELECT value FROM kv_store WHERE key = ?")
                .bind(Self::storage_key(key))
                .fetch_optional(&self.pool)
                .await;

        match result {
            Ok(value) => value,
            Err(e) => {
                error!(key, error = %map_sqlx_error(e), "Failed to read from store");
                None
            }
        }
    }

    async fn set(&self, key: &str, value: &str) -> Result<()> {
        let now = self.time_provider.now_millis();
        sqlx::query(
            r#"
            INSERT INTO kv_store (key, value, updated_at) VALUES (?, ?, ?)
            ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at
            "#,
        )
        .bind(Self::storage_key(key))
        .bind(value)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        trace!(key, bytes = value.len(), "Stored value");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{create_pool, run_migrations};
    use outbox_core::port::time_provider::mocks::FixedTimeProvider;

    async fn store() -> SqliteDurableStore {
        let pool = create_pool(":memory:").await.unwrap();
        run_migrations(&pool).await.unwrap();
        SqliteDurableStore::new(pool, Arc::new(FixedTimeProvider(1_000)))
    }

    #[tokio::test]
    async fn test_get_missing_key() {
        let store = store().await;
        assert_eq!(store.get("offline-queue").await, None);
    }

    #[tokio::test]
    async fn test_set_then_overwrite() {
        let store = store().await;
        store.set("offline-queue", "[]").await.unwrap();
        store.set("offline-queue", r#"{"version":1,"jobs":[]}"#).await.unwrap();

        assert_eq!(
            store.get("offline-queue").await.as_deref(),
            Some(r#"{"version":1,"jobs":[]}"#)
        );
    }

    #[tokio::test]
    async fn test_keys_are_prefixed() {
        let store = store().await;
        store.set("offline-queue", "[]").await.unwrap();

        let key: String = sqlx::query_scalar("SELECT key FROM kv_store")
            .fetch_one(&store.pool)
            .await
            .unwrap();
        assert_eq!(key, "outbox:offline-queue");
    }

    #[tokio::test]
    async fn test_get_without_schema_returns_none() {
        // Missing table is a storage failure: reported as absent, never an error
        let pool = create_pool(":memory:").await.unwrap();
        let store = SqliteDurableStore::new(pool, Arc::new(FixedTimeProvider(1_000)));

        assert_eq!(store.get("offline-queue").await, None);
        assert!(store.set("offline-queue", "[]").await.is_err());
    }

    #[tokio::test]
    async fn test_survives_reopen() {
        let path = std::env::temp_dir().join(format!("outbox_store_{}.db", uuid::Uuid::new_v4()));
        let db_path = path.to_string_lossy().to_string();

        {
            let pool = create_pool(&db_path).await.unwrap();
            run_migrations(&pool).await.unwrap();
            let store = SqliteDurableStore::new(pool.clone(), Arc::new(FixedTimeProvider(1)));
            store.set("offline-queue", "persisted").await.unwrap();
            pool.close().await;
        }

        {
            let pool = create_pool(&db_path).await.unwrap();
            run_migrations(&pool).await.unwrap();
            let store = SqliteDurableStore::new(pool.clone(), Arc::new(FixedTimeProvider(2)));
            assert_eq!(store.get("offline-queue").await.as_deref(), Some("persisted"));
            pool.close().await;
        }

        let _ = std::fs::remove_file(&path);
    }
}
