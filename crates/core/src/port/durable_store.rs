// Durable Store Port (Interface)

use crate::error::Result;
use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;

/// Key/value persistence for the serialized queue snapshot
///
/// Implementations:
/// - MemoryStore: process-local, lost on exit
/// - SqliteDurableStore (infra-sqlite): survives restarts
#[async_trait]
pub trait DurableStore: Send + Sync {
    /// Read a value.
    ///
    /// Never fails: storage-layer errors are logged by the implementation
    /// and reported as `None`, so a broken store degrades to an empty queue.
    async fn get(&self, key: &str) -> Option<String>;

    /// Write a value, replacing any previous one
    async fn set(&self, key: &str, value: &str) -> Result<()>;
}

/// In-memory store (tests, and the daemon's `memory` mode)
#[derive(Default)]
pub struct MemoryStore {
    entries: RwLock<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl DurableStore for MemoryStore {
    async fn get(&self, key: &str) -> Option<String> {
        self.entries.read().await.get(key).cloned()
    }

    async fn set(&self, key: &str, value: &str) -> Result<()> {
        self.entries
            .write()
            .await
            .insert(key.to_string(), value.to_string());
        Ok(())
    }
}

// ============================================================================
// Mock Implementations for Testing
// ============================================================================

pub mod mocks {
    use super::*;
    use crate::error::QueueError;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Store whose reads come back empty and whose writes always fail
    #[derive(Default)]
    pub struct FailingStore {
        write_attempts: AtomicUsize,
    }

    impl FailingStore {
        pub fn write_attempts(&self) -> usize {
            self.write_attempts.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl DurableStore for FailingStore {
        async fn get(&self, _key: &str) -> Option<String> {
            None
        }

        async fn set(&self, _key: &str, _value: &str) -> Result<()> {
            self.write_attempts.fetch_add(1, Ordering::SeqCst);
            Err(QueueError::Store("quota exceeded".to_string()))
        }
    }
}
