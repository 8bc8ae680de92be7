// Queue configuration

use super::constants::*;

#[derive(Debug, Clone)]
pub struct QueueConfig {
    /// Key handed to the durable store
    pub storage_key: String,
    /// Upper bound on simultaneous network calls (floor 1)
    pub concurrency: usize,
    /// Defaults for jobs that do not override them
    pub default_max_retries: u32,
    pub default_retry_base_delay_ms: u64,
    pub default_timeout_ms: u64,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            storage_key: DEFAULT_STORAGE_KEY.to_string(),
            concurrency: DEFAULT_CONCURRENCY,
            default_max_retries: DEFAULT_MAX_RETRIES,
            default_retry_base_delay_ms: DEFAULT_RETRY_BASE_DELAY_MS,
            default_timeout_ms: DEFAULT_TIMEOUT_MS,
        }
    }
}

impl QueueConfig {
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency;
        self
    }

    pub fn with_storage_key(mut self, key: impl Into<String>) -> Self {
        self.storage_key = key.into();
        self
    }

    pub(crate) fn effective_concurrency(&self) -> usize {
        self.concurrency.max(1)
    }
}
