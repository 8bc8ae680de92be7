// Queue constants (no magic values)

/// Storage key the snapshot is written under
pub const DEFAULT_STORAGE_KEY: &str = "offline-queue";

/// Simultaneous network calls
pub const DEFAULT_CONCURRENCY: usize = 2;

/// Attempts allowed beyond the first
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// Backoff base (1s), and its floor (100ms)
pub const DEFAULT_RETRY_BASE_DELAY_MS: u64 = 1000;
pub const MIN_RETRY_BASE_DELAY_MS: u64 = 100;

/// Per-attempt network timeout (15s), and its floor (1s)
pub const DEFAULT_TIMEOUT_MS: u64 = 15_000;
pub const MIN_TIMEOUT_MS: u64 = 1_000;

/// Backoff stops doubling after 2^16 * base
pub const MAX_BACKOFF_EXPONENT: u32 = 16;

/// Buffered flush results per subscriber before it starts lagging
pub const RESULT_CHANNEL_CAPACITY: usize = 256;

/// Current layout of the persisted envelope
pub const SNAPSHOT_VERSION: u32 = 1;
