// Application Layer - Use Cases and Orchestration

pub mod connectivity;
pub mod queue;
pub mod retry;
pub mod shutdown;

// Re-exports
pub use connectivity::ConnectivityGate;
pub use queue::{EnqueueOptions, QueueConfig, QueueEngine, QueueEngineBuilder, QueueStatus};
pub use retry::RetryDecision;
pub use shutdown::{shutdown_channel, ShutdownSender, ShutdownToken};
