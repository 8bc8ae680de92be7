// Port Layer - Interfaces for external dependencies

pub mod connectivity;
pub mod durable_store;
pub mod http_transport;
pub mod id_provider; // For deterministic testing
pub mod time_provider;

// Re-exports
pub use connectivity::{AlwaysOnline, ConnectivityProbe};
pub use durable_store::{DurableStore, MemoryStore};
pub use http_transport::{HttpTransport, RequestTransform, TransportError, UrlTransform};
pub use id_provider::IdProvider;
pub use time_provider::TimeProvider;
