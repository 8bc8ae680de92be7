// Outbox Infrastructure - Network Adapters
// Implements: HttpTransport (reqwest), TCP reachability monitor

pub mod connectivity_monitor;
pub mod reqwest_transport;

pub use connectivity_monitor::TcpConnectivityMonitor;
pub use reqwest_transport::ReqwestTransport;
