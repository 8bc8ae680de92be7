// Connectivity Port
//
// Synchronous "are we online right now" predicate, the equivalent of a
// platform network-status flag. Transitions are pushed separately through
// `QueueEngine::set_online`.

pub trait ConnectivityProbe: Send + Sync {
    fn is_online(&self) -> bool;
}

/// Default probe: assume the network is reachable until told otherwise
pub struct AlwaysOnline;

impl ConnectivityProbe for AlwaysOnline {
    fn is_online(&self) -> bool {
        true
    }
}

pub mod mocks {
    use super::*;

    /// Fixed answer, for starting an engine offline in tests
    pub struct StaticProbe(pub bool);

    impl ConnectivityProbe for StaticProbe {
        fn is_online(&self) -> bool {
            self.0
        }
    }
}
