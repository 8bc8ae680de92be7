// Connectivity Gate
// Tracks online/offline; the engine listens for transitions to online

use crate::port::ConnectivityProbe;
use tokio::sync::watch;

pub struct ConnectivityGate {
    tx: watch::Sender<bool>,
}

impl ConnectivityGate {
    /// Seed the state from the injected probe
    pub fn new(probe: &dyn ConnectivityProbe) -> Self {
        let (tx, _rx) = watch::channel(probe.is_online());
        Self { tx }
    }

    pub fn is_online(&self) -> bool {
        *self.tx.borrow()
    }

    /// Record the current state. Returns true only on an actual transition,
    /// and only transitions wake subscribers.
    pub fn set_online(&self, online: bool) -> bool {
        self.tx.send_if_modified(|current| {
            if *current == online {
                false
            } else {
                *current = online;
                true
            }
        })
    }

    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.tx.subscribe()
    }
}
