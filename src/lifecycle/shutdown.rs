//! Shutdown coordination.
//!
//! `Shutdown` fans the stop signal out to the serve loop. `SinkGuard` holds
//! the publisher for the lifetime of `run` and releases its sinks when the
//! guard goes out of scope, whether serving ended cleanly or failed.

use std::sync::Arc;

use tokio::sync::broadcast;

use crate::output::Publisher;

/// Stop signal for the tap server.
#[derive(Clone)]
pub struct Shutdown {
    tx: broadcast::Sender<()>,
}

impl Shutdown {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(1);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<()> {
        self.tx.subscribe()
    }

    /// Ask the server to stop accepting and drain. Firing with nobody
    /// subscribed is not an error.
    pub fn trigger(&self) {
        let _ = self.tx.send(());
    }
}

impl Default for Shutdown {
    fn default() -> Self {
        Self::new()
    }
}

/// Closes the publisher when dropped, even while request handlers still
/// hold clones of it.
pub struct SinkGuard {
    publisher: Arc<Publisher>,
}

impl SinkGuard {
    pub fn new(publisher: Arc<Publisher>) -> Self {
        Self { publisher }
    }

    /// Shared handle for the interceptor.
    pub fn publisher(&self) -> Arc<Publisher> {
        self.publisher.clone()
    }
}

impl Drop for SinkGuard {
    fn drop(&mut self) {
        if !self.publisher.is_closed() {
            self.publisher.close();
            tracing::info!("Transaction sinks released");
        }
    }
}
