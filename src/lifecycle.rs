//! Root cancellation scope for every long-lived task: the engine loop, SSE
//! connections, and the rate-limiter eviction worker all subscribe here.

use tokio::sync::broadcast;

#[derive(Debug, Clone)]
pub struct ShutdownCoordinator {
    tx: broadcast::Sender<()>,
}

impl ShutdownCoordinator {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(1);
        Self { tx }
    }

    /// A receiver that resolves once shutdown is signalled. Subscribe before
    /// spawning the task that waits on it.
    pub fn subscribe(&self) -> broadcast::Receiver<()> {
        self.tx.subscribe()
    }

    /// Signal every subscriber to stop.
    pub fn shutdown(&self) {
        let _ = self.tx.send(());
    }
}

impl Default for ShutdownCoordinator {
    fn default() -> Self {
        Self::new()
    }
}
