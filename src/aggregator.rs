use std::collections::BTreeSet;
use std::sync::Arc;

use tokio::sync::Mutex;

/// Thread-safe collection of open ports, shared by all workers.
#[derive(Clone, Debug, Default)]
pub struct ResultAggregator {
    open: Arc<Mutex<BTreeSet<u16>>>,
}

impl ResultAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn record_open(&self, port: u16) {
        self.open.lock().await.insert(port);
    }

    /// Open ports in ascending order. Only meaningful once every job has drained.
    pub async fn snapshot(&self) -> Vec<u16> {
        self.open.lock().await.iter().copied().collect()
    }
}
