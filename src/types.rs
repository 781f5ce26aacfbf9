use std::sync::Arc;

use serde::{Deserialize, Serialize};

/// One connect attempt against `host:port`. Consumed exactly once by one worker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Job {
    pub host: Arc<str>,
    pub port: u16,
}

impl Job {
    pub fn new(host: Arc<str>, port: u16) -> Self {
        Self { host, port }
    }
}

/// Final outcome of one scan.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct ScanReport {
    pub host: String,
    /// Jobs processed by the pool; equals the number of ports requested.
    pub ports_scanned: u64,
    /// Ports that accepted a connection, ascending and unique.
    pub open_ports: Vec<u16>,
    pub started_at: String,
    pub elapsed_ms: u64,
}
