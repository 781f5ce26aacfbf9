use std::fmt;
use std::net::IpAddr;
use std::sync::Arc;

use ::time::{format_description::well_known, OffsetDateTime};
use tokio::net::lookup_host;
use tokio::time::Instant;
use tracing::{debug, info};

use crate::aggregator::ResultAggregator;
use crate::config::ScanConfig;
use crate::dispatcher::{JobDispatcher, Outstanding};
use crate::error::ScanError;
use crate::pool::{OpenPortListener, ScanWorkerPool};
use crate::ports::parse_ports;
use crate::types::ScanReport;

/// Lifecycle of a [`ScanController`]. Only ever moves forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanPhase {
    Idle,
    Dispatching,
    Draining,
    Completed,
}

impl fmt::Display for ScanPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ScanPhase::Idle => "idle",
            ScanPhase::Dispatching => "dispatching",
            ScanPhase::Draining => "draining",
            ScanPhase::Completed => "completed",
        };
        f.write_str(s)
    }
}

/// Runs exactly one scan of `host` over a list of ports.
///
/// - Starts the worker pool before the first job is published.
/// - Publishes one job per port through a queue bounded by the worker count.
/// - Waits for every job to finish, closes the queue and joins all workers.
/// - Returns the open ports in ascending order.
pub struct ScanController {
    host: String,
    ports: Vec<u16>,
    config: ScanConfig,
    on_open: Option<OpenPortListener>,
    phase: ScanPhase,
}

impl ScanController {
    pub fn new(host: impl Into<String>, ports: Vec<u16>, config: ScanConfig) -> Self {
        Self {
            host: host.into(),
            ports,
            config,
            on_open: None,
            phase: ScanPhase::Idle,
        }
    }

    /// Build a controller from a textual port specification.
    pub fn from_spec(
        host: impl Into<String>,
        spec: &str,
        scan_all: bool,
        config: ScanConfig,
    ) -> Result<Self, ScanError> {
        let ports = parse_ports(spec, scan_all)?;
        Ok(Self::new(host, ports, config))
    }

    /// Report each open port as soon as a worker finds it.
    pub fn on_open<F>(mut self, listener: F) -> Self
    where
        F: Fn(u16) + Send + Sync + 'static,
    {
        self.on_open = Some(Arc::new(listener));
        self
    }

    pub fn ports(&self) -> &[u16] {
        &self.ports
    }

    pub fn config(&self) -> &ScanConfig {
        &self.config
    }

    fn enter(&mut self, next: ScanPhase) {
        debug!(from = %self.phase, to = %next, "scan phase");
        self.phase = next;
    }

    pub async fn run(mut self) -> Result<ScanReport, ScanError> {
        let started_at = now_rfc3339();
        let start = Instant::now();
        let target = resolve(&self.host).await?;
        info!(
            host = %self.host,
            %target,
            ports = self.ports.len(),
            workers = self.config.worker_count(),
            "starting scan"
        );

        let aggregator = ResultAggregator::new();
        let outstanding = Arc::new(Outstanding::new());

        self.enter(ScanPhase::Dispatching);
        let (pool, queue) = ScanWorkerPool::start(
            target,
            &self.config,
            aggregator.clone(),
            outstanding.clone(),
            self.on_open.take(),
        );
        let dispatcher = JobDispatcher::new(queue, outstanding.clone());
        let published = dispatcher.dispatch(&self.host, &self.ports).await;
        let dispatched = match published {
            Ok(n) => n,
            Err(e) => {
                dispatcher.close();
                pool.shutdown().await?;
                return Err(e);
            }
        };

        self.enter(ScanPhase::Draining);
        outstanding.wait_idle().await;
        dispatcher.close();
        let completed = pool.shutdown().await?;
        if completed != dispatched {
            return Err(ScanError::Incomplete {
                dispatched,
                completed,
            });
        }

        self.enter(ScanPhase::Completed);
        let open_ports = aggregator.snapshot().await;
        let elapsed = start.elapsed();
        info!(
            host = %self.host,
            scanned = completed,
            open = open_ports.len(),
            elapsed_ms = elapsed.as_millis() as u64,
            "scan finished"
        );

        Ok(ScanReport {
            host: self.host,
            ports_scanned: completed as u64,
            open_ports,
            started_at,
            elapsed_ms: elapsed.as_millis() as u64,
        })
    }
}

/// Resolve `host` once, preferring IPv4.
async fn resolve(host: &str) -> Result<IpAddr, ScanError> {
    if let Ok(ip) = host.parse::<IpAddr>() {
        return Ok(ip);
    }
    let addrs: Vec<IpAddr> = lookup_host((host, 0))
        .await
        .map_err(|source| ScanError::Resolve {
            host: host.to_string(),
            source,
        })?
        .map(|sa| sa.ip())
        .collect();
    addrs
        .iter()
        .find(|ip| ip.is_ipv4())
        .or_else(|| addrs.first())
        .copied()
        .ok_or_else(|| ScanError::NoAddress(host.to_string()))
}

fn now_rfc3339() -> String {
    let now = OffsetDateTime::now_utc();
    now.format(&well_known::Rfc3339)
        .unwrap_or_else(|_| String::from("1970-01-01T00:00:00Z"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_controller_is_idle() {
        let c = ScanController::new("127.0.0.1", vec![22, 80], ScanConfig::default());
        assert_eq!(c.phase, ScanPhase::Idle);
        assert_eq!(c.ports(), &[22, 80]);
    }

    #[test]
    fn from_spec_honors_port_selection() {
        let c = ScanController::from_spec("127.0.0.1", "22,80,1000-1002", false, ScanConfig::default())
            .unwrap();
        assert_eq!(c.ports(), &[22, 80, 1000, 1001, 1002]);
    }

    #[test]
    fn from_spec_rejects_bad_spec() {
        let res = ScanController::from_spec("127.0.0.1", "abc", false, ScanConfig::default());
        assert!(matches!(res, Err(ScanError::Parse(_))));
    }

    #[tokio::test]
    async fn resolve_literal_and_localhost() {
        assert_eq!(
            resolve("127.0.0.1").await.unwrap(),
            "127.0.0.1".parse::<IpAddr>().unwrap()
        );
        assert!(resolve("localhost").await.unwrap().is_loopback());
    }

    #[test]
    fn timestamp_is_rfc3339() {
        let ts = now_rfc3339();
        assert!(OffsetDateTime::parse(&ts, &well_known::Rfc3339).is_ok());
    }
}
