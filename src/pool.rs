use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;

use tokio::net::TcpStream;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinSet;
use tokio::time::{self, Instant};
use tracing::{debug, trace, warn};

use crate::aggregator::ResultAggregator;
use crate::config::ScanConfig;
use crate::dispatcher::Outstanding;
use crate::error::ScanError;
use crate::types::Job;

/// Callback invoked by a worker as soon as it finds an open port.
pub type OpenPortListener = Arc<dyn Fn(u16) + Send + Sync>;

/// Shortest sleep worth handing to the timer; tokio rounds anything
/// smaller up to a full tick.
const MIN_SLEEP: Duration = Duration::from_millis(1);

/// Per-worker pacing applied after every job, whatever its outcome.
///
/// With `W` workers the aggregate attempt rate is roughly
/// `W / (packet_delay + inter_job_delay)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimit {
    packet_delay: Duration,
    inter_job_delay: Duration,
}

impl RateLimit {
    pub fn from_config(config: &ScanConfig) -> Self {
        Self {
            packet_delay: config.packet_delay(),
            inter_job_delay: config.inter_job_delay(),
        }
    }

    pub fn per_job(&self) -> Duration {
        self.packet_delay + self.inter_job_delay
    }

    /// Fresh pacing state for one worker.
    pub fn pacer(&self) -> Pacer {
        Pacer {
            per_job: self.per_job(),
            owed: Duration::ZERO,
            surplus: Duration::ZERO,
        }
    }
}

/// Accumulates the delay owed after each job and sleeps it off in chunks
/// of at least [`MIN_SLEEP`]. Oversleep is credited against later jobs, so
/// the total time slept tracks `jobs * per_job` to within one tick.
#[derive(Debug)]
pub struct Pacer {
    per_job: Duration,
    owed: Duration,
    surplus: Duration,
}

impl Pacer {
    pub async fn pause(&mut self) {
        if self.surplus >= self.per_job {
            self.surplus -= self.per_job;
            return;
        }
        self.owed += self.per_job - self.surplus;
        self.surplus = Duration::ZERO;
        if self.owed < MIN_SLEEP {
            return;
        }

        let start = Instant::now();
        time::sleep_until(start + self.owed).await;
        let slept = start.elapsed();
        if slept >= self.owed {
            self.surplus = slept - self.owed;
            self.owed = Duration::ZERO;
        } else {
            self.owed -= slept;
        }
    }

    /// Delay owed but not yet slept.
    pub fn owed(&self) -> Duration {
        self.owed
    }
}

/// Try a TCP connect to `addr`; true if it completes within `timeout`.
///
/// The stream is closed immediately, nothing is sent. Refusals, timeouts
/// and network errors all count as not open.
pub async fn probe(addr: SocketAddr, timeout: Duration) -> bool {
    match time::timeout(timeout, TcpStream::connect(addr)).await {
        Ok(Ok(stream)) => {
            drop(stream);
            true
        }
        _ => false,
    }
}

struct WorkerShared {
    target: IpAddr,
    connect_timeout: Duration,
    limit: RateLimit,
    queue: Mutex<mpsc::Receiver<Job>>,
    aggregator: ResultAggregator,
    outstanding: Arc<Outstanding>,
    on_open: Option<OpenPortListener>,
}

/// Fixed set of workers draining a bounded job queue.
pub struct ScanWorkerPool {
    workers: JoinSet<usize>,
}

impl ScanWorkerPool {
    /// Spawn `config.worker_count()` workers and return the queue's sending half.
    ///
    /// The queue holds at most `worker_count` jobs.
    pub fn start(
        target: IpAddr,
        config: &ScanConfig,
        aggregator: ResultAggregator,
        outstanding: Arc<Outstanding>,
        on_open: Option<OpenPortListener>,
    ) -> (Self, mpsc::Sender<Job>) {
        let (tx, rx) = mpsc::channel(config.worker_count());
        let shared = Arc::new(WorkerShared {
            target,
            connect_timeout: config.connect_timeout(),
            limit: RateLimit::from_config(config),
            queue: Mutex::new(rx),
            aggregator,
            outstanding,
            on_open,
        });

        let mut workers = JoinSet::new();
        for id in 0..config.worker_count() {
            workers.spawn(run_worker(id, shared.clone()));
        }
        debug!(workers = workers.len(), %target, "worker pool started");

        (Self { workers }, tx)
    }

    pub fn size(&self) -> usize {
        self.workers.len()
    }

    /// Join every worker. The queue must already be closed.
    ///
    /// Returns the total number of jobs processed.
    pub async fn shutdown(mut self) -> Result<usize, ScanError> {
        let mut processed = 0usize;
        let mut failure = None;
        while let Some(res) = self.workers.join_next().await {
            match res {
                Ok(n) => processed += n,
                Err(e) => {
                    warn!(error = %e, "scan worker failed");
                    failure.get_or_insert(e);
                }
            }
        }
        match failure {
            Some(e) => Err(ScanError::Worker(e)),
            None => Ok(processed),
        }
    }
}

async fn run_worker(id: usize, shared: Arc<WorkerShared>) -> usize {
    let mut processed = 0usize;
    let mut pacer = shared.limit.pacer();
    loop {
        let next = {
            let mut queue = shared.queue.lock().await;
            queue.recv().await
        };
        let Some(job) = next else { break };
        let _done = shared.outstanding.completion();

        let addr = SocketAddr::new(shared.target, job.port);
        let open = probe(addr, shared.connect_timeout).await;
        trace!(worker = id, host = %job.host, port = job.port, open, "probe finished");
        if open {
            shared.aggregator.record_open(job.port).await;
            if let Some(listener) = &shared.on_open {
                listener(job.port);
            }
        }

        pacer.pause().await;
        processed += 1;
    }
    debug!(worker = id, processed, "worker exiting");
    processed
}
