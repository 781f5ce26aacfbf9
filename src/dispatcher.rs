use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use tokio::sync::{mpsc, Notify};
use tracing::trace;

use crate::error::ScanError;
use crate::types::Job;

/// Count of jobs published but not yet fully processed.
#[derive(Debug, Default)]
pub struct Outstanding {
    count: AtomicUsize,
    idle: Notify,
}

impl Outstanding {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn begin(&self) {
        self.count.fetch_add(1, Ordering::AcqRel);
    }

    pub fn finish(&self) {
        if self.count.fetch_sub(1, Ordering::AcqRel) == 1 {
            self.idle.notify_waiters();
        }
    }

    /// Guard that marks one job finished when dropped, even if the worker unwinds.
    pub fn completion(&self) -> CompletionGuard<'_> {
        CompletionGuard { outstanding: self }
    }

    pub fn pending(&self) -> usize {
        self.count.load(Ordering::Acquire)
    }

    /// Resolves once every begun job has finished.
    pub async fn wait_idle(&self) {
        loop {
            let notified = self.idle.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();
            if self.pending() == 0 {
                return;
            }
            notified.await;
        }
    }
}

pub struct CompletionGuard<'a> {
    outstanding: &'a Outstanding,
}

impl Drop for CompletionGuard<'_> {
    fn drop(&mut self) {
        self.outstanding.finish();
    }
}

/// Sole producer of the bounded job queue. Dropping it closes the queue.
pub struct JobDispatcher {
    queue: mpsc::Sender<Job>,
    outstanding: Arc<Outstanding>,
}

impl JobDispatcher {
    pub fn new(queue: mpsc::Sender<Job>, outstanding: Arc<Outstanding>) -> Self {
        Self { queue, outstanding }
    }

    /// Publish one job per port, in order. Blocks while the queue is full.
    ///
    /// Returns the number of jobs published.
    pub async fn dispatch(&self, host: &str, ports: &[u16]) -> Result<usize, ScanError> {
        let host: Arc<str> = Arc::from(host);
        let mut sent = 0usize;
        for &port in ports {
            self.outstanding.begin();
            if self.queue.send(Job::new(host.clone(), port)).await.is_err() {
                self.outstanding.finish();
                return Err(ScanError::QueueClosed);
            }
            sent += 1;
            trace!(port, sent, "job queued");
        }
        Ok(sent)
    }

    /// Close the queue; workers exit once it is drained.
    pub fn close(self) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn dispatch_blocks_when_queue_is_full() {
        let (tx, mut rx) = mpsc::channel(2);
        let outstanding = Arc::new(Outstanding::new());
        let dispatcher = JobDispatcher::new(tx, outstanding.clone());

        let handle = tokio::spawn(async move {
            dispatcher.dispatch("localhost", &[1, 2, 3, 4, 5]).await
        });
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }

        // Two queued, one counted and waiting for room.
        assert!(!handle.is_finished());
        assert_eq!(outstanding.pending(), 3);

        let mut seen = Vec::new();
        for _ in 0..5 {
            let job = rx.recv().await.unwrap();
            assert_eq!(&*job.host, "localhost");
            seen.push(job.port);
        }
        assert_eq!(seen, vec![1, 2, 3, 4, 5]);
        assert_eq!(handle.await.unwrap().unwrap(), 5);

        // Dispatcher was dropped with the task: queue is closed.
        assert!(rx.recv().await.is_none());
        assert_eq!(outstanding.pending(), 5);
    }

    #[tokio::test]
    async fn dispatch_to_closed_queue_fails() {
        let (tx, rx) = mpsc::channel(1);
        drop(rx);
        let outstanding = Arc::new(Outstanding::new());
        let dispatcher = JobDispatcher::new(tx, outstanding.clone());

        let res = dispatcher.dispatch("localhost", &[80]).await;
        assert!(matches!(res, Err(ScanError::QueueClosed)));
        assert_eq!(outstanding.pending(), 0);
    }

    #[tokio::test]
    async fn wait_idle_returns_after_last_completion() {
        let outstanding = Arc::new(Outstanding::new());
        for _ in 0..3 {
            outstanding.begin();
        }

        let worker = outstanding.clone();
        tokio::spawn(async move {
            for _ in 0..3 {
                tokio::time::sleep(Duration::from_millis(5)).await;
                let _done = worker.completion();
            }
        });

        outstanding.wait_idle().await;
        assert_eq!(outstanding.pending(), 0);
    }

    #[tokio::test]
    async fn wait_idle_with_nothing_pending_is_immediate() {
        Outstanding::new().wait_idle().await;
    }
}
