//! Admission queue in front of the generation service.
//!
//! Bounds the number of in-flight calls (`max_concurrent`) and spaces call
//! starts by at least `min_gap`, measured from the previous start. Both
//! limits are global: every adapter and every user shares one queue,
//! because the service quota is account-wide.
//!
//! Capacity is a fair `tokio::sync::Semaphore`, so waiting tasks are
//! admitted in submission order. Start times are reserved under a short
//! lock, which keeps the spacing guarantee even when more than one call may
//! run at a time.

use std::future::Future;
use std::sync::Mutex;
use std::sync::PoisonError;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use tokio::sync::Semaphore;
use tokio::time::Instant;
use tracing::debug;

use crate::telemetry;
use crate::{FootprintError, Result};

/// Configuration for the admission queue.
#[derive(Debug, Clone)]
pub struct QueueConfig {
    /// Calls allowed in flight at once. Default: 1.
    pub max_concurrent: usize,
    /// Minimum spacing between consecutive call starts. Default: 600ms.
    pub min_gap: Duration,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            max_concurrent: 1,
            min_gap: Duration::from_millis(600),
        }
    }
}

impl QueueConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the concurrency ceiling (values below 1 are treated as 1).
    pub fn max_concurrent(mut self, n: usize) -> Self {
        self.max_concurrent = n;
        self
    }

    /// Set the minimum gap between call starts.
    pub fn min_gap(mut self, gap: Duration) -> Self {
        self.min_gap = gap;
        self
    }
}

/// FIFO admission control for outbound calls.
pub struct AdmissionQueue {
    permits: Semaphore,
    max_concurrent: usize,
    min_gap: Duration,
    last_start: Mutex<Option<Instant>>,
    waiting: AtomicUsize,
}

impl AdmissionQueue {
    pub fn new(config: &QueueConfig) -> Self {
        let max_concurrent = config.max_concurrent.max(1);
        Self {
            permits: Semaphore::new(max_concurrent),
            max_concurrent,
            min_gap: config.min_gap,
            last_start: Mutex::new(None),
            waiting: AtomicUsize::new(0),
        }
    }

    /// Run `task` once capacity and spacing allow, and return its result.
    ///
    /// Fails with [`FootprintError::QueueClosed`] if the queue is closed
    /// before the task is admitted. A task that has started always runs to
    /// completion.
    pub async fn submit<F, Fut, T>(&self, task: F) -> Result<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let queued_at = Instant::now();
        let permit = {
            let _waiting = WaitingGuard::enter(&self.waiting);
            debug!(
                active = self.active(),
                queued = self.queued(),
                "task added to admission queue"
            );
            self.permits
                .acquire()
                .await
                .map_err(|_| FootprintError::QueueClosed)?
        };

        let start = self.reserve_start();
        tokio::time::sleep_until(start).await;
        metrics::histogram!(telemetry::QUEUE_WAIT_SECONDS)
            .record(queued_at.elapsed().as_secs_f64());

        let result = task().await;
        drop(permit);
        result
    }

    /// Reserve the next start slot: `max(now, last_start + min_gap)`.
    fn reserve_start(&self) -> Instant {
        let mut last = self
            .last_start
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let now = Instant::now();
        let start = match *last {
            Some(prev) => now.max(prev + self.min_gap),
            None => now,
        };
        *last = Some(start);
        start
    }

    /// Reject every waiting and future submission. Running tasks finish.
    pub fn close(&self) {
        self.permits.close();
    }

    pub fn is_closed(&self) -> bool {
        self.permits.is_closed()
    }

    /// Tasks currently holding a slot (including those waiting out the gap).
    pub fn active(&self) -> usize {
        self.max_concurrent
            .saturating_sub(self.permits.available_permits())
    }

    /// Tasks waiting for a slot.
    pub fn queued(&self) -> usize {
        self.waiting.load(Ordering::Relaxed)
    }

    pub fn max_concurrent(&self) -> usize {
        self.max_concurrent
    }

    pub fn min_gap(&self) -> Duration {
        self.min_gap
    }
}

/// Counts a submission as queued until it is admitted or dropped.
struct WaitingGuard<'a>(&'a AtomicUsize);

impl<'a> WaitingGuard<'a> {
    fn enter(counter: &'a AtomicUsize) -> Self {
        counter.fetch_add(1, Ordering::Relaxed);
        Self(counter)
    }
}

impl Drop for WaitingGuard<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::Relaxed);
    }
}
