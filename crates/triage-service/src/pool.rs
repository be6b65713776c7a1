//! Worker pool for background pipelines
//!
//! Bounded admission with backpressure:
//! - At most `max_pending` pipelines admitted (running + waiting)
//! - At most `max_concurrent` running at once
//! - Every task owns a child cancellation token of the pool's root token
//!
//! Submissions beyond capacity are rejected immediately, never queued.

use parking_lot::Mutex;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use triage_core::{AnalysisId, DispatchConfig, TriageError};

/// Pool statistics
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PoolStats {
    /// Submissions accepted
    pub admitted: usize,
    /// Submissions refused at capacity
    pub rejected: usize,
    /// Pipelines currently running
    pub running: usize,
    /// Pipelines that ran to the end
    pub completed: usize,
    /// Pipelines dropped by cancellation before or while running
    pub cancelled: usize,
}

/// Bounded pool of background pipeline tasks
#[derive(Debug)]
pub struct WorkerPool {
    capacity: usize,
    admission: Arc<Semaphore>,
    workers: Arc<Semaphore>,
    root: CancellationToken,
    tracker: TaskTracker,
    stats: Arc<Mutex<PoolStats>>,
}

impl WorkerPool {
    /// Create pool with the configured limits
    ///
    /// `max_concurrent` is clamped to at least one and to `max_pending`.
    #[must_use]
    pub fn new(config: DispatchConfig) -> Self {
        let capacity = config.max_pending.max(1);
        let concurrent = config.max_concurrent.clamp(1, capacity);
        Self {
            capacity,
            admission: Arc::new(Semaphore::new(capacity)),
            workers: Arc::new(Semaphore::new(concurrent)),
            root: CancellationToken::new(),
            tracker: TaskTracker::new(),
            stats: Arc::new(Mutex::new(PoolStats::default())),
        }
    }

    /// Pipelines admitted in total
    #[inline]
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Pipelines admitted and not yet finished
    #[must_use]
    pub fn in_flight(&self) -> usize {
        self.capacity - self.admission.available_permits()
    }

    /// Snapshot of the counters
    #[must_use]
    pub fn stats(&self) -> PoolStats {
        *self.stats.lock()
    }

    /// Whether shutdown has begun
    #[must_use]
    pub fn is_shutting_down(&self) -> bool {
        self.root.is_cancelled()
    }

    /// Admit `job` for background execution
    ///
    /// The job receives its own cancellation token and starts once a worker
    /// slot frees up. Returns before the job starts.
    ///
    /// # Errors
    /// `TriageError::AtCapacity` when the pool is full or shutting down.
    pub fn try_spawn<F, Fut>(&self, id: &AnalysisId, job: F) -> Result<(), TriageError>
    where
        F: FnOnce(CancellationToken) -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let admitted = if self.root.is_cancelled() {
            None
        } else {
            Arc::clone(&self.admission).try_acquire_owned().ok()
        };
        let Some(admit) = admitted else {
            self.stats.lock().rejected += 1;
            tracing::warn!("Rejected {}: {} pipelines already admitted", id, self.capacity);
            return Err(TriageError::AtCapacity {
                capacity: self.capacity,
            });
        };
        self.stats.lock().admitted += 1;

        let token = self.root.child_token();
        let workers = Arc::clone(&self.workers);
        let stats = Arc::clone(&self.stats);
        let id = id.clone();

        self.tracker.spawn(async move {
            let _admit = admit;
            let worker = tokio::select! {
                biased;
                () = token.cancelled() => None,
                permit = workers.acquire_owned() => permit.ok(),
            };
            let Some(_worker) = worker else {
                stats.lock().cancelled += 1;
                tracing::info!("{} cancelled before starting", id);
                return;
            };

            stats.lock().running += 1;
            tracing::debug!("{} started", id);
            let cancelled = token.clone();
            job(token).await;

            let mut stats = stats.lock();
            stats.running -= 1;
            if cancelled.is_cancelled() {
                stats.cancelled += 1;
            } else {
                stats.completed += 1;
            }
        });
        Ok(())
    }

    /// Wait up to `timeout` for admitted tasks to finish on their own
    ///
    /// Returns whether the pool emptied in time.
    pub async fn drain(&self, timeout: Duration) -> bool {
        self.tracker.close();
        let drained = tokio::time::timeout(timeout, self.tracker.wait()).await.is_ok();
        self.tracker.reopen();
        drained
    }

    /// Cancel every task and wait up to `grace` for them to wind down
    ///
    /// Returns whether all tasks finished in time.
    pub async fn shutdown(&self, grace: Duration) -> bool {
        tracing::info!("Shutting down worker pool ({} in flight)", self.in_flight());
        self.root.cancel();
        self.tracker.close();
        let finished = tokio::time::timeout(grace, self.tracker.wait()).await.is_ok();
        if !finished {
            tracing::warn!("Worker pool did not drain within {:?}", grace);
        }
        finished
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn limits_are_clamped() {
        let pool = WorkerPool::new(DispatchConfig {
            max_concurrent: 8,
            max_pending: 3,
        });
        assert_eq!(pool.capacity(), 3);
        assert_eq!(pool.workers.available_permits(), 3);

        let pool = WorkerPool::new(DispatchConfig {
            max_concurrent: 0,
            max_pending: 0,
        });
        assert_eq!(pool.capacity(), 1);
        assert_eq!(pool.workers.available_permits(), 1);
    }

    #[tokio::test]
    async fn rejected_after_shutdown() {
        let pool = WorkerPool::new(DispatchConfig::default());
        assert!(pool.shutdown(Duration::from_secs(1)).await);

        let result = pool.try_spawn(&AnalysisId::new("late"), |_| async {});
        assert!(matches!(result, Err(TriageError::AtCapacity { .. })));
        assert_eq!(pool.stats().rejected, 1);
    }
}
