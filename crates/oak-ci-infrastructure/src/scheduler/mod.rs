//! Cooperative job scheduler (spec.md §4.10): three fixed periodicities
//! tick independently and enqueue idempotent, `(entity_id, job_kind)`-keyed
//! jobs onto one bounded queue drained by a small worker pool.
//!
//! The tiers' actual job bodies (classify a batch, extract an observation,
//! run stale recovery, ...) belong to the use cases built on top of this;
//! this module only owns timing, dedup, backpressure, and cancellation.

use std::collections::{HashSet, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures::future::BoxFuture;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Which periodicity tier a job's owning tick belongs to (spec.md §4.10).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Tier {
    /// Flush activity buffer, recompute touched stat caches. 5-15s.
    Fast,
    /// Classify batches, extract/embed observations, embed plans. 30-120s.
    Medium,
    /// Stale-recovery sweep, session title/summary generation. ~5min.
    Infrequent,
}

impl Tier {
    fn interval(self) -> Duration {
        match self {
            Self::Fast => Duration::from_secs(10),
            Self::Medium => Duration::from_secs(60),
            Self::Infrequent => Duration::from_secs(300),
        }
    }
}

/// Identifies one idempotent unit of work; re-submitting the same key while
/// it is queued or running is a no-op.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct JobKey {
    pub entity_id: String,
    pub job_kind: &'static str,
}

struct Job {
    key: JobKey,
    run: Box<dyn FnOnce() -> BoxFuture<'static, oak_ci_domain::error::Result<()>> + Send>,
}

/// Bounded job queue plus the tier tickers that feed it (spec.md §5
/// "background queue ≤ 10k jobs").
pub struct Scheduler {
    queue: Mutex<VecDeque<Job>>,
    queued_keys: Mutex<HashSet<JobKey>>,
    capacity: usize,
    cancel: CancellationToken,
    dropped: AtomicU64,
}

impl Scheduler {
    #[must_use]
    pub fn new(capacity: usize) -> Arc<Self> {
        Arc::new(Self {
            queue: Mutex::new(VecDeque::with_capacity(capacity.min(1024))),
            queued_keys: Mutex::new(HashSet::new()),
            capacity,
            cancel: CancellationToken::new(),
            dropped: AtomicU64::new(0),
        })
    }

    /// Signal every tier ticker and worker to stop after finishing their
    /// current unit of work (spec.md §4.10 "Cancellation").
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Number of jobs dropped so far due to queue overflow.
    #[must_use]
    pub fn dropped_count(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    /// Enqueue one job, skipping it if an identically-keyed job is already
    /// queued or running. Drops the oldest queued job on overflow.
    pub async fn submit<F>(&self, key: JobKey, run: F)
    where
        F: FnOnce() -> BoxFuture<'static, oak_ci_domain::error::Result<()>> + Send + 'static,
    {
        let mut queued_keys = self.queued_keys.lock().await;
        if !queued_keys.insert(key.clone()) {
            return;
        }
        drop(queued_keys);

        let mut queue = self.queue.lock().await;
        if queue.len() >= self.capacity {
            if let Some(evicted) = queue.pop_front() {
                self.queued_keys.lock().await.remove(&evicted.key);
                self.dropped.fetch_add(1, Ordering::Relaxed);
            }
        }
        queue.push_back(Job { key, run: Box::new(run) });
    }

    /// Start `concurrency` workers draining the queue until cancelled.
    pub fn spawn_workers(self: &Arc<Self>, concurrency: usize) -> Vec<JoinHandle<()>> {
        (0..concurrency)
            .map(|_| {
                let scheduler = Arc::clone(self);
                tokio::spawn(async move { scheduler.worker_loop().await })
            })
            .collect()
    }

    async fn worker_loop(self: Arc<Self>) {
        loop {
            if self.cancel.is_cancelled() {
                return;
            }
            let job = self.queue.lock().await.pop_front();
            let Some(job) = job else {
                tokio::select! {
                    () = self.cancel.cancelled() => return,
                    () = tokio::time::sleep(Duration::from_millis(200)) => {}
                }
                continue;
            };
            let key = job.key.clone();
            if let Err(e) = (job.run)().await {
                oak_ci_domain::warn!("scheduler", "job failed", e);
            }
            self.queued_keys.lock().await.remove(&key);
        }
    }

    /// Start a tier ticker that calls `tick` on every interval until
    /// cancelled. `tick` is responsible for calling [`Scheduler::submit`].
    pub fn spawn_tier<F, Fut>(self: &Arc<Self>, tier: Tier, mut tick: F) -> JoinHandle<()>
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: std::future::Future<Output = ()> + Send + 'static,
    {
        let cancel = self.cancel.clone();
        let mut ticker = tokio::time::interval(tier.interval());
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    () = cancel.cancelled() => return,
                    _ = ticker.tick() => tick().await,
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering as AtomicOrdering};

    #[tokio::test]
    async fn duplicate_key_is_deduplicated() {
        let scheduler = Scheduler::new(16);
        let runs = Arc::new(AtomicUsize::new(0));

        for _ in 0..3 {
            let runs = Arc::clone(&runs);
            scheduler
                .submit(
                    JobKey { entity_id: "batch-1".into(), job_kind: "classify" },
                    move || Box::pin(async move { runs.fetch_add(1, AtomicOrdering::SeqCst); Ok(()) }),
                )
                .await;
        }

        let workers = scheduler.spawn_workers(1);
        tokio::time::sleep(Duration::from_millis(50)).await;
        scheduler.cancel();
        for worker in workers {
            let _ = worker.await;
        }
        assert_eq!(runs.load(AtomicOrdering::SeqCst), 1);
    }

    #[tokio::test]
    async fn overflow_drops_oldest() {
        let scheduler = Scheduler::new(1);
        scheduler
            .submit(JobKey { entity_id: "a".into(), job_kind: "k" }, || Box::pin(async { Ok(()) }))
            .await;
        scheduler
            .submit(JobKey { entity_id: "b".into(), job_kind: "k" }, || Box::pin(async { Ok(()) }))
            .await;
        assert_eq!(scheduler.dropped_count(), 1);
    }
}
