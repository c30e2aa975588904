// SPDX-FileCopyrightText: 2026 Herald Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Queue workers.
//!
//! A [`Worker`] runs `concurrency` polling loops per configured queue. Each
//! loop claims a job, hands it to [`DispatchEngine::process`], then completes
//! or fails the job. Cancellation stops new claims; jobs already claimed are
//! given `shutdown_grace_secs` to finish.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use herald_config::WorkerConfig;
use herald_core::{HeraldError, Job, JobQueue, JobStatus};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::engine::DispatchEngine;

/// Counters shared by every loop of a worker.
#[derive(Debug, Default)]
pub struct WorkerStats {
    completed: AtomicU64,
    retried: AtomicU64,
    failed: AtomicU64,
    reclaimed: AtomicU64,
}

/// Point-in-time copy of [`WorkerStats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WorkerSnapshot {
    pub completed: u64,
    pub retried: u64,
    pub failed: u64,
    pub reclaimed: u64,
}

impl WorkerStats {
    pub fn snapshot(&self) -> WorkerSnapshot {
        WorkerSnapshot {
            completed: self.completed.load(Ordering::Relaxed),
            retried: self.retried.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            reclaimed: self.reclaimed.load(Ordering::Relaxed),
        }
    }
}

/// Pulls jobs from the engine's queue and processes them.
pub struct Worker {
    engine: DispatchEngine,
    queue: Arc<dyn JobQueue>,
    config: WorkerConfig,
    stats: Arc<WorkerStats>,
}

impl Worker {
    pub fn new(engine: DispatchEngine, config: WorkerConfig) -> Self {
        let queue = Arc::clone(engine.queue_adapter().backend());
        Self {
            engine,
            queue,
            config,
            stats: Arc::new(WorkerStats::default()),
        }
    }

    pub fn stats(&self) -> Arc<WorkerStats> {
        Arc::clone(&self.stats)
    }

    /// Run until `cancel` fires, then drain.
    pub async fn run(&self, cancel: CancellationToken) -> Result<WorkerSnapshot, HeraldError> {
        let reclaimed = self.queue.reclaim_expired().await?;
        if reclaimed > 0 {
            info!(count = reclaimed, "reclaimed jobs with expired locks");
            self.stats.reclaimed.fetch_add(reclaimed, Ordering::Relaxed);
        }

        let poll = Duration::from_millis(self.config.poll_interval_ms.max(1));
        let mut tasks = JoinSet::new();

        for queue_name in &self.config.queues {
            for slot in 0..self.config.concurrency.max(1) {
                let job_loop = JobLoop {
                    engine: self.engine.clone(),
                    queue: Arc::clone(&self.queue),
                    queue_name: queue_name.clone(),
                    slot,
                    poll,
                    stats: Arc::clone(&self.stats),
                };
                tasks.spawn(job_loop.run(cancel.clone()));
            }
        }

        tasks.spawn(reclaim_loop(
            Arc::clone(&self.queue),
            reclaim_interval(self.config.lock_timeout_secs),
            Arc::clone(&self.stats),
            cancel.clone(),
        ));

        info!(
            queues = ?self.config.queues,
            concurrency = self.config.concurrency,
            "worker started"
        );

        cancel.cancelled().await;
        info!("worker stopping, draining in-flight jobs");

        let grace = Duration::from_secs(self.config.shutdown_grace_secs);
        let drained = tokio::time::timeout(grace, async {
            while let Some(result) = tasks.join_next().await {
                if let Err(e) = result {
                    error!(error = %e, "worker loop panicked");
                }
            }
        })
        .await;

        if drained.is_err() {
            warn!(
                remaining = tasks.len(),
                "grace period elapsed, aborting unfinished jobs"
            );
            tasks.abort_all();
        }

        let snapshot = self.stats.snapshot();
        info!(
            completed = snapshot.completed,
            retried = snapshot.retried,
            failed = snapshot.failed,
            "worker stopped"
        );
        Ok(snapshot)
    }
}

fn reclaim_interval(lock_timeout_secs: u64) -> Duration {
    Duration::from_secs((lock_timeout_secs / 2).clamp(1, 60))
}

struct JobLoop {
    engine: DispatchEngine,
    queue: Arc<dyn JobQueue>,
    queue_name: String,
    slot: usize,
    poll: Duration,
    stats: Arc<WorkerStats>,
}

impl JobLoop {
    async fn run(self, cancel: CancellationToken) {
        debug!(queue = %self.queue_name, slot = self.slot, "job loop started");
        while !cancel.is_cancelled() {
            match self.queue.dequeue(&self.queue_name).await {
                Ok(Some(job)) => self.handle(job).await,
                Ok(None) => {
                    if sleep_or_cancel(self.poll, &cancel).await {
                        break;
                    }
                }
                Err(e) => {
                    warn!(queue = %self.queue_name, error = %e, "dequeue failed");
                    if sleep_or_cancel(self.poll, &cancel).await {
                        break;
                    }
                }
            }
        }
        debug!(queue = %self.queue_name, slot = self.slot, "job loop stopped");
    }

    async fn handle(&self, job: Job) {
        match self.engine.process(&job).await {
            Ok(()) => match self.queue.complete(job.id).await {
                Ok(()) => {
                    self.stats.completed.fetch_add(1, Ordering::Relaxed);
                }
                Err(e) => warn!(job_id = %job.id, error = %e, "failed to complete job"),
            },
            Err(cause) => match self.queue.fail(job.id, &cause.to_string()).await {
                Ok(JobStatus::Failed) => {
                    self.stats.failed.fetch_add(1, Ordering::Relaxed);
                    warn!(
                        job_id = %job.id,
                        attempts = job.attempts,
                        error = %cause,
                        "job failed permanently"
                    );
                }
                Ok(_) => {
                    self.stats.retried.fetch_add(1, Ordering::Relaxed);
                    debug!(job_id = %job.id, attempts = job.attempts, error = %cause, "job will be retried");
                }
                Err(e) => warn!(job_id = %job.id, error = %e, "failed to record job failure"),
            },
        }
    }
}

async fn reclaim_loop(
    queue: Arc<dyn JobQueue>,
    every: Duration,
    stats: Arc<WorkerStats>,
    cancel: CancellationToken,
) {
    loop {
        if sleep_or_cancel(every, &cancel).await {
            break;
        }
        match queue.reclaim_expired().await {
            Ok(0) => {}
            Ok(n) => {
                info!(count = n, "reclaimed jobs with expired locks");
                stats.reclaimed.fetch_add(n, Ordering::Relaxed);
            }
            Err(e) => warn!(error = %e, "reclaim failed"),
        }
    }
}

/// Sleep for `duration`. Returns true if cancelled first.
async fn sleep_or_cancel(duration: Duration, cancel: &CancellationToken) -> bool {
    tokio::select! {
        _ = cancel.cancelled() => true,
        _ = tokio::time::sleep(duration) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reclaim_interval_is_bounded() {
        assert_eq!(reclaim_interval(0), Duration::from_secs(1));
        assert_eq!(reclaim_interval(30), Duration::from_secs(15));
        assert_eq!(reclaim_interval(3_600), Duration::from_secs(60));
    }

    #[tokio::test]
    async fn sleep_or_cancel_reports_cancellation() {
        let cancel = CancellationToken::new();
        assert!(!sleep_or_cancel(Duration::from_millis(1), &cancel).await);
        cancel.cancel();
        assert!(sleep_or_cancel(Duration::from_secs(60), &cancel).await);
    }
}
