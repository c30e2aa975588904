// SPDX-FileCopyrightText: 2026 Herald Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! In-memory job queue mirroring the SQLite queue's claim and retry rules.

use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use herald_core::{
    AdapterType, HealthStatus, HeraldError, Job, JobId, JobQueue, JobStatus, NewJob,
    PluginAdapter, QueueCounts,
};

use crate::lock;

struct Slot {
    job: Job,
    locked_until: Option<DateTime<Utc>>,
}

#[derive(Default)]
struct Inner {
    next_id: i64,
    slots: Vec<Slot>,
}

/// A job queue held in memory.
pub struct MemoryQueue {
    inner: Mutex<Inner>,
    lock_timeout: Duration,
    fail_enqueue: AtomicBool,
}

impl Default for MemoryQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryQueue {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner::default()),
            lock_timeout: Duration::from_secs(300),
            fail_enqueue: AtomicBool::new(false),
        }
    }

    /// How long a claimed job stays locked before `reclaim_expired` frees it.
    pub fn with_lock_timeout(mut self, lock_timeout: Duration) -> Self {
        self.lock_timeout = lock_timeout;
        self
    }

    /// Make every subsequent `enqueue` fail with a queue error.
    pub fn fail_enqueue(&self, fail: bool) {
        self.fail_enqueue.store(fail, Ordering::SeqCst);
    }

    /// Snapshot of every job, in enqueue order.
    pub fn jobs(&self) -> Vec<Job> {
        lock(&self.inner).slots.iter().map(|s| s.job.clone()).collect()
    }

    /// Job by id.
    pub fn job(&self, id: JobId) -> Option<Job> {
        lock(&self.inner)
            .slots
            .iter()
            .find(|s| s.job.id == id)
            .map(|s| s.job.clone())
    }

    /// Make a rescheduled job runnable immediately.
    pub fn make_due(&self, id: JobId) {
        if let Some(slot) = lock(&self.inner).slots.iter_mut().find(|s| s.job.id == id) {
            slot.job.run_at = Utc::now();
        }
    }
}

fn not_found(id: JobId) -> HeraldError {
    HeraldError::NotFound {
        id: id.0.to_string(),
    }
}

fn chrono_delay(delay: Duration) -> chrono::Duration {
    chrono::Duration::from_std(delay).unwrap_or_else(|_| chrono::Duration::weeks(520))
}

#[async_trait]
impl PluginAdapter for MemoryQueue {
    fn name(&self) -> &str {
        "memory-queue"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Queue
    }

    async fn health_check(&self) -> Result<HealthStatus, HeraldError> {
        Ok(HealthStatus::Healthy)
    }

    async fn shutdown(&self) -> Result<(), HeraldError> {
        Ok(())
    }
}

#[async_trait]
impl JobQueue for MemoryQueue {
    async fn enqueue(&self, job: &NewJob) -> Result<JobId, HeraldError> {
        if self.fail_enqueue.load(Ordering::SeqCst) {
            return Err(HeraldError::queue("injected enqueue failure"));
        }
        let mut inner = lock(&self.inner);
        inner.next_id += 1;
        let id = JobId(inner.next_id);
        let now = Utc::now();
        inner.slots.push(Slot {
            job: Job {
                id,
                queue_name: job.queue_name.clone(),
                payload: job.payload.clone(),
                priority: job.priority,
                status: JobStatus::Pending,
                attempts: 0,
                max_attempts: job.max_attempts,
                backoff: job.backoff,
                last_error: None,
                run_at: now,
                created_at: now,
                updated_at: now,
            },
            locked_until: None,
        });
        tracing::debug!(job = id.0, queue = %job.queue_name, "memory queue enqueued job");
        Ok(id)
    }

    async fn dequeue(&self, queue_name: &str) -> Result<Option<Job>, HeraldError> {
        let now = Utc::now();
        let mut inner = lock(&self.inner);
        let next = inner
            .slots
            .iter_mut()
            .filter(|s| {
                s.job.queue_name == queue_name
                    && s.job.status == JobStatus::Pending
                    && s.job.run_at <= now
                    && s.job.attempts < s.job.max_attempts
            })
            .min_by(|a, b| {
                b.job
                    .priority
                    .cmp(&a.job.priority)
                    .then(a.job.run_at.cmp(&b.job.run_at))
                    .then(a.job.id.0.cmp(&b.job.id.0))
            });
        Ok(next.map(|slot| {
            slot.job.status = JobStatus::Processing;
            slot.job.attempts += 1;
            slot.job.updated_at = now;
            slot.locked_until = Some(now + chrono_delay(self.lock_timeout));
            tracing::debug!(
                job = slot.job.id.0,
                attempts = slot.job.attempts,
                "memory queue claimed job"
            );
            slot.job.clone()
        }))
    }

    async fn complete(&self, id: JobId) -> Result<(), HeraldError> {
        let mut inner = lock(&self.inner);
        let slot = inner
            .slots
            .iter_mut()
            .find(|s| s.job.id == id)
            .ok_or_else(|| not_found(id))?;
        slot.job.status = JobStatus::Completed;
        slot.job.updated_at = Utc::now();
        slot.locked_until = None;
        Ok(())
    }

    async fn fail(&self, id: JobId, error: &str) -> Result<JobStatus, HeraldError> {
        let now = Utc::now();
        let mut inner = lock(&self.inner);
        let slot = inner
            .slots
            .iter_mut()
            .find(|s| s.job.id == id)
            .ok_or_else(|| not_found(id))?;
        slot.job.last_error = Some(error.to_string());
        slot.job.updated_at = now;
        slot.locked_until = None;
        if slot.job.attempts >= slot.job.max_attempts {
            slot.job.status = JobStatus::Failed;
        } else {
            slot.job.status = JobStatus::Pending;
            slot.job.run_at = now + chrono_delay(slot.job.backoff.delay_for(slot.job.attempts));
        }
        Ok(slot.job.status)
    }

    async fn reclaim_expired(&self) -> Result<u64, HeraldError> {
        let now = Utc::now();
        let mut inner = lock(&self.inner);
        let mut reclaimed = 0;
        for slot in inner.slots.iter_mut() {
            if slot.job.status == JobStatus::Processing
                && slot.locked_until.is_some_and(|until| until < now)
            {
                if slot.job.attempts >= slot.job.max_attempts {
                    slot.job.status = JobStatus::Failed;
                    slot.job.last_error = Some("lock expired on final attempt".to_string());
                } else {
                    slot.job.status = JobStatus::Pending;
                }
                slot.locked_until = None;
                slot.job.updated_at = now;
                reclaimed += 1;
            }
        }
        if reclaimed > 0 {
            tracing::debug!(reclaimed, "memory queue released expired locks");
        }
        Ok(reclaimed)
    }

    async fn counts(&self, queue_name: &str) -> Result<QueueCounts, HeraldError> {
        let inner = lock(&self.inner);
        let mut counts = QueueCounts::default();
        for slot in inner.slots.iter().filter(|s| s.job.queue_name == queue_name) {
            match slot.job.status {
                JobStatus::Pending => counts.pending += 1,
                JobStatus::Processing => counts.processing += 1,
                JobStatus::Completed => counts.completed += 1,
                JobStatus::Failed => counts.failed += 1,
            }
        }
        Ok(counts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use herald_core::{BackoffPolicy, Priority};

    fn new_job(priority: Priority, max_attempts: u32) -> NewJob {
        NewJob {
            queue_name: "q".into(),
            payload: "{}".into(),
            priority,
            max_attempts,
            backoff: BackoffPolicy::Fixed { delay_ms: 60_000 },
        }
    }

    #[tokio::test]
    async fn dequeues_highest_priority_first() {
        let queue = MemoryQueue::new();
        let low = queue.enqueue(&new_job(Priority::Low, 1)).await.unwrap();
        let high = queue.enqueue(&new_job(Priority::High, 1)).await.unwrap();

        assert_eq!(queue.dequeue("q").await.unwrap().unwrap().id, high);
        assert_eq!(queue.dequeue("q").await.unwrap().unwrap().id, low);
        assert!(queue.dequeue("q").await.unwrap().is_none());
        assert!(queue.dequeue("other").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn fail_reschedules_until_attempts_run_out() {
        let queue = MemoryQueue::new();
        let id = queue.enqueue(&new_job(Priority::Normal, 2)).await.unwrap();

        queue.dequeue("q").await.unwrap().unwrap();
        assert_eq!(queue.fail(id, "boom").await.unwrap(), JobStatus::Pending);
        assert!(queue.dequeue("q").await.unwrap().is_none(), "backoff delays retry");

        queue.make_due(id);
        let retried = queue.dequeue("q").await.unwrap().unwrap();
        assert_eq!(retried.attempts, 2);
        assert_eq!(queue.fail(id, "boom").await.unwrap(), JobStatus::Failed);
        assert_eq!(queue.job(id).unwrap().last_error.as_deref(), Some("boom"));
    }

    #[tokio::test]
    async fn reclaims_expired_locks() {
        let queue = MemoryQueue::new().with_lock_timeout(Duration::ZERO);
        queue.enqueue(&new_job(Priority::Normal, 3)).await.unwrap();
        queue.dequeue("q").await.unwrap().unwrap();
        tokio::time::sleep(Duration::from_millis(5)).await;

        assert_eq!(queue.reclaim_expired().await.unwrap(), 1);
        assert_eq!(queue.counts("q").await.unwrap().pending, 1);
    }

    #[tokio::test]
    async fn expired_lock_on_last_attempt_fails_the_job() {
        let queue = MemoryQueue::new().with_lock_timeout(Duration::ZERO);
        let id = queue.enqueue(&new_job(Priority::Normal, 1)).await.unwrap();

        let mut claims = 0;
        for _ in 0..3 {
            if queue.dequeue("q").await.unwrap().is_some() {
                claims += 1;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
            queue.reclaim_expired().await.unwrap();
        }
        assert_eq!(claims, 1);

        let job = queue.job(id).unwrap();
        assert_eq!(job.status, JobStatus::Failed);
        assert_eq!(job.attempts, 1);
        assert_eq!(queue.counts("q").await.unwrap().failed, 1);
    }

    #[tokio::test]
    async fn unknown_job_is_not_found() {
        let queue = MemoryQueue::new();
        assert!(queue.complete(JobId(9)).await.unwrap_err().is_not_found());
        assert!(queue.fail(JobId(9), "x").await.unwrap_err().is_not_found());
    }
}
