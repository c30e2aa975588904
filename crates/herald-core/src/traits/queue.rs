// SPDX-FileCopyrightText: 2026 Herald Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Job queue trait for durable work queue backends.

use async_trait::async_trait;

use crate::error::HeraldError;
use crate::job::{Job, JobId, JobStatus, NewJob, QueueCounts};
use crate::traits::adapter::PluginAdapter;

/// A durable, named, priority-ordered job queue.
///
/// Priority, attempt limits and backoff policy are stored with each job so
/// they survive worker restarts.
#[async_trait]
pub trait JobQueue: PluginAdapter {
    /// Persist a new job and return its id.
    async fn enqueue(&self, job: &NewJob) -> Result<JobId, HeraldError>;

    /// Atomically claim the next runnable job on the named queue.
    ///
    /// Highest priority first, then oldest. Returns `None` when nothing is due.
    async fn dequeue(&self, queue_name: &str) -> Result<Option<Job>, HeraldError>;

    /// Mark a claimed job as completed.
    async fn complete(&self, id: JobId) -> Result<(), HeraldError>;

    /// Record a failed attempt.
    ///
    /// Reschedules the job according to its backoff policy, or marks it
    /// failed once `max_attempts` is reached. Returns the resulting status.
    async fn fail(&self, id: JobId, error: &str) -> Result<JobStatus, HeraldError>;

    /// Return jobs whose processing lock has expired to the pending state.
    async fn reclaim_expired(&self) -> Result<u64, HeraldError>;

    /// Job counts per status for the named queue.
    async fn counts(&self, queue_name: &str) -> Result<QueueCounts, HeraldError>;
}
