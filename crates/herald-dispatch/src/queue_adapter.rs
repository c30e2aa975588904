// SPDX-FileCopyrightText: 2026 Herald Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Translation from message records to queue jobs.
//!
//! The payload is the record's persisted JSON form, unchanged. Queue metadata
//! (name, priority, attempts, backoff) travels beside it on the job row.

use std::sync::Arc;

use herald_core::{encode_payload, BackoffPolicy, HeraldError, JobId, JobQueue, Message, NewJob};
use tracing::debug;

/// Thin wrapper over a [`JobQueue`] that knows how to enqueue messages.
#[derive(Clone)]
pub struct QueueAdapter {
    queue: Arc<dyn JobQueue>,
}

impl QueueAdapter {
    pub fn new(queue: Arc<dyn JobQueue>) -> Self {
        Self { queue }
    }

    /// Build the job that carries `message`.
    pub fn job_for(
        message: &Message,
        attempts: u32,
        backoff: BackoffPolicy,
    ) -> Result<NewJob, HeraldError> {
        Ok(NewJob {
            queue_name: message.queue_name.clone(),
            payload: encode_payload(message)?,
            priority: message.priority,
            max_attempts: attempts,
            backoff,
        })
    }

    /// Enqueue `message` on its queue.
    pub async fn enqueue(
        &self,
        message: &Message,
        attempts: u32,
        backoff: BackoffPolicy,
    ) -> Result<JobId, HeraldError> {
        let job = Self::job_for(message, attempts, backoff)?;
        let id = self.queue.enqueue(&job).await?;
        debug!(
            job_id = %id,
            message_id = %message.id,
            queue = %job.queue_name,
            priority = %job.priority,
            attempts,
            "job enqueued"
        );
        Ok(id)
    }

    /// The backing queue, for workers.
    pub fn backend(&self) -> &Arc<dyn JobQueue> {
        &self.queue
    }
}
