// SPDX-FileCopyrightText: 2026 Herald Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Durable job types shared by the queue adapter, the queue backends, and workers.

use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use crate::error::HeraldError;
use crate::message::Message;
use crate::types::{MessageId, Priority};

/// Identifier assigned to a job by the queue backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(pub i64);

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// How long to wait before a failed job becomes eligible again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum BackoffPolicy {
    /// The same delay after every failure.
    Fixed { delay_ms: u64 },
    /// `delay_ms * 2^(attempt - 1)`, capped at `max_delay_ms`.
    Exponential { delay_ms: u64, max_delay_ms: u64 },
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        BackoffPolicy::Exponential {
            delay_ms: 1_000,
            max_delay_ms: 300_000,
        }
    }
}

impl BackoffPolicy {
    /// Delay before the next try, given how many attempts have failed so far (1-based).
    pub fn delay_for(&self, failed_attempts: u32) -> Duration {
        match *self {
            BackoffPolicy::Fixed { delay_ms } => Duration::from_millis(delay_ms),
            BackoffPolicy::Exponential {
                delay_ms,
                max_delay_ms,
            } => {
                let exponent = failed_attempts.saturating_sub(1).min(63);
                let delay = delay_ms.saturating_mul(2u64.saturating_pow(exponent));
                Duration::from_millis(delay.min(max_delay_ms))
            }
        }
    }
}

/// Processing status of a job row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum JobStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

/// A job to be created on a named queue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewJob {
    pub queue_name: String,
    /// JSON payload; for dispatch jobs, the persisted form of a message.
    pub payload: String,
    pub priority: Priority,
    pub max_attempts: u32,
    pub backoff: BackoffPolicy,
}

/// A job as stored by the queue backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Job {
    pub id: JobId,
    pub queue_name: String,
    pub payload: String,
    pub priority: Priority,
    pub status: JobStatus,
    pub attempts: u32,
    pub max_attempts: u32,
    pub backoff: BackoffPolicy,
    pub last_error: Option<String>,
    pub run_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Job counts for one queue, grouped by status.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct QueueCounts {
    pub pending: u64,
    pub processing: u64,
    pub completed: u64,
    pub failed: u64,
}

#[derive(Deserialize)]
struct PayloadId {
    id: MessageId,
}

/// Serialize a message into a job payload.
pub fn encode_payload(message: &Message) -> Result<String, HeraldError> {
    serde_json::to_string(message).map_err(HeraldError::queue)
}

/// Extract the message id embedded in a job payload.
pub fn payload_message_id(payload: &str) -> Result<MessageId, HeraldError> {
    let parsed: PayloadId = serde_json::from_str(payload).map_err(HeraldError::queue)?;
    Ok(parsed.id)
}
