// SPDX-FileCopyrightText: 2026 Herald Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Per-call options and aggregate results of dispatch operations.

use herald_core::{BackoffPolicy, HeraldError, JobId, Message, MessageId};
use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;

/// Options for [`crate::DispatchEngine::queue`].
///
/// Unset fields fall back to the `[dispatch]` configuration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct QueueOptions {
    pub attempts: Option<u32>,
    pub backoff: Option<BackoffPolicy>,
}

impl QueueOptions {
    pub fn attempts(mut self, attempts: u32) -> Self {
        self.attempts = Some(attempts);
        self
    }

    pub fn backoff(mut self, backoff: BackoffPolicy) -> Self {
        self.backoff = Some(backoff);
        self
    }
}

/// Options for [`crate::DispatchEngine::send`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SendOptions {
    /// Record a synthetic success without invoking any transport.
    pub fake: bool,
}

impl SendOptions {
    pub fn fake() -> Self {
        Self { fake: true }
    }
}

/// Outcome of a successful `queue` call.
#[derive(Debug, Clone, PartialEq)]
pub struct Queued {
    /// The record as persisted.
    pub message: Message,
    /// The job carrying it; `None` for pull-mode records.
    pub job: Option<JobId>,
}

/// Per-record outcome of a `resend` call.
#[derive(Debug, Default)]
pub struct ResendReport {
    pub sent: Vec<Message>,
    pub failed: Vec<(MessageId, HeraldError)>,
}

impl ResendReport {
    /// Number of records attempted.
    pub fn total(&self) -> usize {
        self.sent.len() + self.failed.len()
    }

    pub fn is_empty(&self) -> bool {
        self.total() == 0
    }
}

/// Records matched by a `requeue` call and the detached tasks queueing them.
///
/// Dropping the ticket leaves the tasks running.
#[derive(Debug)]
pub struct RequeueTicket {
    pub matched: Vec<MessageId>,
    tasks: Vec<JoinHandle<()>>,
}

impl RequeueTicket {
    pub(crate) fn new(matched: Vec<MessageId>, tasks: Vec<JoinHandle<()>>) -> Self {
        Self { matched, tasks }
    }

    /// Wait until every per-record queue task has finished.
    ///
    /// Individual outcomes are reported through queue events only.
    pub async fn settled(self) {
        futures::future::join_all(self.tasks).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn queue_options_deserialize_partially() {
        let opts: QueueOptions = serde_json::from_str(r#"{"attempts": 5}"#).unwrap();
        assert_eq!(opts.attempts, Some(5));
        assert_eq!(opts.backoff, None);

        let opts: QueueOptions =
            serde_json::from_str(r#"{"backoff": {"type": "fixed", "delay_ms": 10}}"#).unwrap();
        assert_eq!(opts.backoff, Some(BackoffPolicy::Fixed { delay_ms: 10 }));
    }

    #[test]
    fn send_options_default_to_real_send() {
        assert!(!SendOptions::default().fake);
        assert!(SendOptions::fake().fake);
    }

    #[test]
    fn empty_report() {
        let report = ResendReport::default();
        assert!(report.is_empty());
        assert_eq!(report.total(), 0);
    }
}
