// SPDX-FileCopyrightText: 2026 Herald Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Dispatch lifecycle events.
//!
//! Each dispatch engine owns an [`EventBus`]. Observers subscribe to it and
//! receive an [`EventEnvelope`] for every queue, send and requeue outcome.
//! Publishing never fails: with no subscribers, or with a lagging subscriber,
//! events are dropped for that subscriber only.

use chrono::{DateTime, Utc};
use herald_core::{JobId, Message, MessageId, TransportFailure};
use serde::Serialize;
use tokio::sync::broadcast;
use tracing::trace;

/// Default channel capacity.
pub const DEFAULT_CAPACITY: usize = 1024;

/// An outcome signalled by the dispatch engine.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum DispatchEvent {
    /// The record or its job could not be persisted.
    QueueError { message: Message, error: String },
    /// The record was persisted; `job` is set for push-mode records.
    QueueSuccess { message: Message, job: Option<JobId> },
    /// The transport rejected the record.
    SentError {
        message: Message,
        error: TransportFailure,
    },
    /// The transport accepted the record.
    SentSuccess { message: Message },
    /// Looking up unsent records for a requeue failed.
    RequeueError { error: String },
    /// Unsent records matched for requeue.
    RequeueSuccess { messages: Vec<MessageId> },
}

impl DispatchEvent {
    /// The wire name of the event, e.g. `message:sent:success`.
    pub fn name(&self) -> &'static str {
        match self {
            DispatchEvent::QueueError { .. } => "message:queue:error",
            DispatchEvent::QueueSuccess { .. } => "message:queue:success",
            DispatchEvent::SentError { .. } => "message:sent:error",
            DispatchEvent::SentSuccess { .. } => "message:sent:success",
            DispatchEvent::RequeueError { .. } => "message:requeue:error",
            DispatchEvent::RequeueSuccess { .. } => "message:requeue:success",
        }
    }

    /// Whether this event reports a failure.
    pub fn is_error(&self) -> bool {
        matches!(
            self,
            DispatchEvent::QueueError { .. }
                | DispatchEvent::SentError { .. }
                | DispatchEvent::RequeueError { .. }
        )
    }

    /// The id of the record the event concerns, if it concerns a single one.
    pub fn message_id(&self) -> Option<&MessageId> {
        match self {
            DispatchEvent::QueueError { message, .. }
            | DispatchEvent::QueueSuccess { message, .. }
            | DispatchEvent::SentError { message, .. }
            | DispatchEvent::SentSuccess { message } => Some(&message.id),
            DispatchEvent::RequeueError { .. } | DispatchEvent::RequeueSuccess { .. } => None,
        }
    }
}

/// A published event with its id and publication time.
#[derive(Debug, Clone, Serialize)]
pub struct EventEnvelope {
    pub id: String,
    pub name: &'static str,
    pub published_at: DateTime<Utc>,
    pub event: DispatchEvent,
}

impl EventEnvelope {
    fn wrap(event: DispatchEvent) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            name: event.name(),
            published_at: Utc::now(),
            event,
        }
    }

    /// The envelope as a JSON value.
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }
}

/// Broadcast channel of dispatch events.
#[derive(Debug, Clone)]
pub struct EventBus {
    sender: broadcast::Sender<EventEnvelope>,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl EventBus {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish an event. Returns the number of subscribers that received it.
    pub fn publish(&self, event: DispatchEvent) -> usize {
        let envelope = EventEnvelope::wrap(event);
        let name = envelope.name;
        match self.sender.send(envelope) {
            Ok(n) => n,
            Err(_) => {
                trace!(event = name, "no subscribers for event");
                0
            }
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<EventEnvelope> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use herald_core::NewMessage;

    fn message() -> Message {
        NewMessage::new("a@x.com", "b@x.com", "hi").normalize().unwrap()
    }

    #[test]
    fn names_match_wire_literals() {
        let m = message();
        let cases = [
            (
                DispatchEvent::QueueError {
                    message: m.clone(),
                    error: "x".into(),
                },
                "message:queue:error",
            ),
            (
                DispatchEvent::QueueSuccess {
                    message: m.clone(),
                    job: None,
                },
                "message:queue:success",
            ),
            (
                DispatchEvent::SentError {
                    message: m.clone(),
                    error: TransportFailure::new("down"),
                },
                "message:sent:error",
            ),
            (
                DispatchEvent::SentSuccess { message: m.clone() },
                "message:sent:success",
            ),
            (
                DispatchEvent::RequeueError { error: "x".into() },
                "message:requeue:error",
            ),
            (
                DispatchEvent::RequeueSuccess { messages: vec![] },
                "message:requeue:success",
            ),
        ];
        for (event, name) in cases {
            assert_eq!(event.name(), name);
            assert_eq!(event.is_error(), name.ends_with(":error"));
        }
    }

    #[test]
    fn publish_without_subscribers_is_silent() {
        let bus = EventBus::new();
        assert_eq!(bus.publish(DispatchEvent::RequeueError { error: "x".into() }), 0);
    }

    #[tokio::test]
    async fn subscribers_receive_envelopes() {
        let bus = EventBus::new();
        let mut rx1 = bus.subscribe();
        let mut rx2 = bus.subscribe();
        assert_eq!(bus.subscriber_count(), 2);

        let m = message();
        let delivered = bus.publish(DispatchEvent::SentSuccess { message: m.clone() });
        assert_eq!(delivered, 2);

        for rx in [&mut rx1, &mut rx2] {
            let envelope = rx.recv().await.unwrap();
            assert_eq!(envelope.name, "message:sent:success");
            assert_eq!(envelope.event.message_id(), Some(&m.id));
        }
    }

    #[test]
    fn envelope_serializes_with_tag() {
        let envelope = EventEnvelope::wrap(DispatchEvent::RequeueSuccess {
            messages: vec![MessageId::from("m1")],
        });
        let json = envelope.to_json();
        assert_eq!(json["name"], "message:requeue:success");
        assert_eq!(json["event"]["event"], "requeue_success");
        assert_eq!(json["event"]["messages"][0], "m1");
    }
}
