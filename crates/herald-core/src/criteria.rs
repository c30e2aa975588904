// SPDX-FileCopyrightText: 2026 Herald Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Typed query criteria for finding message records.

use serde::{Deserialize, Serialize};

use crate::message::Message;
use crate::types::{Direction, MessageId, MessageType, Mode, State};

/// Filter over message records. Every populated field must match (logical AND).
///
/// `sent = Some(false)` selects records without `sentAt`; `Some(true)` selects
/// records with it. [`MessageCriteria::unsent`] and [`MessageCriteria::sent`]
/// merge that predicate into existing criteria without dropping anything.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase", deny_unknown_fields)]
pub struct MessageCriteria {
    pub ids: Option<Vec<MessageId>>,
    #[serde(rename = "type")]
    pub message_type: Option<MessageType>,
    pub direction: Option<Direction>,
    pub state: Option<State>,
    pub mode: Option<Mode>,
    pub queue_name: Option<String>,
    pub transport: Option<String>,
    pub from: Option<String>,
    pub hash: Option<String>,
    pub sent: Option<bool>,
    pub limit: Option<u32>,
}

impl MessageCriteria {
    /// Criteria matching every record.
    pub fn all() -> Self {
        Self::default()
    }

    /// Restrict to the given ids.
    pub fn with_ids(ids: impl IntoIterator<Item = MessageId>) -> Self {
        Self {
            ids: Some(ids.into_iter().collect()),
            ..Self::default()
        }
    }

    /// Same criteria, additionally requiring `sentAt` to be absent.
    ///
    /// A caller that already asked for sent records gets criteria matching
    /// nothing.
    pub fn unsent(self) -> Self {
        self.require_sent(false)
    }

    /// Same criteria, additionally requiring `sentAt` to be present.
    pub fn sent(self) -> Self {
        self.require_sent(true)
    }

    fn require_sent(self, sent: bool) -> Self {
        if self.sent == Some(!sent) {
            return Self {
                ids: Some(Vec::new()),
                ..self
            };
        }
        Self {
            sent: Some(sent),
            ..self
        }
    }

    pub fn queue_name(mut self, queue_name: impl Into<String>) -> Self {
        self.queue_name = Some(queue_name.into());
        self
    }

    pub fn message_type(mut self, message_type: MessageType) -> Self {
        self.message_type = Some(message_type);
        self
    }

    pub fn mode(mut self, mode: Mode) -> Self {
        self.mode = Some(mode);
        self
    }

    pub fn limit(mut self, limit: u32) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Evaluate the criteria against one record (limit is not applied here).
    ///
    /// Backends that cannot push filters down (the in-memory store) use this;
    /// the SQLite store translates the same fields into a WHERE clause.
    pub fn matches(&self, message: &Message) -> bool {
        if let Some(ids) = &self.ids
            && !ids.contains(&message.id)
        {
            return false;
        }
        if self.message_type.is_some_and(|t| t != message.message_type) {
            return false;
        }
        if self.direction.is_some_and(|d| d != message.direction) {
            return false;
        }
        if self.state.is_some_and(|s| s != message.state) {
            return false;
        }
        if self.mode.is_some_and(|m| m != message.mode) {
            return false;
        }
        if self.queue_name.as_deref().is_some_and(|q| q != message.queue_name) {
            return false;
        }
        if self.transport.as_deref().is_some_and(|t| t != message.transport) {
            return false;
        }
        if self.from.as_deref().is_some_and(|f| f != message.from) {
            return false;
        }
        if self.hash.as_deref().is_some_and(|h| h != message.hash) {
            return false;
        }
        if self.sent.is_some_and(|sent| sent != message.is_sent()) {
            return false;
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::NewMessage;

    #[test]
    fn unsent_merges_with_existing_filters() {
        let criteria = MessageCriteria::all().queue_name("sms").unsent();
        assert_eq!(criteria.queue_name.as_deref(), Some("sms"));
        assert_eq!(criteria.sent, Some(false));
    }

    #[test]
    fn contradicting_sent_filter_matches_nothing() {
        let mut message = NewMessage::new("a@x.com", "b@x.com", "hi").normalize().unwrap();
        let caller = MessageCriteria {
            sent: Some(true),
            ..MessageCriteria::all()
        };
        let merged = caller.clone().unsent();
        assert_eq!(merged.sent, Some(true));
        assert_eq!(merged.ids, Some(Vec::new()));
        assert!(!merged.matches(&message));

        message.mark_sent(State::Delivered, serde_json::Value::Null);
        assert!(!merged.matches(&message));
        assert!(caller.clone().sent().matches(&message));
        assert_eq!(caller.clone().sent(), caller);
    }

    #[test]
    fn sent_predicate_tracks_sent_at() {
        let mut message = NewMessage::new("a@x.com", "b@x.com", "hi").normalize().unwrap();
        assert!(MessageCriteria::all().unsent().matches(&message));
        assert!(!MessageCriteria::all().sent().matches(&message));

        message.mark_sent(State::Delivered, serde_json::Value::Null);
        assert!(!MessageCriteria::all().unsent().matches(&message));
        assert!(MessageCriteria::all().sent().matches(&message));
    }

    #[test]
    fn field_filters_are_conjunctive() {
        let message = NewMessage::new("a@x.com", "b@x.com", "hi").normalize().unwrap();
        assert!(MessageCriteria::all().queue_name("email").matches(&message));
        assert!(!MessageCriteria::all().queue_name("sms").matches(&message));
        assert!(
            !MessageCriteria::all()
                .queue_name("email")
                .message_type(MessageType::Push)
                .matches(&message)
        );
        assert!(MessageCriteria::with_ids([message.id.clone()]).matches(&message));
        assert!(!MessageCriteria::with_ids([MessageId::from("other")]).matches(&message));
    }

    #[test]
    fn deserializes_from_json() {
        let criteria: MessageCriteria =
            serde_json::from_str(r#"{"type":"SMS","queueName":"otp","limit":5}"#).unwrap();
        assert_eq!(criteria.message_type, Some(MessageType::Sms));
        assert_eq!(criteria.queue_name.as_deref(), Some("otp"));
        assert_eq!(criteria.limit, Some(5));
    }
}
