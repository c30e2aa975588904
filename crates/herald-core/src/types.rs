// SPDX-FileCopyrightText: 2026 Herald Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Common types shared by the message record, the adapters, and the engine.
//!
//! Enum string literals (`"EMAIL"`, `"Outbound"`, `"Pull"`, `"Delivered"`, ...)
//! are part of the persisted layout and are consumed verbatim by transports
//! and queue payloads, so both the serde and strum spellings are pinned.

use std::fmt;

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Opaque unique identifier of a message record.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageId(pub String);

impl MessageId {
    /// Generate a fresh random identifier.
    pub fn generate() -> Self {
        MessageId(uuid::Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for MessageId {
    fn from(s: &str) -> Self {
        MessageId(s.to_string())
    }
}

/// Delivery channel of a message.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[serde(rename_all = "UPPERCASE")]
#[strum(serialize_all = "UPPERCASE")]
pub enum MessageType {
    #[default]
    Email,
    Sms,
    Push,
}

impl MessageType {
    /// Queue name derived from the type when none is supplied (`"email"`, `"sms"`, `"push"`).
    pub fn default_queue_name(&self) -> String {
        self.to_string().to_lowercase()
    }
}

/// Content type of the message body.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
pub enum Mime {
    #[default]
    #[serde(rename = "text/plain")]
    #[strum(serialize = "text/plain")]
    TextPlain,
    #[serde(rename = "text/html")]
    #[strum(serialize = "text/html")]
    TextHtml,
}

/// Whether the message leaves or enters the system.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
pub enum Direction {
    Inbound,
    #[default]
    Outbound,
}

/// Lifecycle state of a message.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
pub enum State {
    #[default]
    Unknown,
    Received,
    Sent,
    Queued,
    Delivered,
}

/// Dispatch mode.
///
/// `Push` means a worker proactively sends the message; `Pull` means an
/// external transport later collects unsent messages on its own.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
pub enum Mode {
    #[default]
    Push,
    Pull,
}

/// Message priority, also used as the job priority on the queue.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Display,
    EnumString,
    Serialize,
    Deserialize,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Priority {
    Low,
    #[default]
    Normal,
    Medium,
    High,
    Critical,
}

impl Priority {
    /// Numeric rank stored on queue jobs. Higher ranks are dequeued first.
    pub fn rank(&self) -> i64 {
        match self {
            Priority::Low => 0,
            Priority::Normal => 10,
            Priority::Medium => 20,
            Priority::High => 30,
            Priority::Critical => 40,
        }
    }

    /// Inverse of [`Priority::rank`]; unknown ranks clamp to the nearest level.
    pub fn from_rank(rank: i64) -> Self {
        match rank {
            i64::MIN..=4 => Priority::Low,
            5..=14 => Priority::Normal,
            15..=24 => Priority::Medium,
            25..=34 => Priority::High,
            _ => Priority::Critical,
        }
    }
}

/// Health status reported by adapter health checks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HealthStatus {
    /// Adapter is fully operational.
    Healthy,
    /// Adapter is operational but experiencing issues.
    Degraded(String),
    /// Adapter is not operational.
    Unhealthy(String),
}

/// Identifies the role an adapter plays.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
pub enum AdapterType {
    Store,
    Queue,
    Transport,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn enum_literals_match_persisted_layout() {
        assert_eq!(MessageType::Email.to_string(), "EMAIL");
        assert_eq!(Mime::TextHtml.to_string(), "text/html");
        assert_eq!(Direction::Outbound.to_string(), "Outbound");
        assert_eq!(Mode::Pull.to_string(), "Pull");
        assert_eq!(State::Delivered.to_string(), "Delivered");
        assert_eq!(Priority::Critical.to_string(), "critical");

        assert_eq!(serde_json::to_string(&MessageType::Sms).unwrap(), "\"SMS\"");
        assert_eq!(serde_json::to_string(&Mime::TextPlain).unwrap(), "\"text/plain\"");
        assert_eq!(serde_json::to_string(&Priority::Medium).unwrap(), "\"medium\"");
    }

    #[test]
    fn defaults() {
        assert_eq!(MessageType::default(), MessageType::Email);
        assert_eq!(Direction::default(), Direction::Outbound);
        assert_eq!(State::default(), State::Unknown);
        assert_eq!(Mode::default(), Mode::Push);
        assert_eq!(Priority::default(), Priority::Normal);
    }

    #[test]
    fn from_str_parses_literals() {
        assert_eq!(MessageType::from_str("PUSH").unwrap(), MessageType::Push);
        assert_eq!(Mime::from_str("text/html").unwrap(), Mime::TextHtml);
        assert_eq!(State::from_str("Queued").unwrap(), State::Queued);
        assert!(Priority::from_str("urgent").is_err());
    }

    #[test]
    fn default_queue_name_is_lowercased_type() {
        assert_eq!(MessageType::Email.default_queue_name(), "email");
        assert_eq!(MessageType::Sms.default_queue_name(), "sms");
    }

    #[test]
    fn priority_rank_orders_and_roundtrips() {
        let all = [
            Priority::Low,
            Priority::Normal,
            Priority::Medium,
            Priority::High,
            Priority::Critical,
        ];
        for pair in all.windows(2) {
            assert!(pair[0].rank() < pair[1].rank());
        }
        for p in all {
            assert_eq!(Priority::from_rank(p.rank()), p);
        }
    }
}
