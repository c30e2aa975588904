// SPDX-FileCopyrightText: 2026 Herald Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Error types for the Herald message dispatch system.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A transport failure normalized to `{code, message, status}`.
///
/// This is what gets stored in a message's `result` field when a send fails,
/// so the shape is part of the persisted record layout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransportFailure {
    /// Transport-specific error code (e.g. `"ECONNREFUSED"`, `"21211"`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    /// Human-readable description.
    pub message: String,
    /// Numeric status reported by the remote side, when there is one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
}

impl TransportFailure {
    /// A failure carrying only a message.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            code: None,
            message: message.into(),
            status: None,
        }
    }

    /// Attach an error code.
    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = Some(code.into());
        self
    }

    /// Attach a status.
    pub fn with_status(mut self, status: u16) -> Self {
        self.status = Some(status);
        self
    }

    /// The JSON form written to `Message::result`.
    pub fn to_value(&self) -> serde_json::Value {
        serde_json::json!({
            "code": self.code,
            "message": self.message,
            "status": self.status,
        })
    }
}

impl fmt::Display for TransportFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.code, self.status) {
            (Some(code), Some(status)) => write!(f, "{} (code={code}, status={status})", self.message),
            (Some(code), None) => write!(f, "{} (code={code})", self.message),
            (None, Some(status)) => write!(f, "{} (status={status})", self.message),
            (None, None) => f.write_str(&self.message),
        }
    }
}

/// The primary error type used across all Herald crates.
#[derive(Debug, Error)]
pub enum HeraldError {
    /// Configuration errors (invalid TOML, bad values).
    #[error("configuration error: {0}")]
    Config(String),

    /// A required message field is missing or empty after normalization.
    #[error("validation failed for `{field}`: {message}")]
    Validation {
        field: &'static str,
        message: String,
    },

    /// A record with the same dedup hash already exists.
    #[error("duplicate message hash {hash}")]
    DuplicateKey { hash: String },

    /// No transport is registered under the requested identifier.
    #[error("unknown transport `{transport}`")]
    Resolution { transport: String },

    /// The transport rejected or failed to deliver the message.
    #[error("transport error: {0}")]
    Transport(TransportFailure),

    /// Record store errors (connection, query failure, serialization).
    #[error("storage error: {source}")]
    Storage {
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Job queue errors.
    #[error("queue error: {source}")]
    Queue {
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// A record lookup by id found nothing.
    #[error("message not found: {id}")]
    NotFound { id: String },

    /// Internal or unexpected errors.
    #[error("internal error: {0}")]
    Internal(String),
}

impl HeraldError {
    /// Shorthand for a validation error.
    pub fn validation(field: &'static str, message: impl Into<String>) -> Self {
        HeraldError::Validation {
            field,
            message: message.into(),
        }
    }

    /// Wrap any error as a storage error.
    pub fn storage(source: impl Into<Box<dyn std::error::Error + Send + Sync>>) -> Self {
        HeraldError::Storage {
            source: source.into(),
        }
    }

    /// Wrap any error as a queue error.
    pub fn queue(source: impl Into<Box<dyn std::error::Error + Send + Sync>>) -> Self {
        HeraldError::Queue {
            source: source.into(),
        }
    }

    /// Stable short name of the error kind, used as a log field.
    pub fn kind(&self) -> &'static str {
        match self {
            HeraldError::Config(_) => "config",
            HeraldError::Validation { .. } => "validation",
            HeraldError::DuplicateKey { .. } => "duplicate_key",
            HeraldError::Resolution { .. } => "resolution",
            HeraldError::Transport(_) => "transport",
            HeraldError::Storage { .. } | HeraldError::Queue { .. } => "persistence",
            HeraldError::NotFound { .. } => "not_found",
            HeraldError::Internal(_) => "internal",
        }
    }

    /// Returns true for hash collisions on insert.
    pub fn is_duplicate_key(&self) -> bool {
        matches!(self, HeraldError::DuplicateKey { .. })
    }

    /// Returns true when a record lookup found nothing.
    pub fn is_not_found(&self) -> bool {
        matches!(self, HeraldError::NotFound { .. })
    }

    /// Returns true for record store or job queue I/O failures.
    pub fn is_persistence(&self) -> bool {
        matches!(self, HeraldError::Storage { .. } | HeraldError::Queue { .. })
    }
}

impl From<TransportFailure> for HeraldError {
    fn from(failure: TransportFailure) -> Self {
        HeraldError::Transport(failure)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transport_failure_normalizes_to_code_message_status() {
        let failure = TransportFailure::new("mailbox unavailable")
            .with_code("550")
            .with_status(550);
        let value = failure.to_value();
        assert_eq!(value["code"], "550");
        assert_eq!(value["message"], "mailbox unavailable");
        assert_eq!(value["status"], 550);
    }

    #[test]
    fn transport_failure_display_includes_context() {
        let plain = TransportFailure::new("boom");
        assert_eq!(plain.to_string(), "boom");

        let coded = TransportFailure::new("boom").with_code("E1");
        assert_eq!(coded.to_string(), "boom (code=E1)");
    }

    #[test]
    fn kinds_group_storage_and_queue_as_persistence() {
        let storage = HeraldError::storage(std::io::Error::other("disk"));
        let queue = HeraldError::queue(std::io::Error::other("disk"));
        assert_eq!(storage.kind(), "persistence");
        assert_eq!(queue.kind(), "persistence");
        assert!(storage.is_persistence());
        assert!(!HeraldError::Internal("x".into()).is_persistence());
    }

    #[test]
    fn duplicate_key_predicate() {
        let err = HeraldError::DuplicateKey { hash: "abc".into() };
        assert!(err.is_duplicate_key());
        assert!(err.to_string().contains("abc"));
    }
}
