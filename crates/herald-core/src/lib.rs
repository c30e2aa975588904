// SPDX-FileCopyrightText: 2026 Herald Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Core library for the Herald message dispatch system.
//!
//! This crate provides the message record and its normalization rules, the
//! dedup fingerprint, the shared error type, and the adapter traits that the
//! store, queue, and transport implementations plug into.

pub mod criteria;
pub mod error;
pub mod hash;
pub mod job;
pub mod message;
pub mod traits;
pub mod types;

// Re-export key items at crate root for ergonomic imports.
pub use criteria::MessageCriteria;
pub use error::{HeraldError, TransportFailure};
pub use hash::Fingerprint;
pub use job::{
    encode_payload, payload_message_id, BackoffPolicy, Job, JobId, JobStatus, NewJob, QueueCounts,
};
pub use message::{Message, NewMessage, Recipients};
pub use types::{
    AdapterType, Direction, HealthStatus, MessageId, MessageType, Mime, Mode, Priority, State,
};

pub use traits::{JobQueue, MessageStore, PluginAdapter, Transport, TransportReceipt};
