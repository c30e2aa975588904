// SPDX-FileCopyrightText: 2026 Herald Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Record store trait for message persistence backends.

use async_trait::async_trait;

use crate::criteria::MessageCriteria;
use crate::error::HeraldError;
use crate::message::Message;
use crate::traits::adapter::PluginAdapter;
use crate::types::MessageId;

/// Durable store of message records.
///
/// Implementations must enforce uniqueness of [`Message::hash`] across all
/// records and report a collision as [`HeraldError::DuplicateKey`]. They must
/// be safe for concurrent use; per-record writes are last-write-wins.
#[async_trait]
pub trait MessageStore: PluginAdapter {
    /// Insert a new record. Fails if the id or the hash already exists.
    async fn create(&self, message: &Message) -> Result<(), HeraldError>;

    /// Fetch a record by id.
    async fn find_by_id(&self, id: &MessageId) -> Result<Option<Message>, HeraldError>;

    /// Fetch all records matching the criteria, oldest first.
    async fn find(&self, criteria: &MessageCriteria) -> Result<Vec<Message>, HeraldError>;

    /// Insert or update a record by id.
    async fn save(&self, message: &Message) -> Result<(), HeraldError>;
}
