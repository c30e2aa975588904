// SPDX-FileCopyrightText: 2026 Herald Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! In-memory message store for deterministic tests.
//!
//! Enforces the same uniqueness rules as the SQLite store (id and hash) and
//! can be told to fail reads or writes to exercise error paths.

use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use herald_core::{
    AdapterType, HealthStatus, HeraldError, Message, MessageCriteria, MessageId, MessageStore,
    PluginAdapter,
};

use crate::lock;

/// A message store backed by a `Vec` in insertion order.
#[derive(Default)]
pub struct MemoryStore {
    messages: Mutex<Vec<Message>>,
    fail_saves: AtomicBool,
    fail_finds: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent `create` and `save` fail with a storage error.
    pub fn fail_saves(&self, fail: bool) {
        self.fail_saves.store(fail, Ordering::SeqCst);
    }

    /// Make every subsequent `find` and `find_by_id` fail with a storage error.
    pub fn fail_finds(&self, fail: bool) {
        self.fail_finds.store(fail, Ordering::SeqCst);
    }

    /// Snapshot of every stored record.
    pub fn all(&self) -> Vec<Message> {
        lock(&self.messages).clone()
    }

    /// Record by id, bypassing failure injection.
    pub fn get(&self, id: &MessageId) -> Option<Message> {
        lock(&self.messages).iter().find(|m| &m.id == id).cloned()
    }

    pub fn len(&self) -> usize {
        lock(&self.messages).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn check_writes(&self) -> Result<(), HeraldError> {
        if self.fail_saves.load(Ordering::SeqCst) {
            return Err(HeraldError::storage("injected save failure"));
        }
        Ok(())
    }

    fn check_reads(&self) -> Result<(), HeraldError> {
        if self.fail_finds.load(Ordering::SeqCst) {
            return Err(HeraldError::storage("injected find failure"));
        }
        Ok(())
    }
}

#[async_trait]
impl PluginAdapter for MemoryStore {
    fn name(&self) -> &str {
        "memory"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Store
    }

    async fn health_check(&self) -> Result<HealthStatus, HeraldError> {
        Ok(HealthStatus::Healthy)
    }

    async fn shutdown(&self) -> Result<(), HeraldError> {
        Ok(())
    }
}

#[async_trait]
impl MessageStore for MemoryStore {
    async fn create(&self, message: &Message) -> Result<(), HeraldError> {
        self.check_writes()?;
        let mut messages = lock(&self.messages);
        if messages.iter().any(|m| m.hash == message.hash) {
            return Err(HeraldError::DuplicateKey {
                hash: message.hash.clone(),
            });
        }
        if messages.iter().any(|m| m.id == message.id) {
            return Err(HeraldError::storage(format!(
                "message {} already exists",
                message.id
            )));
        }
        messages.push(message.clone());
        tracing::debug!(id = %message.id, "memory store created message");
        Ok(())
    }

    async fn find_by_id(&self, id: &MessageId) -> Result<Option<Message>, HeraldError> {
        self.check_reads()?;
        Ok(self.get(id))
    }

    async fn find(&self, criteria: &MessageCriteria) -> Result<Vec<Message>, HeraldError> {
        self.check_reads()?;
        let mut found: Vec<Message> = lock(&self.messages)
            .iter()
            .filter(|m| criteria.matches(m))
            .cloned()
            .collect();
        found.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        if let Some(limit) = criteria.limit {
            found.truncate(limit as usize);
        }
        Ok(found)
    }

    async fn save(&self, message: &Message) -> Result<(), HeraldError> {
        self.check_writes()?;
        let mut messages = lock(&self.messages);
        if messages
            .iter()
            .any(|m| m.hash == message.hash && m.id != message.id)
        {
            return Err(HeraldError::DuplicateKey {
                hash: message.hash.clone(),
            });
        }
        match messages.iter_mut().find(|m| m.id == message.id) {
            Some(existing) => *existing = message.clone(),
            None => messages.push(message.clone()),
        }
        tracing::debug!(id = %message.id, state = %message.state, "memory store saved message");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use herald_core::NewMessage;

    fn message(body: &str) -> Message {
        NewMessage::new("a@x.com", "b@x.com", body).normalize().unwrap()
    }

    #[tokio::test]
    async fn create_rejects_duplicate_hash() {
        let store = MemoryStore::new();
        let first = message("same");
        store.create(&first).await.unwrap();

        let mut twin = message("same");
        twin.id = MessageId::generate();
        let err = store.create(&twin).await.unwrap_err();
        assert!(err.is_duplicate_key());
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn save_upserts_by_id() {
        let store = MemoryStore::new();
        let mut m = message("body");
        store.save(&m).await.unwrap();
        m.subject = Some("changed".into());
        store.save(&m).await.unwrap();

        assert_eq!(store.len(), 1);
        assert_eq!(store.get(&m.id).unwrap().subject.as_deref(), Some("changed"));
    }

    #[tokio::test]
    async fn find_applies_criteria_and_limit() {
        let store = MemoryStore::new();
        for body in ["one", "two", "three"] {
            store.create(&message(body)).await.unwrap();
        }
        let mut sent = message("four");
        sent.mark_sent(herald_core::State::Sent, serde_json::Value::Null);
        store.create(&sent).await.unwrap();

        let unsent = store.find(&MessageCriteria::all().unsent()).await.unwrap();
        assert_eq!(unsent.len(), 3);
        assert_eq!(unsent[0].body, "one");

        let limited = store
            .find(&MessageCriteria::all().unsent().limit(2))
            .await
            .unwrap();
        assert_eq!(limited.len(), 2);
    }

    #[tokio::test]
    async fn injected_failures_surface_as_storage_errors() {
        let store = MemoryStore::new();
        store.fail_saves(true);
        let err = store.save(&message("x")).await.unwrap_err();
        assert_eq!(err.kind(), HeraldError::storage("x").kind());

        store.fail_finds(true);
        assert!(store.find(&MessageCriteria::all()).await.is_err());
    }
}
