// SPDX-FileCopyrightText: 2026 Herald Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test harness for end-to-end integration testing.
//!
//! `TestHarness` assembles a complete dispatch stack: a temp SQLite database
//! serving as both message store and job queue, the built-in transports, a
//! [`MockTransport`], and a [`DispatchEngine`] wired to all of them.

use std::sync::Arc;
use std::time::Duration;

use herald_config::{DispatchConfig, StorageConfig, TransportsConfig, WorkerConfig};
use herald_core::{BackoffPolicy, HeraldError, JobQueue, MessageStore, NewMessage};
use herald_dispatch::{DispatchEngine, Worker};
use herald_storage::SqliteStorage;
use herald_transport::builtin_registry;

use crate::mock_transport::MockTransport;

/// Builder for creating test environments with configurable options.
pub struct TestHarnessBuilder {
    default_transport: String,
    default_attempts: u32,
    lock_timeout: Duration,
    mock: MockTransport,
}

impl TestHarnessBuilder {
    fn new() -> Self {
        Self {
            default_transport: "mock".to_string(),
            default_attempts: DispatchConfig::default().default_attempts,
            lock_timeout: Duration::from_secs(300),
            mock: MockTransport::new(),
        }
    }

    /// Transport assigned to drafts that name none.
    pub fn with_default_transport(mut self, transport: impl Into<String>) -> Self {
        self.default_transport = transport.into();
        self
    }

    /// Attempts given to queued jobs when the caller does not choose.
    pub fn with_attempts(mut self, attempts: u32) -> Self {
        self.default_attempts = attempts;
        self
    }

    pub fn with_lock_timeout(mut self, lock_timeout: Duration) -> Self {
        self.lock_timeout = lock_timeout;
        self
    }

    /// Use a pre-scripted mock transport.
    pub fn with_mock(mut self, mock: MockTransport) -> Self {
        self.mock = mock;
        self
    }

    /// Build the test harness, creating all required subsystems.
    pub async fn build(self) -> Result<TestHarness, HeraldError> {
        let temp_dir = tempfile::TempDir::new().map_err(HeraldError::storage)?;
        let db_path = temp_dir.path().join("test.db");

        let storage_config = StorageConfig {
            database_path: db_path.to_string_lossy().to_string(),
            ..StorageConfig::default()
        };
        let storage = SqliteStorage::new(storage_config).with_lock_timeout(self.lock_timeout);
        storage.initialize().await?;
        let storage = Arc::new(storage);

        let mock = Arc::new(self.mock);
        let mut registry = builtin_registry(&TransportsConfig::default());
        registry.register(mock.clone());

        let dispatch = DispatchConfig {
            default_transport: self.default_transport,
            default_attempts: self.default_attempts,
            ..DispatchConfig::default()
        };
        let store: Arc<dyn MessageStore> = storage.clone();
        let queue: Arc<dyn JobQueue> = storage.clone();
        let engine = DispatchEngine::new(store, queue, Arc::new(registry), dispatch);

        Ok(TestHarness {
            engine,
            storage,
            mock,
            _temp_dir: temp_dir,
        })
    }
}

/// A complete test environment backed by a temp SQLite database.
pub struct TestHarness {
    /// Engine wired to the temp database and the mock transport.
    pub engine: DispatchEngine,
    /// SQLite storage (temp DB, cleaned up on drop).
    pub storage: Arc<SqliteStorage>,
    /// The mock transport, registered as `"mock"` unless renamed.
    pub mock: Arc<MockTransport>,
    _temp_dir: tempfile::TempDir,
}

impl TestHarness {
    /// Create a new builder for configuring the test harness.
    pub fn builder() -> TestHarnessBuilder {
        TestHarnessBuilder::new()
    }

    /// A minimal valid outbound draft with the given body.
    pub fn draft(body: &str) -> NewMessage {
        NewMessage::new("sender@example.com", "rcpt@example.com", body)
    }

    /// Worker settings tuned for tests: one loop, fast polling, short grace.
    pub fn worker_config(&self) -> WorkerConfig {
        WorkerConfig {
            queues: vec!["email".to_string()],
            concurrency: 1,
            poll_interval_ms: 10,
            lock_timeout_secs: 1,
            shutdown_grace_secs: 2,
        }
    }

    pub fn worker(&self) -> Worker {
        Worker::new(self.engine.clone(), self.worker_config())
    }

    /// A fast fixed backoff so retried jobs become due almost at once.
    pub fn quick_backoff() -> BackoffPolicy {
        BackoffPolicy::Fixed { delay_ms: 1 }
    }
}
