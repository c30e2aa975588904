// SPDX-FileCopyrightText: 2026 Herald Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! SQLite implementation of the message store and job queue traits.

use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::OnceCell;
use tracing::debug;

use herald_config::StorageConfig;
use herald_core::{
    AdapterType, HealthStatus, HeraldError, Job, JobId, JobQueue, JobStatus, Message,
    MessageCriteria, MessageId, MessageStore, NewJob, PluginAdapter, QueueCounts,
};

use crate::database::{map_tr_err, Database};
use crate::queries;

const DEFAULT_LOCK_TIMEOUT: Duration = Duration::from_secs(300);

/// SQLite-backed store and queue.
///
/// Both roles share one [`Database`]. The database is opened lazily by
/// [`SqliteStorage::initialize`].
pub struct SqliteStorage {
    config: StorageConfig,
    lock_timeout: Duration,
    db: OnceCell<Database>,
}

impl SqliteStorage {
    /// Create a new SqliteStorage. No connection is opened yet.
    pub fn new(config: StorageConfig) -> Self {
        Self {
            config,
            lock_timeout: DEFAULT_LOCK_TIMEOUT,
            db: OnceCell::new(),
        }
    }

    /// How long a dequeued job stays locked before it may be reclaimed.
    pub fn with_lock_timeout(mut self, lock_timeout: Duration) -> Self {
        self.lock_timeout = lock_timeout;
        self
    }

    /// Create and initialize in one step.
    pub async fn open(config: StorageConfig) -> Result<Self, HeraldError> {
        let storage = Self::new(config);
        storage.initialize().await?;
        Ok(storage)
    }

    /// Open the database and run migrations. Fails if called twice.
    pub async fn initialize(&self) -> Result<(), HeraldError> {
        let db = Database::open_with(&self.config).await?;
        self.db
            .set(db)
            .map_err(|_| HeraldError::storage("storage already initialized"))?;
        debug!(path = %self.config.database_path, "SQLite storage initialized");
        Ok(())
    }

    /// Look up a job by id.
    pub async fn job(&self, id: JobId) -> Result<Option<Job>, HeraldError> {
        queries::jobs::get_job(self.db()?, id).await
    }

    fn db(&self) -> Result<&Database, HeraldError> {
        self.db
            .get()
            .ok_or_else(|| HeraldError::storage("storage not initialized -- call initialize() first"))
    }
}

#[async_trait]
impl PluginAdapter for SqliteStorage {
    fn name(&self) -> &str {
        "sqlite"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Store
    }

    async fn health_check(&self) -> Result<HealthStatus, HeraldError> {
        let db = self.db()?;
        db.connection()
            .call(|conn| -> Result<(), rusqlite::Error> {
                conn.execute_batch("SELECT 1;")?;
                Ok(())
            })
            .await
            .map_err(map_tr_err)?;
        Ok(HealthStatus::Healthy)
    }

    async fn shutdown(&self) -> Result<(), HeraldError> {
        if let Some(db) = self.db.get() {
            db.checkpoint().await?;
            debug!("shutdown: WAL checkpoint complete");
        }
        Ok(())
    }
}

#[async_trait]
impl MessageStore for SqliteStorage {
    async fn create(&self, message: &Message) -> Result<(), HeraldError> {
        queries::messages::insert_message(self.db()?, message).await
    }

    async fn find_by_id(&self, id: &MessageId) -> Result<Option<Message>, HeraldError> {
        queries::messages::get_message(self.db()?, id).await
    }

    async fn find(&self, criteria: &MessageCriteria) -> Result<Vec<Message>, HeraldError> {
        queries::messages::find_messages(self.db()?, criteria).await
    }

    async fn save(&self, message: &Message) -> Result<(), HeraldError> {
        queries::messages::save_message(self.db()?, message).await
    }
}

#[async_trait]
impl JobQueue for SqliteStorage {
    async fn enqueue(&self, job: &NewJob) -> Result<JobId, HeraldError> {
        queries::jobs::enqueue(self.db()?, job).await
    }

    async fn dequeue(&self, queue_name: &str) -> Result<Option<Job>, HeraldError> {
        queries::jobs::dequeue(self.db()?, queue_name, self.lock_timeout).await
    }

    async fn complete(&self, id: JobId) -> Result<(), HeraldError> {
        queries::jobs::complete(self.db()?, id).await
    }

    async fn fail(&self, id: JobId, error: &str) -> Result<JobStatus, HeraldError> {
        queries::jobs::fail(self.db()?, id, error).await
    }

    async fn reclaim_expired(&self) -> Result<u64, HeraldError> {
        queries::jobs::reclaim_expired(self.db()?).await
    }

    async fn counts(&self, queue_name: &str) -> Result<QueueCounts, HeraldError> {
        queries::jobs::counts(self.db()?, queue_name).await
    }
}
