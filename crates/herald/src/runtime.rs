// SPDX-FileCopyrightText: 2026 Herald Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Wiring shared by every subcommand: storage, transports and the engine.

use std::sync::Arc;
use std::time::Duration;

use herald_config::HeraldConfig;
use herald_core::{HeraldError, JobQueue, MessageStore, PluginAdapter};
use herald_dispatch::DispatchEngine;
use herald_storage::SqliteStorage;
use herald_transport::builtin_registry;
use tracing::{debug, info, warn};

/// An opened storage backend and the engine built on it.
pub struct Runtime {
    pub engine: DispatchEngine,
    pub storage: Arc<SqliteStorage>,
}

impl Runtime {
    /// Open the database, run migrations and assemble the engine.
    pub async fn open(config: &HeraldConfig) -> Result<Self, HeraldError> {
        let storage = SqliteStorage::new(config.storage.clone())
            .with_lock_timeout(Duration::from_secs(config.worker.lock_timeout_secs));
        storage.initialize().await?;
        let storage = Arc::new(storage);

        let registry = builtin_registry(&config.transports);
        if !registry.contains(&config.dispatch.default_transport) {
            warn!(
                transport = %config.dispatch.default_transport,
                "default transport is not registered; sends without an explicit transport will fail"
            );
        }
        info!(
            database = %config.storage.database_path,
            transports = ?registry.names(),
            "runtime ready"
        );

        let store: Arc<dyn MessageStore> = storage.clone();
        let queue: Arc<dyn JobQueue> = storage.clone();
        let engine = DispatchEngine::new(
            store,
            queue,
            Arc::new(registry),
            config.dispatch.clone(),
        );
        Ok(Self { engine, storage })
    }

    /// Shut down transports, then checkpoint the database.
    pub async fn shutdown(&self) -> Result<(), HeraldError> {
        for (name, e) in self.engine.transports().shutdown_all().await {
            warn!(transport = %name, error = %e, "transport did not shut down cleanly");
        }
        self.storage.shutdown().await?;
        debug!("runtime shut down");
        Ok(())
    }
}
