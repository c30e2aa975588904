// SPDX-FileCopyrightText: 2026 Herald Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration model structs for Herald.
//!
//! All structs use `#[serde(deny_unknown_fields)]` to reject unrecognized
//! config keys at startup, providing actionable error messages.

use std::collections::BTreeMap;

use herald_core::BackoffPolicy;
use serde::{Deserialize, Serialize};

/// Top-level Herald configuration.
///
/// Loaded from TOML files following XDG hierarchy, with environment variable overrides.
/// All sections are optional and default to sensible values.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct HeraldConfig {
    /// Record store and job queue database settings.
    #[serde(default)]
    pub storage: StorageConfig,

    /// Dispatch engine defaults.
    #[serde(default)]
    pub dispatch: DispatchConfig,

    /// Queue worker settings.
    #[serde(default)]
    pub worker: WorkerConfig,

    /// Log output settings.
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Built-in transport toggles.
    #[serde(default)]
    pub transports: TransportsConfig,
}

/// Storage backend configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct StorageConfig {
    /// Path to the SQLite database file.
    #[serde(default = "default_database_path")]
    pub database_path: String,

    /// Enable WAL (Write-Ahead Logging) mode for SQLite.
    #[serde(default = "default_wal_mode")]
    pub wal_mode: bool,

    /// How long SQLite waits on a locked database before failing.
    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
            wal_mode: default_wal_mode(),
            busy_timeout_ms: default_busy_timeout_ms(),
        }
    }
}

fn default_database_path() -> String {
    dirs::data_dir()
        .map(|p| p.join("herald").join("herald.db"))
        .unwrap_or_else(|| std::path::PathBuf::from("herald.db"))
        .to_string_lossy()
        .to_string()
}

fn default_wal_mode() -> bool {
    true
}

fn default_busy_timeout_ms() -> u64 {
    5_000
}

/// Retry backoff strategy names accepted in config.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BackoffKind {
    Fixed,
    #[default]
    Exponential,
}

/// Dispatch engine defaults.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct DispatchConfig {
    /// Transport used when a message does not name one.
    #[serde(default = "default_transport")]
    pub default_transport: String,

    /// Attempts per queued job before it is marked failed.
    #[serde(default = "default_attempts")]
    pub default_attempts: u32,

    /// Backoff strategy between attempts.
    #[serde(default)]
    pub default_backoff: BackoffKind,

    /// Base backoff delay in milliseconds.
    #[serde(default = "default_backoff_delay_ms")]
    pub backoff_delay_ms: u64,

    /// Upper bound on the exponential backoff delay.
    #[serde(default = "default_max_backoff_ms")]
    pub max_backoff_ms: u64,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            default_transport: default_transport(),
            default_attempts: default_attempts(),
            default_backoff: BackoffKind::default(),
            backoff_delay_ms: default_backoff_delay_ms(),
            max_backoff_ms: default_max_backoff_ms(),
        }
    }
}

impl DispatchConfig {
    /// The configured default backoff as a job policy.
    pub fn backoff_policy(&self) -> BackoffPolicy {
        match self.default_backoff {
            BackoffKind::Fixed => BackoffPolicy::Fixed {
                delay_ms: self.backoff_delay_ms,
            },
            BackoffKind::Exponential => BackoffPolicy::Exponential {
                delay_ms: self.backoff_delay_ms,
                max_delay_ms: self.max_backoff_ms,
            },
        }
    }
}

fn default_transport() -> String {
    "log".to_string()
}

fn default_attempts() -> u32 {
    3
}

fn default_backoff_delay_ms() -> u64 {
    1_000
}

fn default_max_backoff_ms() -> u64 {
    300_000
}

/// Queue worker configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct WorkerConfig {
    /// Queue names this worker pulls from.
    #[serde(default = "default_queues")]
    pub queues: Vec<String>,

    /// Concurrent job loops per queue.
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,

    /// Sleep between polls of an empty queue.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// How long a claimed job stays locked before another worker may reclaim it.
    #[serde(default = "default_lock_timeout_secs")]
    pub lock_timeout_secs: u64,

    /// Time allowed for in-flight jobs to finish after a shutdown signal.
    #[serde(default = "default_shutdown_grace_secs")]
    pub shutdown_grace_secs: u64,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            queues: default_queues(),
            concurrency: default_concurrency(),
            poll_interval_ms: default_poll_interval_ms(),
            lock_timeout_secs: default_lock_timeout_secs(),
            shutdown_grace_secs: default_shutdown_grace_secs(),
        }
    }
}

fn default_queues() -> Vec<String> {
    vec!["email".to_string(), "sms".to_string(), "push".to_string()]
}

fn default_concurrency() -> usize {
    2
}

fn default_poll_interval_ms() -> u64 {
    500
}

fn default_lock_timeout_secs() -> u64 {
    300
}

fn default_shutdown_grace_secs() -> u64 {
    10
}

/// Log output configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct LoggingConfig {
    /// Logging level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Emit JSON lines instead of human-readable output.
    #[serde(default)]
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Built-in transport toggles.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct TransportsConfig {
    /// Per-transport enable overrides, keyed by identifier. Missing entries
    /// mean the built-in transport is enabled.
    #[serde(default)]
    pub enabled: BTreeMap<String, bool>,
}

impl TransportsConfig {
    /// Whether the named built-in transport should be registered.
    pub fn is_enabled(&self, name: &str) -> bool {
        self.enabled.get(name).copied().unwrap_or(true)
    }
}
