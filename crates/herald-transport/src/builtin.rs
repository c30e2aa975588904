// SPDX-FileCopyrightText: 2026 Herald Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Transports compiled into the binary.
//!
//! `log` writes each message to the tracing output and reports it delivered.
//! `null` accepts everything silently and reports it sent.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use herald_config::TransportsConfig;
use herald_core::{
    AdapterType, HealthStatus, HeraldError, Message, PluginAdapter, State, Transport,
    TransportFailure, TransportReceipt,
};
use tracing::info;

use crate::registry::{TransportRegistry, TransportStatus};

/// Identifiers of the built-in transports.
pub const BUILTIN_TRANSPORTS: &[&str] = &["log", "null"];

/// Logs every message it is asked to send.
#[derive(Debug, Default)]
pub struct LogTransport {
    sent: AtomicU64,
}

impl LogTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of messages logged so far.
    pub fn sent_count(&self) -> u64 {
        self.sent.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl PluginAdapter for LogTransport {
    fn name(&self) -> &str {
        "log"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Transport
    }

    async fn health_check(&self) -> Result<HealthStatus, HeraldError> {
        Ok(HealthStatus::Healthy)
    }

    async fn shutdown(&self) -> Result<(), HeraldError> {
        Ok(())
    }
}

#[async_trait]
impl Transport for LogTransport {
    async fn send(&self, message: &Message) -> Result<TransportReceipt, TransportFailure> {
        let sequence = self.sent.fetch_add(1, Ordering::Relaxed) + 1;
        info!(
            message_id = %message.id,
            kind = %message.message_type,
            from = %message.from,
            to = ?message.to,
            subject = message.subject.as_deref().unwrap_or(""),
            bytes = message.body.len(),
            "message delivered to log"
        );
        Ok(TransportReceipt::new(serde_json::json!({
            "transport": "log",
            "sequence": sequence,
            "recipients": message.to.len() + message.cc.len() + message.bcc.len(),
        })))
    }
}

/// Accepts every message without side effects.
#[derive(Debug, Default)]
pub struct NullTransport;

impl NullTransport {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl PluginAdapter for NullTransport {
    fn name(&self) -> &str {
        "null"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Transport
    }

    async fn health_check(&self) -> Result<HealthStatus, HeraldError> {
        Ok(HealthStatus::Healthy)
    }

    async fn shutdown(&self) -> Result<(), HeraldError> {
        Ok(())
    }
}

#[async_trait]
impl Transport for NullTransport {
    async fn send(&self, _message: &Message) -> Result<TransportReceipt, TransportFailure> {
        Ok(TransportReceipt::new(serde_json::Value::Null).with_state(State::Sent))
    }
}

/// Registry holding the built-in transports, with statuses taken from config.
pub fn builtin_registry(config: &TransportsConfig) -> TransportRegistry {
    let mut registry = TransportRegistry::new();
    let builtins: [Arc<dyn Transport>; 2] =
        [Arc::new(LogTransport::new()), Arc::new(NullTransport::new())];
    for transport in builtins {
        let name = transport.name().to_string();
        let status = if config.is_enabled(&name) {
            TransportStatus::Enabled
        } else {
            TransportStatus::Disabled
        };
        registry.register_as(name, transport, status);
    }
    registry
}
