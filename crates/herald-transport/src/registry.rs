// SPDX-FileCopyrightText: 2026 Herald Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Transport registry.
//!
//! Maps transport identifiers to `Transport` implementations. The registry is
//! populated at startup and looked up by name at dispatch time.

use std::collections::HashMap;
use std::sync::Arc;

use herald_core::{HealthStatus, HeraldError, Transport};

/// Status of a transport in the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportStatus {
    /// Resolvable by the dispatch engine.
    Enabled,
    /// Registered but refused on resolution.
    Disabled,
}

impl std::fmt::Display for TransportStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TransportStatus::Enabled => write!(f, "enabled"),
            TransportStatus::Disabled => write!(f, "disabled"),
        }
    }
}

/// A single entry in the transport registry.
pub struct TransportEntry {
    pub transport: Arc<dyn Transport>,
    pub status: TransportStatus,
}

impl std::fmt::Debug for TransportEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransportEntry")
            .field("name", &self.transport.name())
            .field("version", &self.transport.version())
            .field("status", &self.status)
            .finish()
    }
}

/// Registry of transports keyed by identifier.
#[derive(Debug, Default)]
pub struct TransportRegistry {
    entries: HashMap<String, TransportEntry>,
}

impl TransportRegistry {
    /// Create a new empty registry.
    pub fn new() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }

    /// Register a transport under its own name, enabled.
    pub fn register(&mut self, transport: Arc<dyn Transport>) {
        let name = transport.name().to_string();
        self.register_as(name, transport, TransportStatus::Enabled);
    }

    /// Register a transport under an explicit identifier and status.
    ///
    /// Re-registering an identifier replaces the previous entry.
    pub fn register_as(
        &mut self,
        identifier: impl Into<String>,
        transport: Arc<dyn Transport>,
        status: TransportStatus,
    ) {
        self.entries
            .insert(identifier.into(), TransportEntry { transport, status });
    }

    /// Resolve an identifier to an enabled transport.
    ///
    /// Empty, unknown and disabled identifiers all yield
    /// [`HeraldError::Resolution`].
    pub fn resolve(&self, identifier: &str) -> Result<Arc<dyn Transport>, HeraldError> {
        let unresolved = || HeraldError::Resolution {
            transport: identifier.to_string(),
        };
        if identifier.trim().is_empty() {
            return Err(unresolved());
        }
        match self.entries.get(identifier) {
            Some(entry) if entry.status == TransportStatus::Enabled => {
                Ok(Arc::clone(&entry.transport))
            }
            _ => Err(unresolved()),
        }
    }

    /// Whether `identifier` would resolve.
    pub fn contains(&self, identifier: &str) -> bool {
        self.resolve(identifier).is_ok()
    }

    /// Get an entry by identifier regardless of status.
    pub fn get(&self, identifier: &str) -> Option<&TransportEntry> {
        self.entries.get(identifier)
    }

    /// Toggle a transport's status.
    pub fn set_enabled(&mut self, identifier: &str, enabled: bool) -> Result<(), HeraldError> {
        let entry = self
            .entries
            .get_mut(identifier)
            .ok_or_else(|| HeraldError::Resolution {
                transport: identifier.to_string(),
            })?;
        entry.status = if enabled {
            TransportStatus::Enabled
        } else {
            TransportStatus::Disabled
        };
        Ok(())
    }

    /// Registered identifiers, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.entries.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Health of every enabled transport, sorted by identifier.
    pub async fn health(&self) -> Vec<(String, HealthStatus)> {
        let mut report = Vec::new();
        for name in self.names() {
            let Some(entry) = self.entries.get(name) else {
                continue;
            };
            if entry.status != TransportStatus::Enabled {
                continue;
            }
            let status = match entry.transport.health_check().await {
                Ok(status) => status,
                Err(e) => HealthStatus::Unhealthy(e.to_string()),
            };
            report.push((name.to_string(), status));
        }
        report
    }

    /// Shut down every registered transport, continuing past failures.
    pub async fn shutdown_all(&self) -> Vec<(String, HeraldError)> {
        let mut failures = Vec::new();
        for (name, entry) in &self.entries {
            if let Err(e) = entry.transport.shutdown().await {
                tracing::warn!(transport = %name, error = %e, "transport shutdown failed");
                failures.push((name.clone(), e));
            }
        }
        failures
    }

    /// Returns the number of registered transports.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if no transports are registered.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builtin::{LogTransport, NullTransport};

    fn registry() -> TransportRegistry {
        let mut registry = TransportRegistry::new();
        registry.register(Arc::new(LogTransport::new()));
        registry.register(Arc::new(NullTransport::new()));
        registry
    }

    #[test]
    fn register_and_resolve_roundtrip() {
        let registry = registry();
        let transport = registry.resolve("log").unwrap();
        assert_eq!(transport.name(), "log");
        assert!(registry.contains("null"));
    }

    #[test]
    fn unknown_and_empty_identifiers_fail_resolution() {
        let registry = registry();
        for id in ["", "  ", "carrier-pigeon"] {
            match registry.resolve(id) {
                Err(HeraldError::Resolution { transport }) => assert_eq!(transport, id),
                Err(other) => panic!("unexpected error {other}"),
                Ok(_) => panic!("`{id}` should not resolve"),
            }
        }
    }

    #[test]
    fn disabled_transport_does_not_resolve() {
        let mut registry = registry();
        registry.set_enabled("log", false).unwrap();
        assert!(registry.resolve("log").is_err());
        assert_eq!(registry.get("log").unwrap().status, TransportStatus::Disabled);

        registry.set_enabled("log", true).unwrap();
        assert!(registry.resolve("log").is_ok());
        assert!(registry.set_enabled("nope", true).is_err());
    }

    #[test]
    fn alias_registration() {
        let mut registry = TransportRegistry::new();
        registry.register_as(
            "transports/email",
            Arc::new(LogTransport::new()),
            TransportStatus::Enabled,
        );
        assert!(registry.resolve("transports/email").is_ok());
        assert!(registry.resolve("log").is_err());
    }

    #[test]
    fn names_are_sorted() {
        let registry = registry();
        assert_eq!(registry.names(), vec!["log", "null"]);
        assert_eq!(registry.len(), 2);
        assert!(!registry.is_empty());
    }

    #[tokio::test]
    async fn health_reports_enabled_transports() {
        let mut registry = registry();
        registry.set_enabled("null", false).unwrap();
        let report = registry.health().await;
        assert_eq!(report, vec![("log".to_string(), HealthStatus::Healthy)]);
        assert!(registry.shutdown_all().await.is_empty());
    }
}
