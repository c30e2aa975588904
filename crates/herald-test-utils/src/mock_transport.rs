// SPDX-FileCopyrightText: 2026 Herald Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Mock transport adapter for deterministic testing.
//!
//! `MockTransport` pops scripted outcomes from a FIFO queue. When the queue
//! is empty every send succeeds with a receipt naming the transport.

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;
use herald_core::{
    AdapterType, HealthStatus, HeraldError, Message, PluginAdapter, Transport, TransportFailure,
    TransportReceipt,
};

use crate::lock;

/// A transport that records calls and replays scripted results.
pub struct MockTransport {
    name: String,
    script: Mutex<VecDeque<Result<TransportReceipt, TransportFailure>>>,
    calls: Mutex<Vec<Message>>,
}

impl MockTransport {
    /// Create a mock registered under `"mock"`.
    pub fn new() -> Self {
        Self::named("mock")
    }

    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            script: Mutex::new(VecDeque::new()),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Queue a successful outcome.
    pub fn push_ok(&self, receipt: TransportReceipt) {
        lock(&self.script).push_back(Ok(receipt));
    }

    /// Queue a failed outcome.
    pub fn push_failure(&self, failure: TransportFailure) {
        lock(&self.script).push_back(Err(failure));
    }

    /// Make the next `n` sends fail with `failure`.
    pub fn fail_next(&self, n: usize, failure: TransportFailure) {
        let mut script = lock(&self.script);
        for _ in 0..n {
            script.push_back(Err(failure.clone()));
        }
    }

    pub fn call_count(&self) -> usize {
        lock(&self.calls).len()
    }

    /// Every message passed to `send`, in call order.
    pub fn calls(&self) -> Vec<Message> {
        lock(&self.calls).clone()
    }
}

impl Default for MockTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PluginAdapter for MockTransport {
    fn name(&self) -> &str {
        &self.name
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
impl Transport for MockTransport {
    async fn send(&self, message: &Message) -> Result<TransportReceipt, TransportFailure> {
        lock(&self.calls).push(message.clone());
        lock(&self.script).pop_front().unwrap_or_else(|| {
            Ok(TransportReceipt::new(serde_json::json!({
                "transport": self.name,
                "id": message.id.as_str(),
            })))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use herald_core::{NewMessage, State};

    fn message() -> Message {
        NewMessage::new("a@x.com", "b@x.com", "hi").normalize().unwrap()
    }

    #[tokio::test]
    async fn replays_script_then_defaults_to_success() {
        let transport = MockTransport::new();
        transport.push_failure(TransportFailure::new("down").with_status(503));
        transport.push_ok(TransportReceipt::new(serde_json::json!({"n": 1})).with_state(State::Sent));

        let m = message();
        let first = transport.send(&m).await.unwrap_err();
        assert_eq!(first.status, Some(503));
        let second = transport.send(&m).await.unwrap();
        assert_eq!(second.state, Some(State::Sent));
        let third = transport.send(&m).await.unwrap();
        assert_eq!(third.payload["transport"], "mock");

        assert_eq!(transport.call_count(), 3);
    }

    #[test]
    fn named_mock_reports_its_name() {
        assert_eq!(MockTransport::named("smtp").name(), "smtp");
    }
}
