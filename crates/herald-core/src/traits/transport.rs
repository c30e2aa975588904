// SPDX-FileCopyrightText: 2026 Herald Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Transport trait for channel senders (email, SMS, push).

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::TransportFailure;
use crate::message::Message;
use crate::traits::adapter::PluginAdapter;
use crate::types::State;

/// What a transport reports back after accepting a message.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TransportReceipt {
    /// Overrides the post-send state when present (defaults to `Delivered`).
    #[serde(default)]
    pub state: Option<State>,
    /// Transport-specific payload stored as the message `result`.
    #[serde(default)]
    pub payload: serde_json::Value,
}

impl TransportReceipt {
    pub fn new(payload: serde_json::Value) -> Self {
        Self {
            state: None,
            payload,
        }
    }

    pub fn with_state(mut self, state: State) -> Self {
        self.state = Some(state);
        self
    }
}

/// A pluggable sender for one delivery channel.
#[async_trait]
pub trait Transport: PluginAdapter {
    /// Deliver the message, or describe why it could not be delivered.
    async fn send(&self, message: &Message) -> Result<TransportReceipt, TransportFailure>;
}
