// SPDX-FileCopyrightText: 2026 Herald Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Adapter trait definitions for the external collaborators of the dispatch engine.
//!
//! All adapters extend the [`PluginAdapter`] base trait and use
//! `#[async_trait]` for dynamic dispatch compatibility.

pub mod adapter;
pub mod queue;
pub mod store;
pub mod transport;

pub use adapter::PluginAdapter;
pub use queue::JobQueue;
pub use store::MessageStore;
pub use transport::{Transport, TransportReceipt};
