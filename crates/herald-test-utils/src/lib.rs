// SPDX-FileCopyrightText: 2026 Herald Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test utilities for Herald integration tests.
//!
//! Provides in-memory adapters and test harness infrastructure for fast,
//! deterministic tests without a database file or a real transport.
//!
//! # Components
//!
//! - [`MemoryStore`] - In-memory message store with failure injection
//! - [`MemoryQueue`] - In-memory job queue with the same claim semantics as SQLite
//! - [`MockTransport`] - Scripted transport that records every send
//! - [`TestHarness`] - SQLite-backed engine wired with the mock transport

pub mod harness;
pub mod memory_queue;
pub mod memory_store;
pub mod mock_transport;

pub use harness::{TestHarness, TestHarnessBuilder};
pub use memory_queue::MemoryQueue;
pub use memory_store::MemoryStore;
pub use mock_transport::MockTransport;

use std::sync::{Mutex, MutexGuard};

/// Lock a mutex, recovering the data if a panicking test poisoned it.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
