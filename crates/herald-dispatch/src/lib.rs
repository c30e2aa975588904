// SPDX-FileCopyrightText: 2026 Herald Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Message dispatch for Herald.
//!
//! [`DispatchEngine`] drives a record through queueing, sending and outcome
//! recording. [`Worker`] consumes the queue the engine writes to.

pub mod engine;
pub mod options;
pub mod queue_adapter;
pub mod shutdown;
pub mod worker;

pub use engine::DispatchEngine;
pub use options::{QueueOptions, Queued, RequeueTicket, ResendReport, SendOptions};
pub use queue_adapter::QueueAdapter;
pub use shutdown::install_signal_handler;
pub use worker::{Worker, WorkerSnapshot, WorkerStats};
