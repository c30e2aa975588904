// SPDX-FileCopyrightText: 2026 Herald Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Transport resolution for Herald.
//!
//! The dispatch engine never loads transports by path. Everything it can send
//! through is registered up front in a [`TransportRegistry`] and resolved by
//! identifier at send time.

pub mod builtin;
pub mod registry;

pub use builtin::{builtin_registry, LogTransport, NullTransport, BUILTIN_TRANSPORTS};
pub use registry::{TransportEntry, TransportRegistry, TransportStatus};
