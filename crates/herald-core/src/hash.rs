// SPDX-FileCopyrightText: 2026 Herald Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Dedup fingerprint over the semantically significant message fields.
//!
//! The fingerprint covers exactly `{type, direction, from, to, transport,
//! queueName, body, priority}`, in that order. Every field is written with a
//! tag byte and a length prefix before it is fed to SHA-256, so no two
//! distinct projections share an encoding (`to = ["ab"]` vs `["a", "b"]`).

use sha2::{Digest, Sha256};

use crate::types::{Direction, MessageType, Priority};

/// The projection of a message that the dedup hash is computed over.
#[derive(Debug, Clone, Copy)]
pub struct Fingerprint<'a> {
    pub message_type: MessageType,
    pub direction: Direction,
    pub from: &'a str,
    pub to: &'a [String],
    pub transport: &'a str,
    pub queue_name: &'a str,
    pub body: &'a str,
    pub priority: Priority,
}

impl Fingerprint<'_> {
    /// Compute the hex-encoded SHA-256 fingerprint.
    pub fn compute(&self) -> String {
        let mut hasher = Sha256::new();
        write_str(&mut hasher, b't', &self.message_type.to_string());
        write_str(&mut hasher, b'd', &self.direction.to_string());
        write_str(&mut hasher, b'f', self.from);
        write_len(&mut hasher, b'r', self.to.len());
        for recipient in self.to {
            write_str(&mut hasher, b'a', recipient);
        }
        write_str(&mut hasher, b'x', self.transport);
        write_str(&mut hasher, b'q', self.queue_name);
        write_str(&mut hasher, b'b', self.body);
        write_str(&mut hasher, b'p', &self.priority.to_string());
        hex::encode(hasher.finalize())
    }
}

fn write_len(hasher: &mut Sha256, tag: u8, len: usize) {
    hasher.update([tag]);
    hasher.update((len as u64).to_le_bytes());
}

fn write_str(hasher: &mut Sha256, tag: u8, value: &str) {
    write_len(hasher, tag, value.len());
    hasher.update(value.as_bytes());
}
