// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! RTPS identity types: guid prefix, entity id, GUID.

use std::fmt;
use std::sync::atomic::{AtomicU32, Ordering};

use crate::config::VENDOR_ID;

/// 12 opaque bytes identifying a participant within a DDS domain.
///
/// Unique per participant instance; every endpoint created by a participant
/// shares its prefix.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Default)]
pub struct GuidPrefix(pub [u8; 12]);

impl GuidPrefix {
    /// All-zero prefix (invalid/placeholder).
    pub const UNKNOWN: GuidPrefix = GuidPrefix([0; 12]);

    /// Generate a prefix unique to this participant instance.
    ///
    /// # Layout
    /// - Bytes 0-1: vendor id
    /// - Bytes 2-5: process id (little-endian)
    /// - Bytes 6-9: per-process instance counter (little-endian)
    /// - Bytes 10-11: low bits of a monotonic clock sample
    pub fn generate() -> Self {
        static INSTANCE_COUNTER: AtomicU32 = AtomicU32::new(0);

        let mut prefix = [0u8; 12];
        prefix[0] = VENDOR_ID[0];
        prefix[1] = VENDOR_ID[1];
        prefix[2..6].copy_from_slice(&std::process::id().to_le_bytes());
        let instance = INSTANCE_COUNTER.fetch_add(1, Ordering::Relaxed);
        prefix[6..10].copy_from_slice(&instance.to_le_bytes());
        let nanos = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.subsec_nanos())
            .unwrap_or(0);
        prefix[10..12].copy_from_slice(&(nanos as u16).to_le_bytes());
        Self(prefix)
    }

    #[must_use]
    pub fn as_bytes(&self) -> &[u8; 12] {
        &self.0
    }
}

impl fmt::Display for GuidPrefix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, byte) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, ".")?;
            }
            write!(f, "{:02x}", byte)?;
        }
        Ok(())
    }
}

impl fmt::Debug for GuidPrefix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "GuidPrefix({})", self)
    }
}

/// 4 bytes identifying an endpoint within a participant.
///
/// Wire order is `[b0, b1, b2, kind]`: byte 3 encodes the endpoint kind and
/// keyed-ness, bytes 0..2 carry the instance counter (little-endian low 24
/// bits). Built-in discovery endpoints use reserved constants.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Default)]
pub struct EntityId(pub [u8; 4]);

// Kind octets for user endpoints (RTPS Sec.9.3.1.2).
pub(crate) const KIND_WRITER_NO_KEY: u8 = 0x03;
pub(crate) const KIND_WRITER_WITH_KEY: u8 = 0x02;
pub(crate) const KIND_READER_NO_KEY: u8 = 0x04;
pub(crate) const KIND_READER_WITH_KEY: u8 = 0x07;

impl EntityId {
    /// Unknown entity id (all zeros).
    pub const UNKNOWN: EntityId = EntityId([0x00, 0x00, 0x00, 0x00]);

    /// The participant itself.
    pub const PARTICIPANT: EntityId = EntityId([0x00, 0x00, 0x01, 0xC1]);

    /// SPDP built-in participant writer/reader.
    pub const SPDP_WRITER: EntityId = EntityId([0x00, 0x01, 0x00, 0xC2]);
    pub const SPDP_READER: EntityId = EntityId([0x00, 0x01, 0x00, 0xC7]);

    /// SEDP publications writer/reader.
    pub const SEDP_PUB_WRITER: EntityId = EntityId([0x00, 0x00, 0x03, 0xC2]);
    pub const SEDP_PUB_READER: EntityId = EntityId([0x00, 0x00, 0x03, 0xC7]);

    /// SEDP subscriptions writer/reader.
    pub const SEDP_SUB_WRITER: EntityId = EntityId([0x00, 0x00, 0x04, 0xC2]);
    pub const SEDP_SUB_READER: EntityId = EntityId([0x00, 0x00, 0x04, 0xC7]);

    /// Participant message (liveliness) writer/reader.
    pub const LIVELINESS_WRITER: EntityId = EntityId([0x00, 0x02, 0x00, 0xC2]);
    pub const LIVELINESS_READER: EntityId = EntityId([0x00, 0x02, 0x00, 0xC7]);

    /// Build a user entity id from an instance counter and a kind octet.
    ///
    /// The counter's low 24 bits land in bytes 0..2, least significant first.
    #[must_use]
    pub fn from_counter(idnum: u32, kind: u8) -> Self {
        Self([
            (idnum & 0xFF) as u8,
            ((idnum >> 8) & 0xFF) as u8,
            ((idnum >> 16) & 0xFF) as u8,
            kind,
        ])
    }

    /// The kind octet (byte 3).
    #[must_use]
    pub fn kind_octet(&self) -> u8 {
        self.0[3]
    }

    /// Reserved built-in ids carry 0xC0 in the two top bits of the kind octet.
    #[must_use]
    pub fn is_builtin(&self) -> bool {
        self.0[3] & 0xC0 == 0xC0
    }

    #[must_use]
    pub fn is_unknown(&self) -> bool {
        *self == Self::UNKNOWN
    }

    #[must_use]
    pub fn as_bytes(&self) -> &[u8; 4] {
        &self.0
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:02x}.{:02x}.{:02x}.{:02x}",
            self.0[0], self.0[1], self.0[2], self.0[3]
        )
    }
}

impl fmt::Debug for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EntityId({})", self)
    }
}

/// RTPS GUID: 16-byte globally unique endpoint identifier.
///
/// # Display Format
/// Hex with dots: "01.af.ac.10.00.00.00.00.00.00.00.01|00.00.01.c1"
#[derive(Copy, Clone, Eq, PartialEq, Hash, Default)]
pub struct GUID {
    pub prefix: GuidPrefix,
    pub entity_id: EntityId,
}

impl GUID {
    #[must_use]
    pub fn new(prefix: GuidPrefix, entity_id: EntityId) -> Self {
        Self { prefix, entity_id }
    }

    /// Reassemble from 16 raw bytes (prefix first, entity id last).
    #[must_use]
    pub fn from_bytes(bytes: [u8; 16]) -> Self {
        let mut prefix = [0u8; 12];
        let mut entity_id = [0u8; 4];
        prefix.copy_from_slice(&bytes[0..12]);
        entity_id.copy_from_slice(&bytes[12..16]);
        Self {
            prefix: GuidPrefix(prefix),
            entity_id: EntityId(entity_id),
        }
    }

    #[must_use]
    pub fn as_bytes(&self) -> [u8; 16] {
        let mut bytes = [0u8; 16];
        bytes[0..12].copy_from_slice(&self.prefix.0);
        bytes[12..16].copy_from_slice(&self.entity_id.0);
        bytes
    }

    #[must_use]
    pub fn is_zero(&self) -> bool {
        self.prefix == GuidPrefix::UNKNOWN && self.entity_id.is_unknown()
    }
}

impl fmt::Display for GUID {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}|{}", self.prefix, self.entity_id)
    }
}

impl fmt::Debug for GUID {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "GUID({})", self)
    }
}
