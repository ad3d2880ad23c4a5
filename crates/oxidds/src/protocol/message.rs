// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Outgoing RTPS message construction.
//!
//! A `CdrMessage` is a contiguous byte buffer: a 20-byte RTPS header followed
//! by submessages. The send path serializes nothing itself, it just owns the
//! buffer and hands it to a sender resource.

use crate::config::{RTPS_MAGIC, RTPS_VERSION_MAJOR, RTPS_VERSION_MINOR, VENDOR_ID};
use crate::core::types::{EntityId, GuidPrefix};
use crate::protocol::{SUBMSG_ACKNACK, SUBMSG_DATA, SUBMSG_GAP, SUBMSG_HEARTBEAT};

/// RTPS message header length: magic(4) + version(2) + vendor(2) + prefix(12).
pub const HEADER_LEN: usize = 20;

/// Growable RTPS message buffer.
pub struct CdrMessage {
    buf: Vec<u8>,
}

impl CdrMessage {
    #[must_use]
    pub fn new() -> Self {
        Self { buf: Vec::new() }
    }

    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buf: Vec::with_capacity(capacity),
        }
    }

    /// Reset to empty without releasing capacity.
    pub fn reset(&mut self) {
        self.buf.clear();
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.buf
    }

    /// Append the RTPS message header for the sending participant.
    pub fn add_header(&mut self, prefix: &GuidPrefix) {
        self.buf.extend_from_slice(RTPS_MAGIC);
        self.buf.push(RTPS_VERSION_MAJOR);
        self.buf.push(RTPS_VERSION_MINOR);
        self.buf.extend_from_slice(&VENDOR_ID);
        self.buf.extend_from_slice(prefix.as_bytes());
    }

    fn add_submessage_header(&mut self, id: u8, flags: u8, content_len: usize) {
        self.buf.push(id);
        self.buf.push(flags);
        // Content length must fit the 16-bit octetsToNextHeader field.
        let octets = u16::try_from(content_len).unwrap_or(u16::MAX);
        self.buf.extend_from_slice(&octets.to_le_bytes());
    }

    fn add_sequence_number(&mut self, sequence: u64) {
        let high = (sequence >> 32) as i32;
        let low = sequence as u32;
        self.buf.extend_from_slice(&high.to_le_bytes());
        self.buf.extend_from_slice(&low.to_le_bytes());
    }

    /// Append a DATA submessage (little-endian, no inline QoS).
    pub fn add_data(
        &mut self,
        reader_id: EntityId,
        writer_id: EntityId,
        sequence: u64,
        payload: &[u8],
    ) {
        // extraFlags(2) + octetsToInlineQos(2) + entityIds(8) + seqNum(8)
        let content_len = 20 + payload.len();
        self.add_submessage_header(SUBMSG_DATA, 0x05, content_len);
        self.buf.extend_from_slice(&0u16.to_le_bytes()); // extraFlags
        self.buf.extend_from_slice(&16u16.to_le_bytes()); // octetsToInlineQos
        self.buf.extend_from_slice(reader_id.as_bytes());
        self.buf.extend_from_slice(writer_id.as_bytes());
        self.add_sequence_number(sequence);
        self.buf.extend_from_slice(payload);
    }

    /// Append a HEARTBEAT submessage announcing the writer's available range.
    pub fn add_heartbeat(
        &mut self,
        reader_id: EntityId,
        writer_id: EntityId,
        first_seq: u64,
        last_seq: u64,
        count: u32,
    ) {
        self.add_submessage_header(SUBMSG_HEARTBEAT, 0x01, 28);
        self.buf.extend_from_slice(reader_id.as_bytes());
        self.buf.extend_from_slice(writer_id.as_bytes());
        self.add_sequence_number(first_seq);
        self.add_sequence_number(last_seq);
        self.buf.extend_from_slice(&count.to_le_bytes());
    }

    /// Append an ACKNACK submessage acknowledging everything below `base`.
    pub fn add_acknack(
        &mut self,
        reader_id: EntityId,
        writer_id: EntityId,
        base_seq: u64,
        count: u32,
    ) {
        // readerSNState with an empty bitmap: base(8) + numBits(4)
        self.add_submessage_header(SUBMSG_ACKNACK, 0x01, 24);
        self.buf.extend_from_slice(reader_id.as_bytes());
        self.buf.extend_from_slice(writer_id.as_bytes());
        self.add_sequence_number(base_seq);
        self.buf.extend_from_slice(&0u32.to_le_bytes()); // numBits
        self.buf.extend_from_slice(&count.to_le_bytes());
    }

    /// Append a GAP submessage marking `[gap_start, gap_list_base)` as not
    /// relevant for the addressed reader.
    pub fn add_gap(
        &mut self,
        reader_id: EntityId,
        writer_id: EntityId,
        gap_start: u64,
        gap_list_base: u64,
    ) {
        self.add_submessage_header(SUBMSG_GAP, 0x01, 28);
        self.buf.extend_from_slice(reader_id.as_bytes());
        self.buf.extend_from_slice(writer_id.as_bytes());
        self.add_sequence_number(gap_start);
        self.add_sequence_number(gap_list_base);
        self.buf.extend_from_slice(&0u32.to_le_bytes()); // numBits
    }
}

impl Default for CdrMessage {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_layout() {
        let mut msg = CdrMessage::new();
        msg.add_header(&GuidPrefix([1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12]));
        let bytes = msg.as_bytes();
        assert_eq!(bytes.len(), HEADER_LEN);
        assert_eq!(&bytes[0..4], b"RTPS");
        assert_eq!(bytes[4], RTPS_VERSION_MAJOR);
        assert_eq!(&bytes[8..20], &[1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12]);
    }

    #[test]
    fn test_data_submessage_layout() {
        let mut msg = CdrMessage::new();
        msg.add_header(&GuidPrefix::UNKNOWN);
        msg.add_data(EntityId::UNKNOWN, EntityId::SPDP_WRITER, 7, b"payload");
        let bytes = msg.as_bytes();
        assert_eq!(bytes[20], SUBMSG_DATA);
        assert_eq!(bytes[21], 0x05);
        let octets = u16::from_le_bytes([bytes[22], bytes[23]]);
        assert_eq!(octets as usize, 20 + b"payload".len());
        // Writer entity id sits after extraFlags/otiq/readerId.
        assert_eq!(&bytes[32..36], EntityId::SPDP_WRITER.as_bytes());
        // Sequence number low word.
        assert_eq!(u32::from_le_bytes([bytes[40], bytes[41], bytes[42], bytes[43]]), 7);
        assert_eq!(&bytes[44..], b"payload");
    }

    #[test]
    fn test_reset_keeps_capacity() {
        let mut msg = CdrMessage::with_capacity(256);
        msg.add_header(&GuidPrefix::UNKNOWN);
        msg.reset();
        assert!(msg.is_empty());
        assert!(msg.as_bytes().is_empty());
    }
}
