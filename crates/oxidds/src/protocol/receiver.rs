// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Inbound RTPS message processing.
//!
//! One `MessageReceiver` lives inside each receiver control block. It copies
//! the received datagram into its scratch area, validates the RTPS header,
//! walks the submessages and delivers decoded events to the block's
//! associated endpoints, resolved against the endpoint registry so a
//! concurrently deleted endpoint is simply skipped.
//!
//! Decode errors are logged and the remainder of the message is dropped;
//! they never take the listener loop down.

use crate::core::types::{EntityId, GuidPrefix, Locator, GUID};
use crate::participant::registry::EndpointRegistry;
use crate::protocol::{
    FLAG_ENDIANNESS, SUBMSG_ACKNACK, SUBMSG_DATA, SUBMSG_GAP, SUBMSG_HEARTBEAT, SUBMSG_INFO_DST,
    SUBMSG_INFO_TS,
};

/// A decoded submessage, as delivered to an endpoint.
#[derive(Debug)]
pub enum RtpsEvent<'a> {
    Data {
        writer: GUID,
        sequence: u64,
        payload: &'a [u8],
    },
    Heartbeat {
        writer: GUID,
        first_seq: u64,
        last_seq: u64,
        count: u32,
    },
    AckNack {
        reader: GUID,
        base_seq: u64,
        count: u32,
    },
    Gap {
        writer: GUID,
        gap_start: u64,
        gap_list_base: u64,
    },
}

/// Per-receiver decoded-message scratch area and dispatch logic.
pub struct MessageReceiver {
    scratch: Vec<u8>,
    capacity: usize,
}

impl MessageReceiver {
    /// `buffer_size` is the participant's `listen_socket_buffer_size`.
    #[must_use]
    pub fn new(buffer_size: u32) -> Self {
        let capacity = buffer_size as usize;
        Self {
            scratch: Vec::with_capacity(capacity),
            capacity,
        }
    }

    /// Process one datagram: copy into the scratch, validate, dispatch.
    ///
    /// `writers` and `readers` are the control block's associated endpoint
    /// ids, snapshotted by the caller under the block mutex.
    pub fn process(
        &mut self,
        participant_prefix: &GuidPrefix,
        source: &Locator,
        datagram: &[u8],
        writers: &[EntityId],
        readers: &[EntityId],
        registry: &EndpointRegistry,
    ) {
        if datagram.len() > self.capacity {
            log::debug!(
                "[RECEIVER] dropping oversized datagram ({} > {} bytes) from {}",
                datagram.len(),
                self.capacity,
                source
            );
            return;
        }
        self.scratch.clear();
        self.scratch.extend_from_slice(datagram);

        let Some(source_prefix) = validate_header(&self.scratch) else {
            log::debug!("[RECEIVER] invalid RTPS header from {}", source);
            return;
        };
        if source_prefix == *participant_prefix {
            // Our own multicast traffic looping back.
            return;
        }

        let mut offset = 20;
        while offset + 4 <= self.scratch.len() {
            let id = self.scratch[offset];
            let flags = self.scratch[offset + 1];
            let le = flags & FLAG_ENDIANNESS != 0;
            let octets = read_u16(&self.scratch[offset + 2..offset + 4], le) as usize;
            let content_start = offset + 4;
            // octetsToNextHeader == 0 means the submessage extends to the end
            // of the message and is the last one.
            let content_end = if octets == 0 {
                self.scratch.len()
            } else {
                content_start + octets
            };
            if content_end > self.scratch.len() {
                log::debug!(
                    "[RECEIVER] truncated submessage 0x{:02x} from {}, dropping rest",
                    id,
                    source
                );
                return;
            }
            let content = &self.scratch[content_start..content_end];

            match id {
                SUBMSG_DATA => {
                    dispatch_data(&source_prefix, content, le, source, readers, registry);
                }
                SUBMSG_HEARTBEAT => {
                    dispatch_heartbeat(&source_prefix, content, le, source, readers, registry);
                }
                SUBMSG_GAP => {
                    dispatch_gap(&source_prefix, content, le, source, readers, registry);
                }
                SUBMSG_ACKNACK => {
                    dispatch_acknack(&source_prefix, content, le, source, writers, registry);
                }
                SUBMSG_INFO_TS | SUBMSG_INFO_DST => {
                    // Context submessages carry no endpoint-visible payload
                    // at this layer.
                }
                other => {
                    log::debug!("[RECEIVER] skipping submessage 0x{:02x}", other);
                }
            }

            if octets == 0 {
                break;
            }
            offset = content_end;
        }
    }
}

/// Validate the 20-byte RTPS header and extract the sender's guid prefix.
fn validate_header(data: &[u8]) -> Option<GuidPrefix> {
    if data.len() < 20 {
        return None;
    }
    if &data[0..4] != crate::config::RTPS_MAGIC {
        return None;
    }
    if data[4] != crate::config::RTPS_VERSION_MAJOR {
        return None;
    }
    let mut prefix = [0u8; 12];
    prefix.copy_from_slice(&data[8..20]);
    Some(GuidPrefix(prefix))
}

fn read_u16(bytes: &[u8], le: bool) -> u16 {
    let pair = [bytes[0], bytes[1]];
    if le {
        u16::from_le_bytes(pair)
    } else {
        u16::from_be_bytes(pair)
    }
}

fn read_u32(bytes: &[u8], le: bool) -> u32 {
    let quad = [bytes[0], bytes[1], bytes[2], bytes[3]];
    if le {
        u32::from_le_bytes(quad)
    } else {
        u32::from_be_bytes(quad)
    }
}

/// SequenceNumber_t: high i32 + low u32. Negative highs are invalid.
fn read_sequence(bytes: &[u8], le: bool) -> Option<u64> {
    let high = read_u32(&bytes[0..4], le) as i32;
    let low = read_u32(&bytes[4..8], le);
    if high < 0 {
        return None;
    }
    Some(((high as u64) << 32) | u64::from(low))
}

fn entity_id_at(bytes: &[u8]) -> EntityId {
    EntityId([bytes[0], bytes[1], bytes[2], bytes[3]])
}

/// Deliver an event to every associated reader it addresses.
fn deliver_to_readers(
    event: &RtpsEvent<'_>,
    addressed: EntityId,
    writer_id: EntityId,
    source: &Locator,
    readers: &[EntityId],
    registry: &EndpointRegistry,
) {
    for id in readers {
        let Some(reader) = registry.reader_by_id(*id) else {
            continue;
        };
        if !addressed.is_unknown() && addressed != *id {
            continue;
        }
        // Built-in readers only accept traffic from their trusted writer.
        let trusted = reader.trusted_writer();
        if !trusted.is_unknown() && trusted != writer_id {
            continue;
        }
        reader.deliver(event, source);
    }
}

fn dispatch_data(
    source_prefix: &GuidPrefix,
    content: &[u8],
    le: bool,
    source: &Locator,
    readers: &[EntityId],
    registry: &EndpointRegistry,
) {
    if content.len() < 20 {
        log::debug!("[RECEIVER] short DATA submessage from {}", source);
        return;
    }
    let octets_to_inline_qos = read_u16(&content[2..4], le) as usize;
    let reader_id = entity_id_at(&content[4..8]);
    let writer_id = entity_id_at(&content[8..12]);
    let Some(sequence) = read_sequence(&content[12..20], le) else {
        log::debug!("[RECEIVER] invalid DATA sequence number from {}", source);
        return;
    };
    // Payload begins octetsToInlineQos bytes after that field's own end.
    let payload_start = 4 + octets_to_inline_qos;
    if payload_start > content.len() {
        log::debug!("[RECEIVER] DATA payload offset out of range from {}", source);
        return;
    }
    let event = RtpsEvent::Data {
        writer: GUID::new(*source_prefix, writer_id),
        sequence,
        payload: &content[payload_start..],
    };
    deliver_to_readers(&event, reader_id, writer_id, source, readers, registry);
}

fn dispatch_heartbeat(
    source_prefix: &GuidPrefix,
    content: &[u8],
    le: bool,
    source: &Locator,
    readers: &[EntityId],
    registry: &EndpointRegistry,
) {
    if content.len() < 28 {
        log::debug!("[RECEIVER] short HEARTBEAT submessage from {}", source);
        return;
    }
    let reader_id = entity_id_at(&content[0..4]);
    let writer_id = entity_id_at(&content[4..8]);
    let (Some(first_seq), Some(last_seq)) = (
        read_sequence(&content[8..16], le),
        read_sequence(&content[16..24], le),
    ) else {
        log::debug!("[RECEIVER] invalid HEARTBEAT sequence from {}", source);
        return;
    };
    let count = read_u32(&content[24..28], le);
    let event = RtpsEvent::Heartbeat {
        writer: GUID::new(*source_prefix, writer_id),
        first_seq,
        last_seq,
        count,
    };
    deliver_to_readers(&event, reader_id, writer_id, source, readers, registry);
}

fn dispatch_gap(
    source_prefix: &GuidPrefix,
    content: &[u8],
    le: bool,
    source: &Locator,
    readers: &[EntityId],
    registry: &EndpointRegistry,
) {
    if content.len() < 28 {
        log::debug!("[RECEIVER] short GAP submessage from {}", source);
        return;
    }
    let reader_id = entity_id_at(&content[0..4]);
    let writer_id = entity_id_at(&content[4..8]);
    let (Some(gap_start), Some(gap_list_base)) = (
        read_sequence(&content[8..16], le),
        read_sequence(&content[16..24], le),
    ) else {
        log::debug!("[RECEIVER] invalid GAP sequence from {}", source);
        return;
    };
    let event = RtpsEvent::Gap {
        writer: GUID::new(*source_prefix, writer_id),
        gap_start,
        gap_list_base,
    };
    deliver_to_readers(&event, reader_id, writer_id, source, readers, registry);
}

fn dispatch_acknack(
    source_prefix: &GuidPrefix,
    content: &[u8],
    le: bool,
    source: &Locator,
    writers: &[EntityId],
    registry: &EndpointRegistry,
) {
    if content.len() < 24 {
        log::debug!("[RECEIVER] short ACKNACK submessage from {}", source);
        return;
    }
    let reader_id = entity_id_at(&content[0..4]);
    let writer_id = entity_id_at(&content[4..8]);
    let Some(base_seq) = read_sequence(&content[8..16], le) else {
        log::debug!("[RECEIVER] invalid ACKNACK sequence from {}", source);
        return;
    };
    let num_bits = read_u32(&content[16..20], le) as usize;
    let bitmap_words = num_bits.div_ceil(32);
    let count_offset = 20 + bitmap_words * 4;
    if count_offset + 4 > content.len() {
        log::debug!("[RECEIVER] ACKNACK bitmap out of range from {}", source);
        return;
    }
    let count = read_u32(&content[count_offset..count_offset + 4], le);

    let event = RtpsEvent::AckNack {
        reader: GUID::new(*source_prefix, reader_id),
        base_seq,
        count,
    };
    for id in writers {
        let Some(writer) = registry.writer_by_id(*id) else {
            continue;
        };
        if !writer_id.is_unknown() && writer_id != *id {
            continue;
        }
        writer.deliver(&event, source);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use crate::core::types::{EndpointAttributes, Locator};
    use crate::participant::endpoint::{LocalEndpoint, ReaderHistory, WriterHistory};
    use crate::protocol::CdrMessage;

    const LOCAL_PREFIX: GuidPrefix = GuidPrefix([1; 12]);
    const REMOTE_PREFIX: GuidPrefix = GuidPrefix([9; 12]);

    fn source() -> Locator {
        Locator::udpv4([127, 0, 0, 1], 4000)
    }

    fn registry_with_reader(
        id: EntityId,
        trusted: EntityId,
    ) -> (EndpointRegistry, Arc<LocalEndpoint>) {
        let registry = EndpointRegistry::new();
        let reader = Arc::new(LocalEndpoint::new_reader(
            GUID::new(LOCAL_PREFIX, id),
            EndpointAttributes::best_effort_reader(),
            ReaderHistory::default(),
            None,
            trusted,
        ));
        registry.register(Arc::clone(&reader), false);
        (registry, reader)
    }

    #[test]
    fn test_multi_submessage_walk_dispatches_per_kind() {
        let (registry, reader) = registry_with_reader(EntityId([1, 0, 0, 0x07]), EntityId::UNKNOWN);
        let writer = Arc::new(LocalEndpoint::new_writer(
            GUID::new(LOCAL_PREFIX, EntityId([2, 0, 0, 0x02])),
            EndpointAttributes::reliable_writer(),
            WriterHistory::default(),
            None,
        ));
        registry.register(Arc::clone(&writer), false);

        let remote_writer = EntityId([8, 0, 0, 0x02]);
        let remote_reader = EntityId([8, 0, 0, 0x07]);
        let mut msg = CdrMessage::new();
        msg.add_header(&REMOTE_PREFIX);
        msg.add_data(EntityId::UNKNOWN, remote_writer, 1, b"payload");
        msg.add_heartbeat(EntityId::UNKNOWN, remote_writer, 1, 1, 1);
        msg.add_acknack(remote_reader, writer.entity_id(), 4, 1);

        let mut receiver = MessageReceiver::new(65536);
        receiver.process(
            &LOCAL_PREFIX,
            &source(),
            msg.as_bytes(),
            &[writer.entity_id()],
            &[reader.entity_id()],
            &registry,
        );

        let sample = reader.take_sample().expect("DATA delivered to the reader");
        assert_eq!(sample.payload, b"payload");
        assert_eq!(sample.writer, GUID::new(REMOTE_PREFIX, remote_writer));
        assert_eq!(
            writer.acked_base(&GUID::new(REMOTE_PREFIX, remote_reader)),
            Some(4),
            "ACKNACK delivered to the reliable writer"
        );
    }

    #[test]
    fn test_own_traffic_is_dropped() {
        let (registry, reader) = registry_with_reader(EntityId([1, 0, 0, 0x04]), EntityId::UNKNOWN);
        let mut msg = CdrMessage::new();
        msg.add_header(&LOCAL_PREFIX);
        msg.add_data(EntityId::UNKNOWN, EntityId([3, 0, 0, 0x03]), 1, b"loop");

        let mut receiver = MessageReceiver::new(65536);
        receiver.process(
            &LOCAL_PREFIX,
            &source(),
            msg.as_bytes(),
            &[],
            &[reader.entity_id()],
            &registry,
        );
        assert_eq!(reader.sample_count(), 0, "own multicast loopback is ignored");
    }

    #[test]
    fn test_trusted_writer_filters_data() {
        let (registry, reader) =
            registry_with_reader(EntityId::SPDP_READER, EntityId::SPDP_WRITER);

        // Data from an untrusted writer entity is refused.
        let mut msg = CdrMessage::new();
        msg.add_header(&REMOTE_PREFIX);
        msg.add_data(EntityId::SPDP_READER, EntityId([5, 0, 0, 0x02]), 1, b"spoof");
        let mut receiver = MessageReceiver::new(65536);
        receiver.process(
            &LOCAL_PREFIX,
            &source(),
            msg.as_bytes(),
            &[],
            &[reader.entity_id()],
            &registry,
        );
        assert_eq!(reader.sample_count(), 0);

        // Same message from the trusted writer passes.
        let mut msg = CdrMessage::new();
        msg.add_header(&REMOTE_PREFIX);
        msg.add_data(EntityId::SPDP_READER, EntityId::SPDP_WRITER, 1, b"spdp");
        receiver.process(
            &LOCAL_PREFIX,
            &source(),
            msg.as_bytes(),
            &[],
            &[reader.entity_id()],
            &registry,
        );
        assert_eq!(reader.sample_count(), 1);
    }

    #[test]
    fn test_addressed_reader_id_respected() {
        let (registry, reader) = registry_with_reader(EntityId([1, 0, 0, 0x04]), EntityId::UNKNOWN);

        // Addressed to a different reader: not delivered.
        let mut msg = CdrMessage::new();
        msg.add_header(&REMOTE_PREFIX);
        msg.add_data(EntityId([7, 7, 7, 0x04]), EntityId([5, 0, 0, 0x03]), 1, b"x");
        let mut receiver = MessageReceiver::new(65536);
        receiver.process(
            &LOCAL_PREFIX,
            &source(),
            msg.as_bytes(),
            &[],
            &[reader.entity_id()],
            &registry,
        );
        assert_eq!(reader.sample_count(), 0);
    }

    #[test]
    fn test_truncated_submessage_stops_walk_quietly() {
        let (registry, reader) = registry_with_reader(EntityId([1, 0, 0, 0x04]), EntityId::UNKNOWN);
        let mut msg = CdrMessage::new();
        msg.add_header(&REMOTE_PREFIX);
        msg.add_data(EntityId::UNKNOWN, EntityId([5, 0, 0, 0x03]), 1, b"ok");
        let mut bytes = msg.as_bytes().to_vec();
        // Claim a longer submessage than the buffer holds.
        bytes[22] = 0xFF;
        bytes[23] = 0x00;

        let mut receiver = MessageReceiver::new(65536);
        receiver.process(
            &LOCAL_PREFIX,
            &source(),
            &bytes,
            &[],
            &[reader.entity_id()],
            &registry,
        );
        assert_eq!(reader.sample_count(), 0, "truncated DATA is dropped, no panic");
    }

    #[test]
    fn test_validate_header() {
        let mut data = vec![0u8; 20];
        data[0..4].copy_from_slice(b"RTPS");
        data[4] = 0x02;
        data[5] = 0x04;
        data[8..20].copy_from_slice(&[9; 12]);
        assert_eq!(validate_header(&data), Some(GuidPrefix([9; 12])));

        data[0] = b'X';
        assert_eq!(validate_header(&data), None);
        assert_eq!(validate_header(&[0u8; 10]), None);
    }

    #[test]
    fn test_read_sequence_rejects_negative_high() {
        let mut bytes = [0u8; 8];
        bytes[0..4].copy_from_slice(&(-1i32).to_le_bytes());
        assert_eq!(read_sequence(&bytes, true), None);
        bytes[0..4].copy_from_slice(&1i32.to_le_bytes());
        bytes[4..8].copy_from_slice(&2u32.to_le_bytes());
        assert_eq!(read_sequence(&bytes, true), Some((1 << 32) | 2));
    }

    #[test]
    fn test_big_endian_u16() {
        assert_eq!(read_u16(&[0x01, 0x02], false), 0x0102);
        assert_eq!(read_u16(&[0x01, 0x02], true), 0x0201);
    }
}
