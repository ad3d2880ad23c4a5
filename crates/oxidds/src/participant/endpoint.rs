// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Local endpoints: the four writer/reader variants behind one capability
//! surface.
//!
//! The participant treats endpoints uniformly through {guid, attributes,
//! deliver, trusted_writer}. History caches and the full reliability state
//! machines live above this layer; the variants here keep only the state the
//! participant core itself needs (sequence counters, duplicate suppression,
//! ack bookkeeping).

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};

use crate::core::types::{
    EndpointAttributes, EndpointKind, EntityId, Locator, ReliabilityKind, TopicKind, GUID,
};
use crate::protocol::RtpsEvent;

/// Callbacks for writer-side events.
pub trait WriterListener: Send + Sync {
    /// A reader acknowledged everything below `base_seq`.
    fn on_acknack(&self, writer: GUID, reader: GUID, base_seq: u64) {
        let _ = (writer, reader, base_seq);
    }
}

/// Callbacks for reader-side events.
pub trait ReaderListener: Send + Sync {
    /// A new sample was appended to the reader history.
    fn on_data_available(&self, reader: GUID, sample: &ReceivedSample) {
        let _ = (reader, sample);
    }
}

/// A sample as stored in a reader history.
#[derive(Clone, Debug)]
pub struct ReceivedSample {
    pub writer: GUID,
    pub sequence: u64,
    pub payload: Vec<u8>,
    pub source: Locator,
}

/// Bounded outgoing-change store for a writer.
pub struct WriterHistory {
    depth: usize,
    changes: Mutex<VecDeque<(u64, Vec<u8>)>>,
}

impl WriterHistory {
    #[must_use]
    pub fn with_depth(depth: usize) -> Self {
        Self {
            depth: depth.max(1),
            changes: Mutex::new(VecDeque::new()),
        }
    }

    fn add_change(&self, sequence: u64, payload: Vec<u8>) {
        let mut changes = self.changes.lock();
        while changes.len() >= self.depth {
            changes.pop_front();
        }
        changes.push_back((sequence, payload));
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.changes.lock().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for WriterHistory {
    fn default() -> Self {
        Self::with_depth(16)
    }
}

/// Bounded incoming-sample store for a reader.
pub struct ReaderHistory {
    depth: usize,
    samples: Mutex<VecDeque<ReceivedSample>>,
}

impl ReaderHistory {
    #[must_use]
    pub fn with_depth(depth: usize) -> Self {
        Self {
            depth: depth.max(1),
            samples: Mutex::new(VecDeque::new()),
        }
    }

    fn push(&self, sample: ReceivedSample) {
        let mut samples = self.samples.lock();
        while samples.len() >= self.depth {
            samples.pop_front();
        }
        samples.push_back(sample);
    }

    fn take(&self) -> Option<ReceivedSample> {
        self.samples.lock().pop_front()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.samples.lock().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for ReaderHistory {
    fn default() -> Self {
        Self::with_depth(16)
    }
}

struct WriterState {
    history: WriterHistory,
    listener: Option<Arc<dyn WriterListener>>,
    next_seq: AtomicU64,
}

struct ReaderState {
    history: ReaderHistory,
    listener: Option<Arc<dyn ReaderListener>>,
}

enum EndpointVariant {
    StatelessWriter(WriterState),
    StatefulWriter {
        state: WriterState,
        /// Highest acknowledged base per remote reader.
        acked: Mutex<HashMap<GUID, u64>>,
    },
    StatelessReader(ReaderState),
    StatefulReader {
        state: ReaderState,
        /// Highest delivered sequence per remote writer (duplicate filter).
        highest_seen: Mutex<HashMap<GUID, u64>>,
    },
}

/// A locally registered writer or reader.
pub struct LocalEndpoint {
    guid: GUID,
    attributes: RwLock<EndpointAttributes>,
    /// For built-in readers: the only remote writer accepted. `UNKNOWN`
    /// disables the filter.
    trusted_writer: EntityId,
    variant: EndpointVariant,
}

impl LocalEndpoint {
    pub(crate) fn new_writer(
        guid: GUID,
        attributes: EndpointAttributes,
        history: WriterHistory,
        listener: Option<Arc<dyn WriterListener>>,
    ) -> Self {
        let state = WriterState {
            history,
            listener,
            next_seq: AtomicU64::new(0),
        };
        let variant = match attributes.reliability {
            ReliabilityKind::BestEffort => EndpointVariant::StatelessWriter(state),
            ReliabilityKind::Reliable => EndpointVariant::StatefulWriter {
                state,
                acked: Mutex::new(HashMap::new()),
            },
        };
        Self {
            guid,
            attributes: RwLock::new(attributes),
            trusted_writer: EntityId::UNKNOWN,
            variant,
        }
    }

    pub(crate) fn new_reader(
        guid: GUID,
        attributes: EndpointAttributes,
        history: ReaderHistory,
        listener: Option<Arc<dyn ReaderListener>>,
        trusted_writer: EntityId,
    ) -> Self {
        let state = ReaderState { history, listener };
        let variant = match attributes.reliability {
            ReliabilityKind::BestEffort => EndpointVariant::StatelessReader(state),
            ReliabilityKind::Reliable => EndpointVariant::StatefulReader {
                state,
                highest_seen: Mutex::new(HashMap::new()),
            },
        };
        Self {
            guid,
            attributes: RwLock::new(attributes),
            trusted_writer,
            variant,
        }
    }

    // ===== Capability surface =====

    #[must_use]
    pub fn guid(&self) -> GUID {
        self.guid
    }

    #[must_use]
    pub fn entity_id(&self) -> EntityId {
        self.guid.entity_id
    }

    /// Snapshot of the endpoint attributes.
    #[must_use]
    pub fn attributes(&self) -> EndpointAttributes {
        self.attributes.read().clone()
    }

    #[must_use]
    pub fn kind(&self) -> EndpointKind {
        match self.variant {
            EndpointVariant::StatelessWriter(_) | EndpointVariant::StatefulWriter { .. } => {
                EndpointKind::Writer
            }
            EndpointVariant::StatelessReader(_) | EndpointVariant::StatefulReader { .. } => {
                EndpointKind::Reader
            }
        }
    }

    #[must_use]
    pub fn reliability(&self) -> ReliabilityKind {
        self.attributes.read().reliability
    }

    #[must_use]
    pub fn topic_kind(&self) -> TopicKind {
        self.attributes.read().topic_kind
    }

    /// The unique remote writer a built-in reader accepts data from.
    #[must_use]
    pub fn trusted_writer(&self) -> EntityId {
        self.trusted_writer
    }

    pub(crate) fn set_unicast_locators(&self, list: Vec<Locator>) {
        self.attributes.write().unicast_locator_list = list;
    }

    pub(crate) fn set_multicast_locators(&self, list: Vec<Locator>) {
        self.attributes.write().multicast_locator_list = list;
    }

    pub(crate) fn set_out_locators(&self, list: Vec<Locator>) {
        self.attributes.write().out_locator_list = list;
    }

    /// Deliver a decoded submessage. Dispatch differs per variant; events a
    /// variant has no use for are dropped silently.
    pub fn deliver(&self, event: &RtpsEvent<'_>, source: &Locator) {
        match (&self.variant, event) {
            (
                EndpointVariant::StatelessReader(state),
                RtpsEvent::Data {
                    writer,
                    sequence,
                    payload,
                },
            ) => {
                Self::store_sample(self.guid, state, *writer, *sequence, payload, source);
            }
            (
                EndpointVariant::StatefulReader {
                    state,
                    highest_seen,
                },
                RtpsEvent::Data {
                    writer,
                    sequence,
                    payload,
                },
            ) => {
                {
                    let mut seen = highest_seen.lock();
                    let entry = seen.entry(*writer).or_insert(0);
                    if *sequence <= *entry {
                        log::debug!(
                            "[ENDPOINT] {} dropping duplicate seq={} from {}",
                            self.guid,
                            sequence,
                            writer
                        );
                        return;
                    }
                    *entry = *sequence;
                }
                Self::store_sample(self.guid, state, *writer, *sequence, payload, source);
            }
            (
                EndpointVariant::StatefulReader { highest_seen, .. },
                RtpsEvent::Gap {
                    writer,
                    gap_list_base,
                    ..
                },
            ) => {
                // Everything below the gap-list base is declared irrelevant.
                let mut seen = highest_seen.lock();
                let entry = seen.entry(*writer).or_insert(0);
                *entry = (*entry).max(gap_list_base.saturating_sub(1));
            }
            (EndpointVariant::StatefulReader { .. }, RtpsEvent::Heartbeat { writer, .. }) => {
                log::debug!("[ENDPOINT] {} heartbeat from {}", self.guid, writer);
            }
            (
                EndpointVariant::StatefulWriter { state, acked },
                RtpsEvent::AckNack {
                    reader, base_seq, ..
                },
            ) => {
                {
                    let mut map = acked.lock();
                    let entry = map.entry(*reader).or_insert(0);
                    *entry = (*entry).max(*base_seq);
                }
                if let Some(listener) = &state.listener {
                    listener.on_acknack(self.guid, *reader, *base_seq);
                }
            }
            _ => {}
        }
    }

    fn store_sample(
        guid: GUID,
        state: &ReaderState,
        writer: GUID,
        sequence: u64,
        payload: &[u8],
        source: &Locator,
    ) {
        let sample = ReceivedSample {
            writer,
            sequence,
            payload: payload.to_vec(),
            source: *source,
        };
        state.history.push(sample.clone());
        if let Some(listener) = &state.listener {
            listener.on_data_available(guid, &sample);
        }
    }

    // ===== Writer-side operations =====

    /// Record a new outgoing change; returns its sequence number.
    ///
    /// Writers only. Readers return `None`.
    pub fn new_change(&self, payload: &[u8]) -> Option<u64> {
        let state = match &self.variant {
            EndpointVariant::StatelessWriter(state)
            | EndpointVariant::StatefulWriter { state, .. } => state,
            _ => return None,
        };
        let sequence = state.next_seq.fetch_add(1, Ordering::Relaxed) + 1;
        state.history.add_change(sequence, payload.to_vec());
        Some(sequence)
    }

    /// Highest base acknowledged by `reader`, for reliable writers.
    #[must_use]
    pub fn acked_base(&self, reader: &GUID) -> Option<u64> {
        match &self.variant {
            EndpointVariant::StatefulWriter { acked, .. } => acked.lock().get(reader).copied(),
            _ => None,
        }
    }

    // ===== Reader-side operations =====

    /// Pop the oldest sample from a reader history.
    pub fn take_sample(&self) -> Option<ReceivedSample> {
        match &self.variant {
            EndpointVariant::StatelessReader(state)
            | EndpointVariant::StatefulReader { state, .. } => state.history.take(),
            _ => None,
        }
    }

    /// Number of samples waiting in a reader history.
    #[must_use]
    pub fn sample_count(&self) -> usize {
        match &self.variant {
            EndpointVariant::StatelessReader(state)
            | EndpointVariant::StatefulReader { state, .. } => state.history.len(),
            _ => 0,
        }
    }
}

impl std::fmt::Debug for LocalEndpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let variant = match self.variant {
            EndpointVariant::StatelessWriter(_) => "StatelessWriter",
            EndpointVariant::StatefulWriter { .. } => "StatefulWriter",
            EndpointVariant::StatelessReader(_) => "StatelessReader",
            EndpointVariant::StatefulReader { .. } => "StatefulReader",
        };
        write!(f, "{}({})", variant, self.guid)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::GuidPrefix;

    fn guid(entity: EntityId) -> GUID {
        GUID::new(GuidPrefix([1; 12]), entity)
    }

    fn data_event<'a>(writer: GUID, sequence: u64, payload: &'a [u8]) -> RtpsEvent<'a> {
        RtpsEvent::Data {
            writer,
            sequence,
            payload,
        }
    }

    #[test]
    fn test_writer_variant_follows_reliability() {
        let w = LocalEndpoint::new_writer(
            guid(EntityId([1, 0, 0, 0x03])),
            EndpointAttributes::best_effort_writer(),
            WriterHistory::default(),
            None,
        );
        assert_eq!(w.kind(), EndpointKind::Writer);
        assert_eq!(w.reliability(), ReliabilityKind::BestEffort);
        assert!(format!("{:?}", w).starts_with("StatelessWriter"));

        let w = LocalEndpoint::new_writer(
            guid(EntityId([2, 0, 0, 0x02])),
            EndpointAttributes::reliable_writer(),
            WriterHistory::default(),
            None,
        );
        assert!(format!("{:?}", w).starts_with("StatefulWriter"));
    }

    #[test]
    fn test_stateful_reader_drops_duplicates() {
        let reader = LocalEndpoint::new_reader(
            guid(EntityId([1, 0, 0, 0x07])),
            EndpointAttributes::reliable_reader(),
            ReaderHistory::default(),
            None,
            EntityId::UNKNOWN,
        );
        let writer = guid(EntityId([9, 0, 0, 0x02]));
        let source = Locator::udpv4([127, 0, 0, 1], 7411);

        reader.deliver(&data_event(writer, 1, b"a"), &source);
        reader.deliver(&data_event(writer, 1, b"a"), &source);
        reader.deliver(&data_event(writer, 2, b"b"), &source);
        assert_eq!(reader.sample_count(), 2);

        let first = reader.take_sample().expect("first sample present");
        assert_eq!(first.sequence, 1);
        assert_eq!(first.payload, b"a");
    }

    #[test]
    fn test_stateless_reader_keeps_arrival_order() {
        let reader = LocalEndpoint::new_reader(
            guid(EntityId([1, 0, 0, 0x04])),
            EndpointAttributes::best_effort_reader(),
            ReaderHistory::default(),
            None,
            EntityId::UNKNOWN,
        );
        let writer = guid(EntityId([9, 0, 0, 0x03]));
        let source = Locator::udpv4([127, 0, 0, 1], 7411);

        reader.deliver(&data_event(writer, 2, b"late"), &source);
        reader.deliver(&data_event(writer, 1, b"early"), &source);
        // Best-effort: no reordering, no duplicate filter.
        assert_eq!(reader.take_sample().expect("sample").payload, b"late");
        assert_eq!(reader.take_sample().expect("sample").payload, b"early");
    }

    #[test]
    fn test_stateful_writer_records_acks() {
        let writer = LocalEndpoint::new_writer(
            guid(EntityId([1, 0, 0, 0x02])),
            EndpointAttributes::reliable_writer(),
            WriterHistory::default(),
            None,
        );
        let remote_reader = guid(EntityId([7, 0, 0, 0x07]));
        let source = Locator::udpv4([127, 0, 0, 1], 7410);
        writer.deliver(
            &RtpsEvent::AckNack {
                reader: remote_reader,
                base_seq: 5,
                count: 1,
            },
            &source,
        );
        writer.deliver(
            &RtpsEvent::AckNack {
                reader: remote_reader,
                base_seq: 3,
                count: 2,
            },
            &source,
        );
        // Ack bases never regress.
        assert_eq!(writer.acked_base(&remote_reader), Some(5));
    }

    #[test]
    fn test_new_change_sequences_monotonic() {
        let writer = LocalEndpoint::new_writer(
            guid(EntityId([1, 0, 0, 0x03])),
            EndpointAttributes::best_effort_writer(),
            WriterHistory::with_depth(4),
            None,
        );
        assert_eq!(writer.new_change(b"x"), Some(1));
        assert_eq!(writer.new_change(b"y"), Some(2));
        assert_eq!(writer.new_change(b"z"), Some(3));
    }

    #[test]
    fn test_reader_history_bounded() {
        let reader = LocalEndpoint::new_reader(
            guid(EntityId([1, 0, 0, 0x04])),
            EndpointAttributes::best_effort_reader(),
            ReaderHistory::with_depth(2),
            None,
            EntityId::UNKNOWN,
        );
        let writer = guid(EntityId([9, 0, 0, 0x03]));
        let source = Locator::udpv4([127, 0, 0, 1], 7411);
        for seq in 1..=5u64 {
            reader.deliver(&data_event(writer, seq, b"s"), &source);
        }
        assert_eq!(reader.sample_count(), 2);
        assert_eq!(reader.take_sample().expect("sample").sequence, 4);
    }
}
