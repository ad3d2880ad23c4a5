// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Built-in discovery protocols.
//!
//! Creates the reserved SPDP/SEDP/liveliness endpoints on the metatraffic
//! locators, drives the periodic participant announcement through the event
//! thread, and keeps the proxies for local endpoints announced to peers.
//! The protocol machine itself is deliberately small; the participant core
//! only needs the wiring.

pub(crate) mod pdp;

use std::sync::Arc;

use parking_lot::Mutex;

use crate::core::rt::EventId;
use crate::core::types::{
    BuiltinAttributes, EndpointAttributes, EndpointKind, EntityId, GuidPrefix, Locator,
    ReliabilityKind, TopicKind, GUID,
};
use crate::participant::{
    EndpointQos, Error, LocalEndpoint, Participant, ReaderHistory, Result, TopicAttributes,
    WriterHistory,
};
use crate::protocol::CdrMessage;
use crate::transport::ports;

use pdp::Pdp;

/// The unique remote writer a built-in reader accepts data from.
///
/// Returns [`EntityId::UNKNOWN`] for readers outside the discovery pairings.
#[must_use]
pub fn trusted_writer(reader: EntityId) -> EntityId {
    match reader {
        EntityId::SPDP_READER => EntityId::SPDP_WRITER,
        EntityId::SEDP_PUB_READER => EntityId::SEDP_PUB_WRITER,
        EntityId::SEDP_SUB_READER => EntityId::SEDP_SUB_WRITER,
        EntityId::LIVELINESS_READER => EntityId::LIVELINESS_WRITER,
        _ => EntityId::UNKNOWN,
    }
}

struct LocalEndpointProxy {
    guid: GUID,
    topic: TopicAttributes,
    qos: EndpointQos,
}

/// Built-in discovery wiring owned by the participant.
pub(crate) struct BuiltinProtocols {
    attrs: BuiltinAttributes,
    pdp: Pdp,
    spdp_writer: Arc<LocalEndpoint>,
    spdp_reader: Arc<LocalEndpoint>,
    sedp_pub_writer: Option<Arc<LocalEndpoint>>,
    sedp_pub_reader: Option<Arc<LocalEndpoint>>,
    sedp_sub_writer: Option<Arc<LocalEndpoint>>,
    sedp_sub_reader: Option<Arc<LocalEndpoint>>,
    liveliness_writer: Option<Arc<LocalEndpoint>>,
    liveliness_reader: Option<Arc<LocalEndpoint>>,
    announce_event: EventId,
    local_writers: Mutex<Vec<LocalEndpointProxy>>,
    local_readers: Mutex<Vec<LocalEndpointProxy>>,
}

impl BuiltinProtocols {
    /// Create the built-in endpoints and schedule the periodic announcement.
    ///
    /// # Errors
    ///
    /// `DiscoveryInitFailed` when any built-in endpoint cannot be created.
    pub(crate) fn init(participant: &Arc<Participant>) -> Result<Self> {
        let participant_attrs = participant.attributes();
        let mut attrs = participant_attrs.builtin.clone();

        if attrs.metatraffic_multicast_locator_list.is_empty() {
            let port =
                ports::metatraffic_multicast_port(&participant_attrs.port, participant_attrs.domain_id);
            let mut locator = Locator::udpv4_any_raw(port);
            locator.address[12..16].copy_from_slice(&crate::config::MULTICAST_GROUP);
            attrs.metatraffic_multicast_locator_list.push(locator);
        }
        if attrs.metatraffic_unicast_locator_list.is_empty() {
            let port = ports::metatraffic_unicast_port(
                &participant_attrs.port,
                participant_attrs.domain_id,
                participant_attrs.participant_id,
            );
            attrs
                .metatraffic_unicast_locator_list
                .push(Locator::udpv4_any_raw(port));
        }

        let discovery_failed = |err: Error| Error::DiscoveryInitFailed(err.to_string());

        // SPDP: best-effort pair; the reader listens on the metatraffic
        // multicast and unicast locators.
        let spdp_writer = participant
            .create_writer(
                Self::builtin_writer_attrs(ReliabilityKind::BestEffort, &attrs),
                WriterHistory::with_depth(1),
                None,
                EntityId::SPDP_WRITER,
                true,
            )
            .map_err(discovery_failed)?;
        let spdp_reader = participant
            .create_reader(
                Self::builtin_reader_attrs(ReliabilityKind::BestEffort, &attrs),
                ReaderHistory::with_depth(32),
                None,
                EntityId::SPDP_READER,
                true,
                true,
            )
            .map_err(discovery_failed)?;

        // SEDP: reliable pairs for publications and subscriptions.
        let (sedp_pub_writer, sedp_pub_reader, sedp_sub_writer, sedp_sub_reader) =
            if attrs.use_simple_endpoint_discovery {
                let pub_writer = participant
                    .create_writer(
                        Self::builtin_writer_attrs(ReliabilityKind::Reliable, &attrs),
                        WriterHistory::with_depth(32),
                        None,
                        EntityId::SEDP_PUB_WRITER,
                        true,
                    )
                    .map_err(discovery_failed)?;
                let pub_reader = participant
                    .create_reader(
                        Self::builtin_reader_attrs(ReliabilityKind::Reliable, &attrs),
                        ReaderHistory::with_depth(32),
                        None,
                        EntityId::SEDP_PUB_READER,
                        true,
                        true,
                    )
                    .map_err(discovery_failed)?;
                let sub_writer = participant
                    .create_writer(
                        Self::builtin_writer_attrs(ReliabilityKind::Reliable, &attrs),
                        WriterHistory::with_depth(32),
                        None,
                        EntityId::SEDP_SUB_WRITER,
                        true,
                    )
                    .map_err(discovery_failed)?;
                let sub_reader = participant
                    .create_reader(
                        Self::builtin_reader_attrs(ReliabilityKind::Reliable, &attrs),
                        ReaderHistory::with_depth(32),
                        None,
                        EntityId::SEDP_SUB_READER,
                        true,
                        true,
                    )
                    .map_err(discovery_failed)?;
                (
                    Some(pub_writer),
                    Some(pub_reader),
                    Some(sub_writer),
                    Some(sub_reader),
                )
            } else {
                (None, None, None, None)
            };

        // Participant message (liveliness) pair.
        let liveliness_writer = participant
            .create_writer(
                Self::builtin_writer_attrs(ReliabilityKind::Reliable, &attrs),
                WriterHistory::with_depth(2),
                None,
                EntityId::LIVELINESS_WRITER,
                true,
            )
            .map_err(discovery_failed)?;
        let liveliness_reader = participant
            .create_reader(
                Self::builtin_reader_attrs(ReliabilityKind::Reliable, &attrs),
                ReaderHistory::with_depth(8),
                None,
                EntityId::LIVELINESS_READER,
                true,
                true,
            )
            .map_err(discovery_failed)?;

        let announce_event = {
            let weak = Arc::downgrade(participant);
            participant
                .event_resource()
                .register_periodic(attrs.announcement_period, move || {
                    if let Some(participant) = weak.upgrade() {
                        participant.announce_state();
                    }
                })
        };

        log::info!(
            "[BUILTIN] discovery initialized, metatraffic {:?} / {:?}",
            attrs.metatraffic_unicast_locator_list,
            attrs.metatraffic_multicast_locator_list
        );

        Ok(Self {
            pdp: Pdp::new(attrs.lease_duration),
            attrs,
            spdp_writer,
            spdp_reader,
            sedp_pub_writer,
            sedp_pub_reader,
            sedp_sub_writer,
            sedp_sub_reader,
            liveliness_writer: Some(liveliness_writer),
            liveliness_reader: Some(liveliness_reader),
            announce_event,
            local_writers: Mutex::new(Vec::new()),
            local_readers: Mutex::new(Vec::new()),
        })
    }

    fn builtin_writer_attrs(
        reliability: ReliabilityKind,
        attrs: &BuiltinAttributes,
    ) -> EndpointAttributes {
        let mut endpoint = EndpointAttributes::new(EndpointKind::Writer, reliability);
        endpoint.topic_kind = TopicKind::WithKey;
        if reliability == ReliabilityKind::Reliable {
            // Reliable built-in writers listen for acknacks on metatraffic.
            endpoint.unicast_locator_list = attrs.metatraffic_unicast_locator_list.clone();
        }
        endpoint
    }

    fn builtin_reader_attrs(
        reliability: ReliabilityKind,
        attrs: &BuiltinAttributes,
    ) -> EndpointAttributes {
        let mut endpoint = EndpointAttributes::new(EndpointKind::Reader, reliability);
        endpoint.topic_kind = TopicKind::WithKey;
        endpoint.unicast_locator_list = attrs.metatraffic_unicast_locator_list.clone();
        endpoint.multicast_locator_list = attrs.metatraffic_multicast_locator_list.clone();
        endpoint
    }

    fn builtin_endpoints(&self) -> Vec<Arc<LocalEndpoint>> {
        let mut endpoints = vec![Arc::clone(&self.spdp_writer), Arc::clone(&self.spdp_reader)];
        for endpoint in [
            &self.sedp_pub_writer,
            &self.sedp_pub_reader,
            &self.sedp_sub_writer,
            &self.sedp_sub_reader,
            &self.liveliness_writer,
            &self.liveliness_reader,
        ]
        .into_iter()
        .flatten()
        {
            endpoints.push(Arc::clone(endpoint));
        }
        endpoints
    }

    // ===== Announcement =====

    /// Build and multicast one participant announcement, after updating the
    /// remote-participant leases from freshly received SPDP samples.
    pub(crate) fn announce(&self, participant: &Participant) {
        while let Some(sample) = self.spdp_reader.take_sample() {
            match pdp::parse_participant_prefix(&sample.payload) {
                Some(prefix) => {
                    if self.pdp.assert_remote_liveliness(prefix) {
                        log::info!("[PDP] discovered participant {}", prefix);
                    }
                }
                None => log::debug!("[PDP] unparseable SPDP sample from {}", sample.source),
            }
        }
        let expired = self.pdp.prune_expired();
        if expired > 0 {
            log::info!("[PDP] {} participant lease(s) expired", expired);
        }

        let attrs = participant.attributes();
        let payload = pdp::build_participant_announcement(
            &participant.guid(),
            &attrs.name,
            &attrs.default_unicast_locator_list,
            self.attrs.lease_duration,
        );
        let Some(sequence) = self.spdp_writer.new_change(&payload) else {
            return;
        };
        let mut message = CdrMessage::with_capacity(payload.len() + 64);
        message.add_header(&participant.guid_prefix());
        message.add_data(
            EntityId::SPDP_READER,
            EntityId::SPDP_WRITER,
            sequence,
            &payload,
        );
        for locator in &self.attrs.metatraffic_multicast_locator_list {
            participant.send_sync(&message, &self.spdp_writer, locator);
        }
    }

    pub(crate) fn stop_announcement(&self, participant: &Participant) {
        participant.event_resource().cancel(self.announce_event);
    }

    pub(crate) fn reset_announcement(&self, participant: &Participant) {
        participant.event_resource().reset(self.announce_event);
    }

    // ===== Local endpoint proxies (SEDP) =====

    /// Announce a local writer to peers.
    pub(crate) fn add_local_writer(
        &self,
        participant: &Participant,
        writer: &Arc<LocalEndpoint>,
        topic: TopicAttributes,
        qos: EndpointQos,
    ) -> Result<()> {
        self.local_writers.lock().push(LocalEndpointProxy {
            guid: writer.guid(),
            topic: topic.clone(),
            qos,
        });
        self.announce_endpoint(
            participant,
            self.sedp_pub_writer.as_ref(),
            EntityId::SEDP_PUB_READER,
            writer.guid(),
            &topic,
            qos,
        );
        Ok(())
    }

    /// Announce a local reader to peers.
    pub(crate) fn add_local_reader(
        &self,
        participant: &Participant,
        reader: &Arc<LocalEndpoint>,
        topic: TopicAttributes,
        qos: EndpointQos,
    ) -> Result<()> {
        self.local_readers.lock().push(LocalEndpointProxy {
            guid: reader.guid(),
            topic: topic.clone(),
            qos,
        });
        self.announce_endpoint(
            participant,
            self.sedp_sub_writer.as_ref(),
            EntityId::SEDP_SUB_READER,
            reader.guid(),
            &topic,
            qos,
        );
        Ok(())
    }

    pub(crate) fn update_local_writer(
        &self,
        participant: &Participant,
        writer: &Arc<LocalEndpoint>,
        qos: EndpointQos,
    ) -> Result<()> {
        let topic = {
            let mut proxies = self.local_writers.lock();
            let proxy = proxies
                .iter_mut()
                .find(|proxy| proxy.guid == writer.guid())
                .ok_or(Error::UnknownEndpoint(writer.entity_id()))?;
            proxy.qos = qos;
            proxy.topic.clone()
        };
        self.announce_endpoint(
            participant,
            self.sedp_pub_writer.as_ref(),
            EntityId::SEDP_PUB_READER,
            writer.guid(),
            &topic,
            qos,
        );
        Ok(())
    }

    pub(crate) fn update_local_reader(
        &self,
        participant: &Participant,
        reader: &Arc<LocalEndpoint>,
        qos: EndpointQos,
    ) -> Result<()> {
        let topic = {
            let mut proxies = self.local_readers.lock();
            let proxy = proxies
                .iter_mut()
                .find(|proxy| proxy.guid == reader.guid())
                .ok_or(Error::UnknownEndpoint(reader.entity_id()))?;
            proxy.qos = qos;
            proxy.topic.clone()
        };
        self.announce_endpoint(
            participant,
            self.sedp_sub_writer.as_ref(),
            EntityId::SEDP_SUB_READER,
            reader.guid(),
            &topic,
            qos,
        );
        Ok(())
    }

    pub(crate) fn remove_local_writer(&self, writer: &Arc<LocalEndpoint>) {
        self.local_writers
            .lock()
            .retain(|proxy| proxy.guid != writer.guid());
        log::debug!("[BUILTIN] removed local writer {}", writer.guid());
    }

    pub(crate) fn remove_local_reader(&self, reader: &Arc<LocalEndpoint>) {
        self.local_readers
            .lock()
            .retain(|proxy| proxy.guid != reader.guid());
        log::debug!("[BUILTIN] removed local reader {}", reader.guid());
    }

    fn announce_endpoint(
        &self,
        participant: &Participant,
        sedp_writer: Option<&Arc<LocalEndpoint>>,
        addressed_reader: EntityId,
        endpoint_guid: GUID,
        topic: &TopicAttributes,
        qos: EndpointQos,
    ) {
        let Some(sedp_writer) = sedp_writer else {
            log::debug!("[BUILTIN] simple endpoint discovery disabled, proxy kept locally");
            return;
        };
        let payload = pdp::build_endpoint_announcement(topic, endpoint_guid, qos);
        let Some(sequence) = sedp_writer.new_change(&payload) else {
            return;
        };
        let mut message = CdrMessage::with_capacity(payload.len() + 64);
        message.add_header(&endpoint_guid.prefix);
        message.add_data(
            addressed_reader,
            sedp_writer.entity_id(),
            sequence,
            &payload,
        );
        for locator in &self.attrs.metatraffic_multicast_locator_list {
            participant.send_sync(&message, sedp_writer, locator);
        }
        log::debug!(
            "[BUILTIN] announced endpoint {} on topic '{}'",
            endpoint_guid,
            topic.name
        );
    }

    // ===== PDP delegation =====

    pub(crate) fn assert_remote_liveliness(&self, prefix: GuidPrefix) {
        self.pdp.assert_remote_liveliness(prefix);
    }

    /// Record a remote endpoint known through static discovery.
    ///
    /// # Errors
    ///
    /// `InvalidConfig` when the remote carries no user-defined id.
    pub(crate) fn new_remote_endpoint_statically_discovered(
        &self,
        guid: GUID,
        user_defined_id: i16,
        kind: EndpointKind,
    ) -> Result<()> {
        if user_defined_id <= 0 {
            return Err(Error::InvalidConfig(
                "static discovery requires a positive user-defined id".to_string(),
            ));
        }
        self.pdp
            .add_static_remote_endpoint(guid, user_defined_id, kind);
        Ok(())
    }

    /// Number of live remote participants (diagnostics).
    pub(crate) fn discovered_participant_count(&self) -> usize {
        self.pdp.participant_count()
    }

    // ===== Teardown =====

    /// Cancel the announcement and pull every built-in endpoint out of the
    /// participant structures.
    pub(crate) fn shutdown(&self, participant: &Participant) {
        participant.event_resource().cancel(self.announce_event);
        for endpoint in self.builtin_endpoints() {
            participant.remove_builtin_endpoint(&endpoint);
        }
        log::debug!("[BUILTIN] discovery shut down");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trusted_writer_mapping() {
        assert_eq!(trusted_writer(EntityId::SPDP_READER), EntityId::SPDP_WRITER);
        assert_eq!(
            trusted_writer(EntityId::SEDP_PUB_READER),
            EntityId::SEDP_PUB_WRITER
        );
        assert_eq!(
            trusted_writer(EntityId::SEDP_SUB_READER),
            EntityId::SEDP_SUB_WRITER
        );
        assert_eq!(
            trusted_writer(EntityId::LIVELINESS_READER),
            EntityId::LIVELINESS_WRITER
        );
        assert_eq!(
            trusted_writer(EntityId([1, 0, 0, 0x04])),
            EntityId::UNKNOWN
        );
    }

    #[test]
    fn test_trusted_writer_round_trip() {
        // TrustedWriter(TrustedReader^-1(W)) = W for each discovery pairing.
        let pairs = [
            (EntityId::SPDP_READER, EntityId::SPDP_WRITER),
            (EntityId::SEDP_PUB_READER, EntityId::SEDP_PUB_WRITER),
            (EntityId::SEDP_SUB_READER, EntityId::SEDP_SUB_WRITER),
            (EntityId::LIVELINESS_READER, EntityId::LIVELINESS_WRITER),
        ];
        for (reader, writer) in pairs {
            assert_eq!(trusted_writer(reader), writer);
        }
    }
}
