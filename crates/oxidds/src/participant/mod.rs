// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! The RTPS participant: top-level composition of the core.
//!
//! A participant owns the endpoint registry, the receiver control blocks and
//! their listener threads, the sender pool, the event thread, and the wiring
//! into built-in discovery. The public API creates, registers and deletes
//! writer/reader endpoints.
//!
//! ## Locking
//!
//! Participant-wide structures live in one `ParticipantState` behind a single
//! mutex taken at each public API boundary; helpers receive `&mut
//! ParticipantState` so re-entry cannot occur. Lock order is participant
//! state, then a block's endpoint-set mutex, then endpoint interiors. No lock
//! is held across blocking network I/O.

pub(crate) mod binder;
pub mod endpoint;
pub mod receiver;
pub mod registry;
pub(crate) mod send;


use std::collections::HashSet;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::builtin::BuiltinProtocols;
use crate::core::rt::{EventResource, ResourceSemaphore};
use crate::core::types::locator::list_is_valid;
use crate::core::types::{
    EndpointAttributes, EndpointKind, EntityId, GuidPrefix, Locator, ParticipantAttributes,
    ReliabilityKind, TopicKind, GUID,
};
use crate::participant::receiver::ReceiverControlBlock;
use crate::protocol::CdrMessage;
use crate::transport::udp::UdpFactory;
use crate::transport::{ports, NetworkFactory, SenderResource};

pub use endpoint::{
    LocalEndpoint, ReaderHistory, ReaderListener, ReceivedSample, WriterHistory, WriterListener,
};
pub use registry::EndpointRegistry;

/// Errors surfaced by participant operations.
///
/// Failures are also logged on the `[PARTICIPANT]` channel at WARN or ERROR.
#[derive(Debug)]
pub enum Error {
    /// An endpoint with the same entity id is already registered.
    DuplicateEntityId(EntityId),
    /// A locator in the input lists failed validation.
    InvalidLocator(Locator),
    /// The endpoint constructor produced nothing usable.
    AllocationFailed(&'static str),
    /// No receiver resource could be built for any requested locator.
    ReceiverBindFailed(Locator),
    /// Built-in discovery refused to initialize; the participant continues
    /// in a degraded, non-discoverable state.
    DiscoveryInitFailed(String),
    /// The operation needs configuration the participant was not built with.
    InvalidConfig(String),
    /// The endpoint is not registered with this participant.
    UnknownEndpoint(EntityId),
    /// A receiver resource was closed during shutdown.
    ResourceClosed,
    /// Underlying I/O failure.
    Io(std::io::Error),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::DuplicateEntityId(id) => {
                write!(f, "an endpoint with entity id {} already exists", id)
            }
            Error::InvalidLocator(loc) => write!(f, "invalid locator: {}", loc),
            Error::AllocationFailed(what) => write!(f, "allocation failed: {}", what),
            Error::ReceiverBindFailed(loc) => {
                write!(f, "no receiver resource could be bound for {}", loc)
            }
            Error::DiscoveryInitFailed(msg) => {
                write!(f, "built-in discovery failed to initialize: {}", msg)
            }
            Error::InvalidConfig(msg) => write!(f, "invalid configuration: {}", msg),
            Error::UnknownEndpoint(id) => {
                write!(f, "endpoint {} is not registered with this participant", id)
            }
            Error::ResourceClosed => write!(f, "receiver resource closed"),
            Error::Io(err) => write!(f, "I/O error: {}", err),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Io(err) => Some(err),
            _ => None,
        }
    }
}

/// Convenient alias for participant results.
pub type Result<T> = std::result::Result<T, Error>;

/// Topic description handed to built-in discovery on registration.
#[derive(Clone, Debug)]
pub struct TopicAttributes {
    pub name: String,
    pub type_name: String,
    pub topic_kind: TopicKind,
}

/// QoS subset announced through discovery. Enforcement happens above the
/// participant core.
#[derive(Clone, Copy, Debug)]
pub struct EndpointQos {
    pub reliability: ReliabilityKind,
}

impl Default for EndpointQos {
    fn default() -> Self {
        Self {
            reliability: ReliabilityKind::BestEffort,
        }
    }
}

/// Mutable participant-wide state guarded by the participant mutex.
pub(crate) struct ParticipantState {
    pub(crate) attrs: ParticipantAttributes,
    pub(crate) factory: Arc<dyn NetworkFactory>,
    pub(crate) receivers: Vec<ReceiverControlBlock>,
    pub(crate) senders: Vec<Arc<dyn SenderResource>>,
    /// Binding locators already covered by a pooled sender.
    pub(crate) sender_locators: HashSet<Locator>,
}

/// Process-level RTPS entity hosting local writers and readers.
pub struct Participant {
    guid: GUID,
    state: Mutex<ParticipantState>,
    registry: Arc<EndpointRegistry>,
    event: EventResource,
    semaphore: ResourceSemaphore,
    builtin: Mutex<Option<BuiltinProtocols>>,
    stopping: AtomicBool,
}

impl Participant {
    /// Create a participant over UDPv4 with a freshly generated guid prefix.
    ///
    /// # Errors
    ///
    /// `InvalidConfig` for an out-of-range domain id, `ReceiverBindFailed`
    /// when no default locator can be bound within the adaptation retry cap,
    /// `Io` when threads cannot be spawned.
    pub fn new(attrs: ParticipantAttributes) -> Result<Arc<Self>> {
        Self::with_factory(attrs, GuidPrefix::generate(), Arc::new(UdpFactory::new()))
    }

    /// Create a participant over an explicit network factory.
    ///
    /// # Errors
    ///
    /// See [`Participant::new`].
    pub fn with_factory(
        attrs: ParticipantAttributes,
        prefix: GuidPrefix,
        factory: Arc<dyn NetworkFactory>,
    ) -> Result<Arc<Self>> {
        let mut attrs = attrs;
        if !ports::domain_id_is_valid(attrs.domain_id) {
            return Err(Error::InvalidConfig(format!(
                "domain id {} out of range",
                attrs.domain_id
            )));
        }
        let guid = GUID::new(prefix, EntityId::PARTICIPANT);
        log::info!(
            "[PARTICIPANT] \"{}\" with guid prefix {}",
            attrs.name,
            prefix
        );

        // If no default listening locators are defined, make a unicast one
        // from the port formula. One listen locator of any kind suppresses
        // this.
        let mut has_locators_defined = true;
        if attrs.default_unicast_locator_list.is_empty()
            && attrs.default_multicast_locator_list.is_empty()
        {
            has_locators_defined = false;
            let port =
                ports::default_user_unicast_port(&attrs.port, attrs.domain_id, attrs.participant_id);
            attrs
                .default_unicast_locator_list
                .push(Locator::udpv4_any_raw(port));
        }

        let registry = Arc::new(EndpointRegistry::new());
        let event = EventResource::new().map_err(Error::Io)?;

        let mut state = ParticipantState {
            attrs,
            factory,
            receivers: Vec::new(),
            senders: Vec::new(),
            sender_locators: HashSet::new(),
        };

        Self::build_default_receivers(&mut state)?;
        state.spawn_pending_listeners(prefix, &registry)?;

        if !has_locators_defined {
            log::info!(
                "[PARTICIPANT] \"{}\" created with NO default unicast locator list, added {:?}",
                state.attrs.name,
                state.attrs.default_unicast_locator_list
            );
        }

        let use_discovery = state.attrs.builtin.use_participant_discovery;
        let participant = Arc::new(Self {
            guid,
            state: Mutex::new(state),
            registry,
            event,
            semaphore: ResourceSemaphore::new(0),
            builtin: Mutex::new(None),
            stopping: AtomicBool::new(false),
        });

        if use_discovery {
            match BuiltinProtocols::init(&participant) {
                Ok(protocols) => *participant.builtin.lock() = Some(protocols),
                Err(err) => {
                    // Degraded, non-discoverable participant.
                    log::warn!(
                        "[PARTICIPANT] the builtin protocols were not correctly initialized: {}",
                        err
                    );
                }
            }
        }

        Ok(participant)
    }

    /// Bind receiver resources for the participant's default locators.
    ///
    /// Nothing guarantees the requested locators can actually be bound; to
    /// keep the default list in sync with the real receive resources, a
    /// unicast locator the factory rejects is mutated by the adaptation rule
    /// and retried, and the mutated locator replaces the original so the
    /// outward-advertised list matches what is bound.
    fn build_default_receivers(state: &mut ParticipantState) -> Result<()> {
        let buffer_size = state.attrs.listen_socket_buffer_size;
        let mutation_tries = state.attrs.mutation_tries;

        let defcopy = std::mem::take(&mut state.attrs.default_unicast_locator_list);
        for original in defcopy {
            let mut locator = original;
            let mut resources = state.factory.build_receiver_resources(&locator, buffer_size);
            let mut tries = 0;
            while resources.is_empty() {
                if tries >= mutation_tries {
                    log::error!(
                        "[PARTICIPANT] could not bind any locator derived from {} after {} tries",
                        original,
                        tries
                    );
                    return Err(Error::ReceiverBindFailed(original));
                }
                locator = binder::apply_locator_adapt_rule(locator)?;
                resources = state.factory.build_receiver_resources(&locator, buffer_size);
                tries += 1;
            }
            if locator != original {
                log::info!(
                    "[PARTICIPANT] default locator {} unavailable, adapted to {}",
                    original,
                    locator
                );
            }
            state.attrs.default_unicast_locator_list.push(locator);
            for resource in resources {
                state
                    .receivers
                    .push(ReceiverControlBlock::new(resource, true));
            }
        }

        // Multicast defaults have no adaptation rule; ports are shared.
        for locator in state.attrs.default_multicast_locator_list.clone() {
            if state.receivers.iter().any(|block| block.supports(&locator)) {
                continue;
            }
            let resources = state.factory.build_receiver_resources(&locator, buffer_size);
            if resources.is_empty() {
                log::warn!(
                    "[PARTICIPANT] no receiver resource for default multicast {}",
                    locator
                );
                continue;
            }
            for resource in resources {
                state
                    .receivers
                    .push(ReceiverControlBlock::new(resource, true));
            }
        }
        Ok(())
    }

    // ===== Identity and accessors =====

    #[must_use]
    pub fn guid(&self) -> GUID {
        self.guid
    }

    #[must_use]
    pub fn guid_prefix(&self) -> GuidPrefix {
        self.guid.prefix
    }

    /// Snapshot of the participant attributes (default locator lists reflect
    /// any adaptation performed at construction).
    #[must_use]
    pub fn attributes(&self) -> ParticipantAttributes {
        self.state.lock().attrs.clone()
    }

    #[must_use]
    pub fn event_resource(&self) -> &EventResource {
        &self.event
    }

    pub fn resource_semaphore_post(&self) {
        self.semaphore.post();
    }

    pub fn resource_semaphore_wait(&self) {
        self.semaphore.wait();
    }

    pub(crate) fn registry(&self) -> &Arc<EndpointRegistry> {
        &self.registry
    }

    // ===== Diagnostics =====

    /// Number of receiver control blocks (all have running listeners).
    #[must_use]
    pub fn receiver_count(&self) -> usize {
        self.state.lock().receivers.len()
    }

    /// Number of pooled sender resources.
    #[must_use]
    pub fn sender_count(&self) -> usize {
        self.state.lock().senders.len()
    }

    /// Number of receiver control blocks whose listener thread is running.
    /// Equals [`Participant::receiver_count`] while the participant is live.
    #[must_use]
    pub fn running_listener_count(&self) -> usize {
        self.state
            .lock()
            .receivers
            .iter()
            .filter(|block| block.thread_running())
            .count()
    }

    #[must_use]
    pub fn user_writer_count(&self) -> usize {
        self.registry.user_writer_count()
    }

    #[must_use]
    pub fn user_reader_count(&self) -> usize {
        self.registry.user_reader_count()
    }

    /// Remote participants currently holding a live lease. Zero while
    /// discovery is disabled or degraded.
    #[must_use]
    pub fn discovered_participant_count(&self) -> usize {
        self.builtin
            .lock()
            .as_ref()
            .map_or(0, BuiltinProtocols::discovered_participant_count)
    }

    // ===== Endpoint creation =====

    /// Create a writer endpoint.
    ///
    /// Allocates an entity id (pass [`EntityId::UNKNOWN`] for automatic
    /// assignment), validates the locator lists, provisions sender resources
    /// and, for RELIABLE writers, receiver resources, then registers the
    /// writer in the participant indices.
    ///
    /// # Errors
    ///
    /// `DuplicateEntityId`, `InvalidLocator`, `AllocationFailed`,
    /// `ReceiverBindFailed`.
    pub fn create_writer(
        &self,
        attrs: EndpointAttributes,
        history: WriterHistory,
        listener: Option<Arc<dyn WriterListener>>,
        entity_id: EntityId,
        is_builtin: bool,
    ) -> Result<Arc<LocalEndpoint>> {
        let kind = match attrs.reliability {
            ReliabilityKind::Reliable => "RELIABLE",
            ReliabilityKind::BestEffort => "BEST_EFFORT",
        };
        log::info!("[PARTICIPANT] creating writer of type {}", kind);

        let mut attrs = attrs;
        attrs.kind = EndpointKind::Writer;
        Self::validate_locator_lists(&attrs)?;

        let mut state = self.state.lock();
        let entity_id = self.registry.allocate_entity_id(
            entity_id,
            EndpointKind::Writer,
            attrs.topic_kind,
            attrs.entity_number,
        );
        if self.registry.exists(entity_id, EndpointKind::Writer) {
            log::error!(
                "[PARTICIPANT] a writer with entity id {} already exists",
                entity_id
            );
            return Err(Error::DuplicateEntityId(entity_id));
        }

        let reliability = attrs.reliability;
        let writer = Arc::new(LocalEndpoint::new_writer(
            GUID::new(self.guid.prefix, entity_id),
            attrs,
            history,
            listener,
        ));

        state.create_sender_resources(&writer);
        if reliability == ReliabilityKind::Reliable {
            if let Err(err) = state.create_and_associate_receivers(
                &writer,
                is_builtin,
                self.guid.prefix,
                &self.registry,
            ) {
                state.remove_endpoint_from_blocks(entity_id, EndpointKind::Writer);
                return Err(err);
            }
        }

        self.registry.register(Arc::clone(&writer), is_builtin);
        Ok(writer)
    }

    /// Create a reader endpoint.
    ///
    /// Sender resources are provisioned only for RELIABLE readers; receiver
    /// binding happens now when `enable` is true, or later through
    /// [`Participant::enable_reader`]. Built-in readers get their trusted
    /// writer derived from the reserved entity id.
    ///
    /// # Errors
    ///
    /// `DuplicateEntityId`, `InvalidLocator`, `AllocationFailed`,
    /// `ReceiverBindFailed`.
    pub fn create_reader(
        &self,
        attrs: EndpointAttributes,
        history: ReaderHistory,
        listener: Option<Arc<dyn ReaderListener>>,
        entity_id: EntityId,
        is_builtin: bool,
        enable: bool,
    ) -> Result<Arc<LocalEndpoint>> {
        let kind = match attrs.reliability {
            ReliabilityKind::Reliable => "RELIABLE",
            ReliabilityKind::BestEffort => "BEST_EFFORT",
        };
        log::info!("[PARTICIPANT] creating reader of type {}", kind);

        let mut attrs = attrs;
        attrs.kind = EndpointKind::Reader;
        Self::validate_locator_lists(&attrs)?;

        let mut state = self.state.lock();
        let entity_id = self.registry.allocate_entity_id(
            entity_id,
            EndpointKind::Reader,
            attrs.topic_kind,
            attrs.entity_number,
        );
        if self.registry.exists(entity_id, EndpointKind::Reader) {
            log::error!(
                "[PARTICIPANT] a reader with entity id {} already exists",
                entity_id
            );
            return Err(Error::DuplicateEntityId(entity_id));
        }

        let trusted = if is_builtin {
            crate::builtin::trusted_writer(entity_id)
        } else {
            EntityId::UNKNOWN
        };

        let reliability = attrs.reliability;
        let reader = Arc::new(LocalEndpoint::new_reader(
            GUID::new(self.guid.prefix, entity_id),
            attrs,
            history,
            listener,
            trusted,
        ));

        if reliability == ReliabilityKind::Reliable {
            state.create_sender_resources(&reader);
        }
        if enable {
            if let Err(err) = state.create_and_associate_receivers(
                &reader,
                is_builtin,
                self.guid.prefix,
                &self.registry,
            ) {
                state.remove_endpoint_from_blocks(entity_id, EndpointKind::Reader);
                return Err(err);
            }
        }

        self.registry.register(Arc::clone(&reader), is_builtin);
        Ok(reader)
    }

    /// Perform the deferred receiver binding for a reader created with
    /// `enable = false`. Only existing control blocks are considered.
    ///
    /// # Errors
    ///
    /// `ReceiverBindFailed` when no block covers the reader's locators.
    pub fn enable_reader(&self, reader: &Arc<LocalEndpoint>, is_builtin: bool) -> Result<()> {
        let state = self.state.lock();
        state.assign_endpoint_listen_resources(reader, is_builtin);
        if !state
            .receivers
            .iter()
            .any(|block| block.references(reader.entity_id()))
        {
            log::error!(
                "[PARTICIPANT] reader {} has no covering receiver",
                reader.guid()
            );
            return Err(Error::ReceiverBindFailed(
                reader
                    .attributes()
                    .unicast_locator_list
                    .first()
                    .copied()
                    .unwrap_or(Locator::INVALID),
            ));
        }
        Ok(())
    }

    fn validate_locator_lists(attrs: &EndpointAttributes) -> Result<()> {
        if !list_is_valid(&attrs.unicast_locator_list) {
            let bad = attrs
                .unicast_locator_list
                .iter()
                .find(|loc| !loc.is_valid())
                .copied()
                .unwrap_or(Locator::INVALID);
            log::error!("[PARTICIPANT] unicast locator list contains invalid locator {}", bad);
            return Err(Error::InvalidLocator(bad));
        }
        if !list_is_valid(&attrs.multicast_locator_list) {
            let bad = attrs
                .multicast_locator_list
                .iter()
                .find(|loc| !loc.is_valid())
                .copied()
                .unwrap_or(Locator::INVALID);
            log::error!(
                "[PARTICIPANT] multicast locator list contains invalid locator {}",
                bad
            );
            return Err(Error::InvalidLocator(bad));
        }
        Ok(())
    }

    // ===== Discovery delegation =====

    /// Announce the endpoint to peers through built-in discovery.
    ///
    /// # Errors
    ///
    /// `DiscoveryInitFailed` when discovery is unavailable.
    pub fn register_writer(
        &self,
        writer: &Arc<LocalEndpoint>,
        topic: TopicAttributes,
        qos: EndpointQos,
    ) -> Result<()> {
        let builtin = self.builtin.lock();
        match builtin.as_ref() {
            Some(protocols) => protocols.add_local_writer(self, writer, topic, qos),
            None => Err(Error::DiscoveryInitFailed(
                "built-in discovery unavailable".to_string(),
            )),
        }
    }

    /// Announce the reader to peers through built-in discovery.
    ///
    /// # Errors
    ///
    /// `DiscoveryInitFailed` when discovery is unavailable.
    pub fn register_reader(
        &self,
        reader: &Arc<LocalEndpoint>,
        topic: TopicAttributes,
        qos: EndpointQos,
    ) -> Result<()> {
        let builtin = self.builtin.lock();
        match builtin.as_ref() {
            Some(protocols) => protocols.add_local_reader(self, reader, topic, qos),
            None => Err(Error::DiscoveryInitFailed(
                "built-in discovery unavailable".to_string(),
            )),
        }
    }

    /// Update the announced QoS of a registered writer.
    ///
    /// # Errors
    ///
    /// `DiscoveryInitFailed` when discovery is unavailable,
    /// `UnknownEndpoint` when the writer was never registered.
    pub fn update_local_writer(&self, writer: &Arc<LocalEndpoint>, qos: EndpointQos) -> Result<()> {
        let builtin = self.builtin.lock();
        match builtin.as_ref() {
            Some(protocols) => protocols.update_local_writer(self, writer, qos),
            None => Err(Error::DiscoveryInitFailed(
                "built-in discovery unavailable".to_string(),
            )),
        }
    }

    /// Update the announced QoS of a registered reader.
    ///
    /// # Errors
    ///
    /// See [`Participant::update_local_writer`].
    pub fn update_local_reader(&self, reader: &Arc<LocalEndpoint>, qos: EndpointQos) -> Result<()> {
        let builtin = self.builtin.lock();
        match builtin.as_ref() {
            Some(protocols) => protocols.update_local_reader(self, reader, qos),
            None => Err(Error::DiscoveryInitFailed(
                "built-in discovery unavailable".to_string(),
            )),
        }
    }

    /// Activate a remote endpoint known through static discovery.
    ///
    /// # Errors
    ///
    /// `InvalidConfig` unless static endpoint discovery is configured.
    pub fn new_remote_endpoint_discovered(
        &self,
        guid: GUID,
        user_defined_id: i16,
        kind: EndpointKind,
    ) -> Result<()> {
        if !self
            .state
            .lock()
            .attrs
            .builtin
            .use_static_endpoint_discovery
        {
            log::warn!(
                "[PARTICIPANT] remote endpoints can only be activated with static discovery"
            );
            return Err(Error::InvalidConfig(
                "static endpoint discovery is not configured".to_string(),
            ));
        }
        let builtin = self.builtin.lock();
        match builtin.as_ref() {
            Some(protocols) => {
                protocols.new_remote_endpoint_statically_discovered(guid, user_defined_id, kind)
            }
            None => Err(Error::DiscoveryInitFailed(
                "built-in discovery unavailable".to_string(),
            )),
        }
    }

    /// Send one participant announcement now.
    pub fn announce_state(&self) {
        let builtin = self.builtin.lock();
        match builtin.as_ref() {
            Some(protocols) => protocols.announce(self),
            None => log::warn!("[PARTICIPANT] announce ignored, discovery unavailable"),
        }
    }

    /// Stop the periodic participant announcement.
    pub fn stop_announcement(&self) {
        if let Some(protocols) = self.builtin.lock().as_ref() {
            protocols.stop_announcement(self);
        }
    }

    /// Restart the periodic announcement phase from now.
    pub fn reset_announcement(&self) {
        if let Some(protocols) = self.builtin.lock().as_ref() {
            protocols.reset_announcement(self);
        }
    }

    /// Refresh the liveliness lease of a remote participant.
    pub fn assert_remote_liveliness(&self, prefix: GuidPrefix) {
        if let Some(protocols) = self.builtin.lock().as_ref() {
            protocols.assert_remote_liveliness(prefix);
        }
    }

    // ===== Send path =====

    /// Synchronously route a prepared message to `destination` through every
    /// pooled sender matching the endpoint's outbound locators. No queuing;
    /// reliability is implemented above this layer.
    pub fn send_sync(&self, message: &CdrMessage, endpoint: &LocalEndpoint, destination: &Locator) {
        let out_list = endpoint.attributes().out_locator_list;
        // Snapshot matching senders under the lock, send outside it.
        let senders = self.state.lock().matching_senders(&out_list);
        send::send_through(&senders, message, endpoint, destination);
    }

    // ===== Deletion and shutdown =====

    /// Remove a user endpoint: out of the indices, out of built-in
    /// discovery, out of every receiver control block; then garbage-collect
    /// blocks left without associated endpoints (default-locator blocks
    /// survive).
    ///
    /// # Errors
    ///
    /// `UnknownEndpoint` when the endpoint is not in the user indices.
    pub fn delete_user_endpoint(&self, endpoint: &Arc<LocalEndpoint>) -> Result<()> {
        let entity_id = endpoint.entity_id();
        let kind = endpoint.kind();

        let removed = self
            .registry
            .remove_user(entity_id, kind)
            .ok_or(Error::UnknownEndpoint(entity_id))?;

        if let Some(protocols) = self.builtin.lock().as_ref() {
            match kind {
                EndpointKind::Writer => protocols.remove_local_writer(&removed),
                EndpointKind::Reader => protocols.remove_local_reader(&removed),
            }
        }

        let mut state = self.state.lock();
        state.remove_endpoint_from_blocks(entity_id, kind);
        state.gc_receiver_blocks();
        drop(state);

        log::info!("[PARTICIPANT] removed endpoint {}", removed.guid());
        Ok(())
    }

    /// Pull a built-in endpoint out of the indices and control blocks
    /// (discovery teardown path).
    pub(crate) fn remove_builtin_endpoint(&self, endpoint: &Arc<LocalEndpoint>) {
        let entity_id = endpoint.entity_id();
        let kind = endpoint.kind();
        let _ = self.registry.remove_any(entity_id, kind);
        let mut state = self.state.lock();
        state.remove_endpoint_from_blocks(entity_id, kind);
        state.gc_receiver_blocks();
    }

    /// Tear the participant down: user endpoints first, then the built-in
    /// endpoints, then receivers, senders, and the event thread. Idempotent;
    /// also runs on drop.
    pub fn close(&self) {
        if self.stopping.swap(true, Ordering::SeqCst) {
            return;
        }
        log::info!("[PARTICIPANT] removing {}", self.guid);

        while let Some(endpoint) = self.registry.first_user_endpoint() {
            if self.delete_user_endpoint(&endpoint).is_err() {
                break;
            }
        }

        let protocols = self.builtin.lock().take();
        if let Some(protocols) = protocols {
            protocols.shutdown(self);
        }

        let mut state = self.state.lock();
        for block in &mut state.receivers {
            block.close();
        }
        state.receivers.clear();
        state.senders.clear();
        state.sender_locators.clear();
        drop(state);

        self.event.shutdown();
    }
}

impl Drop for Participant {
    fn drop(&mut self) {
        self.close();
    }
}

impl fmt::Debug for Participant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Participant({})", self.guid)
    }
}
