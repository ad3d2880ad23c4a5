// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Endpoint and participant attributes.
//!
//! Participant attributes are fixed at construction; the participant only
//! rewrites its default locator lists when binding reveals that a requested
//! port was unavailable (locator adaptation).

use std::time::Duration;

use super::locator::Locator;
use crate::config::{
    DEFAULT_ANNOUNCEMENT_PERIOD, DEFAULT_LEASE_DURATION, DEFAULT_LISTEN_SOCKET_BUFFER_SIZE,
    DEFAULT_MUTATION_TRIES, DOMAIN_ID_GAIN, OFFSET_D0, OFFSET_D1, OFFSET_D2, OFFSET_D3,
    PARTICIPANT_ID_GAIN, PORT_BASE,
};

/// Whether an endpoint publishes or subscribes.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub enum EndpointKind {
    Writer,
    Reader,
}

/// Delivery contract of an endpoint.
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub enum ReliabilityKind {
    BestEffort,
    Reliable,
}

/// Whether samples on the endpoint's topic carry a key.
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub enum TopicKind {
    NoKey,
    WithKey,
}

/// Per-endpoint configuration.
#[derive(Clone, Debug)]
pub struct EndpointAttributes {
    pub kind: EndpointKind,
    pub reliability: ReliabilityKind,
    pub topic_kind: TopicKind,
    /// Inbound unicast locators. Empty means "use participant defaults"
    /// (for non-built-in endpoints whose multicast list is also empty).
    pub unicast_locator_list: Vec<Locator>,
    /// Inbound multicast locators, same substitution rule.
    pub multicast_locator_list: Vec<Locator>,
    /// Outbound binding locators; empty means "use participant defaults".
    pub out_locator_list: Vec<Locator>,
    /// Preferred explicit entity number for auto-allocated ids (0 = counter).
    pub entity_number: u32,
    /// User-defined id for static endpoint discovery (0 = unset).
    pub user_defined_id: i16,
}

impl EndpointAttributes {
    #[must_use]
    pub fn new(kind: EndpointKind, reliability: ReliabilityKind) -> Self {
        Self {
            kind,
            reliability,
            topic_kind: TopicKind::NoKey,
            unicast_locator_list: Vec::new(),
            multicast_locator_list: Vec::new(),
            out_locator_list: Vec::new(),
            entity_number: 0,
            user_defined_id: 0,
        }
    }

    /// Reliable writer with default locators.
    #[must_use]
    pub fn reliable_writer() -> Self {
        Self::new(EndpointKind::Writer, ReliabilityKind::Reliable)
    }

    /// Best-effort writer with default locators.
    #[must_use]
    pub fn best_effort_writer() -> Self {
        Self::new(EndpointKind::Writer, ReliabilityKind::BestEffort)
    }

    /// Reliable reader with default locators.
    #[must_use]
    pub fn reliable_reader() -> Self {
        Self::new(EndpointKind::Reader, ReliabilityKind::Reliable)
    }

    /// Best-effort reader with default locators.
    #[must_use]
    pub fn best_effort_reader() -> Self {
        Self::new(EndpointKind::Reader, ReliabilityKind::BestEffort)
    }
}

/// Parameters of the RTPS port formula.
///
/// `user unicast port = port_base + domain_id_gain * domain_id + offset_d3
///                      + participant_id_gain * participant_id`
#[derive(Copy, Clone, Debug)]
pub struct PortParameters {
    pub port_base: u16,
    pub domain_id_gain: u16,
    pub participant_id_gain: u16,
    pub offset_d0: u16,
    pub offset_d1: u16,
    pub offset_d2: u16,
    pub offset_d3: u16,
}

impl Default for PortParameters {
    fn default() -> Self {
        Self {
            port_base: PORT_BASE,
            domain_id_gain: DOMAIN_ID_GAIN,
            participant_id_gain: PARTICIPANT_ID_GAIN,
            offset_d0: OFFSET_D0,
            offset_d1: OFFSET_D1,
            offset_d2: OFFSET_D2,
            offset_d3: OFFSET_D3,
        }
    }
}

/// Built-in discovery configuration.
#[derive(Clone, Debug)]
pub struct BuiltinAttributes {
    /// Run participant discovery (SPDP) and create the built-in endpoints.
    /// When false the participant is non-discoverable.
    pub use_participant_discovery: bool,
    /// Simple endpoint discovery (SEDP endpoints are created).
    pub use_simple_endpoint_discovery: bool,
    /// Static endpoint discovery; gates `new_remote_endpoint_discovered`.
    pub use_static_endpoint_discovery: bool,
    /// Period of the repeating participant announcement.
    pub announcement_period: Duration,
    /// Lease duration advertised to peers.
    pub lease_duration: Duration,
    /// Metatraffic locators. Empty lists are filled in from the port formula
    /// when discovery initializes.
    pub metatraffic_unicast_locator_list: Vec<Locator>,
    pub metatraffic_multicast_locator_list: Vec<Locator>,
}

impl Default for BuiltinAttributes {
    fn default() -> Self {
        Self {
            use_participant_discovery: true,
            use_simple_endpoint_discovery: true,
            use_static_endpoint_discovery: false,
            announcement_period: DEFAULT_ANNOUNCEMENT_PERIOD,
            lease_duration: DEFAULT_LEASE_DURATION,
            metatraffic_unicast_locator_list: Vec::new(),
            metatraffic_multicast_locator_list: Vec::new(),
        }
    }
}

/// Participant configuration, fixed at construction.
#[derive(Clone, Debug)]
pub struct ParticipantAttributes {
    pub name: String,
    pub domain_id: u32,
    pub participant_id: u32,
    pub port: PortParameters,
    pub default_unicast_locator_list: Vec<Locator>,
    pub default_multicast_locator_list: Vec<Locator>,
    pub default_out_locator_list: Vec<Locator>,
    pub builtin: BuiltinAttributes,
    /// Size of each receiver's decoded-message scratch area and the requested
    /// kernel receive buffer for listen sockets.
    pub listen_socket_buffer_size: u32,
    /// Cap on locator adaptation retries during construction.
    pub mutation_tries: u32,
}

impl Default for ParticipantAttributes {
    fn default() -> Self {
        Self {
            name: "oxidds.participant".to_string(),
            domain_id: 0,
            participant_id: 0,
            port: PortParameters::default(),
            default_unicast_locator_list: Vec::new(),
            default_multicast_locator_list: Vec::new(),
            default_out_locator_list: Vec::new(),
            builtin: BuiltinAttributes::default(),
            listen_socket_buffer_size: DEFAULT_LISTEN_SOCKET_BUFFER_SIZE,
            mutation_tries: DEFAULT_MUTATION_TRIES,
        }
    }
}
