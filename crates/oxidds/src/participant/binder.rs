// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Locator binding policy.
//!
//! Associates endpoints with receiver control blocks by locator match,
//! substituting participant defaults for non-built-in endpoints that supply
//! no locators at all, and creating new blocks through the network factory
//! when no existing one covers a requested locator.

use std::sync::Arc;

use crate::config::UDPV4_PORT_ADAPT_STEP;
use crate::core::types::{EndpointKind, EntityId, GuidPrefix, Locator, LocatorKind};
use crate::participant::endpoint::LocalEndpoint;
use crate::participant::registry::EndpointRegistry;
use crate::participant::receiver::ReceiverControlBlock;
use crate::participant::{Error, ParticipantState, Result};

/// Mutate a locator whose port could not be bound and return the adapted one.
///
/// UDPv4 advances the port by a fixed step. No rule exists for UDPv6.
///
/// # Errors
///
/// `ReceiverBindFailed` for locator kinds without an adaptation rule.
pub(crate) fn apply_locator_adapt_rule(locator: Locator) -> Result<Locator> {
    match locator.kind {
        LocatorKind::Udpv4 => {
            let mut adapted = locator;
            adapted.port += UDPV4_PORT_ADAPT_STEP;
            Ok(adapted)
        }
        _ => Err(Error::ReceiverBindFailed(locator)),
    }
}

impl ParticipantState {
    /// Ensure the endpoint's effective inbound locators are covered by
    /// receiver control blocks, creating new ones through the factory where
    /// no existing block matches, then associate the endpoint and launch any
    /// listener thread not yet running.
    ///
    /// # Errors
    ///
    /// `ReceiverBindFailed` when no block ends up referencing the endpoint.
    pub(crate) fn create_and_associate_receivers(
        &mut self,
        endpoint: &Arc<LocalEndpoint>,
        is_builtin: bool,
        prefix: GuidPrefix,
        registry: &Arc<EndpointRegistry>,
    ) -> Result<()> {
        let attrs = endpoint.attributes();

        // Resource creation uses the endpoint lists, or the participant
        // defaults when a list is empty.
        let unicast = if attrs.unicast_locator_list.is_empty() {
            self.attrs.default_unicast_locator_list.clone()
        } else {
            attrs.unicast_locator_list.clone()
        };
        let multicast = if attrs.multicast_locator_list.is_empty() {
            self.attrs.default_multicast_locator_list.clone()
        } else {
            attrs.multicast_locator_list.clone()
        };

        for locator in unicast.iter().chain(multicast.iter()) {
            if self.receivers.iter().any(|block| block.supports(locator)) {
                continue;
            }
            let resources = self
                .factory
                .build_receiver_resources(locator, self.attrs.listen_socket_buffer_size);
            if resources.is_empty() {
                log::debug!("[PARTICIPANT] no receiver resource for {}", locator);
            }
            for resource in resources {
                self.receivers
                    .push(ReceiverControlBlock::new(resource, false));
            }
        }

        // Associate with all blocks, not just the new ones.
        self.assign_endpoint_listen_resources(endpoint, is_builtin);

        self.spawn_pending_listeners(prefix, registry)?;

        if !self
            .receivers
            .iter()
            .any(|block| block.references(endpoint.entity_id()))
        {
            let failed = unicast
                .first()
                .or_else(|| multicast.first())
                .copied()
                .unwrap_or(Locator::INVALID);
            log::error!(
                "[PARTICIPANT] endpoint {} has no covering receiver ({})",
                endpoint.guid(),
                failed
            );
            return Err(Error::ReceiverBindFailed(failed));
        }
        Ok(())
    }

    /// Launch listener threads for every block not yet running one.
    pub(crate) fn spawn_pending_listeners(
        &mut self,
        prefix: GuidPrefix,
        registry: &Arc<EndpointRegistry>,
    ) -> Result<()> {
        let buffer_size = self.attrs.listen_socket_buffer_size;
        for block in self.receivers.iter_mut().filter(|b| !b.thread_running()) {
            block
                .spawn_listener(prefix, Arc::clone(registry), buffer_size)
                .map_err(Error::Io)?;
        }
        Ok(())
    }

    /// Associate the endpoint with blocks covering its effective locator
    /// lists, substituting (and writing back) participant defaults when the
    /// endpoint is not built-in and supplies neither unicast nor multicast
    /// locators.
    pub(crate) fn assign_endpoint_listen_resources(
        &self,
        endpoint: &LocalEndpoint,
        is_builtin: bool,
    ) {
        let attrs = endpoint.attributes();
        let unicast_empty = attrs.unicast_locator_list.is_empty();
        let multicast_empty = attrs.multicast_locator_list.is_empty();

        if unicast_empty && !is_builtin && multicast_empty {
            let kind = match endpoint.kind() {
                EndpointKind::Writer => "WRITER",
                EndpointKind::Reader => "READER",
            };
            log::info!("[PARTICIPANT] adding default locator list to this {}", kind);
            let defaults = self.attrs.default_unicast_locator_list.clone();
            self.assign_endpoint_to_locator_list(endpoint, &defaults);
            endpoint.set_unicast_locators(defaults);
        } else {
            self.assign_endpoint_to_locator_list(endpoint, &attrs.unicast_locator_list);
        }

        if multicast_empty && !is_builtin && unicast_empty {
            let defaults = self.attrs.default_multicast_locator_list.clone();
            self.assign_endpoint_to_locator_list(endpoint, &defaults);
            endpoint.set_multicast_locators(defaults);
        } else {
            self.assign_endpoint_to_locator_list(endpoint, &attrs.multicast_locator_list);
        }
    }

    /// Add the endpoint to the first block supporting any locator in `list`.
    ///
    /// One covered locator is enough for the match; receiver resources that
    /// listen on several interfaces are represented by any one of them.
    fn assign_endpoint_to_locator_list(&self, endpoint: &LocalEndpoint, list: &[Locator]) {
        for locator in list {
            for block in &self.receivers {
                if block.supports(locator) {
                    if block.associate(endpoint) {
                        log::debug!(
                            "[PARTICIPANT] associated {} with receiver for {}",
                            endpoint.guid(),
                            locator
                        );
                    }
                    return;
                }
            }
        }
    }

    /// Drop the endpoint from every receiver control block.
    pub(crate) fn remove_endpoint_from_blocks(&mut self, entity_id: EntityId, kind: EndpointKind) {
        for block in &self.receivers {
            block.dissociate(entity_id, kind);
        }
    }

    /// Destroy blocks that lost their last associated endpoint, keeping the
    /// ones created for the participant's default locators.
    pub(crate) fn gc_receiver_blocks(&mut self) {
        let mut kept = Vec::with_capacity(self.receivers.len());
        for block in self.receivers.drain(..) {
            if block.is_default() || block.has_associated_endpoints() {
                kept.push(block);
            } else {
                log::debug!("[PARTICIPANT] destroying idle receiver control block");
                // Dropping the block closes its resource and joins the
                // listener thread.
            }
        }
        self.receivers = kept;
    }
}
