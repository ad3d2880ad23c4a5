// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Sender resource pool and the synchronous send path.
//!
//! Senders are pooled per requested binding locator so repeated endpoint
//! creation does not multiply sockets. `send_sync` enumerates the endpoint's
//! outbound locators to pick the binding interface; the destination locator
//! is the wire target.

use std::sync::Arc;

use crate::core::types::Locator;
use crate::participant::endpoint::LocalEndpoint;
use crate::participant::ParticipantState;
use crate::protocol::CdrMessage;
use crate::transport::SenderResource;

impl ParticipantState {
    /// Build sender resources for the endpoint's outbound locators, falling
    /// back to the participant defaults (or a single any-interface UDPv4
    /// locator) when the endpoint supplies none. The effective list is
    /// written back into the endpoint attributes so the send path enumerates
    /// what was actually provisioned.
    pub(crate) fn create_sender_resources(&mut self, endpoint: &LocalEndpoint) {
        let attrs = endpoint.attributes();
        let out_list: Vec<Locator> = if attrs.out_locator_list.is_empty() {
            if self.attrs.default_out_locator_list.is_empty() {
                // Ephemeral-port sender on the unspecified interface.
                vec![Locator::udpv4_any(0)]
            } else {
                self.attrs.default_out_locator_list.clone()
            }
        } else {
            attrs.out_locator_list.clone()
        };

        for locator in &out_list {
            // Dedup by (kind, bind address): one socket per binding locator.
            if !self.sender_locators.insert(*locator) {
                continue;
            }
            let new_senders = self.factory.build_sender_resources(locator);
            if new_senders.is_empty() {
                log::warn!("[PARTICIPANT] no sender resource for {}", locator);
                self.sender_locators.remove(locator);
                continue;
            }
            self.senders.extend(new_senders);
        }

        endpoint.set_out_locators(out_list);
    }

    /// Snapshot the senders able to carry traffic for any of `out_list`,
    /// so the actual socket writes happen outside the participant lock.
    pub(crate) fn matching_senders(
        &self,
        out_list: &[Locator],
    ) -> Vec<(Locator, Arc<dyn SenderResource>)> {
        let mut matches = Vec::new();
        for out_locator in out_list {
            for sender in &self.senders {
                if sender.supports(out_locator) {
                    matches.push((*out_locator, Arc::clone(sender)));
                }
            }
        }
        matches
    }
}

/// Route a prepared message through every sender matching the endpoint's
/// outbound locators. Fire-and-forget: send errors are logged, reliability
/// lives above this layer.
pub(crate) fn send_through(
    senders: &[(Locator, Arc<dyn SenderResource>)],
    message: &CdrMessage,
    endpoint: &LocalEndpoint,
    destination: &Locator,
) {
    for (out_locator, sender) in senders {
        match sender.send(message.as_bytes(), destination) {
            Ok(sent) => log::debug!(
                "[PARTICIPANT] sent {} bytes for {} via {} -> {}",
                sent,
                endpoint.guid(),
                out_locator,
                destination
            ),
            Err(err) => log::warn!(
                "[PARTICIPANT] send failed for {} via {} -> {}: {}",
                endpoint.guid(),
                out_locator,
                destination,
                err
            ),
        }
    }
}
