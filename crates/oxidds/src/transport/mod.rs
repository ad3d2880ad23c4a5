// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Transport abstraction for the participant core.
//!
//! The participant never touches sockets directly. A [`NetworkFactory`] turns
//! a locator into zero or more receiver/sender resources; the participant
//! wraps receivers in control blocks with listener threads and pools senders
//! per outbound binding locator.

/// RTPS port arithmetic (Sec.9.6.1.1).
pub mod ports;
/// UDPv4 factory and resources.
pub mod udp;

#[cfg(test)]
pub(crate) mod testing;

use std::io;

use crate::core::types::Locator;

/// Outcome of a blocking receive.
pub enum Received {
    /// A datagram arrived from the given source locator. The caller's buffer
    /// holds its payload.
    Datagram(Locator),
    /// The resource was closed; the listener loop must exit.
    Closed,
}

/// An inbound transport handle bound to one listen locator.
///
/// `receive` blocks until a datagram arrives or the resource is closed;
/// cancellation is observed as [`Received::Closed`]. Implementations must be
/// safe to `close` from another thread while a receive is in progress.
pub trait ReceiverResource: Send + Sync {
    /// Whether datagrams addressed to `locator` arrive on this resource.
    fn supports(&self, locator: &Locator) -> bool;

    /// Blocking receive into `buffer` (cleared and filled by the call).
    fn receive(&self, buffer: &mut Vec<u8>) -> Received;

    /// Unblock any in-progress receive and refuse further ones.
    fn close(&self);

    /// The locator this resource is listening on (after any port rebinding).
    fn listen_locator(&self) -> Locator;
}

/// An outbound transport handle bound to one sending interface.
pub trait SenderResource: Send + Sync {
    /// Whether this resource can carry traffic for `locator`.
    fn supports(&self, locator: &Locator) -> bool;

    /// Send `data` to the wire destination. Bounded blocking, fire-and-forget.
    ///
    /// # Errors
    ///
    /// Returns the underlying socket error; callers log and continue.
    fn send(&self, data: &[u8], destination: &Locator) -> io::Result<usize>;
}

/// Builds transport resources for locators.
///
/// Both build methods return the resources they just instantiated; an empty
/// vector means the locator cannot be serviced (unsupported kind, or the
/// requested port is taken). The participant reacts by adapting the locator
/// (construction) or skipping it (endpoint binding).
pub trait NetworkFactory: Send + Sync {
    fn build_receiver_resources(
        &self,
        locator: &Locator,
        buffer_size: u32,
    ) -> Vec<std::sync::Arc<dyn ReceiverResource>>;

    fn build_sender_resources(&self, locator: &Locator)
        -> Vec<std::sync::Arc<dyn SenderResource>>;
}
