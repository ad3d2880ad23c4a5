// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Receiver control blocks and their listener threads.
//!
//! One block binds one receiver resource to its listener thread, its
//! decoded-message scratch area, and the set of endpoints subscribed to its
//! traffic. The block never owns endpoints: the associated sets hold entity
//! ids only, resolved against the registry on every delivery.

use std::sync::Arc;
use std::thread::JoinHandle;

use parking_lot::Mutex;

use crate::core::types::{EndpointKind, EntityId, GuidPrefix};
use crate::participant::endpoint::LocalEndpoint;
use crate::participant::registry::EndpointRegistry;
use crate::protocol::MessageReceiver;
use crate::transport::{Received, ReceiverResource};

/// Weak endpoint associations of one receiver control block.
#[derive(Default)]
pub(crate) struct AssociatedEndpoints {
    pub writers: Vec<EntityId>,
    pub readers: Vec<EntityId>,
}

/// Binds one receiver resource to its listener thread and associated
/// endpoints.
pub(crate) struct ReceiverControlBlock {
    /// Exclusively owned by this block; the listener thread holds a clone of
    /// the handle only for I/O and exits when the block closes it.
    resource: Arc<dyn ReceiverResource>,
    associated: Arc<Mutex<AssociatedEndpoints>>,
    thread: Option<JoinHandle<()>>,
    /// Blocks created for the participant's default locators survive
    /// endpoint-deletion garbage collection.
    default_resource: bool,
}

impl ReceiverControlBlock {
    pub(crate) fn new(resource: Arc<dyn ReceiverResource>, default_resource: bool) -> Self {
        Self {
            resource,
            associated: Arc::new(Mutex::new(AssociatedEndpoints::default())),
            thread: None,
            default_resource,
        }
    }

    pub(crate) fn supports(&self, locator: &crate::core::types::Locator) -> bool {
        self.resource.supports(locator)
    }

    pub(crate) fn is_default(&self) -> bool {
        self.default_resource
    }

    pub(crate) fn thread_running(&self) -> bool {
        self.thread.is_some()
    }

    /// Spawn the listener thread. Idempotent: a block whose thread is already
    /// running is left untouched, threads are never started twice.
    pub(crate) fn spawn_listener(
        &mut self,
        participant_prefix: GuidPrefix,
        registry: Arc<EndpointRegistry>,
        buffer_size: u32,
    ) -> std::io::Result<()> {
        if self.thread.is_some() {
            return Ok(());
        }
        let resource = Arc::clone(&self.resource);
        let associated = Arc::clone(&self.associated);
        let listen_locator = resource.listen_locator();

        let handle = std::thread::Builder::new()
            .name("oxidds-rtps-rx".to_string())
            .spawn(move || {
                log::debug!("[LISTENER] started on {}", listen_locator);
                let mut receiver = MessageReceiver::new(buffer_size);
                let mut buffer: Vec<u8> = Vec::new();
                // Explicit loop; never recurse back into the listen
                // operation.
                loop {
                    let source = match resource.receive(&mut buffer) {
                        Received::Datagram(source) => source,
                        Received::Closed => break,
                    };
                    if buffer.is_empty() {
                        // Zero-length read doubles as a cancellation signal.
                        break;
                    }
                    // Snapshot the associated sets under the block mutex so
                    // each iteration sees a consistent view, then drop the
                    // lock before decoding.
                    let (writers, readers) = {
                        let sets = associated.lock();
                        (sets.writers.clone(), sets.readers.clone())
                    };
                    receiver.process(
                        &participant_prefix,
                        &source,
                        &buffer,
                        &writers,
                        &readers,
                        &registry,
                    );
                }
                log::debug!("[LISTENER] exiting on {}", listen_locator);
            })?;
        self.thread = Some(handle);
        Ok(())
    }

    /// Add an endpoint to the matching associated set. Idempotent by entity
    /// id; returns false when it was already present.
    pub(crate) fn associate(&self, endpoint: &LocalEndpoint) -> bool {
        let mut sets = self.associated.lock();
        let list = match endpoint.kind() {
            EndpointKind::Writer => &mut sets.writers,
            EndpointKind::Reader => &mut sets.readers,
        };
        let id = endpoint.entity_id();
        if list.contains(&id) {
            return false;
        }
        list.push(id);
        true
    }

    /// Drop an endpoint from the associated sets.
    pub(crate) fn dissociate(&self, entity_id: EntityId, kind: EndpointKind) {
        let mut sets = self.associated.lock();
        match kind {
            EndpointKind::Writer => sets.writers.retain(|id| *id != entity_id),
            EndpointKind::Reader => sets.readers.retain(|id| *id != entity_id),
        }
    }

    pub(crate) fn references(&self, entity_id: EntityId) -> bool {
        let sets = self.associated.lock();
        sets.writers.contains(&entity_id) || sets.readers.contains(&entity_id)
    }

    pub(crate) fn has_associated_endpoints(&self) -> bool {
        let sets = self.associated.lock();
        !sets.writers.is_empty() || !sets.readers.is_empty()
    }

    /// Close the resource and join the listener thread.
    pub(crate) fn close(&mut self) {
        self.resource.close();
        if let Some(handle) = self.thread.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for ReceiverControlBlock {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::{EndpointAttributes, Locator, GUID};
    use crate::participant::endpoint::ReaderHistory;
    use crate::transport::testing::FakeReceiverResource;

    fn make_reader(id: EntityId) -> LocalEndpoint {
        LocalEndpoint::new_reader(
            GUID::new(GuidPrefix([1; 12]), id),
            EndpointAttributes::best_effort_reader(),
            ReaderHistory::default(),
            None,
            EntityId::UNKNOWN,
        )
    }

    #[test]
    fn test_associate_idempotent_by_entity_id() {
        let resource = Arc::new(FakeReceiverResource::new(Locator::udpv4_any(7411)));
        let block = ReceiverControlBlock::new(resource, false);
        let reader = make_reader(EntityId([1, 0, 0, 0x04]));

        assert!(block.associate(&reader));
        assert!(!block.associate(&reader), "second association is a no-op");
        assert!(block.references(reader.entity_id()));
        assert!(block.has_associated_endpoints());

        block.dissociate(reader.entity_id(), EndpointKind::Reader);
        assert!(!block.has_associated_endpoints());
    }

    #[test]
    fn test_listener_started_exactly_once() {
        let resource = Arc::new(FakeReceiverResource::new(Locator::udpv4_any(7411)));
        let registry = Arc::new(EndpointRegistry::new());
        let mut block = ReceiverControlBlock::new(resource, true);

        assert!(!block.thread_running());
        block
            .spawn_listener(GuidPrefix([1; 12]), Arc::clone(&registry), 65536)
            .expect("listener should spawn");
        assert!(block.thread_running());
        block
            .spawn_listener(GuidPrefix([1; 12]), registry, 65536)
            .expect("second spawn is a no-op");
        assert!(block.thread_running());

        block.close();
        assert!(!block.thread_running());
    }

    #[test]
    fn test_listener_delivers_to_associated_reader() {
        let resource = Arc::new(FakeReceiverResource::new(Locator::udpv4_any(7411)));
        let registry = Arc::new(EndpointRegistry::new());
        let reader = Arc::new(make_reader(EntityId([1, 0, 0, 0x04])));
        registry.register(Arc::clone(&reader), false);

        let mut block =
            ReceiverControlBlock::new(Arc::clone(&resource) as Arc<dyn ReceiverResource>, true);
        block.associate(&reader);
        block
            .spawn_listener(GuidPrefix([1; 12]), Arc::clone(&registry), 65536)
            .expect("listener should spawn");

        // A DATA message from a different participant prefix.
        let mut msg = crate::protocol::CdrMessage::new();
        msg.add_header(&GuidPrefix([9; 12]));
        msg.add_data(EntityId::UNKNOWN, EntityId([2, 0, 0, 0x03]), 1, b"hello");
        resource.inject(msg.as_bytes().to_vec(), Locator::udpv4([127, 0, 0, 1], 4000));

        // The fake resource hands the datagram to the next receive call.
        let deadline = std::time::Instant::now() + std::time::Duration::from_secs(2);
        while reader.sample_count() == 0 && std::time::Instant::now() < deadline {
            std::thread::sleep(std::time::Duration::from_millis(5));
        }
        assert_eq!(reader.sample_count(), 1, "listener should deliver the sample");
        let sample = reader.take_sample().expect("sample present");
        assert_eq!(sample.payload, b"hello");

        block.close();
    }
}
