// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Scriptable transport fakes for unit tests.
//!
//! The fake factory reproduces the bind semantics the participant relies on:
//! a unicast port can be bound once, ports on the deny list never bind, and
//! multicast ports are shared.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use crossbeam::channel::{unbounded, Receiver, RecvTimeoutError, Sender};
use parking_lot::Mutex;

use crate::core::types::{Locator, LocatorKind};
use crate::transport::{NetworkFactory, Received, ReceiverResource, SenderResource};

/// In-memory receiver resource; datagrams are injected by the test.
pub(crate) struct FakeReceiverResource {
    locator: Locator,
    tx: Sender<(Vec<u8>, Locator)>,
    rx: Receiver<(Vec<u8>, Locator)>,
    closed: AtomicBool,
}

impl FakeReceiverResource {
    pub(crate) fn new(locator: Locator) -> Self {
        let (tx, rx) = unbounded();
        Self {
            locator,
            tx,
            rx,
            closed: AtomicBool::new(false),
        }
    }

    /// Hand a datagram to the next `receive` call.
    pub(crate) fn inject(&self, data: Vec<u8>, source: Locator) {
        let _ = self.tx.send((data, source));
    }
}

impl ReceiverResource for FakeReceiverResource {
    fn supports(&self, locator: &Locator) -> bool {
        locator.kind == self.locator.kind && locator.port == self.locator.port
    }

    fn receive(&self, buffer: &mut Vec<u8>) -> Received {
        loop {
            if self.closed.load(Ordering::Relaxed) {
                buffer.clear();
                return Received::Closed;
            }
            match self.rx.recv_timeout(std::time::Duration::from_millis(20)) {
                Ok((data, source)) => {
                    buffer.clear();
                    buffer.extend_from_slice(&data);
                    return Received::Datagram(source);
                }
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => {
                    buffer.clear();
                    return Received::Closed;
                }
            }
        }
    }

    fn close(&self) {
        self.closed.store(true, Ordering::Relaxed);
    }

    fn listen_locator(&self) -> Locator {
        self.locator
    }
}

/// Records every send instead of touching the network.
pub(crate) struct FakeSenderResource {
    locator: Locator,
    pub(crate) sent: Mutex<Vec<(Vec<u8>, Locator)>>,
}

impl FakeSenderResource {
    pub(crate) fn new(locator: Locator) -> Self {
        Self {
            locator,
            sent: Mutex::new(Vec::new()),
        }
    }
}

impl SenderResource for FakeSenderResource {
    fn supports(&self, locator: &Locator) -> bool {
        locator.kind == self.locator.kind
    }

    fn send(&self, data: &[u8], destination: &Locator) -> std::io::Result<usize> {
        self.sent.lock().push((data.to_vec(), *destination));
        Ok(data.len())
    }
}

/// Scriptable network factory.
#[derive(Default)]
pub(crate) struct FakeFactory {
    /// Ports that always fail to bind (drives locator adaptation).
    unavailable_ports: Mutex<HashSet<u32>>,
    /// Unicast ports already bound by a previous build.
    bound_ports: Mutex<HashSet<u32>>,
    pub(crate) receiver_builds: AtomicUsize,
    pub(crate) sender_builds: AtomicUsize,
    pub(crate) receivers: Mutex<Vec<Arc<FakeReceiverResource>>>,
    pub(crate) senders: Mutex<Vec<Arc<FakeSenderResource>>>,
}

impl FakeFactory {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn with_unavailable_ports(ports: &[u32]) -> Self {
        let factory = Self::default();
        factory.unavailable_ports.lock().extend(ports.iter().copied());
        factory
    }
}

impl NetworkFactory for FakeFactory {
    fn build_receiver_resources(
        &self,
        locator: &Locator,
        _buffer_size: u32,
    ) -> Vec<Arc<dyn ReceiverResource>> {
        self.receiver_builds.fetch_add(1, Ordering::Relaxed);
        if locator.kind != LocatorKind::Udpv4 {
            return Vec::new();
        }
        if self.unavailable_ports.lock().contains(&locator.port) {
            return Vec::new();
        }
        if !locator.is_multicast() && !self.bound_ports.lock().insert(locator.port) {
            // Unicast port already taken.
            return Vec::new();
        }
        let resource = Arc::new(FakeReceiverResource::new(*locator));
        self.receivers.lock().push(Arc::clone(&resource));
        vec![resource]
    }

    fn build_sender_resources(&self, locator: &Locator) -> Vec<Arc<dyn SenderResource>> {
        self.sender_builds.fetch_add(1, Ordering::Relaxed);
        if locator.kind != LocatorKind::Udpv4 {
            return Vec::new();
        }
        let resource = Arc::new(FakeSenderResource::new(*locator));
        self.senders.lock().push(Arc::clone(&resource));
        vec![resource]
    }
}
