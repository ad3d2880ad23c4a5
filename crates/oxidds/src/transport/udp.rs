// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! UDPv4 transport resources.
//!
//! Receiver resources are bound sockets with a short read timeout so a
//! blocked receive can observe the closed flag; multicast locators join the
//! group on the default interface. Sender resources are ephemeral-port
//! sockets selected per outbound binding locator.

use std::io;
use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4, UdpSocket};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use socket2::{Domain, Protocol, Socket, Type};

use crate::config::{MAX_PACKET_SIZE, RECEIVE_POLL_INTERVAL};
use crate::core::types::{Locator, LocatorKind};
use crate::transport::{NetworkFactory, Received, ReceiverResource, SenderResource};

/// Factory producing UDPv4 resources.
///
/// Locators of any other kind yield no resources; the participant is expected
/// to adapt or skip them.
#[derive(Default)]
pub struct UdpFactory;

impl UdpFactory {
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    fn bind_receive_socket(locator: &Locator, buffer_size: u32) -> io::Result<UdpSocket> {
        let socket = Socket::new(Domain::IPV4, Type::DGRAM, Some(Protocol::UDP))?;
        socket.set_recv_buffer_size(buffer_size as usize)?;

        let port = u16::try_from(locator.port)
            .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "port out of range"))?;

        if locator.is_multicast() {
            // Multicast: reuse-address + wildcard bind so several
            // participants on the host can share the group port.
            socket.set_reuse_address(true)?;
            let bind = SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, port);
            socket.bind(&SocketAddr::from(bind).into())?;
            let group = Ipv4Addr::from(locator.ipv4_octets());
            socket.join_multicast_v4(&group, &Ipv4Addr::UNSPECIFIED)?;
            socket.set_multicast_loop_v4(true)?;
        } else {
            // Unicast binds stay exclusive: a taken port must fail here so
            // the participant's locator adaptation can observe it.
            let ip = Ipv4Addr::from(locator.ipv4_octets());
            let bind = SocketAddrV4::new(ip, port);
            socket.bind(&SocketAddr::from(bind).into())?;
        }

        let socket: UdpSocket = socket.into();
        socket.set_read_timeout(Some(RECEIVE_POLL_INTERVAL))?;
        Ok(socket)
    }
}

impl NetworkFactory for UdpFactory {
    fn build_receiver_resources(
        &self,
        locator: &Locator,
        buffer_size: u32,
    ) -> Vec<Arc<dyn ReceiverResource>> {
        if locator.kind != LocatorKind::Udpv4 {
            log::debug!("[UDP] no receiver built, unsupported kind {}", locator);
            return Vec::new();
        }
        match Self::bind_receive_socket(locator, buffer_size) {
            Ok(socket) => {
                log::debug!("[UDP] receiver bound {}", locator);
                vec![Arc::new(UdpReceiverResource {
                    socket,
                    locator: *locator,
                    closed: AtomicBool::new(false),
                })]
            }
            Err(err) => {
                log::debug!("[UDP] receiver bind failed {}: {}", locator, err);
                Vec::new()
            }
        }
    }

    fn build_sender_resources(&self, locator: &Locator) -> Vec<Arc<dyn SenderResource>> {
        if locator.kind != LocatorKind::Udpv4 {
            log::debug!("[UDP] no sender built, unsupported kind {}", locator);
            return Vec::new();
        }
        // Bind the requested interface; port 0 lets the OS pick an ephemeral
        // source port, which is the common case for outbound resources.
        let ip = Ipv4Addr::from(locator.ipv4_octets());
        let port = u16::try_from(locator.port).unwrap_or(0);
        match UdpSocket::bind(SocketAddrV4::new(ip, port)) {
            Ok(socket) => {
                log::debug!("[UDP] sender bound {}", locator);
                vec![Arc::new(UdpSenderResource {
                    socket,
                    locator: *locator,
                })]
            }
            Err(err) => {
                log::warn!("[UDP] sender bind failed {}: {}", locator, err);
                Vec::new()
            }
        }
    }
}

/// One bound receive socket.
pub struct UdpReceiverResource {
    socket: UdpSocket,
    locator: Locator,
    closed: AtomicBool,
}

impl ReceiverResource for UdpReceiverResource {
    fn supports(&self, locator: &Locator) -> bool {
        // Port identity is the match criterion: one covered locator is enough
        // for the endpoint association, regardless of which interface the
        // datagram arrives on.
        locator.kind == LocatorKind::Udpv4 && locator.port == self.locator.port
    }

    fn receive(&self, buffer: &mut Vec<u8>) -> Received {
        buffer.clear();
        buffer.resize(MAX_PACKET_SIZE, 0);
        loop {
            if self.closed.load(Ordering::Relaxed) {
                buffer.clear();
                return Received::Closed;
            }
            match self.socket.recv_from(buffer) {
                Ok((len, source)) => {
                    buffer.truncate(len);
                    return Received::Datagram(Locator::from_socket_addr(&source));
                }
                Err(err)
                    if err.kind() == io::ErrorKind::WouldBlock
                        || err.kind() == io::ErrorKind::TimedOut
                        || err.kind() == io::ErrorKind::Interrupted =>
                {
                    // Timed poll so the closed flag is observed promptly.
                }
                Err(err) => {
                    log::debug!("[UDP] recv error on {}: {}", self.locator, err);
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

/// One outbound socket bound to a sending interface.
pub struct UdpSenderResource {
    socket: UdpSocket,
    locator: Locator,
}

impl SenderResource for UdpSenderResource {
    fn supports(&self, locator: &Locator) -> bool {
        locator.kind == LocatorKind::Udpv4
    }

    fn send(&self, data: &[u8], destination: &Locator) -> io::Result<usize> {
        let dest = destination.to_socket_addr().ok_or_else(|| {
            io::Error::new(io::ErrorKind::InvalidInput, "destination has no socket form")
        })?;
        self.socket.send_to(data, dest)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_receiver_unsupported_kind() {
        let factory = UdpFactory::new();
        let v6 = Locator {
            kind: LocatorKind::Udpv6,
            port: 28000,
            address: [0; 16],
        };
        assert!(factory.build_receiver_resources(&v6, 65536).is_empty());
    }

    #[test]
    fn test_receiver_bind_and_close() {
        let factory = UdpFactory::new();
        let loc = Locator::udpv4([127, 0, 0, 1], 28412);
        let resources = factory.build_receiver_resources(&loc, 65536);
        assert_eq!(resources.len(), 1, "loopback bind should succeed");
        let receiver = &resources[0];
        assert!(receiver.supports(&loc));
        assert!(!receiver.supports(&Locator::udpv4([127, 0, 0, 1], 28413)));

        receiver.close();
        let mut buf = Vec::new();
        assert!(
            matches!(receiver.receive(&mut buf), Received::Closed),
            "closed receiver must report Closed"
        );
        assert!(buf.is_empty());
    }

    #[test]
    fn test_unicast_port_in_use_yields_empty() {
        let factory = UdpFactory::new();
        let loc = Locator::udpv4([127, 0, 0, 1], 28414);
        let first = factory.build_receiver_resources(&loc, 65536);
        assert_eq!(first.len(), 1);
        let second = factory.build_receiver_resources(&loc, 65536);
        assert!(
            second.is_empty(),
            "rebinding a taken unicast port must yield no resources"
        );
    }

    #[test]
    fn test_sender_loopback_round_trip() {
        let factory = UdpFactory::new();
        let listen = Locator::udpv4([127, 0, 0, 1], 28415);
        let receivers = factory.build_receiver_resources(&listen, 65536);
        assert_eq!(receivers.len(), 1);

        let senders = factory.build_sender_resources(&Locator::udpv4([127, 0, 0, 1], 0));
        assert_eq!(senders.len(), 1);
        senders[0]
            .send(b"ping", &listen)
            .expect("loopback send should succeed");

        let mut buf = Vec::new();
        match receivers[0].receive(&mut buf) {
            Received::Datagram(source) => {
                assert_eq!(buf, b"ping");
                assert_eq!(source.kind, LocatorKind::Udpv4);
            }
            Received::Closed => panic!("expected a datagram, got Closed"),
        }
    }
}
