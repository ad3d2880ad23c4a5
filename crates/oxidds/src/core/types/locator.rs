// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Locators: transport addresses in RTPS form.
//!
//! A locator is a `(kind, port, 16-byte address)` triple. IPv4 addresses
//! occupy the last four address bytes; the wire layout (when the codec
//! serializes one) is `kind: i32, port: u32, address: [u8; 16]`, little-endian.

use std::fmt;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};

/// Transport kind discriminant (RTPS locator kinds).
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
#[repr(i32)]
pub enum LocatorKind {
    Invalid = -1,
    Reserved = 0,
    Udpv4 = 1,
    Udpv6 = 2,
}

/// A transport endpoint address.
#[derive(Copy, Clone, Eq, PartialEq, Hash)]
pub struct Locator {
    pub kind: LocatorKind,
    pub port: u32,
    pub address: [u8; 16],
}

impl Locator {
    /// An invalid placeholder locator.
    pub const INVALID: Locator = Locator {
        kind: LocatorKind::Invalid,
        port: 0,
        address: [0; 16],
    };

    /// UDPv4 locator for a concrete address.
    #[must_use]
    pub fn udpv4(ip: [u8; 4], port: u16) -> Self {
        let mut address = [0u8; 16];
        address[12..16].copy_from_slice(&ip);
        Self {
            kind: LocatorKind::Udpv4,
            port: u32::from(port),
            address,
        }
    }

    /// UDPv4 locator on the unspecified address (listen on every interface).
    #[must_use]
    pub fn udpv4_any(port: u16) -> Self {
        Self::udpv4([0, 0, 0, 0], port)
    }

    /// As [`Locator::udpv4_any`] but keeping the 32-bit port the RTPS port
    /// formula produces.
    #[must_use]
    pub(crate) fn udpv4_any_raw(port: u32) -> Self {
        Self {
            kind: LocatorKind::Udpv4,
            port,
            address: [0; 16],
        }
    }

    /// Validity per the participant input contract: known kind and a port in
    /// the 16-bit range. The zero address is allowed (it means "any").
    #[must_use]
    pub fn is_valid(&self) -> bool {
        !matches!(self.kind, LocatorKind::Invalid) && self.port > 0 && self.port <= 65535
    }

    /// True for UDPv4 administratively/locally scoped multicast groups.
    #[must_use]
    pub fn is_multicast(&self) -> bool {
        match self.kind {
            LocatorKind::Udpv4 => (224..=239).contains(&self.address[12]),
            LocatorKind::Udpv6 => self.address[0] == 0xFF,
            _ => false,
        }
    }

    /// True when the address bytes are all zero ("any interface").
    #[must_use]
    pub fn is_any_address(&self) -> bool {
        self.address.iter().all(|&b| b == 0)
    }

    /// IPv4 octets for a UDPv4 locator.
    #[must_use]
    pub fn ipv4_octets(&self) -> [u8; 4] {
        [
            self.address[12],
            self.address[13],
            self.address[14],
            self.address[15],
        ]
    }

    /// Convert to a socket address, if the kind maps to one.
    #[must_use]
    pub fn to_socket_addr(&self) -> Option<SocketAddr> {
        let port = u16::try_from(self.port).ok()?;
        match self.kind {
            LocatorKind::Udpv4 => Some(SocketAddr::new(
                IpAddr::V4(Ipv4Addr::from(self.ipv4_octets())),
                port,
            )),
            LocatorKind::Udpv6 => Some(SocketAddr::new(
                IpAddr::V6(Ipv6Addr::from(self.address)),
                port,
            )),
            _ => None,
        }
    }

    /// Build a locator from a datagram source address.
    #[must_use]
    pub fn from_socket_addr(addr: &SocketAddr) -> Self {
        match addr.ip() {
            IpAddr::V4(v4) => Self::udpv4(v4.octets(), addr.port()),
            IpAddr::V6(v6) => Self {
                kind: LocatorKind::Udpv6,
                port: u32::from(addr.port()),
                address: v6.octets(),
            },
        }
    }
}

/// True iff every locator in the list is valid. Empty lists are valid.
#[must_use]
pub(crate) fn list_is_valid(list: &[Locator]) -> bool {
    list.iter().all(Locator::is_valid)
}

impl fmt::Display for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            LocatorKind::Udpv4 => {
                let ip = self.ipv4_octets();
                write!(
                    f,
                    "UDPv4:{}.{}.{}.{}:{}",
                    ip[0], ip[1], ip[2], ip[3], self.port
                )
            }
            LocatorKind::Udpv6 => write!(
                f,
                "UDPv6:[{}]:{}",
                Ipv6Addr::from(self.address),
                self.port
            ),
            LocatorKind::Reserved => write!(f, "RESERVED:{}", self.port),
            LocatorKind::Invalid => write!(f, "INVALID"),
        }
    }
}

impl fmt::Debug for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Locator({})", self)
    }
}
