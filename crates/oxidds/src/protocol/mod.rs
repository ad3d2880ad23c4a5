// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Minimal RTPS wire layer consumed by the participant core.
//!
//! `CdrMessage` builds outgoing messages (header plus DATA / HEARTBEAT /
//! ACKNACK / GAP submessages); `MessageReceiver` validates incoming
//! datagrams and dispatches decoded submessages to the endpoints associated
//! with a receiver control block.

pub mod message;
pub mod receiver;

pub use message::CdrMessage;
pub use receiver::{MessageReceiver, RtpsEvent};

// Submessage ids (RTPS Sec.8.3.7).
pub(crate) const SUBMSG_ACKNACK: u8 = 0x06;
pub(crate) const SUBMSG_HEARTBEAT: u8 = 0x07;
pub(crate) const SUBMSG_GAP: u8 = 0x08;
pub(crate) const SUBMSG_INFO_TS: u8 = 0x09;
pub(crate) const SUBMSG_INFO_DST: u8 = 0x0E;
pub(crate) const SUBMSG_DATA: u8 = 0x15;

/// Endianness flag: bit 0 set means little-endian submessage encoding.
pub(crate) const FLAG_ENDIANNESS: u8 = 0x01;
