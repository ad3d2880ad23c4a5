// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! RTPS port mapping (OMG DDS-RTPS Sec.9.6.1.1).
//!
//! All ports derive from the participant's [`PortParameters`]; the default
//! parameters reproduce the well-known 7400-range layout.

use crate::config::MAX_DOMAIN_ID;
use crate::core::types::PortParameters;

/// Default user-data unicast port for a participant:
/// `port_base + domain_id_gain * domain_id + offset_d3 + participant_id_gain * participant_id`.
#[must_use]
pub fn default_user_unicast_port(
    params: &PortParameters,
    domain_id: u32,
    participant_id: u32,
) -> u32 {
    u32::from(params.port_base)
        + u32::from(params.domain_id_gain) * domain_id
        + u32::from(params.offset_d3)
        + u32::from(params.participant_id_gain) * participant_id
}

/// Metatraffic multicast port (SPDP): `port_base + domain_id_gain * domain_id + offset_d0`.
#[must_use]
pub fn metatraffic_multicast_port(params: &PortParameters, domain_id: u32) -> u32 {
    u32::from(params.port_base)
        + u32::from(params.domain_id_gain) * domain_id
        + u32::from(params.offset_d0)
}

/// Metatraffic unicast port (discovery responses):
/// `port_base + domain_id_gain * domain_id + offset_d1 + participant_id_gain * participant_id`.
#[must_use]
pub fn metatraffic_unicast_port(
    params: &PortParameters,
    domain_id: u32,
    participant_id: u32,
) -> u32 {
    u32::from(params.port_base)
        + u32::from(params.domain_id_gain) * domain_id
        + u32::from(params.offset_d1)
        + u32::from(params.participant_id_gain) * participant_id
}

/// Whether the domain id is inside the range the formula supports.
#[must_use]
pub fn domain_id_is_valid(domain_id: u32) -> bool {
    domain_id <= MAX_DOMAIN_ID
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_user_unicast_port_formula() {
        let params = PortParameters {
            port_base: 7400,
            domain_id_gain: 250,
            participant_id_gain: 2,
            offset_d0: 0,
            offset_d1: 10,
            offset_d2: 1,
            offset_d3: 3,
        };
        assert_eq!(default_user_unicast_port(&params, 0, 0), 7403);
        assert_eq!(default_user_unicast_port(&params, 1, 2), 7657);
    }

    #[test]
    fn test_standard_parameters() {
        let params = PortParameters::default();
        assert_eq!(default_user_unicast_port(&params, 0, 0), 7411);
        assert_eq!(default_user_unicast_port(&params, 0, 1), 7413);
        assert_eq!(metatraffic_multicast_port(&params, 0), 7400);
        assert_eq!(metatraffic_multicast_port(&params, 1), 7650);
        assert_eq!(metatraffic_unicast_port(&params, 0, 0), 7410);
    }

    #[test]
    fn test_domain_id_range() {
        assert!(domain_id_is_valid(0));
        assert!(domain_id_is_valid(232));
        assert!(!domain_id_is_valid(233));
    }
}
