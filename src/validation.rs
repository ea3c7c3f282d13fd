// SPDX-License-Identifier: Apache-2.0 OR MIT
//! Shared address validation helpers.
//!
//! Centralizes the multicast address checks used by the reconciliation
//! engine and the MLD node so scope handling stays in one place.

use std::net::Ipv6Addr;

/// Link-scope all-nodes address (ff02::1)
pub const ALL_NODES_LINK_LOCAL: Ipv6Addr = Ipv6Addr::new(0xff02, 0, 0, 0, 0, 0, 0, 1);

/// Link-scope all-routers address (ff02::2)
pub const ALL_ROUTERS_LINK_LOCAL: Ipv6Addr = Ipv6Addr::new(0xff02, 0, 0, 0, 0, 0, 0, 2);

/// All MLDv2-capable routers address (ff02::16)
pub const ALL_MLDV2_ROUTERS: Ipv6Addr = Ipv6Addr::new(0xff02, 0, 0, 0, 0, 0, 0, 0x16);

/// Check if an address is a valid multicast group address (ff00::/8)
#[inline]
pub fn is_multicast(addr: Ipv6Addr) -> bool {
    addr.octets()[0] == 0xff
}

/// Extract the 4-bit multicast scope field
#[inline]
pub fn multicast_scope(addr: Ipv6Addr) -> u8 {
    addr.octets()[1] & 0x0f
}

/// Check whether MLD signalling should be performed for a group.
///
/// Per RFC 3810 section 6, the link-scope all-nodes address and addresses
/// of interface-local or reserved scope are never reported. The filter
/// table and MAC programming still cover such groups; only the protocol
/// messages are suppressed.
pub fn is_mld_reportable(addr: Ipv6Addr) -> bool {
    if !is_multicast(addr) {
        return false;
    }
    if addr == ALL_NODES_LINK_LOCAL {
        return false;
    }
    multicast_scope(addr) > 1
}
