// SPDX-License-Identifier: Apache-2.0 OR MIT
//! MAC-layer multicast filter collaborator.
//!
//! The reconciliation engine programs the Ethernet multicast filter through
//! the [`MacFilterDriver`] trait. The mapping from an IPv6 multicast group
//! to its Ethernet equivalent is fixed: bytes 0-1 are 33:33, bytes 2-5 are
//! the low 32 bits of the group address (RFC 2464 section 7).

use std::fmt;
use std::net::Ipv6Addr;
use std::sync::{Arc, Mutex};

use crate::error::MacFilterError;

/// An Ethernet MAC address
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MacAddr(pub [u8; 6]);

impl fmt::Display for MacAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let MacAddr(b) = self;
        write!(
            f,
            "{:02x}:{:02x}:{:02x}:{:02x}:{:02x}:{:02x}",
            b[0], b[1], b[2], b[3], b[4], b[5]
        )
    }
}

/// Map an IPv6 multicast address to its Ethernet multicast MAC equivalent
pub fn multicast_mac_addr(group: Ipv6Addr) -> MacAddr {
    let octets = group.octets();
    MacAddr([0x33, 0x33, octets[12], octets[13], octets[14], octets[15]])
}

/// Driver-side multicast filter programming
///
/// Implementations are expected to be idempotent at the hardware level or
/// to reference-count internally; the reconciliation engine already avoids
/// redundant calls via the per-entry `mac_filter_configured` flag.
pub trait MacFilterDriver {
    /// Start accepting frames sent to `addr`
    fn accept_multicast_addr(&mut self, addr: MacAddr) -> Result<(), MacFilterError>;

    /// Stop accepting frames sent to `addr`
    fn drop_multicast_addr(&mut self, addr: MacAddr) -> Result<(), MacFilterError>;
}

/// MAC filter for a virtual interface layered over a physical one.
///
/// Both filters are programmed together. If the physical registration
/// fails, the virtual registration is rolled back so the pair never ends up
/// half-programmed.
pub struct LayeredMacFilter<V, P> {
    /// Virtual interface's own filter
    pub virtual_filter: V,
    /// Underlying physical interface's filter
    pub physical_filter: P,
}

impl<V: MacFilterDriver, P: MacFilterDriver> MacFilterDriver for LayeredMacFilter<V, P> {
    fn accept_multicast_addr(&mut self, addr: MacAddr) -> Result<(), MacFilterError> {
        self.virtual_filter.accept_multicast_addr(addr)?;
        if let Err(e) = self.physical_filter.accept_multicast_addr(addr) {
            // roll back the virtual registration; a failure here leaves the
            // virtual filter over-accepting, which is harmless
            let _ = self.virtual_filter.drop_multicast_addr(addr);
            return Err(e);
        }
        Ok(())
    }

    fn drop_multicast_addr(&mut self, addr: MacAddr) -> Result<(), MacFilterError> {
        let virt = self.virtual_filter.drop_multicast_addr(addr);
        let phys = self.physical_filter.drop_multicast_addr(addr);
        virt.and(phys)
    }
}

/// In-memory driver recording every operation, with failure injection.
///
/// Used by the test suites and usable as a diagnostics shim in front of a
/// real driver.
#[derive(Clone, Default)]
pub struct RecordingMacFilter {
    inner: Arc<Mutex<RecordingState>>,
}

#[derive(Default)]
struct RecordingState {
    accepted: Vec<MacAddr>,
    history: Vec<(MacOp, MacAddr)>,
    fail_accepts: u32,
}

/// Operation kinds recorded by [`RecordingMacFilter`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MacOp {
    /// accept_multicast_addr call
    Accept,
    /// drop_multicast_addr call
    Drop,
}

impl RecordingMacFilter {
    /// Create an empty recording driver
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next `n` accept calls fail with `FilterTableFull`
    pub fn fail_next_accepts(&self, n: u32) {
        self.inner.lock().expect("filter poisoned").fail_accepts = n;
    }

    /// Addresses currently programmed
    pub fn accepted(&self) -> Vec<MacAddr> {
        self.inner.lock().expect("filter poisoned").accepted.clone()
    }

    /// Full operation history
    pub fn history(&self) -> Vec<(MacOp, MacAddr)> {
        self.inner.lock().expect("filter poisoned").history.clone()
    }
}

impl MacFilterDriver for RecordingMacFilter {
    fn accept_multicast_addr(&mut self, addr: MacAddr) -> Result<(), MacFilterError> {
        let mut state = self.inner.lock().expect("filter poisoned");
        state.history.push((MacOp::Accept, addr));
        if state.fail_accepts > 0 {
            state.fail_accepts -= 1;
            return Err(MacFilterError::FilterTableFull {
                interface: "recording".to_string(),
            });
        }
        if !state.accepted.contains(&addr) {
            state.accepted.push(addr);
        }
        Ok(())
    }

    fn drop_multicast_addr(&mut self, addr: MacAddr) -> Result<(), MacFilterError> {
        let mut state = self.inner.lock().expect("filter poisoned");
        state.history.push((MacOp::Drop, addr));
        state.accepted.retain(|a| *a != addr);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mac_mapping() {
        let group: Ipv6Addr = "ff02::1:ff28:9c5a".parse().unwrap();
        let mac = multicast_mac_addr(group);
        assert_eq!(mac, MacAddr([0x33, 0x33, 0xff, 0x28, 0x9c, 0x5a]));
        assert_eq!(mac.to_string(), "33:33:ff:28:9c:5a");
    }

    #[test]
    fn test_mac_mapping_low_bits_only() {
        let a: Ipv6Addr = "ff0e::1234:5678".parse().unwrap();
        let b: Ipv6Addr = "ff02::1234:5678".parse().unwrap();
        // different groups, same low 32 bits, same MAC
        assert_eq!(multicast_mac_addr(a), multicast_mac_addr(b));
    }

    #[test]
    fn test_layered_rollback_on_physical_failure() {
        let virt = RecordingMacFilter::new();
        let phys = RecordingMacFilter::new();
        phys.fail_next_accepts(1);

        let mut layered = LayeredMacFilter {
            virtual_filter: virt.clone(),
            physical_filter: phys.clone(),
        };

        let mac = multicast_mac_addr("ff0e::1".parse().unwrap());
        assert!(layered.accept_multicast_addr(mac).is_err());

        // virtual registration was rolled back
        assert!(virt.accepted().is_empty());
        assert_eq!(
            virt.history(),
            vec![(MacOp::Accept, mac), (MacOp::Drop, mac)]
        );
        assert!(phys.accepted().is_empty());
    }

    #[test]
    fn test_layered_success_programs_both() {
        let virt = RecordingMacFilter::new();
        let phys = RecordingMacFilter::new();
        let mut layered = LayeredMacFilter {
            virtual_filter: virt.clone(),
            physical_filter: phys.clone(),
        };

        let mac = multicast_mac_addr("ff0e::1".parse().unwrap());
        layered.accept_multicast_addr(mac).unwrap();
        assert_eq!(virt.accepted(), vec![mac]);
        assert_eq!(phys.accepted(), vec![mac]);

        layered.drop_multicast_addr(mac).unwrap();
        assert!(virt.accepted().is_empty());
        assert!(phys.accepted().is_empty());
    }
}
