// SPDX-License-Identifier: Apache-2.0 OR MIT
// Logging facilities (component identifiers)

use serde::{Deserialize, Serialize};

/// Logging facility - identifies which component generated the log message
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Facility {
    /// Filter table reconciliation (join/leave, per-socket merge)
    Reconcile = 0,
    /// MAC-layer multicast filter programming
    MacFilter = 1,
    /// MLD listener state machine and timers
    Mld = 2,
    /// Per-interface service task (command loop, tick)
    Service = 3,
    /// Test harness and fixtures
    Test = 4,

    /// Fallback for uncategorized messages
    Unknown = 255,
}

impl Facility {
    /// Get facility code as u8
    #[inline]
    pub const fn as_u8(self) -> u8 {
        self as u8
    }

    /// Get facility name as static string
    pub const fn as_str(self) -> &'static str {
        match self {
            Facility::Reconcile => "Reconcile",
            Facility::MacFilter => "MacFilter",
            Facility::Mld => "Mld",
            Facility::Service => "Service",
            Facility::Test => "Test",
            Facility::Unknown => "Unknown",
        }
    }
}
