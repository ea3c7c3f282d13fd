// SPDX-License-Identifier: Apache-2.0 OR MIT
// Severity levels for logging (RFC 5424 syslog-style)

use serde::{Deserialize, Serialize};

/// Log severity levels (0-7, lower is more severe)
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Severity {
    /// Error conditions (MAC filter programming failure, send failure)
    Error = 3,
    /// Warning conditions (table approaching capacity, dropped report)
    Warning = 4,
    /// Significant normal condition (group joined, compat mode change)
    Notice = 5,
    /// Informational (filter recomputed, report scheduled)
    Info = 6,
    /// Debug-level messages (per-entry merge traces)
    Debug = 7,
}

impl Severity {
    /// Get severity level as u8
    #[inline]
    pub const fn as_u8(self) -> u8 {
        self as u8
    }

    /// Get severity name as static string
    pub const fn as_str(self) -> &'static str {
        match self {
            Severity::Error => "ERROR",
            Severity::Warning => "WARNING",
            Severity::Notice => "NOTICE",
            Severity::Info => "INFO",
            Severity::Debug => "DEBUG",
        }
    }

    /// Create from u8 value (returns None if invalid)
    pub const fn from_u8(value: u8) -> Option<Self> {
        match value {
            3 => Some(Severity::Error),
            4 => Some(Severity::Warning),
            5 => Some(Severity::Notice),
            6 => Some(Severity::Info),
            7 => Some(Severity::Debug),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ordering_lower_is_more_severe() {
        assert!(Severity::Error < Severity::Warning);
        assert!(Severity::Notice < Severity::Debug);
    }

    #[test]
    fn test_round_trip() {
        for sev in [
            Severity::Error,
            Severity::Warning,
            Severity::Notice,
            Severity::Info,
            Severity::Debug,
        ] {
            assert_eq!(Severity::from_u8(sev.as_u8()), Some(sev));
        }
        assert_eq!(Severity::from_u8(0), None);
        assert_eq!(Severity::from_u8(8), None);
    }
}
