// SPDX-License-Identifier: Apache-2.0 OR MIT
//! Error taxonomy for multicast membership operations.
//!
//! Join/Leave and source-set operations return these synchronously to the
//! caller. Reconciliation itself never surfaces errors: a failed MAC filter
//! update simply leaves the entry unprogrammed until the next membership
//! change retries it.

use std::net::Ipv6Addr;

use thiserror::Error;

/// Errors returned by multicast membership and source-filter operations
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MulticastError {
    /// A non-multicast address was supplied where a multicast group address
    /// was required
    #[error("invalid multicast address: {0}")]
    InvalidAddress(Ipv6Addr),

    /// Leave requested for a group with no existing filter entry
    #[error("no filter entry for group {0}")]
    AddressNotFound(Ipv6Addr),

    /// Filter table or source-address list is at capacity
    #[error("out of resources: {context}")]
    OutOfResources {
        /// What ran out (filter table slots, source list entries)
        context: &'static str,
    },

    /// Source-filtered operation attempted while source filtering is
    /// disabled (source list capacity configured to zero)
    #[error("source filtering is not available")]
    NotImplemented,
}

/// Errors reported by the MAC/driver collaborator when (de)programming a
/// multicast MAC filter entry
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MacFilterError {
    /// The driver's hardware filter table is full
    #[error("MAC filter table full on {interface}")]
    FilterTableFull {
        /// Interface whose filter rejected the entry
        interface: String,
    },

    /// The driver rejected the operation for any other reason
    #[error("MAC filter update failed on {interface}: {reason}")]
    DriverFailure {
        /// Interface whose driver failed
        interface: String,
        /// Driver-supplied failure description
        reason: String,
    },
}

/// Errors reported by the MLD message transport when a report cannot be
/// handed to the ICMPv6 layer
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SendError {
    /// No usable link-local source address on the interface
    #[error("no link-local source address available")]
    NoSourceAddress,

    /// The transport refused or dropped the message
    #[error("transport failure: {0}")]
    Transport(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = MulticastError::InvalidAddress("2001:db8::1".parse().unwrap());
        assert_eq!(err.to_string(), "invalid multicast address: 2001:db8::1");

        let err = MulticastError::OutOfResources {
            context: "filter table",
        };
        assert_eq!(err.to_string(), "out of resources: filter table");
    }

    #[test]
    fn test_errors_are_comparable() {
        assert_eq!(MulticastError::NotImplemented, MulticastError::NotImplemented);
        assert_ne!(
            MulticastError::NotImplemented,
            MulticastError::OutOfResources {
                context: "source list"
            }
        );
    }
}
