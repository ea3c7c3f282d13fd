// SPDX-License-Identifier: Apache-2.0 OR MIT
//! MLD protocol types shared by the listener state machine and the wire
//! builders.
//!
//! The state machine consumes [`MldEvent`]s and returns [`MldSend`]
//! effects; it performs no I/O itself. Message *contents* are modeled here
//! as data ([`MldMessage`], [`ReportRecord`]); the byte layout lives in
//! [`wire`].
//!
//! ## MLD message types (RFC 2710 / RFC 3810)
//!
//! | Type | Value | Description |
//! |------|-------|-------------|
//! | Multicast Listener Query | 130 | Sent by routers |
//! | MLDv1 Multicast Listener Report | 131 | Host is listening |
//! | MLDv1 Multicast Listener Done | 132 | Host stopped listening |
//! | MLDv2 Multicast Listener Report | 143 | Host filter state / change |

pub mod mld;
pub mod wire;

use std::net::Ipv6Addr;
use std::time::Duration;

use crate::filter::FilterState;

/// Multicast Listener Query message type
pub const MLD_LISTENER_QUERY: u8 = 130;
/// MLDv1 Multicast Listener Report message type
pub const MLD_V1_LISTENER_REPORT: u8 = 131;
/// MLDv1 Multicast Listener Done message type
pub const MLD_V1_LISTENER_DONE: u8 = 132;
/// MLDv2 Multicast Listener Report message type
pub const MLD_V2_LISTENER_REPORT: u8 = 143;

/// MLD protocol versions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MldVersion {
    /// RFC 2710
    V1,
    /// RFC 3810
    V2,
}

/// MLDv2 report record types (RFC 3810 section 5.2.12)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum RecordType {
    /// Current-State: filter mode is INCLUDE
    ModeIsInclude = 1,
    /// Current-State: filter mode is EXCLUDE
    ModeIsExclude = 2,
    /// Filter-Mode-Change: switched to INCLUDE
    ChangeToInclude = 3,
    /// Filter-Mode-Change: switched to EXCLUDE
    ChangeToExclude = 4,
    /// Source-List-Change: new sources accepted
    AllowNewSources = 5,
    /// Source-List-Change: sources no longer accepted
    BlockOldSources = 6,
}

impl RecordType {
    /// Record type code as transmitted
    pub const fn as_u8(self) -> u8 {
        self as u8
    }
}

/// One multicast address record in an MLDv2 report
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportRecord {
    /// Record type
    pub record_type: RecordType,
    /// Multicast group the record describes
    pub group: Ipv6Addr,
    /// Source addresses (meaning depends on the record type)
    pub sources: Vec<Ipv6Addr>,
}

/// An MLD message the listener can emit, content-level
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MldMessage {
    /// MLDv1 Multicast Listener Report for one group
    V1Report {
        /// Reported group
        group: Ipv6Addr,
    },
    /// MLDv1 Multicast Listener Done for one group
    V1Done {
        /// Group no longer listened to
        group: Ipv6Addr,
    },
    /// MLDv2 Multicast Listener Report carrying one or more records
    V2Report {
        /// Address records
        records: Vec<ReportRecord>,
    },
}

impl MldMessage {
    /// Destination address the message must be sent to.
    ///
    /// v1 Reports go to the reported group itself, v1 Done to the
    /// link-scope all-routers address, v2 Reports to the all-MLDv2-capable
    /// routers address (RFC 3810 section 5.2.14).
    pub fn destination(&self) -> Ipv6Addr {
        match self {
            MldMessage::V1Report { group } => *group,
            MldMessage::V1Done { .. } => crate::validation::ALL_ROUTERS_LINK_LOCAL,
            MldMessage::V2Report { .. } => crate::validation::ALL_MLDV2_ROUTERS,
        }
    }
}

/// A send effect produced by the state machine
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MldSend {
    /// IPv6 destination
    pub destination: Ipv6Addr,
    /// Message content
    pub message: MldMessage,
}

impl MldSend {
    /// Wrap a message with its canonical destination
    pub fn new(message: MldMessage) -> Self {
        Self {
            destination: message.destination(),
            message,
        }
    }
}

/// Events fed into the per-interface MLD node state machine
#[derive(Debug, Clone)]
pub enum MldEvent {
    /// Periodic timer tick; drives every deadline
    Tick,
    /// The reconciled filter state for a group changed (including to the
    /// logically-absent state, which deletes the group)
    FilterChanged {
        /// Affected group
        group: Ipv6Addr,
        /// Newly derived reception state
        state: FilterState,
    },
    /// Interface link came up
    LinkUp,
    /// Interface link went down
    LinkDown,
    /// A decoded Multicast Listener Query arrived (packet parsing is the
    /// ICMPv6 dispatcher's concern)
    QueryReceived {
        /// Version the query was parsed as
        version: MldVersion,
        /// Queried group; `None` for a General Query
        group: Option<Ipv6Addr>,
        /// Queried sources (v2 group-and-source-specific queries)
        sources: Vec<Ipv6Addr>,
        /// Maximum response delay advertised by the querier
        max_resp_delay: Duration,
    },
}

/// Builder for protocol message byte layouts
pub trait PacketBuilder {
    /// Serialize the message; the ICMPv6 checksum field is left zero for
    /// the transport layer to fill (it needs the pseudo-header)
    fn build(&self) -> Vec<u8>;
}
