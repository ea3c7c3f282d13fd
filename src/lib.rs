// SPDX-License-Identifier: Apache-2.0 OR MIT
//! IPv6 multicast reception-state engine with an MLD listener.
//!
//! The crate reconciles per-socket multicast filters (RFC 3542-style
//! INCLUDE/EXCLUDE source lists) into one reception filter per interface,
//! programs the link-layer multicast filter through a driver trait, and
//! runs the host side of MLD (RFC 2710 / RFC 3810) to advertise the
//! reconciled state on the link.
//!
//! Layering, bottom up:
//!
//! | Module | Responsibility |
//! |--------|----------------|
//! | [`sources`] | Bounded source-address sets |
//! | [`filter`] | Per-interface filter table and the accept predicate |
//! | [`socket`] | Per-socket membership records, [`socket::MembershipProvider`] |
//! | [`reconcile`] | Socket-to-interface filter merging, MAC programming |
//! | [`mac`] | MAC address mapping and filter driver traits |
//! | [`protocols`] | MLD listener state machine and wire formats |
//! | [`interface`] | Per-interface context tying the layers together |
//! | [`service`] | Tokio task and command-channel front end |

pub mod config;
pub mod error;
pub mod filter;
pub mod interface;
pub mod logging;
pub mod mac;
pub mod protocols;
pub mod reconcile;
pub mod service;
pub mod socket;
pub mod sources;
pub mod validation;

pub use config::NodeConfig;
pub use error::{MacFilterError, MulticastError, SendError};
pub use filter::{FilterMode, FilterState, FilterTable};
pub use interface::{MldSender, MulticastInterface};
pub use mac::{multicast_mac_addr, MacAddr, MacFilterDriver};
pub use protocols::mld::MldNodeState;
pub use protocols::{MldEvent, MldMessage, MldSend, MldVersion};
pub use service::{InterfaceHandle, InterfaceService};
pub use socket::{MembershipProvider, MulticastSocket, SocketGroup, SocketKind, SocketTable};
pub use sources::SourceSet;
