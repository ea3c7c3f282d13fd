// SPDX-License-Identifier: Apache-2.0 OR MIT
//! Per-socket multicast membership records.
//!
//! The reconciliation engine does not own socket state; it consumes it
//! read-only through the [`MembershipProvider`] trait during the
//! accumulation phase. [`SocketTable`] is the concrete implementation used
//! by the stack's socket layer; tests may implement the trait directly
//! with a mock record source.
//!
//! Records from different sockets for the same (interface, group) pair are
//! deliberately not deduplicated here: reducing them to one per-interface
//! state is exactly the reconciliation engine's job.

use std::net::Ipv6Addr;

use crate::error::MulticastError;
use crate::filter::FilterMode;
use crate::validation;

/// Socket types that can hold multicast memberships
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SocketKind {
    /// UDP-style datagram socket
    Datagram,
    /// Raw IPv6 socket
    Raw,
    /// Stream socket: never multicast-capable, records are ignored
    Stream,
}

impl SocketKind {
    /// Whether sockets of this kind participate in multicast reception
    pub fn is_multicast_capable(self) -> bool {
        matches!(self, SocketKind::Datagram | SocketKind::Raw)
    }
}

/// One socket's wish for one (interface, group) pair
#[derive(Debug, Clone)]
pub struct SocketGroup {
    /// Interface the membership applies to
    pub interface: String,
    /// Multicast group address
    pub group: Ipv6Addr,
    /// Whitelist or blacklist semantics for `sources`
    pub mode: FilterMode,
    /// Source addresses the mode applies to (empty + EXCLUDE = any-source)
    pub sources: Vec<Ipv6Addr>,
}

/// A socket holding zero or more multicast membership records
#[derive(Debug)]
pub struct MulticastSocket {
    kind: SocketKind,
    groups: Vec<SocketGroup>,
    max_groups: usize,
}

impl MulticastSocket {
    /// Create a socket with a bounded membership list
    pub fn new(kind: SocketKind, max_groups: usize) -> Self {
        Self {
            kind,
            groups: Vec::new(),
            max_groups,
        }
    }

    /// Socket kind
    pub fn kind(&self) -> SocketKind {
        self.kind
    }

    /// Current membership records
    pub fn groups(&self) -> &[SocketGroup] {
        &self.groups
    }

    /// Install or replace this socket's filter for (interface, group).
    ///
    /// A record per (interface, group) pair is kept; setting a new mode or
    /// source list overwrites the previous record wholesale.
    pub fn set_filter(
        &mut self,
        interface: &str,
        group: Ipv6Addr,
        mode: FilterMode,
        sources: Vec<Ipv6Addr>,
    ) -> Result<(), MulticastError> {
        if !validation::is_multicast(group) {
            return Err(MulticastError::InvalidAddress(group));
        }
        if let Some(existing) = self
            .groups
            .iter_mut()
            .find(|g| g.interface == interface && g.group == group)
        {
            existing.mode = mode;
            existing.sources = sources;
            return Ok(());
        }
        if self.groups.len() >= self.max_groups {
            return Err(MulticastError::OutOfResources {
                context: "socket membership list",
            });
        }
        self.groups.push(SocketGroup {
            interface: interface.to_string(),
            group,
            mode,
            sources,
        });
        Ok(())
    }

    /// Drop this socket's record for (interface, group)
    pub fn clear_filter(&mut self, interface: &str, group: Ipv6Addr) -> Result<(), MulticastError> {
        let before = self.groups.len();
        self.groups
            .retain(|g| !(g.interface == interface && g.group == group));
        if self.groups.len() == before {
            return Err(MulticastError::AddressNotFound(group));
        }
        Ok(())
    }

    /// Drop every record (socket close)
    pub fn clear_all(&mut self) {
        self.groups.clear();
    }
}

/// Produces the per-socket records the reconciliation engine folds
/// together.
///
/// `group` restricts the scan to one multicast address; `None` visits every
/// record on the interface (bulk recompute).
pub trait MembershipProvider {
    /// Invoke `f` for each interested record on `interface`
    fn for_each_record(&self, interface: &str, group: Option<Ipv6Addr>, f: &mut dyn FnMut(&SocketGroup));
}

/// Bounded table of sockets, a stand-in for the stack's global socket table
#[derive(Debug, Default)]
pub struct SocketTable {
    sockets: Vec<MulticastSocket>,
}

impl SocketTable {
    /// Create an empty table
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a socket, returning its index
    pub fn add_socket(&mut self, socket: MulticastSocket) -> usize {
        self.sockets.push(socket);
        self.sockets.len() - 1
    }

    /// Socket by index
    pub fn socket(&self, index: usize) -> Option<&MulticastSocket> {
        self.sockets.get(index)
    }

    /// Mutable socket by index
    pub fn socket_mut(&mut self, index: usize) -> Option<&mut MulticastSocket> {
        self.sockets.get_mut(index)
    }
}

impl MembershipProvider for SocketTable {
    fn for_each_record(
        &self,
        interface: &str,
        group: Option<Ipv6Addr>,
        f: &mut dyn FnMut(&SocketGroup),
    ) {
        for socket in &self.sockets {
            if !socket.kind().is_multicast_capable() {
                continue;
            }
            for record in socket.groups() {
                if record.interface != interface {
                    continue;
                }
                if let Some(wanted) = group {
                    if record.group != wanted {
                        continue;
                    }
                }
                f(record);
            }
        }
    }
}
