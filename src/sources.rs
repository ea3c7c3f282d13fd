// SPDX-License-Identifier: Apache-2.0 OR MIT
//! Bounded source-address sets.
//!
//! A `SourceSet` is a small ordered set of IPv6 source addresses with set
//! semantics: no duplicates, insertion order preserved but irrelevant for
//! equality. The capacity is fixed at construction.
//!
//! A capacity of zero is the "null" capability: source filtering is
//! disabled for the whole node, `add` fails with `NotImplemented`, lookups
//! find nothing and every pair of sets compares equal. This lets the
//! reconciliation and report-building code run unchanged whether or not
//! source filtering is configured.

use std::net::Ipv6Addr;

use crate::error::MulticastError;

/// Ordered set of source addresses with a fixed capacity
#[derive(Debug, Clone)]
pub struct SourceSet {
    addrs: Vec<Ipv6Addr>,
    capacity: usize,
}

impl SourceSet {
    /// Create an empty set with the given capacity
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            addrs: Vec::with_capacity(capacity),
            capacity,
        }
    }

    /// Create a set from a slice of addresses.
    ///
    /// Duplicates are collapsed. Fails if the distinct addresses exceed the
    /// capacity, or with `NotImplemented` when capacity is zero and the
    /// slice is non-empty.
    pub fn from_slice(capacity: usize, addrs: &[Ipv6Addr]) -> Result<Self, MulticastError> {
        let mut set = Self::with_capacity(capacity);
        for addr in addrs {
            set.add(*addr)?;
        }
        Ok(set)
    }

    /// Capacity this set was created with
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// True when source filtering is disabled for this set
    pub fn is_null(&self) -> bool {
        self.capacity == 0
    }

    /// Number of addresses in the set
    pub fn len(&self) -> usize {
        self.addrs.len()
    }

    /// True if the set holds no addresses
    pub fn is_empty(&self) -> bool {
        self.addrs.is_empty()
    }

    /// Add an address. Idempotent: adding a present address succeeds
    /// without growing the set.
    pub fn add(&mut self, addr: Ipv6Addr) -> Result<(), MulticastError> {
        if self.capacity == 0 {
            return Err(MulticastError::NotImplemented);
        }
        if self.find(addr).is_some() {
            return Ok(());
        }
        if self.addrs.len() >= self.capacity {
            return Err(MulticastError::OutOfResources {
                context: "source list",
            });
        }
        self.addrs.push(addr);
        Ok(())
    }

    /// Remove an address. No-op if absent; remaining elements shift down so
    /// the set stays gap-free.
    pub fn remove(&mut self, addr: Ipv6Addr) {
        if let Some(index) = self.find(addr) {
            self.addrs.remove(index);
        }
    }

    /// Position of an address, if present
    pub fn find(&self, addr: Ipv6Addr) -> Option<usize> {
        self.addrs.iter().position(|a| *a == addr)
    }

    /// Membership test
    pub fn contains(&self, addr: Ipv6Addr) -> bool {
        self.find(addr).is_some()
    }

    /// Set equality: same cardinality and same members, order-independent.
    /// Null sets compare equal to everything (filtering is all-or-nothing
    /// when disabled, so every source list is indistinguishable).
    pub fn set_eq(&self, other: &SourceSet) -> bool {
        if self.capacity == 0 || other.capacity == 0 {
            return true;
        }
        self.addrs.len() == other.addrs.len()
            && self.addrs.iter().all(|a| other.contains(*a))
    }

    /// Remove every address in the set
    pub fn clear(&mut self) {
        self.addrs.clear();
    }

    /// Iterate the addresses in insertion order
    pub fn iter(&self) -> impl Iterator<Item = Ipv6Addr> + '_ {
        self.addrs.iter().copied()
    }

    /// Keep only the addresses the predicate approves
    pub fn retain(&mut self, mut f: impl FnMut(Ipv6Addr) -> bool) {
        self.addrs.retain(|a| f(*a));
    }

    /// Keep only the addresses also present in `other` (intersection)
    pub fn retain_intersection(&mut self, other: &SourceSet) {
        self.addrs.retain(|a| other.contains(*a));
    }

    /// Remove every address present in `other` (difference)
    pub fn remove_all(&mut self, other: &SourceSet) {
        self.addrs.retain(|a| !other.contains(*a));
    }

    /// Plain vector copy of the members, for report records
    pub fn to_vec(&self) -> Vec<Ipv6Addr> {
        self.addrs.clone()
    }
}
