// SPDX-License-Identifier: Apache-2.0 OR MIT
//! Per-interface multicast filter table.
//!
//! Each interface owns one `FilterTable`: a bounded slot table holding the
//! reconciled reception state per multicast group. A slot is `None` when
//! free; an occupied slot records the group address, the any-source join
//! reference count, the derived filter mode and source set, and whether the
//! MAC-layer filter is currently programmed for the group.
//!
//! The invariant maintained by the reconciliation engine: an entry whose
//! derived state is (INCLUDE, empty) with no any-source references is
//! logically absent and its slot is freed.

use std::net::Ipv6Addr;

use serde::{Deserialize, Serialize};

use crate::sources::SourceSet;

/// Whether a source list is a whitelist or a blacklist
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FilterMode {
    /// Accept only traffic from sources in the list
    Include,
    /// Accept traffic from all sources except those in the list
    Exclude,
}

/// A filter mode together with its source set
#[derive(Debug, Clone)]
pub struct FilterState {
    /// Include/exclude mode
    pub mode: FilterMode,
    /// Source addresses the mode applies to
    pub sources: SourceSet,
}

impl FilterState {
    /// The baseline "no reception" state: (INCLUDE, empty)
    pub fn include_none(source_capacity: usize) -> Self {
        Self {
            mode: FilterMode::Include,
            sources: SourceSet::with_capacity(source_capacity),
        }
    }

    /// The baseline "receive everything" state: (EXCLUDE, empty)
    pub fn exclude_none(source_capacity: usize) -> Self {
        Self {
            mode: FilterMode::Exclude,
            sources: SourceSet::with_capacity(source_capacity),
        }
    }

    /// True when the state admits any traffic at all
    pub fn has_reception(&self) -> bool {
        self.mode == FilterMode::Exclude || !self.sources.is_empty()
    }

    /// True for the logically-absent state (INCLUDE, empty)
    pub fn is_absent(&self) -> bool {
        self.mode == FilterMode::Include && self.sources.is_empty()
    }

    /// Semantic equality: same mode and same source members
    pub fn state_eq(&self, other: &FilterState) -> bool {
        self.mode == other.mode && self.sources.set_eq(&other.sources)
    }
}

/// One reconciled filter table row
#[derive(Debug, Clone)]
pub struct FilterEntry {
    /// Multicast group address
    pub group: Ipv6Addr,
    /// Count of plain (any-source) joins for this group
    pub any_source_refs: u32,
    /// Derived reception state, recomputed on every membership change
    pub state: FilterState,
    /// Whether the MAC-layer filter is currently programmed for this group
    pub mac_filter_configured: bool,
}

impl FilterEntry {
    fn new(group: Ipv6Addr, source_capacity: usize) -> Self {
        Self {
            group,
            any_source_refs: 0,
            state: FilterState::include_none(source_capacity),
            mac_filter_configured: false,
        }
    }
}

/// Bounded per-interface filter table
#[derive(Debug)]
pub struct FilterTable {
    slots: Vec<Option<FilterEntry>>,
    source_capacity: usize,
}

impl FilterTable {
    /// Create a table with `size` slots and the given per-entry source
    /// list capacity
    pub fn new(size: usize, source_capacity: usize) -> Self {
        Self {
            slots: (0..size).map(|_| None).collect(),
            source_capacity,
        }
    }

    /// Number of slots
    pub fn size(&self) -> usize {
        self.slots.len()
    }

    /// Source list capacity used for new entries
    pub fn source_capacity(&self) -> usize {
        self.source_capacity
    }

    /// Number of occupied slots
    pub fn active_count(&self) -> usize {
        self.slots.iter().filter(|s| s.is_some()).count()
    }

    /// Slot index of the entry for `group`, if present
    pub fn find(&self, group: Ipv6Addr) -> Option<usize> {
        self.slots
            .iter()
            .position(|s| matches!(s, Some(e) if e.group == group))
    }

    /// Entry for `group`, if present
    pub fn get(&self, group: Ipv6Addr) -> Option<&FilterEntry> {
        self.find(group).and_then(|i| self.slots[i].as_ref())
    }

    /// Mutable entry for `group`, if present
    pub fn get_mut(&mut self, group: Ipv6Addr) -> Option<&mut FilterEntry> {
        let index = self.find(group)?;
        self.slots[index].as_mut()
    }

    /// Find the entry for `group`, creating it in a free slot if absent.
    ///
    /// Returns `None` when the table is full and no entry exists.
    pub fn find_or_create(&mut self, group: Ipv6Addr) -> Option<&mut FilterEntry> {
        let index = match self.find(group) {
            Some(index) => index,
            None => {
                let free = self.slots.iter().position(|s| s.is_none())?;
                self.slots[free] = Some(FilterEntry::new(group, self.source_capacity));
                free
            }
        };
        self.slots[index].as_mut()
    }

    /// Free the slot holding `group`, if any
    pub fn remove(&mut self, group: Ipv6Addr) -> Option<FilterEntry> {
        let index = self.find(group)?;
        self.slots[index].take()
    }

    /// Iterate occupied entries
    pub fn iter(&self) -> impl Iterator<Item = &FilterEntry> {
        self.slots.iter().filter_map(|s| s.as_ref())
    }

    /// Iterate occupied entries mutably
    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut FilterEntry> {
        self.slots.iter_mut().filter_map(|s| s.as_mut())
    }

    /// Receive-path predicate: does the reconciled state admit a packet
    /// sent by `source` to multicast destination `group`?
    ///
    /// This consults exactly the state used for MAC programming, so the
    /// software filter and the hardware filter agree.
    pub fn accepts(&self, group: Ipv6Addr, source: Ipv6Addr) -> bool {
        let Some(entry) = self.get(group) else {
            return false;
        };
        if entry.any_source_refs > 0 {
            return true;
        }
        match entry.state.mode {
            FilterMode::Include => entry.state.sources.contains(source),
            FilterMode::Exclude => !entry.state.sources.contains(source),
        }
    }
}
