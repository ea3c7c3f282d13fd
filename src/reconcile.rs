// SPDX-License-Identifier: Apache-2.0 OR MIT
//! Filter reconciliation engine.
//!
//! Recomputes the per-interface filter table from every socket's membership
//! records whenever any membership changes. The reduction of several
//! per-socket records into one interface state follows RFC 3376 section
//! 3.2 (generalized to IPv6 by RFC 3810):
//!
//! | interface state | socket record | result |
//! |-----------------|---------------|--------|
//! | INCLUDE (A) | INCLUDE (B) | INCLUDE (A ∪ B) |
//! | EXCLUDE (A) | EXCLUDE (B) | EXCLUDE (A ∩ B) |
//! | EXCLUDE (A) | INCLUDE (B) | EXCLUDE (A - B) |
//! | INCLUDE (A) | EXCLUDE (B) | EXCLUDE (B - A) |
//!
//! The asymmetry of the last two rows is normative: a source some socket
//! explicitly wants (INCLUDE) must never end up blocked, however many other
//! sockets exclude it.
//!
//! `update_multicast_filter` runs three phases in order: reset every
//! matching entry to its any-source baseline, fold each socket record in,
//! then apply side effects (MAC filter programming, MLD notification,
//! empty-entry deletion). Re-running it without an intervening membership
//! change reproduces the same table, so calls are idempotent.

use std::net::Ipv6Addr;

use crate::error::MulticastError;
use crate::filter::{FilterMode, FilterState, FilterTable};
use crate::logging::{Facility, Logger};
use crate::mac::{multicast_mac_addr, MacFilterDriver};
use crate::socket::{MembershipProvider, SocketGroup};
use crate::validation;
use crate::{log_debug, log_warning};

/// Reconciled state for one group, handed to the MLD node after each update
#[derive(Debug, Clone)]
pub struct InterfaceStateChange {
    /// Group whose state was recomputed
    pub group: Ipv6Addr,
    /// The newly derived reception state
    pub state: FilterState,
}

/// Fold one socket record into an entry's running interface state.
///
/// When source filtering is disabled (capacity-0 source sets), any interest
/// at all degenerates to (EXCLUDE, empty): reception is all-or-nothing.
pub fn derive_interface_state(state: &mut FilterState, record: &SocketGroup) {
    let capacity = state.sources.capacity();
    if capacity == 0 {
        *state = FilterState::exclude_none(0);
        return;
    }
    match (state.mode, record.mode) {
        (FilterMode::Include, FilterMode::Include) => {
            // union; overflow drops the surplus sources, under-delivering
            // until a later membership change frees room
            for src in &record.sources {
                let _ = state.sources.add(*src);
            }
        }
        (FilterMode::Exclude, FilterMode::Exclude) => {
            // intersection
            state.sources.retain(|addr| record.sources.contains(&addr));
        }
        (FilterMode::Exclude, FilterMode::Include) => {
            // explicitly wanted sources must not stay excluded
            for src in &record.sources {
                state.sources.remove(*src);
            }
        }
        (FilterMode::Include, FilterMode::Exclude) => {
            // any EXCLUDE record flips the interface to EXCLUDE, but the
            // sources already included stay unblocked
            let mut blocked = crate::sources::SourceSet::with_capacity(capacity);
            for src in &record.sources {
                if !state.sources.contains(*src) {
                    let _ = blocked.add(*src);
                }
            }
            state.mode = FilterMode::Exclude;
            state.sources = blocked;
        }
    }
}

/// Join a group with no source restriction (classic any-source join).
///
/// Increments the entry's any-source reference count and triggers a full
/// reconciliation for the group.
pub fn join_group<P: MembershipProvider, D: MacFilterDriver>(
    table: &mut FilterTable,
    interface: &str,
    group: Ipv6Addr,
    provider: &P,
    driver: &mut D,
    logger: &Logger,
) -> Result<Vec<InterfaceStateChange>, MulticastError> {
    if !validation::is_multicast(group) {
        return Err(MulticastError::InvalidAddress(group));
    }
    let entry = table
        .find_or_create(group)
        .ok_or(MulticastError::OutOfResources {
            context: "filter table",
        })?;
    entry.any_source_refs += 1;
    log_debug!(
        logger,
        Facility::Reconcile,
        "{}: any-source join {} (refs {})",
        interface,
        group,
        entry.any_source_refs
    );
    Ok(update_multicast_filter(
        table,
        interface,
        Some(group),
        provider,
        driver,
        logger,
    ))
}

/// Leave a group previously joined with [`join_group`].
///
/// Decrements the any-source reference count (floored at zero) and triggers
/// reconciliation; the entry disappears once nothing else references it.
pub fn leave_group<P: MembershipProvider, D: MacFilterDriver>(
    table: &mut FilterTable,
    interface: &str,
    group: Ipv6Addr,
    provider: &P,
    driver: &mut D,
    logger: &Logger,
) -> Result<Vec<InterfaceStateChange>, MulticastError> {
    let entry = table
        .get_mut(group)
        .ok_or(MulticastError::AddressNotFound(group))?;
    entry.any_source_refs = entry.any_source_refs.saturating_sub(1);
    log_debug!(
        logger,
        Facility::Reconcile,
        "{}: any-source leave {} (refs {})",
        interface,
        group,
        entry.any_source_refs
    );
    Ok(update_multicast_filter(
        table,
        interface,
        Some(group),
        provider,
        driver,
        logger,
    ))
}

/// Recompute the reconciled filter state.
///
/// `group` restricts the update to one address; `None` recomputes every
/// entry (bulk recompute after a socket close or interface reset). Errors
/// from the MAC driver are absorbed: the entry is left unmarked so the next
/// reconciliation retries, and the node under-delivers in the meantime.
///
/// Returns the post-update state of every touched group, including entries
/// that ended in the logically-absent (INCLUDE, empty) state; the MLD node
/// derives its own state transitions from these.
pub fn update_multicast_filter<P: MembershipProvider, D: MacFilterDriver>(
    table: &mut FilterTable,
    interface: &str,
    group: Option<Ipv6Addr>,
    provider: &P,
    driver: &mut D,
    logger: &Logger,
) -> Vec<InterfaceStateChange> {
    let source_capacity = table.source_capacity();

    // Phase 1: reset matching entries to their any-source baseline.
    for entry in table.iter_mut() {
        if group.is_some_and(|g| g != entry.group) {
            continue;
        }
        entry.state = if entry.any_source_refs > 0 {
            FilterState::exclude_none(source_capacity)
        } else {
            FilterState::include_none(source_capacity)
        };
    }

    // Phase 2: fold in every interested socket record.
    let mut table_full_groups: Vec<Ipv6Addr> = Vec::new();
    provider.for_each_record(interface, group, &mut |record: &SocketGroup| {
        match table.find_or_create(record.group) {
            Some(entry) => derive_interface_state(&mut entry.state, record),
            None => {
                if !table_full_groups.contains(&record.group) {
                    table_full_groups.push(record.group);
                }
            }
        }
    });
    for unhonored in table_full_groups {
        log_warning!(
            logger,
            Facility::Reconcile,
            "{}: filter table full, membership for {} not honored",
            interface,
            unhonored
        );
    }

    // Phase 3: apply side effects and free empty entries.
    let touched: Vec<Ipv6Addr> = table
        .iter()
        .filter(|e| group.map_or(true, |g| g == e.group))
        .map(|e| e.group)
        .collect();

    let mut changes = Vec::with_capacity(touched.len());
    for addr in touched {
        let Some(entry) = table.get_mut(addr) else {
            continue;
        };
        if entry.state.has_reception() {
            if !entry.mac_filter_configured {
                let mac = multicast_mac_addr(addr);
                match driver.accept_multicast_addr(mac) {
                    Ok(()) => entry.mac_filter_configured = true,
                    Err(e) => {
                        // non-fatal: retried on the next membership change
                        log_warning!(
                            logger,
                            Facility::MacFilter,
                            "{}: failed to program {} for {}: {}",
                            interface,
                            mac,
                            addr,
                            e
                        );
                    }
                }
            }
        } else if entry.mac_filter_configured {
            let mac = multicast_mac_addr(addr);
            if let Err(e) = driver.drop_multicast_addr(mac) {
                log_warning!(
                    logger,
                    Facility::MacFilter,
                    "{}: failed to deprogram {} for {}: {}",
                    interface,
                    mac,
                    addr,
                    e
                );
            }
            entry.mac_filter_configured = false;
        }

        changes.push(InterfaceStateChange {
            group: addr,
            state: entry.state.clone(),
        });

        if entry.state.is_absent() && entry.any_source_refs == 0 {
            table.remove(addr);
        }
    }
    changes
}
