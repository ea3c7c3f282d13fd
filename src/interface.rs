// SPDX-License-Identifier: Apache-2.0 OR MIT
//! Per-interface multicast context.
//!
//! [`MulticastInterface`] ties the pieces together for one network
//! interface: the reconciled filter table, the MAC filter driver, and the
//! MLD listener state machine. Reconciliation results feed the listener
//! as filter-change events; the listener's send effects are handed to an
//! [`MldSender`] for transmission.

use std::net::Ipv6Addr;
use std::time::{Duration, Instant};

use rand::Rng;

use crate::config::NodeConfig;
use crate::error::{MulticastError, SendError};
use crate::filter::FilterTable;
use crate::logging::{Facility, Logger};
use crate::mac::MacFilterDriver;
use crate::protocols::mld::MldNodeState;
use crate::protocols::{MldEvent, MldSend, MldVersion};
use crate::reconcile::{self, InterfaceStateChange};
use crate::socket::MembershipProvider;
use crate::{log_debug, log_warning};

/// Transmit hook for MLD messages.
///
/// The interface context does not own a transport; the caller supplies one.
pub trait MldSender {
    /// Send one MLD message to its destination on this interface
    fn send(&mut self, send: &MldSend) -> Result<(), SendError>;
}

/// A sender that records every message instead of transmitting.
#[derive(Debug, Default)]
pub struct RecordingSender {
    sent: Vec<MldSend>,
}

impl RecordingSender {
    pub fn new() -> Self {
        Self::default()
    }

    /// Messages handed to the sender so far
    pub fn sent(&self) -> &[MldSend] {
        &self.sent
    }
}

impl MldSender for RecordingSender {
    fn send(&mut self, send: &MldSend) -> Result<(), SendError> {
        self.sent.push(send.clone());
        Ok(())
    }
}

/// Multicast reception state for one network interface
pub struct MulticastInterface {
    name: String,
    table: FilterTable,
    mld: MldNodeState,
    logger: Logger,
}

impl MulticastInterface {
    /// Create the context for an interface from node configuration
    pub fn new(name: &str, config: &NodeConfig, logger: Logger) -> Self {
        Self {
            name: name.to_string(),
            table: FilterTable::new(
                config.multicast.filter_table_size,
                config.multicast.max_multicast_sources,
            ),
            mld: MldNodeState::new(
                config.mld.clone(),
                config.multicast.max_multicast_sources,
            ),
            logger,
        }
    }

    /// Interface name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Read access to MLD state, mostly for diagnostics
    pub fn mld(&self) -> &MldNodeState {
        &self.mld
    }

    /// Whether a datagram from `source` to `group` passes the reception
    /// filter of this interface
    pub fn accepts(&self, group: Ipv6Addr, source: Ipv6Addr) -> bool {
        self.table.accepts(group, source)
    }

    /// Any-source join: a socket wants every packet for `group`
    pub fn join_multicast_group<P, D, S, R>(
        &mut self,
        group: Ipv6Addr,
        provider: &P,
        driver: &mut D,
        sender: &mut S,
        now: Instant,
        rng: &mut R,
    ) -> Result<(), MulticastError>
    where
        P: MembershipProvider,
        D: MacFilterDriver,
        S: MldSender,
        R: Rng,
    {
        let changes = reconcile::join_group(
            &mut self.table,
            &self.name,
            group,
            provider,
            driver,
            &self.logger,
        )?;
        self.dispatch_state_changes(changes, sender, now, rng);
        Ok(())
    }

    /// Any-source leave, the inverse of [`Self::join_multicast_group`]
    pub fn leave_multicast_group<P, D, S, R>(
        &mut self,
        group: Ipv6Addr,
        provider: &P,
        driver: &mut D,
        sender: &mut S,
        now: Instant,
        rng: &mut R,
    ) -> Result<(), MulticastError>
    where
        P: MembershipProvider,
        D: MacFilterDriver,
        S: MldSender,
        R: Rng,
    {
        let changes = reconcile::leave_group(
            &mut self.table,
            &self.name,
            group,
            provider,
            driver,
            &self.logger,
        )?;
        self.dispatch_state_changes(changes, sender, now, rng);
        Ok(())
    }

    /// Re-derive reception state after socket filters changed.
    ///
    /// `group` limits the walk to one group; `None` reconciles the whole
    /// table.
    pub fn membership_changed<P, D, S, R>(
        &mut self,
        group: Option<Ipv6Addr>,
        provider: &P,
        driver: &mut D,
        sender: &mut S,
        now: Instant,
        rng: &mut R,
    ) where
        P: MembershipProvider,
        D: MacFilterDriver,
        S: MldSender,
        R: Rng,
    {
        let changes = reconcile::update_multicast_filter(
            &mut self.table,
            &self.name,
            group,
            provider,
            driver,
            &self.logger,
        );
        self.dispatch_state_changes(changes, sender, now, rng);
    }

    /// Advance timers and transmit whatever falls due
    pub fn tick<S: MldSender, R: Rng>(&mut self, sender: &mut S, now: Instant, rng: &mut R) {
        let sends = self.mld.handle_event(MldEvent::Tick, now, rng);
        self.transmit(sends, sender);
    }

    /// Feed a received MLD query into the listener state machine
    pub fn process_query<S: MldSender, R: Rng>(
        &mut self,
        version: MldVersion,
        group: Option<Ipv6Addr>,
        sources: Vec<Ipv6Addr>,
        max_resp_delay: Duration,
        sender: &mut S,
        now: Instant,
        rng: &mut R,
    ) {
        log_debug!(
            self.logger,
            Facility::Mld,
            "{}: {:?} query, group {:?}, {} sources",
            self.name,
            version,
            group,
            sources.len()
        );
        let sends = self.mld.handle_event(
            MldEvent::QueryReceived {
                version,
                group,
                sources,
                max_resp_delay,
            },
            now,
            rng,
        );
        self.transmit(sends, sender);
    }

    /// Propagate a link state transition to the listener
    pub fn link_changed<R: Rng>(&mut self, up: bool, now: Instant, rng: &mut R) {
        let event = if up { MldEvent::LinkUp } else { MldEvent::LinkDown };
        log_debug!(
            self.logger,
            Facility::Mld,
            "{}: link {}",
            self.name,
            if up { "up" } else { "down" }
        );
        // link transitions never transmit directly
        let _ = self.mld.handle_event(event, now, rng);
    }

    /// Record whether a usable link-local source address exists
    pub fn set_link_local_available(&mut self, available: bool) {
        self.mld.set_link_local_available(available);
    }

    fn dispatch_state_changes<S: MldSender, R: Rng>(
        &mut self,
        changes: Vec<InterfaceStateChange>,
        sender: &mut S,
        now: Instant,
        rng: &mut R,
    ) {
        for change in changes {
            let sends = self.mld.handle_event(
                MldEvent::FilterChanged {
                    group: change.group,
                    state: change.state,
                },
                now,
                rng,
            );
            self.transmit(sends, sender);
        }
    }

    fn transmit<S: MldSender>(&self, sends: Vec<MldSend>, sender: &mut S) {
        for send in sends {
            if let Err(err) = sender.send(&send) {
                log_warning!(
                    self.logger,
                    Facility::Mld,
                    "{}: failed to send MLD message to {}: {}",
                    self.name,
                    send.destination,
                    err
                );
            }
        }
    }
}
