// SPDX-License-Identifier: Apache-2.0 OR MIT
//! MLD listener state machine (RFC 2710 / RFC 3810, host side).
//!
//! Tracks each group's listener lifecycle and emits the Report/Done
//! messages and State-Change reports that advertise the interface's
//! reconciled reception state on the link.
//!
//! ## Per-group states
//!
//! | State | Meaning |
//! |-------|---------|
//! | (absent) | Non-listener: no reception state exists |
//! | Init | Reception state exists but no usable link-local source yet |
//! | Delaying | v1 compatibility: unsolicited/query-delayed report armed |
//! | Idle | Reported; v2 groups carry pending State-Change records here |
//!
//! ## Timers
//!
//! All timers are `Instant` deadlines advanced by [`MldNodeState::handle_event`]
//! with [`MldEvent::Tick`]; the node performs no I/O and takes the caller's
//! clock and RNG, so the whole machine is testable without a runtime.
//!
//! | Timer | Scope | Purpose |
//! |-------|-------|---------|
//! | Delay timer | group (v1) | Unsolicited/query-delayed v1 Report |
//! | State-change retransmit | interface (v2) | Resend pending ALLOW/BLOCK/TO_IN/TO_EX |
//! | General query response | interface (v2) | Current-State report for all groups |
//! | Group query response | group (v2) | Current-State report for queried sources |
//! | Older-version querier present | interface | Fall back to v2 once v1 queriers go quiet |

use std::collections::HashMap;
use std::net::Ipv6Addr;
use std::time::{Duration, Instant};

use rand::Rng;

use super::{MldEvent, MldMessage, MldSend, MldVersion, RecordType, ReportRecord};
use crate::config::MldConfig;
use crate::filter::{FilterMode, FilterState};
use crate::sources::SourceSet;
use crate::validation;

/// Host compatibility mode for the link
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompatMode {
    /// An MLDv1 querier is present; v1 message formats only
    V1,
    /// Native MLDv2 operation
    V2,
}

/// Lifecycle state of one listened-to group
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListenerState {
    /// Reception state exists but no usable link-local source address yet
    Init,
    /// v1 compatibility: a delayed Report is armed
    Delaying {
        /// When the pending v1 Report fires
        deadline: Instant,
    },
    /// Listening and reported; v2 pending records ride on this state
    Idle,
}

/// Per-group protocol state
#[derive(Debug)]
struct MldGroup {
    state: ListenerState,
    /// Copy of the reconciled filter state last pushed by the engine
    filter: FilterState,
    /// v1: a Report was sent for this group, so a Done is owed on leave
    flag: bool,
    /// Remaining transmissions of the pending State-Change report
    retransmit_count: u8,
    /// Pending filter-mode change (TO_IN / TO_EX), overrides allow/block
    mode_change: Option<FilterMode>,
    /// Pending ALLOW sources
    allow: SourceSet,
    /// Pending BLOCK sources
    block: SourceSet,
    /// Sources named by a pending group-and-source-specific query
    queried: SourceSet,
    /// A group-specific query without sources wants the full state
    queried_all: bool,
    /// Deadline for the pending query response
    response_deadline: Option<Instant>,
}

impl MldGroup {
    fn new(filter: FilterState, source_capacity: usize) -> Self {
        Self {
            state: ListenerState::Init,
            filter,
            flag: false,
            retransmit_count: 0,
            mode_change: None,
            allow: SourceSet::with_capacity(source_capacity),
            block: SourceSet::with_capacity(source_capacity),
            queried: SourceSet::with_capacity(source_capacity),
            queried_all: false,
            response_deadline: None,
        }
    }

    fn has_pending_change(&self) -> bool {
        self.mode_change.is_some() || !self.allow.is_empty() || !self.block.is_empty()
    }

    fn clear_pending(&mut self) {
        self.retransmit_count = 0;
        self.mode_change = None;
        self.allow.clear();
        self.block.clear();
    }

    fn clear_query_state(&mut self) {
        self.queried.clear();
        self.queried_all = false;
        self.response_deadline = None;
    }

    /// Current-State record describing the full filter state
    fn current_state_record(&self, group: Ipv6Addr) -> ReportRecord {
        let record_type = match self.filter.mode {
            FilterMode::Include => RecordType::ModeIsInclude,
            FilterMode::Exclude => RecordType::ModeIsExclude,
        };
        ReportRecord {
            record_type,
            group,
            sources: self.filter.sources.to_vec(),
        }
    }
}

/// Per-interface MLD node state
#[derive(Debug)]
pub struct MldNodeState {
    config: MldConfig,
    source_capacity: usize,
    compat: CompatMode,
    link_up: bool,
    link_local_available: bool,
    older_version_deadline: Option<Instant>,
    general_response_deadline: Option<Instant>,
    state_change_deadline: Option<Instant>,
    groups: HashMap<Ipv6Addr, MldGroup>,
}

impl MldNodeState {
    /// Create MLD node state for one interface
    pub fn new(config: MldConfig, source_capacity: usize) -> Self {
        Self {
            config,
            source_capacity,
            compat: CompatMode::V2,
            link_up: false,
            link_local_available: false,
            older_version_deadline: None,
            general_response_deadline: None,
            state_change_deadline: None,
            groups: HashMap::new(),
        }
    }

    /// Current host compatibility mode
    pub fn compat_mode(&self) -> CompatMode {
        self.compat
    }

    /// Listener state for a group, if the node tracks it
    pub fn listener_state(&self, group: Ipv6Addr) -> Option<ListenerState> {
        self.groups.get(&group).map(|g| g.state)
    }

    /// Number of tracked groups
    pub fn group_count(&self) -> usize {
        self.groups.len()
    }

    /// Whether a group still owes State-Change transmissions
    pub fn has_pending_state_change(&self, group: Ipv6Addr) -> bool {
        self.groups
            .get(&group)
            .map(|g| g.retransmit_count > 0 && g.has_pending_change())
            .unwrap_or(false)
    }

    /// Record whether a usable link-local source address exists.
    ///
    /// Groups parked in Init are promoted on the next tick once both the
    /// link and a link-local address are available.
    pub fn set_link_local_available(&mut self, available: bool) {
        self.link_local_available = available;
    }

    fn ready(&self) -> bool {
        self.link_up && self.link_local_available
    }

    /// Feed one event into the state machine, returning messages to send
    pub fn handle_event<R: Rng>(
        &mut self,
        event: MldEvent,
        now: Instant,
        rng: &mut R,
    ) -> Vec<MldSend> {
        match event {
            MldEvent::Tick => self.tick(now, rng),
            MldEvent::FilterChanged { group, state } => {
                self.filter_changed(group, state, now, rng)
            }
            MldEvent::LinkUp => {
                self.reset(true);
                Vec::new()
            }
            MldEvent::LinkDown => {
                self.reset(false);
                Vec::new()
            }
            MldEvent::QueryReceived {
                version,
                group,
                sources,
                max_resp_delay,
            } => {
                self.query_received(version, group, &sources, max_resp_delay, now, rng);
                Vec::new()
            }
        }
    }

    /// Link flap handling: back to v2, all timers stopped, every group
    /// back to Init with its flag and pending report state cleared
    fn reset(&mut self, link_up: bool) {
        self.link_up = link_up;
        self.compat = CompatMode::V2;
        self.older_version_deadline = None;
        self.general_response_deadline = None;
        self.state_change_deadline = None;
        for group in self.groups.values_mut() {
            group.state = ListenerState::Init;
            group.flag = false;
            group.clear_pending();
            group.clear_query_state();
        }
    }

    fn filter_changed<R: Rng>(
        &mut self,
        group: Ipv6Addr,
        state: FilterState,
        now: Instant,
        rng: &mut R,
    ) -> Vec<MldSend> {
        if !validation::is_mld_reportable(group) {
            return Vec::new();
        }
        if state.is_absent() {
            return self.group_removed(group);
        }

        if !self.groups.contains_key(&group) {
            self.groups
                .insert(group, MldGroup::new(state, self.source_capacity));
            return self.activate_init_groups(now, rng);
        }

        let robustness = self.config.robustness_variable;
        let jitter = random_delay(rng, self.config.v2_unsolicited_report_interval());
        let compat = self.compat;
        let Some(entry) = self.groups.get_mut(&group) else {
            return Vec::new();
        };
        if entry.state == ListenerState::Idle && compat == CompatMode::V2 {
            let changed = merge_filter_change(entry, &state);
            entry.filter = state;
            if changed {
                entry.retransmit_count = robustness;
                self.state_change_deadline = Some(now + jitter);
            }
        } else {
            // Init groups report the final state when promoted;
            // v1 has no source-change signalling
            entry.filter = state;
        }
        Vec::new()
    }

    /// A group's reception state returned to (INCLUDE, empty): say goodbye
    /// and drop the slot with any in-flight retransmissions
    fn group_removed(&mut self, group: Ipv6Addr) -> Vec<MldSend> {
        let mut sends = Vec::new();
        if let Some(entry) = self.groups.remove(&group) {
            if self.ready() && entry.state != ListenerState::Init {
                match self.compat {
                    CompatMode::V1 => {
                        if entry.flag {
                            sends.push(MldSend::new(MldMessage::V1Done { group }));
                        }
                    }
                    CompatMode::V2 => {
                        // empty TO_IN announces "no longer listening"
                        sends.push(MldSend::new(MldMessage::V2Report {
                            records: vec![ReportRecord {
                                record_type: RecordType::ChangeToInclude,
                                group,
                                sources: Vec::new(),
                            }],
                        }));
                    }
                }
            }
        }
        if !self
            .groups
            .values()
            .any(|g| g.retransmit_count > 0 && g.has_pending_change())
        {
            self.state_change_deadline = None;
        }
        sends
    }

    /// Promote Init groups once the link and a link-local source exist
    fn activate_init_groups<R: Rng>(&mut self, now: Instant, rng: &mut R) -> Vec<MldSend> {
        let mut sends = Vec::new();
        if !self.ready() {
            return sends;
        }
        let mut kicked_state_change = false;
        for (addr, group) in self.groups.iter_mut() {
            if group.state != ListenerState::Init {
                continue;
            }
            match self.compat {
                CompatMode::V1 => {
                    sends.push(MldSend::new(MldMessage::V1Report { group: *addr }));
                    group.flag = true;
                    group.state = ListenerState::Delaying {
                        deadline: now
                            + random_delay(rng, self.config.v1_unsolicited_report_interval()),
                    };
                }
                CompatMode::V2 => {
                    group.state = ListenerState::Idle;
                    group.clear_pending();
                    match group.filter.mode {
                        FilterMode::Include => {
                            group.allow = group.filter.sources.clone();
                        }
                        FilterMode::Exclude => {
                            group.mode_change = Some(FilterMode::Exclude);
                        }
                    }
                    if group.has_pending_change() {
                        group.retransmit_count = self.config.robustness_variable;
                        kicked_state_change = true;
                    }
                }
            }
        }
        if kicked_state_change {
            // immediate send on the next tick
            let deadline = self.state_change_deadline.map_or(now, |d| d.min(now));
            self.state_change_deadline = Some(deadline);
        }
        sends
    }

    fn tick<R: Rng>(&mut self, now: Instant, rng: &mut R) -> Vec<MldSend> {
        let mut sends = Vec::new();
        if !self.link_up {
            return sends;
        }

        // leaky-bucket compatibility fallback
        if due(self.older_version_deadline, now) {
            self.older_version_deadline = None;
            self.compat = CompatMode::V2;
            for group in self.groups.values_mut() {
                if matches!(group.state, ListenerState::Delaying { .. }) {
                    group.state = ListenerState::Idle;
                }
            }
        }

        sends.extend(self.activate_init_groups(now, rng));
        if !self.ready() {
            return sends;
        }

        // v1 delayed reports
        for (addr, group) in self.groups.iter_mut() {
            if let ListenerState::Delaying { deadline } = group.state {
                if deadline <= now {
                    sends.push(MldSend::new(MldMessage::V1Report { group: *addr }));
                    group.flag = true;
                    group.state = ListenerState::Idle;
                }
            }
        }

        // v2 general query response
        if due(self.general_response_deadline, now) {
            self.general_response_deadline = None;
            if self.compat == CompatMode::V2 {
                let records: Vec<ReportRecord> = self
                    .groups
                    .iter()
                    .filter(|(_, g)| g.state != ListenerState::Init)
                    .map(|(addr, g)| g.current_state_record(*addr))
                    .collect();
                if !records.is_empty() {
                    sends.push(MldSend::new(MldMessage::V2Report { records }));
                }
            }
        }

        // v2 group-specific query responses
        let mut query_records = Vec::new();
        for (addr, group) in self.groups.iter_mut() {
            if !due(group.response_deadline, now) {
                continue;
            }
            if let Some(record) = build_query_response(*addr, group) {
                query_records.push(record);
            }
            group.clear_query_state();
        }
        if !query_records.is_empty() {
            sends.push(MldSend::new(MldMessage::V2Report {
                records: query_records,
            }));
        }

        // State-Change retransmission
        if due(self.state_change_deadline, now) {
            self.state_change_deadline = None;
            let mut records = Vec::new();
            let mut remaining = false;
            for (addr, group) in self.groups.iter_mut() {
                if group.retransmit_count == 0 || !group.has_pending_change() {
                    continue;
                }
                match group.mode_change {
                    Some(FilterMode::Exclude) => records.push(ReportRecord {
                        record_type: RecordType::ChangeToExclude,
                        group: *addr,
                        sources: group.filter.sources.to_vec(),
                    }),
                    Some(FilterMode::Include) => records.push(ReportRecord {
                        record_type: RecordType::ChangeToInclude,
                        group: *addr,
                        sources: group.filter.sources.to_vec(),
                    }),
                    None => {
                        if !group.allow.is_empty() {
                            records.push(ReportRecord {
                                record_type: RecordType::AllowNewSources,
                                group: *addr,
                                sources: group.allow.to_vec(),
                            });
                        }
                        if !group.block.is_empty() {
                            records.push(ReportRecord {
                                record_type: RecordType::BlockOldSources,
                                group: *addr,
                                sources: group.block.to_vec(),
                            });
                        }
                    }
                }
                group.retransmit_count -= 1;
                if group.retransmit_count == 0 {
                    group.clear_pending();
                } else {
                    remaining = true;
                }
            }
            if !records.is_empty() {
                sends.push(MldSend::new(MldMessage::V2Report { records }));
            }
            if remaining {
                self.state_change_deadline =
                    Some(now + random_delay(rng, self.config.v2_unsolicited_report_interval()));
            }
        }

        sends
    }

    fn query_received<R: Rng>(
        &mut self,
        version: MldVersion,
        group: Option<Ipv6Addr>,
        sources: &[Ipv6Addr],
        max_resp_delay: Duration,
        now: Instant,
        rng: &mut R,
    ) {
        if !self.link_up {
            return;
        }
        match version {
            MldVersion::V1 => {
                if self.compat == CompatMode::V2 {
                    // entering v1 compatibility discards all pending v2
                    // report state
                    self.compat = CompatMode::V1;
                    self.state_change_deadline = None;
                    self.general_response_deadline = None;
                    for entry in self.groups.values_mut() {
                        entry.clear_pending();
                        entry.clear_query_state();
                    }
                }
                self.older_version_deadline =
                    Some(now + self.config.older_version_querier_present_timeout());
                self.schedule_v1_responses(group, max_resp_delay, now, rng);
            }
            MldVersion::V2 => match self.compat {
                // a host in v1 compatibility answers every query with v1
                // reports
                CompatMode::V1 => self.schedule_v1_responses(group, max_resp_delay, now, rng),
                CompatMode::V2 => match group {
                    None => {
                        let candidate = now + random_delay(rng, max_resp_delay);
                        self.general_response_deadline = Some(
                            self.general_response_deadline
                                .map_or(candidate, |d| d.min(candidate)),
                        );
                    }
                    Some(queried_group) => {
                        if let Some(entry) = self.groups.get_mut(&queried_group) {
                            if entry.state == ListenerState::Idle {
                                if sources.is_empty() {
                                    entry.queried_all = true;
                                } else {
                                    for source in sources {
                                        let _ = entry.queried.add(*source);
                                    }
                                }
                                let candidate = now + random_delay(rng, max_resp_delay);
                                entry.response_deadline = Some(
                                    entry
                                        .response_deadline
                                        .map_or(candidate, |d| d.min(candidate)),
                                );
                            }
                        }
                    }
                },
            },
        }
    }

    /// Arm (or tighten) v1 delay timers for the queried group(s)
    fn schedule_v1_responses<R: Rng>(
        &mut self,
        group: Option<Ipv6Addr>,
        max_resp_delay: Duration,
        now: Instant,
        rng: &mut R,
    ) {
        for (addr, entry) in self.groups.iter_mut() {
            if group.map_or(false, |g| g != *addr) {
                continue;
            }
            let candidate = now + random_delay(rng, max_resp_delay);
            match entry.state {
                ListenerState::Idle => {
                    entry.state = ListenerState::Delaying {
                        deadline: candidate,
                    };
                }
                ListenerState::Delaying { deadline } if candidate < deadline => {
                    entry.state = ListenerState::Delaying {
                        deadline: candidate,
                    };
                }
                _ => {}
            }
        }
    }
}

/// Merge a reconciled filter change into a group's pending report state.
///
/// ALLOW and BLOCK cancel each other per source; a mode flip supersedes
/// both and becomes a pending TO_IN/TO_EX. Returns whether this change
/// actually differed from the recorded state, so a re-delivered identical
/// state never restarts an in-flight retransmission.
fn merge_filter_change(entry: &mut MldGroup, new_state: &FilterState) -> bool {
    if new_state.mode != entry.filter.mode {
        entry.mode_change = Some(new_state.mode);
        entry.allow.clear();
        entry.block.clear();
        return true;
    }
    let mut changed = false;
    let old = &entry.filter;
    match new_state.mode {
        FilterMode::Include => {
            // newly included sources are allowed, dropped ones blocked
            for source in new_state.sources.iter() {
                if !old.sources.contains(source) {
                    entry.block.remove(source);
                    let _ = entry.allow.add(source);
                    changed = true;
                }
            }
            for source in old.sources.iter() {
                if !new_state.sources.contains(source) {
                    entry.allow.remove(source);
                    let _ = entry.block.add(source);
                    changed = true;
                }
            }
        }
        FilterMode::Exclude => {
            // newly excluded sources are blocked, un-excluded ones allowed
            for source in new_state.sources.iter() {
                if !old.sources.contains(source) {
                    entry.allow.remove(source);
                    let _ = entry.block.add(source);
                    changed = true;
                }
            }
            for source in old.sources.iter() {
                if !new_state.sources.contains(source) {
                    entry.block.remove(source);
                    let _ = entry.allow.add(source);
                    changed = true;
                }
            }
        }
    }
    changed
}

/// Current-State record answering a group(-and-source)-specific query.
///
/// With a source list, the response is the set of queried sources the
/// listener actually wants (RFC 3810 section 5.2): the intersection for
/// INCLUDE mode, the queried sources not excluded for EXCLUDE mode. An
/// empty result suppresses the record.
fn build_query_response(group: Ipv6Addr, entry: &MldGroup) -> Option<ReportRecord> {
    if entry.queried_all || entry.queried.is_empty() {
        return Some(entry.current_state_record(group));
    }
    let sources: Vec<Ipv6Addr> = match entry.filter.mode {
        FilterMode::Include => entry
            .queried
            .iter()
            .filter(|s| entry.filter.sources.contains(*s))
            .collect(),
        FilterMode::Exclude => entry
            .queried
            .iter()
            .filter(|s| !entry.filter.sources.contains(*s))
            .collect(),
    };
    if sources.is_empty() {
        return None;
    }
    Some(ReportRecord {
        record_type: RecordType::ModeIsInclude,
        group,
        sources,
    })
}

fn due(deadline: Option<Instant>, now: Instant) -> bool {
    deadline.map_or(false, |d| d <= now)
}

/// Random delay in [0, max], used for report jitter
fn random_delay<R: Rng>(rng: &mut R, max: Duration) -> Duration {
    if max.is_zero() {
        return Duration::ZERO;
    }
    Duration::from_millis(rng.gen_range(0..=max.as_millis() as u64))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    const GROUP: &str = "ff0e::1:2";

    fn group() -> Ipv6Addr {
        GROUP.parse().unwrap()
    }

    fn src(n: u16) -> Ipv6Addr {
        format!("2001:db8::{:x}", n).parse().unwrap()
    }

    fn rng() -> StdRng {
        StdRng::seed_from_u64(7)
    }

    fn node() -> MldNodeState {
        let mut node = MldNodeState::new(MldConfig::default(), 16);
        node.set_link_local_available(true);
        node.handle_event(MldEvent::LinkUp, Instant::now(), &mut rng());
        node.set_link_local_available(true);
        node
    }

    fn exclude_none() -> FilterState {
        FilterState::exclude_none(16)
    }

    fn include(sources: &[Ipv6Addr]) -> FilterState {
        FilterState {
            mode: FilterMode::Include,
            sources: SourceSet::from_slice(16, sources).unwrap(),
        }
    }

    fn state_changed(node: &mut MldNodeState, state: FilterState, now: Instant) -> Vec<MldSend> {
        node.handle_event(
            MldEvent::FilterChanged {
                group: group(),
                state,
            },
            now,
            &mut rng(),
        )
    }

    #[test]
    fn test_any_source_join_schedules_to_ex() {
        let mut node = node();
        let now = Instant::now();

        let sends = state_changed(&mut node, exclude_none(), now);
        assert!(sends.is_empty());
        assert_eq!(node.listener_state(group()), Some(ListenerState::Idle));
        assert!(node.has_pending_state_change(group()));

        // the scheduled report goes out on the next tick
        let sends = node.handle_event(MldEvent::Tick, now, &mut rng());
        assert_eq!(sends.len(), 1);
        let MldMessage::V2Report { records } = &sends[0].message else {
            panic!("expected a v2 report, got {:?}", sends[0].message);
        };
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].record_type, RecordType::ChangeToExclude);
        assert!(records[0].sources.is_empty());
        assert_eq!(
            sends[0].destination,
            validation::ALL_MLDV2_ROUTERS
        );
    }

    #[test]
    fn test_retransmissions_stop_after_robustness() {
        let mut node = node();
        let mut r = rng();
        let now = Instant::now();
        state_changed(&mut node, exclude_none(), now);

        let mut transmissions = 0;
        let mut t = now;
        // walk forward well past the retransmit window
        for _ in 0..50 {
            t += Duration::from_millis(200);
            let sends = node.handle_event(MldEvent::Tick, t, &mut r);
            transmissions += sends
                .iter()
                .filter(|s| matches!(s.message, MldMessage::V2Report { .. }))
                .count();
        }
        assert_eq!(transmissions, MldConfig::default().robustness_variable as usize);
        assert!(!node.has_pending_state_change(group()));
    }

    #[test]
    fn test_group_stays_init_without_link_local() {
        let mut node = MldNodeState::new(MldConfig::default(), 16);
        node.handle_event(MldEvent::LinkUp, Instant::now(), &mut rng());
        // link up but no usable source address yet
        let now = Instant::now();
        state_changed(&mut node, exclude_none(), now);
        assert_eq!(node.listener_state(group()), Some(ListenerState::Init));

        node.set_link_local_available(true);
        let sends = node.handle_event(MldEvent::Tick, now, &mut rng());
        // promotion arms the state-change timer at `now`, so the very same
        // tick carries the first unsolicited report
        assert_eq!(sends.len(), 1);
        assert!(matches!(sends[0].message, MldMessage::V2Report { .. }));
        assert_eq!(node.listener_state(group()), Some(ListenerState::Idle));
    }

    #[test]
    fn test_v1_compat_unsolicited_report_and_delaying() {
        let mut node = node();
        let mut r = rng();
        let now = Instant::now();

        // a v1 query flips the node into compatibility mode
        node.handle_event(
            MldEvent::QueryReceived {
                version: MldVersion::V1,
                group: None,
                sources: vec![],
                max_resp_delay: Duration::from_secs(10),
            },
            now,
            &mut r,
        );
        assert_eq!(node.compat_mode(), CompatMode::V1);

        let sends = state_changed(&mut node, exclude_none(), now);
        assert_eq!(sends.len(), 1);
        assert_eq!(
            sends[0].message,
            MldMessage::V1Report { group: group() }
        );
        // v1 reports are sent to the group itself
        assert_eq!(sends[0].destination, group());
        assert!(matches!(
            node.listener_state(group()),
            Some(ListenerState::Delaying { .. })
        ));

        // the delay timer re-sends once, then the group idles
        let mut t = now;
        let mut reports = 0;
        for _ in 0..60 {
            t += Duration::from_millis(250);
            reports += node.handle_event(MldEvent::Tick, t, &mut r).len();
        }
        assert_eq!(reports, 1);
        assert_eq!(node.listener_state(group()), Some(ListenerState::Idle));
    }

    #[test]
    fn test_v1_leave_sends_done_only_if_reported() {
        let mut node = node();
        let mut r = rng();
        let now = Instant::now();
        node.handle_event(
            MldEvent::QueryReceived {
                version: MldVersion::V1,
                group: None,
                sources: vec![],
                max_resp_delay: Duration::from_secs(10),
            },
            now,
            &mut r,
        );

        state_changed(&mut node, exclude_none(), now);
        let sends = state_changed(&mut node, FilterState::include_none(16), now);
        assert_eq!(sends.len(), 1);
        assert_eq!(sends[0].message, MldMessage::V1Done { group: group() });
        assert_eq!(
            sends[0].destination,
            validation::ALL_ROUTERS_LINK_LOCAL
        );
        assert_eq!(node.group_count(), 0);
    }

    #[test]
    fn test_v2_leave_sends_empty_to_in() {
        let mut node = node();
        let now = Instant::now();
        state_changed(&mut node, exclude_none(), now);
        node.handle_event(MldEvent::Tick, now, &mut rng());

        let sends = state_changed(&mut node, FilterState::include_none(16), now);
        assert_eq!(sends.len(), 1);
        let MldMessage::V2Report { records } = &sends[0].message else {
            panic!("expected v2 report");
        };
        assert_eq!(records[0].record_type, RecordType::ChangeToInclude);
        assert!(records[0].sources.is_empty());
        assert_eq!(node.group_count(), 0);
    }

    #[test]
    fn test_allow_cancels_pending_block() {
        let mut node = node();
        let mut r = rng();
        let now = Instant::now();
        state_changed(&mut node, include(&[src(1), src(2)]), now);
        node.handle_event(MldEvent::Tick, now, &mut r);

        // drop src(2): pending BLOCK{2}
        state_changed(&mut node, include(&[src(1)]), now);
        // re-add src(2) before the report goes out: BLOCK cancelled
        state_changed(&mut node, include(&[src(1), src(2)]), now);

        let mut t = now;
        let mut records_seen = Vec::new();
        for _ in 0..20 {
            t += Duration::from_millis(200);
            for send in node.handle_event(MldEvent::Tick, t, &mut r) {
                if let MldMessage::V2Report { records } = send.message {
                    records_seen.extend(records);
                }
            }
        }
        assert!(records_seen
            .iter()
            .all(|rec| rec.record_type != RecordType::BlockOldSources));
    }

    #[test]
    fn test_link_down_resets_groups_and_compat() {
        let mut node = node();
        let mut r = rng();
        let now = Instant::now();
        node.handle_event(
            MldEvent::QueryReceived {
                version: MldVersion::V1,
                group: None,
                sources: vec![],
                max_resp_delay: Duration::from_secs(10),
            },
            now,
            &mut r,
        );
        state_changed(&mut node, exclude_none(), now);

        node.handle_event(MldEvent::LinkDown, now, &mut r);
        assert_eq!(node.compat_mode(), CompatMode::V2);
        assert_eq!(node.listener_state(group()), Some(ListenerState::Init));
        assert!(!node.has_pending_state_change(group()));

        // ticking while down emits nothing
        assert!(node
            .handle_event(MldEvent::Tick, now + Duration::from_secs(5), &mut r)
            .is_empty());
    }

    #[test]
    fn test_older_version_timer_restores_v2() {
        let mut node = node();
        let mut r = rng();
        let now = Instant::now();
        node.handle_event(
            MldEvent::QueryReceived {
                version: MldVersion::V1,
                group: None,
                sources: vec![],
                max_resp_delay: Duration::from_secs(1),
            },
            now,
            &mut r,
        );
        assert_eq!(node.compat_mode(), CompatMode::V1);

        let after = now
            + MldConfig::default().older_version_querier_present_timeout()
            + Duration::from_secs(1);
        node.handle_event(MldEvent::Tick, after, &mut r);
        assert_eq!(node.compat_mode(), CompatMode::V2);
    }

    #[test]
    fn test_general_query_response_reports_all_groups() {
        let mut node = node();
        let mut r = rng();
        let now = Instant::now();
        state_changed(&mut node, exclude_none(), now);
        let other: Ipv6Addr = "ff0e::42".parse().unwrap();
        node.handle_event(
            MldEvent::FilterChanged {
                group: other,
                state: include(&[src(5)]),
            },
            now,
            &mut r,
        );
        // flush unsolicited state-change reports first
        let mut t = now;
        for _ in 0..30 {
            t += Duration::from_millis(200);
            node.handle_event(MldEvent::Tick, t, &mut r);
        }

        node.handle_event(
            MldEvent::QueryReceived {
                version: MldVersion::V2,
                group: None,
                sources: vec![],
                max_resp_delay: Duration::from_millis(400),
            },
            t,
            &mut r,
        );
        let mut current_state: Vec<ReportRecord> = Vec::new();
        for _ in 0..5 {
            t += Duration::from_millis(200);
            for send in node.handle_event(MldEvent::Tick, t, &mut r) {
                if let MldMessage::V2Report { records } = send.message {
                    current_state.extend(records);
                }
            }
        }
        assert_eq!(current_state.len(), 2);
        assert!(current_state.iter().any(|rec| {
            rec.group == group() && rec.record_type == RecordType::ModeIsExclude
        }));
        assert!(current_state.iter().any(|rec| {
            rec.group == other
                && rec.record_type == RecordType::ModeIsInclude
                && rec.sources == vec![src(5)]
        }));
    }

    #[test]
    fn test_source_specific_query_intersects_include() {
        let mut node = node();
        let mut r = rng();
        let now = Instant::now();
        state_changed(&mut node, include(&[src(1), src(2)]), now);
        let mut t = now;
        for _ in 0..30 {
            t += Duration::from_millis(200);
            node.handle_event(MldEvent::Tick, t, &mut r);
        }

        node.handle_event(
            MldEvent::QueryReceived {
                version: MldVersion::V2,
                group: Some(group()),
                sources: vec![src(2), src(3)],
                max_resp_delay: Duration::from_millis(200),
            },
            t,
            &mut r,
        );
        let mut records: Vec<ReportRecord> = Vec::new();
        for _ in 0..3 {
            t += Duration::from_millis(200);
            for send in node.handle_event(MldEvent::Tick, t, &mut r) {
                if let MldMessage::V2Report { records: recs } = send.message {
                    records.extend(recs);
                }
            }
        }
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].record_type, RecordType::ModeIsInclude);
        assert_eq!(records[0].sources, vec![src(2)]);
    }

    #[test]
    fn test_all_nodes_group_is_never_reported() {
        let mut node = node();
        let now = Instant::now();
        let sends = node.handle_event(
            MldEvent::FilterChanged {
                group: validation::ALL_NODES_LINK_LOCAL,
                state: exclude_none(),
            },
            now,
            &mut rng(),
        );
        assert!(sends.is_empty());
        assert_eq!(node.group_count(), 0);
    }
}
