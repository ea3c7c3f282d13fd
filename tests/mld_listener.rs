// SPDX-License-Identifier: Apache-2.0 OR MIT
//! Listener behavior through the per-interface context: joins and leaves
//! feeding the MLD state machine, query handling, and compatibility mode.

use std::net::Ipv6Addr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use rand::rngs::StdRng;
use rand::SeedableRng;

use mld_node::interface::RecordingSender;
use mld_node::logging::{Logger, MemorySink};
use mld_node::mac::RecordingMacFilter;
use mld_node::protocols::RecordType;
use mld_node::validation;
use mld_node::{
    FilterMode, MldMessage, MldVersion, MulticastInterface, MulticastSocket, NodeConfig,
    SocketKind, SocketTable,
};

const ETH0: &str = "eth0";

fn group(s: &str) -> Ipv6Addr {
    s.parse().unwrap()
}

fn src(n: u16) -> Ipv6Addr {
    format!("2001:db8::{:x}", n).parse().unwrap()
}

struct Fixture {
    iface: MulticastInterface,
    sockets: SocketTable,
    driver: RecordingMacFilter,
    sender: RecordingSender,
    rng: StdRng,
    now: Instant,
}

impl Fixture {
    fn new() -> Self {
        let mut iface = MulticastInterface::new(
            ETH0,
            &NodeConfig::default(),
            Logger::new(Arc::new(MemorySink::new())),
        );
        let now = Instant::now();
        let mut rng = StdRng::seed_from_u64(42);
        iface.set_link_local_available(true);
        iface.link_changed(true, now, &mut rng);
        Self {
            iface,
            sockets: SocketTable::new(),
            driver: RecordingMacFilter::new(),
            sender: RecordingSender::new(),
            rng,
            now,
        }
    }

    fn join(&mut self, g: Ipv6Addr) {
        self.iface
            .join_multicast_group(
                g,
                &self.sockets,
                &mut self.driver,
                &mut self.sender,
                self.now,
                &mut self.rng,
            )
            .unwrap();
    }

    fn leave(&mut self, g: Ipv6Addr) {
        self.iface
            .leave_multicast_group(
                g,
                &self.sockets,
                &mut self.driver,
                &mut self.sender,
                self.now,
                &mut self.rng,
            )
            .unwrap();
    }

    fn run_ticks(&mut self, ticks: usize) {
        for _ in 0..ticks {
            self.now += Duration::from_millis(200);
            let now = self.now;
            self.iface.tick(&mut self.sender, now, &mut self.rng);
        }
    }

    fn v2_records(&self) -> Vec<(RecordType, Ipv6Addr, Vec<Ipv6Addr>)> {
        self.sender
            .sent()
            .iter()
            .filter_map(|send| match &send.message {
                MldMessage::V2Report { records } => Some(records.clone()),
                _ => None,
            })
            .flatten()
            .map(|r| (r.record_type, r.group, r.sources))
            .collect()
    }
}

#[test]
fn test_join_emits_to_ex_robustness_times() {
    let mut fx = Fixture::new();
    let g = group("ff0e::db8:1");
    fx.join(g);
    fx.run_ticks(30);

    let to_ex: Vec<_> = fx
        .v2_records()
        .into_iter()
        .filter(|(t, _, _)| *t == RecordType::ChangeToExclude)
        .collect();
    assert_eq!(
        to_ex.len(),
        NodeConfig::default().mld.robustness_variable as usize
    );
    assert!(to_ex.iter().all(|(_, grp, sources)| *grp == g && sources.is_empty()));
    // all state-change reports go to the MLDv2 routers group
    for send in fx.sender.sent() {
        assert_eq!(send.destination, validation::ALL_MLDV2_ROUTERS);
    }
}

#[test]
fn test_leave_emits_goodbye_to_in() {
    let mut fx = Fixture::new();
    let g = group("ff0e::db8:1");
    fx.join(g);
    fx.run_ticks(30);
    fx.leave(g);

    let records = fx.v2_records();
    let (record_type, grp, sources) = records.last().unwrap();
    assert_eq!(*record_type, RecordType::ChangeToInclude);
    assert_eq!(*grp, g);
    assert!(sources.is_empty());
}

#[test]
fn test_source_filter_membership_reports_allow() {
    let mut fx = Fixture::new();
    let g = group("ff0e::db8:2");
    let mut socket = MulticastSocket::new(SocketKind::Datagram, 8);
    socket
        .set_filter(ETH0, g, FilterMode::Include, vec![src(1), src(2)])
        .unwrap();
    fx.sockets.add_socket(socket);

    let (now, mut rng) = (fx.now, StdRng::seed_from_u64(9));
    fx.iface.membership_changed(
        None,
        &fx.sockets,
        &mut fx.driver,
        &mut fx.sender,
        now,
        &mut rng,
    );
    fx.run_ticks(30);

    let allows: Vec<_> = fx
        .v2_records()
        .into_iter()
        .filter(|(t, _, _)| *t == RecordType::AllowNewSources)
        .collect();
    assert!(!allows.is_empty());
    let (_, grp, sources) = &allows[0];
    assert_eq!(*grp, g);
    assert_eq!(sources.len(), 2);
    assert!(sources.contains(&src(1)) && sources.contains(&src(2)));
}

#[test]
fn test_v1_query_switches_compat_and_uses_v1_messages() {
    let mut fx = Fixture::new();
    let g = group("ff0e::db8:3");

    let now = fx.now;
    let mut rng = StdRng::seed_from_u64(3);
    fx.iface.process_query(
        MldVersion::V1,
        None,
        Vec::new(),
        Duration::from_secs(10),
        &mut fx.sender,
        now,
        &mut rng,
    );

    fx.join(g);
    // the unsolicited v1 report goes straight out, addressed to the group
    let first = fx.sender.sent().first().unwrap().clone();
    assert_eq!(first.message, MldMessage::V1Report { group: g });
    assert_eq!(first.destination, g);

    fx.leave(g);
    let last = fx.sender.sent().last().unwrap();
    assert_eq!(last.message, MldMessage::V1Done { group: g });
    assert_eq!(last.destination, validation::ALL_ROUTERS_LINK_LOCAL);
}

#[test]
fn test_general_query_yields_current_state_report() {
    let mut fx = Fixture::new();
    let g = group("ff0e::db8:4");
    fx.join(g);
    fx.run_ticks(30);
    let sent_before = fx.sender.sent().len();

    let now = fx.now;
    let mut rng = StdRng::seed_from_u64(4);
    fx.iface.process_query(
        MldVersion::V2,
        None,
        Vec::new(),
        Duration::from_millis(400),
        &mut fx.sender,
        now,
        &mut rng,
    );
    fx.run_ticks(5);

    let new_records: Vec<_> = fx.v2_records();
    let is_ex: Vec<_> = new_records
        .into_iter()
        .filter(|(t, _, _)| *t == RecordType::ModeIsExclude)
        .collect();
    assert_eq!(is_ex.len(), 1);
    assert_eq!(is_ex[0].1, g);
    assert!(fx.sender.sent().len() > sent_before);
}

#[test]
fn test_link_flap_reannounces_membership() {
    let mut fx = Fixture::new();
    let g = group("ff0e::db8:5");
    fx.join(g);
    fx.run_ticks(30);
    let to_ex_before = fx
        .v2_records()
        .into_iter()
        .filter(|(t, _, _)| *t == RecordType::ChangeToExclude)
        .count();

    let now = fx.now;
    let mut rng = StdRng::seed_from_u64(5);
    fx.iface.link_changed(false, now, &mut rng);
    fx.iface.link_changed(true, now, &mut rng);
    fx.run_ticks(30);

    let to_ex_after = fx
        .v2_records()
        .into_iter()
        .filter(|(t, _, _)| *t == RecordType::ChangeToExclude)
        .count();
    assert_eq!(
        to_ex_after - to_ex_before,
        NodeConfig::default().mld.robustness_variable as usize
    );
    // MAC programming is untouched by the flap
    assert_eq!(fx.driver.accepted().len(), 1);
}

#[test]
fn test_all_nodes_group_joins_silently() {
    let mut fx = Fixture::new();
    fx.join(validation::ALL_NODES_LINK_LOCAL);
    fx.run_ticks(30);

    // reception and MAC programming happen, MLD stays quiet
    assert!(fx
        .iface
        .accepts(validation::ALL_NODES_LINK_LOCAL, src(1)));
    assert_eq!(fx.driver.accepted().len(), 1);
    assert!(fx.sender.sent().is_empty());
}
