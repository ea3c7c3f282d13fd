// SPDX-License-Identifier: Apache-2.0 OR MIT
//! MLD message byte layouts.
//!
//! Builders for the ICMPv6 message bodies defined by RFC 2710 (MLDv1) and
//! RFC 3810 (MLDv2 Report). The checksum field is left zero: ICMPv6
//! checksums cover an IPv6 pseudo-header, so the transport layer computes
//! them when the enclosing packet is assembled.

use std::net::Ipv6Addr;

use super::{
    MldMessage, PacketBuilder, ReportRecord, MLD_V1_LISTENER_DONE, MLD_V1_LISTENER_REPORT,
    MLD_V2_LISTENER_REPORT,
};

/// Builder for MLDv1 Report and Done messages
///
/// Layout (RFC 2710 section 3): type, code, checksum, maximum response
/// delay, reserved, multicast address. 24 bytes.
#[derive(Debug)]
pub struct MldV1MessageBuilder {
    /// Message type (131 Report, 132 Done)
    pub msg_type: u8,
    /// Group the message refers to
    pub group: Ipv6Addr,
}

impl MldV1MessageBuilder {
    /// Build a Multicast Listener Report for `group`
    pub fn report(group: Ipv6Addr) -> Self {
        Self {
            msg_type: MLD_V1_LISTENER_REPORT,
            group,
        }
    }

    /// Build a Multicast Listener Done for `group`
    pub fn done(group: Ipv6Addr) -> Self {
        Self {
            msg_type: MLD_V1_LISTENER_DONE,
            group,
        }
    }
}

impl PacketBuilder for MldV1MessageBuilder {
    fn build(&self) -> Vec<u8> {
        let mut packet = Vec::with_capacity(24);

        // Type and code
        packet.push(self.msg_type);
        packet.push(0);

        // Checksum placeholder (filled by the ICMPv6 layer)
        packet.extend_from_slice(&[0, 0]);

        // Maximum response delay: zero in host-originated messages
        packet.extend_from_slice(&[0, 0]);

        // Reserved
        packet.extend_from_slice(&[0, 0]);

        // Multicast address
        packet.extend_from_slice(&self.group.octets());

        packet
    }
}

/// Builder for MLDv2 Multicast Listener Report messages
///
/// Layout (RFC 3810 section 5.2): type, reserved, checksum, reserved,
/// number of records, then one multicast address record per entry.
#[derive(Debug)]
pub struct MldV2ReportBuilder {
    /// Address records carried by the report
    pub records: Vec<ReportRecord>,
}

impl MldV2ReportBuilder {
    /// Build a report from record contents
    pub fn new(records: Vec<ReportRecord>) -> Self {
        Self { records }
    }
}

impl PacketBuilder for MldV2ReportBuilder {
    fn build(&self) -> Vec<u8> {
        let mut packet = Vec::with_capacity(8 + self.records.len() * 20);

        // Type and reserved
        packet.push(MLD_V2_LISTENER_REPORT);
        packet.push(0);

        // Checksum placeholder (filled by the ICMPv6 layer)
        packet.extend_from_slice(&[0, 0]);

        // Reserved
        packet.extend_from_slice(&[0, 0]);

        // Number of multicast address records
        packet.extend_from_slice(&(self.records.len() as u16).to_be_bytes());

        for record in &self.records {
            // Record type, aux data len, number of sources
            packet.push(record.record_type.as_u8());
            packet.push(0);
            packet.extend_from_slice(&(record.sources.len() as u16).to_be_bytes());

            // Multicast address, then source addresses
            packet.extend_from_slice(&record.group.octets());
            for source in &record.sources {
                packet.extend_from_slice(&source.octets());
            }
        }

        packet
    }
}

/// Serialize any [`MldMessage`] to its wire body
pub fn build_message(message: &MldMessage) -> Vec<u8> {
    match message {
        MldMessage::V1Report { group } => MldV1MessageBuilder::report(*group).build(),
        MldMessage::V1Done { group } => MldV1MessageBuilder::done(*group).build(),
        MldMessage::V2Report { records } => MldV2ReportBuilder::new(records.clone()).build(),
    }
}
