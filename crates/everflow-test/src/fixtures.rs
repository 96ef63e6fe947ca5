//! Candidate packets and the addresses the test ACL rules match on.

use sonic_everflow_packet::{Frame, FrameBuilder};
use sonic_everflow_types::MacAddress;
use std::net::Ipv4Addr;

use crate::topology::TopologyKind;

/// Server address the ACL rules match on. Answered by the ARP responder.
pub const TARGET_SERVER_IP: Ipv4Addr = Ipv4Addr::new(192, 168, 0, 2);

/// Second server address, used as a non-matching destination.
pub const DEFAULT_SERVER_IP: Ipv4Addr = Ipv4Addr::new(192, 168, 0, 3);

/// Prefix of the MACs the ARP responder answers with; a four-digit index
/// completes it.
pub const VLAN_BASE_MAC_PREFIX: &str = "72060001";

/// Source address of candidate packets.
pub const DEFAULT_SRC_IP: Ipv4Addr = Ipv4Addr::new(20, 0, 0, 1);

/// Destination of candidate packets on leaf/spine testbeds.
pub const DEFAULT_DST_IP: Ipv4Addr = Ipv4Addr::new(30, 0, 0, 1);

pub const DEFAULT_TTL: u8 = 64;

/// Frame length of every candidate.
pub const CANDIDATE_FRAME_LEN: usize = 100;

/// Destination address routed by the DUT on a testbed of `kind`.
pub fn candidate_dst_ip(kind: TopologyKind) -> Ipv4Addr {
    match kind {
        TopologyKind::ServerUplink => TARGET_SERVER_IP,
        TopologyKind::LeafSpine => DEFAULT_DST_IP,
    }
}

fn base(router_mac: MacAddress, kind: TopologyKind) -> FrameBuilder {
    FrameBuilder::new()
        .eth_dst(router_mac)
        .ip_src(DEFAULT_SRC_IP)
        .ip_dst(candidate_dst_ip(kind))
        .ttl(DEFAULT_TTL)
        .frame_len(CANDIDATE_FRAME_LEN)
}

/// TCP SYN to port 8080, addressed to the router.
pub fn tcp_candidate(router_mac: MacAddress, kind: TopologyKind) -> Frame {
    base(router_mac, kind).tcp(2020, 8080, 0x02).build()
}

pub fn udp_candidate(router_mac: MacAddress, kind: TopologyKind) -> Frame {
    base(router_mac, kind).udp(2020, 8080, &[]).build()
}

pub fn icmp_candidate(router_mac: MacAddress, kind: TopologyKind) -> Frame {
    base(router_mac, kind).icmp_echo(1, 1, &[]).build()
}

/// TCP candidate carrying `dscp`, for the DSCP rule set.
pub fn dscp_candidate(router_mac: MacAddress, kind: TopologyKind, dscp: u8) -> Frame {
    base(router_mac, kind).dscp(dscp).tcp(2020, 8080, 0x02).build()
}

/// Candidate with an explicit TTL.
pub fn tcp_candidate_with_ttl(router_mac: MacAddress, kind: TopologyKind, ttl: u8) -> Frame {
    base(router_mac, kind).ttl(ttl).tcp(2020, 8080, 0x02).build()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_candidates() {
        let mac: MacAddress = "52:54:00:00:00:01".parse().unwrap();

        let tcp = tcp_candidate(mac, TopologyKind::ServerUplink);
        assert_eq!(tcp.len(), CANDIDATE_FRAME_LEN);
        assert_eq!(tcp.eth_dst(), mac);
        assert_eq!(tcp.ip_dst(), TARGET_SERVER_IP);
        assert_eq!(tcp.ip_ttl(), DEFAULT_TTL);

        let icmp = icmp_candidate(mac, TopologyKind::LeafSpine);
        assert_eq!(icmp.ip_dst(), DEFAULT_DST_IP);
        assert_eq!(icmp.ip_protocol(), 1);

        assert_eq!(udp_candidate(mac, TopologyKind::LeafSpine).ip_protocol(), 17);
        assert_eq!(dscp_candidate(mac, TopologyKind::LeafSpine, 8).ip_dscp(), 8);
        assert_eq!(tcp_candidate_with_ttl(mac, TopologyKind::LeafSpine, 10).ip_ttl(), 10);
    }
}
