//! Ethernet/IPv4 frames used as mirror candidates.

use bytes::{BufMut, BytesMut};
use pnet::packet::ethernet::MutableEthernetPacket;
use pnet::packet::ip::IpNextHeaderProtocol;
use pnet::packet::ipv4::{Ipv4Packet, MutableIpv4Packet};
use pnet::packet::util::{checksum, ipv4_checksum};
use sonic_everflow_types::MacAddress;
use std::fmt::Write as _;
use std::net::Ipv4Addr;

use crate::headers::{
    mac_addr, mac_address, parse_ethernet, parse_ipv4, refresh_ipv4_checksum, write_ethernet, EtherTypes,
    GreHeader, IpNextHeaderProtocols, Ipv4Fields, ETHERNET_HEADER_LEN, IPV4_HEADER_LEN,
};
use crate::PacketError;

const IP_OFFSET: usize = ETHERNET_HEADER_LEN;

/// An Ethernet II frame carrying an option-less IPv4 packet.
///
/// Field setters keep the IPv4 header checksum valid.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame(Vec<u8>);

impl Frame {
    /// Wraps raw bytes after checking they hold an Ethernet/IPv4 frame.
    pub fn from_bytes(bytes: Vec<u8>) -> Result<Self, PacketError> {
        let ethertype = parse_ethernet(&bytes)?.get_ethertype();
        if ethertype != EtherTypes::Ipv4 {
            return Err(PacketError::unexpected("Ethernet", format!("ethertype 0x{:04x}", ethertype.0)));
        }
        if parse_ipv4(&bytes[IP_OFFSET..])?.get_header_length() != 5 {
            return Err(PacketError::unexpected("IPv4", "header options are not supported"));
        }
        Ok(Frame(bytes))
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn eth_dst(&self) -> MacAddress {
        parse_ethernet(&self.0).map_or(MacAddress::ZERO, |eth| mac_address(eth.get_destination()))
    }

    pub fn eth_src(&self) -> MacAddress {
        parse_ethernet(&self.0).map_or(MacAddress::ZERO, |eth| mac_address(eth.get_source()))
    }

    pub fn set_eth_src(&mut self, mac: MacAddress) {
        if let Some(mut eth) = MutableEthernetPacket::new(&mut self.0) {
            eth.set_source(mac_addr(mac));
        }
    }

    pub fn set_eth_dst(&mut self, mac: MacAddress) {
        if let Some(mut eth) = MutableEthernetPacket::new(&mut self.0) {
            eth.set_destination(mac_addr(mac));
        }
    }

    pub fn ip_src(&self) -> Ipv4Addr {
        self.ipv4().map_or(Ipv4Addr::UNSPECIFIED, |ip| ip.get_source())
    }

    pub fn ip_dst(&self) -> Ipv4Addr {
        self.ipv4().map_or(Ipv4Addr::UNSPECIFIED, |ip| ip.get_destination())
    }

    pub fn ip_ttl(&self) -> u8 {
        self.ipv4().map_or(0, |ip| ip.get_ttl())
    }

    pub fn ip_protocol(&self) -> u8 {
        self.ipv4().map_or(0, |ip| ip.get_next_level_protocol().0)
    }

    pub fn ip_dscp(&self) -> u8 {
        self.ipv4().map_or(0, |ip| ip.get_dscp())
    }

    pub fn ip_checksum(&self) -> u16 {
        self.ipv4().map_or(0, |ip| ip.get_checksum())
    }

    pub fn set_ip_ttl(&mut self, ttl: u8) {
        if let Some(mut ip) = MutableIpv4Packet::new(&mut self.0[IP_OFFSET..]) {
            ip.set_ttl(ttl);
            refresh_ipv4_checksum(&mut ip);
        }
    }

    /// Applies the rewrite a routed hop performs: TTL minus one and the
    /// router's MAC as Ethernet source.
    pub fn route_through(&mut self, router_mac: MacAddress) {
        let ttl = self.ip_ttl().saturating_sub(1);
        self.set_ip_ttl(ttl);
        self.set_eth_src(router_mac);
    }

    /// One-line description for logs and assertion messages.
    pub fn summary(&self) -> String {
        summarize(&self.0)
    }

    /// `None` only for frames shorter than both headers, which the
    /// constructors rule out.
    fn ipv4(&self) -> Option<Ipv4Packet<'_>> {
        Ipv4Packet::new(self.0.get(IP_OFFSET..)?)
    }
}

/// Describes a frame layer by layer, e.g.
/// `Ether 00:06:07:08:09:0a > 00:01:02:03:04:05 / IP 1.1.1.1 > 2.2.2.2 ttl=4 proto=47 / GRE proto=0x88be / 102 bytes`.
///
/// Undecodable layers end the description early; the total length is
/// always reported.
pub fn summarize(bytes: &[u8]) -> String {
    let mut out = String::new();

    if let Ok(eth) = parse_ethernet(bytes) {
        let _ = write!(out, "Ether {} > {}", eth.get_source(), eth.get_destination());
        if eth.get_ethertype() == EtherTypes::Ipv4 {
            if let Ok(ip) = parse_ipv4(&bytes[IP_OFFSET..]) {
                let protocol = ip.get_next_level_protocol();
                let _ = write!(
                    out,
                    " / IP {} > {} ttl={} proto={}",
                    ip.get_source(),
                    ip.get_destination(),
                    ip.get_ttl(),
                    protocol.0
                );
                if protocol == IpNextHeaderProtocols::Gre {
                    if let Ok(gre) = GreHeader::parse(&bytes[IP_OFFSET + IPV4_HEADER_LEN..]) {
                        let _ = write!(out, " / GRE proto=0x{:04x}", gre.protocol);
                    }
                }
            }
        } else {
            let _ = write!(out, " type=0x{:04x}", eth.get_ethertype().0);
        }
        out.push_str(" / ");
    }

    let _ = write!(out, "{} bytes", bytes.len());
    out
}

#[derive(Debug, Clone)]
enum Transport {
    Icmp { id: u16, seq: u16, data: Vec<u8> },
    Tcp { sport: u16, dport: u16, flags: u8 },
    Udp { sport: u16, dport: u16, data: Vec<u8> },
    Raw { protocol: u8, data: Vec<u8> },
}

/// Fluent builder for Ethernet/IPv4 test frames.
///
/// Defaults follow the usual PTF test-packet conventions (`00:01:02:03:04:05`
/// destination, `00:06:07:08:09:0a` source, 192.168.0.1 → 192.168.0.2,
/// TTL 64).
#[derive(Debug, Clone)]
pub struct FrameBuilder {
    eth_dst: MacAddress,
    eth_src: MacAddress,
    ip_src: Ipv4Addr,
    ip_dst: Ipv4Addr,
    dscp: u8,
    ttl: u8,
    identification: u16,
    dont_fragment: bool,
    transport: Transport,
    frame_len: Option<usize>,
}

impl Default for FrameBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameBuilder {
    pub fn new() -> Self {
        Self {
            eth_dst: MacAddress::new([0x00, 0x01, 0x02, 0x03, 0x04, 0x05]),
            eth_src: MacAddress::new([0x00, 0x06, 0x07, 0x08, 0x09, 0x0a]),
            ip_src: Ipv4Addr::new(192, 168, 0, 1),
            ip_dst: Ipv4Addr::new(192, 168, 0, 2),
            dscp: 0,
            ttl: 64,
            identification: 1,
            dont_fragment: false,
            transport: Transport::Tcp {
                sport: 1234,
                dport: 80,
                flags: 0x02,
            },
            frame_len: None,
        }
    }

    pub fn eth_dst(mut self, mac: MacAddress) -> Self {
        self.eth_dst = mac;
        self
    }

    pub fn eth_src(mut self, mac: MacAddress) -> Self {
        self.eth_src = mac;
        self
    }

    pub fn ip_src(mut self, addr: Ipv4Addr) -> Self {
        self.ip_src = addr;
        self
    }

    pub fn ip_dst(mut self, addr: Ipv4Addr) -> Self {
        self.ip_dst = addr;
        self
    }

    pub fn dscp(mut self, dscp: u8) -> Self {
        self.dscp = dscp & 0x3f;
        self
    }

    pub fn ttl(mut self, ttl: u8) -> Self {
        self.ttl = ttl;
        self
    }

    pub fn identification(mut self, id: u16) -> Self {
        self.identification = id;
        self
    }

    pub fn dont_fragment(mut self, df: bool) -> Self {
        self.dont_fragment = df;
        self
    }

    pub fn icmp_echo(mut self, id: u16, seq: u16, data: &[u8]) -> Self {
        self.transport = Transport::Icmp {
            id,
            seq,
            data: data.to_vec(),
        };
        self
    }

    pub fn tcp(mut self, sport: u16, dport: u16, flags: u8) -> Self {
        self.transport = Transport::Tcp { sport, dport, flags };
        self
    }

    pub fn udp(mut self, sport: u16, dport: u16, data: &[u8]) -> Self {
        self.transport = Transport::Udp {
            sport,
            dport,
            data: data.to_vec(),
        };
        self
    }

    /// Arbitrary IP protocol with an opaque payload.
    pub fn raw(mut self, protocol: u8, data: &[u8]) -> Self {
        self.transport = Transport::Raw {
            protocol,
            data: data.to_vec(),
        };
        self
    }

    /// Pads the transport payload with an incrementing byte pattern so the
    /// whole frame is `len` bytes. Frames already longer are left alone.
    pub fn frame_len(mut self, len: usize) -> Self {
        self.frame_len = Some(len);
        self
    }

    pub fn build(self) -> Frame {
        let headers_len = ETHERNET_HEADER_LEN + IPV4_HEADER_LEN;
        let base_segment = self.segment(&[]);
        let fill = self
            .frame_len
            .map(|len| len.saturating_sub(headers_len + base_segment.len()))
            .unwrap_or(0);
        let filler: Vec<u8> = (0..fill).map(|i| (i % 256) as u8).collect();
        let segment = self.segment(&filler);

        let mut ip = Ipv4Fields::new(self.ip_src, self.ip_dst, self.protocol(), self.ttl).with_dscp(self.dscp);
        ip.identification = self.identification;
        ip.dont_fragment = self.dont_fragment;

        let mut bytes = vec![0u8; headers_len];
        // Both buffers are exactly header-sized.
        let _ = write_ethernet(&mut bytes, self.eth_dst, self.eth_src, EtherTypes::Ipv4);
        let _ = ip.write(&mut bytes[IP_OFFSET..], segment.len());
        bytes.extend_from_slice(&segment);

        Frame(bytes)
    }

    fn protocol(&self) -> IpNextHeaderProtocol {
        match &self.transport {
            Transport::Icmp { .. } => IpNextHeaderProtocols::Icmp,
            Transport::Tcp { .. } => IpNextHeaderProtocols::Tcp,
            Transport::Udp { .. } => IpNextHeaderProtocols::Udp,
            Transport::Raw { protocol, .. } => IpNextHeaderProtocol(*protocol),
        }
    }

    /// Encodes the transport segment with `extra` appended to its payload.
    fn segment(&self, extra: &[u8]) -> Vec<u8> {
        let mut buf = BytesMut::new();
        match &self.transport {
            Transport::Icmp { id, seq, data } => {
                buf.put_u8(8);
                buf.put_u8(0);
                buf.put_u16(0);
                buf.put_u16(*id);
                buf.put_u16(*seq);
                buf.put_slice(data);
                buf.put_slice(extra);
                let sum = checksum(&buf, 1);
                buf[2..4].copy_from_slice(&sum.to_be_bytes());
            }
            Transport::Tcp { sport, dport, flags } => {
                buf.put_u16(*sport);
                buf.put_u16(*dport);
                buf.put_u32(1);
                buf.put_u32(0);
                buf.put_u8(5 << 4);
                buf.put_u8(*flags);
                buf.put_u16(8192);
                buf.put_u16(0);
                buf.put_u16(0);
                buf.put_slice(extra);
                let sum = ipv4_checksum(&buf, 8, &[], &self.ip_src, &self.ip_dst, IpNextHeaderProtocols::Tcp);
                buf[16..18].copy_from_slice(&sum.to_be_bytes());
            }
            Transport::Udp { sport, dport, data } => {
                let len = 8 + data.len() + extra.len();
                buf.put_u16(*sport);
                buf.put_u16(*dport);
                buf.put_u16(len as u16);
                buf.put_u16(0);
                buf.put_slice(data);
                buf.put_slice(extra);
                let sum = ipv4_checksum(&buf, 3, &[], &self.ip_src, &self.ip_dst, IpNextHeaderProtocols::Udp);
                buf[6..8].copy_from_slice(&sum.to_be_bytes());
            }
            Transport::Raw { data, .. } => {
                buf.put_slice(data);
                buf.put_slice(extra);
            }
        }
        buf.to_vec()
    }
}
