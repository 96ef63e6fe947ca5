//! Ethernet II, IPv4 and GRE headers.
//!
//! Ethernet and IPv4 go through `pnet` packet views. GRE is decoded here:
//! only the base header of RFC 2784 is produced by a mirror session.

use pnet::packet::ethernet::{EtherType, EthernetPacket, MutableEthernetPacket};
use pnet::packet::ip::IpNextHeaderProtocol;
use pnet::packet::ipv4::{self, Ipv4Flags, Ipv4Packet, MutableIpv4Packet};
use pnet::util::MacAddr;
use sonic_everflow_types::MacAddress;
use std::net::Ipv4Addr;

use crate::PacketError;

pub use pnet::packet::ethernet::EtherTypes;
pub use pnet::packet::ip::IpNextHeaderProtocols;

pub const ETHERNET_HEADER_LEN: usize = 14;
pub const IPV4_HEADER_LEN: usize = 20;
pub const GRE_HEADER_LEN: usize = 4;

/// GRE flag bit: sequence number present.
pub const GRE_FLAG_SEQNUM: u16 = 0x1000;

pub fn mac_addr(mac: MacAddress) -> MacAddr {
    let [a, b, c, d, e, f] = *mac.as_bytes();
    MacAddr::new(a, b, c, d, e, f)
}

pub fn mac_address(mac: MacAddr) -> MacAddress {
    let MacAddr(a, b, c, d, e, f) = mac;
    MacAddress::new([a, b, c, d, e, f])
}

/// Writes an Ethernet II header into the first 14 bytes of `buf`.
pub fn write_ethernet(
    buf: &mut [u8],
    dst: MacAddress,
    src: MacAddress,
    ethertype: EtherType,
) -> Result<(), PacketError> {
    let available = buf.len();
    let mut eth = MutableEthernetPacket::new(buf)
        .ok_or_else(|| PacketError::truncated("Ethernet", ETHERNET_HEADER_LEN, available))?;
    eth.set_destination(mac_addr(dst));
    eth.set_source(mac_addr(src));
    eth.set_ethertype(ethertype);
    Ok(())
}

/// Ethernet view of `bytes`.
pub fn parse_ethernet(bytes: &[u8]) -> Result<EthernetPacket<'_>, PacketError> {
    EthernetPacket::new(bytes)
        .ok_or_else(|| PacketError::truncated("Ethernet", ETHERNET_HEADER_LEN, bytes.len()))
}

/// Contents of an option-less IPv4 header. Length and checksum are derived
/// when the header is written.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ipv4Fields {
    pub src: Ipv4Addr,
    pub dst: Ipv4Addr,
    pub protocol: IpNextHeaderProtocol,
    pub ttl: u8,
    pub dscp: u8,
    pub identification: u16,
    pub dont_fragment: bool,
}

impl Ipv4Fields {
    pub fn new(src: Ipv4Addr, dst: Ipv4Addr, protocol: IpNextHeaderProtocol, ttl: u8) -> Self {
        Self {
            src,
            dst,
            protocol,
            ttl,
            dscp: 0,
            identification: 0,
            dont_fragment: false,
        }
    }

    pub fn with_dscp(mut self, dscp: u8) -> Self {
        self.dscp = dscp & 0x3f;
        self
    }

    /// Writes the header into the first 20 bytes of `buf` for a payload of
    /// `payload_len` bytes, with a valid header checksum.
    pub fn write(&self, buf: &mut [u8], payload_len: usize) -> Result<(), PacketError> {
        let available = buf.len();
        let mut ip = MutableIpv4Packet::new(buf)
            .ok_or_else(|| PacketError::truncated("IPv4", IPV4_HEADER_LEN, available))?;
        ip.set_version(4);
        ip.set_header_length((IPV4_HEADER_LEN / 4) as u8);
        ip.set_dscp(self.dscp);
        ip.set_ecn(0);
        ip.set_total_length((IPV4_HEADER_LEN + payload_len) as u16);
        ip.set_identification(self.identification);
        ip.set_flags(if self.dont_fragment { Ipv4Flags::DontFragment } else { 0 });
        ip.set_fragment_offset(0);
        ip.set_ttl(self.ttl);
        ip.set_next_level_protocol(self.protocol);
        ip.set_source(self.src);
        ip.set_destination(self.dst);
        refresh_ipv4_checksum(&mut ip);
        Ok(())
    }
}

/// Recomputes the header checksum after a field change.
pub fn refresh_ipv4_checksum(ip: &mut MutableIpv4Packet<'_>) {
    let sum = ipv4::checksum(&ip.to_immutable());
    ip.set_checksum(sum);
}

/// IPv4 view of `bytes`; anything but version 4 is rejected.
pub fn parse_ipv4(bytes: &[u8]) -> Result<Ipv4Packet<'_>, PacketError> {
    let ip = Ipv4Packet::new(bytes)
        .ok_or_else(|| PacketError::truncated("IPv4", IPV4_HEADER_LEN, bytes.len()))?;
    if ip.get_version() != 4 {
        return Err(PacketError::unexpected("IPv4", format!("version {}", ip.get_version())));
    }
    Ok(ip)
}

/// Base GRE header (RFC 2784) without checksum, key or sequence words.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GreHeader {
    /// Flag bits and version.
    pub flags_version: u16,
    pub protocol: u16,
}

impl GreHeader {
    pub fn new(protocol: u16) -> Self {
        Self {
            flags_version: 0,
            protocol,
        }
    }

    pub fn seqnum_present(&self) -> bool {
        self.flags_version & GRE_FLAG_SEQNUM != 0
    }

    pub fn encode(&self) -> [u8; GRE_HEADER_LEN] {
        let [f0, f1] = self.flags_version.to_be_bytes();
        let [p0, p1] = self.protocol.to_be_bytes();
        [f0, f1, p0, p1]
    }

    pub fn parse(bytes: &[u8]) -> Result<Self, PacketError> {
        match bytes {
            [f0, f1, p0, p1, ..] => Ok(Self {
                flags_version: u16::from_be_bytes([*f0, *f1]),
                protocol: u16::from_be_bytes([*p0, *p1]),
            }),
            _ => Err(PacketError::truncated("GRE", GRE_HEADER_LEN, bytes.len())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_ipv4_header_encoding() {
        let mut fields = Ipv4Fields::new(
            Ipv4Addr::new(192, 168, 0, 1),
            Ipv4Addr::new(192, 168, 0, 199),
            IpNextHeaderProtocols::Udp,
            64,
        );
        fields.dont_fragment = true;

        let mut buf = [0u8; IPV4_HEADER_LEN];
        fields.write(&mut buf, 0x73 - IPV4_HEADER_LEN).unwrap();
        assert_eq!(hex::encode(buf), "45000073000040004011b861c0a80001c0a800c7");
    }

    #[test]
    fn test_dscp_goes_into_upper_tos_bits() {
        let fields = Ipv4Fields::new(Ipv4Addr::LOCALHOST, Ipv4Addr::LOCALHOST, IpNextHeaderProtocols::Gre, 4)
            .with_dscp(8);
        let mut buf = [0u8; IPV4_HEADER_LEN];
        fields.write(&mut buf, 0).unwrap();

        assert_eq!(buf[1], 0x20);
        assert_eq!(parse_ipv4(&buf).unwrap().get_dscp(), 8);
    }

    #[test]
    fn test_ipv4_parse_rejects_ipv6() {
        let mut bytes = [0u8; IPV4_HEADER_LEN];
        bytes[0] = 0x60;
        assert!(matches!(parse_ipv4(&bytes), Err(PacketError::Unexpected { .. })));
    }

    #[test]
    fn test_ethernet_write_and_parse() {
        let dst: MacAddress = "00:01:02:03:04:05".parse().unwrap();
        let src: MacAddress = "52:54:00:12:34:56".parse().unwrap();
        let mut buf = [0u8; ETHERNET_HEADER_LEN];
        write_ethernet(&mut buf, dst, src, EtherTypes::Ipv4).unwrap();

        assert_eq!(hex::encode(buf), "0001020304055254001234560800");
        let eth = parse_ethernet(&buf).unwrap();
        assert_eq!(mac_address(eth.get_source()), src);
        assert_eq!(eth.get_ethertype(), EtherTypes::Ipv4);
    }

    #[test]
    fn test_gre_seqnum_flag() {
        let header = GreHeader::parse(&[0x10, 0x00, 0x88, 0xbe]).unwrap();
        assert!(header.seqnum_present());
        assert_eq!(header.protocol, 0x88BE);
        assert_eq!(header.encode(), [0x10, 0x00, 0x88, 0xbe]);
        assert!(!GreHeader::new(0x88BE).seqnum_present());
    }

    #[test]
    fn test_truncated_headers() {
        assert_eq!(
            parse_ethernet(&[0u8; 10]).err(),
            Some(PacketError::truncated("Ethernet", 14, 10))
        );
        assert!(write_ethernet(&mut [0u8; 4], MacAddress::ZERO, MacAddress::ZERO, EtherTypes::Ipv4).is_err());
        assert!(Ipv4Fields::new(Ipv4Addr::LOCALHOST, Ipv4Addr::LOCALHOST, IpNextHeaderProtocols::Tcp, 1)
            .write(&mut [0u8; 19], 0)
            .is_err());
        assert!(GreHeader::parse(&[0x00, 0x00, 0x88]).is_err());
    }
}
