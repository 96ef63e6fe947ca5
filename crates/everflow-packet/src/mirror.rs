//! Expected ERSPAN packets.
//!
//! A mirror session wraps the mirrored frame in outer Ethernet, IPv4 and GRE
//! headers. Several outer fields differ between platforms or packets, so the
//! result is a [`Mask`] rather than a fixed byte string.

use bytes::{BufMut, BytesMut};
use sonic_everflow_types::{MacAddress, MirrorSessionDescriptor, PlatformQuirks};

use crate::headers::{
    write_ethernet, EtherTypes, GreHeader, IpNextHeaderProtocols, Ipv4Fields, ETHERNET_HEADER_LEN,
    GRE_HEADER_LEN, IPV4_HEADER_LEN,
};
use crate::mask::{FieldPath, Mask};
use crate::PacketError;

/// Length of the outer Ethernet, IPv4 and GRE headers.
pub const OUTER_HEADER_SIZE: usize = ETHERNET_HEADER_LEN + IPV4_HEADER_LEN + GRE_HEADER_LEN;

/// Destination MAC written into the template; never compared.
const TEMPLATE_ETH_DST: MacAddress = MacAddress::new([0x00, 0x01, 0x02, 0x03, 0x04, 0x05]);

/// Builds the masked packet `session` is expected to emit for `payload`.
///
/// `payload` is the mirrored frame as it leaves the mirroring pipeline. The
/// platform padding is inserted ahead of it and the whole encapsulated region
/// is masked, so only the outer headers take part in matching. With
/// `check_ttl` unset the outer TTL is masked too.
pub fn build_expected(
    session: &MirrorSessionDescriptor,
    platform: &PlatformQuirks,
    router_mac: MacAddress,
    payload: &[u8],
    check_ttl: bool,
) -> Result<Mask, PacketError> {
    let mut inner = platform.padding();
    inner.extend_from_slice(payload);

    let mut buf = BytesMut::zeroed(ETHERNET_HEADER_LEN + IPV4_HEADER_LEN);
    write_ethernet(&mut buf, TEMPLATE_ETH_DST, router_mac, EtherTypes::Ipv4)?;
    Ipv4Fields::new(session.src_ip(), session.dst_ip(), IpNextHeaderProtocols::Gre, session.ttl())
        .with_dscp(session.dscp())
        .write(&mut buf[ETHERNET_HEADER_LEN..], GRE_HEADER_LEN + inner.len())?;
    buf.put_slice(&GreHeader::new(session.gre_protocol()).encode());
    buf.put_slice(&inner);

    let mut mask = Mask::new(buf.to_vec()).with_structural_prefix(OUTER_HEADER_SIZE);
    for field in [
        FieldPath::EthDst,
        FieldPath::IpIhl,
        FieldPath::IpLen,
        FieldPath::IpFlags,
        FieldPath::IpChksum,
        FieldPath::IpTos,
    ] {
        mask.ignore_field(field)?;
    }
    if platform.gre_seqnum_indeterminate {
        mask.ignore_field(FieldPath::GreSeqnumPresent)?;
    }
    if !check_ttl {
        mask.ignore_field(FieldPath::IpTtl)?;
    }
    mask.ignore_range(FieldPath::Payload, OUTER_HEADER_SIZE * 8, inner.len() * 8)?;

    Ok(mask)
}

/// Both TTL variants of the expected packet for one payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExpectedMirrorPackets {
    pub with_ttl: Mask,
    pub without_ttl: Mask,
}

impl ExpectedMirrorPackets {
    pub fn select(&self, check_ttl: bool) -> &Mask {
        if check_ttl {
            &self.with_ttl
        } else {
            &self.without_ttl
        }
    }
}

pub fn build_expected_pair(
    session: &MirrorSessionDescriptor,
    platform: &PlatformQuirks,
    router_mac: MacAddress,
    payload: &[u8],
) -> Result<ExpectedMirrorPackets, PacketError> {
    Ok(ExpectedMirrorPackets {
        with_ttl: build_expected(session, platform, router_mac, payload, true)?,
        without_ttl: build_expected(session, platform, router_mac, payload, false)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::FrameBuilder;
    use crate::headers::{mac_address, parse_ethernet, parse_ipv4, GRE_FLAG_SEQNUM};
    use crate::mask::MaskPolicy;
    use pretty_assertions::assert_eq;
    use sonic_everflow_types::{AsicFamily, SessionDefaults};
    use std::net::Ipv4Addr;

    fn session(family: &AsicFamily) -> MirrorSessionDescriptor {
        MirrorSessionDescriptor::for_platform("test_session_1", family, &SessionDefaults::default())
            .unwrap()
    }

    fn router_mac() -> MacAddress {
        "52:54:00:12:34:56".parse().unwrap()
    }

    fn payload() -> Vec<u8> {
        FrameBuilder::new().icmp_echo(1, 1, &[]).frame_len(64).build().into_bytes()
    }

    #[test]
    fn test_generic_platform_scenario() {
        let mask = build_expected(
            &session(&AsicFamily::Broadcom),
            &PlatformQuirks::generic(),
            router_mac(),
            &payload(),
            true,
        )
        .unwrap();

        let template = mask.template();
        assert_eq!(template.len(), 102);

        let eth = parse_ethernet(template).unwrap();
        assert_eq!(mac_address(eth.get_source()), router_mac());
        assert_eq!(eth.get_ethertype(), EtherTypes::Ipv4);

        let ip = parse_ipv4(&template[ETHERNET_HEADER_LEN..]).unwrap();
        assert_eq!(ip.get_source(), Ipv4Addr::new(1, 1, 1, 1));
        assert_eq!(ip.get_destination(), Ipv4Addr::new(2, 2, 2, 2));
        assert_eq!(ip.get_dscp(), 8);
        assert_eq!(ip.get_ttl(), 4);
        assert_eq!(ip.get_identification(), 0);
        assert_eq!(ip.get_flags(), 0);
        assert_eq!(ip.get_total_length(), 88);
        assert_eq!(ip.get_next_level_protocol(), IpNextHeaderProtocols::Gre);

        let gre = GreHeader::parse(&template[ETHERNET_HEADER_LEN + IPV4_HEADER_LEN..]).unwrap();
        assert_eq!(gre.protocol, 0x88BE);

        assert_eq!(
            mask.policy(FieldPath::Payload),
            Some(MaskPolicy::IgnoreRange {
                offset_bits: 38 * 8,
                len_bits: 64 * 8
            })
        );
        assert!(!mask.is_ignored(FieldPath::IpTtl));
        assert!(!mask.is_ignored(FieldPath::GreSeqnumPresent));
    }

    #[test]
    fn test_ttl_variants_differ_only_in_ttl() {
        let pair = build_expected_pair(
            &session(&AsicFamily::Broadcom),
            &PlatformQuirks::generic(),
            router_mac(),
            &payload(),
        )
        .unwrap();

        assert_eq!(pair.with_ttl.template(), pair.without_ttl.template());
        let without: Vec<_> = pair
            .without_ttl
            .entries()
            .iter()
            .filter(|entry| entry.field != FieldPath::IpTtl)
            .copied()
            .collect();
        assert_eq!(pair.with_ttl.entries(), without.as_slice());
        assert!(pair.select(false).is_ignored(FieldPath::IpTtl));
        assert!(!pair.select(true).is_ignored(FieldPath::IpTtl));
    }

    #[test]
    fn test_payload_region_includes_padding() {
        for (family, padding) in [
            (AsicFamily::Mellanox, 11),
            (AsicFamily::Barefoot, 6),
            (AsicFamily::Cisco8000, 6),
            (AsicFamily::Broadcom, 0),
        ] {
            let quirks = PlatformQuirks::lookup(family.clone(), 1);
            let mask =
                build_expected(&session(&family), &quirks, router_mac(), &payload(), true).unwrap();

            assert_eq!(mask.template().len(), OUTER_HEADER_SIZE + padding + 64);
            assert_eq!(
                mask.policy(FieldPath::Payload),
                Some(MaskPolicy::IgnoreRange {
                    offset_bits: 304,
                    len_bits: (padding + 64) * 8
                }),
                "{family}"
            );
            assert!(mask.template()[OUTER_HEADER_SIZE..OUTER_HEADER_SIZE + padding]
                .iter()
                .all(|b| *b == 0));
        }
    }

    #[test]
    fn test_platform_gre_protocol() {
        let mask = build_expected(
            &session(&AsicFamily::Mellanox),
            &PlatformQuirks::lookup(AsicFamily::Mellanox, 1),
            router_mac(),
            &payload(),
            true,
        )
        .unwrap();
        let gre = GreHeader::parse(&mask.template()[34..]).unwrap();
        assert_eq!(gre.protocol, 0x8949);
    }

    #[test]
    fn test_cisco_seqnum_bit_ignored() {
        let quirks = PlatformQuirks::lookup(AsicFamily::Cisco8000, 1);
        let mask = build_expected(
            &session(&AsicFamily::Cisco8000),
            &quirks,
            router_mac(),
            &payload(),
            true,
        )
        .unwrap();

        let mut received = mask.template().to_vec();
        let flags = u16::from_be_bytes([received[34], received[35]]) | GRE_FLAG_SEQNUM;
        received[34..36].copy_from_slice(&flags.to_be_bytes());
        assert!(mask.matches(&received));
    }

    #[test]
    fn test_received_packet_with_device_rewrites_matches() {
        let mask = build_expected(
            &session(&AsicFamily::Broadcom),
            &PlatformQuirks::generic(),
            router_mac(),
            &payload(),
            true,
        )
        .unwrap();

        let mut received = mask.template().to_vec();
        received[0..6].copy_from_slice(&[0xaa; 6]);
        received[15] = 0x21;
        received[24] ^= 0xff;
        received[OUTER_HEADER_SIZE + 10] ^= 0xff;
        assert!(mask.matches(&received));

        received[22] = 3;
        assert!(!mask.matches(&received));
    }
}
