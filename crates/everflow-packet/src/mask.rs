//! Packet templates with don't-care regions.
//!
//! A [`Mask`] pairs a concrete frame with a per-bit care mask. Header fields
//! are addressed by [`FieldPath`] for an Ethernet / IPv4 / GRE stack laid
//! out back to back from offset zero; arbitrary regions past the structural
//! headers are masked with [`Mask::ignore_range`].

use serde::Serialize;
use std::fmt;

use crate::headers::{ETHERNET_HEADER_LEN, IPV4_HEADER_LEN};
use crate::PacketError;

const IP: usize = ETHERNET_HEADER_LEN * 8;
const GRE: usize = (ETHERNET_HEADER_LEN + IPV4_HEADER_LEN) * 8;

/// A named header field or the encapsulated payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum FieldPath {
    EthDst,
    EthSrc,
    EthType,
    IpIhl,
    IpTos,
    IpLen,
    IpId,
    IpFlags,
    IpTtl,
    IpProto,
    IpChksum,
    IpSrc,
    IpDst,
    GreSeqnumPresent,
    GreProto,
    /// Everything after the structural headers.
    Payload,
}

impl FieldPath {
    /// Bit offset and width of a header field; `None` for [`FieldPath::Payload`].
    pub const fn bits(&self) -> Option<(usize, usize)> {
        let span = match self {
            FieldPath::EthDst => (0, 48),
            FieldPath::EthSrc => (48, 48),
            FieldPath::EthType => (96, 16),
            FieldPath::IpIhl => (IP + 4, 4),
            FieldPath::IpTos => (IP + 8, 8),
            FieldPath::IpLen => (IP + 16, 16),
            FieldPath::IpId => (IP + 32, 16),
            FieldPath::IpFlags => (IP + 48, 3),
            FieldPath::IpTtl => (IP + 64, 8),
            FieldPath::IpProto => (IP + 72, 8),
            FieldPath::IpChksum => (IP + 80, 16),
            FieldPath::IpSrc => (IP + 96, 32),
            FieldPath::IpDst => (IP + 128, 32),
            FieldPath::GreSeqnumPresent => (GRE + 3, 1),
            FieldPath::GreProto => (GRE + 16, 16),
            FieldPath::Payload => return None,
        };
        Some(span)
    }

    pub const fn name(&self) -> &'static str {
        match self {
            FieldPath::EthDst => "Ether.dst",
            FieldPath::EthSrc => "Ether.src",
            FieldPath::EthType => "Ether.type",
            FieldPath::IpIhl => "IP.ihl",
            FieldPath::IpTos => "IP.tos",
            FieldPath::IpLen => "IP.len",
            FieldPath::IpId => "IP.id",
            FieldPath::IpFlags => "IP.flags",
            FieldPath::IpTtl => "IP.ttl",
            FieldPath::IpProto => "IP.proto",
            FieldPath::IpChksum => "IP.chksum",
            FieldPath::IpSrc => "IP.src",
            FieldPath::IpDst => "IP.dst",
            FieldPath::GreSeqnumPresent => "GRE.seqnum_present",
            FieldPath::GreProto => "GRE.proto",
            FieldPath::Payload => "payload",
        }
    }
}

impl fmt::Display for FieldPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// How a masked entry is excluded from comparison.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MaskPolicy {
    /// The field's value is not compared.
    IgnoreValue,
    /// An explicit bit range is not compared.
    IgnoreRange { offset_bits: usize, len_bits: usize },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct MaskEntry {
    pub field: FieldPath,
    pub policy: MaskPolicy,
}

/// A packet template plus the regions excluded from comparison.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mask {
    template: Vec<u8>,
    care: Vec<u8>,
    entries: Vec<MaskEntry>,
    structural_bytes: usize,
}

impl Mask {
    /// Creates a mask that compares every bit of `template`.
    pub fn new(template: Vec<u8>) -> Self {
        let care = vec![0xff; template.len()];
        Self {
            template,
            care,
            entries: Vec::new(),
            structural_bytes: 0,
        }
    }

    /// Protects the first `bytes` bytes from [`Mask::ignore_range`].
    pub fn with_structural_prefix(mut self, bytes: usize) -> Self {
        self.structural_bytes = bytes;
        self
    }

    pub fn template(&self) -> &[u8] {
        &self.template
    }

    pub fn entries(&self) -> &[MaskEntry] {
        &self.entries
    }

    pub fn structural_bytes(&self) -> usize {
        self.structural_bytes
    }

    /// Excludes a header field from comparison.
    ///
    /// Masking [`FieldPath::Payload`] this way covers everything after the
    /// structural prefix.
    pub fn ignore_field(&mut self, field: FieldPath) -> Result<(), PacketError> {
        let (offset_bits, len_bits) = match field.bits() {
            Some(span) => span,
            None => {
                let start = self.structural_bytes * 8;
                (start, self.template.len() * 8 - start.min(self.template.len() * 8))
            }
        };
        self.clear_bits(offset_bits, len_bits)?;
        self.entries.push(MaskEntry {
            field,
            policy: MaskPolicy::IgnoreValue,
        });
        Ok(())
    }

    /// Excludes `len_bits` bits starting at `offset_bits`.
    ///
    /// # Errors
    ///
    /// The range may neither start inside the structural prefix nor run past
    /// the end of the template.
    pub fn ignore_range(
        &mut self,
        field: FieldPath,
        offset_bits: usize,
        len_bits: usize,
    ) -> Result<(), PacketError> {
        if offset_bits < self.structural_bytes * 8 {
            return Err(PacketError::MaskOverlapsHeader {
                offset_bits,
                structural_bytes: self.structural_bytes,
            });
        }
        self.clear_bits(offset_bits, len_bits)?;
        self.entries.push(MaskEntry {
            field,
            policy: MaskPolicy::IgnoreRange {
                offset_bits,
                len_bits,
            },
        });
        Ok(())
    }

    /// The policy recorded for `field`, if it was masked.
    pub fn policy(&self, field: FieldPath) -> Option<MaskPolicy> {
        self.entries
            .iter()
            .find(|entry| entry.field == field)
            .map(|entry| entry.policy)
    }

    pub fn is_ignored(&self, field: FieldPath) -> bool {
        self.policy(field).is_some()
    }

    /// Returns true if every cared-for bit of the template equals `frame`.
    ///
    /// Bytes past the end of the template are link-layer padding and are not
    /// compared.
    pub fn matches(&self, frame: &[u8]) -> bool {
        self.first_mismatch(frame).is_none()
    }

    /// Byte offset of the first cared-for difference, or the template length
    /// when `frame` is too short.
    pub fn first_mismatch(&self, frame: &[u8]) -> Option<usize> {
        if frame.len() < self.template.len() {
            return Some(frame.len());
        }
        self.template
            .iter()
            .zip(&self.care)
            .zip(frame)
            .position(|((expected, care), actual)| (expected ^ actual) & care != 0)
    }

    fn clear_bits(&mut self, offset_bits: usize, len_bits: usize) -> Result<(), PacketError> {
        let end = offset_bits + len_bits;
        if end > self.template.len() * 8 {
            return Err(PacketError::MaskOutOfBounds {
                offset_bits,
                len_bits,
                template_bytes: self.template.len(),
            });
        }
        for bit in offset_bits..end {
            self.care[bit / 8] &= !(0x80u8 >> (bit % 8));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn template() -> Vec<u8> {
        (0..64u8).collect()
    }

    #[test]
    fn test_exact_match() {
        let mask = Mask::new(template());
        assert!(mask.matches(&template()));

        let mut other = template();
        other[20] ^= 1;
        assert_eq!(mask.first_mismatch(&other), Some(20));
    }

    #[test]
    fn test_ignored_field_tolerates_change() {
        let mut mask = Mask::new(template());
        mask.ignore_field(FieldPath::IpTtl).unwrap();

        let mut other = template();
        other[22] = 0;
        assert!(mask.matches(&other));

        other[23] = 0;
        assert!(!mask.matches(&other));
    }

    #[test]
    fn test_sub_byte_field() {
        let mut mask = Mask::new(template());
        mask.ignore_field(FieldPath::IpIhl).unwrap();

        let mut other = template();
        other[14] ^= 0x0f;
        assert!(mask.matches(&other));
        other[14] ^= 0x10;
        assert!(!mask.matches(&other));
    }

    #[test]
    fn test_gre_seqnum_bit() {
        let mut mask = Mask::new(template());
        mask.ignore_field(FieldPath::GreSeqnumPresent).unwrap();

        let mut other = template();
        other[34] ^= 0x10;
        assert!(mask.matches(&other));
        other[34] ^= 0x20;
        assert!(!mask.matches(&other));
    }

    #[test]
    fn test_range_cannot_overlap_structural_prefix() {
        let mut mask = Mask::new(template()).with_structural_prefix(38);
        assert_eq!(
            mask.ignore_range(FieldPath::Payload, 37 * 8, 16),
            Err(PacketError::MaskOverlapsHeader {
                offset_bits: 296,
                structural_bytes: 38
            })
        );
        assert!(mask.entries().is_empty());
        assert!(mask.ignore_range(FieldPath::Payload, 38 * 8, 26 * 8).is_ok());
    }

    #[test]
    fn test_range_out_of_bounds() {
        let mut mask = Mask::new(template());
        assert!(matches!(
            mask.ignore_range(FieldPath::Payload, 60 * 8, 8 * 8),
            Err(PacketError::MaskOutOfBounds { .. })
        ));
    }

    #[test]
    fn test_short_frame_never_matches() {
        let mask = Mask::new(template());
        assert_eq!(mask.first_mismatch(&template()[..40]), Some(40));
    }

    #[test]
    fn test_trailing_padding_ignored() {
        let mask = Mask::new(template());
        let mut padded = template();
        padded.extend_from_slice(&[0, 0, 0, 0]);
        assert!(mask.matches(&padded));
    }

    #[test]
    fn test_policy_lookup() {
        let mut mask = Mask::new(template()).with_structural_prefix(38);
        mask.ignore_field(FieldPath::IpTos).unwrap();
        mask.ignore_range(FieldPath::Payload, 304, 208).unwrap();

        assert_eq!(mask.policy(FieldPath::IpTos), Some(MaskPolicy::IgnoreValue));
        assert_eq!(
            mask.policy(FieldPath::Payload),
            Some(MaskPolicy::IgnoreRange {
                offset_bits: 304,
                len_bits: 208
            })
        );
        assert_eq!(mask.policy(FieldPath::IpTtl), None);
    }
}
