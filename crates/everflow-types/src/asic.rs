//! ASIC families and the per-platform encapsulation quirks that follow from
//! them.
//!
//! Every value here is a table lookup. An unrecognised family is not an
//! error: it gets no padding, the default GRE protocol and a deterministic
//! sequence-number bit.

use serde::{Deserialize, Serialize};
use std::fmt;

/// GRE protocol type used by Mellanox ERSPAN sessions.
pub const GRE_PROTOCOL_MELLANOX: u16 = 0x8949;

/// GRE protocol type used by Barefoot ERSPAN sessions.
pub const GRE_PROTOCOL_BAREFOOT: u16 = 0x22EB;

/// GRE protocol type for every other platform (ERSPAN type II).
pub const GRE_PROTOCOL_DEFAULT: u16 = 0x88BE;

/// ASIC vendor family as reported by the `asic_type` DUT fact.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum AsicFamily {
    Mellanox,
    Barefoot,
    Cisco8000,
    Broadcom,
    /// Any family without special handling.
    Other(String),
}

impl AsicFamily {
    /// Returns the fact string this family is reported as.
    pub fn as_str(&self) -> &str {
        match self {
            AsicFamily::Mellanox => "mellanox",
            AsicFamily::Barefoot => "barefoot",
            AsicFamily::Cisco8000 => "cisco-8000",
            AsicFamily::Broadcom => "broadcom",
            AsicFamily::Other(name) => name,
        }
    }

    /// Number of zero bytes the platform inserts ahead of the mirrored frame.
    pub fn ingress_padding_bytes(&self) -> usize {
        match self {
            AsicFamily::Mellanox => 11,
            AsicFamily::Barefoot | AsicFamily::Cisco8000 => 6,
            _ => 0,
        }
    }

    /// GRE protocol type the platform's ERSPAN sessions are configured with.
    pub fn gre_protocol(&self) -> u16 {
        match self {
            AsicFamily::Mellanox => GRE_PROTOCOL_MELLANOX,
            AsicFamily::Barefoot => GRE_PROTOCOL_BAREFOOT,
            _ => GRE_PROTOCOL_DEFAULT,
        }
    }

    /// Whether the GRE "sequence number present" bit varies between packets.
    pub fn gre_seqnum_indeterminate(&self) -> bool {
        matches!(self, AsicFamily::Cisco8000)
    }
}

impl From<&str> for AsicFamily {
    fn from(s: &str) -> Self {
        match s.trim().to_ascii_lowercase().as_str() {
            "mellanox" => AsicFamily::Mellanox,
            "barefoot" => AsicFamily::Barefoot,
            "cisco-8000" => AsicFamily::Cisco8000,
            "broadcom" => AsicFamily::Broadcom,
            other => AsicFamily::Other(other.to_string()),
        }
    }
}

impl From<String> for AsicFamily {
    fn from(s: String) -> Self {
        AsicFamily::from(s.as_str())
    }
}

impl From<AsicFamily> for String {
    fn from(family: AsicFamily) -> String {
        family.as_str().to_string()
    }
}

impl fmt::Display for AsicFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Encapsulation quirks of one DUT, derived once from its facts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlatformQuirks {
    pub asic_family: AsicFamily,
    /// Zero bytes prepended to the mirrored frame inside the GRE payload.
    pub ingress_padding_bytes: usize,
    /// True on multi-namespace devices, where a cross-namespace mirror path
    /// takes an extra hop and the outer TTL cannot be predicted.
    pub requires_ttl_check_variant: bool,
    /// True when the GRE sequence-number-present bit is not deterministic.
    pub gre_seqnum_indeterminate: bool,
}

impl PlatformQuirks {
    /// Looks up the quirks for `asic_family` on a device with
    /// `namespace_count` forwarding namespaces.
    pub fn lookup(asic_family: AsicFamily, namespace_count: usize) -> Self {
        Self {
            ingress_padding_bytes: asic_family.ingress_padding_bytes(),
            gre_seqnum_indeterminate: asic_family.gre_seqnum_indeterminate(),
            requires_ttl_check_variant: namespace_count > 1,
            asic_family,
        }
    }

    /// Quirks of a single-namespace device of a family with no special
    /// handling.
    pub fn generic() -> Self {
        Self::lookup(AsicFamily::Other("generic".to_string()), 1)
    }

    /// Returns `ingress_padding_bytes` zero bytes.
    pub fn padding(&self) -> Vec<u8> {
        vec![0u8; self.ingress_padding_bytes]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_padding_lookup() {
        assert_eq!(AsicFamily::from("mellanox").ingress_padding_bytes(), 11);
        assert_eq!(AsicFamily::from("barefoot").ingress_padding_bytes(), 6);
        assert_eq!(AsicFamily::from("cisco-8000").ingress_padding_bytes(), 6);
        assert_eq!(AsicFamily::from("broadcom").ingress_padding_bytes(), 0);
        assert_eq!(AsicFamily::from("vs").ingress_padding_bytes(), 0);
    }

    #[test]
    fn test_gre_protocol_lookup() {
        assert_eq!(AsicFamily::Mellanox.gre_protocol(), 0x8949);
        assert_eq!(AsicFamily::Barefoot.gre_protocol(), 0x22EB);
        assert_eq!(AsicFamily::Cisco8000.gre_protocol(), 0x88BE);
        assert_eq!(AsicFamily::from("marvell").gre_protocol(), 0x88BE);
    }

    #[test]
    fn test_unknown_family_is_lenient() {
        let family = AsicFamily::from("Some-New-ASIC");
        assert_eq!(family, AsicFamily::Other("some-new-asic".to_string()));
        let quirks = PlatformQuirks::lookup(family, 1);
        assert_eq!(quirks.ingress_padding_bytes, 0);
        assert!(!quirks.gre_seqnum_indeterminate);
        assert!(quirks.padding().is_empty());
    }

    #[test]
    fn test_seqnum_only_on_cisco() {
        assert!(PlatformQuirks::lookup(AsicFamily::Cisco8000, 1).gre_seqnum_indeterminate);
        assert!(!PlatformQuirks::lookup(AsicFamily::Mellanox, 1).gre_seqnum_indeterminate);
    }

    #[test]
    fn test_ttl_variant_follows_namespace_count() {
        assert!(!PlatformQuirks::lookup(AsicFamily::Broadcom, 1).requires_ttl_check_variant);
        assert!(PlatformQuirks::lookup(AsicFamily::Broadcom, 3).requires_ttl_check_variant);
    }

    #[test]
    fn test_family_string_roundtrip() {
        for name in ["mellanox", "barefoot", "cisco-8000", "broadcom", "vs"] {
            assert_eq!(AsicFamily::from(name).to_string(), name);
        }
    }
}
