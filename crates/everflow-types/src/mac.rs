//! Ethernet addresses as they appear in DUT facts and mirrored frames.

use crate::ParseError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A 48-bit Ethernet MAC address.
///
/// Router MACs come out of DUT facts as colon-separated strings, while the
/// ARP responder and some older tools emit bare 12-digit hex; both forms
/// parse.
///
/// # Examples
///
/// ```
/// use sonic_everflow_types::MacAddress;
///
/// let mac: MacAddress = "00:11:22:33:44:55".parse().unwrap();
/// assert_eq!(mac.to_string(), "00:11:22:33:44:55");
///
/// let bare: MacAddress = "001122334455".parse().unwrap();
/// assert_eq!(mac, bare);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct MacAddress([u8; 6]);

impl MacAddress {
    /// All-zero address, used before the router MAC is known.
    pub const ZERO: MacAddress = MacAddress([0; 6]);

    pub const fn new(octets: [u8; 6]) -> Self {
        Self(octets)
    }

    /// Octets in wire order.
    pub const fn as_bytes(&self) -> &[u8; 6] {
        &self.0
    }

    /// Reads a MAC address from the first six bytes of `bytes`.
    pub fn from_slice(bytes: &[u8]) -> Option<Self> {
        let octets: [u8; 6] = bytes.get(..6)?.try_into().ok()?;
        Some(Self(octets))
    }

    fn parse_octet(digits: &str) -> Option<u8> {
        if digits.is_empty() || digits.len() > 2 {
            return None;
        }
        u8::from_str_radix(digits, 16).ok()
    }
}

impl fmt::Display for MacAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [a, b, c, d, e, g] = self.0;
        write!(f, "{a:02x}:{b:02x}:{c:02x}:{d:02x}:{e:02x}:{g:02x}")
    }
}

impl FromStr for MacAddress {
    type Err = ParseError;

    fn from_str(text: &str) -> Result<Self, Self::Err> {
        let groups: Vec<&str> = match text.find([':', '-']).map(|i| text.as_bytes()[i]) {
            Some(b':') => text.split(':').collect(),
            Some(_) => text.split('-').collect(),
            None if text.len() == 12 && text.is_ascii() => {
                text.as_bytes().chunks(2).filter_map(|pair| std::str::from_utf8(pair).ok()).collect()
            }
            None => Vec::new(),
        };

        let octets: Option<Vec<u8>> = groups.iter().map(|group| Self::parse_octet(group)).collect();
        octets
            .and_then(|octets| <[u8; 6]>::try_from(octets).ok())
            .map(Self)
            .ok_or_else(|| ParseError::InvalidMacAddress(text.to_string()))
    }
}

impl TryFrom<String> for MacAddress {
    type Error = ParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<MacAddress> for String {
    fn from(value: MacAddress) -> Self {
        value.to_string()
    }
}

impl From<[u8; 6]> for MacAddress {
    fn from(octets: [u8; 6]) -> Self {
        Self(octets)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_parse_colon_format() {
        let mac: MacAddress = "00:11:22:33:44:55".parse().unwrap();
        assert_eq!(mac.as_bytes(), &[0x00, 0x11, 0x22, 0x33, 0x44, 0x55]);
    }

    #[test]
    fn test_parse_bare_hex_format() {
        let mac: MacAddress = "720600010001".parse().unwrap();
        assert_eq!(mac.as_bytes(), &[0x72, 0x06, 0x00, 0x01, 0x00, 0x01]);
    }

    #[test]
    fn test_display_is_lowercase() {
        let mac = MacAddress::new([0xaa, 0xbb, 0xcc, 0xdd, 0xee, 0xff]);
        assert_eq!(mac.to_string(), "aa:bb:cc:dd:ee:ff");
    }

    #[test]
    fn test_from_slice() {
        let frame = [1u8, 2, 3, 4, 5, 6, 7, 8];
        assert_eq!(
            MacAddress::from_slice(&frame),
            Some(MacAddress::new([1, 2, 3, 4, 5, 6]))
        );
        assert_eq!(MacAddress::from_slice(&frame[..5]), None);
    }

    #[test]
    fn test_serde_as_string() {
        let mac: MacAddress = "52:54:00:12:34:56".parse().unwrap();
        let json = serde_json::to_string(&mac).unwrap();
        assert_eq!(json, "\"52:54:00:12:34:56\"");
        let back: MacAddress = serde_json::from_str(&json).unwrap();
        assert_eq!(back, mac);
    }

    #[test]
    fn test_parse_dash_format() {
        let mac: MacAddress = "00-11-22-33-44-55".parse().unwrap();
        assert_eq!(mac.as_bytes(), &[0x00, 0x11, 0x22, 0x33, 0x44, 0x55]);
    }

    #[test]
    fn test_rejects_malformed() {
        assert!("invalid".parse::<MacAddress>().is_err());
        assert!("00:11:22:33:44".parse::<MacAddress>().is_err());
        assert!("00:11:22:33:44:55:66".parse::<MacAddress>().is_err());
        assert!("gg:11:22:33:44:55".parse::<MacAddress>().is_err());
        assert!("0011223344".parse::<MacAddress>().is_err());
    }
}
