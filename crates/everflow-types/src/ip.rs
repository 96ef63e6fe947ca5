//! IPv4 prefix type used for mirror session destination routes.

use crate::ParseError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::Ipv4Addr;
use std::str::FromStr;

/// An IPv4 network prefix in CIDR notation.
///
/// The stored address is always the network address: host bits are cleared
/// on construction, so `2.2.2.2/24` and `2.2.2.0/24` compare equal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Ipv4Prefix {
    network: Ipv4Addr,
    prefix_len: u8,
}

impl Ipv4Prefix {
    /// Creates the prefix of length `prefix_len` that contains `address`.
    ///
    /// # Errors
    ///
    /// Returns an error if `prefix_len` is greater than 32.
    pub fn new(address: Ipv4Addr, prefix_len: u8) -> Result<Self, ParseError> {
        if prefix_len > 32 {
            return Err(ParseError::InvalidIpPrefix(format!(
                "{}/{}: prefix length exceeds 32",
                address, prefix_len
            )));
        }

        let mask = if prefix_len == 0 {
            0
        } else {
            u32::MAX << (32 - u32::from(prefix_len))
        };
        let network = Ipv4Addr::from(u32::from(address) & mask);

        Ok(Ipv4Prefix {
            network,
            prefix_len,
        })
    }

    /// Returns the network address of this prefix.
    pub const fn network(&self) -> Ipv4Addr {
        self.network
    }

    /// Returns the prefix length in bits.
    pub const fn prefix_len(&self) -> u8 {
        self.prefix_len
    }

    /// Returns true if `address` falls inside this prefix.
    pub fn contains(&self, address: Ipv4Addr) -> bool {
        Ipv4Prefix::new(address, self.prefix_len)
            .map(|p| p.network == self.network)
            .unwrap_or(false)
    }
}

impl fmt::Display for Ipv4Prefix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.network, self.prefix_len)
    }
}

impl FromStr for Ipv4Prefix {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (addr, len) = s
            .split_once('/')
            .ok_or_else(|| ParseError::InvalidIpPrefix(s.to_string()))?;
        let address = addr
            .parse::<Ipv4Addr>()
            .map_err(|_| ParseError::InvalidIpPrefix(s.to_string()))?;
        let prefix_len = len
            .parse::<u8>()
            .map_err(|_| ParseError::InvalidIpPrefix(s.to_string()))?;
        Ipv4Prefix::new(address, prefix_len)
    }
}

impl TryFrom<String> for Ipv4Prefix {
    type Error = ParseError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<Ipv4Prefix> for String {
    fn from(prefix: Ipv4Prefix) -> String {
        prefix.to_string()
    }
}
