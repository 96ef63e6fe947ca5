//! Mirror session descriptor.

use crate::{AsicFamily, Ipv4Prefix, ParseError};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::net::Ipv4Addr;

/// Session parameters shared by every session a test module creates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionDefaults {
    pub src_ip: Ipv4Addr,
    pub dst_ip: Ipv4Addr,
    pub dscp: u8,
    pub ttl: u8,
    /// Prefix lengths of the routes towards `dst_ip` used by route tests.
    pub prefix_lens: Vec<u8>,
}

impl Default for SessionDefaults {
    fn default() -> Self {
        Self {
            src_ip: Ipv4Addr::new(1, 1, 1, 1),
            dst_ip: Ipv4Addr::new(2, 2, 2, 2),
            dscp: 8,
            ttl: 4,
            prefix_lens: vec![24, 32],
        }
    }
}

/// An ERSPAN mirror session as configured on the device.
///
/// Immutable once built; ranges are checked by [`MirrorSessionDescriptor::new`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MirrorSessionDescriptor {
    name: String,
    src_ip: Ipv4Addr,
    dst_ip: Ipv4Addr,
    dscp: u8,
    ttl: u8,
    gre_protocol: u16,
    dest_prefixes: BTreeSet<Ipv4Prefix>,
}

impl MirrorSessionDescriptor {
    /// Creates a validated session descriptor.
    ///
    /// # Errors
    ///
    /// Fails when the name is empty or contains whitespace, the DSCP is above
    /// 63 or the TTL is zero.
    pub fn new(
        name: impl Into<String>,
        src_ip: Ipv4Addr,
        dst_ip: Ipv4Addr,
        dscp: u8,
        ttl: u8,
        gre_protocol: u16,
        dest_prefixes: impl IntoIterator<Item = Ipv4Prefix>,
    ) -> Result<Self, ParseError> {
        let name = name.into();
        if name.is_empty() || name.chars().any(char::is_whitespace) {
            return Err(ParseError::InvalidSessionName(name));
        }
        if dscp > 63 {
            return Err(ParseError::InvalidDscp(dscp));
        }
        if ttl == 0 {
            return Err(ParseError::InvalidTtl(ttl));
        }

        Ok(Self {
            name,
            src_ip,
            dst_ip,
            dscp,
            ttl,
            gre_protocol,
            dest_prefixes: dest_prefixes.into_iter().collect(),
        })
    }

    /// Builds the session a test module configures on a device of
    /// `asic_family`: the GRE protocol follows the platform and one
    /// destination prefix is derived per entry of `defaults.prefix_lens`.
    pub fn for_platform(
        name: impl Into<String>,
        asic_family: &AsicFamily,
        defaults: &SessionDefaults,
    ) -> Result<Self, ParseError> {
        let prefixes = defaults
            .prefix_lens
            .iter()
            .map(|len| Ipv4Prefix::new(defaults.dst_ip, *len))
            .collect::<Result<Vec<_>, _>>()?;

        Self::new(
            name,
            defaults.src_ip,
            defaults.dst_ip,
            defaults.dscp,
            defaults.ttl,
            asic_family.gre_protocol(),
            prefixes,
        )
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn src_ip(&self) -> Ipv4Addr {
        self.src_ip
    }

    pub fn dst_ip(&self) -> Ipv4Addr {
        self.dst_ip
    }

    pub fn dscp(&self) -> u8 {
        self.dscp
    }

    pub fn ttl(&self) -> u8 {
        self.ttl
    }

    pub fn gre_protocol(&self) -> u16 {
        self.gre_protocol
    }

    pub fn dest_prefixes(&self) -> &BTreeSet<Ipv4Prefix> {
        &self.dest_prefixes
    }
}
