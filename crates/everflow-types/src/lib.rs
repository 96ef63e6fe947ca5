//! Common Everflow types for mirror-session verification.
//!
//! This crate provides type-safe representations of the values that flow
//! between the packet builder, the device helpers and the send/verify
//! orchestrator:
//!
//! - [`MacAddress`]: 48-bit Ethernet MAC addresses
//! - [`Ipv4Prefix`]: IPv4 network prefixes (CIDR notation)
//! - [`AsicFamily`] / [`PlatformQuirks`]: per-platform encapsulation lookups
//! - [`MirrorSessionDescriptor`]: an ERSPAN session as configured on the DUT
//! - [`MirrorGrouping`]: the ACL stage / mirror type pair of a test grouping

mod asic;
mod ip;
mod mac;
mod session;
mod stage;

pub use asic::{AsicFamily, PlatformQuirks, GRE_PROTOCOL_BAREFOOT, GRE_PROTOCOL_DEFAULT, GRE_PROTOCOL_MELLANOX};
pub use ip::Ipv4Prefix;
pub use mac::MacAddress;
pub use session::{MirrorSessionDescriptor, SessionDefaults};
pub use stage::{MirrorGrouping, Stage};

/// Common error type for parsing and validation failures.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    #[error("invalid MAC address format: {0}")]
    InvalidMacAddress(String),

    #[error("invalid IP prefix format: {0}")]
    InvalidIpPrefix(String),

    #[error("invalid DSCP value: {0} (must be 0-63)")]
    InvalidDscp(u8),

    #[error("invalid TTL value: {0} (must be 1-255)")]
    InvalidTtl(u8),

    #[error("invalid stage: {0} (must be ingress or egress)")]
    InvalidStage(String),

    #[error("invalid session name: {0:?}")]
    InvalidSessionName(String),
}
