//! Packet construction and masked comparison for Everflow verification.
//!
//! - [`headers`]: Ethernet II and IPv4 through `pnet` views, plus the GRE
//!   base header
//! - [`frame`]: Ethernet/IPv4 frames used as mirror candidates, plus a
//!   builder for ICMP, TCP and UDP test frames
//! - [`mask`]: a packet template with don't-care fields and byte ranges
//! - [`mirror`]: synthesis of the GRE-encapsulated frame a mirror session
//!   is expected to emit
//!
//! # Example
//!
//! ```
//! use sonic_everflow_packet::{build_expected, FrameBuilder, OUTER_HEADER_SIZE};
//! use sonic_everflow_types::{AsicFamily, MacAddress, MirrorSessionDescriptor, PlatformQuirks, SessionDefaults};
//!
//! let session = MirrorSessionDescriptor::for_platform(
//!     "test_session_1",
//!     &AsicFamily::Broadcom,
//!     &SessionDefaults::default(),
//! ).unwrap();
//! let router_mac: MacAddress = "52:54:00:00:00:01".parse().unwrap();
//! let candidate = FrameBuilder::new().icmp_echo(1, 1, &[]).frame_len(64).build();
//!
//! let expected = build_expected(
//!     &session,
//!     &PlatformQuirks::generic(),
//!     router_mac,
//!     candidate.as_bytes(),
//!     true,
//! ).unwrap();
//! assert_eq!(expected.template().len(), OUTER_HEADER_SIZE + 64);
//! ```

mod error;
pub mod frame;
pub mod headers;
pub mod mask;
pub mod mirror;

pub use error::PacketError;
pub use frame::{summarize, Frame, FrameBuilder};
pub use mask::{FieldPath, Mask, MaskEntry, MaskPolicy};
pub use mirror::{build_expected, build_expected_pair, ExpectedMirrorPackets, OUTER_HEADER_SIZE};
