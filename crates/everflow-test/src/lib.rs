//! Everflow test harness: testbed classification, capability checks and the
//! send/verify protocol for mirrored traffic.
//!
//! This crate provides:
//! - Topology classification into traffic directions ([`topology`])
//! - The DUT's supported stage pairs ([`capabilities`])
//! - Packet generator access and frame assertions ([`dataplane`], [`verification`])
//! - Mirror checks across namespaces ([`orchestrator`])
//! - ARP responder, candidate packets and scoped suite setup ([`arp`],
//!   [`fixtures`], [`suite`])
//! - In-memory collaborators for tests ([`fakes`])
//!
//! # Example
//!
//! ```ignore
//! use sonic_everflow_test::{EverflowSuite, RandomPicker, SendOptions};
//!
//! let suite = EverflowSuite::setup(&dut, &ptf, &config, &topology, &capabilities, &mut RandomPicker).await?;
//! let session = suite.session(DEFAULT_SESSION_NAME)?;
//! suite.with_module(async {
//!     suite.with_session(&session, async {
//!         suite.with_grouping(grouping, session.name(), EVERFLOW_V4_RULES, async {
//!             let candidate = tcp_candidate(suite.facts().router_mac, suite.classification().kind);
//!             suite
//!                 .checker(&dataplane, grouping)
//!                 .send_and_check_mirror_packets(&session, &candidate, SendOptions::default(), &mut RandomPicker)
//!                 .await
//!         }).await
//!     }).await
//! }).await?;
//! ```

pub mod arp;
pub mod capabilities;
pub mod dataplane;
pub mod fakes;
pub mod fixtures;
pub mod orchestrator;
pub mod suite;
pub mod topology;
pub mod verification;

pub use arp::{ArpResponder, PtfHost};
pub use capabilities::{CapabilityFacts, MirrorSupport};
pub use dataplane::Dataplane;
pub use orchestrator::{CheckState, MirrorChecker, SendOptions, SourceCheckReport};
pub use suite::{EverflowSuite, StaticRoute, DEFAULT_SESSION_NAME};
pub use topology::{
    classify, neighbor_ip, tx_port_ids, DirectionRecord, FirstPicker, NamespacePicker, RandomPicker,
    TopologyClassification, TopologyFacts, TopologyKind,
};
pub use verification::{extract_mirror_payload, verify_no_packet_any, verify_packet_any_port};
