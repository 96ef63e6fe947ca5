//! Sending candidate packets into the DUT and checking their mirrors.
//!
//! A check exercises up to two source ports. When the chosen source and
//! the monitor port sit in different namespaces, the monitor port's own
//! namespace is exercised too, so both the cross-namespace and the local
//! mirror paths are covered. Cross-namespace copies take an extra hop, so
//! their outer TTL is not compared.

use serde::Serialize;
use sonic_everflow_common::{get_monitor_port, DutHost, EverflowConfig, EverflowError, EverflowResult, VerificationError};
use sonic_everflow_packet::{build_expected_pair, summarize, Frame, Mask};
use sonic_everflow_types::{MacAddress, MirrorSessionDescriptor, Stage};
use std::fmt;
use tracing::{debug, info, instrument};

use crate::dataplane::Dataplane;
use crate::topology::{choose, NamespacePicker, TopologyClassification};
use crate::verification::{extract_mirror_payload, verify_mirror_payload, verify_no_packet_any, verify_packet_any_port};

/// Where and how a candidate is sent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SendOptions {
    /// PTF port to send from; random when unset.
    pub src_port: Option<u32>,
    /// Ports the mirror may arrive on; the session's monitor port when unset.
    pub dest_ports: Option<Vec<u32>>,
    /// Expect a mirror when true, its absence when false.
    pub expect_recv: bool,
    /// Whether the scenario still holds when the source is in another
    /// namespace than the destination.
    pub valid_across_namespace: bool,
}

impl Default for SendOptions {
    fn default() -> Self {
        Self {
            src_port: None,
            dest_ports: None,
            expect_recv: true,
            valid_across_namespace: true,
        }
    }
}

impl SendOptions {
    pub fn with_src_port(mut self, port: u32) -> Self {
        self.src_port = Some(port);
        self
    }

    pub fn with_dest_ports(mut self, ports: Vec<u32>) -> Self {
        self.dest_ports = Some(ports);
        self
    }

    /// Checks that no mirror arrives.
    pub fn expect_none(mut self) -> Self {
        self.expect_recv = false;
        self
    }

    pub fn same_namespace_only(mut self) -> Self {
        self.valid_across_namespace = false;
        self
    }
}

/// Progress of the check for one source port.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckState {
    Idle,
    SourceSelected,
    Sent,
    /// The mirror arrived and carried the candidate.
    Matched,
    /// No mirror arrived in time.
    Timeout,
    /// A mirror arrived but its payload was wrong or truncated.
    Mismatch,
    /// No mirror arrived, as required.
    Absent,
}

impl CheckState {
    /// True for terminal states that mean success.
    pub fn passed(&self) -> bool {
        matches!(self, CheckState::Matched | CheckState::Absent)
    }
}

impl fmt::Display for CheckState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CheckState::Idle => "idle",
            CheckState::SourceSelected => "source-selected",
            CheckState::Sent => "sent",
            CheckState::Matched => "matched",
            CheckState::Timeout => "timeout",
            CheckState::Mismatch => "mismatch",
            CheckState::Absent => "absent",
        };
        f.write_str(name)
    }
}

/// Outcome for one exercised source port.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceCheckReport {
    pub src_port: u32,
    pub state: CheckState,
    /// Whether the outer TTL was compared.
    pub ttl_checked: bool,
    /// Port the mirror arrived on.
    pub received_port: Option<u32>,
    pub error: Option<VerificationError>,
}

impl SourceCheckReport {
    fn new(src_port: u32, ttl_checked: bool) -> Self {
        Self {
            src_port,
            state: CheckState::Idle,
            ttl_checked,
            received_port: None,
            error: None,
        }
    }

    fn advance(&mut self, next: CheckState) {
        debug!(src_port = self.src_port, from = %self.state, to = %next, "Check state");
        self.state = next;
    }

    fn fail(&mut self, next: CheckState, error: VerificationError) {
        self.advance(next);
        self.error = Some(error);
    }

    pub fn passed(&self) -> bool {
        self.state.passed()
    }
}

/// Ordered source ports to exercise for a check from `src_port` to
/// `dest_port`.
pub fn source_port_set(
    classification: &TopologyClassification,
    src_port: u32,
    dest_port: u32,
    valid_across_namespace: bool,
) -> EverflowResult<Vec<u32>> {
    let src_ns = classification.namespace_of(src_port)?;
    let dest_ns = classification.namespace_of(dest_port)?;

    let mut ports = Vec::with_capacity(2);
    if valid_across_namespace || src_ns == dest_ns {
        ports.push(src_port);
    }
    if src_ns != dest_ns && !ports.contains(&dest_port) {
        ports.push(dest_port);
    }
    Ok(ports)
}

/// Runs mirror checks against one DUT and its dataplane.
pub struct MirrorChecker<'a> {
    dut: &'a dyn DutHost,
    dataplane: &'a dyn Dataplane,
    classification: &'a TopologyClassification,
    config: &'a EverflowConfig,
    mirror_type: Stage,
}

impl<'a> MirrorChecker<'a> {
    pub fn new(
        dut: &'a dyn DutHost,
        dataplane: &'a dyn Dataplane,
        classification: &'a TopologyClassification,
        config: &'a EverflowConfig,
        mirror_type: Stage,
    ) -> Self {
        Self {
            dut,
            dataplane,
            classification,
            config,
            mirror_type,
        }
    }

    /// Uniformly chosen PTF port of the testbed.
    pub fn random_src_port(&self, picker: &mut dyn NamespacePicker) -> EverflowResult<u32> {
        let ports: Vec<u32> = self.classification.port_index_map.values().copied().collect();
        choose(picker, &ports)
            .copied()
            .ok_or_else(|| EverflowError::not_found("source port", "port index map is empty"))
    }

    /// Sends `candidate` and checks its mirror, failing on the first source
    /// port whose check does not pass.
    pub async fn send_and_check_mirror_packets(
        &self,
        session: &MirrorSessionDescriptor,
        candidate: &Frame,
        options: SendOptions,
        picker: &mut dyn NamespacePicker,
    ) -> EverflowResult<Vec<SourceCheckReport>> {
        let reports = self.run_checks(session, candidate, options, picker).await?;
        if let Some(error) = reports.iter().find_map(|r| r.error.clone()) {
            return Err(error.into());
        }
        Ok(reports)
    }

    /// Sends `candidate` and checks its mirror, reporting every exercised
    /// source port. Stops after the first failing port.
    #[instrument(skip(self, session, candidate, options, picker), fields(session = %session.name(), mirror_type = %self.mirror_type))]
    pub async fn run_checks(
        &self,
        session: &MirrorSessionDescriptor,
        candidate: &Frame,
        options: SendOptions,
        picker: &mut dyn NamespacePicker,
    ) -> EverflowResult<Vec<SourceCheckReport>> {
        let src_port = match options.src_port {
            Some(port) => port,
            None => self.random_src_port(picker)?,
        };
        let dest_ports = match options.dest_ports {
            Some(ports) if !ports.is_empty() => ports,
            _ => vec![get_monitor_port(self.dut, session.name(), &self.classification.port_index_map).await?],
        };

        let facts = self.dut.facts().await?;
        let platform = facts.platform_quirks();
        let expected = build_expected_pair(session, &platform, facts.router_mac, candidate.as_bytes())?;

        let dest_ns = self.classification.namespace_of(dest_ports[0])?.to_string();
        let sources = source_port_set(
            self.classification,
            src_port,
            dest_ports[0],
            options.valid_across_namespace,
        )?;

        let mut reports = Vec::with_capacity(sources.len());
        for src in sources {
            // An extra hop between namespaces decrements the TTL.
            let ttl_checked = self.classification.namespace_of(src)? == dest_ns;
            let mut report = SourceCheckReport::new(src, ttl_checked);
            report.advance(CheckState::SourceSelected);

            let mask = expected.select(ttl_checked);
            self.dataplane.flush().await?;
            self.dataplane.send(src, candidate.as_bytes()).await?;
            report.advance(CheckState::Sent);

            if options.expect_recv {
                self.check_received(&mut report, mask, candidate, &dest_ports, facts.router_mac)
                    .await?;
            } else {
                self.check_absent(&mut report, mask, &dest_ports).await?;
            }

            let failed = !report.passed();
            reports.push(report);
            if failed {
                break;
            }
        }
        Ok(reports)
    }

    async fn check_received(
        &self,
        report: &mut SourceCheckReport,
        mask: &Mask,
        candidate: &Frame,
        dest_ports: &[u32],
        router_mac: MacAddress,
    ) -> EverflowResult<()> {
        tokio::time::sleep(self.config.stability_buffer()).await;

        let (port, received) = match verify_packet_any_port(
            self.dataplane,
            mask,
            dest_ports,
            self.config.receive_timeout(),
        )
        .await
        {
            Ok(hit) => hit,
            Err(EverflowError::Verification(e)) => {
                report.fail(CheckState::Timeout, e);
                return Ok(());
            }
            Err(e) => return Err(e),
        };
        report.received_port = Some(port);

        let inner = match extract_mirror_payload(&received, candidate.len()) {
            Ok(inner) => inner,
            Err(e) => {
                report.fail(CheckState::Mismatch, e);
                return Ok(());
            }
        };
        info!(packet = %summarize(inner), "Received inner packet");

        match verify_mirror_payload(candidate, inner, self.mirror_type, router_mac) {
            Ok(()) => report.advance(CheckState::Matched),
            Err(EverflowError::Verification(e)) => report.fail(CheckState::Mismatch, e),
            Err(e) => return Err(e),
        }
        Ok(())
    }

    async fn check_absent(
        &self,
        report: &mut SourceCheckReport,
        mask: &Mask,
        dest_ports: &[u32],
    ) -> EverflowResult<()> {
        match verify_no_packet_any(self.dataplane, mask, dest_ports, self.config.negative_timeout()).await {
            Ok(()) => report.advance(CheckState::Absent),
            Err(EverflowError::Verification(e)) => report.fail(CheckState::Mismatch, e),
            Err(e) => return Err(e),
        }
        Ok(())
    }
}
