//! Composition of device fixtures into Everflow test scopes.
//!
//! A suite run has three nested scopes: the module (BGP shutdown, run
//! directory and ARP responder), the mirror session, and the grouping (ACL
//! table and rules for one stage pair). [`EverflowSuite`] builds them from the classified
//! testbed and the run configuration.

use async_trait::async_trait;
use sonic_everflow_common::scope::{
    AclRulesFixture, AclTableFixture, BgpShutdown, MirrorSessionFixture, PolicerFixture, RunDirectory,
};
use sonic_everflow_common::{commands, scoped, scoped_all, DutFacts, DutHost, EverflowConfig, EverflowResult, Fixture};
use sonic_everflow_types::{MirrorGrouping, MirrorSessionDescriptor};
use std::future::Future;
use std::net::Ipv4Addr;
use tracing::info;

use crate::arp::{ArpResponder, PtfHost};
use crate::capabilities::{CapabilityFacts, MirrorSupport};
use crate::dataplane::Dataplane;
use crate::orchestrator::MirrorChecker;
use crate::topology::{classify, NamespacePicker, TopologyClassification, TopologyFacts};

/// Session used by most test cases.
pub const DEFAULT_SESSION_NAME: &str = "test_session_1";

/// Session rate limited by [`DEFAULT_POLICER_NAME`].
pub const POLICER_SESSION_NAME: &str = "TEST_POLICER_SESSION";

pub const DEFAULT_POLICER_NAME: &str = "TEST_POLICER";

/// A static route on the DUT.
pub struct StaticRoute<'a> {
    dut: &'a dyn DutHost,
    prefix: String,
    nexthop: Ipv4Addr,
    namespace: Option<String>,
}

impl<'a> StaticRoute<'a> {
    pub fn new(
        dut: &'a dyn DutHost,
        prefix: impl Into<String>,
        nexthop: Ipv4Addr,
        namespace: Option<String>,
    ) -> Self {
        Self {
            dut,
            prefix: prefix.into(),
            nexthop,
            namespace,
        }
    }
}

#[async_trait]
impl Fixture for StaticRoute<'_> {
    fn name(&self) -> String {
        format!("route {} via {}", self.prefix, self.nexthop)
    }

    async fn acquire(&self) -> EverflowResult<()> {
        let command = commands::route(true, &self.prefix, self.nexthop, self.namespace.as_deref());
        self.dut.command(&command).await?;
        Ok(())
    }

    async fn release(&self) -> EverflowResult<()> {
        let command = commands::route(false, &self.prefix, self.nexthop, self.namespace.as_deref());
        self.dut.command(&command).await?;
        Ok(())
    }
}

/// The DUT, its testbed and what it supports, gathered once per module.
pub struct EverflowSuite<'a> {
    dut: &'a dyn DutHost,
    ptf: &'a dyn PtfHost,
    config: &'a EverflowConfig,
    facts: DutFacts,
    classification: TopologyClassification,
    support: MirrorSupport,
}

impl<'a> EverflowSuite<'a> {
    /// Classifies the testbed and reads the DUT's capabilities.
    ///
    /// Fails with [`sonic_everflow_common::EverflowError::UnsupportedTopology`]
    /// before anything on the device is changed.
    pub async fn setup(
        dut: &'a dyn DutHost,
        ptf: &'a dyn PtfHost,
        config: &'a EverflowConfig,
        topology: &TopologyFacts,
        capabilities: &CapabilityFacts,
        picker: &mut dyn NamespacePicker,
    ) -> EverflowResult<Self> {
        config.config_method.ensure_supported()?;
        let classification = classify(topology, picker)?;
        let facts = dut.facts().await?;
        let support = MirrorSupport::from_facts(capabilities, &facts);

        info!(
            dut = %facts.hostname,
            topology = %topology.topo_name,
            asic = %facts.asic_type,
            "Everflow suite ready"
        );

        Ok(Self {
            dut,
            ptf,
            config,
            facts,
            classification,
            support,
        })
    }

    pub fn classification(&self) -> &TopologyClassification {
        &self.classification
    }

    pub fn support(&self) -> &MirrorSupport {
        &self.support
    }

    pub fn facts(&self) -> &DutFacts {
        &self.facts
    }

    /// Mirror session `name` with the configured parameters for this DUT's
    /// platform.
    pub fn session(&self, name: &str) -> EverflowResult<MirrorSessionDescriptor> {
        Ok(MirrorSessionDescriptor::for_platform(
            name,
            &self.facts.asic_type,
            &self.config.session_defaults(),
        )?)
    }

    pub fn checker<'s>(&'s self, dataplane: &'s dyn Dataplane, grouping: MirrorGrouping) -> MirrorChecker<'s> {
        MirrorChecker::new(
            self.dut,
            dataplane,
            &self.classification,
            self.config,
            grouping.mirror_type(),
        )
    }

    /// BGP shutdown keeping mirrored traffic from being routed back into
    /// the DUT. Multi-ASIC paths forward packets whose TTL is above one.
    pub fn bgp_shutdown(&self) -> BgpShutdown<'a> {
        BgpShutdown::new(self.dut, self.config.bgp_settle())
    }

    /// Runs `body` with BGP shut down and the run directory and ARP
    /// responder in place. BGP is started again on the way out, also when
    /// `body` fails or panics.
    pub async fn with_module<T, Fut>(&self, body: Fut) -> EverflowResult<T>
    where
        Fut: Future<Output = EverflowResult<T>>,
    {
        let bgp = self.bgp_shutdown();
        let run_dir = RunDirectory::new(self.dut, self.config.paths.dut_run_dir.clone());
        let arp = ArpResponder::new(self.ptf, self.dut, &self.classification, self.config);
        let fixtures: [&dyn Fixture; 3] = [&bgp, &run_dir, &arp];
        scoped_all(&fixtures, body).await
    }

    /// Runs `body` with `session` configured on the DUT.
    pub async fn with_session<T, Fut>(&self, session: &MirrorSessionDescriptor, body: Fut) -> EverflowResult<T>
    where
        Fut: Future<Output = EverflowResult<T>>,
    {
        let fixture = MirrorSessionFixture::new(self.dut, session.clone(), self.config.config_method);
        scoped(&fixture, body).await
    }

    /// Runs `body` with `session` configured behind the test policer.
    pub async fn with_policer_session<T, Fut>(&self, session: &MirrorSessionDescriptor, body: Fut) -> EverflowResult<T>
    where
        Fut: Future<Output = EverflowResult<T>>,
    {
        let method = self.config.config_method;
        let policer = PolicerFixture::new(self.dut, DEFAULT_POLICER_NAME, method);
        let fixture = MirrorSessionFixture::new(self.dut, session.clone(), method)
            .with_policer(policer.policer_name());
        let fixtures: [&dyn Fixture; 2] = [&policer, &fixture];
        scoped_all(&fixtures, body).await
    }

    /// Runs `body` with the ACL table and rules of `grouping` pointing at
    /// `session_name`.
    ///
    /// Fails with [`sonic_everflow_common::EverflowError::UnsupportedCombination`]
    /// without touching the device when the DUT cannot run `grouping`.
    pub async fn with_grouping<T, Fut>(
        &self,
        grouping: MirrorGrouping,
        session_name: &str,
        rules_file: &str,
        body: Fut,
    ) -> EverflowResult<T>
    where
        Fut: Future<Output = EverflowResult<T>>,
    {
        self.support.ensure(grouping)?;
        info!(grouping = %grouping, session = %session_name, "Configuring ACL grouping");

        let table = AclTableFixture::new(self.dut, grouping, self.config.config_method);
        let rules = AclRulesFixture::new(self.dut, self.config, grouping, session_name, rules_file);
        let fixtures: [&dyn Fixture; 2] = [&table, &rules];
        scoped_all(&fixtures, body).await
    }
}
