//! Scoped device configuration.
//!
//! Every change a test makes to the DUT is a [`Fixture`]: something that is
//! acquired before the test body runs and released afterwards. [`scoped`]
//! and [`scoped_all`] release on every exit path, including errors and
//! panics in the body.

use async_trait::async_trait;
use futures::FutureExt;
use sonic_everflow_types::{MirrorGrouping, MirrorSessionDescriptor, Stage};
use std::future::Future;
use std::panic::{resume_unwind, AssertUnwindSafe};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{info, warn};

use crate::commands;
use crate::config::{ConfigMethod, EverflowConfig};
use crate::dut::DutHost;
use crate::error::EverflowResult;
use crate::rules::{
    AclRulesConfig, EVERFLOW_RULE_CREATE_FILE, EVERFLOW_RULE_CREATE_TEMPLATE,
    EVERFLOW_RULE_DELETE_FILE,
};

/// A reversible change to the test environment.
#[async_trait]
pub trait Fixture: Send + Sync {
    /// Short name for logs.
    fn name(&self) -> String;

    async fn acquire(&self) -> EverflowResult<()>;

    async fn release(&self) -> EverflowResult<()>;
}

/// Runs `body` with `fixture` acquired.
///
/// The body's error wins over a release error; a release error alone is
/// returned.
pub async fn scoped<T, Fut>(fixture: &dyn Fixture, body: Fut) -> EverflowResult<T>
where
    Fut: Future<Output = EverflowResult<T>>,
{
    scoped_all(&[fixture], body).await
}

/// Acquires `fixtures` in order, runs `body`, then releases them in reverse.
///
/// If an acquire fails, the fixtures acquired before it are released and
/// the body does not run.
pub async fn scoped_all<T, Fut>(fixtures: &[&dyn Fixture], body: Fut) -> EverflowResult<T>
where
    Fut: Future<Output = EverflowResult<T>>,
{
    let mut acquired = 0;
    for fixture in fixtures {
        info!(fixture = %fixture.name(), "Acquiring fixture");
        if let Err(e) = fixture.acquire().await {
            warn!(fixture = %fixture.name(), error = %e, "Failed to acquire fixture");
            release_all(&fixtures[..acquired]).await;
            return Err(e);
        }
        acquired += 1;
    }

    let outcome = AssertUnwindSafe(body).catch_unwind().await;
    let released = release_all(fixtures).await;

    match outcome {
        Ok(Ok(value)) => released.map(|_| value),
        Ok(Err(e)) => Err(e),
        Err(panic) => resume_unwind(panic),
    }
}

/// Releases in reverse order, attempting all of them; returns the first
/// error.
async fn release_all(fixtures: &[&dyn Fixture]) -> EverflowResult<()> {
    let mut first_error = None;
    for fixture in fixtures.iter().rev() {
        info!(fixture = %fixture.name(), "Releasing fixture");
        if let Err(e) = fixture.release().await {
            warn!(fixture = %fixture.name(), error = %e, "Failed to release fixture");
            first_error.get_or_insert(e);
        }
    }
    match first_error {
        Some(e) => Err(e),
        None => Ok(()),
    }
}

/// Shuts BGP down so mirrored packets are not routed back into the DUT.
pub struct BgpShutdown<'a> {
    dut: &'a dyn DutHost,
    settle: Duration,
}

impl<'a> BgpShutdown<'a> {
    pub fn new(dut: &'a dyn DutHost, settle: Duration) -> Self {
        Self { dut, settle }
    }
}

#[async_trait]
impl Fixture for BgpShutdown<'_> {
    fn name(&self) -> String {
        "bgp-shutdown".to_string()
    }

    async fn acquire(&self) -> EverflowResult<()> {
        self.dut.command(commands::BGP_SHUTDOWN).await?;
        tokio::time::sleep(self.settle).await;
        Ok(())
    }

    async fn release(&self) -> EverflowResult<()> {
        self.dut.command(commands::BGP_STARTUP).await?;
        tokio::time::sleep(self.settle).await;
        Ok(())
    }
}

/// Scratch directory on the DUT for rendered rule files.
pub struct RunDirectory<'a> {
    dut: &'a dyn DutHost,
    dir: PathBuf,
}

impl<'a> RunDirectory<'a> {
    pub fn new(dut: &'a dyn DutHost, dir: impl Into<PathBuf>) -> Self {
        Self {
            dut,
            dir: dir.into(),
        }
    }
}

#[async_trait]
impl Fixture for RunDirectory<'_> {
    fn name(&self) -> String {
        format!("run-dir {}", self.dir.display())
    }

    async fn acquire(&self) -> EverflowResult<()> {
        self.dut.command(&commands::mkdir(&self.dir)).await?;
        Ok(())
    }

    async fn release(&self) -> EverflowResult<()> {
        self.dut.command(&commands::remove_dir(&self.dir)).await?;
        Ok(())
    }
}

/// A policer in CONFIG_DB of every front-end namespace.
pub struct PolicerFixture<'a> {
    dut: &'a dyn DutHost,
    name: String,
    rate: u32,
    method: ConfigMethod,
}

impl<'a> PolicerFixture<'a> {
    pub fn new(dut: &'a dyn DutHost, name: impl Into<String>, method: ConfigMethod) -> Self {
        Self {
            dut,
            name: name.into(),
            rate: commands::DEFAULT_POLICER_RATE,
            method,
        }
    }

    pub fn with_rate(mut self, rate: u32) -> Self {
        self.rate = rate;
        self
    }

    pub fn policer_name(&self) -> &str {
        &self.name
    }
}

#[async_trait]
impl Fixture for PolicerFixture<'_> {
    fn name(&self) -> String {
        format!("policer {}", self.name)
    }

    async fn acquire(&self) -> EverflowResult<()> {
        self.method.ensure_supported()?;
        for ns in self.dut.facts().await?.namespaces() {
            self.dut
                .command(&commands::policer_add(ns.as_deref(), &self.name, self.rate))
                .await?;
        }
        Ok(())
    }

    async fn release(&self) -> EverflowResult<()> {
        self.method.ensure_supported()?;
        for ns in self.dut.facts().await?.namespaces() {
            self.dut
                .command(&commands::policer_remove(ns.as_deref(), &self.name))
                .await?;
        }
        Ok(())
    }
}

/// A mirror session on the DUT.
pub struct MirrorSessionFixture<'a> {
    dut: &'a dyn DutHost,
    session: MirrorSessionDescriptor,
    policer: Option<String>,
    method: ConfigMethod,
}

impl<'a> MirrorSessionFixture<'a> {
    pub fn new(dut: &'a dyn DutHost, session: MirrorSessionDescriptor, method: ConfigMethod) -> Self {
        Self {
            dut,
            session,
            policer: None,
            method,
        }
    }

    /// Attaches an existing policer to the session.
    pub fn with_policer(mut self, policer: impl Into<String>) -> Self {
        self.policer = Some(policer.into());
        self
    }

    pub fn session(&self) -> &MirrorSessionDescriptor {
        &self.session
    }
}

#[async_trait]
impl Fixture for MirrorSessionFixture<'_> {
    fn name(&self) -> String {
        format!("mirror-session {}", self.session.name())
    }

    async fn acquire(&self) -> EverflowResult<()> {
        self.method.ensure_supported()?;
        self.dut
            .command(&commands::mirror_session_add(&self.session, self.policer.as_deref()))
            .await?;
        Ok(())
    }

    async fn release(&self) -> EverflowResult<()> {
        self.method.ensure_supported()?;
        self.dut
            .command(&commands::mirror_session_remove(self.session.name()))
            .await?;
        Ok(())
    }
}

/// The ACL table of a grouping. Ingress tables already exist on the device,
/// so only egress tables are created and removed.
pub struct AclTableFixture<'a> {
    dut: &'a dyn DutHost,
    grouping: MirrorGrouping,
    bind_ports: Vec<String>,
    method: ConfigMethod,
}

impl<'a> AclTableFixture<'a> {
    pub fn new(dut: &'a dyn DutHost, grouping: MirrorGrouping, method: ConfigMethod) -> Self {
        Self {
            dut,
            grouping,
            bind_ports: Vec::new(),
            method,
        }
    }

    pub fn with_bind_ports(mut self, ports: Vec<String>) -> Self {
        self.bind_ports = ports;
        self
    }
}

#[async_trait]
impl Fixture for AclTableFixture<'_> {
    fn name(&self) -> String {
        format!("acl-table {}", self.grouping.table_name())
    }

    async fn acquire(&self) -> EverflowResult<()> {
        self.method.ensure_supported()?;
        if self.grouping.acl_stage() == Stage::Egress {
            let command = commands::acl_table_add(
                self.grouping.table_name(),
                commands::MIRROR_TABLE_TYPE,
                self.grouping.acl_stage(),
                &self.bind_ports,
            );
            self.dut.command(&command).await?;
        }
        Ok(())
    }

    async fn release(&self) -> EverflowResult<()> {
        self.method.ensure_supported()?;
        if self.grouping.acl_stage() == Stage::Egress {
            self.dut
                .command(&commands::acl_table_remove(self.grouping.table_name()))
                .await?;
        }
        Ok(())
    }
}

/// ACL rules from a rule file, pointing at a mirror session.
pub struct AclRulesFixture<'a> {
    dut: &'a dyn DutHost,
    grouping: MirrorGrouping,
    session_name: String,
    rules_file: String,
    rule_dir: PathBuf,
    template_dir: PathBuf,
    run_dir: PathBuf,
    settle: Duration,
    method: ConfigMethod,
}

impl<'a> AclRulesFixture<'a> {
    pub fn new(
        dut: &'a dyn DutHost,
        config: &EverflowConfig,
        grouping: MirrorGrouping,
        session_name: impl Into<String>,
        rules_file: impl Into<String>,
    ) -> Self {
        Self {
            dut,
            grouping,
            session_name: session_name.into(),
            rules_file: rules_file.into(),
            rule_dir: config.paths.rule_dir.clone(),
            template_dir: config.paths.template_dir.clone(),
            run_dir: config.paths.dut_run_dir.clone(),
            settle: config.acl_rule_settle(),
            method: config.config_method,
        }
    }
}

#[async_trait]
impl Fixture for AclRulesFixture<'_> {
    fn name(&self) -> String {
        format!("acl-rules {} -> {}", self.rules_file, self.grouping.table_name())
    }

    async fn acquire(&self) -> EverflowResult<()> {
        self.method.ensure_supported()?;
        let table = self.grouping.table_name();
        let rules = AclRulesConfig::load(table, self.rule_dir.join(&self.rules_file))?;
        let rendered = self.run_dir.join(EVERFLOW_RULE_CREATE_FILE);

        self.dut
            .template(
                &self.template_dir.join(EVERFLOW_RULE_CREATE_TEMPLATE),
                &rules.to_vars()?,
                &rendered,
            )
            .await?;
        self.dut
            .command(&commands::acl_rules_load(
                &rendered,
                table,
                &self.session_name,
                self.grouping.mirror_type(),
            ))
            .await?;
        tokio::time::sleep(self.settle).await;
        Ok(())
    }

    async fn release(&self) -> EverflowResult<()> {
        self.method.ensure_supported()?;
        let remove_file = self.run_dir.join(EVERFLOW_RULE_DELETE_FILE);
        self.dut
            .copy(&self.rule_dir.join(EVERFLOW_RULE_DELETE_FILE), &remove_file)
            .await?;
        self.dut
            .command(&commands::acl_rules_remove(&remove_file, self.grouping.table_name()))
            .await?;
        Ok(())
    }
}
