//! ARP responder on the PTF host for server-facing ports.
//!
//! On server/uplink testbeds the ACL rules match traffic to server addresses
//! that no real host answers for. The responder answers ARP for them so the
//! DUT can forward the traffic it mirrors.

use async_trait::async_trait;
use serde_json::json;
use sonic_everflow_common::{commands, CommandOutput, DutHost, EverflowConfig, EverflowError, EverflowResult, Fixture};
use std::net::Ipv4Addr;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, instrument, warn};

use crate::fixtures::{DEFAULT_SERVER_IP, TARGET_SERVER_IP, VLAN_BASE_MAC_PREFIX};
use crate::topology::{TopologyClassification, TopologyKind};

/// Template for the supervisor program entry.
pub const ARP_RESPONDER_TEMPLATE: &str = "arp_responder.conf.j2";

/// Where the supervisor program entry is rendered on the PTF host.
pub const ARP_RESPONDER_SUPERVISOR_CONF: &str = "/etc/supervisor/conf.d/arp_responder.conf";

/// The host running the packet generator.
#[async_trait]
pub trait PtfHost: Send + Sync {
    async fn run(&self, command: &str) -> EverflowResult<CommandOutput>;

    async fn write_file(&self, path: &Path, contents: &str) -> EverflowResult<()>;

    async fn template(&self, src: &Path, dest: &Path, vars: &serde_json::Value) -> EverflowResult<()>;

    /// Like [`PtfHost::run`], failing on a non-zero exit.
    async fn command(&self, command: &str) -> EverflowResult<CommandOutput> {
        self.run(command).await?.check(command)
    }
}

/// Server addresses answered by the responder.
pub const fn responder_addresses() -> [Ipv4Addr; 2] {
    [TARGET_SERVER_IP, DEFAULT_SERVER_IP]
}

/// MAC answered for the `index`-th server address.
pub fn responder_mac(index: usize) -> String {
    format!("{}{:04}", VLAN_BASE_MAC_PREFIX, index)
}

/// Responder configuration: interface to `{ip: mac}`.
///
/// The target and default server addresses are bound to the first two
/// server endpoints.
pub fn responder_config(server_ptf_ids: &[String]) -> EverflowResult<serde_json::Value> {
    let ips = responder_addresses();
    if server_ptf_ids.len() < ips.len() {
        return Err(EverflowError::not_found(
            "server ports for ARP responder",
            format!("{} of {}", server_ptf_ids.len(), ips.len()),
        ));
    }

    let mut config = serde_json::Map::new();
    for (i, (ip, ptf_id)) in ips.iter().zip(server_ptf_ids).enumerate() {
        let mut entry = serde_json::Map::new();
        entry.insert(ip.to_string(), json!(responder_mac(i)));
        config.insert(format!("eth{}", ptf_id), serde_json::Value::Object(entry));
    }
    Ok(serde_json::Value::Object(config))
}

/// Runs the ARP responder for the server addresses the ACL rules use.
///
/// Does nothing on leaf/spine testbeds.
pub struct ArpResponder<'a> {
    ptf: &'a dyn PtfHost,
    dut: &'a dyn DutHost,
    kind: TopologyKind,
    server_ptf_ids: Vec<String>,
    conf_file: PathBuf,
    template_dir: PathBuf,
    settle: Duration,
}

impl<'a> ArpResponder<'a> {
    pub fn new(
        ptf: &'a dyn PtfHost,
        dut: &'a dyn DutHost,
        classification: &TopologyClassification,
        config: &EverflowConfig,
    ) -> Self {
        Self {
            ptf,
            dut,
            kind: classification.kind,
            server_ptf_ids: classification.server_dest_ptf_ids.clone(),
            conf_file: config.paths.arp_responder_conf.clone(),
            template_dir: config.paths.template_dir.clone(),
            settle: config.arp_settle(),
        }
    }

    fn enabled(&self) -> bool {
        self.kind == TopologyKind::ServerUplink
    }
}

#[async_trait]
impl Fixture for ArpResponder<'_> {
    fn name(&self) -> String {
        "arp-responder".to_string()
    }

    #[instrument(skip(self))]
    async fn acquire(&self) -> EverflowResult<()> {
        if !self.enabled() {
            return Ok(());
        }

        let config = responder_config(&self.server_ptf_ids)?;
        self.ptf
            .write_file(&self.conf_file, &serde_json::to_string(&config)?)
            .await?;

        let vars = json!({
            "arp_responder_args": format!("--conf {}", self.conf_file.display()),
        });
        self.ptf
            .template(
                &self.template_dir.join(ARP_RESPONDER_TEMPLATE),
                Path::new(ARP_RESPONDER_SUPERVISOR_CONF),
                &vars,
            )
            .await?;

        self.ptf.command("supervisorctl reread").await?;
        self.ptf.command("supervisorctl update").await?;
        self.ptf.command("supervisorctl start arp_responder").await?;
        tokio::time::sleep(self.settle).await;

        for ip in responder_addresses() {
            let output = self.dut.run(&commands::ping(ip)).await?;
            if !output.success() {
                warn!(ip = %ip, "Server address did not answer ping");
            }
        }
        info!(config = %config, "ARP responder started");
        Ok(())
    }

    #[instrument(skip(self))]
    async fn release(&self) -> EverflowResult<()> {
        if !self.enabled() {
            return Ok(());
        }

        self.ptf.command("supervisorctl stop arp_responder").await?;
        self.ptf
            .command(&format!("rm -f {}", self.conf_file.display()))
            .await?;
        self.dut.command(commands::CLEAR_ARP).await?;
        Ok(())
    }
}
