//! In-memory collaborators for exercising suites without a testbed.
//!
//! [`FakeDut`] records every command and file operation and answers from
//! canned outputs. [`LoopbackDataplane`] delivers frames synchronously and,
//! when given a [`MirrorBehavior`], produces the ERSPAN copy a DUT would send
//! to the monitor port.

use async_trait::async_trait;
use sonic_everflow_common::{CommandOutput, DutFacts, DutHost, EverflowResult};
use sonic_everflow_packet::{build_expected, Frame};
use sonic_everflow_types::{MacAddress, MirrorSessionDescriptor, PlatformQuirks, Stage};
use std::collections::{BTreeMap, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tracing::debug;

use crate::arp::PtfHost;
use crate::dataplane::Dataplane;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// A rendered template.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderedTemplate {
    pub src: PathBuf,
    pub vars: serde_json::Value,
    pub dest: PathBuf,
}

/// A device that records what it is asked to do.
///
/// Commands are answered by the first registered response whose prefix
/// matches; anything else succeeds with empty output.
#[derive(Debug, Default)]
pub struct FakeDut {
    facts: DutFacts,
    responses: Mutex<Vec<(String, CommandOutput)>>,
    commands: Mutex<Vec<String>>,
    templates: Mutex<Vec<RenderedTemplate>>,
    copies: Mutex<Vec<(PathBuf, PathBuf)>>,
}

impl FakeDut {
    pub fn new(facts: DutFacts) -> Self {
        Self {
            facts,
            ..Self::default()
        }
    }

    /// Answers commands starting with `prefix` with `output`.
    pub fn respond(&self, prefix: impl Into<String>, output: CommandOutput) {
        lock(&self.responses).push((prefix.into(), output));
    }

    /// Makes commands starting with `prefix` exit with status 1.
    pub fn fail_on(&self, prefix: impl Into<String>) {
        let output = CommandOutput {
            exit_code: 1,
            stdout: String::new(),
            stderr: "command failed".to_string(),
        };
        self.respond(prefix, output);
    }

    pub fn commands(&self) -> Vec<String> {
        lock(&self.commands).clone()
    }

    /// Recorded commands starting with `prefix`.
    pub fn commands_matching(&self, prefix: &str) -> Vec<String> {
        lock(&self.commands)
            .iter()
            .filter(|c| c.starts_with(prefix))
            .cloned()
            .collect()
    }

    pub fn templates(&self) -> Vec<RenderedTemplate> {
        lock(&self.templates).clone()
    }

    pub fn copies(&self) -> Vec<(PathBuf, PathBuf)> {
        lock(&self.copies).clone()
    }
}

#[async_trait]
impl DutHost for FakeDut {
    async fn run(&self, command: &str) -> EverflowResult<CommandOutput> {
        debug!(command = %command, "Fake DUT command");
        lock(&self.commands).push(command.to_string());
        let output = lock(&self.responses)
            .iter()
            .find(|(prefix, _)| command.starts_with(prefix.as_str()))
            .map(|(_, output)| output.clone())
            .unwrap_or_default();
        Ok(output)
    }

    async fn facts(&self) -> EverflowResult<DutFacts> {
        Ok(self.facts.clone())
    }

    async fn template(
        &self,
        src: &Path,
        vars: &serde_json::Value,
        dest: &Path,
    ) -> EverflowResult<()> {
        lock(&self.templates).push(RenderedTemplate {
            src: src.to_path_buf(),
            vars: vars.clone(),
            dest: dest.to_path_buf(),
        });
        Ok(())
    }

    async fn copy(&self, src: &Path, dest: &Path) -> EverflowResult<()> {
        lock(&self.copies).push((src.to_path_buf(), dest.to_path_buf()));
        Ok(())
    }
}

/// A PTF host that records commands, written files and templates.
#[derive(Debug, Default)]
pub struct FakePtfHost {
    commands: Mutex<Vec<String>>,
    files: Mutex<BTreeMap<PathBuf, String>>,
    templates: Mutex<Vec<RenderedTemplate>>,
}

impl FakePtfHost {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn commands(&self) -> Vec<String> {
        lock(&self.commands).clone()
    }

    pub fn file(&self, path: impl AsRef<Path>) -> Option<String> {
        lock(&self.files).get(path.as_ref()).cloned()
    }

    pub fn templates(&self) -> Vec<RenderedTemplate> {
        lock(&self.templates).clone()
    }
}

#[async_trait]
impl PtfHost for FakePtfHost {
    async fn run(&self, command: &str) -> EverflowResult<CommandOutput> {
        lock(&self.commands).push(command.to_string());
        if let Some(path) = command.strip_prefix("rm -f ") {
            lock(&self.files).remove(Path::new(path.trim()));
        }
        Ok(CommandOutput::ok(""))
    }

    async fn write_file(&self, path: &Path, contents: &str) -> EverflowResult<()> {
        lock(&self.files).insert(path.to_path_buf(), contents.to_string());
        Ok(())
    }

    async fn template(
        &self,
        src: &Path,
        dest: &Path,
        vars: &serde_json::Value,
    ) -> EverflowResult<()> {
        lock(&self.templates).push(RenderedTemplate {
            src: src.to_path_buf(),
            vars: vars.clone(),
            dest: dest.to_path_buf(),
        });
        Ok(())
    }
}

/// How the simulated DUT mirrors traffic sent into it.
#[derive(Debug, Clone)]
pub struct MirrorBehavior {
    pub session: MirrorSessionDescriptor,
    pub platform: PlatformQuirks,
    pub router_mac: MacAddress,
    pub monitor_port: u32,
    pub mirror_type: Stage,
    /// PTF id to namespace. A copy crossing namespaces loses one outer TTL.
    pub port_namespaces: BTreeMap<u32, String>,
    /// Destination MAC the DUT writes into the outer and routed frames.
    pub neighbor_mac: MacAddress,
}

impl MirrorBehavior {
    fn mirror(&self, src_port: u32, frame: &[u8]) -> EverflowResult<Vec<u8>> {
        let mut inner = Frame::from_bytes(frame.to_vec())?;
        if self.mirror_type == Stage::Egress {
            inner.route_through(self.router_mac);
            inner.set_eth_dst(self.neighbor_mac);
        }

        let mask = build_expected(&self.session, &self.platform, self.router_mac, inner.as_bytes(), true)?;
        let mut outer = Frame::from_bytes(mask.template().to_vec())?;
        outer.set_eth_dst(self.neighbor_mac);
        if self.port_namespaces.get(&src_port) != self.port_namespaces.get(&self.monitor_port) {
            outer.set_ip_ttl(self.session.ttl().saturating_sub(1));
        }
        Ok(outer.into_bytes())
    }
}

/// A dataplane whose received frames come from [`LoopbackDataplane::inject`]
/// or from mirroring sent frames.
///
/// Polling never waits: an empty queue returns `None` immediately.
#[derive(Debug, Default)]
pub struct LoopbackDataplane {
    mirror: Mutex<Option<MirrorBehavior>>,
    received: Mutex<VecDeque<(u32, Vec<u8>)>>,
    sent: Mutex<Vec<(u32, Vec<u8>)>>,
    flushes: Mutex<usize>,
}

impl LoopbackDataplane {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_mirror(behavior: MirrorBehavior) -> Self {
        let dataplane = Self::new();
        dataplane.set_mirror(Some(behavior));
        dataplane
    }

    /// Replaces the mirroring behavior; `None` stops mirroring.
    pub fn set_mirror(&self, behavior: Option<MirrorBehavior>) {
        *lock(&self.mirror) = behavior;
    }

    /// Queues a frame as received on `port`.
    pub fn inject(&self, port: u32, frame: Vec<u8>) {
        lock(&self.received).push_back((port, frame));
    }

    pub fn sent(&self) -> Vec<(u32, Vec<u8>)> {
        lock(&self.sent).clone()
    }

    pub fn flush_count(&self) -> usize {
        *lock(&self.flushes)
    }
}

#[async_trait]
impl Dataplane for LoopbackDataplane {
    async fn flush(&self) -> EverflowResult<()> {
        lock(&self.received).clear();
        *lock(&self.flushes) += 1;
        Ok(())
    }

    async fn send(&self, port: u32, frame: &[u8]) -> EverflowResult<()> {
        lock(&self.sent).push((port, frame.to_vec()));
        let behavior = lock(&self.mirror).clone();
        if let Some(behavior) = behavior {
            let mirrored = behavior.mirror(port, frame)?;
            self.inject(behavior.monitor_port, mirrored);
        }
        Ok(())
    }

    async fn poll(&self, ports: &[u32], _timeout: Duration) -> EverflowResult<Option<(u32, Vec<u8>)>> {
        let mut received = lock(&self.received);
        let position = received.iter().position(|(port, _)| ports.contains(port));
        Ok(position.and_then(|i| received.remove(i)))
    }
}
