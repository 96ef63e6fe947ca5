//! Access to the device under test.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sonic_everflow_types::{AsicFamily, MacAddress, PlatformQuirks};
use std::path::Path;

use crate::error::EverflowResult;
use crate::shell::CommandOutput;

/// Facts gathered once from the DUT.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DutFacts {
    pub hostname: String,
    pub asic_type: AsicFamily,
    /// Finer-grained ASIC identifier (e.g. `broadcom-dnx`), when the platform
    /// provides one.
    #[serde(default)]
    pub platform_asic: Option<String>,
    pub router_mac: MacAddress,
    /// SONiC build version string, e.g. `SONiC.202205.1-abcdef`.
    pub os_version: String,
    /// Front-end ASIC namespaces. Empty on single-ASIC devices.
    #[serde(default)]
    pub frontend_namespaces: Vec<String>,
}

impl Default for DutFacts {
    fn default() -> Self {
        Self {
            hostname: "dut".to_string(),
            asic_type: AsicFamily::Broadcom,
            platform_asic: None,
            router_mac: MacAddress::ZERO,
            os_version: String::new(),
            frontend_namespaces: Vec::new(),
        }
    }
}

impl DutFacts {
    pub fn is_multi_asic(&self) -> bool {
        self.frontend_namespaces.len() > 1
    }

    /// Number of forwarding namespaces; at least one.
    pub fn namespace_count(&self) -> usize {
        self.frontend_namespaces.len().max(1)
    }

    /// Namespaces to address per-ASIC commands to. A single-ASIC device has
    /// one unnamed namespace.
    pub fn namespaces(&self) -> Vec<Option<String>> {
        if self.frontend_namespaces.is_empty() {
            vec![None]
        } else {
            self.frontend_namespaces.iter().cloned().map(Some).collect()
        }
    }

    pub fn platform_quirks(&self) -> PlatformQuirks {
        PlatformQuirks::lookup(self.asic_type.clone(), self.namespace_count())
    }

    /// True when the OS version names `release`, e.g. `201911`.
    pub fn is_release(&self, release: &str) -> bool {
        self.os_version.contains(release)
    }
}

/// Command execution and file handling on the device under test.
///
/// Implementations decide how the device is reached; every call completes
/// before the next one is issued.
#[async_trait]
pub trait DutHost: Send + Sync {
    /// Runs a shell command and returns its output whatever the exit code.
    async fn run(&self, command: &str) -> EverflowResult<CommandOutput>;

    async fn facts(&self) -> EverflowResult<DutFacts>;

    /// Renders the template at `src` (a path on the controlling host) with
    /// `vars` into `dest` on the device.
    async fn template(
        &self,
        src: &Path,
        vars: &serde_json::Value,
        dest: &Path,
    ) -> EverflowResult<()>;

    /// Copies `src` from the controlling host to `dest` on the device.
    async fn copy(&self, src: &Path, dest: &Path) -> EverflowResult<()>;

    /// Runs a command and fails on a non-zero exit code.
    async fn command(&self, command: &str) -> EverflowResult<CommandOutput> {
        self.run(command).await?.check(command)
    }
}
