//! Shell command execution and the local [`DutHost`] implementation.
//!
//! Commands run through `/bin/sh -c`, so callers quote untrusted arguments
//! with [`shellquote`].

use async_trait::async_trait;
use minijinja::{Environment, UndefinedBehavior};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::Command;

use crate::dut::{DutFacts, DutHost};
use crate::error::{EverflowError, EverflowResult};

/// Characters that need escaping inside shell double quotes.
static SHELL_ESCAPE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"([$`"\\\n])"#).expect("Invalid regex pattern"));

/// Quotes a string for safe use in shell commands.
///
/// # Example
///
/// ```
/// use sonic_everflow_common::shell::shellquote;
///
/// assert_eq!(shellquote("POLICER|p1"), "\"POLICER|p1\"");
/// assert_eq!(shellquote("with$var"), "\"with\\$var\"");
/// ```
pub fn shellquote(s: &str) -> String {
    let escaped = SHELL_ESCAPE_RE.replace_all(s, r"\$1");
    format!("\"{}\"", escaped)
}

/// Result of running a command on the DUT.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    /// 0 on success; -1 when the process was killed by a signal.
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    /// Successful output with the given stdout.
    pub fn ok(stdout: impl Into<String>) -> Self {
        Self {
            exit_code: 0,
            stdout: stdout.into(),
            stderr: String::new(),
        }
    }

    pub fn success(&self) -> bool {
        self.exit_code == 0
    }

    pub fn stdout_lines(&self) -> Vec<&str> {
        self.stdout.lines().collect()
    }

    /// Combined stdout and stderr for error messages.
    pub fn combined_output(&self) -> String {
        if self.stderr.is_empty() {
            self.stdout.clone()
        } else if self.stdout.is_empty() {
            self.stderr.clone()
        } else {
            format!("{}\n{}", self.stdout, self.stderr)
        }
    }

    /// Converts a non-zero exit into [`EverflowError::CommandFailed`].
    pub fn check(self, command: &str) -> EverflowResult<Self> {
        if self.success() {
            Ok(self)
        } else {
            Err(EverflowError::CommandFailed {
                command: command.to_string(),
                exit_code: self.exit_code,
                output: self.combined_output(),
            })
        }
    }
}

/// Runs `cmd` through `/bin/sh -c`.
///
/// Trailing whitespace is stripped from both streams; leading whitespace is
/// kept because column-aligned output depends on it.
pub async fn exec(cmd: &str) -> EverflowResult<CommandOutput> {
    tracing::debug!(command = %cmd, "Executing shell command");

    let output = Command::new("/bin/sh")
        .arg("-c")
        .arg(cmd)
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .output()
        .await
        .map_err(|e| EverflowError::ShellExec {
            command: cmd.to_string(),
            source: e,
        })?;

    let result = CommandOutput {
        exit_code: output.status.code().unwrap_or(-1),
        stdout: String::from_utf8_lossy(&output.stdout).trim_end().to_string(),
        stderr: String::from_utf8_lossy(&output.stderr).trim_end().to_string(),
    };

    if result.success() {
        tracing::trace!(command = %cmd, "Command succeeded");
    } else {
        tracing::warn!(
            command = %cmd,
            exit_code = result.exit_code,
            stderr = %result.stderr,
            "Command failed"
        );
    }

    Ok(result)
}

/// Renders a Jinja2 template with `vars` as its context.
///
/// Block tags swallow the newline that follows them and the file's trailing
/// newline is kept, so loops over rule lists render the way the DUT's own
/// tooling does. Referencing an undefined variable is an error.
pub fn render_template(source: &str, vars: &serde_json::Value) -> EverflowResult<String> {
    let mut env = Environment::new();
    env.set_undefined_behavior(UndefinedBehavior::Strict);
    env.set_trim_blocks(true);
    env.set_keep_trailing_newline(true);
    Ok(env.render_str(source, vars)?)
}

/// Release information file present on every SONiC image.
const SONIC_VERSION_FILE: &str = "/etc/sonic/sonic_version.yml";

#[derive(Debug, Deserialize)]
struct SonicVersion {
    build_version: String,
    asic_type: String,
}

/// A [`DutHost`] that runs commands on the local machine.
///
/// Used when the tooling runs on the switch itself.
#[derive(Debug, Clone)]
pub struct LocalShell {
    facts: Option<DutFacts>,
}

impl LocalShell {
    /// Creates a shell that discovers facts from the running system.
    pub fn new() -> Self {
        Self { facts: None }
    }

    /// Creates a shell with fixed facts.
    pub fn with_facts(facts: DutFacts) -> Self {
        Self { facts: Some(facts) }
    }

    async fn discover(&self) -> EverflowResult<DutFacts> {
        let version: SonicVersion =
            serde_yaml::from_str(&tokio::fs::read_to_string(SONIC_VERSION_FILE).await?)?;

        let hostname = exec("hostname").await?.check("hostname")?.stdout;

        let mac_cmd = "sonic-cfggen -d -v DEVICE_METADATA.localhost.mac";
        let router_mac = exec(mac_cmd).await?.check(mac_cmd)?;
        let router_mac = router_mac
            .stdout
            .trim()
            .parse()
            .map_err(|e| EverflowError::parse("router MAC", format!("{}", e)))?;

        let platform_cmd = "sonic-cfggen -d -v DEVICE_METADATA.localhost.platform";
        let platform = exec(platform_cmd).await?.check(platform_cmd)?.stdout;
        let platform_asic = tokio::fs::read_to_string(
            PathBuf::from("/usr/share/sonic/device").join(platform.trim()).join("platform_asic"),
        )
        .await
        .ok()
        .map(|s| s.trim().to_string());

        let netns = exec("ip netns list").await?;
        let frontend_namespaces = netns
            .stdout_lines()
            .into_iter()
            .filter_map(|line| line.split_whitespace().next())
            .filter(|ns| ns.starts_with("asic"))
            .map(str::to_string)
            .collect();

        Ok(DutFacts {
            hostname: hostname.trim().to_string(),
            asic_type: version.asic_type.as_str().into(),
            platform_asic,
            router_mac,
            os_version: version.build_version,
            frontend_namespaces,
        })
    }
}

impl Default for LocalShell {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DutHost for LocalShell {
    async fn run(&self, command: &str) -> EverflowResult<CommandOutput> {
        exec(command).await
    }

    async fn facts(&self) -> EverflowResult<DutFacts> {
        match &self.facts {
            Some(facts) => Ok(facts.clone()),
            None => self.discover().await,
        }
    }

    async fn template(
        &self,
        src: &Path,
        vars: &serde_json::Value,
        dest: &Path,
    ) -> EverflowResult<()> {
        let source = tokio::fs::read_to_string(src).await?;
        let rendered = render_template(&source, vars)?;
        tracing::debug!(src = %src.display(), dest = %dest.display(), "Rendered template");
        tokio::fs::write(dest, rendered).await?;
        Ok(())
    }

    async fn copy(&self, src: &Path, dest: &Path) -> EverflowResult<()> {
        tokio::fs::copy(src, dest).await?;
        Ok(())
    }
}
