//! Configuration file support for Everflow verification runs.
//!
//! Loads and validates settings from a TOML file. Every field has a default,
//! so an absent file or an empty table yields the stock behaviour.

use serde::{Deserialize, Serialize};
use sonic_everflow_types::SessionDefaults;
use std::fmt;
use std::fs;
use std::net::Ipv4Addr;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use crate::error::{EverflowError, EverflowResult};

/// Default configuration file location.
pub const DEFAULT_CONFIG_PATH: &str = "/etc/sonic/everflow.toml";

/// Delays that let device state settle and bounds on frame waits.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimingConfig {
    /// Wait after BGP shutdown or startup.
    #[serde(default = "default_bgp_settle")]
    pub bgp_settle_secs: u64,

    /// Wait after the ARP responder starts.
    #[serde(default = "default_arp_settle")]
    pub arp_settle_secs: u64,

    /// Wait after ACL rules are loaded.
    #[serde(default = "default_acl_rule_settle")]
    pub acl_rule_settle_secs: u64,

    /// Pause between sending a packet and polling for its mirror.
    #[serde(default = "default_stability_buffer")]
    pub stability_buffer_ms: u64,

    #[serde(default = "default_receive_timeout")]
    pub receive_timeout_ms: u64,

    /// How long a port must stay quiet for a negative check to pass.
    #[serde(default = "default_negative_timeout")]
    pub negative_timeout_ms: u64,
}

/// Filesystem locations on the DUT, the PTF host and the local checkout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PathsConfig {
    #[serde(default = "default_dut_run_dir")]
    pub dut_run_dir: PathBuf,

    /// Directory holding the ACL rule YAML files.
    #[serde(default = "default_rule_dir")]
    pub rule_dir: PathBuf,

    #[serde(default = "default_template_dir")]
    pub template_dir: PathBuf,

    /// ARP responder configuration written on the PTF host.
    #[serde(default = "default_arp_responder_conf")]
    pub arp_responder_conf: PathBuf,
}

/// Parameters of the mirror sessions a run creates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionConfig {
    #[serde(default = "default_src_ip")]
    pub src_ip: Ipv4Addr,

    #[serde(default = "default_dst_ip")]
    pub dst_ip: Ipv4Addr,

    #[serde(default = "default_dscp")]
    pub dscp: u8,

    #[serde(default = "default_ttl")]
    pub ttl: u8,

    #[serde(default = "default_prefix_lens")]
    pub prefix_lens: Vec<u8>,
}

/// How device configuration is pushed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConfigMethod {
    /// `config` CLI commands.
    #[default]
    Cli,
    /// Configlet files. Recognised but not implemented.
    Configlet,
}

impl ConfigMethod {
    pub const fn as_str(&self) -> &'static str {
        match self {
            ConfigMethod::Cli => "cli",
            ConfigMethod::Configlet => "configlet",
        }
    }

    /// Fails for methods without command builders.
    pub fn ensure_supported(&self) -> EverflowResult<()> {
        match self {
            ConfigMethod::Cli => Ok(()),
            ConfigMethod::Configlet => Err(EverflowError::UnsupportedConfigMethod(
                self.as_str().to_string(),
            )),
        }
    }
}

impl fmt::Display for ConfigMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ConfigMethod {
    type Err = EverflowError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "cli" => Ok(ConfigMethod::Cli),
            "configlet" => Ok(ConfigMethod::Configlet),
            _ => Err(EverflowError::UnsupportedConfigMethod(s.to_string())),
        }
    }
}

/// Complete Everflow verification configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EverflowConfig {
    #[serde(default)]
    pub config_method: ConfigMethod,

    #[serde(default)]
    pub timing: TimingConfig,

    #[serde(default)]
    pub paths: PathsConfig,

    #[serde(default)]
    pub session: SessionConfig,
}

fn default_bgp_settle() -> u64 {
    60
}

fn default_arp_settle() -> u64 {
    10
}

fn default_acl_rule_settle() -> u64 {
    2
}

fn default_stability_buffer() -> u64 {
    50
}

fn default_receive_timeout() -> u64 {
    2000
}

fn default_negative_timeout() -> u64 {
    100
}

fn default_dut_run_dir() -> PathBuf {
    PathBuf::from("/tmp/everflow")
}

fn default_rule_dir() -> PathBuf {
    PathBuf::from("everflow/files")
}

fn default_template_dir() -> PathBuf {
    PathBuf::from("everflow/templates")
}

fn default_arp_responder_conf() -> PathBuf {
    PathBuf::from("/tmp/arp_responder.json")
}

fn default_src_ip() -> Ipv4Addr {
    SessionDefaults::default().src_ip
}

fn default_dst_ip() -> Ipv4Addr {
    SessionDefaults::default().dst_ip
}

fn default_dscp() -> u8 {
    SessionDefaults::default().dscp
}

fn default_ttl() -> u8 {
    SessionDefaults::default().ttl
}

fn default_prefix_lens() -> Vec<u8> {
    SessionDefaults::default().prefix_lens
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            bgp_settle_secs: default_bgp_settle(),
            arp_settle_secs: default_arp_settle(),
            acl_rule_settle_secs: default_acl_rule_settle(),
            stability_buffer_ms: default_stability_buffer(),
            receive_timeout_ms: default_receive_timeout(),
            negative_timeout_ms: default_negative_timeout(),
        }
    }
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            dut_run_dir: default_dut_run_dir(),
            rule_dir: default_rule_dir(),
            template_dir: default_template_dir(),
            arp_responder_conf: default_arp_responder_conf(),
        }
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            src_ip: default_src_ip(),
            dst_ip: default_dst_ip(),
            dscp: default_dscp(),
            ttl: default_ttl(),
            prefix_lens: default_prefix_lens(),
        }
    }
}

impl TimingConfig {
    /// Zero delays and short frame waits, for in-memory test doubles.
    pub fn immediate() -> Self {
        Self {
            bgp_settle_secs: 0,
            arp_settle_secs: 0,
            acl_rule_settle_secs: 0,
            stability_buffer_ms: 0,
            receive_timeout_ms: 10,
            negative_timeout_ms: 10,
        }
    }
}

impl EverflowConfig {
    /// Load configuration from file, falling back to defaults if not found.
    pub fn load_or_default(path: impl AsRef<Path>) -> EverflowResult<Self> {
        let path = path.as_ref();

        match fs::read_to_string(path) {
            Ok(content) => {
                let config: Self = toml::from_str(&content).map_err(|e| {
                    EverflowError::parse(format!("config file {}", path.display()), e.to_string())
                })?;
                config.validate()?;
                Ok(config)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!(path = %path.display(), "Config file not found, using defaults");
                Ok(Self::default())
            }
            Err(e) => Err(EverflowError::Io(e)),
        }
    }

    /// Load from the default location or defaults.
    pub fn load() -> EverflowResult<Self> {
        Self::load_or_default(DEFAULT_CONFIG_PATH)
    }

    pub fn save(&self, path: impl AsRef<Path>) -> EverflowResult<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| EverflowError::invalid_config("config", e.to_string()))?;
        fs::write(path, content)?;
        Ok(())
    }

    pub fn bgp_settle(&self) -> Duration {
        Duration::from_secs(self.timing.bgp_settle_secs)
    }

    pub fn arp_settle(&self) -> Duration {
        Duration::from_secs(self.timing.arp_settle_secs)
    }

    pub fn acl_rule_settle(&self) -> Duration {
        Duration::from_secs(self.timing.acl_rule_settle_secs)
    }

    pub fn stability_buffer(&self) -> Duration {
        Duration::from_millis(self.timing.stability_buffer_ms)
    }

    pub fn receive_timeout(&self) -> Duration {
        Duration::from_millis(self.timing.receive_timeout_ms)
    }

    pub fn negative_timeout(&self) -> Duration {
        Duration::from_millis(self.timing.negative_timeout_ms)
    }

    /// Session parameters in the form the session descriptor expects.
    pub fn session_defaults(&self) -> SessionDefaults {
        SessionDefaults {
            src_ip: self.session.src_ip,
            dst_ip: self.session.dst_ip,
            dscp: self.session.dscp,
            ttl: self.session.ttl,
            prefix_lens: self.session.prefix_lens.clone(),
        }
    }

    pub fn validate(&self) -> EverflowResult<()> {
        if self.session.dscp > 63 {
            return Err(EverflowError::invalid_config(
                "session.dscp",
                format!("{} exceeds 63", self.session.dscp),
            ));
        }

        if self.session.ttl == 0 {
            return Err(EverflowError::invalid_config("session.ttl", "must be at least 1"));
        }

        if let Some(len) = self.session.prefix_lens.iter().find(|len| **len > 32) {
            return Err(EverflowError::invalid_config(
                "session.prefix_lens",
                format!("/{} is not an IPv4 prefix length", len),
            ));
        }

        if self.paths.dut_run_dir.as_os_str().is_empty() {
            return Err(EverflowError::invalid_config("paths.dut_run_dir", "must not be empty"));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = EverflowConfig::default();
        assert_eq!(config.config_method, ConfigMethod::Cli);
        assert_eq!(config.paths.dut_run_dir, PathBuf::from("/tmp/everflow"));
        assert_eq!(config.session.src_ip, Ipv4Addr::new(1, 1, 1, 1));
        assert_eq!(config.session.prefix_lens, vec![24, 32]);
    }

    #[test]
    fn test_duration_getters() {
        let config = EverflowConfig::default();
        assert_eq!(config.bgp_settle(), Duration::from_secs(60));
        assert_eq!(config.arp_settle(), Duration::from_secs(10));
        assert_eq!(config.acl_rule_settle(), Duration::from_secs(2));
        assert_eq!(config.stability_buffer(), Duration::from_millis(50));
        assert_eq!(config.negative_timeout(), Duration::from_millis(100));
    }

    #[test]
    fn test_toml_deserialization() {
        let toml_str = r#"
config_method = "configlet"

[timing]
bgp_settle_secs = 5

[session]
dscp = 16
"#;
        let config: EverflowConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.config_method, ConfigMethod::Configlet);
        assert_eq!(config.timing.bgp_settle_secs, 5);
        assert_eq!(config.session.dscp, 16);
        // Unspecified values keep their defaults
        assert_eq!(config.timing.arp_settle_secs, 10);
        assert_eq!(config.session.ttl, 4);
    }

    #[test]
    fn test_validate_rejects_bad_session() {
        let mut config = EverflowConfig::default();
        config.session.dscp = 64;
        assert!(config.validate().is_err());

        let mut config = EverflowConfig::default();
        config.session.ttl = 0;
        assert!(config.validate().is_err());

        let mut config = EverflowConfig::default();
        config.session.prefix_lens = vec![24, 33];
        assert!(config.validate().is_err());

        let mut config = EverflowConfig::default();
        config.paths.dut_run_dir = PathBuf::new();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[paths]\ndut_run_dir = \"/var/tmp/everflow\"").unwrap();

        let config = EverflowConfig::load_or_default(file.path()).unwrap();
        assert_eq!(config.paths.dut_run_dir, PathBuf::from("/var/tmp/everflow"));
    }

    #[test]
    fn test_load_invalid_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[session]\nttl = 0").unwrap();
        assert!(matches!(
            EverflowConfig::load_or_default(file.path()),
            Err(EverflowError::InvalidConfig { .. })
        ));
    }

    #[test]
    fn test_load_nonexistent_file_defaults() {
        let config = EverflowConfig::load_or_default("/nonexistent/everflow.toml").unwrap();
        assert_eq!(config, EverflowConfig::default());
    }

    #[test]
    fn test_save_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("everflow.toml");
        let mut config = EverflowConfig::default();
        config.timing.receive_timeout_ms = 500;
        config.save(&path).unwrap();

        assert_eq!(EverflowConfig::load_or_default(&path).unwrap(), config);
    }

    #[test]
    fn test_config_method() {
        assert!(ConfigMethod::Cli.ensure_supported().is_ok());
        assert!(matches!(
            ConfigMethod::Configlet.ensure_supported(),
            Err(EverflowError::UnsupportedConfigMethod(m)) if m == "configlet"
        ));
        assert_eq!("CLI".parse::<ConfigMethod>().unwrap(), ConfigMethod::Cli);
        assert!("netconf".parse::<ConfigMethod>().is_err());
    }

    #[test]
    fn test_session_defaults() {
        let config = EverflowConfig::default();
        assert_eq!(config.session_defaults(), SessionDefaults::default());
    }
}
