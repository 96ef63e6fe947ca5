//! Error types for Everflow verification.
//!
//! Every fallible operation in the workspace returns [`EverflowResult`].
//! Packet-level failures seen while checking received traffic are grouped
//! under [`VerificationError`].

use sonic_everflow_packet::PacketError;
use sonic_everflow_types::{ParseError, Stage};
use std::io;
use thiserror::Error;

/// Result type alias for Everflow operations.
pub type EverflowResult<T> = Result<T, EverflowError>;

/// A mirrored packet did not show up as expected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VerificationError {
    /// No matching frame arrived on any of the monitored ports.
    #[error("expected packet not received on any of ports {ports:?}: {expected}")]
    PacketNotReceived {
        ports: Vec<u32>,
        /// Summary of the expected packet.
        expected: String,
    },

    /// A matching frame arrived where none was allowed.
    #[error("unexpected packet received on port {port}: {summary}")]
    UnexpectedPacket { port: u32, summary: String },

    /// Received frame cannot carry the mirrored payload.
    #[error("received frame of {len} bytes is shorter than the required {min}")]
    TruncatedFrame { len: usize, min: usize },

    /// The encapsulated payload differs from the packet that was sent.
    #[error("mirrored payload mismatch:\n  expected: {expected}\n  received: {received}")]
    PayloadMismatch { expected: String, received: String },
}

/// Errors that can occur while configuring the DUT or verifying mirroring.
#[derive(Debug, Error)]
pub enum EverflowError {
    /// A port, session, table group or role could not be found.
    #[error("{what} not found: {key}")]
    NotFound { what: String, key: String },

    #[error(transparent)]
    Verification(#[from] VerificationError),

    /// Topology kind without a port classification.
    #[error("unsupported topology: {0}")]
    UnsupportedTopology(String),

    /// The DUT cannot mirror with this ACL stage and mirror type.
    #[error("{mirror_type} mirroring on the {acl_stage} ACL stage is not supported")]
    UnsupportedCombination { acl_stage: Stage, mirror_type: Stage },

    #[error("unsupported config method: {0}")]
    UnsupportedConfigMethod(String),

    /// Command returned a non-zero exit code.
    #[error("command failed: '{command}' (exit code {exit_code}): {output}")]
    CommandFailed {
        command: String,
        exit_code: i32,
        /// Combined stdout/stderr output.
        output: String,
    },

    /// Command could not be spawned.
    #[error("failed to execute command '{command}': {source}")]
    ShellExec {
        command: String,
        #[source]
        source: io::Error,
    },

    #[error("invalid configuration for {field}: {message}")]
    InvalidConfig { field: String, message: String },

    /// Device output or a data file could not be interpreted.
    #[error("failed to parse {what}: {message}")]
    Parse { what: String, message: String },

    #[error(transparent)]
    Value(#[from] ParseError),

    /// A Jinja2 template failed to compile or render.
    #[error("template error: {0}")]
    Template(#[from] minijinja::Error),

    #[error(transparent)]
    Packet(#[from] PacketError),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl EverflowError {
    pub fn not_found(what: impl Into<String>, key: impl Into<String>) -> Self {
        Self::NotFound {
            what: what.into(),
            key: key.into(),
        }
    }

    pub fn invalid_config(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidConfig {
            field: field.into(),
            message: message.into(),
        }
    }

    pub fn parse(what: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Parse {
            what: what.into(),
            message: message.into(),
        }
    }

    /// Returns true if the error means the test should be skipped rather than
    /// failed.
    pub fn is_unsupported(&self) -> bool {
        matches!(
            self,
            EverflowError::UnsupportedTopology(_)
                | EverflowError::UnsupportedCombination { .. }
                | EverflowError::UnsupportedConfigMethod(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_display() {
        let err = EverflowError::not_found("monitor port", "Ethernet4");
        assert_eq!(err.to_string(), "monitor port not found: Ethernet4");
    }

    #[test]
    fn test_verification_display() {
        let err: EverflowError = VerificationError::PacketNotReceived {
            ports: vec![1, 2],
            expected: "GRE".to_string(),
        }
        .into();
        assert!(err.to_string().contains("[1, 2]"));
    }

    #[test]
    fn test_unsupported_combination() {
        let err = EverflowError::UnsupportedCombination {
            acl_stage: Stage::Egress,
            mirror_type: Stage::Ingress,
        };
        assert_eq!(
            err.to_string(),
            "ingress mirroring on the egress ACL stage is not supported"
        );
        assert!(err.is_unsupported());
        assert!(!EverflowError::not_found("x", "y").is_unsupported());
    }

    #[test]
    fn test_command_failed() {
        let err = EverflowError::CommandFailed {
            command: "config mirror_session add s 1.1.1.1 2.2.2.2 8 4 0x88be".to_string(),
            exit_code: 2,
            output: "Error: session exists".to_string(),
        };
        assert!(err.to_string().contains("exit code 2"));
    }
}
