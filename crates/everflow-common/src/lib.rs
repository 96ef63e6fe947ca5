//! Device-side infrastructure for Everflow (ERSPAN) verification.
//!
//! - [`dut`]: the [`DutHost`] collaborator and the facts gathered from it
//! - [`shell`]: command execution with proper quoting, and [`LocalShell`]
//! - [`show`]: parser for column-aligned `show` tables
//! - [`monitor`]: monitor port resolution for a mirror session
//! - [`commands`]: mirror session, policer, ACL and route commands
//! - [`rules`]: ACL rule files
//! - [`scope`]: fixtures that configure the DUT for the duration of a test
//! - [`config`]: TOML configuration
//! - [`error`]: error types
//!
//! # Example
//!
//! ```ignore
//! use sonic_everflow_common::{get_monitor_port, EverflowResult, LocalShell};
//!
//! async fn monitor(ports: &BTreeMap<String, u32>) -> EverflowResult<u32> {
//!     let dut = LocalShell::new();
//!     get_monitor_port(&dut, "test_session_1", ports).await
//! }
//! ```

pub mod commands;
pub mod config;
pub mod dut;
pub mod error;
pub mod monitor;
pub mod rules;
pub mod scope;
pub mod shell;
pub mod show;

pub use config::{ConfigMethod, EverflowConfig};
pub use dut::{DutFacts, DutHost};
pub use error::{EverflowError, EverflowResult, VerificationError};
pub use monitor::{get_monitor_port, resolve_monitor_port};
pub use scope::{scoped, scoped_all, Fixture};
pub use shell::{CommandOutput, LocalShell};
pub use show::{parse_sessions, TableGroup, TableGroups, TableRecord, COLUMN_GAP};
