//! Resolution of the port a mirror session currently sends to.

use std::collections::BTreeMap;
use tracing::{info, instrument};

use crate::commands;
use crate::dut::DutHost;
use crate::error::{EverflowError, EverflowResult};
use crate::show::{parse_sessions, TableGroups, ERSPAN_SESSIONS_GROUP};

/// Release whose `show mirror_session` omits the group title.
pub const UNTITLED_SESSIONS_RELEASE: &str = "201911";

/// Finds the PTF port id of the monitor port of `session_name`.
///
/// # Errors
///
/// [`EverflowError::NotFound`] when the ERSPAN group is missing, the session
/// has no row, or its monitor port is not in `port_index_map`.
pub fn resolve_monitor_port(
    sessions: &TableGroups,
    session_name: &str,
    port_index_map: &BTreeMap<String, u32>,
) -> EverflowResult<u32> {
    let group = sessions
        .get(ERSPAN_SESSIONS_GROUP)
        .ok_or_else(|| EverflowError::not_found("session group", ERSPAN_SESSIONS_GROUP))?;

    let record = group
        .find("Name", session_name)
        .ok_or_else(|| EverflowError::not_found("mirror session", session_name))?;

    let port = record.get("Monitor Port").unwrap_or_default();
    port_index_map
        .get(port)
        .copied()
        .ok_or_else(|| EverflowError::not_found("monitor port", port))
}

/// Reads `show mirror_session` from the DUT and resolves the monitor port of
/// `session_name`.
#[instrument(skip(dut, port_index_map))]
pub async fn get_monitor_port(
    dut: &dyn DutHost,
    session_name: &str,
    port_index_map: &BTreeMap<String, u32>,
) -> EverflowResult<u32> {
    let output = dut.command(commands::SHOW_MIRROR_SESSION).await?;
    info!("Running mirror session configuration:\n{}", output.stdout);

    if !output.stdout.contains(session_name) {
        return Err(EverflowError::not_found("mirror session", session_name));
    }

    let mut lines = output.stdout_lines();
    let facts = dut.facts().await?;
    if facts.is_release(UNTITLED_SESSIONS_RELEASE) {
        lines.insert(0, ERSPAN_SESSIONS_GROUP);
    }

    let sessions = parse_sessions(&lines);
    let port = resolve_monitor_port(&sessions, session_name, port_index_map)?;
    info!(port = port, "Selected monitor interface");
    Ok(port)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dut::DutFacts;
    use crate::shell::CommandOutput;
    use async_trait::async_trait;
    use std::path::Path;
    use tokio_test::{assert_err, assert_ok};

    const OUTPUT: &str = "\
ERSPAN Sessions
Name            Status    Monitor Port
--------------  --------  --------------
test_session_1  active    Ethernet4
";

    const OUTPUT_201911: &str = "\
Name            Status    Monitor Port
--------------  --------  --------------
test_session_1  active    Ethernet4
";

    fn port_map() -> BTreeMap<String, u32> {
        [("Ethernet0", 0), ("Ethernet4", 1), ("Ethernet8", 2)]
            .into_iter()
            .map(|(name, id)| (name.to_string(), id))
            .collect()
    }

    struct ShowOnly {
        stdout: &'static str,
        os_version: &'static str,
    }

    #[async_trait]
    impl DutHost for ShowOnly {
        async fn run(&self, _command: &str) -> EverflowResult<CommandOutput> {
            Ok(CommandOutput::ok(self.stdout))
        }

        async fn facts(&self) -> EverflowResult<DutFacts> {
            Ok(DutFacts {
                os_version: self.os_version.to_string(),
                ..DutFacts::default()
            })
        }

        async fn template(
            &self,
            _src: &Path,
            _vars: &serde_json::Value,
            _dest: &Path,
        ) -> EverflowResult<()> {
            Ok(())
        }

        async fn copy(&self, _src: &Path, _dest: &Path) -> EverflowResult<()> {
            Ok(())
        }
    }

    #[test]
    fn test_resolve_monitor_port() {
        let sessions = parse_sessions(&OUTPUT.lines().collect::<Vec<_>>());
        assert_eq!(
            resolve_monitor_port(&sessions, "test_session_1", &port_map()).unwrap(),
            1
        );
    }

    #[test]
    fn test_unknown_session() {
        let sessions = parse_sessions(&OUTPUT.lines().collect::<Vec<_>>());
        assert!(matches!(
            resolve_monitor_port(&sessions, "other", &port_map()),
            Err(EverflowError::NotFound { what, .. }) if what == "mirror session"
        ));
    }

    #[test]
    fn test_missing_group() {
        let sessions = parse_sessions(&OUTPUT_201911.lines().collect::<Vec<_>>());
        assert!(resolve_monitor_port(&sessions, "test_session_1", &port_map()).is_err());
    }

    #[test]
    fn test_unknown_monitor_port() {
        let sessions = parse_sessions(&OUTPUT.lines().collect::<Vec<_>>());
        let mut ports = port_map();
        ports.remove("Ethernet4");
        assert!(matches!(
            resolve_monitor_port(&sessions, "test_session_1", &ports),
            Err(EverflowError::NotFound { key, .. }) if key == "Ethernet4"
        ));
    }

    #[tokio::test]
    async fn test_get_monitor_port() {
        let dut = ShowOnly {
            stdout: OUTPUT,
            os_version: "SONiC.202205.1",
        };
        let port = assert_ok!(get_monitor_port(&dut, "test_session_1", &port_map()).await);
        assert_eq!(port, 1);
    }

    #[tokio::test]
    async fn test_get_monitor_port_201911() {
        let dut = ShowOnly {
            stdout: OUTPUT_201911,
            os_version: "SONiC.201911.99",
        };
        assert_eq!(get_monitor_port(&dut, "test_session_1", &port_map()).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_get_monitor_port_session_absent() {
        let dut = ShowOnly {
            stdout: OUTPUT,
            os_version: "SONiC.202205.1",
        };
        let err = assert_err!(get_monitor_port(&dut, "TEST_POLICER_SESSION", &port_map()).await);
        assert!(matches!(err, EverflowError::NotFound { .. }));
    }
}
