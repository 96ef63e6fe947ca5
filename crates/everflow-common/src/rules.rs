//! ACL rule files and the on-device files rendered from them.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::error::{EverflowError, EverflowResult};

/// IPv4 match rules.
pub const EVERFLOW_V4_RULES: &str = "ipv4_test_rules.yaml";

/// DSCP match rules.
pub const EVERFLOW_DSCP_RULES: &str = "dscp_test_rules.yaml";

/// Template rendered into [`EVERFLOW_RULE_CREATE_FILE`].
pub const EVERFLOW_RULE_CREATE_TEMPLATE: &str = "acl-erspan.json.j2";

/// Rendered rule file in the DUT run directory.
pub const EVERFLOW_RULE_CREATE_FILE: &str = "acl-erspan.json";

/// Static rule file that empties a table.
pub const EVERFLOW_RULE_DELETE_FILE: &str = "acl-remove.json";

/// Template variables for rendering a rule file into a table.
///
/// Rule contents are passed through to the template untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AclRulesConfig {
    pub acl_table_name: String,
    pub rules: serde_yaml::Value,
}

impl AclRulesConfig {
    /// Reads `rules_file` and binds its rules to `table_name`.
    pub fn load(table_name: &str, rules_file: impl AsRef<Path>) -> EverflowResult<Self> {
        let path = rules_file.as_ref();
        let content = fs::read_to_string(path).map_err(|e| {
            EverflowError::parse(format!("rule file {}", path.display()), e.to_string())
        })?;

        Ok(Self {
            acl_table_name: table_name.to_string(),
            rules: serde_yaml::from_str(&content)?,
        })
    }

    /// Number of top-level rule entries.
    pub fn rule_count(&self) -> usize {
        match &self.rules {
            serde_yaml::Value::Sequence(seq) => seq.len(),
            serde_yaml::Value::Mapping(map) => map.len(),
            serde_yaml::Value::Null => 0,
            _ => 1,
        }
    }

    /// The config as template variables.
    pub fn to_vars(&self) -> EverflowResult<serde_json::Value> {
        Ok(serde_json::to_value(self)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::io::Write;

    const RULES: &str = "\
- qualifiers:
    src_ip: 20.0.0.10/32
- qualifiers:
    dst_ip: 192.168.0.2/32
- qualifiers:
    l4_src_port: 4661
";

    #[test]
    fn test_load_rules() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(RULES.as_bytes()).unwrap();

        let config = AclRulesConfig::load("EVERFLOW", file.path()).unwrap();
        assert_eq!(config.acl_table_name, "EVERFLOW");
        assert_eq!(config.rule_count(), 3);

        let vars = config.to_vars().unwrap();
        assert_eq!(vars["acl_table_name"], "EVERFLOW");
        assert_eq!(vars["rules"][1]["qualifiers"]["dst_ip"], "192.168.0.2/32");
    }

    #[test]
    fn test_missing_rule_file() {
        assert!(matches!(
            AclRulesConfig::load("EVERFLOW", "/nonexistent/ipv4_test_rules.yaml"),
            Err(EverflowError::Parse { .. })
        ));
    }

    #[test]
    fn test_invalid_yaml() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"- [unterminated").unwrap();
        assert!(matches!(
            AclRulesConfig::load("EVERFLOW", file.path()),
            Err(EverflowError::Yaml(_))
        ));
    }
}
