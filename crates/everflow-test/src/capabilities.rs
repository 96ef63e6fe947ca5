//! Which mirror groupings the DUT can run.

use serde::{Deserialize, Serialize};
use sonic_everflow_common::{DutFacts, EverflowError, EverflowResult};
use sonic_everflow_types::{AsicFamily, MirrorGrouping, Stage};
use std::collections::BTreeMap;
use std::path::Path;
use tracing::{debug, info};

pub const MIRROR_INGRESS_ACTION: &str = "MIRROR_INGRESS_ACTION";
pub const MIRROR_EGRESS_ACTION: &str = "MIRROR_EGRESS_ACTION";

/// Release without the ACL_ACTIONS table, limited to ingress mirroring on
/// ingress ACLs.
pub const LEGACY_ACL_RELEASE: &str = "201811";

/// Broadcom ASIC whose egress mirroring capability can be trusted.
pub const BROADCOM_DNX: &str = "broadcom-dnx";

/// ACL capabilities of one stage as published in STATE_DB.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AclStageCapability {
    /// Comma-separated action names.
    #[serde(default)]
    pub action_list: String,
}

impl AclStageCapability {
    fn has_action(&self, action: &str) -> bool {
        has_action(&self.action_list, action)
    }
}

/// Switch and ACL capability tables of the DUT.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapabilityFacts {
    /// `SWITCH_CAPABILITY|switch` fields.
    #[serde(default)]
    pub switch: BTreeMap<String, String>,
    /// `ACL_STAGE_CAPABILITY_TABLE` entries keyed by `INGRESS`/`EGRESS`.
    /// Empty on releases before 202111.
    #[serde(default)]
    pub acl: BTreeMap<String, AclStageCapability>,
}

impl CapabilityFacts {
    /// Reads facts from a YAML or JSON file.
    pub fn from_file(path: impl AsRef<Path>) -> EverflowResult<Self> {
        let content = std::fs::read_to_string(path)?;
        Ok(serde_yaml::from_str(&content)?)
    }

    fn switch_flag(&self, key: &str) -> bool {
        self.switch.get(key).is_some_and(|v| v == "true")
    }

    fn acl_action(&self, stage: Stage, action: &str) -> bool {
        let key = stage.as_str().to_ascii_uppercase();
        match self.acl.get(&key) {
            Some(capability) => capability.has_action(action),
            None => false,
        }
    }

    fn legacy_acl_action(&self, stage: Stage, action: &str) -> bool {
        let key = format!("ACL_ACTIONS|{}", stage.as_str().to_ascii_uppercase());
        self.switch
            .get(&key)
            .is_some_and(|actions| has_action(actions, action))
    }
}

fn has_action(action_list: &str, action: &str) -> bool {
    action_list.split(',').any(|a| a.trim() == action)
}

fn mirror_action(mirror_type: Stage) -> &'static str {
    match mirror_type {
        Stage::Ingress => MIRROR_INGRESS_ACTION,
        Stage::Egress => MIRROR_EGRESS_ACTION,
    }
}

/// Mirroring capabilities of a DUT.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MirrorSupport {
    pub mirror_v4: bool,
    pub mirror_v6: bool,
    pub ingress_mirror_on_ingress_acl: bool,
    pub ingress_mirror_on_egress_acl: bool,
    pub egress_mirror_on_ingress_acl: bool,
    pub egress_mirror_on_egress_acl: bool,
}

impl MirrorSupport {
    pub fn from_facts(capabilities: &CapabilityFacts, dut: &DutFacts) -> Self {
        let lookup: Box<dyn Fn(Stage, Stage) -> bool + '_> = if dut.is_release(LEGACY_ACL_RELEASE) {
            Box::new(|acl, mirror| acl == Stage::Ingress && mirror == Stage::Ingress)
        } else if !capabilities.acl.is_empty() {
            Box::new(|acl, mirror| capabilities.acl_action(acl, mirror_action(mirror)))
        } else {
            debug!("No ACL stage capabilities, falling back to switch ACL_ACTIONS");
            Box::new(|acl, mirror| capabilities.legacy_acl_action(acl, mirror_action(mirror)))
        };

        let mut support = Self {
            mirror_v4: capabilities.switch_flag("MIRROR"),
            mirror_v6: capabilities.switch_flag("MIRRORV6"),
            ingress_mirror_on_ingress_acl: lookup(Stage::Ingress, Stage::Ingress),
            ingress_mirror_on_egress_acl: lookup(Stage::Egress, Stage::Ingress),
            egress_mirror_on_ingress_acl: lookup(Stage::Ingress, Stage::Egress),
            egress_mirror_on_egress_acl: lookup(Stage::Egress, Stage::Egress),
        };

        // XGS SAI over-reports egress mirroring.
        if dut.asic_type == AsicFamily::Broadcom && dut.platform_asic.as_deref() != Some(BROADCOM_DNX) {
            support.egress_mirror_on_ingress_acl = false;
            support.egress_mirror_on_egress_acl = false;
        }

        info!(?support, "Mirror capabilities");
        support
    }

    pub fn supports(&self, grouping: MirrorGrouping) -> bool {
        match (grouping.acl_stage(), grouping.mirror_type()) {
            (Stage::Ingress, Stage::Ingress) => self.ingress_mirror_on_ingress_acl,
            (Stage::Egress, Stage::Ingress) => self.ingress_mirror_on_egress_acl,
            (Stage::Ingress, Stage::Egress) => self.egress_mirror_on_ingress_acl,
            (Stage::Egress, Stage::Egress) => self.egress_mirror_on_egress_acl,
        }
    }

    /// Fails with [`EverflowError::UnsupportedCombination`] when the DUT
    /// cannot run `grouping`.
    pub fn ensure(&self, grouping: MirrorGrouping) -> EverflowResult<()> {
        if self.supports(grouping) {
            Ok(())
        } else {
            Err(EverflowError::UnsupportedCombination {
                acl_stage: grouping.acl_stage(),
                mirror_type: grouping.mirror_type(),
            })
        }
    }

    /// Groupings the DUT can run, in suite order.
    pub fn supported_groupings(&self) -> Vec<MirrorGrouping> {
        MirrorGrouping::ALL
            .into_iter()
            .filter(|g| self.supports(*g))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn acl_facts(ingress: &str, egress: &str) -> CapabilityFacts {
        CapabilityFacts {
            switch: [("MIRROR", "true"), ("MIRRORV6", "false")]
                .into_iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            acl: [
                ("INGRESS", ingress),
                ("EGRESS", egress),
            ]
            .into_iter()
            .map(|(k, v)| {
                (
                    k.to_string(),
                    AclStageCapability {
                        action_list: v.to_string(),
                    },
                )
            })
            .collect(),
        }
    }

    fn mellanox() -> DutFacts {
        DutFacts {
            asic_type: AsicFamily::Mellanox,
            os_version: "SONiC.202205.1".to_string(),
            ..DutFacts::default()
        }
    }

    #[test]
    fn test_acl_stage_capabilities() {
        let facts = acl_facts(
            "PACKET_ACTION,MIRROR_INGRESS_ACTION,MIRROR_EGRESS_ACTION",
            "PACKET_ACTION,MIRROR_EGRESS_ACTION",
        );
        let support = MirrorSupport::from_facts(&facts, &mellanox());

        assert!(support.mirror_v4);
        assert!(!support.mirror_v6);
        assert_eq!(
            support.supported_groupings(),
            vec![
                MirrorGrouping::new(Stage::Ingress, Stage::Ingress),
                MirrorGrouping::new(Stage::Ingress, Stage::Egress),
                MirrorGrouping::new(Stage::Egress, Stage::Egress),
            ]
        );
    }

    #[test]
    fn test_legacy_switch_capabilities() {
        let mut facts = CapabilityFacts::default();
        facts.switch.insert(
            "ACL_ACTIONS|INGRESS".to_string(),
            "PACKET_ACTION,MIRROR_INGRESS_ACTION".to_string(),
        );
        facts
            .switch
            .insert("ACL_ACTIONS|EGRESS".to_string(), "PACKET_ACTION".to_string());

        let support = MirrorSupport::from_facts(&facts, &mellanox());
        assert!(support.ingress_mirror_on_ingress_acl);
        assert!(!support.ingress_mirror_on_egress_acl);
        assert!(!support.mirror_v4);
    }

    #[test]
    fn test_legacy_release_ingress_only() {
        let facts = acl_facts("MIRROR_EGRESS_ACTION", "MIRROR_EGRESS_ACTION");
        let dut = DutFacts {
            os_version: "SONiC.201811.3".to_string(),
            ..mellanox()
        };
        let support = MirrorSupport::from_facts(&facts, &dut);
        assert_eq!(
            support.supported_groupings(),
            vec![MirrorGrouping::new(Stage::Ingress, Stage::Ingress)]
        );
    }

    #[test]
    fn test_broadcom_egress_mirror_disabled() {
        let facts = acl_facts(
            "MIRROR_INGRESS_ACTION,MIRROR_EGRESS_ACTION",
            "MIRROR_INGRESS_ACTION,MIRROR_EGRESS_ACTION",
        );
        let xgs = DutFacts::default();
        let support = MirrorSupport::from_facts(&facts, &xgs);
        assert!(support.ingress_mirror_on_egress_acl);
        assert!(!support.egress_mirror_on_ingress_acl);
        assert!(!support.egress_mirror_on_egress_acl);

        let dnx = DutFacts {
            platform_asic: Some(BROADCOM_DNX.to_string()),
            ..DutFacts::default()
        };
        assert!(MirrorSupport::from_facts(&facts, &dnx).egress_mirror_on_egress_acl);
    }

    #[test]
    fn test_ensure_unsupported() {
        let support = MirrorSupport::from_facts(&acl_facts("MIRROR_INGRESS_ACTION", ""), &mellanox());
        let err = support
            .ensure(MirrorGrouping::new(Stage::Egress, Stage::Egress))
            .unwrap_err();
        assert!(err.is_unsupported());
        assert!(support
            .ensure(MirrorGrouping::new(Stage::Ingress, Stage::Ingress))
            .is_ok());
    }

    #[test]
    fn test_capability_facts_from_yaml() {
        let facts: CapabilityFacts = serde_yaml::from_str(
            r#"
switch: {MIRROR: "true", MIRRORV6: "true"}
acl:
  INGRESS: {action_list: "MIRROR_INGRESS_ACTION"}
"#,
        )
        .unwrap();
        assert!(facts.acl_action(Stage::Ingress, MIRROR_INGRESS_ACTION));
        assert!(!facts.acl_action(Stage::Egress, MIRROR_INGRESS_ACTION));
    }
}
