//! ACL stage and mirror type of a test grouping.

use crate::ParseError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A pipeline stage: where an ACL rule is evaluated, or which copy of a
/// packet is mirrored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    Ingress,
    Egress,
}

impl Stage {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Stage::Ingress => "ingress",
            Stage::Egress => "egress",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Stage {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "ingress" => Ok(Stage::Ingress),
            "egress" => Ok(Stage::Egress),
            _ => Err(ParseError::InvalidStage(s.to_string())),
        }
    }
}

/// The stage pair a set of Everflow test cases runs under.
///
/// Egress mirror types see the packet after forwarding rewrote it, so the
/// inner-payload comparison has to account for TTL and MAC changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MirrorGrouping {
    acl_stage: Stage,
    mirror_type: Stage,
}

impl MirrorGrouping {
    pub const fn new(acl_stage: Stage, mirror_type: Stage) -> Self {
        Self {
            acl_stage,
            mirror_type,
        }
    }

    /// Every stage pair, in the order test suites run them.
    pub const ALL: [MirrorGrouping; 4] = [
        MirrorGrouping::new(Stage::Ingress, Stage::Ingress),
        MirrorGrouping::new(Stage::Ingress, Stage::Egress),
        MirrorGrouping::new(Stage::Egress, Stage::Ingress),
        MirrorGrouping::new(Stage::Egress, Stage::Egress),
    ];

    pub const fn acl_stage(&self) -> Stage {
        self.acl_stage
    }

    pub const fn mirror_type(&self) -> Stage {
        self.mirror_type
    }

    /// ACL table the grouping's rules live in. The ingress table is assumed
    /// to exist on the device already.
    pub const fn table_name(&self) -> &'static str {
        match self.acl_stage {
            Stage::Ingress => "EVERFLOW",
            Stage::Egress => "EVERFLOW_EGRESS",
        }
    }
}

impl fmt::Display for MirrorGrouping {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ACL w/ {} mirroring", self.acl_stage, self.mirror_type)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_table_name() {
        assert_eq!(MirrorGrouping::new(Stage::Ingress, Stage::Egress).table_name(), "EVERFLOW");
        assert_eq!(MirrorGrouping::new(Stage::Egress, Stage::Ingress).table_name(), "EVERFLOW_EGRESS");
    }

    #[test]
    fn test_stage_parse() {
        assert_eq!("Ingress".parse::<Stage>(), Ok(Stage::Ingress));
        assert_eq!("egress".parse::<Stage>(), Ok(Stage::Egress));
        assert!("both".parse::<Stage>().is_err());
    }

    #[test]
    fn test_display() {
        let grouping = MirrorGrouping::new(Stage::Egress, Stage::Egress);
        assert_eq!(grouping.to_string(), "egress ACL w/ egress mirroring");
    }
}
