//! Device configuration commands.
//!
//! Builders only produce command strings; fixtures in [`crate::scope`] run
//! them. All commands target the `config` CLI of a SONiC image.

use sonic_everflow_types::{MirrorSessionDescriptor, Stage};
use std::net::Ipv4Addr;
use std::path::Path;

use crate::shell::shellquote;

/// ACL table type used for Everflow tables.
pub const MIRROR_TABLE_TYPE: &str = "MIRROR";

/// Packets per second allowed by the test policer.
pub const DEFAULT_POLICER_RATE: u32 = 100;

pub const BGP_SHUTDOWN: &str = "sudo config bgp shutdown all";
pub const BGP_STARTUP: &str = "sudo config bgp startup all";
pub const CLEAR_ARP: &str = "sonic-clear arp";
pub const SHOW_MIRROR_SESSION: &str = "show mirror_session";

/// `config mirror_session add`, optionally with a policer attached.
pub fn mirror_session_add(session: &MirrorSessionDescriptor, policer: Option<&str>) -> String {
    let mut command = format!(
        "config mirror_session add {} {} {} {} {} {}",
        session.name(),
        session.src_ip(),
        session.dst_ip(),
        session.dscp(),
        session.ttl(),
        session.gre_protocol()
    );
    if let Some(policer) = policer {
        command.push_str(&format!(" --policer {}", policer));
    }
    command
}

pub fn mirror_session_remove(session_name: &str) -> String {
    format!("config mirror_session remove {}", session_name)
}

fn sonic_db_cli(namespace: Option<&str>) -> String {
    match namespace {
        Some(ns) => format!("sonic-db-cli -n {}", ns),
        None => "sonic-db-cli".to_string(),
    }
}

/// Creates a single-rate policer in CONFIG_DB of one namespace.
pub fn policer_add(namespace: Option<&str>, policer: &str, rate: u32) -> String {
    format!(
        "{} CONFIG_DB hmset {} meter_type packets mode sr_tcm cir {} cbs {} red_packet_action drop",
        sonic_db_cli(namespace),
        shellquote(&format!("POLICER|{}", policer)),
        rate,
        rate
    )
}

pub fn policer_remove(namespace: Option<&str>, policer: &str) -> String {
    format!(
        "{} CONFIG_DB del {}",
        sonic_db_cli(namespace),
        shellquote(&format!("POLICER|{}", policer))
    )
}

/// `config acl add table`. The stage flag is only passed for egress tables;
/// ingress is the CLI default.
pub fn acl_table_add(table: &str, table_type: &str, stage: Stage, bind_ports: &[String]) -> String {
    let mut command = format!("config acl add table {} {}", table, table_type);
    if stage == Stage::Egress {
        command.push_str(&format!(" --stage {}", stage));
    }
    if !bind_ports.is_empty() {
        command.push_str(&format!(" -p {}", bind_ports.join(",")));
    }
    command
}

pub fn acl_table_remove(table: &str) -> String {
    format!("config acl remove table {}", table)
}

/// `acl-loader update full` for a rendered rule file. The mirror stage flag
/// is only passed for egress mirroring.
pub fn acl_rules_load(rule_file: &Path, table: &str, session_name: &str, mirror_type: Stage) -> String {
    let mut command = format!(
        "acl-loader update full {} --table_name {} --session_name {}",
        rule_file.display(),
        table,
        session_name
    );
    if mirror_type == Stage::Egress {
        command.push_str(&format!(" --mirror_stage {}", mirror_type));
    }
    command
}

pub fn acl_rules_remove(rule_file: &Path, table: &str) -> String {
    format!("acl-loader update full {} --table_name {}", rule_file.display(), table)
}

pub fn mkdir(dir: &Path) -> String {
    format!("mkdir -p {}", dir.display())
}

pub fn remove_dir(dir: &Path) -> String {
    format!("rm -rf {}", dir.display())
}

/// A static route through `vtysh`, addressed to one ASIC on multi-ASIC
/// devices.
pub fn route(add: bool, prefix: &str, nexthop: Ipv4Addr, namespace: Option<&str>) -> String {
    let vtysh = match namespace.and_then(asic_index) {
        Some(index) => format!("vtysh -n {}", index),
        None => "vtysh".to_string(),
    };
    format!(
        "{} -c \"configure terminal\" -c \"{}ip route {} {}\"",
        vtysh,
        if add { "" } else { "no " },
        prefix,
        nexthop
    )
}

/// `asic3` → `3`.
fn asic_index(namespace: &str) -> Option<&str> {
    namespace
        .strip_prefix("asic")
        .filter(|index| !index.is_empty() && index.chars().all(|c| c.is_ascii_digit()))
}

pub fn ping(ip: Ipv4Addr) -> String {
    format!("ping -c 1 {}", ip)
}
