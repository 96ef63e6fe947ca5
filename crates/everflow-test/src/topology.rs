//! Classification of DUT ports by the role of their neighbors.
//!
//! Everflow tests send traffic between two neighbor roles of the testbed:
//! servers and T1 switches on a T0 testbed, T0 and T2 switches on a T1
//! testbed. [`classify`] picks one namespace per role, folds LAG members into
//! single test endpoints and derives the downstream and upstream
//! [`DirectionRecord`]s that tests send along.

use rand::Rng;
use serde::{Deserialize, Serialize};
use sonic_everflow_common::{EverflowError, EverflowResult};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::net::Ipv4Addr;
use std::path::Path;
use tracing::{debug, info};

/// Most logical endpoints collected per role.
pub const MAX_ENDPOINTS: usize = 4;

/// LAG name recorded for a port that is not a LAG member.
pub const NOT_APPLICABLE: &str = "Not Applicable";

/// Peer address used when a test wants a route through an unresolved
/// next hop.
pub const UNRESOLVED_NEXTHOP: Ipv4Addr = Ipv4Addr::new(20, 20, 20, 100);

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Neighbor {
    pub name: String,
    #[serde(default)]
    pub namespace: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortChannel {
    #[serde(default)]
    pub members: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BgpPeer {
    pub name: String,
    pub addr: String,
}

/// Minigraph facts of the DUT within its testbed.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TopologyFacts {
    /// Testbed topology name, e.g. `t0-64` or `t1-lag`.
    pub topo_name: String,
    #[serde(default)]
    pub minigraph_neighbors: BTreeMap<String, Neighbor>,
    #[serde(default)]
    pub minigraph_ptf_indices: BTreeMap<String, u32>,
    /// Physical front-panel ports. Attributes are not used.
    #[serde(default)]
    pub minigraph_ports: BTreeMap<String, serde_json::Value>,
    #[serde(default)]
    pub minigraph_portchannels: BTreeMap<String, PortChannel>,
    #[serde(default)]
    pub minigraph_bgp: Vec<BgpPeer>,
}

impl TopologyFacts {
    /// Reads facts from a YAML or JSON file.
    pub fn from_file(path: impl AsRef<Path>) -> EverflowResult<Self> {
        let content = std::fs::read_to_string(path)?;
        Ok(serde_yaml::from_str(&content)?)
    }

    /// PTF index of every physical port.
    pub fn port_index_map(&self) -> BTreeMap<String, u32> {
        self.minigraph_ptf_indices
            .iter()
            .filter(|(port, _)| self.minigraph_ports.contains_key(*port))
            .map(|(port, id)| (port.clone(), *id))
            .collect()
    }

    /// Namespace of every physical port, keyed by PTF index. Ports without
    /// a neighbor are in the default namespace.
    pub fn port_namespace_map(&self) -> BTreeMap<u32, String> {
        self.port_index_map()
            .into_iter()
            .map(|(port, id)| {
                let ns = self
                    .minigraph_neighbors
                    .get(&port)
                    .map(|n| n.namespace.clone())
                    .unwrap_or_default();
                (id, ns)
            })
            .collect()
    }

    fn ptf_index(&self, port: &str) -> EverflowResult<u32> {
        self.minigraph_ptf_indices
            .get(port)
            .copied()
            .ok_or_else(|| EverflowError::not_found("PTF index of port", port))
    }

    fn port_channel_of(&self, port: &str) -> Option<(&str, &PortChannel)> {
        self.minigraph_portchannels
            .iter()
            .find(|(_, pc)| pc.members.iter().any(|m| m == port))
            .map(|(name, pc)| (name.as_str(), pc))
    }
}

/// Kind of testbed, decided from the topology name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TopologyKind {
    /// T0: servers below, T1 switches above.
    ServerUplink,
    /// T1: T0 switches below, T2 switches above.
    LeafSpine,
}

impl TopologyKind {
    /// Decides the kind from a topology name. Dual-ToR testbeds are not
    /// supported.
    pub fn from_topology_name(name: &str) -> EverflowResult<Self> {
        if name.contains("dualtor") {
            Err(EverflowError::UnsupportedTopology(name.to_string()))
        } else if name.contains("t1") {
            Ok(TopologyKind::LeafSpine)
        } else if name.contains("t0") {
            Ok(TopologyKind::ServerUplink)
        } else {
            Err(EverflowError::UnsupportedTopology(name.to_string()))
        }
    }

    /// Roles below and above the DUT.
    pub const fn roles(&self) -> (Role, Role) {
        match self {
            TopologyKind::ServerUplink => (Role::Server, Role::T1),
            TopologyKind::LeafSpine => (Role::Tor, Role::Spine),
        }
    }

    pub const fn as_str(&self) -> &'static str {
        match self {
            TopologyKind::ServerUplink => "t0",
            TopologyKind::LeafSpine => "t1",
        }
    }
}

/// Neighbor role of a DUT port.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Server,
    T1,
    Tor,
    Spine,
}

impl Role {
    /// Substring of the lower-cased neighbor name that identifies the role.
    pub const fn marker(&self) -> &'static str {
        match self {
            Role::Server => "server",
            Role::T1 => "t1",
            Role::Tor => "t0",
            Role::Spine => "t2",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Role::Server => "server",
            Role::T1 => "T1",
            Role::Tor => "ToR",
            Role::Spine => "spine",
        };
        f.write_str(name)
    }
}

/// Chooses among equally valid candidates.
pub trait NamespacePicker {
    /// Returns an index below `len`; `len` is never zero.
    fn pick(&mut self, len: usize) -> usize;
}

/// Uniform random choice.
#[derive(Debug, Default, Clone, Copy)]
pub struct RandomPicker;

impl NamespacePicker for RandomPicker {
    fn pick(&mut self, len: usize) -> usize {
        rand::thread_rng().gen_range(0..len)
    }
}

/// Always the first candidate.
#[derive(Debug, Default, Clone, Copy)]
pub struct FirstPicker;

impl NamespacePicker for FirstPicker {
    fn pick(&mut self, _len: usize) -> usize {
        0
    }
}

/// Picks one element of `items`, or `None` when it is empty.
pub fn choose<'a, T>(picker: &mut dyn NamespacePicker, items: &'a [T]) -> Option<&'a T> {
    if items.is_empty() {
        None
    } else {
        items.get(picker.pick(items.len()).min(items.len() - 1))
    }
}

/// One logical test endpoint: a port, or all members of its LAG.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Endpoint {
    pub port: String,
    /// Comma-joined PTF ids of the port and its LAG peers.
    pub ptf_ids: String,
    pub lag_name: Option<String>,
}

/// Collects at most [`MAX_ENDPOINTS`] endpoints from `ports`, folding LAG
/// members into the endpoint of the first member seen.
pub fn coalesce_endpoints(facts: &TopologyFacts, ports: &[String]) -> EverflowResult<Vec<Endpoint>> {
    let mut endpoints: Vec<Endpoint> = Vec::new();
    let mut excluded: BTreeSet<&str> = BTreeSet::new();

    for port in ports {
        if endpoints.len() >= MAX_ENDPOINTS {
            break;
        }
        if excluded.contains(port.as_str()) || endpoints.iter().any(|e| &e.port == port) {
            continue;
        }

        let mut ptf_ids = facts.ptf_index(port)?.to_string();
        let mut lag_name = None;
        if let Some((name, pc)) = facts.port_channel_of(port) {
            lag_name = Some(name.to_string());
            for member in pc.members.iter().filter(|m| *m != port) {
                ptf_ids.push_str(&format!(",{}", facts.ptf_index(member)?));
                excluded.insert(member.as_str());
            }
        }

        endpoints.push(Endpoint {
            port: port.clone(),
            ptf_ids,
            lag_name,
        });
    }

    Ok(endpoints)
}

/// Splits comma-joined PTF id lists into individual ids.
pub fn tx_port_ids<S: AsRef<str>>(ptf_id_lists: &[S]) -> EverflowResult<Vec<u32>> {
    ptf_id_lists
        .iter()
        .flat_map(|list| list.as_ref().split(','))
        .map(|id| {
            id.trim()
                .parse()
                .map_err(|_| EverflowError::parse("PTF port id", id))
        })
        .collect()
}

/// IPv4 address of the BGP peer behind `port`, or [`UNRESOLVED_NEXTHOP`]
/// when `resolved` is false.
pub fn neighbor_ip(facts: &TopologyFacts, port: &str, resolved: bool) -> EverflowResult<Ipv4Addr> {
    if !resolved {
        return Ok(UNRESOLVED_NEXTHOP);
    }

    let neighbor = facts
        .minigraph_neighbors
        .get(port)
        .ok_or_else(|| EverflowError::not_found("neighbor of port", port))?;

    facts
        .minigraph_bgp
        .iter()
        .filter(|peer| peer.name == neighbor.name)
        .find_map(|peer| peer.addr.parse::<Ipv4Addr>().ok())
        .ok_or_else(|| EverflowError::not_found("IPv4 BGP peer", &neighbor.name))
}

/// Where traffic enters the DUT and the ports its mirror or forwarded copy
/// may leave from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirectionRecord {
    pub src_port: String,
    pub src_port_ptf_id: String,
    pub src_port_lag_name: Option<String>,
    pub dest_ports: Vec<String>,
    pub dest_port_ptf_ids: Vec<String>,
    pub dest_port_lag_names: Vec<Option<String>>,
    pub namespace: String,
}

impl DirectionRecord {
    fn new(
        facts: &TopologyFacts,
        src_port: &str,
        src_port_lag_name: Option<String>,
        dest: &[Endpoint],
        namespace: &str,
    ) -> EverflowResult<Self> {
        Ok(Self {
            src_port: src_port.to_string(),
            src_port_ptf_id: facts.ptf_index(src_port)?.to_string(),
            src_port_lag_name,
            dest_ports: dest.iter().map(|e| e.port.clone()).collect(),
            dest_port_ptf_ids: dest.iter().map(|e| e.ptf_ids.clone()).collect(),
            dest_port_lag_names: dest.iter().map(|e| e.lag_name.clone()).collect(),
            namespace: namespace.to_string(),
        })
    }

    /// Every PTF id the destination endpoints cover.
    pub fn dest_tx_port_ids(&self) -> EverflowResult<Vec<u32>> {
        tx_port_ids(&self.dest_port_ptf_ids)
    }

    /// LAG name as shown in test reports.
    pub fn src_lag_display(&self) -> &str {
        self.src_port_lag_name.as_deref().unwrap_or(NOT_APPLICABLE)
    }
}

/// Ports of one role, grouped by namespace.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RolePorts {
    pub by_namespace: BTreeMap<String, Vec<String>>,
}

impl RolePorts {
    pub fn namespaces(&self) -> BTreeSet<&str> {
        self.by_namespace.keys().map(String::as_str).collect()
    }

    pub fn ports(&self, namespace: &str) -> &[String] {
        self.by_namespace.get(namespace).map(Vec::as_slice).unwrap_or(&[])
    }
}

/// Port roles, namespaces and traffic directions of a testbed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopologyClassification {
    pub kind: TopologyKind,
    pub roles: BTreeMap<Role, RolePorts>,
    /// Namespace chosen for each role.
    pub selected_namespaces: BTreeMap<Role, String>,
    /// Physical port name to PTF id.
    pub port_index_map: BTreeMap<String, u32>,
    /// PTF id to namespace.
    pub port_namespace_map: BTreeMap<u32, String>,
    /// PTF ids of the server endpoints; empty on leaf/spine testbeds.
    pub server_dest_ptf_ids: Vec<String>,
    pub downstream: DirectionRecord,
    pub upstream: DirectionRecord,
}

impl TopologyClassification {
    /// Namespace of the port with PTF id `ptf_id`.
    pub fn namespace_of(&self, ptf_id: u32) -> EverflowResult<&str> {
        self.port_namespace_map
            .get(&ptf_id)
            .map(String::as_str)
            .ok_or_else(|| EverflowError::not_found("namespace of PTF port", ptf_id.to_string()))
    }

    /// Ports of `role` in its selected namespace.
    pub fn selected_ports(&self, role: Role) -> &[String] {
        match (self.roles.get(&role), self.selected_namespaces.get(&role)) {
            (Some(ports), Some(ns)) => ports.ports(ns),
            _ => &[],
        }
    }
}

/// Classifies the ports of `facts`.
///
/// # Errors
///
/// [`EverflowError::UnsupportedTopology`] for topology names outside the two
/// supported kinds, [`EverflowError::NotFound`] when a role has no ports.
pub fn classify(
    facts: &TopologyFacts,
    picker: &mut dyn NamespacePicker,
) -> EverflowResult<TopologyClassification> {
    let kind = TopologyKind::from_topology_name(&facts.topo_name)?;
    let (lower, upper) = kind.roles();

    // Ports in PTF index order, so "first port" is stable across fact sources.
    let mut neighbors: Vec<(&String, &Neighbor)> = facts.minigraph_neighbors.iter().collect();
    neighbors.sort_by_key(|(port, _)| (facts.minigraph_ptf_indices.get(*port).copied(), (*port).clone()));

    let mut roles: BTreeMap<Role, RolePorts> = BTreeMap::new();
    for (port, neighbor) in neighbors {
        let name = neighbor.name.to_lowercase();
        let role = [lower, upper].into_iter().find(|r| name.contains(r.marker()));
        if let Some(role) = role {
            roles
                .entry(role)
                .or_default()
                .by_namespace
                .entry(neighbor.namespace.clone())
                .or_default()
                .push(port.clone());
        }
    }

    for role in [lower, upper] {
        if roles.get(&role).map_or(true, |r| r.by_namespace.is_empty()) {
            return Err(EverflowError::not_found("ports with role", role.to_string()));
        }
    }

    let lower_ns = select_namespace(kind, &roles, lower, upper, picker);
    let upper_ns = select_namespace(kind, &roles, upper, lower, picker);
    debug!(kind = kind.as_str(), %lower, lower_ns = %lower_ns, %upper, upper_ns = %upper_ns, "Selected namespaces");

    let lower_ports = roles[&lower].ports(&lower_ns).to_vec();
    let upper_ports = roles[&upper].ports(&upper_ns).to_vec();
    let lower_endpoints = coalesce_endpoints(facts, &lower_ports)?;
    let upper_endpoints = coalesce_endpoints(facts, &upper_ports)?;

    let (downstream, upstream, server_dest_ptf_ids) = match kind {
        TopologyKind::ServerUplink => {
            let downstream = DirectionRecord::new(
                facts,
                &upper_ports[0],
                upper_endpoints[0].lag_name.clone(),
                &upper_endpoints[1..],
                &lower_ns,
            )?;
            let upstream =
                DirectionRecord::new(facts, &lower_ports[0], None, &upper_endpoints, &upper_ns)?;
            let servers = lower_endpoints.iter().map(|e| e.ptf_ids.clone()).collect();
            (downstream, upstream, servers)
        }
        TopologyKind::LeafSpine => {
            let downstream = DirectionRecord::new(
                facts,
                &upper_ports[0],
                upper_endpoints[0].lag_name.clone(),
                &lower_endpoints,
                &lower_ns,
            )?;
            let upstream = DirectionRecord::new(
                facts,
                &lower_ports[0],
                lower_endpoints[0].lag_name.clone(),
                &upper_endpoints,
                &upper_ns,
            )?;
            (downstream, upstream, Vec::new())
        }
    };

    info!(
        topology = %facts.topo_name,
        downstream_src = %downstream.src_port,
        upstream_src = %upstream.src_port,
        "Classified testbed ports"
    );

    Ok(TopologyClassification {
        kind,
        selected_namespaces: [(lower, lower_ns), (upper, upper_ns)].into_iter().collect(),
        roles,
        port_index_map: facts.port_index_map(),
        port_namespace_map: facts.port_namespace_map(),
        server_dest_ptf_ids,
        downstream,
        upstream,
    })
}

/// Chooses the namespace `role` is exercised in.
///
/// On leaf/spine testbeds namespaces holding only `role` ports are preferred,
/// falling back to any namespace the role was seen in. Server/uplink
/// testbeds pick among every namespace of the role.
fn select_namespace(
    kind: TopologyKind,
    roles: &BTreeMap<Role, RolePorts>,
    role: Role,
    opposite: Role,
    picker: &mut dyn NamespacePicker,
) -> String {
    let own = roles.get(&role).map(RolePorts::namespaces).unwrap_or_default();
    let candidates: Vec<&str> = match kind {
        TopologyKind::ServerUplink => own.iter().copied().collect(),
        TopologyKind::LeafSpine => {
            let other = roles.get(&opposite).map(RolePorts::namespaces).unwrap_or_default();
            let exclusive: Vec<&str> = own.difference(&other).copied().collect();
            if exclusive.is_empty() {
                own.iter().copied().collect()
            } else {
                exclusive
            }
        }
    };
    choose(picker, &candidates)
        .map(|ns| ns.to_string())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn neighbor(name: &str, ns: &str) -> Neighbor {
        Neighbor {
            name: name.to_string(),
            namespace: ns.to_string(),
        }
    }

    /// Ethernet0..Ethernet28 with PTF ids 0..7.
    fn facts(topo: &str, neighbors: &[(&str, &str, &str)], lags: &[(&str, &[&str])]) -> TopologyFacts {
        let mut facts = TopologyFacts {
            topo_name: topo.to_string(),
            ..TopologyFacts::default()
        };
        for i in 0..8u32 {
            let port = format!("Ethernet{}", i * 4);
            facts.minigraph_ptf_indices.insert(port.clone(), i);
            facts.minigraph_ports.insert(port, serde_json::json!({}));
        }
        for (port, name, ns) in neighbors {
            facts
                .minigraph_neighbors
                .insert(port.to_string(), neighbor(name, ns));
        }
        for (name, members) in lags {
            facts.minigraph_portchannels.insert(
                name.to_string(),
                PortChannel {
                    members: members.iter().map(|m| m.to_string()).collect(),
                },
            );
        }
        facts
    }

    #[test]
    fn test_topology_kind() {
        assert_eq!(TopologyKind::from_topology_name("t0-64").unwrap(), TopologyKind::ServerUplink);
        assert_eq!(TopologyKind::from_topology_name("t1-lag").unwrap(), TopologyKind::LeafSpine);
        assert!(matches!(
            TopologyKind::from_topology_name("dualtor-56"),
            Err(EverflowError::UnsupportedTopology(_))
        ));
        assert!(TopologyKind::from_topology_name("ptf32").is_err());
    }

    #[test]
    fn test_coalesce_lag_members() {
        let facts = facts(
            "t1-lag",
            &[],
            &[("PortChannel1", &["Ethernet4", "Ethernet8"])],
        );
        let ports: Vec<String> = ["Ethernet0", "Ethernet4", "Ethernet8", "Ethernet12"]
            .iter()
            .map(|p| p.to_string())
            .collect();

        let endpoints = coalesce_endpoints(&facts, &ports).unwrap();
        assert_eq!(endpoints.len(), 3);
        assert_eq!(endpoints[1].ptf_ids, "1,2");
        assert_eq!(endpoints[1].lag_name.as_deref(), Some("PortChannel1"));
        assert_eq!(endpoints[0].lag_name, None);
        assert_eq!(endpoints[2].port, "Ethernet12");
    }

    #[test]
    fn test_coalesce_caps_endpoints() {
        let facts = facts("t1", &[], &[]);
        let ports: Vec<String> = (0..8).map(|i| format!("Ethernet{}", i * 4)).collect();
        assert_eq!(coalesce_endpoints(&facts, &ports).unwrap().len(), MAX_ENDPOINTS);
    }

    #[test]
    fn test_classify_server_uplink() {
        let facts = facts(
            "t0-64",
            &[
                ("Ethernet0", "Servers0", ""),
                ("Ethernet4", "Servers1", ""),
                ("Ethernet8", "ARISTA01T1", ""),
                ("Ethernet12", "ARISTA01T1", ""),
                ("Ethernet16", "ARISTA02T1", ""),
                ("Ethernet20", "ARISTA03T1", ""),
            ],
            &[("PortChannel0001", &["Ethernet8", "Ethernet12"])],
        );

        let c = classify(&facts, &mut FirstPicker).unwrap();
        assert_eq!(c.kind, TopologyKind::ServerUplink);
        assert_eq!(c.server_dest_ptf_ids, vec!["0", "1"]);

        assert_eq!(c.downstream.src_port, "Ethernet8");
        assert_eq!(c.downstream.src_port_lag_name.as_deref(), Some("PortChannel0001"));
        assert_eq!(c.downstream.dest_port_ptf_ids, vec!["4", "5"]);

        assert_eq!(c.upstream.src_port, "Ethernet0");
        assert_eq!(c.upstream.src_port_lag_name, None);
        assert_eq!(c.upstream.src_lag_display(), NOT_APPLICABLE);
        assert_eq!(c.upstream.dest_port_ptf_ids, vec!["2,3", "4", "5"]);
        assert_eq!(c.upstream.dest_tx_port_ids().unwrap(), vec![2, 3, 4, 5]);
    }

    #[test]
    fn test_classify_leaf_spine_prefers_exclusive_namespace() {
        let facts = facts(
            "t1-lag",
            &[
                ("Ethernet0", "ARISTA01T0", "asic0"),
                ("Ethernet4", "ARISTA02T0", "asic0"),
                ("Ethernet8", "ARISTA01T2", "asic0"),
                ("Ethernet16", "ARISTA03T0", "asic1"),
                ("Ethernet20", "ARISTA02T2", "asic2"),
            ],
            &[],
        );

        let c = classify(&facts, &mut FirstPicker).unwrap();
        assert_eq!(c.selected_namespaces[&Role::Tor], "asic1");
        assert_eq!(c.selected_namespaces[&Role::Spine], "asic2");

        assert_eq!(c.downstream.src_port, "Ethernet20");
        assert_eq!(c.downstream.dest_ports, vec!["Ethernet16"]);
        assert_eq!(c.downstream.namespace, "asic1");
        assert_eq!(c.upstream.src_port, "Ethernet16");
        assert_eq!(c.upstream.dest_ports, vec!["Ethernet20"]);
        assert_eq!(c.upstream.namespace, "asic2");
        assert_eq!(c.namespace_of(0).unwrap(), "asic0");
    }

    #[test]
    fn test_classify_shared_namespace_falls_back() {
        let facts = facts(
            "t1",
            &[
                ("Ethernet0", "ARISTA01T0", ""),
                ("Ethernet4", "ARISTA01T2", ""),
            ],
            &[],
        );
        let c = classify(&facts, &mut FirstPicker).unwrap();
        assert_eq!(c.downstream.namespace, "");
        assert_eq!(c.selected_ports(Role::Spine), ["Ethernet4".to_string()]);
    }

    #[test]
    fn test_classify_missing_role() {
        let facts = facts("t1", &[("Ethernet0", "ARISTA01T0", "")], &[]);
        assert!(matches!(
            classify(&facts, &mut FirstPicker),
            Err(EverflowError::NotFound { .. })
        ));
    }

    #[test]
    fn test_tx_port_ids() {
        assert_eq!(tx_port_ids(&["1,2", "3"]).unwrap(), vec![1, 2, 3]);
        assert!(tx_port_ids(&["x"]).is_err());
    }

    #[test]
    fn test_neighbor_ip() {
        let mut facts = facts("t1", &[("Ethernet0", "ARISTA01T0", "")], &[]);
        facts.minigraph_bgp = vec![
            BgpPeer {
                name: "ARISTA01T0".to_string(),
                addr: "fc00::2".to_string(),
            },
            BgpPeer {
                name: "ARISTA01T0".to_string(),
                addr: "10.0.0.33".to_string(),
            },
        ];
        assert_eq!(neighbor_ip(&facts, "Ethernet0", true).unwrap(), Ipv4Addr::new(10, 0, 0, 33));
        assert_eq!(neighbor_ip(&facts, "Ethernet0", false).unwrap(), UNRESOLVED_NEXTHOP);
        assert!(neighbor_ip(&facts, "Ethernet4", true).is_err());
    }

    #[test]
    fn test_facts_from_yaml() {
        let facts: TopologyFacts = serde_yaml::from_str(
            r#"
topo_name: t0
minigraph_neighbors:
  Ethernet0: {name: Servers0}
minigraph_ptf_indices: {Ethernet0: 0, Ethernet4: 1}
minigraph_ports: {Ethernet0: {alias: etp1}}
"#,
        )
        .unwrap();
        assert_eq!(facts.port_index_map().len(), 1);
        assert_eq!(facts.port_namespace_map()[&0], "");
    }

    #[test]
    fn test_choose() {
        let items = ["a", "b"];
        assert_eq!(choose(&mut FirstPicker, &items), Some(&"a"));
        let empty: [&str; 0] = [];
        assert_eq!(choose(&mut RandomPicker, &empty), None);
    }
}
