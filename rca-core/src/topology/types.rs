//! Topology data model: resource nodes and the directed edges between
//! them, kept in a map keyed by resource key so cycles and shared
//! references never require pointer aliasing.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// How one topology node relates to another.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EdgeRelation {
    Hosts,
    Owns,
    RoutesTo,
    MountedBy,
    Manages,
    DependsOn,
}

/// A cluster resource: `kind/[namespace/]name` uniquely identifies it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TopologyNode {
    pub kind: String,
    pub name: String,
    pub namespace: Option<String>,
    pub status: String,
    pub labels: HashMap<String, String>,
    pub host_node: Option<String>,
}

impl TopologyNode {
    /// `kind/[ns/]name`, the key used throughout the topology graph.
    pub fn key(&self) -> String {
        match &self.namespace {
            Some(ns) => format!("{}/{}/{}", self.kind, ns, self.name),
            None => format!("{}/{}", self.kind, self.name),
        }
    }
}

/// A directed relation between two resource keys.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TopologyEdge {
    pub from_key: String,
    pub to_key: String,
    pub relation: EdgeRelation,
}

/// A point-in-time view of the cluster topology.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TopologySnapshot {
    pub nodes: HashMap<String, TopologyNode>,
    pub edges: Vec<TopologyEdge>,
    pub resource_version: String,
    pub stale: bool,
}

impl TopologySnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_node(&mut self, node: TopologyNode) {
        let key = node.key();
        self.nodes.insert(key, node);
    }

    pub fn add_edge(&mut self, from_key: impl Into<String>, to_key: impl Into<String>, relation: EdgeRelation) {
        self.edges.push(TopologyEdge {
            from_key: from_key.into(),
            to_key: to_key.into(),
            relation,
        });
    }
}

/// Breadth of a diagnostic pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScopeLevel {
    Cluster,
    Namespace,
    Workload,
    Component,
}

/// What part of the cluster a diagnosis is scoped to.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiagnosticScope {
    pub level: ScopeLevel,
    pub namespaces: Vec<String>,
    pub workload_key: Option<String>,
    pub domains: Vec<String>,
    pub include_control_plane: bool,
}

impl DiagnosticScope {
    pub fn cluster() -> Self {
        Self {
            level: ScopeLevel::Cluster,
            namespaces: Vec::new(),
            workload_key: None,
            domains: Vec::new(),
            include_control_plane: true,
        }
    }
}

/// Known-problem status strings that promote a node to a `ClusterAlert`.
pub const PROBLEM_STATUSES: &[&str] = &[
    "NotReady",
    "CrashLoopBackOff",
    "Evicted",
    "OOMKilled",
    "Pending",
    "Degraded",
    "Unavailable",
    "ImagePullBackOff",
    "Error",
    "Failed",
    "DiskPressure",
    "MemoryPressure",
    "PIDPressure",
];

/// A topology node observed in a known-problem status.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClusterAlert {
    pub resource_key: String,
    pub alert_type: String,
    pub severity: String,
    pub timestamp: chrono::DateTime<chrono::Utc>,
}

/// A set of alerts judged to be part of the same incident, with the
/// resources most likely to be the root.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IssueCluster {
    pub id: String,
    pub alerts: Vec<ClusterAlert>,
    pub root_candidates: Vec<RootCandidate>,
    pub confidence: f64,
    pub correlation_basis: Vec<String>,
    pub affected_resources: Vec<String>,
}

/// A resource hypothesized to be the root of an issue cluster.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RootCandidate {
    pub resource_key: String,
    pub hypothesis: String,
    pub supporting_signals: Vec<String>,
    pub confidence: f64,
}
