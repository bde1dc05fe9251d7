//! Builds and caches `TopologySnapshot`s, and prunes one down to a
//! `DiagnosticScope`.

use super::types::{DiagnosticScope, EdgeRelation, ScopeLevel, TopologySnapshot};
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Mutex;
use std::time::{Duration, Instant};

const CACHE_TTL: Duration = Duration::from_secs(300);

/// Session-keyed topology cache with a fixed TTL. One snapshot is built
/// per session and reused until it expires.
pub struct TopologyResolver {
    cache: Mutex<HashMap<String, (TopologySnapshot, Instant)>>,
}

impl Default for TopologyResolver {
    fn default() -> Self {
        Self::new()
    }
}

impl TopologyResolver {
    pub fn new() -> Self {
        Self {
            cache: Mutex::new(HashMap::new()),
        }
    }

    /// Return the cached snapshot for `session_id` if it is still fresh,
    /// otherwise build one via `build` and cache it.
    pub fn resolve<F>(&self, session_id: &str, build: F) -> TopologySnapshot
    where
        F: FnOnce() -> TopologySnapshot,
    {
        let mut cache = self.cache.lock().expect("topology cache lock poisoned");
        if let Some((snapshot, fetched_at)) = cache.get(session_id) {
            if fetched_at.elapsed() < CACHE_TTL {
                return snapshot.clone();
            }
        }
        let snapshot = build();
        cache.insert(session_id.to_string(), (snapshot.clone(), Instant::now()));
        snapshot
    }

    pub fn invalidate(&self, session_id: &str) {
        self.cache
            .lock()
            .expect("topology cache lock poisoned")
            .remove(session_id);
    }
}

/// Prune `snapshot` down to the resources `scope` admits.
pub fn scoped_topology_graph(snapshot: &TopologySnapshot, scope: &DiagnosticScope) -> TopologySnapshot {
    match scope.level {
        ScopeLevel::Cluster => snapshot.clone(),
        ScopeLevel::Namespace => prune_by_namespace(snapshot, &scope.namespaces),
        ScopeLevel::Workload => {
            let Some(root) = &scope.workload_key else {
                return TopologySnapshot::new();
            };
            bfs_subgraph(
                snapshot,
                root,
                &[
                    EdgeRelation::Owns,
                    EdgeRelation::RoutesTo,
                    EdgeRelation::Hosts,
                    EdgeRelation::MountedBy,
                ],
                3,
            )
        }
        ScopeLevel::Component => {
            let Some(root) = &scope.workload_key else {
                return TopologySnapshot::new();
            };
            bfs_subgraph(
                snapshot,
                root,
                &[
                    EdgeRelation::Owns,
                    EdgeRelation::RoutesTo,
                    EdgeRelation::Hosts,
                    EdgeRelation::MountedBy,
                    EdgeRelation::Manages,
                    EdgeRelation::DependsOn,
                ],
                1,
            )
        }
    }
}

fn prune_by_namespace(snapshot: &TopologySnapshot, namespaces: &[String]) -> TopologySnapshot {
    let namespace_set: HashSet<&str> = namespaces.iter().map(|s| s.as_str()).collect();

    let mut retained: HashSet<String> = snapshot
        .nodes
        .iter()
        .filter(|(_, node)| {
            node.namespace
                .as_deref()
                .map(|ns| namespace_set.contains(ns))
                .unwrap_or(false)
        })
        .map(|(key, _)| key.clone())
        .collect();

    // Cluster-scoped nodes referenced transitively via hosts/mounted_by.
    let mut changed = true;
    while changed {
        changed = false;
        for edge in &snapshot.edges {
            if !matches!(edge.relation, EdgeRelation::Hosts | EdgeRelation::MountedBy) {
                continue;
            }
            let from_in = retained.contains(&edge.from_key);
            let to_in = retained.contains(&edge.to_key);
            if from_in && !to_in && snapshot.nodes.get(&edge.to_key).map(|n| n.namespace.is_none()).unwrap_or(false) {
                retained.insert(edge.to_key.clone());
                changed = true;
            }
            if to_in && !from_in && snapshot.nodes.get(&edge.from_key).map(|n| n.namespace.is_none()).unwrap_or(false) {
                retained.insert(edge.from_key.clone());
                changed = true;
            }
        }
    }

    build_pruned(snapshot, &retained)
}

fn bfs_subgraph(
    snapshot: &TopologySnapshot,
    root: &str,
    following: &[EdgeRelation],
    max_depth: u32,
) -> TopologySnapshot {
    if !snapshot.nodes.contains_key(root) {
        return TopologySnapshot::new();
    }

    let mut visited = HashSet::new();
    visited.insert(root.to_string());
    let mut queue = VecDeque::new();
    queue.push_back((root.to_string(), 0u32));

    while let Some((key, depth)) = queue.pop_front() {
        if depth >= max_depth {
            continue;
        }
        for edge in &snapshot.edges {
            if !following.contains(&edge.relation) {
                continue;
            }
            let neighbor = if edge.from_key == key {
                Some(&edge.to_key)
            } else if edge.to_key == key {
                Some(&edge.from_key)
            } else {
                None
            };
            if let Some(neighbor) = neighbor {
                if visited.insert(neighbor.clone()) {
                    queue.push_back((neighbor.clone(), depth + 1));
                }
            }
        }
    }

    build_pruned(snapshot, &visited)
}

fn build_pruned(snapshot: &TopologySnapshot, retained: &HashSet<String>) -> TopologySnapshot {
    let nodes = snapshot
        .nodes
        .iter()
        .filter(|(key, _)| retained.contains(*key))
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect();
    let edges = snapshot
        .edges
        .iter()
        .filter(|e| retained.contains(&e.from_key) && retained.contains(&e.to_key))
        .cloned()
        .collect();
    TopologySnapshot {
        nodes,
        edges,
        resource_version: snapshot.resource_version.clone(),
        stale: snapshot.stale,
    }
}

/// Fraction of the original alert-bearing nodes retained after pruning.
pub fn coverage(original_alert_nodes: &[String], pruned: &TopologySnapshot) -> f64 {
    if original_alert_nodes.is_empty() {
        return 1.0;
    }
    let retained = original_alert_nodes
        .iter()
        .filter(|key| pruned.nodes.contains_key(*key))
        .count();
    retained as f64 / original_alert_nodes.len() as f64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::topology::types::TopologyNode;
    use std::collections::HashMap as Map;

    fn node(kind: &str, namespace: Option<&str>, name: &str, status: &str) -> TopologyNode {
        TopologyNode {
            kind: kind.to_string(),
            name: name.to_string(),
            namespace: namespace.map(|s| s.to_string()),
            status: status.to_string(),
            labels: Map::new(),
            host_node: None,
        }
    }

    fn scenario_snapshot() -> TopologySnapshot {
        let mut snap = TopologySnapshot::new();
        snap.insert_node(node("pod", Some("prod"), "checkout-1", "Running"));
        snap.insert_node(node("deploy", Some("prod"), "checkout", "Running"));
        snap.insert_node(node("svc", Some("prod"), "checkout", "Running"));
        snap.insert_node(node("pvc", Some("prod"), "data", "Bound"));
        snap.insert_node(node("pv", None, "pv-data", "Bound"));
        snap.insert_node(node("sc", None, "gp2", "Active"));
        snap.insert_node(node("node", None, "worker-1", "Ready"));
        snap.insert_node(node("pod", Some("stg"), "checkout-1", "Running"));
        snap.insert_node(node("ds", Some("mon"), "node-exporter", "Running"));

        snap.add_edge("deploy/prod/checkout", "pod/prod/checkout-1", EdgeRelation::Owns);
        snap.add_edge("svc/prod/checkout", "pod/prod/checkout-1", EdgeRelation::RoutesTo);
        snap.add_edge("pod/prod/checkout-1", "pvc/prod/data", EdgeRelation::MountedBy);
        snap.add_edge("pvc/prod/data", "pv/pv-data", EdgeRelation::DependsOn);
        snap.add_edge("pv/pv-data", "sc/gp2", EdgeRelation::DependsOn);
        snap.add_edge("node/worker-1", "pod/prod/checkout-1", EdgeRelation::Hosts);
        snap
    }

    #[test]
    fn scenario_s4_namespace_scope_retains_expected_nodes() {
        let snapshot = scenario_snapshot();
        let scope = DiagnosticScope {
            level: ScopeLevel::Namespace,
            namespaces: vec!["prod".to_string()],
            workload_key: None,
            domains: vec![],
            include_control_plane: true,
        };
        let pruned = scoped_topology_graph(&snapshot, &scope);

        assert!(pruned.nodes.contains_key("pod/prod/checkout-1"));
        assert!(pruned.nodes.contains_key("deploy/prod/checkout"));
        assert!(pruned.nodes.contains_key("svc/prod/checkout"));
        assert!(pruned.nodes.contains_key("pvc/prod/data"));
        assert!(pruned.nodes.contains_key("pv/pv-data"));
        assert!(pruned.nodes.contains_key("sc/gp2"));
        assert!(pruned.nodes.contains_key("node/worker-1"));

        assert!(!pruned.nodes.contains_key("pod/stg/checkout-1"));
        assert!(!pruned.nodes.contains_key("ds/mon/node-exporter"));
    }

    #[test]
    fn cluster_scope_is_identity() {
        let snapshot = scenario_snapshot();
        let pruned = scoped_topology_graph(&snapshot, &DiagnosticScope::cluster());
        assert_eq!(pruned.nodes.len(), snapshot.nodes.len());
    }

    #[test]
    fn workload_scope_bfs_respects_depth() {
        let snapshot = scenario_snapshot();
        let scope = DiagnosticScope {
            level: ScopeLevel::Workload,
            namespaces: vec![],
            workload_key: Some("deploy/prod/checkout".to_string()),
            domains: vec![],
            include_control_plane: false,
        };
        let pruned = scoped_topology_graph(&snapshot, &scope);
        assert!(pruned.nodes.contains_key("deploy/prod/checkout"));
        assert!(pruned.nodes.contains_key("pod/prod/checkout-1"));
    }
}
