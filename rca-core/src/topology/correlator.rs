//! Groups problem-status topology nodes into issue clusters with root
//! candidates, by BFS over the undirected projection of the topology
//! graph.

use super::types::{ClusterAlert, IssueCluster, RootCandidate, TopologySnapshot, PROBLEM_STATUSES};
use chrono::Utc;
use std::collections::{HashMap, HashSet, VecDeque};

/// Extract every node in `snapshot` whose status is a known problem
/// status, sorted by resource key for deterministic grouping.
pub fn extract_alerts(snapshot: &TopologySnapshot) -> Vec<ClusterAlert> {
    let mut alerts: Vec<ClusterAlert> = snapshot
        .nodes
        .iter()
        .filter(|(_, node)| PROBLEM_STATUSES.contains(&node.status.as_str()))
        .map(|(key, node)| ClusterAlert {
            resource_key: key.clone(),
            alert_type: node.status.clone(),
            severity: severity_for_status(&node.status).to_string(),
            timestamp: Utc::now(),
        })
        .collect();
    alerts.sort_by(|a, b| a.resource_key.cmp(&b.resource_key));
    alerts
}

fn severity_for_status(status: &str) -> &'static str {
    match status {
        "NotReady" | "DiskPressure" | "MemoryPressure" | "PIDPressure" | "Failed" => "critical",
        "CrashLoopBackOff" | "Evicted" | "OOMKilled" | "Degraded" | "Unavailable" => "high",
        _ => "medium",
    }
}

fn kind_of(resource_key: &str) -> &str {
    resource_key.split('/').next().unwrap_or(resource_key)
}

fn namespace_of(resource_key: &str) -> Option<&str> {
    let parts: Vec<&str> = resource_key.split('/').collect();
    if parts.len() == 3 {
        Some(parts[1])
    } else {
        None
    }
}

/// Weight a resource kind contributes to a root candidate's confidence.
fn kind_weight(kind: &str) -> f64 {
    match kind {
        "node" => 0.3,
        "operator" => 0.25,
        "deployment" | "service" => 0.1,
        _ => 0.0,
    }
}

/// Group `alerts` into issue clusters by BFS over the undirected
/// projection of `snapshot`'s edges; alerts with no topology connection
/// to another alert form singleton clusters.
pub fn correlate(snapshot: &TopologySnapshot, alerts: &[ClusterAlert]) -> Vec<IssueCluster> {
    let alert_keys: HashSet<&str> = alerts.iter().map(|a| a.resource_key.as_str()).collect();

    let mut adjacency: HashMap<&str, Vec<&str>> = HashMap::new();
    for edge in &snapshot.edges {
        if alert_keys.contains(edge.from_key.as_str()) && alert_keys.contains(edge.to_key.as_str()) {
            adjacency.entry(&edge.from_key).or_default().push(&edge.to_key);
            adjacency.entry(&edge.to_key).or_default().push(&edge.from_key);
        }
    }

    let mut visited: HashSet<&str> = HashSet::new();
    let mut clusters = Vec::new();

    for alert in alerts {
        let key = alert.resource_key.as_str();
        if visited.contains(key) {
            continue;
        }
        let mut component = Vec::new();
        let mut queue = VecDeque::new();
        queue.push_back(key);
        visited.insert(key);
        while let Some(current) = queue.pop_front() {
            component.push(current);
            if let Some(neighbors) = adjacency.get(current) {
                for &n in neighbors {
                    if visited.insert(n) {
                        queue.push_back(n);
                    }
                }
            }
        }
        component.sort();

        let cluster_alerts: Vec<ClusterAlert> = alerts
            .iter()
            .filter(|a| component.contains(&a.resource_key.as_str()))
            .cloned()
            .collect();

        let basis = correlation_basis(snapshot, &cluster_alerts);
        let root_candidates = root_candidates(&cluster_alerts, &adjacency);
        let confidence = root_candidates.first().map(|r| r.confidence).unwrap_or(0.0);

        clusters.push(IssueCluster {
            id: format!("cluster-{}", cluster_alerts[0].resource_key),
            affected_resources: cluster_alerts.iter().map(|a| a.resource_key.clone()).collect(),
            root_candidates,
            confidence,
            correlation_basis: basis,
            alerts: cluster_alerts,
        });
    }

    clusters
}

fn correlation_basis(snapshot: &TopologySnapshot, alerts: &[ClusterAlert]) -> Vec<String> {
    let mut basis = Vec::new();

    let component_count = snapshot
        .nodes
        .keys()
        .filter(|k| alerts.iter().any(|a| &a.resource_key == *k))
        .count();
    if component_count > 1 {
        basis.push("topology".to_string());
    }

    let namespaces: HashSet<Option<&str>> = alerts.iter().map(|a| namespace_of(&a.resource_key)).collect();
    if namespaces.len() == 1 && alerts.len() > 1 && namespaces.iter().next().map(|n| n.is_some()).unwrap_or(false) {
        basis.push("namespace".to_string());
    }

    if alerts.iter().any(|a| kind_of(&a.resource_key) == "node") {
        basis.push("node_affinity".to_string());
    }
    if alerts.iter().any(|a| kind_of(&a.resource_key) == "operator") {
        basis.push("control_plane_fan_out".to_string());
    }

    if basis.is_empty() {
        basis.push("temporal".to_string());
    }
    basis
}

fn root_candidates(alerts: &[ClusterAlert], adjacency: &HashMap<&str, Vec<&str>>) -> Vec<RootCandidate> {
    let mut candidates: Vec<RootCandidate> = alerts
        .iter()
        .map(|alert| {
            let connected = adjacency.get(alert.resource_key.as_str()).map(|v| v.len()).unwrap_or(0);
            let kind = kind_of(&alert.resource_key);
            let confidence = (0.4 + 0.15 * connected as f64 + kind_weight(kind)).min(1.0);
            let supporting_signals = adjacency
                .get(alert.resource_key.as_str())
                .map(|neighbors| {
                    neighbors
                        .iter()
                        .filter_map(|n| alerts.iter().find(|a| &a.resource_key == n))
                        .map(|a| a.alert_type.clone())
                        .collect()
                })
                .unwrap_or_default();
            RootCandidate {
                resource_key: alert.resource_key.clone(),
                hypothesis: format!("{} is the likely root ({})", alert.resource_key, alert.alert_type),
                supporting_signals,
                confidence,
            }
        })
        .collect();

    candidates.sort_by(|a, b| b.confidence.partial_cmp(&a.confidence).unwrap());
    candidates.truncate(2);
    candidates
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::topology::types::{EdgeRelation, TopologyNode};
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

    fn scenario_s1_snapshot() -> TopologySnapshot {
        let mut snap = TopologySnapshot::new();
        snap.insert_node(node("pod", Some("payments"), "auth-5b6q", "CrashLoopBackOff"));
        snap.insert_node(node("node", None, "worker-1", "NotReady"));
        snap.add_edge("node/worker-1", "pod/payments/auth-5b6q", EdgeRelation::Hosts);
        snap
    }

    #[test]
    fn scenario_s1_yields_one_cluster_with_node_as_top_root() {
        let snapshot = scenario_s1_snapshot();
        let alerts = extract_alerts(&snapshot);
        assert_eq!(alerts.len(), 2);

        let clusters = correlate(&snapshot, &alerts);
        assert_eq!(clusters.len(), 1);
        assert_eq!(clusters[0].root_candidates[0].resource_key, "node/worker-1");
    }

    #[test]
    fn isolated_alert_forms_singleton_cluster() {
        let mut snap = TopologySnapshot::new();
        snap.insert_node(node("pod", Some("prod"), "orphan", "Pending"));
        let alerts = extract_alerts(&snap);
        let clusters = correlate(&snap, &alerts);
        assert_eq!(clusters.len(), 1);
        assert_eq!(clusters[0].alerts.len(), 1);
    }

    #[test]
    fn empty_topology_yields_empty_clusters() {
        let snap = TopologySnapshot::new();
        let alerts = extract_alerts(&snap);
        assert!(alerts.is_empty());
        assert!(correlate(&snap, &alerts).is_empty());
    }
}
