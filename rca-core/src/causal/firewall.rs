//! Causal firewall: turns issue clusters into a search space of causal
//! links, blocking any direction the invariant table rules out and
//! annotating the ones a soft rule casts doubt on.

use super::invariants::{find_blocking_invariant, SoftRule, SOFT_RULES};
use crate::topology::IssueCluster;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A causal link the firewall accepted without reservation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidLink {
    pub from_resource: String,
    pub to_resource: String,
}

/// A causal link the firewall accepted but flagged with a low-confidence
/// soft rule.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnnotatedLink {
    pub from_resource: String,
    pub to_resource: String,
    pub soft_rule_id: &'static str,
    pub confidence_hint: f64,
}

/// A causal link the firewall rejected outright.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlockedLink {
    pub from_resource: String,
    pub to_resource: String,
    pub reason_code: &'static str,
    pub invariant_id: &'static str,
    pub invariant_description: &'static str,
    pub timestamp: DateTime<Utc>,
}

/// The published outcome of running the firewall over a set of issue
/// clusters: every candidate link bucketed into valid, annotated, or
/// blocked, plus the counts used for the `total_evaluated = |valid| +
/// |annotated| + |blocked|` invariant.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CausalSearchSpace {
    pub valid_links: Vec<ValidLink>,
    #[serde(bound(deserialize = "AnnotatedLink: Deserialize<'de>"))]
    pub annotated_links: Vec<AnnotatedLink>,
    #[serde(bound(deserialize = "BlockedLink: Deserialize<'de>"))]
    pub blocked_links: Vec<BlockedLink>,
    pub total_evaluated: usize,
    pub total_blocked: usize,
    pub total_annotated: usize,
}

/// First `/`-delimited segment of a resource key, e.g. `pod` from
/// `pod/payments/auth-5b6q`.
fn extract_kind(resource_key: &str) -> &str {
    resource_key.split('/').next().unwrap_or(resource_key)
}

/// Both-direction ordered pairs of alerts within each cluster.
fn generate_candidate_links(clusters: &[IssueCluster]) -> Vec<(String, String)> {
    let mut links = Vec::new();
    for cluster in clusters {
        for (i, a) in cluster.alerts.iter().enumerate() {
            for (j, b) in cluster.alerts.iter().enumerate() {
                if i == j {
                    continue;
                }
                links.push((a.resource_key.clone(), b.resource_key.clone()));
            }
        }
    }
    links
}

/// `hosts_edges` lists `(node_resource, pod_resource)` pairs observed in
/// the topology, used to check whether a node's failure cascaded to the
/// pods it hosts (SOFT-001).
fn check_soft_rules(
    from: &str,
    to: &str,
    from_kind: &str,
    to_kind: &str,
    hosts_edges: &[(String, String)],
) -> Option<&'static SoftRule> {
    if from_kind == "node" && to_kind == "pod" {
        let cascaded = hosts_edges
            .iter()
            .any(|(node, pod)| node == from && pod != to);
        if !cascaded {
            return SOFT_RULES.iter().find(|r| r.id == "SOFT-001");
        }
    }
    if from_kind == "pvc" && to_kind == "storage_class" {
        return SOFT_RULES.iter().find(|r| r.id == "SOFT-003");
    }
    None
}

/// Run the firewall over `clusters`, classifying every candidate link.
pub fn causal_firewall(clusters: &[IssueCluster], hosts_edges: &[(String, String)]) -> CausalSearchSpace {
    let mut space = CausalSearchSpace::default();

    for (from, to) in generate_candidate_links(clusters) {
        let from_kind = extract_kind(&from);
        let to_kind = extract_kind(&to);

        if let Some(inv) = find_blocking_invariant(from_kind, to_kind) {
            space.blocked_links.push(BlockedLink {
                from_resource: from,
                to_resource: to,
                reason_code: "violates_topology_direction",
                invariant_id: inv.id,
                invariant_description: inv.description,
                timestamp: Utc::now(),
            });
            continue;
        }

        if let Some(rule) = check_soft_rules(&from, &to, from_kind, to_kind, hosts_edges) {
            space.annotated_links.push(AnnotatedLink {
                from_resource: from,
                to_resource: to,
                soft_rule_id: rule.id,
                confidence_hint: rule.confidence_hint,
            });
            continue;
        }

        space.valid_links.push(ValidLink {
            from_resource: from,
            to_resource: to,
        });
    }

    space.total_blocked = space.blocked_links.len();
    space.total_annotated = space.annotated_links.len();
    space.total_evaluated = space.valid_links.len() + space.annotated_links.len() + space.blocked_links.len();
    space
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use crate::topology::ClusterAlert;

    fn alert(resource_key: &str, alert_type: &str) -> ClusterAlert {
        ClusterAlert {
            resource_key: resource_key.to_string(),
            alert_type: alert_type.to_string(),
            severity: "high".to_string(),
            timestamp: Utc::now(),
        }
    }

    fn cluster(alerts: Vec<ClusterAlert>) -> IssueCluster {
        IssueCluster {
            id: "cluster-0".to_string(),
            affected_resources: alerts.iter().map(|a| a.resource_key.clone()).collect(),
            root_candidates: Vec::new(),
            confidence: 0.0,
            correlation_basis: Vec::new(),
            alerts,
        }
    }

    #[test]
    fn scenario_s1_pod_to_node_blocked_node_to_pod_passes() {
        let clusters = vec![cluster(vec![
            alert("pod/payments/auth-5b6q", "CrashLoopBackOff"),
            alert("node/worker-1", "NotReady"),
        ])];
        let hosts_edges = vec![("node/worker-1".to_string(), "pod/payments/auth-5b6q".to_string())];

        let space = causal_firewall(&clusters, &hosts_edges);

        let blocked = space
            .blocked_links
            .iter()
            .find(|l| l.from_resource == "pod/payments/auth-5b6q" && l.to_resource == "node/worker-1")
            .expect("pod->node must be blocked");
        assert_eq!(blocked.invariant_id, "INV-CP-006");

        assert!(space
            .valid_links
            .iter()
            .any(|l| l.from_resource == "node/worker-1" && l.to_resource == "pod/payments/auth-5b6q"));
    }

    #[test]
    fn node_to_pod_without_cascade_is_annotated_soft_001() {
        let clusters = vec![cluster(vec![
            alert("node/worker-2", "NotReady"),
            alert("pod/prod/checkout-1", "CrashLoopBackOff"),
        ])];
        // No hosts edge recorded at all: no observed cascade.
        let space = causal_firewall(&clusters, &[]);

        let annotated = space
            .annotated_links
            .iter()
            .find(|l| l.from_resource == "node/worker-2" && l.to_resource == "pod/prod/checkout-1")
            .expect("node->pod without cascade must be annotated");
        assert_eq!(annotated.soft_rule_id, "SOFT-001");
    }

    #[test]
    fn total_evaluated_equals_bucket_sum() {
        let clusters = vec![cluster(vec![
            alert("pod/payments/auth-5b6q", "CrashLoopBackOff"),
            alert("node/worker-1", "NotReady"),
            alert("service/payments/checkout", "Degraded"),
        ])];
        let space = causal_firewall(&clusters, &[]);
        assert_eq!(
            space.total_evaluated,
            space.valid_links.len() + space.annotated_links.len() + space.blocked_links.len()
        );
    }

    #[test]
    fn empty_clusters_yield_empty_search_space() {
        let space = causal_firewall(&[], &[]);
        assert_eq!(space.total_evaluated, 0);
        assert!(space.valid_links.is_empty());
        assert!(space.blocked_links.is_empty());
    }
}
