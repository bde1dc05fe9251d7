//! Evidence graph: pins connected by causal edges, from which root causes
//! and a deterministic timeline are derived.
//!
//! Nodes live in a map keyed by [`PinId`]; edges are records holding keys,
//! not pointers, so the graph tolerates cycles and shared references
//! without any unsafe aliasing.

use super::pin::{EvidencePin, PinId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

/// How long two pins from the same tool, making the same claim, are
/// treated as one observation rather than two.
pub const PIN_DEDUP_WINDOW_SECS: i64 = 60;

/// What role a node plays relative to the incident under investigation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeType {
    Symptom,
    Cause,
    ContributingFactor,
    Context,
}

/// How two evidence nodes relate causally.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Relationship {
    Causes,
    Correlates,
    Precedes,
    ContributesTo,
}

/// A node in the evidence graph: one pin, classified.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvidenceNode {
    pub pin_id: PinId,
    pub node_type: NodeType,
}

/// A directed causal edge between two evidence nodes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CausalEdge {
    pub from: PinId,
    pub to: PinId,
    pub relationship: Relationship,
    pub confidence: f64,
}

/// One entry on a session's timeline: a pin's id and timestamp, plus the
/// severity the timeline view renders it at.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimelineEvent {
    pub pin_id: PinId,
    pub timestamp: DateTime<Utc>,
    pub severity: String,
}

/// Pins plus the causal structure asserted between them.
#[derive(Debug, Clone, Default)]
pub struct EvidenceGraph {
    pins: HashMap<PinId, EvidencePin>,
    nodes: HashMap<PinId, EvidenceNode>,
    edges: Vec<CausalEdge>,
    dedup_index: HashMap<(String, String), (PinId, DateTime<Utc>)>,
}

impl EvidenceGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a pin to the graph, classified as `node_type`, and return its
    /// id. If an existing pin shares `(source_tool, claim)` with `pin`
    /// and falls within the dedup window, no new node is created and the
    /// existing pin's id is returned instead.
    pub fn add_evidence(&mut self, pin: EvidencePin, node_type: NodeType) -> PinId {
        let key = (pin.source_tool.clone(), pin.claim.clone());
        if let Some((existing_id, seen_at)) = self.dedup_index.get(&key) {
            let delta = (pin.timestamp - *seen_at).num_seconds().abs();
            if delta <= PIN_DEDUP_WINDOW_SECS {
                return *existing_id;
            }
        }

        let id = pin.id;
        self.dedup_index.insert(key, (id, pin.timestamp));
        self.nodes.insert(id, EvidenceNode { pin_id: id, node_type });
        self.pins.insert(id, pin);
        id
    }

    /// Assert a causal edge. `confidence` is clamped to `[0, 1]`.
    pub fn add_causal_link(
        &mut self,
        from: PinId,
        to: PinId,
        relationship: Relationship,
        confidence: f64,
    ) {
        self.edges.push(CausalEdge {
            from,
            to,
            relationship,
            confidence: confidence.clamp(0.0, 1.0),
        });
    }

    pub fn pin(&self, id: &PinId) -> Option<&EvidencePin> {
        self.pins.get(id)
    }

    pub fn nodes(&self) -> impl Iterator<Item = &EvidenceNode> {
        self.nodes.values()
    }

    pub fn edges(&self) -> &[CausalEdge] {
        &self.edges
    }

    /// Roots of the causal structure: nodes that are the source of some
    /// edge but never a target, unioned with nodes that have no edges at
    /// all. Node type plays no part — a `Context` node with no incoming
    /// edge is as much a root as a `Cause` node.
    pub fn identify_root_causes(&self) -> Vec<PinId> {
        let targets: HashSet<PinId> = self.edges.iter().map(|e| e.to).collect();

        let mut roots: Vec<PinId> = self
            .nodes
            .values()
            .map(|n| n.pin_id)
            .filter(|id| !targets.contains(id))
            .collect();

        roots.sort_by_key(|id| id.to_string());
        roots
    }

    /// Timeline events ordered by pin timestamp, ties broken by id for
    /// determinism. A pin classified `Cause` or `Symptom` carries
    /// `"error"` severity; everything else is `"info"`.
    pub fn build_timeline(&self) -> Vec<TimelineEvent> {
        let mut ordered: Vec<&EvidencePin> = self.pins.values().collect();
        ordered.sort_by(|a, b| {
            a.timestamp
                .cmp(&b.timestamp)
                .then_with(|| a.id.to_string().cmp(&b.id.to_string()))
        });

        ordered
            .into_iter()
            .map(|p| {
                let severity = match self.nodes.get(&p.id).map(|n| n.node_type) {
                    Some(NodeType::Cause) | Some(NodeType::Symptom) => "error",
                    _ => "info",
                };
                TimelineEvent {
                    pin_id: p.id,
                    timestamp: p.timestamp,
                    severity: severity.to_string(),
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::evidence::pin::pin_from_tool_result;
    use crate::tools::{Domain, EvidenceType, RouterContext, ToolResult, TriggeredBy};
    use chrono::Duration as ChronoDuration;

    fn pin(evidence_type: EvidenceType) -> EvidencePin {
        let result = ToolResult::success("x", "x", evidence_type, Domain::Compute);
        pin_from_tool_result(&result, TriggeredBy::AutomatedPipeline, &RouterContext::default())
    }

    #[test]
    fn root_cause_has_no_incoming_causes_edge() {
        let mut graph = EvidenceGraph::new();
        let cause = pin(EvidenceType::K8sEvent);
        let symptom = pin(EvidenceType::Log);
        let cause_id = cause.id;
        let symptom_id = symptom.id;

        graph.add_evidence(cause, NodeType::Cause);
        graph.add_evidence(symptom, NodeType::Symptom);
        graph.add_causal_link(cause_id, symptom_id, Relationship::Causes, 0.9);

        let roots = graph.identify_root_causes();
        assert_eq!(roots, vec![cause_id]);
    }

    #[test]
    fn a_cause_that_is_itself_caused_is_not_a_root() {
        let mut graph = EvidenceGraph::new();
        let upstream = pin(EvidenceType::K8sEvent);
        let downstream = pin(EvidenceType::K8sEvent);
        let upstream_id = upstream.id;
        let downstream_id = downstream.id;

        graph.add_evidence(upstream, NodeType::Cause);
        graph.add_evidence(downstream, NodeType::Cause);
        graph.add_causal_link(upstream_id, downstream_id, Relationship::Causes, 0.8);

        let roots = graph.identify_root_causes();
        assert_eq!(roots, vec![upstream_id]);
    }

    #[test]
    fn isolated_node_is_a_root_regardless_of_node_type() {
        let mut graph = EvidenceGraph::new();
        let context = pin(EvidenceType::Code);
        let context_id = context.id;
        graph.add_evidence(context, NodeType::Context);

        let roots = graph.identify_root_causes();
        assert_eq!(roots, vec![context_id]);
    }

    #[test]
    fn a_source_via_any_relationship_not_just_causes_is_excluded_as_target() {
        let mut graph = EvidenceGraph::new();
        let a = pin(EvidenceType::Metric);
        let b = pin(EvidenceType::Log);
        let a_id = a.id;
        let b_id = b.id;

        graph.add_evidence(a, NodeType::ContributingFactor);
        graph.add_evidence(b, NodeType::Context);
        graph.add_causal_link(a_id, b_id, Relationship::Correlates, 0.5);

        let roots = graph.identify_root_causes();
        assert_eq!(roots, vec![a_id]);
    }

    #[test]
    fn timeline_is_deterministic_for_identical_timestamps() {
        let mut graph = EvidenceGraph::new();
        let a = pin(EvidenceType::Log);
        let b = pin(EvidenceType::Metric);
        graph.add_evidence(a.clone(), NodeType::Symptom);
        graph.add_evidence(b.clone(), NodeType::Symptom);

        let first = graph.build_timeline();
        let second = graph.build_timeline();
        assert_eq!(first, second);
    }

    #[test]
    fn timeline_severity_follows_node_type() {
        let mut graph = EvidenceGraph::new();
        let cause = pin(EvidenceType::K8sEvent);
        let context = pin(EvidenceType::Code);
        let cause_id = cause.id;
        let context_id = context.id;
        graph.add_evidence(cause, NodeType::Cause);
        graph.add_evidence(context, NodeType::Context);

        let timeline = graph.build_timeline();
        let cause_event = timeline.iter().find(|e| e.pin_id == cause_id).unwrap();
        let context_event = timeline.iter().find(|e| e.pin_id == context_id).unwrap();
        assert_eq!(cause_event.severity, "error");
        assert_eq!(context_event.severity, "info");
    }

    #[test]
    fn duplicate_claim_from_the_same_tool_within_the_window_collapses_to_one_node() {
        let mut graph = EvidenceGraph::new();
        let mut first = pin(EvidenceType::Log);
        first.source_tool = "fetch_pod_logs".into();
        first.claim = "pod OOMKilled".into();
        let mut second = first.clone();
        second.id = PinId::new();
        second.timestamp = first.timestamp + ChronoDuration::seconds(30);

        let first_id = graph.add_evidence(first, NodeType::Symptom);
        let second_id = graph.add_evidence(second, NodeType::Symptom);

        assert_eq!(first_id, second_id);
        assert_eq!(graph.nodes().count(), 1);
    }

    #[test]
    fn duplicate_claim_outside_the_window_is_a_new_node() {
        let mut graph = EvidenceGraph::new();
        let mut first = pin(EvidenceType::Log);
        first.source_tool = "fetch_pod_logs".into();
        first.claim = "pod OOMKilled".into();
        let mut second = first.clone();
        second.id = PinId::new();
        second.timestamp = first.timestamp + ChronoDuration::seconds(61);

        let first_id = graph.add_evidence(first, NodeType::Symptom);
        let second_id = graph.add_evidence(second, NodeType::Symptom);

        assert_ne!(first_id, second_id);
        assert_eq!(graph.nodes().count(), 2);
    }
}
