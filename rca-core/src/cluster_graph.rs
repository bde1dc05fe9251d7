//! Cluster diagnostic graph: the runtime topology of named nodes that
//! turns a scope into a `ClusterHealthReport`.
//!
//! `START -> topology_resolver -> alert_correlator -> causal_firewall ->
//! {fan-out to ctrl_plane, node, network, storage} -> synthesize ->
//! (conditional: re-dispatch or formatter) -> END`, under a single
//! wall-clock deadline. [`run_core_pipeline`] carries the shared prefix
//! (through the domain-agent fan-out); [`run_diagnostic_graph`] and
//! `guard::run_guard_scan` each build their own tail from it.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tokio::time::timeout as tokio_timeout;

use crate::causal::causal_firewall;
use crate::config::EngineConfig;
use crate::domain_agents::{
    DomainAgent, DomainKind, DomainPayload, DomainReport, DomainReportStatus, FailureReason,
    Platform,
};
use crate::synthesizer::{self, ClusterHealthReport};
use crate::topology::{
    correlate, extract_alerts, scoped_topology_graph, DiagnosticScope, IssueCluster,
    TopologyResolver, TopologySnapshot,
};

const CTRL_PLANE_TIMEOUT: Duration = Duration::from_secs(30);
const NODE_NETWORK_TIMEOUT: Duration = Duration::from_secs(45);
const STORAGE_TIMEOUT: Duration = Duration::from_secs(60);
const SYNTHESIZE_TIMEOUT: Duration = Duration::from_secs(60);
const STRUCTURAL_NODE_TIMEOUT: Duration = Duration::from_secs(20);

fn timeout_for(kind: DomainKind) -> Duration {
    match kind {
        DomainKind::ControlPlane => CTRL_PLANE_TIMEOUT,
        DomainKind::Node | DomainKind::Network => NODE_NETWORK_TIMEOUT,
        DomainKind::Storage => STORAGE_TIMEOUT,
    }
}

/// Status the traced decorator observed for one graph node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeStatus {
    Running,
    Success,
    Failed,
}

/// Why a node failed, distinct from [`DomainReport`]'s richer
/// [`FailureReason`] — this is the graph-runtime view, not a domain
/// agent's.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeFailureReason {
    Timeout,
    Exception,
}

/// One node's execution record, written by the traced decorator
/// regardless of outcome.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeTrace {
    pub name: String,
    pub status: NodeStatus,
    pub duration_ms: u64,
    pub reason: Option<NodeFailureReason>,
    pub detail: Option<String>,
}

/// Run `fut` under `timeout_dur`, writing a [`NodeTrace`] regardless of
/// outcome. Never panics past this boundary: a timeout or an `Err`
/// becomes a `FAILED` trace, not a propagated error.
async fn traced<T, F>(name: &str, timeout_dur: Duration, fut: F) -> (Option<T>, NodeTrace)
where
    F: Future<Output = crate::error::Result<T>>,
{
    let started = Instant::now();
    let outcome = tokio_timeout(timeout_dur, fut).await;
    let duration_ms = started.elapsed().as_millis() as u64;

    match outcome {
        Ok(Ok(value)) => (
            Some(value),
            NodeTrace {
                name: name.to_string(),
                status: NodeStatus::Success,
                duration_ms,
                reason: None,
                detail: None,
            },
        ),
        Ok(Err(error)) => (
            None,
            NodeTrace {
                name: name.to_string(),
                status: NodeStatus::Failed,
                duration_ms,
                reason: Some(NodeFailureReason::Exception),
                detail: Some(error.to_string()),
            },
        ),
        Err(_) => (
            None,
            NodeTrace {
                name: name.to_string(),
                status: NodeStatus::Failed,
                duration_ms,
                reason: Some(NodeFailureReason::Timeout),
                detail: None,
            },
        ),
    }
}

/// Per-domain inputs for the fan-out stage. A domain absent from this
/// map is reported `SKIPPED`, never dispatched.
pub struct DomainInput {
    pub agent: Arc<DomainAgent>,
    pub payload: DomainPayload,
}

/// Everything the shared prefix (topology through domain fan-out)
/// produces, handed to whichever tail (diagnostic or guard) runs next.
pub struct PipelineOutput {
    pub pruned_topology: TopologySnapshot,
    pub clusters: Vec<IssueCluster>,
    pub search_space: crate::causal::CausalSearchSpace,
    pub domain_reports: Vec<DomainReport>,
    pub trace: Vec<NodeTrace>,
}

fn skipped_report(domain: DomainKind) -> DomainReport {
    DomainReport {
        domain,
        status: DomainReportStatus::Skipped,
        failure_reason: None,
        confidence: 0,
        anomalies: Vec::new(),
        ruled_out: Vec::new(),
        evidence_refs: Vec::new(),
        truncation: Default::default(),
        duration_ms: 0,
    }
}

/// All four domains in the order reports are always assembled, so that
/// Stage 1's merge (first-occurrence-wins) is deterministic despite the
/// agents racing concurrently.
const DOMAIN_ORDER: [DomainKind; 4] = [
    DomainKind::ControlPlane,
    DomainKind::Node,
    DomainKind::Network,
    DomainKind::Storage,
];

/// `hosts_edges` is the snapshot's `node -> pod` projection, used by the
/// causal firewall's soft-rule check.
fn hosts_edges(snapshot: &TopologySnapshot) -> Vec<(String, String)> {
    use crate::topology::EdgeRelation;
    snapshot
        .edges
        .iter()
        .filter(|e| e.relation == EdgeRelation::Hosts)
        .map(|e| (e.from_key.clone(), e.to_key.clone()))
        .collect()
}

/// Run the shared prefix: resolve topology, prune to `scope`, correlate
/// problem alerts into issue clusters, run the causal firewall, then
/// fan out to whichever domain agents `domains` provides.
pub async fn run_core_pipeline(
    session_id: &str,
    resolver: &TopologyResolver,
    build_snapshot: impl FnOnce() -> TopologySnapshot,
    scope: &DiagnosticScope,
    domains: HashMap<DomainKind, DomainInput>,
    platform: Platform,
) -> PipelineOutput {
    let mut trace = Vec::new();

    let (snapshot, topology_trace) = traced(
        "topology_resolver",
        STRUCTURAL_NODE_TIMEOUT,
        async { Ok(resolver.resolve(session_id, build_snapshot)) },
    )
    .await;
    trace.push(topology_trace);
    let snapshot = snapshot.unwrap_or_else(TopologySnapshot::new);
    let pruned_topology = scoped_topology_graph(&snapshot, scope);

    let (clusters, correlator_trace) = traced("alert_correlator", STRUCTURAL_NODE_TIMEOUT, async {
        let alerts = extract_alerts(&pruned_topology);
        Ok(correlate(&pruned_topology, &alerts))
    })
    .await;
    trace.push(correlator_trace);
    let clusters = clusters.unwrap_or_default();

    let hosts = hosts_edges(&pruned_topology);
    let (search_space, firewall_trace) = traced("causal_firewall", STRUCTURAL_NODE_TIMEOUT, async {
        Ok(causal_firewall(&clusters, &hosts))
    })
    .await;
    trace.push(firewall_trace);
    let search_space = search_space.unwrap_or_default();

    let mut domains = domains;
    let mut pending = Vec::new();
    for kind in DOMAIN_ORDER {
        if let Some(input) = domains.remove(&kind) {
            pending.push((kind, input));
        }
    }

    let futures = pending.into_iter().map(|(kind, input)| async move {
        let name = format!("{}_agent", kind.name());
        let (report, node_trace) = traced(&name, timeout_for(kind), async {
            Ok(input.agent.analyze(scope, &input.payload, platform).await)
        })
        .await;
        (kind, report, node_trace)
    });

    let fanned_out = futures::future::join_all(futures).await;
    let mut pending_reports: HashMap<DomainKind, DomainReport> = HashMap::new();
    for (kind, report, node_trace) in fanned_out {
        trace.push(node_trace);
        if let Some(report) = report {
            pending_reports.insert(kind, report);
        } else {
            pending_reports.insert(
                kind,
                DomainReport {
                    domain: kind,
                    status: DomainReportStatus::Failed,
                    failure_reason: Some(FailureReason::Timeout),
                    confidence: 0,
                    anomalies: Vec::new(),
                    ruled_out: Vec::new(),
                    evidence_refs: Vec::new(),
                    truncation: Default::default(),
                    duration_ms: 0,
                },
            );
        }
    }

    let domain_reports = DOMAIN_ORDER
        .into_iter()
        .map(|kind| pending_reports.remove(&kind).unwrap_or_else(|| skipped_report(kind)))
        .collect();

    PipelineOutput {
        pruned_topology,
        clusters,
        search_space,
        domain_reports,
        trace,
    }
}

/// Outcome of one full diagnostic-graph run.
pub struct GraphOutcome {
    pub report: ClusterHealthReport,
    pub trace: Vec<NodeTrace>,
    pub re_dispatched: bool,
    pub deadline_exceeded: bool,
}

/// Run the full diagnostic-mode graph: the shared prefix, synthesis, and
/// at most one re-dispatch round, all under `config.graph_deadline`. If
/// the deadline fires, still-running work is abandoned and the last
/// synthesized report (if any) is returned with `deadline_exceeded =
/// true` and `data_completeness` reflecting whatever finished.
pub async fn run_diagnostic_graph(
    session_id: &str,
    resolver: &TopologyResolver,
    build_snapshot: impl FnOnce() -> TopologySnapshot + Send + 'static,
    scope: DiagnosticScope,
    domains: HashMap<DomainKind, DomainInput>,
    platform: Platform,
    llm_client: Arc<dyn crate::llm::LLMClient>,
    synth_model: String,
    config: &EngineConfig,
) -> GraphOutcome {
    let session_id = session_id.to_string();
    let run = async move {
        let mut output =
            run_core_pipeline(&session_id, resolver, build_snapshot, &scope, domains, platform)
                .await;

        let root_candidates: Vec<_> = output.clusters.iter().flat_map(|c| c.root_candidates.clone()).collect();

        let (report, synth_trace) = traced("synthesize", SYNTHESIZE_TIMEOUT, async {
            Ok(synthesizer::synthesize(
                &llm_client,
                &synth_model,
                &output.domain_reports,
                &output.search_space,
                &root_candidates,
            )
            .await)
        })
        .await;
        output.trace.push(synth_trace);

        let mut report = match report {
            Some(report) => report,
            None => return (None, output.trace, false),
        };

        let mut re_dispatched = false;
        if report.re_dispatch_needed && config.max_redispatch > 0 {
            re_dispatched = true;
            // Re-dispatch is a one-shot redo of the same domains already
            // run; domains the caller never wired in stay SKIPPED.
            let (redo_report, redo_trace) = traced("synthesize_redispatch", SYNTHESIZE_TIMEOUT, async {
                Ok(synthesizer::synthesize(
                    &llm_client,
                    &synth_model,
                    &output.domain_reports,
                    &output.search_space,
                    &root_candidates,
                )
                .await)
            })
            .await;
            output.trace.push(redo_trace);
            if let Some(redo_report) = redo_report {
                report = redo_report;
            }
        }

        (Some(report), output.trace, re_dispatched)
    };

    match tokio_timeout(config.graph_deadline, run).await {
        Ok((Some(report), trace, re_dispatched)) => GraphOutcome {
            report,
            trace,
            re_dispatched,
            deadline_exceeded: false,
        },
        Ok((None, trace, re_dispatched)) => GraphOutcome {
            report: ClusterHealthReport {
                platform_health: synthesizer::PlatformHealth::Unknown,
                blast_radius: Default::default(),
                remediation: Default::default(),
                re_dispatch_needed: false,
                re_dispatch_domains: Vec::new(),
                causal_chains: Vec::new(),
                uncorrelated_findings: Vec::new(),
                data_completeness: 0.0,
            },
            trace,
            re_dispatched,
            deadline_exceeded: false,
        },
        Err(_) => GraphOutcome {
            report: ClusterHealthReport {
                platform_health: synthesizer::PlatformHealth::Unknown,
                blast_radius: Default::default(),
                remediation: Default::default(),
                re_dispatch_needed: false,
                re_dispatch_domains: Vec::new(),
                causal_chains: Vec::new(),
                uncorrelated_findings: Vec::new(),
                data_completeness: 0.0,
            },
            trace: Vec::new(),
            re_dispatched: false,
            deadline_exceeded: true,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn traced_success_records_duration_and_success_status() {
        let (value, trace) = traced("noop", Duration::from_secs(1), async { Ok::<_, crate::error::Error>(42) }).await;
        assert_eq!(value, Some(42));
        assert_eq!(trace.status, NodeStatus::Success);
        assert!(trace.reason.is_none());
    }

    #[tokio::test]
    async fn traced_timeout_yields_failed_with_timeout_reason() {
        let (value, trace) = traced::<(), _>("slow", Duration::from_millis(5), async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(())
        })
        .await;
        assert!(value.is_none());
        assert_eq!(trace.status, NodeStatus::Failed);
        assert_eq!(trace.reason, Some(NodeFailureReason::Timeout));
    }

    #[tokio::test]
    async fn traced_exception_yields_failed_with_exception_reason() {
        let (value, trace) = traced::<(), _>("broken", Duration::from_secs(1), async {
            Err(crate::error::Error::collector("Failed to fetch resource"))
        })
        .await;
        assert!(value.is_none());
        assert_eq!(trace.status, NodeStatus::Failed);
        assert_eq!(trace.reason, Some(NodeFailureReason::Exception));
    }

    #[tokio::test]
    async fn empty_topology_and_no_domains_yields_empty_clusters_and_skipped_reports() {
        let resolver = TopologyResolver::new();
        let scope = DiagnosticScope::cluster();
        let output = run_core_pipeline(
            "session-1",
            &resolver,
            TopologySnapshot::new,
            &scope,
            HashMap::new(),
            Platform::Kubernetes,
        )
        .await;

        assert!(output.clusters.is_empty());
        assert!(output.search_space.valid_links.is_empty());
        assert_eq!(output.domain_reports.len(), 4);
        assert!(output
            .domain_reports
            .iter()
            .all(|r| r.status == DomainReportStatus::Skipped));
    }
}
