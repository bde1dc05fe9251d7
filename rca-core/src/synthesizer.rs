//! Synthesizer: turns four domain agents' independent reports into one
//! causal narrative and a platform-health verdict.
//!
//! Three stages. Stage 1 is a pure deterministic merge — no LLM, no
//! nondeterminism. Stages 2 and 3 are LLM calls whose freedom is bounded
//! by a closed link-type vocabulary, a fixed output schema, and a
//! pre-filtered search space (the causal firewall withholds blocked
//! links before the prompt is built).

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::causal::CausalSearchSpace;
use crate::domain_agents::{Anomaly, DomainReport, DomainReportStatus};
use crate::llm::{ChatMessage, CompletionRequest, LLMClient};
use crate::topology::RootCandidate;

/// Closed vocabulary of causal mechanisms an LLM-proposed link may name.
/// `unknown` is the escape hatch for a mechanism the model cannot name
/// more precisely; it is never silently substituted for a specific one.
pub const LINK_TYPES: &[&str] = &[
    "resource_exhaustion_to_pod_eviction",
    "node_failure_to_workload_rescheduling",
    "dns_failure_to_api_unreachable",
    "certificate_expiry_to_tls_handshake_failure",
    "unknown",
];

fn normalize_description(description: &str) -> String {
    description.trim().to_lowercase()
}

/// Stage 1: union anomalies across reports, deduplicating on case- and
/// whitespace-normalized description. First occurrence wins.
pub fn merge_anomalies(reports: &[DomainReport]) -> Vec<Anomaly> {
    let mut seen = std::collections::HashSet::new();
    let mut merged = Vec::new();
    for report in reports {
        for anomaly in &report.anomalies {
            let key = normalize_description(&anomaly.description);
            if seen.insert(key) {
                merged.push(anomaly.clone());
            }
        }
    }
    merged
}

/// Data completeness = (domains SUCCESS or PARTIAL) / (domains not
/// SKIPPED). Zero domains dispatched (all skipped, or none at all) is
/// reported as full completeness: there is nothing incomplete about an
/// empty denominator.
pub fn data_completeness(reports: &[DomainReport]) -> f64 {
    let eligible = reports
        .iter()
        .filter(|r| r.status != DomainReportStatus::Skipped)
        .count();
    if eligible == 0 {
        return 1.0;
    }
    let complete = reports
        .iter()
        .filter(|r| matches!(r.status, DomainReportStatus::Success | DomainReportStatus::Partial))
        .count();
    complete as f64 / eligible as f64
}

/// One edge in a proposed causal chain.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CausalLink {
    pub from: String,
    pub to: String,
    pub link_type: String,
    pub confidence: f64,
}

/// A chain of causal links sharing a single root, per the single-root
/// rule. Chain confidence is the weakest link's.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CausalChain {
    pub root: String,
    pub links: Vec<CausalLink>,
    pub confidence: f64,
}

impl CausalChain {
    fn weakest_link_confidence(links: &[CausalLink]) -> f64 {
        links
            .iter()
            .map(|l| l.confidence)
            .fold(f64::INFINITY, f64::min)
            .min(1.0)
            .max(0.0)
    }

    fn from_links(root: String, links: Vec<CausalLink>) -> Self {
        let confidence = if links.is_empty() { 0.0 } else { Self::weakest_link_confidence(&links) };
        Self { root, links, confidence }
    }
}

/// An anomaly the causal-reasoning stage could not fit into any chain.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UncorrelatedFinding {
    pub description: String,
    pub evidence_ref: String,
}

#[derive(Debug, Deserialize)]
struct RawLink {
    from: String,
    to: String,
    link_type: String,
    confidence: f64,
}

#[derive(Debug, Deserialize)]
struct RawChain {
    root: String,
    links: Vec<RawLink>,
}

#[derive(Debug, Deserialize, Default)]
struct RawCausalOutput {
    #[serde(default)]
    causal_chains: Vec<RawChain>,
    #[serde(default)]
    uncorrelated_findings: Vec<UncorrelatedFinding>,
}

fn extract_json_object(response: &str) -> Option<&str> {
    let start = response.find('{')?;
    let end = response.rfind('}')?;
    if end > start {
        Some(&response[start..=end])
    } else {
        None
    }
}

fn causal_rules_prompt() -> &'static str {
    "Six rules govern every proposed link: \
     1) temporal — the cause's first evidence must precede the effect's; \
     2) mechanism — every edge must name a link type, never \"same time\"; \
     3) domain boundary — cross-domain edges must name the infrastructure mechanism; \
     4) single root per chain, two independent roots become two chains; \
     5) weakest-link — chain confidence is the minimum of its link confidences; \
     6) observability confirmation — cross-domain causality requires evidence in the \
     effect domain that references the cause resource."
}

/// Stage 2: propose causal chains over the merged anomalies, bounded by
/// the causal firewall's pre-filtered search space and the closed
/// link-type vocabulary. On an unparseable response, degrades to: no
/// chains, every anomaly reported as uncorrelated.
pub async fn reason_causally(
    client: &Arc<dyn LLMClient>,
    model: &str,
    merged: &[Anomaly],
    search_space: &CausalSearchSpace,
    root_candidates: &[RootCandidate],
) -> (Vec<CausalChain>, Vec<UncorrelatedFinding>) {
    let fallback = || {
        let findings = merged
            .iter()
            .map(|a| UncorrelatedFinding {
                description: a.description.clone(),
                evidence_ref: a.evidence_ref.clone(),
            })
            .collect();
        (Vec::new(), findings)
    };

    if merged.is_empty() {
        return (Vec::new(), Vec::new());
    }

    let system = format!(
        "You are a causal-reasoning assistant for an incident diagnosis. \
         Propose causal chains linking the given anomalies, using only these \
         link types: {:?}. {} \
         {} links were blocked by the topology firewall and must not be proposed. \
         Emit strict JSON: {{\"causal_chains\":[{{\"root\":\"...\",\"links\":\
         [{{\"from\":\"...\",\"to\":\"...\",\"link_type\":\"...\",\"confidence\":0.0}}]}}],\
         \"uncorrelated_findings\":[{{\"description\":\"...\",\"evidence_ref\":\"...\"}}]}}. \
         No prose outside the JSON object.",
        LINK_TYPES,
        causal_rules_prompt(),
        search_space.total_blocked,
    );

    let payload = serde_json::json!({
        "anomalies": merged,
        "valid_links": search_space.valid_links,
        "annotated_links": search_space.annotated_links,
        "root_candidates": root_candidates,
    });

    let request = CompletionRequest::new()
        .with_model(model)
        .with_system(system)
        .with_message(ChatMessage::user(payload.to_string()));

    let response_text = match client.complete(request).await {
        Ok(response) => response.content,
        Err(_) => return fallback(),
    };

    let Some(raw) = extract_json_object(&response_text)
        .and_then(|json| serde_json::from_str::<RawCausalOutput>(json).ok())
    else {
        return fallback();
    };

    let chains = raw
        .causal_chains
        .into_iter()
        .map(|chain| {
            let links = chain
                .links
                .into_iter()
                .map(|l| CausalLink {
                    from: l.from,
                    to: l.to,
                    link_type: l.link_type,
                    confidence: l.confidence.clamp(0.0, 1.0),
                })
                .collect();
            CausalChain::from_links(chain.root, links)
        })
        .collect();

    (chains, raw.uncorrelated_findings)
}

/// Overall platform-health verdict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PlatformHealth {
    Healthy,
    Degraded,
    Critical,
    Unknown,
}

/// Scope of an incident's impact.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BlastRadius {
    pub namespaces: u32,
    pub pods: u32,
    pub nodes: u32,
    pub summary: String,
}

/// Remediation steps grouped by urgency.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RemediationPlan {
    pub immediate: Vec<String>,
    pub long_term: Vec<String>,
}

#[derive(Debug, Deserialize, Default)]
struct RawVerdict {
    #[serde(default)]
    platform_health: String,
    #[serde(default)]
    blast_radius: BlastRadius,
    #[serde(default)]
    remediation: RemediationPlan,
    #[serde(default)]
    re_dispatch_needed: bool,
    #[serde(default)]
    re_dispatch_domains: Vec<String>,
}

fn parse_platform_health(raw: &str) -> PlatformHealth {
    match raw {
        "HEALTHY" => PlatformHealth::Healthy,
        "DEGRADED" => PlatformHealth::Degraded,
        "CRITICAL" => PlatformHealth::Critical,
        _ => PlatformHealth::Unknown,
    }
}

/// Final synthesized report for one diagnostic graph run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClusterHealthReport {
    pub platform_health: PlatformHealth,
    pub blast_radius: BlastRadius,
    pub remediation: RemediationPlan,
    pub re_dispatch_needed: bool,
    pub re_dispatch_domains: Vec<String>,
    pub causal_chains: Vec<CausalChain>,
    pub uncorrelated_findings: Vec<UncorrelatedFinding>,
    pub data_completeness: f64,
}

/// Stage 3: produce the platform-health verdict from the chains Stage 2
/// built. On an unparseable response, degrades to an `UNKNOWN` health
/// verdict with no remediation and no re-dispatch — never guesses at a
/// worse-than-warranted or better-than-warranted state.
pub async fn synthesize(
    client: &Arc<dyn LLMClient>,
    model: &str,
    reports: &[DomainReport],
    search_space: &CausalSearchSpace,
    root_candidates: &[RootCandidate],
) -> ClusterHealthReport {
    let merged = merge_anomalies(reports);
    let (causal_chains, uncorrelated_findings) =
        reason_causally(client, model, &merged, search_space, root_candidates).await;
    let completeness = data_completeness(reports);

    let system = "You are producing the final incident verdict from causal chains \
                  already reasoned over the evidence. Emit strict JSON: \
                  {\"platform_health\":\"HEALTHY\"|\"DEGRADED\"|\"CRITICAL\"|\"UNKNOWN\",\
                  \"blast_radius\":{\"namespaces\":0,\"pods\":0,\"nodes\":0,\"summary\":\"...\"},\
                  \"remediation\":{\"immediate\":[],\"long_term\":[]},\
                  \"re_dispatch_needed\":false,\"re_dispatch_domains\":[]}. \
                  No prose outside the JSON object.";

    let payload = serde_json::json!({
        "causal_chains": causal_chains,
        "uncorrelated_findings": uncorrelated_findings,
        "data_completeness": completeness,
    });

    let request = CompletionRequest::new()
        .with_model(model)
        .with_system(system)
        .with_message(ChatMessage::user(payload.to_string()));

    let fallback = || ClusterHealthReport {
        platform_health: PlatformHealth::Unknown,
        blast_radius: BlastRadius::default(),
        remediation: RemediationPlan::default(),
        re_dispatch_needed: false,
        re_dispatch_domains: Vec::new(),
        causal_chains: causal_chains.clone(),
        uncorrelated_findings: uncorrelated_findings.clone(),
        data_completeness: completeness,
    };

    let response_text = match client.complete(request).await {
        Ok(response) => response.content,
        Err(_) => return fallback(),
    };

    let Some(raw) = extract_json_object(&response_text)
        .and_then(|json| serde_json::from_str::<RawVerdict>(json).ok())
    else {
        return fallback();
    };

    ClusterHealthReport {
        platform_health: parse_platform_health(&raw.platform_health),
        blast_radius: raw.blast_radius,
        remediation: raw.remediation,
        re_dispatch_needed: raw.re_dispatch_needed,
        re_dispatch_domains: raw.re_dispatch_domains,
        causal_chains,
        uncorrelated_findings,
        data_completeness: completeness,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain_agents::{DomainKind, TruncationFlags};

    fn report(status: DomainReportStatus) -> DomainReport {
        DomainReport {
            domain: DomainKind::Node,
            status,
            failure_reason: None,
            confidence: 0,
            anomalies: Vec::new(),
            ruled_out: Vec::new(),
            evidence_refs: Vec::new(),
            truncation: TruncationFlags::default(),
            duration_ms: 0,
        }
    }

    #[test]
    fn scenario_s2_data_completeness_excludes_skipped() {
        let reports = vec![
            report(DomainReportStatus::Success),
            report(DomainReportStatus::Success),
            report(DomainReportStatus::Failed),
            report(DomainReportStatus::Skipped),
        ];
        let completeness = data_completeness(&reports);
        assert!((completeness - (2.0 / 3.0)).abs() < 1e-9);
    }

    #[test]
    fn all_skipped_reports_yield_full_completeness() {
        let reports = vec![report(DomainReportStatus::Skipped), report(DomainReportStatus::Skipped)];
        assert_eq!(data_completeness(&reports), 1.0);
    }

    #[test]
    fn merge_anomalies_dedups_on_normalized_description() {
        let mut r1 = report(DomainReportStatus::Success);
        r1.anomalies.push(Anomaly {
            domain: "node".into(),
            anomaly_id: "a1".into(),
            description: "Node NotReady".into(),
            evidence_ref: "pin-1".into(),
            severity: "high".into(),
        });
        let mut r2 = report(DomainReportStatus::Success);
        r2.anomalies.push(Anomaly {
            domain: "control_plane".into(),
            anomaly_id: "a2".into(),
            description: "  node notready  ".into(),
            evidence_ref: "pin-2".into(),
            severity: "high".into(),
        });

        let merged = merge_anomalies(&[r1, r2]);
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].evidence_ref, "pin-1");
    }

    #[test]
    fn chain_confidence_is_the_weakest_link() {
        let links = vec![
            CausalLink { from: "a".into(), to: "b".into(), link_type: "unknown".into(), confidence: 0.9 },
            CausalLink { from: "b".into(), to: "c".into(), link_type: "unknown".into(), confidence: 0.4 },
        ];
        let chain = CausalChain::from_links("a".into(), links);
        assert_eq!(chain.confidence, 0.4);
    }

    #[test]
    fn link_type_vocabulary_includes_unknown_escape_hatch() {
        assert!(LINK_TYPES.contains(&"unknown"));
    }
}
