//! Guard mode: the cluster diagnostic graph's alternate tail. Runs the
//! same shared prefix and synthesis as a diagnostic run, then formats
//! the result into a three-layer risk scan instead of a causal
//! narrative.
//!
//! Guard mode only ever runs at cluster scope — a namespace, workload,
//! or component scope would silently narrow what "cluster health"
//! means, so it is rejected rather than honored.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::cluster_graph::{run_core_pipeline, DomainInput};
use crate::domain_agents::{DomainKind, Platform};
use crate::error::{Error, Result};
use crate::llm::LLMClient;
use crate::synthesizer;
use crate::topology::{DiagnosticScope, ScopeLevel, TopologyResolver, TopologySnapshot};

fn severity_weight(severity: &str) -> f64 {
    match severity {
        "critical" => 0.4,
        "high" => 0.25,
        "medium" => 0.1,
        _ => 0.05,
    }
}

/// Overall cluster health as seen by one guard scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OverallHealth {
    Critical,
    Degraded,
    Healthy,
}

/// A risk observed in the current scan: either a domain anomaly or an
/// issue cluster's root hypothesis.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CurrentRisk {
    pub description: String,
    pub resource_key: Option<String>,
    pub severity: String,
    pub source: String,
}

/// A risk implied by a long-term remediation item — something that has
/// not yet manifested as an anomaly but the verdict's remediation plan
/// flags as worth preventing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PredictiveRisk {
    pub description: String,
}

/// Sorted-set difference between this scan's risk descriptions and the
/// previous scan's.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScanDelta {
    pub new_risks: Vec<String>,
    pub resolved_risks: Vec<String>,
}

/// Three-layer guard scan result.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GuardScanResult {
    pub current_risks: Vec<CurrentRisk>,
    pub predictive_risks: Vec<PredictiveRisk>,
    pub delta: ScanDelta,
    pub overall_health: OverallHealth,
    pub risk_score: f64,
    pub scanned_at: DateTime<Utc>,
}

fn overall_health(current_risks: &[CurrentRisk]) -> OverallHealth {
    if current_risks.iter().any(|r| r.severity == "critical") {
        OverallHealth::Critical
    } else if current_risks.iter().any(|r| r.severity == "high") {
        OverallHealth::Degraded
    } else {
        OverallHealth::Healthy
    }
}

fn risk_score(current_risks: &[CurrentRisk]) -> f64 {
    let sum: f64 = current_risks.iter().map(|r| severity_weight(&r.severity)).sum();
    sum.clamp(0.0, 1.0)
}

fn compute_delta(current_risks: &[CurrentRisk], previous: Option<&GuardScanResult>) -> ScanDelta {
    let current: BTreeSet<&str> = current_risks.iter().map(|r| r.description.as_str()).collect();
    let previous_set: BTreeSet<&str> = previous
        .map(|scan| scan.current_risks.iter().map(|r| r.description.as_str()).collect())
        .unwrap_or_default();

    ScanDelta {
        new_risks: current.difference(&previous_set).map(|s| s.to_string()).collect(),
        resolved_risks: previous_set.difference(&current).map(|s| s.to_string()).collect(),
    }
}

/// Validate that `scope` is admissible for a guard scan. Guard mode
/// admits only `ScopeLevel::Cluster`.
pub fn validate_guard_scope(scope: &DiagnosticScope) -> Result<()> {
    if scope.level == ScopeLevel::Cluster {
        Ok(())
    } else {
        Err(Error::InvalidParam(
            "guard mode requires a cluster-level scope".to_string(),
        ))
    }
}

/// Run a guard scan: shared pipeline, synthesis, then format into a
/// [`GuardScanResult`]. `previous` is the prior scan (if any) to diff
/// against.
pub async fn run_guard_scan(
    session_id: &str,
    resolver: &TopologyResolver,
    build_snapshot: impl FnOnce() -> TopologySnapshot,
    scope: DiagnosticScope,
    domains: HashMap<DomainKind, DomainInput>,
    platform: Platform,
    llm_client: Arc<dyn LLMClient>,
    synth_model: &str,
    previous: Option<&GuardScanResult>,
) -> Result<GuardScanResult> {
    validate_guard_scope(&scope)?;

    let output = run_core_pipeline(session_id, resolver, build_snapshot, &scope, domains, platform).await;

    let mut current_risks: Vec<CurrentRisk> = output
        .domain_reports
        .iter()
        .flat_map(|report| {
            report.anomalies.iter().map(move |anomaly| CurrentRisk {
                description: anomaly.description.clone(),
                resource_key: Some(anomaly.evidence_ref.clone()),
                severity: anomaly.severity.clone(),
                source: format!("{}_agent", report.domain.name()),
            })
        })
        .collect();

    for cluster in &output.clusters {
        let top = cluster.root_candidates.first();
        current_risks.push(CurrentRisk {
            description: top
                .map(|c| c.hypothesis.clone())
                .unwrap_or_else(|| format!("unresolved issue cluster {}", cluster.id)),
            resource_key: top.map(|c| c.resource_key.clone()),
            severity: cluster
                .alerts
                .iter()
                .map(|a| a.severity.as_str())
                .max_by_key(|s| (severity_weight(s) * 100.0) as i64)
                .unwrap_or("medium")
                .to_string(),
            source: "issue_cluster".to_string(),
        });
    }

    let root_candidates: Vec<_> = output.clusters.iter().flat_map(|c| c.root_candidates.clone()).collect();
    let verdict = synthesizer::synthesize(
        &llm_client,
        synth_model,
        &output.domain_reports,
        &output.search_space,
        &root_candidates,
    )
    .await;

    let predictive_risks = verdict
        .remediation
        .long_term
        .into_iter()
        .map(|description| PredictiveRisk { description })
        .collect();

    let delta = compute_delta(&current_risks, previous);
    let health = overall_health(&current_risks);
    let score = risk_score(&current_risks);

    Ok(GuardScanResult {
        current_risks,
        predictive_risks,
        delta,
        overall_health: health,
        risk_score: score,
        scanned_at: Utc::now(),
    })
}
