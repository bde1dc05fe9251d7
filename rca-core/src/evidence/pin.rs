//! `EvidencePin`: one atomic observation with provenance and confidence.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::tools::{Domain, EvidenceType, RouterContext, ToolResult, TriggeredBy};

/// Unique identifier for an `EvidencePin`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PinId(Uuid);

impl PinId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for PinId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for PinId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Whether a pin was produced by an automated pipeline or a human-triggered path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PinSource {
    Auto,
    Manual,
}

/// Where an `EvidencePin` sits in the critic's validation pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValidationStatus {
    PendingCritic,
    Validated,
    Rejected,
}

/// The critic's judgment of what causal role a pin's claim plays.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CausalRole {
    RootCause,
    CascadingSymptom,
    Correlated,
    Informational,
}

/// Maximum number of code points retained in a pin's raw output.
pub const RAW_OUTPUT_TRUNCATE_CHARS: usize = 50_000;

/// One atomic observation with provenance and confidence.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvidencePin {
    pub id: PinId,
    pub claim: String,
    pub source_agent: Option<String>,
    pub source_tool: String,
    pub confidence: f64,
    pub timestamp: DateTime<Utc>,
    pub evidence_type: EvidenceType,
    pub source: PinSource,
    pub triggered_by: TriggeredBy,
    pub domain: Domain,
    pub validation_status: ValidationStatus,
    pub severity: Option<String>,
    pub causal_role: Option<CausalRole>,
    pub namespace: Option<String>,
    pub service: Option<String>,
    pub resource_name: Option<String>,
    pub raw_output: String,
    pub time_window: Option<String>,
    pub supporting_evidence: Vec<PinId>,
}

/// Normalize a `ToolResult` into an `EvidencePin` with provenance. Pure
/// function: same inputs always produce the same pin (modulo the fresh id
/// and timestamp).
pub fn pin_from_tool_result(
    result: &ToolResult,
    triggered_by: TriggeredBy,
    ctx: &RouterContext,
) -> EvidencePin {
    let source = match triggered_by {
        TriggeredBy::UserChat | TriggeredBy::QuickAction => PinSource::Manual,
        TriggeredBy::AutomatedPipeline => PinSource::Auto,
    };

    let confidence = if !result.success {
        0.0
    } else if !result.evidence_snippets.is_empty() {
        1.0
    } else {
        0.5
    };

    let mut raw_output = result.raw_output.clone();
    if raw_output.chars().count() > RAW_OUTPUT_TRUNCATE_CHARS {
        raw_output = raw_output.chars().take(RAW_OUTPUT_TRUNCATE_CHARS).collect();
    }

    EvidencePin {
        id: PinId::new(),
        claim: result.summary.clone(),
        source_agent: None,
        source_tool: result.intent.clone(),
        confidence,
        timestamp: Utc::now(),
        evidence_type: result.evidence_type,
        source,
        triggered_by,
        domain: result.domain,
        validation_status: ValidationStatus::PendingCritic,
        severity: result.severity.clone(),
        causal_role: None,
        namespace: ctx.namespace.clone(),
        service: ctx.service.clone(),
        resource_name: ctx.resource_name.clone(),
        raw_output,
        time_window: ctx.time_window.clone(),
        supporting_evidence: Vec::new(),
    }
}
