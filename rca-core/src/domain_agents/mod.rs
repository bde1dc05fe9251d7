//! Domain agents: one LLM-assisted, scope-bounded analysis pass per
//! infrastructure domain.
//!
//! All four instances (control plane, node, network, storage) share the
//! same fetch-limit/parse/report shape; what differs is the system
//! prompt and which collector calls each one issues. [`DomainAgent`]
//! captures the shared machinery; [`DomainKind`] parametrizes it.

use crate::llm::{ChatMessage, CompletionRequest, LLMClient};
use crate::topology::DiagnosticScope;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;

/// Per-namespace object fetch caps. Exceeding one sets the matching
/// truncation flag rather than failing the pass.
pub const EVENTS_LIMIT: usize = 500;
pub const PODS_LIMIT: usize = 1000;
pub const LOG_LINES_LIMIT: usize = 2000;
pub const METRIC_POINTS_LIMIT: usize = 500;
pub const NODES_LIMIT: usize = 500;
pub const PVCS_LIMIT: usize = 500;

/// Which infrastructure domain an agent covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DomainKind {
    ControlPlane,
    Node,
    Network,
    Storage,
}

impl DomainKind {
    pub fn name(&self) -> &'static str {
        match self {
            DomainKind::ControlPlane => "control_plane",
            DomainKind::Node => "node",
            DomainKind::Network => "network",
            DomainKind::Storage => "storage",
        }
    }

    fn system_prompt(&self, platform: Platform) -> String {
        let platform_name = match platform {
            Platform::Kubernetes => "Kubernetes",
            Platform::OpenShift => "OpenShift",
        };
        let focus = match self {
            DomainKind::ControlPlane => "API server, etcd, scheduler, and controller-manager health",
            DomainKind::Node => "node readiness, resource pressure, and kubelet health",
            DomainKind::Network => "DNS, ingress, service routing, and CNI plugin health",
            DomainKind::Storage => "PVC binding, storage class health, and volume attachment",
        };
        format!(
            "You are a {platform_name} {focus} analyst. Given the evidence payload, \
             emit strict JSON: {{\"anomalies\":[{{\"domain\",\"anomaly_id\",\"description\",\
             \"evidence_ref\",\"severity\"}}],\"ruled_out\":[],\"confidence\":0..100}}. \
             No prose outside the JSON object."
        )
    }
}

/// Target platform, changes only the domain agent's system prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Platform {
    Kubernetes,
    OpenShift,
}

/// Outcome of one domain agent's pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DomainReportStatus {
    Pending,
    Running,
    Success,
    Partial,
    Failed,
    Skipped,
}

/// Why a domain agent failed, when it did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureReason {
    Timeout,
    RbacDenied,
    ApiUnreachable,
    LlmParseError,
    Exception,
}

/// One LLM-reported anomaly.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Anomaly {
    pub domain: String,
    pub anomaly_id: String,
    pub description: String,
    pub evidence_ref: String,
    pub severity: String,
}

/// Which object-limit truncation flags fired during a pass.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct TruncationFlags {
    pub events: bool,
    pub pods: bool,
    pub logs: bool,
    pub metrics: bool,
    pub nodes: bool,
    pub pvcs: bool,
}

/// Result of one domain agent's analysis.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DomainReport {
    pub domain: DomainKind,
    pub status: DomainReportStatus,
    pub failure_reason: Option<FailureReason>,
    pub confidence: u8,
    pub anomalies: Vec<Anomaly>,
    pub ruled_out: Vec<String>,
    pub evidence_refs: Vec<String>,
    pub truncation: TruncationFlags,
    pub duration_ms: u64,
}

/// Raw shape a domain agent's LLM call is expected to return.
#[derive(Debug, Deserialize, Default)]
struct RawDomainResponse {
    #[serde(default)]
    anomalies: Vec<Anomaly>,
    #[serde(default)]
    ruled_out: Vec<String>,
    #[serde(default)]
    confidence: u8,
}

/// Locate the first `{` and last `}` in `response`; return the substring
/// between them, or `None` if the response has no balanced braces at all.
fn extract_json_object(response: &str) -> Option<&str> {
    let start = response.find('{')?;
    let end = response.rfind('}')?;
    if end > start {
        Some(&response[start..=end])
    } else {
        None
    }
}

/// Evidence payload handed to the LLM: a fixed shape built from
/// collector reads, already capped to the object limits.
#[derive(Debug, Clone, Serialize)]
pub struct DomainPayload {
    pub namespace_data: serde_json::Value,
    pub truncation: TruncationFlags,
}

/// One domain's scoped, LLM-assisted analysis pass.
pub struct DomainAgent {
    pub kind: DomainKind,
    client: Arc<dyn LLMClient>,
    model: String,
}

impl DomainAgent {
    pub fn new(kind: DomainKind, client: Arc<dyn LLMClient>, model: impl Into<String>) -> Self {
        Self {
            kind,
            client,
            model: model.into(),
        }
    }

    /// Run this agent's analysis over `payload` within `scope`, on
    /// `platform`. Never propagates an error: failures fold into a
    /// `FAILED` or degraded `SUCCESS` report.
    pub async fn analyze(
        &self,
        scope: &DiagnosticScope,
        payload: &DomainPayload,
        platform: Platform,
    ) -> DomainReport {
        let started = Instant::now();
        let _ = scope; // scope already drove payload construction upstream

        let request = CompletionRequest::new()
            .with_model(self.model.clone())
            .with_system(self.kind.system_prompt(platform))
            .with_message(ChatMessage::user(
                serde_json::to_string(&payload.namespace_data).unwrap_or_default(),
            ));

        let response_text = match self.client.complete(request).await {
            Ok(response) => response.content,
            Err(_) => {
                return DomainReport {
                    domain: self.kind,
                    status: DomainReportStatus::Failed,
                    failure_reason: Some(FailureReason::ApiUnreachable),
                    confidence: 0,
                    anomalies: Vec::new(),
                    ruled_out: Vec::new(),
                    evidence_refs: Vec::new(),
                    truncation: payload.truncation,
                    duration_ms: started.elapsed().as_millis() as u64,
                }
            }
        };

        let parsed = extract_json_object(&response_text)
            .and_then(|json| serde_json::from_str::<RawDomainResponse>(json).ok());

        match parsed {
            Some(raw) => DomainReport {
                domain: self.kind,
                status: DomainReportStatus::Success,
                failure_reason: None,
                confidence: raw.confidence,
                evidence_refs: raw.anomalies.iter().map(|a| a.evidence_ref.clone()).collect(),
                anomalies: raw.anomalies,
                ruled_out: raw.ruled_out,
                truncation: payload.truncation,
                duration_ms: started.elapsed().as_millis() as u64,
            },
            None => {
                tracing::warn!(domain = self.kind.name(), "domain agent response was not parseable JSON");
                DomainReport {
                    domain: self.kind,
                    status: DomainReportStatus::Success,
                    failure_reason: None,
                    confidence: 0,
                    anomalies: Vec::new(),
                    ruled_out: Vec::new(),
                    evidence_refs: Vec::new(),
                    truncation: payload.truncation,
                    duration_ms: started.elapsed().as_millis() as u64,
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extract_json_object_handles_surrounding_prose() {
        let text = "Here is my answer:\n{\"confidence\": 80}\nThanks.";
        assert_eq!(extract_json_object(text), Some("{\"confidence\": 80}"));
    }

    #[test]
    fn scenario_s3_non_json_response_parses_as_empty() {
        let parsed = extract_json_object("Not JSON")
            .and_then(|json| serde_json::from_str::<RawDomainResponse>(json).ok());
        assert!(parsed.is_none());
    }

    #[test]
    fn object_limits_match_the_configured_caps() {
        assert_eq!(EVENTS_LIMIT, 500);
        assert_eq!(PODS_LIMIT, 1000);
        assert_eq!(LOG_LINES_LIMIT, 2000);
        assert_eq!(METRIC_POINTS_LIMIT, 500);
        assert_eq!(NODES_LIMIT, 500);
        assert_eq!(PVCS_LIMIT, 500);
    }
}
