//! Tool Executor: bounded, validated reads of external observability
//! sources, mediated through named intents.
//!
//! [`ToolExecutor`] translates an intent name and a parameter map into a
//! single call against exactly one [`ClusterClient`] collector, then
//! classifies the raw response into a [`ToolResult`]. No intent ever
//! dispatches more than one external call, and every error surfaced to a
//! caller is one of a fixed set of sanitized category phrases (see
//! [`crate::error::Error`]).

mod collector;
mod executor;
mod intents;

pub use collector::{ClusterClient, MockClusterClient};
pub use executor::{EventsAccessorResult, LogsAccessorResult, ToolExecutor, YamlAccessorResult};
pub use intents::{validate_params, Intent, ParamSchema, ParamType};

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Kind of evidence a tool result or evidence pin carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EvidenceType {
    Log,
    Metric,
    Trace,
    K8sEvent,
    K8sResource,
    Code,
    Change,
}

/// Diagnosis domain a piece of evidence belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Domain {
    Compute,
    Network,
    Storage,
    ControlPlane,
    Unknown,
}

/// What triggered a tool call, which in turn decides an evidence pin's
/// `source` (`auto` vs `manual`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggeredBy {
    AutomatedPipeline,
    UserChat,
    QuickAction,
}

/// Context carried alongside a `ToolResult` into the evidence pin factory:
/// the scope the call was made under.
#[derive(Debug, Clone, Default)]
pub struct RouterContext {
    pub namespace: Option<String>,
    pub service: Option<String>,
    pub resource_name: Option<String>,
    pub time_window: Option<String>,
}

/// Normalized result of dispatching one tool call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolResult {
    pub success: bool,
    pub intent: String,
    pub raw_output: String,
    pub summary: String,
    pub evidence_snippets: Vec<String>,
    pub evidence_type: EvidenceType,
    pub domain: Domain,
    pub severity: Option<String>,
    pub error: Option<String>,
    pub metadata: HashMap<String, serde_json::Value>,
}

impl ToolResult {
    pub fn success(
        intent: impl Into<String>,
        summary: impl Into<String>,
        evidence_type: EvidenceType,
        domain: Domain,
    ) -> Self {
        Self {
            success: true,
            intent: intent.into(),
            raw_output: String::new(),
            summary: summary.into(),
            evidence_snippets: Vec::new(),
            evidence_type,
            domain,
            severity: None,
            error: None,
            metadata: HashMap::new(),
        }
    }

    pub fn failure(intent: impl Into<String>, error: impl Into<String>) -> Self {
        let error = error.into();
        Self {
            success: false,
            intent: intent.into(),
            raw_output: String::new(),
            summary: error.clone(),
            evidence_snippets: Vec::new(),
            evidence_type: EvidenceType::Log,
            domain: Domain::Unknown,
            severity: None,
            error: Some(error),
            metadata: HashMap::new(),
        }
    }
}

/// Classify a K8s resource kind or intent name into a diagnosis domain.
pub fn classify_domain(kind_or_intent: &str) -> Domain {
    let s = kind_or_intent.to_lowercase();
    if s.contains("coredns") || s.contains("dns") || s.contains("network") || s.contains("ingress")
    {
        Domain::Network
    } else if s.contains("apiserver") || s.contains("api_server") || s.contains("etcd") {
        Domain::ControlPlane
    } else if s.contains("pod") || s.contains("node") || s.contains("deployment") {
        Domain::Compute
    } else if s.contains("pvc") || s.contains("storage") || s.contains("sc") {
        Domain::Storage
    } else {
        Domain::Unknown
    }
}
