//! Supervisor: the application-service diagnosis workflow. Drives one
//! incident through a fixed phase state machine, deciding which agent
//! to dispatch next from the current phase and the incident's shape,
//! and gating every transition on confidence.
//!
//! This is a separate agent roster and state machine from the cluster
//! diagnostic graph (`crate::cluster_graph`): the supervisor dispatches
//! {log, metrics, k8s, tracing, code} agents one at a time for a single
//! application incident, rather than fanning out four infrastructure
//! domains concurrently.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::attestation::{AttestationGate, Decision as AttestationDecision, GateType};
use crate::error::{Error, Result};
use crate::evidence::PinId;
use crate::reasoning::ReasoningManifest;

/// Phase of an application-incident investigation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Initial,
    CollectingContext,
    LogsAnalyzed,
    MetricsAnalyzed,
    K8sAnalyzed,
    TracingAnalyzed,
    CodeAnalyzed,
    Validating,
    ReInvestigating,
    DiagnosisComplete,
    FixInProgress,
    Complete,
}

/// An agent the supervisor can dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentKind {
    LogAgent,
    MetricsAgent,
    K8sAgent,
    TracingAgent,
    CodeAgent,
}

/// What a confidence gate decided.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GateDecision {
    Proceed,
    AskUser,
}

/// The shape of the incident the dispatch policy conditions on.
#[derive(Debug, Clone, Default)]
pub struct IncidentContext {
    pub namespace: Option<String>,
    pub trace_id: Option<String>,
    pub repo_url: Option<String>,
}

/// One incident's phase-driven investigation state.
pub struct Supervisor {
    phase: Phase,
    reasoning: ReasoningManifest,
    overall_confidence: u8,
    gates: HashMap<GateType, AttestationGate>,
}

impl Default for Supervisor {
    fn default() -> Self {
        Self::new()
    }
}

impl Supervisor {
    pub fn new() -> Self {
        Self {
            phase: Phase::Initial,
            reasoning: ReasoningManifest::new(),
            overall_confidence: 100,
            gates: HashMap::new(),
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn overall_confidence(&self) -> u8 {
        self.overall_confidence
    }

    pub fn reasoning(&self) -> &ReasoningManifest {
        &self.reasoning
    }

    /// Move to a new phase after its agents have completed and reported.
    /// The dispatch policy is indexed by the phase just entered.
    pub fn advance(&mut self, phase: Phase) {
        self.phase = phase;
    }

    /// Compute which agents the current phase's dispatch policy calls
    /// for, given `ctx`. Records the decision, including any agent the
    /// policy considered and rejected, as a `ReasoningStep`. Returns an
    /// empty list once the policy is exhausted.
    pub fn dispatch(&mut self, ctx: &IncidentContext, evidence_considered: Vec<PinId>) -> Vec<AgentKind> {
        let (agents, reasoning, alternatives_rejected): (Vec<AgentKind>, String, Vec<String>) = match self.phase {
            Phase::Initial => (
                vec![AgentKind::LogAgent],
                "initial phase always starts with log analysis".to_string(),
                Vec::new(),
            ),
            Phase::LogsAnalyzed => {
                let mut agents = vec![AgentKind::MetricsAgent];
                let mut rejected = Vec::new();
                if ctx.namespace.is_some() {
                    agents.push(AgentKind::K8sAgent);
                } else {
                    rejected.push("k8s_agent (no namespace on the incident)".to_string());
                }
                (
                    agents,
                    "logs analyzed; metrics always follows, k8s only when a namespace is known".to_string(),
                    rejected,
                )
            }
            Phase::MetricsAnalyzed | Phase::K8sAnalyzed => {
                if ctx.trace_id.is_some() {
                    (
                        vec![AgentKind::TracingAgent],
                        "trace id present; tracing is preferred over a code search".to_string(),
                        vec!["code_agent".to_string()],
                    )
                } else if ctx.repo_url.is_some() {
                    (
                        vec![AgentKind::CodeAgent],
                        "no trace id, but a repo url is available".to_string(),
                        vec!["tracing_agent (no trace id)".to_string()],
                    )
                } else {
                    (
                        Vec::new(),
                        "no trace id and no repo url; nothing further to dispatch".to_string(),
                        Vec::new(),
                    )
                }
            }
            Phase::TracingAnalyzed => {
                if ctx.repo_url.is_some() {
                    (
                        vec![AgentKind::CodeAgent],
                        "tracing analyzed; a repo url is available for a code search".to_string(),
                        Vec::new(),
                    )
                } else {
                    (
                        Vec::new(),
                        "tracing analyzed; no repo url to search".to_string(),
                        Vec::new(),
                    )
                }
            }
            Phase::CodeAnalyzed => (
                Vec::new(),
                "code analyzed; the dispatch policy has no further agent to run".to_string(),
                Vec::new(),
            ),
            other => (
                Vec::new(),
                format!("{other:?} is not a dispatch phase"),
                Vec::new(),
            ),
        };

        self.reasoning.record(
            format!("dispatch {agents:?}"),
            reasoning,
            evidence_considered,
            self.overall_confidence as f64 / 100.0,
            alternatives_rejected,
        );
        agents
    }

    /// Record a fresh confidence reading and gate the next transition
    /// on it. Confidence below 50 after any phase asks a human rather
    /// than proceeding.
    pub fn gate(&mut self, overall_confidence: u8, evidence_considered: Vec<PinId>) -> GateDecision {
        self.overall_confidence = overall_confidence;
        let decision = if overall_confidence < 50 {
            GateDecision::AskUser
        } else {
            GateDecision::Proceed
        };

        self.reasoning.record(
            format!("{decision:?}"),
            format!("overall_confidence={overall_confidence} after phase {:?}", self.phase),
            evidence_considered,
            overall_confidence as f64 / 100.0,
            Vec::new(),
        );
        decision
    }

    /// Open an attestation gate awaiting a human decision.
    pub fn open_attestation(
        &mut self,
        gate_type: GateType,
        evidence_summary: impl Into<String>,
        proposed_action: impl Into<String>,
    ) {
        self.gates
            .insert(gate_type, AttestationGate::open(gate_type, evidence_summary, proposed_action));
    }

    /// Record a human's decision against an open gate.
    pub fn acknowledge_attestation(
        &mut self,
        gate_type: GateType,
        decision: AttestationDecision,
        decided_by: impl Into<String>,
        notes: Option<String>,
    ) -> Result<()> {
        let gate = self
            .gates
            .get_mut(&gate_type)
            .ok_or_else(|| Error::InvalidParam(format!("no open {gate_type:?} gate")))?;
        gate.decide(decision, decided_by, notes);
        Ok(())
    }

    /// Transition into `FIX_IN_PROGRESS`. Refused unless the
    /// `PreRemediation` gate is open and approved — gates are not
    /// advisory.
    pub fn begin_fix(&mut self) -> Result<()> {
        let approved = self
            .gates
            .get(&GateType::PreRemediation)
            .map(|gate| gate.is_approved())
            .unwrap_or(false);
        if !approved {
            return Err(Error::InvalidParam(
                "cannot enter fix_in_progress without an approved pre_remediation gate".to_string(),
            ));
        }
        self.phase = Phase::FixInProgress;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn initial_phase_dispatches_log_agent_only() {
        let mut supervisor = Supervisor::new();
        let agents = supervisor.dispatch(&IncidentContext::default(), vec![]);
        assert_eq!(agents, vec![AgentKind::LogAgent]);
    }

    #[test]
    fn logs_analyzed_dispatches_k8s_agent_only_with_namespace() {
        let mut supervisor = Supervisor::new();
        supervisor.advance(Phase::LogsAnalyzed);

        let without_namespace = supervisor.dispatch(&IncidentContext::default(), vec![]);
        assert_eq!(without_namespace, vec![AgentKind::MetricsAgent]);

        let ctx = IncidentContext { namespace: Some("prod".into()), ..Default::default() };
        let with_namespace = supervisor.dispatch(&ctx, vec![]);
        assert_eq!(with_namespace, vec![AgentKind::MetricsAgent, AgentKind::K8sAgent]);
    }

    #[test]
    fn metrics_analyzed_prefers_tracing_over_code() {
        let mut supervisor = Supervisor::new();
        supervisor.advance(Phase::MetricsAnalyzed);
        let ctx = IncidentContext {
            trace_id: Some("trace-1".into()),
            repo_url: Some("https://example.com/repo".into()),
            ..Default::default()
        };
        let agents = supervisor.dispatch(&ctx, vec![]);
        assert_eq!(agents, vec![AgentKind::TracingAgent]);
    }

    #[test]
    fn code_analyzed_dispatches_nothing() {
        let mut supervisor = Supervisor::new();
        supervisor.advance(Phase::CodeAnalyzed);
        let agents = supervisor.dispatch(&IncidentContext::default(), vec![]);
        assert!(agents.is_empty());
    }

    #[test]
    fn low_confidence_asks_user() {
        let mut supervisor = Supervisor::new();
        let decision = supervisor.gate(40, vec![]);
        assert_eq!(decision, GateDecision::AskUser);
    }

    #[test]
    fn high_confidence_proceeds() {
        let mut supervisor = Supervisor::new();
        let decision = supervisor.gate(75, vec![]);
        assert_eq!(decision, GateDecision::Proceed);
    }

    #[test]
    fn fix_is_refused_without_an_approved_gate() {
        let mut supervisor = Supervisor::new();
        assert!(supervisor.begin_fix().is_err());
    }

    #[test]
    fn fix_proceeds_once_gate_is_approved() {
        let mut supervisor = Supervisor::new();
        supervisor.open_attestation(GateType::PreRemediation, "confidence 90", "restart pod");
        supervisor
            .acknowledge_attestation(GateType::PreRemediation, AttestationDecision::Approve, "oncall", None)
            .unwrap();
        assert!(supervisor.begin_fix().is_ok());
        assert_eq!(supervisor.phase(), Phase::FixInProgress);
    }
}
