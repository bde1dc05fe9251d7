//! Attestation gate: no remediation proceeds without an explicit human
//! decision recorded against the evidence that justified it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Which point in the diagnosis/remediation lifecycle a gate covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GateType {
    DiscoveryComplete,
    PreRemediation,
    PostRemediation,
}

/// A human's decision against a gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Decision {
    Approve,
    Reject,
    RequestChanges,
}

/// A single gate a session's remediation path must pass through.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttestationGate {
    pub gate_type: GateType,
    pub evidence_summary: String,
    pub proposed_action: String,
    pub decision: Option<Decision>,
    pub decided_by: Option<String>,
    pub notes: Option<String>,
    pub timestamp: Option<DateTime<Utc>>,
}

impl AttestationGate {
    /// Open a gate awaiting a decision.
    pub fn open(gate_type: GateType, evidence_summary: impl Into<String>, proposed_action: impl Into<String>) -> Self {
        Self {
            gate_type,
            evidence_summary: evidence_summary.into(),
            proposed_action: proposed_action.into(),
            decision: None,
            decided_by: None,
            notes: None,
            timestamp: None,
        }
    }

    pub fn is_decided(&self) -> bool {
        self.decision.is_some()
    }

    pub fn is_approved(&self) -> bool {
        self.decision == Some(Decision::Approve)
    }

    /// Record a decision. A gate is decided exactly once; redeciding an
    /// already-decided gate overwrites the prior decision, since the
    /// audit log (not this struct) is the durable record of history.
    pub fn decide(&mut self, decision: Decision, decided_by: impl Into<String>, notes: Option<String>) {
        self.decision = Some(decision);
        self.decided_by = Some(decided_by.into());
        self.notes = notes;
        self.timestamp = Some(Utc::now());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn a_fresh_gate_is_undecided() {
        let gate = AttestationGate::open(
            GateType::PreRemediation,
            "confidence 0.9, root cause: OOM",
            "raise memory limit to 1Gi",
        );
        assert!(!gate.is_decided());
        assert!(!gate.is_approved());
    }

    #[test]
    fn approving_marks_the_gate_decided() {
        let mut gate = AttestationGate::open(GateType::PreRemediation, "summary", "action");
        gate.decide(Decision::Approve, "oncall-operator", None);
        assert!(gate.is_decided());
        assert!(gate.is_approved());
    }

    #[test]
    fn rejecting_is_not_approval() {
        let mut gate = AttestationGate::open(GateType::PreRemediation, "summary", "action");
        gate.decide(Decision::Reject, "oncall-operator", Some("not enough evidence".into()));
        assert!(gate.is_decided());
        assert!(!gate.is_approved());
    }
}
