//! Reasoning manifest: an ordered, append-only record of the decisions a
//! session's supervisor made and why, so a human reviewing an incident
//! afterward can see the path taken rather than just the verdict.

use crate::evidence::PinId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One step in a session's decision trail.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReasoningStep {
    pub number: u32,
    pub timestamp: DateTime<Utc>,
    pub decision: String,
    pub reasoning: String,
    pub evidence_considered: Vec<PinId>,
    pub confidence_at_step: f64,
    pub alternatives_rejected: Vec<String>,
}

/// Per-session ordered list of reasoning steps. Steps are numbered
/// sequentially starting at 1 and never reordered or removed.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReasoningManifest {
    steps: Vec<ReasoningStep>,
}

impl ReasoningManifest {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(
        &mut self,
        decision: impl Into<String>,
        reasoning: impl Into<String>,
        evidence_considered: Vec<PinId>,
        confidence_at_step: f64,
        alternatives_rejected: Vec<String>,
    ) -> &ReasoningStep {
        let step = ReasoningStep {
            number: self.steps.len() as u32 + 1,
            timestamp: Utc::now(),
            decision: decision.into(),
            reasoning: reasoning.into(),
            evidence_considered,
            confidence_at_step: confidence_at_step.clamp(0.0, 1.0),
            alternatives_rejected,
        };
        self.steps.push(step);
        self.steps.last().expect("just pushed")
    }

    pub fn steps(&self) -> &[ReasoningStep] {
        &self.steps
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn steps_are_numbered_sequentially() {
        let mut manifest = ReasoningManifest::new();
        manifest.record("dispatch control_plane", "evidence suggests control plane issue", vec![], 0.5, vec![]);
        manifest.record("escalate to node domain", "node NotReady observed", vec![], 0.7, vec![]);

        let steps = manifest.steps();
        assert_eq!(steps[0].number, 1);
        assert_eq!(steps[1].number, 2);
    }

    #[test]
    fn confidence_is_clamped() {
        let mut manifest = ReasoningManifest::new();
        manifest.record("x", "y", vec![], 5.0, vec![]);
        assert_eq!(manifest.steps()[0].confidence_at_step, 1.0);
    }
}
