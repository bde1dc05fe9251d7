//! Confidence ledger: the single aggregate confidence number a session
//! exposes, derived from per-evidence-type means and a bounded critic
//! adjustment.

use super::pin::EvidencePin;
use crate::tools::EvidenceType;
use serde::{Deserialize, Serialize};

const CRITIC_ADJUSTMENT_MIN: f64 = -0.3;
const CRITIC_ADJUSTMENT_MAX: f64 = 0.1;

/// Fixed weights for each evidence type. Sum to exactly 1.0.
pub const WEIGHT_LOG: f64 = 0.25;
pub const WEIGHT_METRIC: f64 = 0.30;
pub const WEIGHT_TRACE: f64 = 0.20;
pub const WEIGHT_K8S: f64 = 0.15;
pub const WEIGHT_CODE: f64 = 0.05;
pub const WEIGHT_CHANGE: f64 = 0.05;

fn weight_for(evidence_type: EvidenceType) -> f64 {
    match evidence_type {
        EvidenceType::Log => WEIGHT_LOG,
        EvidenceType::Metric => WEIGHT_METRIC,
        EvidenceType::Trace => WEIGHT_TRACE,
        EvidenceType::K8sEvent | EvidenceType::K8sResource => WEIGHT_K8S,
        EvidenceType::Code => WEIGHT_CODE,
        EvidenceType::Change => WEIGHT_CHANGE,
    }
}

/// Per-source running mean confidence plus a bounded critic adjustment,
/// rolled up into one `weighted_final` number.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfidenceLedger {
    log: RunningMean,
    metric: RunningMean,
    trace: RunningMean,
    k8s: RunningMean,
    code: RunningMean,
    change: RunningMean,
    critic_adjustment: f64,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
struct RunningMean {
    sum: f64,
    count: u64,
}

impl RunningMean {
    fn add(&mut self, value: f64) {
        self.sum += value;
        self.count += 1;
    }

    fn mean(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.sum / self.count as f64
        }
    }
}

impl Default for ConfidenceLedger {
    fn default() -> Self {
        Self {
            log: RunningMean::default(),
            metric: RunningMean::default(),
            trace: RunningMean::default(),
            k8s: RunningMean::default(),
            code: RunningMean::default(),
            change: RunningMean::default(),
            critic_adjustment: 0.0,
        }
    }
}

impl ConfidenceLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold a batch of pins into the per-type running means.
    pub fn add_pins(&mut self, pins: &[EvidencePin]) {
        for pin in pins {
            self.bucket_for_mut(pin.evidence_type).add(pin.confidence);
        }
    }

    fn bucket_for_mut(&mut self, evidence_type: EvidenceType) -> &mut RunningMean {
        match evidence_type {
            EvidenceType::Log => &mut self.log,
            EvidenceType::Metric => &mut self.metric,
            EvidenceType::Trace => &mut self.trace,
            EvidenceType::K8sEvent | EvidenceType::K8sResource => &mut self.k8s,
            EvidenceType::Code => &mut self.code,
            EvidenceType::Change => &mut self.change,
        }
    }

    /// Set the critic's adjustment, clamped to `[-0.3, 0.1]`.
    pub fn set_critic_adjustment(&mut self, adjustment: f64) {
        self.critic_adjustment = adjustment.clamp(CRITIC_ADJUSTMENT_MIN, CRITIC_ADJUSTMENT_MAX);
    }

    pub fn critic_adjustment(&self) -> f64 {
        self.critic_adjustment
    }

    /// `clamp([0,1], Σ w_i·c_i + critic_adjustment)`. Idempotent: calling
    /// this twice with unchanged inputs returns the same value.
    pub fn weighted_final(&self) -> f64 {
        let weighted_sum = WEIGHT_LOG * self.log.mean()
            + WEIGHT_METRIC * self.metric.mean()
            + WEIGHT_TRACE * self.trace.mean()
            + WEIGHT_K8S * self.k8s.mean()
            + WEIGHT_CODE * self.code.mean()
            + WEIGHT_CHANGE * self.change.mean();
        (weighted_sum + self.critic_adjustment).clamp(0.0, 1.0)
    }

    pub fn per_type_means(&self) -> [(EvidenceType, f64); 5] {
        [
            (EvidenceType::Log, self.log.mean()),
            (EvidenceType::Metric, self.metric.mean()),
            (EvidenceType::Trace, self.trace.mean()),
            (EvidenceType::K8sResource, self.k8s.mean()),
            (EvidenceType::Code, self.code.mean()),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::evidence::pin::{pin_from_tool_result, CausalRole, ValidationStatus};
    use crate::tools::{Domain, RouterContext, ToolResult, TriggeredBy};

    fn pin_with(evidence_type: EvidenceType, confidence: f64) -> EvidencePin {
        let mut result = ToolResult::success("x", "x", evidence_type, Domain::Unknown);
        if confidence >= 1.0 {
            result.evidence_snippets.push("evidence".into());
        } else if confidence == 0.0 {
            result.success = false;
        }
        let mut pin = pin_from_tool_result(&result, TriggeredBy::AutomatedPipeline, &RouterContext::default());
        pin.confidence = confidence;
        pin.causal_role = None::<CausalRole>;
        pin.validation_status = ValidationStatus::PendingCritic;
        pin
    }

    #[test]
    fn weights_sum_to_one() {
        let sum = WEIGHT_LOG + WEIGHT_METRIC + WEIGHT_TRACE + WEIGHT_K8S + WEIGHT_CODE + WEIGHT_CHANGE;
        assert!((sum - 1.0).abs() < 1e-9);
    }

    #[test]
    fn scenario_s5_weighted_final_and_critic_adjustment() {
        let pins = vec![
            pin_with(EvidenceType::Log, 0.8),
            pin_with(EvidenceType::Metric, 0.9),
            pin_with(EvidenceType::Trace, 0.7),
            pin_with(EvidenceType::K8sResource, 0.6),
            pin_with(EvidenceType::Code, 0.5),
            pin_with(EvidenceType::Change, 0.4),
        ];
        let mut ledger = ConfidenceLedger::new();
        ledger.add_pins(&pins);
        assert!((ledger.weighted_final() - 0.745).abs() < 1e-9);

        ledger.set_critic_adjustment(-0.1);
        assert!((ledger.weighted_final() - 0.645).abs() < 1e-9);
    }

    #[test]
    fn empty_ledger_weighted_final_is_clamped_adjustment() {
        let mut ledger = ConfidenceLedger::new();
        ledger.set_critic_adjustment(-0.3);
        assert_eq!(ledger.weighted_final(), 0.0);
    }

    #[test]
    fn critic_adjustment_clamps_to_bounds() {
        let mut ledger = ConfidenceLedger::new();
        ledger.set_critic_adjustment(5.0);
        assert_eq!(ledger.critic_adjustment(), CRITIC_ADJUSTMENT_MAX);
        ledger.set_critic_adjustment(-5.0);
        assert_eq!(ledger.critic_adjustment(), CRITIC_ADJUSTMENT_MIN);
    }

    #[test]
    fn weighted_final_is_a_fixed_point() {
        let mut ledger = ConfidenceLedger::new();
        ledger.add_pins(&[pin_with(EvidenceType::Log, 0.8)]);
        let first = ledger.weighted_final();
        let second = ledger.weighted_final();
        assert_eq!(first, second);
    }
}

#[cfg(test)]
mod proptests {
    use super::*;
    use crate::evidence::pin::pin_from_tool_result;
    use crate::tools::{Domain, RouterContext, ToolResult, TriggeredBy};
    use proptest::prelude::*;

    fn evidence_type_strategy() -> impl Strategy<Value = EvidenceType> {
        prop_oneof![
            Just(EvidenceType::Log),
            Just(EvidenceType::Metric),
            Just(EvidenceType::Trace),
            Just(EvidenceType::K8sResource),
            Just(EvidenceType::Code),
            Just(EvidenceType::Change),
        ]
    }

    proptest! {
        #[test]
        fn weighted_final_stays_in_unit_interval(
            confidences in prop::collection::vec((evidence_type_strategy(), 0.0f64..1.0), 0..20),
            adjustment in -1.0f64..1.0,
        ) {
            let mut ledger = ConfidenceLedger::new();
            let pins: Vec<_> = confidences
                .into_iter()
                .map(|(evidence_type, confidence)| {
                    let mut result = ToolResult::success("probe", "probe", evidence_type, Domain::Unknown);
                    result.evidence_snippets.push("evidence".into());
                    let mut pin = pin_from_tool_result(
                        &result,
                        TriggeredBy::AutomatedPipeline,
                        &RouterContext::default(),
                    );
                    pin.confidence = confidence;
                    pin
                })
                .collect();
            ledger.add_pins(&pins);
            ledger.set_critic_adjustment(adjustment);

            let final_value = ledger.weighted_final();
            prop_assert!((0.0..=1.0).contains(&final_value));
            // recomputing with unchanged inputs is a fixed point
            prop_assert_eq!(final_value, ledger.weighted_final());
        }
    }
}
