//! Critic: the LLM-backed skeptic that validates a single finding and
//! decides where a new pin sits in the causal structure before it is
//! allowed to influence a diagnosis.
//!
//! Every call is wrapped in a hard 30s timeout. A timeout or an
//! unparseable LLM response never propagates an error; it degrades to
//! the most conservative verdict the operation defines.

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::time::timeout;

use crate::evidence::{CausalRole, EvidencePin, ValidationStatus};
use crate::llm::{ChatMessage, CompletionRequest, LLMClient};

const CRITIC_TIMEOUT: Duration = Duration::from_secs(30);

/// Outcome of validating a single finding in isolation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    Validated,
    Challenged,
    InsufficientData,
}

/// Result of [`Critic::validate`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationResult {
    pub verdict: Verdict,
    pub confidence_in_verdict: u8,
    pub reasoning: String,
}

impl ValidationResult {
    fn insufficient(reasoning: &'static str) -> Self {
        Self {
            verdict: Verdict::InsufficientData,
            confidence_in_verdict: 0,
            reasoning: reasoning.to_string(),
        }
    }
}

/// Result of [`Critic::validate_delta`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeltaResult {
    pub validation_status: ValidationStatus,
    pub causal_role: CausalRole,
    pub confidence: f64,
    pub reasoning: String,
    pub contradictions: Vec<String>,
}

impl DeltaResult {
    fn pending(reasoning: &'static str) -> Self {
        Self {
            validation_status: ValidationStatus::PendingCritic,
            causal_role: CausalRole::Informational,
            confidence: 0.0,
            reasoning: reasoning.to_string(),
            contradictions: Vec::new(),
        }
    }
}

/// Raw shape expected back from a `validate` call.
#[derive(Debug, Deserialize)]
struct RawValidation {
    verdict: String,
    confidence_in_verdict: u8,
    reasoning: String,
}

/// Raw shape expected back from a `validate_delta` call.
#[derive(Debug, Deserialize)]
struct RawDelta {
    validation_status: String,
    causal_role: String,
    confidence: f64,
    reasoning: String,
    #[serde(default)]
    contradictions: Vec<String>,
}

fn parse_verdict(raw: &str) -> Option<Verdict> {
    match raw {
        "validated" => Some(Verdict::Validated),
        "challenged" => Some(Verdict::Challenged),
        "insufficient_data" => Some(Verdict::InsufficientData),
        _ => None,
    }
}

fn parse_validation_status(raw: &str) -> Option<ValidationStatus> {
    match raw {
        "validated" => Some(ValidationStatus::Validated),
        "rejected" => Some(ValidationStatus::Rejected),
        "pending_critic" => Some(ValidationStatus::PendingCritic),
        _ => None,
    }
}

/// Any causal role string outside the closed vocabulary falls back to
/// `informational` rather than rejecting the whole delta.
fn parse_causal_role(raw: &str) -> CausalRole {
    match raw {
        "root_cause" => CausalRole::RootCause,
        "cascading_symptom" => CausalRole::CascadingSymptom,
        "correlated" => CausalRole::Correlated,
        _ => CausalRole::Informational,
    }
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

/// The LLM-backed skeptic. Holds no session state; one instance can be
/// shared across a session's in-flight critic tasks.
pub struct Critic {
    client: Arc<dyn LLMClient>,
    model: String,
}

impl Critic {
    pub fn new(client: Arc<dyn LLMClient>, model: impl Into<String>) -> Self {
        Self {
            client,
            model: model.into(),
        }
    }

    /// Validate a single finding against the session's current state
    /// description. On timeout or parse failure, degrades to
    /// `insufficient_data` with `confidence_in_verdict = 0`.
    pub async fn validate(&self, finding: &str, state: &str) -> ValidationResult {
        let request = CompletionRequest::new()
            .with_model(self.model.clone())
            .with_system(
                "You are a skeptical reviewer of incident-diagnosis findings. \
                 Given a finding and the current investigation state, decide \
                 whether the finding holds up. Emit strict JSON: \
                 {\"verdict\":\"validated\"|\"challenged\"|\"insufficient_data\",\
                 \"confidence_in_verdict\":0..100,\"reasoning\":\"...\"}. \
                 No prose outside the JSON object.",
            )
            .with_message(ChatMessage::user(format!(
                "finding: {finding}\nstate: {state}"
            )));

        let response_text = match timeout(CRITIC_TIMEOUT, self.client.complete(request)).await {
            Ok(Ok(response)) => response.content,
            Ok(Err(_)) | Err(_) => return ValidationResult::insufficient("validation timed out"),
        };

        let parsed = extract_json_object(&response_text)
            .and_then(|json| serde_json::from_str::<RawValidation>(json).ok());

        match parsed.and_then(|raw| parse_verdict(&raw.verdict).map(|verdict| (verdict, raw))) {
            Some((verdict, raw)) => ValidationResult {
                verdict,
                confidence_in_verdict: raw.confidence_in_verdict.min(100),
                reasoning: raw.reasoning,
            },
            None => ValidationResult::insufficient("parse error"),
        }
    }

    /// Judge where `new_pin` sits relative to `existing_pins` and the
    /// causal chains built so far, then mutate `new_pin` in place with
    /// the resulting validation status, causal role, and confidence.
    ///
    /// On timeout, the pin is left `pending_critic` / `informational`
    /// rather than guessed at.
    pub async fn validate_delta(
        &self,
        new_pin: &mut EvidencePin,
        existing_pins: &[EvidencePin],
        causal_chains: &str,
    ) -> DeltaResult {
        let existing_claims: Vec<&str> = existing_pins.iter().map(|p| p.claim.as_str()).collect();

        let request = CompletionRequest::new()
            .with_model(self.model.clone())
            .with_system(
                "You are a skeptical reviewer placing a new piece of \
                 evidence into an incident's causal structure. Given the \
                 new claim, the claims already accepted, and the causal \
                 chains reasoned so far, decide its validation status and \
                 causal role. Emit strict JSON: \
                 {\"validation_status\":\"validated\"|\"rejected\"|\"pending_critic\",\
                 \"causal_role\":\"root_cause\"|\"cascading_symptom\"|\"correlated\"|\"informational\",\
                 \"confidence\":0.0..1.0,\"reasoning\":\"...\",\"contradictions\":[]}. \
                 No prose outside the JSON object.",
            )
            .with_message(ChatMessage::user(format!(
                "new claim: {}\nexisting claims: {:?}\ncausal chains: {causal_chains}",
                new_pin.claim, existing_claims
            )));

        let response_text = match timeout(CRITIC_TIMEOUT, self.client.complete(request)).await {
            Ok(Ok(response)) => response.content,
            Ok(Err(_)) | Err(_) => {
                let result = DeltaResult::pending("validation timed out");
                apply_delta(new_pin, &result);
                return result;
            }
        };

        let parsed = extract_json_object(&response_text)
            .and_then(|json| serde_json::from_str::<RawDelta>(json).ok());

        let result = match parsed.and_then(|raw| {
            parse_validation_status(&raw.validation_status).map(|status| (status, raw))
        }) {
            Some((status, raw)) => DeltaResult {
                validation_status: status,
                causal_role: parse_causal_role(&raw.causal_role),
                confidence: raw.confidence.clamp(0.0, 1.0),
                reasoning: raw.reasoning,
                contradictions: raw.contradictions,
            },
            None => DeltaResult::pending("parse error"),
        };

        apply_delta(new_pin, &result);
        result
    }
}

fn apply_delta(pin: &mut EvidencePin, result: &DeltaResult) {
    pin.validation_status = result.validation_status;
    pin.causal_role = Some(result.causal_role);
    pin.confidence = result.confidence;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::{CompletionResponse, TokenUsage};
    use crate::tools::{Domain, EvidenceType, RouterContext, ToolResult, TriggeredBy};
    use async_trait::async_trait;
    use chrono::Utc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct ScriptedClient {
        responses: Vec<String>,
        calls: AtomicUsize,
    }

    impl ScriptedClient {
        fn new(responses: Vec<&str>) -> Self {
            Self {
                responses: responses.into_iter().map(String::from).collect(),
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl LLMClient for ScriptedClient {
        async fn complete(&self, _request: CompletionRequest) -> crate::error::Result<CompletionResponse> {
            let index = self.calls.fetch_add(1, Ordering::SeqCst);
            let content = self.responses[index % self.responses.len()].clone();
            Ok(CompletionResponse {
                id: "scripted".into(),
                model: "scripted".into(),
                content,
                stop_reason: None,
                usage: TokenUsage {
                    input_tokens: 0,
                    output_tokens: 0,
                    cache_read_tokens: None,
                    cache_creation_tokens: None,
                },
                timestamp: Utc::now(),
                cost: None,
            })
        }
    }

    fn sample_pin() -> EvidencePin {
        let ctx = RouterContext {
            namespace: Some("prod".into()),
            service: Some("checkout".into()),
            resource_name: None,
            time_window: None,
        };
        let result = ToolResult::success("fetch_pod_logs", "oom detected", EvidenceType::Log, Domain::Compute);
        crate::evidence::pin_from_tool_result(&result, TriggeredBy::AutomatedPipeline, &ctx)
    }

    #[tokio::test]
    async fn validate_parses_a_clean_verdict() {
        let client = Arc::new(ScriptedClient::new(vec![
            r#"{"verdict":"validated","confidence_in_verdict":90,"reasoning":"matches metrics"}"#,
        ]));
        let critic = Critic::new(client, "test-model");
        let result = critic.validate("pod OOMKilled", "metrics show memory spike").await;
        assert_eq!(result.verdict, Verdict::Validated);
        assert_eq!(result.confidence_in_verdict, 90);
    }

    #[tokio::test]
    async fn validate_degrades_on_non_json_response() {
        let client = Arc::new(ScriptedClient::new(vec!["Not JSON"]));
        let critic = Critic::new(client, "test-model");
        let result = critic.validate("finding", "state").await;
        assert_eq!(result.verdict, Verdict::InsufficientData);
        assert_eq!(result.confidence_in_verdict, 0);
        assert_eq!(result.reasoning, "parse error");
    }

    #[tokio::test]
    async fn validate_delta_mutates_the_pin_in_place() {
        let client = Arc::new(ScriptedClient::new(vec![
            r#"{"validation_status":"validated","causal_role":"root_cause","confidence":0.85,"reasoning":"consistent with node pressure","contradictions":[]}"#,
        ]));
        let critic = Critic::new(client, "test-model");
        let mut pin = sample_pin();
        assert_eq!(pin.validation_status, ValidationStatus::PendingCritic);

        let result = critic.validate_delta(&mut pin, &[], "node/worker-1 -> pod").await;

        assert_eq!(result.validation_status, ValidationStatus::Validated);
        assert_eq!(pin.validation_status, ValidationStatus::Validated);
        assert_eq!(pin.causal_role, Some(CausalRole::RootCause));
        assert_eq!(pin.confidence, 0.85);
    }

    #[tokio::test]
    async fn validate_delta_falls_back_to_informational_on_unknown_role() {
        let client = Arc::new(ScriptedClient::new(vec![
            r#"{"validation_status":"validated","causal_role":"definitely_the_culprit","confidence":0.6,"reasoning":"r","contradictions":[]}"#,
        ]));
        let critic = Critic::new(client, "test-model");
        let mut pin = sample_pin();

        let result = critic.validate_delta(&mut pin, &[], "").await;

        assert_eq!(result.causal_role, CausalRole::Informational);
        assert_eq!(pin.causal_role, Some(CausalRole::Informational));
    }

    #[tokio::test]
    async fn validate_delta_degrades_on_non_json_response() {
        let client = Arc::new(ScriptedClient::new(vec!["garbage, not json"]));
        let critic = Critic::new(client, "test-model");
        let mut pin = sample_pin();

        let result = critic.validate_delta(&mut pin, &[], "").await;

        assert_eq!(result.validation_status, ValidationStatus::PendingCritic);
        assert_eq!(result.causal_role, CausalRole::Informational);
        assert_eq!(pin.validation_status, ValidationStatus::PendingCritic);
        assert_eq!(pin.causal_role, Some(CausalRole::Informational));
        assert_eq!(result.reasoning, "parse error");
    }
}
