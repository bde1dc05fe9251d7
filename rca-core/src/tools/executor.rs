//! Dispatches a validated intent to exactly one collector call and
//! classifies the response into a [`ToolResult`].

use super::intents::{clamp_minutes, clamp_tail_lines, validate_params, Intent};
use super::{classify_domain, ClusterClient, Domain, EvidenceType, ToolResult};
use crate::error::Result;
use regex::Regex;
use serde_json::Value;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::sync::OnceLock;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Collector calls that fail transiently (timeout, generic collector
/// failure, 502/503/504) are retried this many times with exponential
/// backoff and jitter before the executor gives up. Auth/4xx failures
/// and "pod not found" are never retried.
const MAX_RETRY_ATTEMPTS: u32 = 3;
const RETRY_BASE_DELAY: Duration = Duration::from_millis(1000);

async fn retry_call<T, F, Fut>(mut call: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut attempt = 0;
    loop {
        match call().await {
            Ok(value) => return Ok(value),
            Err(e) if attempt < MAX_RETRY_ATTEMPTS && e.is_retryable() => {
                let delay = RETRY_BASE_DELAY * 2u32.pow(attempt) + jitter();
                tracing::warn!(attempt = attempt + 1, ?delay, error = %e, "retrying collector call");
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}

/// Up to 500ms of jitter, derived from the current time rather than a
/// dedicated RNG dependency since backoff jitter has no security
/// relevance.
fn jitter() -> Duration {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.subsec_nanos())
        .unwrap_or(0);
    Duration::from_millis((nanos % 500) as u64)
}

fn error_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"(?i)(fatal|panic|oom|killed|segfault|error|exception|timeout|refused|fail)")
            .expect("static pattern is valid")
    })
}

const CRITICAL_KEYWORDS: &[&str] = &["fatal", "panic"];
const HIGH_KEYWORDS: &[&str] = &["oom", "killed", "segfault"];
const MEDIUM_KEYWORDS: &[&str] = &["error", "exception", "timeout", "refused", "fail"];

/// Classify a single log line's severity, if it looks like an error at all.
fn classify_log_severity(line: &str) -> Option<&'static str> {
    let lower = line.to_lowercase();
    if CRITICAL_KEYWORDS.iter().any(|k| lower.contains(k)) {
        Some("critical")
    } else if HIGH_KEYWORDS.iter().any(|k| lower.contains(k)) {
        Some("high")
    } else if MEDIUM_KEYWORDS.iter().any(|k| lower.contains(k)) {
        Some("medium")
    } else {
        None
    }
}

/// Highest severity observed across a block of log text, and the matching
/// lines, in the order they occurred.
fn extract_error_lines(text: &str) -> (Option<&'static str>, Vec<String>) {
    let mut highest: Option<&'static str> = None;
    let mut snippets = Vec::new();
    for line in text.lines() {
        if !error_pattern().is_match(line) {
            continue;
        }
        snippets.push(line.to_string());
        if let Some(sev) = classify_log_severity(line) {
            highest = Some(match (highest, sev) {
                (Some("critical"), _) => "critical",
                (_, "critical") => "critical",
                (Some("high"), _) => "high",
                (_, "high") => "high",
                _ => sev,
            });
        }
    }
    (highest, snippets)
}

/// Resource kinds the YAML/events accessors will dispatch against.
/// Mirrors the intent schemas: anything outside this set is reported as
/// an unsupported kind rather than attempted against the collector.
const SUPPORTED_ACCESSOR_KINDS: &[&str] = &["pod", "node", "deployment"];

fn is_supported_accessor_kind(kind: &str) -> bool {
    SUPPORTED_ACCESSOR_KINDS.contains(&kind.to_lowercase().as_str())
}

fn event_involves(event: &Value, kind: &str, name: &str) -> bool {
    let involved = event.get("involvedObject");
    let matches_kind = involved
        .and_then(|o| o.get("kind"))
        .and_then(|k| k.as_str())
        .map(|k| k.eq_ignore_ascii_case(kind))
        .unwrap_or(false);
    let matches_name = involved
        .and_then(|o| o.get("name"))
        .and_then(|n| n.as_str())
        .map(|n| n == name)
        .unwrap_or(false);
    matches_kind && matches_name
}

/// Result of [`ToolExecutor::get_resource_yaml`].
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct YamlAccessorResult {
    pub yaml: Option<String>,
    pub error: Option<String>,
}

/// Result of [`ToolExecutor::get_resource_events`].
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct EventsAccessorResult {
    pub events: Vec<Value>,
    pub error: Option<String>,
}

/// Result of [`ToolExecutor::get_pod_logs`].
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct LogsAccessorResult {
    pub logs: Option<String>,
    pub error: Option<String>,
}

/// Dispatches registered intents against a single [`ClusterClient`].
pub struct ToolExecutor {
    client: Arc<dyn ClusterClient>,
}

impl ToolExecutor {
    pub fn new(client: Arc<dyn ClusterClient>) -> Self {
        Self { client }
    }

    /// Validate and dispatch `intent_name` with `params`. Never panics and
    /// never propagates an `Err`: every failure path is folded into a
    /// failed [`ToolResult`] so a caller always gets a pin-able result.
    pub async fn execute(&self, intent_name: &str, params: HashMap<String, Value>) -> ToolResult {
        let Some(intent) = Intent::from_name(intent_name) else {
            return ToolResult::failure(intent_name, "unknown intent");
        };

        if intent == Intent::ReInvestigateService {
            return ToolResult::failure(intent.name(), "re-investigation requires an active session");
        }

        if let Err(e) = validate_params(intent, &params) {
            return ToolResult::failure(intent.name(), e.to_string());
        }

        match intent {
            Intent::FetchPodLogs => self.fetch_pod_logs(&params).await,
            Intent::DescribeResource => self.describe_resource(&params).await,
            Intent::QueryPrometheus => self.query_prometheus(&params).await,
            Intent::SearchLogs => self.search_logs(&params).await,
            Intent::CheckPodStatus => self.check_pod_status(&params).await,
            Intent::GetEvents => self.get_events(&params).await,
            Intent::ReInvestigateService => unreachable!("handled above"),
        }
    }

    async fn fetch_pod_logs(&self, params: &HashMap<String, Value>) -> ToolResult {
        let namespace = str_param(params, "namespace");
        let pod = str_param(params, "pod");
        let container = params.get("container").and_then(|v| v.as_str());
        let tail_lines = clamp_tail_lines(params);

        match retry_call(|| self.client.get_pod_logs(&namespace, &pod, container, tail_lines)).await
        {
            Ok(logs) => {
                let (severity, snippets) = extract_error_lines(&logs);
                let summary = if snippets.is_empty() {
                    format!("no error patterns found in last {tail_lines} lines of {pod}")
                } else {
                    format!("{} error-pattern line(s) found in {pod}", snippets.len())
                };
                let mut result =
                    ToolResult::success("fetch_pod_logs", summary, EvidenceType::Log, Domain::Compute);
                result.raw_output = logs;
                result.evidence_snippets = snippets;
                result.severity = severity.map(|s| s.to_string());
                result
            }
            Err(e) => ToolResult::failure("fetch_pod_logs", e.to_string()),
        }
    }

    async fn describe_resource(&self, params: &HashMap<String, Value>) -> ToolResult {
        let namespace = str_param(params, "namespace");
        let kind = str_param(params, "kind");
        let name = str_param(params, "name");

        match retry_call(|| self.client.describe_resource(&namespace, &kind, &name)).await {
            Ok(value) => {
                let domain = classify_domain(&kind);
                let mut result = ToolResult::success(
                    "describe_resource",
                    format!("described {kind}/{name} in {namespace}"),
                    EvidenceType::K8sResource,
                    domain,
                );
                result.raw_output = value.to_string();
                extract_resource_signals(&value, &mut result);
                result
            }
            Err(e) => ToolResult::failure("describe_resource", e.to_string()),
        }
    }

    async fn query_prometheus(&self, params: &HashMap<String, Value>) -> ToolResult {
        let query = str_param(params, "query");
        let range_minutes = clamp_minutes(params, "range_minutes");

        match retry_call(|| self.client.query_prometheus(&query, range_minutes)).await {
            Ok(points) => {
                let downsampled = crate::evidence::lttb::downsample(&points, 150);
                let mut result = ToolResult::success(
                    "query_prometheus",
                    format!("{} sample(s) over {range_minutes}m for `{query}`", downsampled.len()),
                    EvidenceType::Metric,
                    Domain::Unknown,
                );
                result.raw_output = serde_json::to_string(&downsampled).unwrap_or_default();
                result
            }
            Err(e) => ToolResult::failure("query_prometheus", e.to_string()),
        }
    }

    async fn search_logs(&self, params: &HashMap<String, Value>) -> ToolResult {
        let namespace = str_param(params, "namespace");
        let pattern = str_param(params, "pattern");
        let since_minutes = clamp_minutes(params, "since_minutes");

        match retry_call(|| self.client.search_logs(&namespace, &pattern, since_minutes)).await {
            Ok(matches) => {
                let mut result = ToolResult::success(
                    "search_logs",
                    format!("{} match(es) for `{pattern}` in {namespace}", matches.len()),
                    EvidenceType::Log,
                    Domain::Compute,
                );
                result.raw_output = matches.join("\n");
                result.evidence_snippets = matches;
                result
            }
            Err(e) => ToolResult::failure("search_logs", e.to_string()),
        }
    }

    async fn check_pod_status(&self, params: &HashMap<String, Value>) -> ToolResult {
        let namespace = str_param(params, "namespace");
        let pod = str_param(params, "pod");

        match retry_call(|| self.client.check_pod_status(&namespace, &pod)).await {
            Ok(value) => {
                let phase = value.get("phase").and_then(|v| v.as_str()).unwrap_or("Unknown");
                let mut result = ToolResult::success(
                    "check_pod_status",
                    format!("{pod} is {phase}"),
                    EvidenceType::K8sResource,
                    Domain::Compute,
                );
                result.raw_output = value.to_string();
                extract_resource_signals(&value, &mut result);
                result
            }
            Err(e) => ToolResult::failure("check_pod_status", e.to_string()),
        }
    }

    async fn get_events(&self, params: &HashMap<String, Value>) -> ToolResult {
        let namespace = str_param(params, "namespace");
        let since_minutes = clamp_minutes(params, "since_minutes");

        match retry_call(|| self.client.get_events(&namespace, since_minutes)).await {
            Ok(events) => {
                let warnings: Vec<String> = events
                    .iter()
                    .filter(|e| e.get("type").and_then(|t| t.as_str()) == Some("Warning"))
                    .map(|e| e.to_string())
                    .collect();
                let mut result = ToolResult::success(
                    "get_events",
                    format!("{} event(s), {} warning(s) in {namespace}", events.len(), warnings.len()),
                    EvidenceType::K8sEvent,
                    Domain::Unknown,
                );
                result.raw_output = serde_json::to_string(&events).unwrap_or_default();
                result.evidence_snippets = warnings;
                result
            }
            Err(e) => ToolResult::failure("get_events", e.to_string()),
        }
    }

    /// Fetch a resource's full definition as a pretty-printed document.
    /// Resource kinds outside [`SUPPORTED_ACCESSOR_KINDS`] are rejected
    /// before any collector call is made.
    pub async fn get_resource_yaml(&self, namespace: &str, kind: &str, name: &str) -> YamlAccessorResult {
        if !is_supported_accessor_kind(kind) {
            return YamlAccessorResult {
                yaml: None,
                error: Some(format!("Unsupported resource kind: {kind}")),
            };
        }

        match retry_call(|| self.client.describe_resource(namespace, kind, name)).await {
            Ok(value) => YamlAccessorResult {
                yaml: Some(serde_json::to_string_pretty(&value).unwrap_or_default()),
                error: None,
            },
            Err(e) => YamlAccessorResult {
                yaml: None,
                error: Some(e.to_string()),
            },
        }
    }

    /// Fetch the events involving a single named resource, filtered out
    /// of the namespace's full event list.
    pub async fn get_resource_events(&self, namespace: &str, kind: &str, name: &str) -> EventsAccessorResult {
        let since_minutes = clamp_minutes(&HashMap::new(), "since_minutes");
        match retry_call(|| self.client.get_events(namespace, since_minutes)).await {
            Ok(events) => EventsAccessorResult {
                events: events.into_iter().filter(|e| event_involves(e, kind, name)).collect(),
                error: None,
            },
            Err(e) => EventsAccessorResult {
                events: Vec::new(),
                error: Some(e.to_string()),
            },
        }
    }

    /// Fetch a pod's raw log tail, independent of the error-pattern
    /// classification [`ToolExecutor::fetch_pod_logs`] performs.
    pub async fn get_pod_logs(
        &self,
        namespace: &str,
        pod: &str,
        container: Option<&str>,
        tail_lines: Option<u64>,
    ) -> LogsAccessorResult {
        let mut params = HashMap::new();
        if let Some(t) = tail_lines {
            params.insert("tail_lines".to_string(), Value::from(t));
        }
        let clamped = clamp_tail_lines(&params);

        match retry_call(|| self.client.get_pod_logs(namespace, pod, container, clamped)).await {
            Ok(logs) => LogsAccessorResult {
                logs: Some(logs),
                error: None,
            },
            Err(e) => LogsAccessorResult {
                logs: None,
                error: Some(e.to_string()),
            },
        }
    }
}

fn str_param(params: &HashMap<String, Value>, key: &str) -> String {
    params
        .get(key)
        .and_then(|v| v.as_str())
        .unwrap_or_default()
        .to_string()
}

/// Pull container-status signals (waiting reason, restart count) out of a
/// pod-shaped resource so the summary surfaces the root condition, not just
/// the phase.
fn extract_resource_signals(value: &Value, result: &mut ToolResult) {
    let Some(statuses) = value
        .get("status")
        .and_then(|s| s.get("containerStatuses"))
        .and_then(|c| c.as_array())
    else {
        return;
    };

    for status in statuses {
        if let Some(reason) = status
            .get("state")
            .and_then(|s| s.get("waiting"))
            .and_then(|w| w.get("reason"))
            .and_then(|r| r.as_str())
        {
            result.evidence_snippets.push(reason.to_string());
            result.severity = Some(
                match reason {
                    "CrashLoopBackOff" | "OOMKilled" => "high",
                    "ImagePullBackOff" | "ErrImagePull" => "medium",
                    _ => "medium",
                }
                .to_string(),
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::MockClusterClient;
    use serde_json::json;

    fn params(pairs: &[(&str, Value)]) -> HashMap<String, Value> {
        pairs.iter().map(|(k, v)| (k.to_string(), v.clone())).collect()
    }

    #[tokio::test]
    async fn fetch_pod_logs_classifies_critical_severity() {
        let client = Arc::new(MockClusterClient::new().with_pod_logs(
            "prod",
            "checkout-7f9",
            "starting up\nFATAL: out of memory\nshutting down",
        ));
        let executor = ToolExecutor::new(client);
        let result = executor
            .execute(
                "fetch_pod_logs",
                params(&[("namespace", json!("prod")), ("pod", json!("checkout-7f9"))]),
            )
            .await;
        assert!(result.success);
        assert_eq!(result.severity.as_deref(), Some("critical"));
        assert_eq!(result.evidence_snippets.len(), 1);
    }

    #[tokio::test]
    async fn missing_params_fail_without_dispatch() {
        let client = Arc::new(MockClusterClient::new());
        let executor = ToolExecutor::new(client);
        let result = executor.execute("fetch_pod_logs", HashMap::new()).await;
        assert!(!result.success);
        assert_eq!(result.error.as_deref(), Some("invalid parameter: missing: namespace, pod"));
    }

    #[tokio::test]
    async fn unknown_intent_fails_cleanly() {
        let client = Arc::new(MockClusterClient::new());
        let executor = ToolExecutor::new(client);
        let result = executor.execute("delete_everything", HashMap::new()).await;
        assert!(!result.success);
    }

    #[tokio::test]
    async fn re_investigate_service_is_not_yet_implemented() {
        let client = Arc::new(MockClusterClient::new());
        let executor = ToolExecutor::new(client);
        let result = executor
            .execute(
                "re_investigate_service",
                params(&[("namespace", json!("prod")), ("service", json!("checkout"))]),
            )
            .await;
        assert!(!result.success);
    }

    #[tokio::test]
    async fn pod_not_found_surfaces_sanitized_error() {
        let client = Arc::new(MockClusterClient::new());
        let executor = ToolExecutor::new(client);
        let result = executor
            .execute(
                "fetch_pod_logs",
                params(&[("namespace", json!("prod")), ("pod", json!("ghost"))]),
            )
            .await;
        assert!(!result.success);
        assert_eq!(result.error.as_deref(), Some("Pod not found in namespace prod"));
    }

    #[tokio::test]
    async fn container_waiting_reason_is_surfaced() {
        let client = Arc::new(MockClusterClient::new().with_pod_status(
            "prod",
            "checkout-7f9",
            json!({
                "phase": "Running",
                "status": {
                    "containerStatuses": [
                        {"state": {"waiting": {"reason": "CrashLoopBackOff"}}}
                    ]
                }
            }),
        ));
        let executor = ToolExecutor::new(client);
        let result = executor
            .execute(
                "check_pod_status",
                params(&[("namespace", json!("prod")), ("pod", json!("checkout-7f9"))]),
            )
            .await;
        assert!(result.success);
        assert_eq!(result.severity.as_deref(), Some("high"));
        assert!(result.evidence_snippets.contains(&"CrashLoopBackOff".to_string()));
    }

    /// Fails the first `fail_times` calls with a retryable timeout, then
    /// delegates to an inner [`MockClusterClient`].
    struct FlakyClient {
        inner: MockClusterClient,
        remaining_failures: std::sync::atomic::AtomicU32,
    }

    #[async_trait::async_trait]
    impl ClusterClient for FlakyClient {
        async fn get_pod_logs(
            &self,
            namespace: &str,
            pod: &str,
            container: Option<&str>,
            tail_lines: u64,
        ) -> crate::error::Result<String> {
            if self
                .remaining_failures
                .fetch_update(std::sync::atomic::Ordering::SeqCst, std::sync::atomic::Ordering::SeqCst, |n| {
                    if n > 0 {
                        Some(n - 1)
                    } else {
                        None
                    }
                })
                .is_ok()
            {
                return Err(crate::error::Error::timeout(1));
            }
            self.inner.get_pod_logs(namespace, pod, container, tail_lines).await
        }

        async fn describe_resource(&self, namespace: &str, kind: &str, name: &str) -> crate::error::Result<Value> {
            self.inner.describe_resource(namespace, kind, name).await
        }

        async fn query_prometheus(&self, query: &str, range_minutes: u64) -> crate::error::Result<Vec<(i64, f64)>> {
            self.inner.query_prometheus(query, range_minutes).await
        }

        async fn search_logs(&self, namespace: &str, pattern: &str, since_minutes: u64) -> crate::error::Result<Vec<String>> {
            self.inner.search_logs(namespace, pattern, since_minutes).await
        }

        async fn check_pod_status(&self, namespace: &str, pod: &str) -> crate::error::Result<Value> {
            self.inner.check_pod_status(namespace, pod).await
        }

        async fn get_events(&self, namespace: &str, since_minutes: u64) -> crate::error::Result<Vec<Value>> {
            self.inner.get_events(namespace, since_minutes).await
        }
    }

    #[tokio::test(start_paused = true)]
    async fn transient_timeouts_are_retried_until_success() {
        let client = Arc::new(FlakyClient {
            inner: MockClusterClient::new().with_pod_logs("prod", "checkout-7f9", "all good"),
            remaining_failures: std::sync::atomic::AtomicU32::new(2),
        });
        let executor = ToolExecutor::new(client);
        let handle = tokio::spawn(async move {
            executor
                .execute(
                    "fetch_pod_logs",
                    params(&[("namespace", json!("prod")), ("pod", json!("checkout-7f9"))]),
                )
                .await
        });
        tokio::time::advance(Duration::from_secs(10)).await;
        let result = handle.await.expect("task did not panic");
        assert!(result.success);
    }

    #[tokio::test]
    async fn get_resource_yaml_rejects_unsupported_kind_without_dispatch() {
        let client = Arc::new(MockClusterClient::new());
        let executor = ToolExecutor::new(client);
        let result = executor.get_resource_yaml("prod", "secret", "checkout-tls").await;
        assert_eq!(result.yaml, None);
        assert_eq!(result.error.as_deref(), Some("Unsupported resource kind: secret"));
    }

    #[tokio::test]
    async fn get_resource_yaml_returns_pretty_printed_document() {
        let client = Arc::new(MockClusterClient::new().with_resource(
            "prod",
            "deployment",
            "checkout",
            json!({"spec": {"replicas": 3}}),
        ));
        let executor = ToolExecutor::new(client);
        let result = executor.get_resource_yaml("prod", "deployment", "checkout").await;
        assert!(result.error.is_none());
        assert!(result.yaml.unwrap().contains("\"replicas\": 3"));
    }

    #[tokio::test]
    async fn get_resource_events_filters_to_the_named_resource() {
        let client = Arc::new(MockClusterClient::new().with_events(
            "prod",
            vec![
                json!({"type": "Warning", "reason": "OOMKilled", "involvedObject": {"kind": "Pod", "name": "checkout-7f9"}}),
                json!({"type": "Normal", "reason": "Scheduled", "involvedObject": {"kind": "Pod", "name": "other-pod"}}),
            ],
        ));
        let executor = ToolExecutor::new(client);
        let result = executor.get_resource_events("prod", "pod", "checkout-7f9").await;
        assert!(result.error.is_none());
        assert_eq!(result.events.len(), 1);
        assert_eq!(result.events[0]["reason"], "OOMKilled");
    }

    #[tokio::test]
    async fn get_pod_logs_accessor_clamps_tail_lines_and_sanitizes_errors() {
        let client = Arc::new(MockClusterClient::new());
        let executor = ToolExecutor::new(client);
        let result = executor.get_pod_logs("prod", "ghost", None, Some(0)).await;
        assert_eq!(result.logs, None);
        assert_eq!(result.error.as_deref(), Some("Pod not found in namespace prod"));
    }

    #[tokio::test]
    async fn get_pod_logs_accessor_returns_raw_logs_on_success() {
        let client = Arc::new(MockClusterClient::new().with_pod_logs("prod", "checkout-7f9", "line1\nline2"));
        let executor = ToolExecutor::new(client);
        let result = executor.get_pod_logs("prod", "checkout-7f9", None, None).await;
        assert_eq!(result.logs.as_deref(), Some("line1\nline2"));
        assert!(result.error.is_none());
    }

    #[tokio::test]
    async fn pod_not_found_is_not_retried() {
        let client = Arc::new(FlakyClient {
            inner: MockClusterClient::new(),
            remaining_failures: std::sync::atomic::AtomicU32::new(0),
        });
        let executor = ToolExecutor::new(client);
        let result = executor
            .execute(
                "fetch_pod_logs",
                params(&[("namespace", json!("prod")), ("pod", json!("ghost"))]),
            )
            .await;
        assert!(!result.success);
        assert_eq!(result.error.as_deref(), Some("Pod not found in namespace prod"));
    }
}
