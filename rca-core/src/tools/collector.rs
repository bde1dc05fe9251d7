//! Collector abstraction: the single point where a tool call actually
//! reaches the cluster (or, in tests, a synthesized fixture).

use crate::error::{Error, Result};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;

/// One Prometheus-style time series sample: (unix seconds, value).
pub type MetricPoint = (i64, f64);

/// Abstraction over the cluster APIs a tool call reads from. Exactly one
/// `ClusterClient` call is made per dispatched intent.
#[async_trait]
pub trait ClusterClient: Send + Sync {
    async fn get_pod_logs(
        &self,
        namespace: &str,
        pod: &str,
        container: Option<&str>,
        tail_lines: u64,
    ) -> Result<String>;

    async fn describe_resource(&self, namespace: &str, kind: &str, name: &str) -> Result<Value>;

    async fn query_prometheus(&self, query: &str, range_minutes: u64) -> Result<Vec<MetricPoint>>;

    async fn search_logs(
        &self,
        namespace: &str,
        pattern: &str,
        since_minutes: u64,
    ) -> Result<Vec<String>>;

    async fn check_pod_status(&self, namespace: &str, pod: &str) -> Result<Value>;

    async fn get_events(&self, namespace: &str, since_minutes: u64) -> Result<Vec<Value>>;
}

/// In-memory fixture collector for tests: resolves calls against data
/// registered ahead of time rather than reaching a real cluster.
#[derive(Default)]
pub struct MockClusterClient {
    pod_logs: HashMap<(String, String), String>,
    resources: HashMap<(String, String, String), Value>,
    metrics: HashMap<String, Vec<MetricPoint>>,
    log_matches: HashMap<(String, String), Vec<String>>,
    pod_status: HashMap<(String, String), Value>,
    events: HashMap<String, Vec<Value>>,
}

impl MockClusterClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_pod_logs(mut self, namespace: &str, pod: &str, logs: impl Into<String>) -> Self {
        self.pod_logs
            .insert((namespace.to_string(), pod.to_string()), logs.into());
        self
    }

    pub fn with_resource(
        mut self,
        namespace: &str,
        kind: &str,
        name: &str,
        value: Value,
    ) -> Self {
        self.resources.insert(
            (namespace.to_string(), kind.to_string(), name.to_string()),
            value,
        );
        self
    }

    pub fn with_metric(mut self, query: &str, points: Vec<MetricPoint>) -> Self {
        self.metrics.insert(query.to_string(), points);
        self
    }

    pub fn with_log_matches(
        mut self,
        namespace: &str,
        pattern: &str,
        matches: Vec<String>,
    ) -> Self {
        self.log_matches
            .insert((namespace.to_string(), pattern.to_string()), matches);
        self
    }

    pub fn with_pod_status(mut self, namespace: &str, pod: &str, value: Value) -> Self {
        self.pod_status
            .insert((namespace.to_string(), pod.to_string()), value);
        self
    }

    pub fn with_events(mut self, namespace: &str, events: Vec<Value>) -> Self {
        self.events.insert(namespace.to_string(), events);
        self
    }
}

#[async_trait]
impl ClusterClient for MockClusterClient {
    async fn get_pod_logs(
        &self,
        namespace: &str,
        pod: &str,
        _container: Option<&str>,
        tail_lines: u64,
    ) -> Result<String> {
        let logs = self
            .pod_logs
            .get(&(namespace.to_string(), pod.to_string()))
            .ok_or_else(|| Error::pod_not_found(namespace))?;
        let tail: Vec<&str> = logs
            .lines()
            .rev()
            .take(tail_lines as usize)
            .collect::<Vec<_>>()
            .into_iter()
            .rev()
            .collect();
        Ok(tail.join("\n"))
    }

    async fn describe_resource(&self, namespace: &str, kind: &str, name: &str) -> Result<Value> {
        self.resources
            .get(&(namespace.to_string(), kind.to_string(), name.to_string()))
            .cloned()
            .ok_or_else(Error::resource_fetch_failed)
    }

    async fn query_prometheus(&self, query: &str, range_minutes: u64) -> Result<Vec<MetricPoint>> {
        let points = self
            .metrics
            .get(query)
            .cloned()
            .ok_or_else(Error::prometheus_query_failed)?;
        let cutoff_count = points.len().min(range_minutes.max(1) as usize * 60);
        Ok(points.into_iter().rev().take(cutoff_count).rev().collect())
    }

    async fn search_logs(
        &self,
        namespace: &str,
        pattern: &str,
        _since_minutes: u64,
    ) -> Result<Vec<String>> {
        self.log_matches
            .get(&(namespace.to_string(), pattern.to_string()))
            .cloned()
            .ok_or_else(Error::log_search_failed)
    }

    async fn check_pod_status(&self, namespace: &str, pod: &str) -> Result<Value> {
        self.pod_status
            .get(&(namespace.to_string(), pod.to_string()))
            .cloned()
            .ok_or_else(|| Error::pod_not_found(namespace))
    }

    async fn get_events(&self, namespace: &str, _since_minutes: u64) -> Result<Vec<Value>> {
        Ok(self.events.get(namespace).cloned().unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn pod_logs_tail_respects_limit() {
        let client = MockClusterClient::new().with_pod_logs(
            "prod",
            "checkout-7f9",
            "line1\nline2\nline3\nline4",
        );
        let out = client
            .get_pod_logs("prod", "checkout-7f9", None, 2)
            .await
            .unwrap();
        assert_eq!(out, "line3\nline4");
    }

    #[tokio::test]
    async fn missing_pod_logs_returns_sanitized_not_found() {
        let client = MockClusterClient::new();
        let err = client.get_pod_logs("prod", "ghost", None, 10).await.unwrap_err();
        assert_eq!(err.to_string(), "Pod not found in namespace prod");
    }

    #[tokio::test]
    async fn describe_resource_roundtrips() {
        let client = MockClusterClient::new().with_resource(
            "prod",
            "Deployment",
            "checkout",
            json!({"replicas": 3}),
        );
        let out = client
            .describe_resource("prod", "Deployment", "checkout")
            .await
            .unwrap();
        assert_eq!(out["replicas"], 3);
    }

    #[tokio::test]
    async fn unregistered_resource_returns_sanitized_error() {
        let client = MockClusterClient::new();
        let err = client
            .describe_resource("prod", "Deployment", "ghost")
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Failed to fetch resource");
    }
}
