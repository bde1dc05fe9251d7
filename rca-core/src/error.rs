//! Error types for rca-core.
//!
//! Every variant's `Display` text is the sanitized string that is allowed to
//! cross a session boundary: no internal hostnames, URLs, ports, or tokens.
//! Collector failures are deliberately generic category phrases (see §7 of
//! the design notes) rather than wrapped upstream errors.

use thiserror::Error;

/// Result type alias using rca-core's Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur during diagnosis orchestration.
#[derive(Error, Debug)]
pub enum Error {
    /// A collector call failed; `category` is one of the fixed sanitized
    /// phrases from the error-handling design (e.g. "Prometheus query failed").
    #[error("{category}")]
    Collector { category: String },

    /// Operation exceeded its declared timeout.
    #[error("operation timed out after {duration_ms}ms")]
    Timeout { duration_ms: u64 },

    /// LLM call failed at the transport level.
    #[error("LLM call failed: {message}")]
    LlmApi { message: String },

    /// Session lookup failed (expired, never existed, or already swept).
    #[error("unknown session: {0}")]
    UnknownSession(String),

    /// A parameter failed validation before dispatch.
    #[error("invalid parameter: {0}")]
    InvalidParam(String),

    /// Memory / fingerprint store error.
    #[error("memory storage error: {0}")]
    MemoryStorage(String),

    /// Serialization/deserialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),

    /// Graph-level wall clock deadline exceeded.
    #[error("diagnostic graph deadline of {deadline_secs}s exceeded")]
    GraphDeadlineExceeded { deadline_secs: u64 },

    /// Internal invariant violation; never constructed from external input.
    #[error("internal error: {0}")]
    Internal(String),
}

impl Error {
    /// One of the fixed, sanitized collector-failure category phrases.
    pub fn collector(category: impl Into<String>) -> Self {
        Self::Collector {
            category: category.into(),
        }
    }

    pub fn prometheus_query_failed() -> Self {
        Self::collector("Prometheus query failed")
    }

    pub fn log_search_failed() -> Self {
        Self::collector("Log search failed")
    }

    pub fn cluster_api_error(http_code: u16, reason: impl std::fmt::Display) -> Self {
        Self::collector(format!("Cluster API error ({http_code}): {reason}"))
    }

    pub fn pod_not_found(namespace: impl std::fmt::Display) -> Self {
        Self::collector(format!("Pod not found in namespace {namespace}"))
    }

    pub fn resource_fetch_failed() -> Self {
        Self::collector("Failed to fetch resource")
    }

    pub fn pod_logs_fetch_failed() -> Self {
        Self::collector("Failed to fetch pod logs")
    }

    pub fn timeout(duration_ms: u64) -> Self {
        Self::Timeout { duration_ms }
    }

    pub fn llm_api(message: impl Into<String>) -> Self {
        Self::LlmApi {
            message: message.into(),
        }
    }

    pub fn graph_deadline_exceeded(deadline_secs: u64) -> Self {
        Self::GraphDeadlineExceeded { deadline_secs }
    }

    /// Whether a collector call that failed with this error is worth
    /// retrying. Connection-level timeouts and generic collector
    /// failures are transient; a 502/503/504 from the cluster API is
    /// transient; a 4xx (including "pod not found") is not.
    pub fn is_retryable(&self) -> bool {
        match self {
            Error::Timeout { .. } => true,
            Error::Collector { category } => {
                if category.starts_with("Pod not found") {
                    false
                } else if let Some(code) = category
                    .strip_prefix("Cluster API error (")
                    .and_then(|rest| rest.split(')').next())
                    .and_then(|code| code.parse::<u16>().ok())
                {
                    matches!(code, 502 | 503 | 504)
                } else {
                    true
                }
            }
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pod_not_found_is_not_retryable() {
        assert!(!Error::pod_not_found("prod").is_retryable());
    }

    #[test]
    fn gateway_errors_are_retryable() {
        assert!(Error::cluster_api_error(503, "unavailable").is_retryable());
        assert!(Error::cluster_api_error(502, "bad gateway").is_retryable());
    }

    #[test]
    fn client_errors_are_not_retryable() {
        assert!(!Error::cluster_api_error(403, "forbidden").is_retryable());
    }

    #[test]
    fn timeouts_are_retryable() {
        assert!(Error::timeout(5_000).is_retryable());
    }

    #[test]
    fn generic_collector_categories_are_retryable() {
        assert!(Error::prometheus_query_failed().is_retryable());
    }
}
