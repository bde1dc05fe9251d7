//! Session and graph-level configuration, overridable from the
//! environment so a deployment can tune timeouts and caps without a
//! rebuild.

use std::env;
use std::time::Duration;

/// Tunables for the supervisor and cluster diagnostic graph.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Overall wall-clock deadline for one cluster diagnostic graph run.
    pub graph_deadline: Duration,
    /// Per-domain-agent timeout.
    pub node_timeout: Duration,
    /// How long a topology snapshot is cached before it is rebuilt.
    pub topology_cache_ttl: Duration,
    /// Session TTL before it is eligible for sweeping.
    pub session_ttl: Duration,
    /// Maximum re-dispatches of a domain agent per session.
    pub max_redispatch: u32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            graph_deadline: Duration::from_secs(180),
            node_timeout: Duration::from_secs(45),
            topology_cache_ttl: Duration::from_secs(300),
            session_ttl: Duration::from_secs(3600),
            max_redispatch: 1,
        }
    }
}

impl EngineConfig {
    /// Build from environment variables, falling back to defaults for any
    /// unset or unparseable value. Recognized variables:
    /// `RCA_GRAPH_DEADLINE_SECS`, `RCA_NODE_TIMEOUT_SECS`,
    /// `RCA_TOPOLOGY_CACHE_TTL_SECS`, `RCA_SESSION_TTL_SECS`,
    /// `RCA_MAX_REDISPATCH`.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            graph_deadline: env_secs("RCA_GRAPH_DEADLINE_SECS", defaults.graph_deadline),
            node_timeout: env_secs("RCA_NODE_TIMEOUT_SECS", defaults.node_timeout),
            topology_cache_ttl: env_secs("RCA_TOPOLOGY_CACHE_TTL_SECS", defaults.topology_cache_ttl),
            session_ttl: env_secs("RCA_SESSION_TTL_SECS", defaults.session_ttl),
            max_redispatch: env::var("RCA_MAX_REDISPATCH")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.max_redispatch),
        }
    }
}

fn env_secs(key: &str, default: Duration) -> Duration {
    env::var(key)
        .ok()
        .and_then(|v| v.parse::<u64>().ok())
        .map(Duration::from_secs)
        .unwrap_or(default)
}
