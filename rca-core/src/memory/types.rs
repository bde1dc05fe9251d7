//! Incident fingerprint types.
//!
//! An `IncidentFingerprint` is the durable record of a resolved (or
//! abandoned) diagnosis: the symptom vocabulary that described it, what it
//! turned out to be, and whether the remediation worked. The store uses
//! these to flag a new incident as a likely repeat rather than novel.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use uuid::Uuid;

/// Unique identifier for an `IncidentFingerprint`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FingerprintId(Uuid);

impl FingerprintId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn parse(s: &str) -> Result<Self, uuid::Error> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

impl Default for FingerprintId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for FingerprintId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A resolved or abandoned incident, recorded for future similarity lookup.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IncidentFingerprint {
    pub id: FingerprintId,
    /// Normalized error-message tokens observed during the incident.
    pub error_patterns: Vec<String>,
    /// Services implicated by the evidence graph.
    pub affected_services: Vec<String>,
    /// Coarse symptom categories, e.g. "crash_loop", "oom", "dns_failure".
    pub symptom_categories: Vec<String>,
    pub root_cause: String,
    pub resolution_steps: Vec<String>,
    pub success: bool,
    pub time_to_resolve_secs: u64,
    pub recorded_at: DateTime<Utc>,
}

impl IncidentFingerprint {
    pub fn new(
        error_patterns: Vec<String>,
        affected_services: Vec<String>,
        symptom_categories: Vec<String>,
        root_cause: impl Into<String>,
        resolution_steps: Vec<String>,
        success: bool,
        time_to_resolve_secs: u64,
    ) -> Self {
        Self {
            id: FingerprintId::new(),
            error_patterns,
            affected_services,
            symptom_categories,
            root_cause: root_cause.into(),
            resolution_steps,
            success,
            time_to_resolve_secs,
            recorded_at: Utc::now(),
        }
    }

    /// Union of error_patterns, affected_services, and symptom_categories,
    /// lowercased — the set Jaccard similarity is computed over.
    pub fn signature_set(&self) -> HashSet<String> {
        self.error_patterns
            .iter()
            .chain(self.affected_services.iter())
            .chain(self.symptom_categories.iter())
            .map(|s| s.to_lowercase())
            .collect()
    }

    /// Jaccard similarity of the union of the three string sets.
    pub fn similarity(&self, other: &IncidentFingerprint) -> f64 {
        jaccard(&self.signature_set(), &other.signature_set())
    }
}

/// Jaccard similarity: |A ∩ B| / |A ∪ B|. Two empty sets are defined as
/// dissimilar (0.0) rather than identical, since an empty fingerprint
/// carries no signal to match against.
pub fn jaccard(a: &HashSet<String>, b: &HashSet<String>) -> f64 {
    if a.is_empty() && b.is_empty() {
        return 0.0;
    }
    let intersection = a.intersection(b).count();
    let union = a.union(b).count();
    if union == 0 {
        0.0
    } else {
        intersection as f64 / union as f64
    }
}

/// Threshold above which an incident is considered a repeat, not novel.
pub const NOVELTY_THRESHOLD: f64 = 0.8;

/// Result of comparing a candidate fingerprint against the store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimilarityMatch {
    pub fingerprint: IncidentFingerprint,
    pub similarity: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fp(patterns: &[&str], services: &[&str], categories: &[&str]) -> IncidentFingerprint {
        IncidentFingerprint::new(
            patterns.iter().map(|s| s.to_string()).collect(),
            services.iter().map(|s| s.to_string()).collect(),
            categories.iter().map(|s| s.to_string()).collect(),
            "root cause",
            vec!["restart pod".to_string()],
            true,
            120,
        )
    }

    #[test]
    fn identical_fingerprints_have_similarity_one() {
        let a = fp(&["oomkilled"], &["checkout"], &["oom"]);
        let b = fp(&["oomkilled"], &["checkout"], &["oom"]);
        assert_eq!(a.similarity(&b), 1.0);
    }

    #[test]
    fn disjoint_fingerprints_have_similarity_zero() {
        let a = fp(&["oomkilled"], &["checkout"], &["oom"]);
        let b = fp(&["dns timeout"], &["frontend"], &["dns_failure"]);
        assert_eq!(a.similarity(&b), 0.0);
    }

    #[test]
    fn empty_fingerprints_are_not_similar() {
        let a = fp(&[], &[], &[]);
        let b = fp(&[], &[], &[]);
        assert_eq!(a.similarity(&b), 0.0);
    }
}
