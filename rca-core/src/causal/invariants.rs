//! Closed table of causal invariants a diagnosis can never assert across,
//! plus the soft rules that merely hint at low confidence.

/// One hard-blocked causal direction: `from_kind` cannot cause `to_kind`.
#[derive(Debug, Clone, Copy)]
pub struct Invariant {
    pub id: &'static str,
    pub from_kind: &'static str,
    pub to_kind: &'static str,
    pub description: &'static str,
}

/// A contextual confidence hint, not a hard block.
#[derive(Debug, Clone, Copy)]
pub struct SoftRule {
    pub id: &'static str,
    pub description: &'static str,
    pub confidence_hint: f64,
}

/// The closed hard-block table. Every entry here rules out one causal
/// direction regardless of observed evidence.
pub const CAUSAL_INVARIANTS: &[Invariant] = &[
    Invariant {
        id: "INV-CP-001",
        from_kind: "pod",
        to_kind: "etcd",
        description: "Pod failure cannot cause etcd disk pressure",
    },
    Invariant {
        id: "INV-CP-002",
        from_kind: "service",
        to_kind: "node",
        description: "Service misconfiguration cannot cause Node NotReady",
    },
    Invariant {
        id: "INV-CP-003",
        from_kind: "namespace",
        to_kind: "control_plane",
        description: "Namespace deletion cannot crash control plane",
    },
    Invariant {
        id: "INV-CP-004",
        from_kind: "pvc",
        to_kind: "api_server",
        description: "PVC pending cannot cause API server latency",
    },
    Invariant {
        id: "INV-CP-005",
        from_kind: "ingress",
        to_kind: "etcd",
        description: "Ingress error cannot cause etcd issues",
    },
    Invariant {
        id: "INV-CP-006",
        from_kind: "pod",
        to_kind: "node",
        description: "Pod failure cannot cause node failure",
    },
    Invariant {
        id: "INV-CP-007",
        from_kind: "configmap",
        to_kind: "node",
        description: "ConfigMap change cannot cause node failure",
    },
    Invariant {
        id: "INV-NET-001",
        from_kind: "pod",
        to_kind: "network_plugin",
        description: "Pod cannot degrade network plugin",
    },
    Invariant {
        id: "INV-STG-001",
        from_kind: "pod",
        to_kind: "storage_class",
        description: "Pod cannot degrade storage backend",
    },
    Invariant {
        id: "INV-STG-002",
        from_kind: "deployment",
        to_kind: "pv",
        description: "Deployment cannot cause PV failure",
    },
];

/// Contextual soft rules; used to annotate, never to block.
pub const SOFT_RULES: &[SoftRule] = &[
    SoftRule {
        id: "SOFT-001",
        description: "Node failure as root cause unlikely: transient blip, no cascading effects observed",
        confidence_hint: 0.2,
    },
    SoftRule {
        id: "SOFT-002",
        description: "CrashLoop unlikely caused by resource exhaustion: usage metrics normal",
        confidence_hint: 0.3,
    },
    SoftRule {
        id: "SOFT-003",
        description: "PVC pending unlikely caused by storage failure: backend responding normally",
        confidence_hint: 0.25,
    },
    SoftRule {
        id: "SOFT-004",
        description: "Certificate expiry not imminent: low urgency",
        confidence_hint: 0.1,
    },
];

/// Look up the hard-block invariant for `from_kind -> to_kind`, if any.
pub fn find_blocking_invariant(from_kind: &str, to_kind: &str) -> Option<&'static Invariant> {
    CAUSAL_INVARIANTS
        .iter()
        .find(|inv| inv.from_kind == from_kind && inv.to_kind == to_kind)
}

/// Look up a soft rule by id.
pub fn find_soft_rule(id: &str) -> Option<&'static SoftRule> {
    SOFT_RULES.iter().find(|rule| rule.id == id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pod_to_node_is_blocked_as_inv_cp_006() {
        let inv = find_blocking_invariant("pod", "node").unwrap();
        assert_eq!(inv.id, "INV-CP-006");
    }

    #[test]
    fn node_to_pod_is_not_blocked() {
        assert!(find_blocking_invariant("node", "pod").is_none());
    }

    #[test]
    fn table_has_exactly_ten_hard_invariants() {
        assert_eq!(CAUSAL_INVARIANTS.len(), 10);
    }

    #[test]
    fn table_has_exactly_four_soft_rules() {
        assert_eq!(SOFT_RULES.len(), 4);
    }
}
