//! Causal invariants and the firewall that enforces them over candidate
//! causal links derived from issue clusters.

pub mod firewall;
pub mod invariants;

pub use firewall::{causal_firewall, AnnotatedLink, BlockedLink, CausalSearchSpace, ValidLink};
pub use invariants::{find_blocking_invariant, find_soft_rule, Invariant, SoftRule, CAUSAL_INVARIANTS, SOFT_RULES};
