//! Resource topology: building/caching a dependency graph, pruning it to
//! a diagnostic scope, and correlating problem nodes into issue clusters.

pub mod correlator;
pub mod resolver;
pub mod types;

pub use correlator::{correlate, extract_alerts};
pub use resolver::{coverage, scoped_topology_graph, TopologyResolver};
pub use types::{
    ClusterAlert, DiagnosticScope, EdgeRelation, IssueCluster, RootCandidate, ScopeLevel,
    TopologyEdge, TopologyNode, TopologySnapshot, PROBLEM_STATUSES,
};
