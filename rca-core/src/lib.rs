//! # rca-core
//!
//! Orchestration core for an autonomous incident-diagnosis engine: a
//! supervisor that drives a single application incident through a fixed
//! phase state machine, a cluster diagnostic graph that fans out
//! topology-aware domain agents under a causal-invariant firewall, an
//! evidence/causal graph with a confidence ledger and critic-based
//! revalidation, and a per-session tool executor that mediates every
//! external collector call.
//!
//! ## Core Components
//!
//! - **Supervisor**: per-incident phase state machine and agent dispatch
//! - **Cluster diagnostic graph**: concurrent domain-agent fan-out, causal
//!   firewall, and synthesis over a pruned topology snapshot
//! - **Evidence graph**: pins, causal edges, and a confidence ledger
//! - **Critic**: LLM-backed revalidation of findings and evidence deltas
//! - **Session manager**: session lifecycle, event log, and TTL sweeping
//!
//! ## Example
//!
//! ```rust,ignore
//! use rca_core::session::{SessionManager, ScanMode, IncidentPointer};
//! use rca_core::tools::MockClusterClient;
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! let manager = SessionManager::new(Duration::from_secs(3600));
//! let id = manager.create_session(
//!     IncidentPointer::default(),
//!     ScanMode::Diagnostic,
//!     Arc::new(MockClusterClient::new()),
//! );
//! ```

pub mod attestation;
pub mod causal;
pub mod cluster_graph;
pub mod config;
pub mod critic;
pub mod domain_agents;
pub mod error;
pub mod evidence;
pub mod guard;
pub mod llm;
pub mod memory;
pub mod reasoning;
pub mod session;
pub mod supervisor;
pub mod synthesizer;
pub mod tools;
pub mod topology;

pub use attestation::{AttestationGate, Decision, GateType};
pub use config::EngineConfig;
pub use critic::{Critic, DeltaResult, ValidationResult, Verdict};
pub use error::{Error, Result};
pub use guard::{run_guard_scan, GuardScanResult, OverallHealth, ScanDelta};
pub use reasoning::{ReasoningManifest, ReasoningStep};
pub use session::{ScanMode, Session, SessionManager, Workflow};
pub use supervisor::{AgentKind, GateDecision, IncidentContext, Phase, Supervisor};
pub use synthesizer::{synthesize, ClusterHealthReport, PlatformHealth};
