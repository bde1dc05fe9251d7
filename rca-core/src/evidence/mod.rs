//! Evidence: atomic observations (pins), their aggregate confidence, and
//! the causal graph built over them.

pub mod graph;
pub mod ledger;
pub mod lttb;
pub mod pin;
pub mod sanitize;

pub use graph::{
    CausalEdge, EvidenceGraph, EvidenceNode, NodeType, Relationship, TimelineEvent,
    PIN_DEDUP_WINDOW_SECS,
};
pub use ledger::ConfidenceLedger;
pub use pin::{
    pin_from_tool_result, CausalRole, EvidencePin, PinId, PinSource, ValidationStatus,
    RAW_OUTPUT_TRUNCATE_CHARS,
};
pub use sanitize::Sanitizer;
