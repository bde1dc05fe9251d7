//! Incident fingerprint memory and audit log.
//!
//! Persists the `IncidentFingerprint` record of each resolved or abandoned
//! incident so a new one can be checked for similarity against history
//! before domain agents re-derive a diagnosis from scratch, plus an
//! append-only audit log of governance actions (attestation decisions,
//! session lifecycle events).
//!
//! ## Example
//!
//! ```rust,ignore
//! use rca_core::memory::{SqliteMemoryStore, IncidentFingerprint};
//!
//! let store = SqliteMemoryStore::in_memory()?;
//!
//! let fp = IncidentFingerprint::new(
//!     vec!["oomkilled".into()],
//!     vec!["checkout".into()],
//!     vec!["oom".into()],
//!     "memory limit too low",
//!     vec!["raise memory limit".into()],
//!     true,
//!     300,
//! );
//! store.record_fingerprint(&fp)?;
//!
//! assert!(!store.is_novel(&fp)?);
//! ```

mod schema;
mod store;
mod types;

pub use schema::{get_schema_version, initialize_schema, is_initialized, SCHEMA_VERSION};
pub use store::{AuditEntry, SqliteMemoryStore};
pub use types::{
    jaccard, FingerprintId, IncidentFingerprint, SimilarityMatch, NOVELTY_THRESHOLD,
};
