//! SQLite-backed incident fingerprint store and audit log.

use crate::error::{Error, Result};
use crate::memory::schema::{initialize_schema, is_initialized};
use crate::memory::types::{FingerprintId, IncidentFingerprint, SimilarityMatch, NOVELTY_THRESHOLD};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection};
use std::path::Path;
use std::sync::{Arc, Mutex};

/// SQLite-backed memory store for incident fingerprints and the audit log.
pub struct SqliteMemoryStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteMemoryStore {
    /// Open or create a memory store at the given path.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let conn = Connection::open(path).map_err(|e| Error::MemoryStorage(e.to_string()))?;

        if !is_initialized(&conn) {
            initialize_schema(&conn).map_err(|e| Error::MemoryStorage(e.to_string()))?;
        }

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Create an in-memory store (for testing).
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(|e| Error::MemoryStorage(e.to_string()))?;
        initialize_schema(&conn).map_err(|e| Error::MemoryStorage(e.to_string()))?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    fn with_conn<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Connection) -> rusqlite::Result<T>,
    {
        let conn = self
            .conn
            .lock()
            .map_err(|e| Error::Internal(format!("failed to lock connection: {e}")))?;
        f(&conn).map_err(|e| Error::MemoryStorage(e.to_string()))
    }

    // ==================== Incident fingerprints ====================

    /// Record a resolved or abandoned incident.
    pub fn record_fingerprint(&self, fp: &IncidentFingerprint) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO incident_fingerprints (
                    id, error_patterns, affected_services, symptom_categories,
                    root_cause, resolution_steps, success, time_to_resolve_secs, recorded_at
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                params![
                    fp.id.to_string(),
                    serde_json::to_string(&fp.error_patterns).unwrap_or_default(),
                    serde_json::to_string(&fp.affected_services).unwrap_or_default(),
                    serde_json::to_string(&fp.symptom_categories).unwrap_or_default(),
                    fp.root_cause,
                    serde_json::to_string(&fp.resolution_steps).unwrap_or_default(),
                    fp.success as i64,
                    fp.time_to_resolve_secs as i64,
                    fp.recorded_at.to_rfc3339(),
                ],
            )?;
            Ok(())
        })
    }

    /// Fetch a fingerprint by id.
    pub fn get_fingerprint(&self, id: &FingerprintId) -> Result<Option<IncidentFingerprint>> {
        self.with_conn(|conn| {
            conn.query_row(
                "SELECT id, error_patterns, affected_services, symptom_categories,
                        root_cause, resolution_steps, success, time_to_resolve_secs, recorded_at
                 FROM incident_fingerprints WHERE id = ?1",
                params![id.to_string()],
                row_to_fingerprint,
            )
            .optional_result()
        })
    }

    /// All recorded fingerprints, most recent first.
    pub fn all_fingerprints(&self) -> Result<Vec<IncidentFingerprint>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, error_patterns, affected_services, symptom_categories,
                        root_cause, resolution_steps, success, time_to_resolve_secs, recorded_at
                 FROM incident_fingerprints ORDER BY recorded_at DESC",
            )?;
            let rows = stmt.query_map([], row_to_fingerprint)?;
            rows.collect()
        })
    }

    /// Find the most similar recorded fingerprints to `candidate`, sorted by
    /// descending similarity. An incident is novel iff the top similarity is
    /// below [`NOVELTY_THRESHOLD`].
    pub fn find_similar(
        &self,
        candidate: &IncidentFingerprint,
        limit: usize,
    ) -> Result<Vec<SimilarityMatch>> {
        let mut matches: Vec<SimilarityMatch> = self
            .all_fingerprints()?
            .into_iter()
            .filter(|fp| fp.id != candidate.id)
            .map(|fp| {
                let similarity = candidate.similarity(&fp);
                SimilarityMatch {
                    fingerprint: fp,
                    similarity,
                }
            })
            .collect();
        matches.sort_by(|a, b| b.similarity.partial_cmp(&a.similarity).unwrap());
        matches.truncate(limit);
        Ok(matches)
    }

    /// Whether `candidate` is novel against everything recorded so far.
    pub fn is_novel(&self, candidate: &IncidentFingerprint) -> Result<bool> {
        let top = self.find_similar(candidate, 1)?;
        Ok(top.first().map_or(true, |m| m.similarity < NOVELTY_THRESHOLD))
    }

    // ==================== Audit log ====================

    /// Append an audit log entry. Entries are never updated or deleted.
    pub fn audit(
        &self,
        entity_type: &str,
        entity_id: &str,
        action: &str,
        actor: &str,
        details: Option<&serde_json::Value>,
    ) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO audit_log (id, ts, entity_type, entity_id, action, actor, details)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    uuid::Uuid::new_v4().to_string(),
                    Utc::now().to_rfc3339(),
                    entity_type,
                    entity_id,
                    action,
                    actor,
                    details.map(|d| d.to_string()),
                ],
            )?;
            Ok(())
        })
    }

    /// Audit entries for a given entity, oldest first.
    pub fn audit_history(&self, entity_type: &str, entity_id: &str) -> Result<Vec<AuditEntry>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, ts, entity_type, entity_id, action, actor, details
                 FROM audit_log WHERE entity_type = ?1 AND entity_id = ?2 ORDER BY ts ASC",
            )?;
            let rows = stmt.query_map(params![entity_type, entity_id], |row| {
                Ok(AuditEntry {
                    id: row.get(0)?,
                    ts: row
                        .get::<_, String>(1)?
                        .parse()
                        .unwrap_or_else(|_| Utc::now()),
                    entity_type: row.get(2)?,
                    entity_id: row.get(3)?,
                    action: row.get(4)?,
                    actor: row.get(5)?,
                    details: row
                        .get::<_, Option<String>>(6)?
                        .and_then(|s| serde_json::from_str(&s).ok()),
                })
            })?;
            rows.collect()
        })
    }
}

/// A single audit log row.
#[derive(Debug, Clone)]
pub struct AuditEntry {
    pub id: String,
    pub ts: DateTime<Utc>,
    pub entity_type: String,
    pub entity_id: String,
    pub action: String,
    pub actor: String,
    pub details: Option<serde_json::Value>,
}

fn row_to_fingerprint(row: &rusqlite::Row<'_>) -> rusqlite::Result<IncidentFingerprint> {
    let id_str: String = row.get(0)?;
    Ok(IncidentFingerprint {
        id: FingerprintId::parse(&id_str)
            .map_err(|e| rusqlite::Error::InvalidColumnType(0, e.to_string(), rusqlite::types::Type::Text))?,
        error_patterns: serde_json::from_str(&row.get::<_, String>(1)?).unwrap_or_default(),
        affected_services: serde_json::from_str(&row.get::<_, String>(2)?).unwrap_or_default(),
        symptom_categories: serde_json::from_str(&row.get::<_, String>(3)?).unwrap_or_default(),
        root_cause: row.get(4)?,
        resolution_steps: serde_json::from_str(&row.get::<_, String>(5)?).unwrap_or_default(),
        success: row.get::<_, i64>(6)? != 0,
        time_to_resolve_secs: row.get::<_, i64>(7)? as u64,
        recorded_at: row
            .get::<_, String>(8)?
            .parse()
            .unwrap_or_else(|_| Utc::now()),
    })
}

/// Small extension to turn a `QueryReturnedNoRows` error into `Ok(None)`.
trait OptionalResult<T> {
    fn optional_result(self) -> rusqlite::Result<Option<T>>;
}

impl<T> OptionalResult<T> for rusqlite::Result<T> {
    fn optional_result(self) -> rusqlite::Result<Option<T>> {
        match self {
            Ok(v) => Ok(Some(v)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e),
        }
    }
}
