//! Session manager: owns every in-flight incident investigation,
//! indexed by session id, and sweeps expired ones on a timer.
//!
//! Each session's mutable state lives behind its own
//! `tokio::sync::Mutex` — "all write access to its state must be
//! inside the lock" — so the manager's own maps need only ever be
//! locked long enough to look an entry up.

use std::collections::HashMap;
use std::sync::{Arc, Mutex as StdMutex};
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tokio::sync::Mutex as AsyncMutex;
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::evidence::{pin_from_tool_result, EvidenceGraph, NodeType, PinId};
use crate::llm::{ChatMessage, CompletionRequest, InvestigationRouter, LLMClient};
use crate::supervisor::Supervisor;
use crate::tools::{ClusterClient, RouterContext, ToolExecutor, ToolResult, TriggeredBy};
use crate::topology::DiagnosticScope;

use super::events::EventEmitter;

/// Interval at which the background sweeper wakes to evict expired
/// sessions.
pub const SESSION_CLEANUP_INTERVAL: Duration = Duration::from_secs(60);

/// Wall-clock budget for the investigation smart path: a free-form query
/// routed through an `InvestigationRouter` and answered by the LLM.
pub const SMART_PATH_TIMEOUT: Duration = Duration::from_secs(15);

/// How a session's scan is driven.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScanMode {
    Diagnostic,
    Guard,
}

/// What incident a session is investigating.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IncidentPointer {
    pub service: Option<String>,
    pub namespace: Option<String>,
    pub trace_id: Option<String>,
    pub time_window: Option<String>,
}

/// Which workflow a session owns. A session owns exactly one of these
/// for its lifetime.
pub enum Workflow {
    ApplicationService(Supervisor),
    ClusterDiagnostic(DiagnosticScope),
}

/// One incident investigation's full state, reachable only through its
/// own lock.
pub struct Session {
    pub id: String,
    pub incident: IncidentPointer,
    pub scan_mode: ScanMode,
    pub workflow: Workflow,
    pub created_at: Instant,
}

impl Session {
    fn new(id: String, incident: IncidentPointer, scan_mode: ScanMode, workflow: Workflow) -> Self {
        Self {
            id,
            incident,
            scan_mode,
            workflow,
            created_at: Instant::now(),
        }
    }
}

/// Owns {session_id -> Session}, {session_id -> ToolExecutor},
/// {session_id -> router}, and {session_id -> in-flight critic tasks}.
/// A session's `Supervisor` lives inside its `Session`, not in a
/// separate map — there is exactly one workflow per session.
pub struct SessionManager {
    sessions: StdMutex<HashMap<String, Arc<AsyncMutex<Session>>>>,
    executors: StdMutex<HashMap<String, Arc<ToolExecutor>>>,
    routers: StdMutex<HashMap<String, Arc<InvestigationRouter>>>,
    evidence: StdMutex<HashMap<String, Arc<AsyncMutex<EvidenceGraph>>>>,
    critic_tasks: StdMutex<HashMap<String, Vec<JoinHandle<()>>>>,
    pub events: Arc<EventEmitter>,
    session_ttl: Duration,
}

impl SessionManager {
    pub fn new(session_ttl: Duration) -> Self {
        Self {
            sessions: StdMutex::new(HashMap::new()),
            executors: StdMutex::new(HashMap::new()),
            routers: StdMutex::new(HashMap::new()),
            evidence: StdMutex::new(HashMap::new()),
            critic_tasks: StdMutex::new(HashMap::new()),
            events: Arc::new(EventEmitter::new()),
            session_ttl,
        }
    }

    /// Create a session for `incident`, wiring a fresh `ToolExecutor`
    /// bound to `client` and a fresh `InvestigationRouter`. Returns the
    /// new session id.
    pub fn create_session(
        &self,
        incident: IncidentPointer,
        scan_mode: ScanMode,
        client: Arc<dyn ClusterClient>,
    ) -> String {
        let id = Uuid::new_v4().to_string();
        let workflow = match scan_mode {
            ScanMode::Diagnostic => Workflow::ApplicationService(Supervisor::new()),
            ScanMode::Guard => Workflow::ClusterDiagnostic(DiagnosticScope::cluster()),
        };
        let session = Session::new(id.clone(), incident, scan_mode, workflow);

        self.sessions
            .lock()
            .expect("session map lock poisoned")
            .insert(id.clone(), Arc::new(AsyncMutex::new(session)));
        self.executors
            .lock()
            .expect("executor map lock poisoned")
            .insert(id.clone(), Arc::new(ToolExecutor::new(client)));
        self.routers
            .lock()
            .expect("router map lock poisoned")
            .insert(id.clone(), Arc::new(InvestigationRouter::new()));
        self.evidence
            .lock()
            .expect("evidence map lock poisoned")
            .insert(id.clone(), Arc::new(AsyncMutex::new(EvidenceGraph::new())));

        id
    }

    pub fn get_session(&self, session_id: &str) -> Result<Arc<AsyncMutex<Session>>> {
        self.sessions
            .lock()
            .expect("session map lock poisoned")
            .get(session_id)
            .cloned()
            .ok_or_else(|| Error::UnknownSession(session_id.to_string()))
    }

    pub fn get_executor(&self, session_id: &str) -> Result<Arc<ToolExecutor>> {
        self.executors
            .lock()
            .expect("executor map lock poisoned")
            .get(session_id)
            .cloned()
            .ok_or_else(|| Error::UnknownSession(session_id.to_string()))
    }

    pub fn get_router(&self, session_id: &str) -> Result<Arc<InvestigationRouter>> {
        self.routers
            .lock()
            .expect("router map lock poisoned")
            .get(session_id)
            .cloned()
            .ok_or_else(|| Error::UnknownSession(session_id.to_string()))
    }

    pub fn get_evidence_graph(&self, session_id: &str) -> Result<Arc<AsyncMutex<EvidenceGraph>>> {
        self.evidence
            .lock()
            .expect("evidence map lock poisoned")
            .get(session_id)
            .cloned()
            .ok_or_else(|| Error::UnknownSession(session_id.to_string()))
    }

    /// Smart path for `POST /session/{id}/investigate`: route a free-form
    /// query to a model tier, ask the LLM, and fold the answer into the
    /// session's evidence graph as a single pin. Bounded by
    /// `SMART_PATH_TIMEOUT`; a timeout or LLM failure still yields a pin,
    /// just a failed one, rather than propagating the error to the caller.
    pub async fn investigate(
        &self,
        session_id: &str,
        query: &str,
        client: Arc<dyn LLMClient>,
    ) -> Result<PinId> {
        let router = self.get_router(session_id)?;
        let graph = self.get_evidence_graph(session_id)?;
        let incident = {
            let session = self.get_session(session_id)?;
            let incident = session.lock().await.incident.clone();
            incident
        };

        let decision = router.route(query, &crate::llm::RoutingContext::new());

        let request = CompletionRequest::new()
            .with_model(decision.model.id.clone())
            .with_message(ChatMessage::user(query));

        let result = match tokio::time::timeout(SMART_PATH_TIMEOUT, client.complete(request)).await
        {
            Ok(Ok(response)) => ToolResult::success(
                "investigate",
                response.content,
                crate::tools::EvidenceType::Log,
                crate::tools::Domain::Unknown,
            ),
            Ok(Err(err)) => ToolResult::failure("investigate", err.to_string()),
            Err(_) => ToolResult::failure(
                "investigate",
                format!(
                    "smart path exceeded {}s budget",
                    SMART_PATH_TIMEOUT.as_secs()
                ),
            ),
        };

        let ctx = RouterContext {
            namespace: incident.namespace,
            service: incident.service,
            resource_name: None,
            time_window: incident.time_window,
        };
        let pin = pin_from_tool_result(&result, TriggeredBy::UserChat, &ctx);
        let pin_id = graph.lock().await.add_evidence(pin, NodeType::Context);

        Ok(pin_id)
    }

    /// Track a critic task so the sweeper can cancel it if the session
    /// expires before the task finishes.
    pub fn register_critic_task(&self, session_id: &str, handle: JoinHandle<()>) {
        self.critic_tasks
            .lock()
            .expect("critic task map lock poisoned")
            .entry(session_id.to_string())
            .or_default()
            .push(handle);
    }

    pub fn session_count(&self) -> usize {
        self.sessions.lock().expect("session map lock poisoned").len()
    }

    /// Evict every session older than the configured TTL: cancels its
    /// in-flight critic tasks (an already-finished task is simply not
    /// cancelled, never an error), then deletes its router, executor,
    /// event log, and session entries. Returns the evicted session ids.
    pub fn sweep(&self) -> Vec<String> {
        let expired: Vec<String> = {
            let sessions = self.sessions.lock().expect("session map lock poisoned");
            let mut ids = Vec::new();
            for (id, session) in sessions.iter() {
                let elapsed = match session.try_lock() {
                    Ok(guard) => guard.created_at.elapsed(),
                    Err(_) => continue, // in active use; leave it for the next sweep
                };
                if elapsed > self.session_ttl {
                    ids.push(id.clone());
                }
            }
            ids
        };

        for id in &expired {
            if let Some(handles) = self.critic_tasks.lock().expect("critic task map lock poisoned").remove(id) {
                for handle in handles {
                    if !handle.is_finished() {
                        handle.abort();
                    }
                }
            }
            self.routers.lock().expect("router map lock poisoned").remove(id);
            self.evidence.lock().expect("evidence map lock poisoned").remove(id);
            self.executors.lock().expect("executor map lock poisoned").remove(id);
            self.events.remove_session(id);
            self.sessions.lock().expect("session map lock poisoned").remove(id);
        }

        expired
    }
}

/// Run the background sweeper until the manager is dropped. Intended
/// to be spawned once per process: `tokio::spawn(run_sweeper(manager))`.
pub async fn run_sweeper(manager: Arc<SessionManager>) {
    let mut interval = tokio::time::interval(SESSION_CLEANUP_INTERVAL);
    loop {
        interval.tick().await;
        let evicted = manager.sweep();
        for id in evicted {
            tracing::info!(session_id = %id, "session swept after exceeding its TTL");
        }
    }
}
