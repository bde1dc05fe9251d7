//! Per-session ordered event log and subscriber fanout.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Mutex;
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender};

/// Category of one `TaskEvent`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    Started,
    Progress,
    Completed,
    Failed,
    Warning,
}

/// One entry in a session's event log.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskEvent {
    pub timestamp: DateTime<Utc>,
    pub agent_name: String,
    pub event_type: EventType,
    pub message: String,
    pub details: serde_json::Value,
}

impl TaskEvent {
    pub fn new(agent_name: impl Into<String>, event_type: EventType, message: impl Into<String>) -> Self {
        Self {
            timestamp: Utc::now(),
            agent_name: agent_name.into(),
            event_type,
            message: message.into(),
            details: serde_json::Value::Null,
        }
    }

    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = details;
        self
    }
}

/// Per-session ordered `TaskEvent` log, with fanout to live subscribers.
/// `emit` always appends to the log first; a subscriber that can't
/// receive the fanout is logged at WARN and otherwise ignored.
#[derive(Default)]
pub struct EventEmitter {
    logs: Mutex<HashMap<String, Vec<TaskEvent>>>,
    subscribers: Mutex<HashMap<String, Vec<UnboundedSender<TaskEvent>>>>,
}

impl EventEmitter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn emit(&self, session_id: &str, event: TaskEvent) {
        self.logs
            .lock()
            .expect("event log lock poisoned")
            .entry(session_id.to_string())
            .or_default()
            .push(event.clone());

        let mut subscribers = self.subscribers.lock().expect("subscriber lock poisoned");
        if let Some(senders) = subscribers.get_mut(session_id) {
            senders.retain(|sender| match sender.send(event.clone()) {
                Ok(()) => true,
                Err(_) => {
                    tracing::warn!(session_id, "event fanout failed, dropping dead subscriber");
                    false
                }
            });
        }
    }

    pub fn subscribe(&self, session_id: &str) -> UnboundedReceiver<TaskEvent> {
        let (tx, rx) = tokio::sync::mpsc::unbounded_channel();
        self.subscribers
            .lock()
            .expect("subscriber lock poisoned")
            .entry(session_id.to_string())
            .or_default()
            .push(tx);
        rx
    }

    pub fn events(&self, session_id: &str) -> Vec<TaskEvent> {
        self.logs
            .lock()
            .expect("event log lock poisoned")
            .get(session_id)
            .cloned()
            .unwrap_or_default()
    }

    /// Drop a session's log and subscribers. Called by the sweeper.
    pub fn remove_session(&self, session_id: &str) {
        self.logs.lock().expect("event log lock poisoned").remove(session_id);
        self.subscribers.lock().expect("subscriber lock poisoned").remove(session_id);
    }
}
