//! Session: one incident's lifetime, from creation through TTL sweep,
//! plus the event log subscribers watch it through.

pub mod events;
pub mod manager;

pub use events::{EventEmitter, EventType, TaskEvent};
pub use manager::{
    run_sweeper, IncidentPointer, ScanMode, Session, SessionManager, Workflow,
    SESSION_CLEANUP_INTERVAL, SMART_PATH_TIMEOUT,
};
