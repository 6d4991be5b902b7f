//! Session Event Logger
//!
//! Structured reading-flow events written through `tracing` under the
//! `session_events` target, so the NDJSON file carries one line per event.

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::info;

use crate::redact::redact_sensitive_data;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SessionEvent {
    StepChanged { from: String, to: String },
    BirthInfoExtracted { fields_found: usize },
    AnalysisStarted { view_year: String },
    AnalysisCompleted { transcript_chars: usize, reading_chars: usize },
    AnalysisFailed { stage: String, error_msg: String },
    ChatTurn { role: String, content: String },
    ChatFailed { error_msg: String },
}

impl SessionEvent {
    fn redacted(self) -> Self {
        match self {
            SessionEvent::AnalysisFailed { stage, error_msg } => SessionEvent::AnalysisFailed {
                stage,
                error_msg: redact_sensitive_data(&error_msg),
            },
            SessionEvent::ChatTurn { role, content } => SessionEvent::ChatTurn {
                role,
                content: redact_sensitive_data(&content),
            },
            SessionEvent::ChatFailed { error_msg } => SessionEvent::ChatFailed {
                error_msg: redact_sensitive_data(&error_msg),
            },
            other => other,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct EventLogEntry {
    pub session_id: String,
    pub timestamp: DateTime<Utc>,
    pub event: SessionEvent,
}

impl EventLogEntry {
    pub fn new(session_id: &str, event: SessionEvent) -> Self {
        Self {
            session_id: session_id.into(),
            timestamp: Utc::now(),
            event: event.redacted(),
        }
    }
}

pub struct EventLogger;

impl EventLogger {
    pub fn log_event(session_id: &str, event: SessionEvent) {
        let entry = EventLogEntry::new(session_id, event);
        let json = serde_json::to_string(&entry).unwrap_or_default();
        info!(target: "session_events", session_id = %entry.session_id, event = %json, "Session event");
    }
}
