//! Enrollment event bus: trait for raising UI-facing enrollment outputs.
//!
//! The page controller accepts an `Arc<dyn EventSink>` and raises
//! `show-auth-prompt`, `show-survey`, `enrollment-succeeded` and
//! `enrollment-failed` through it.

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum EnrollmentEventKind {
    ShowAuthPrompt,
    ShowSurvey,
    EnrollmentSucceeded,
    EnrollmentFailed,
}

impl EnrollmentEventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ShowAuthPrompt => "show-auth-prompt",
            Self::ShowSurvey => "show-survey",
            Self::EnrollmentSucceeded => "enrollment-succeeded",
            Self::EnrollmentFailed => "enrollment-failed",
        }
    }
}

/// An output raised by the enrollment core.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnrollmentEvent {
    pub event_id: Uuid,
    pub kind: EnrollmentEventKind,
    pub cause_code: String,
    pub viewer_id: Option<String>,
    /// Error message for `enrollment-failed`.
    pub detail: Option<String>,
    pub timestamp: DateTime<Utc>,
}

/// Receives enrollment outputs. Implementations route them to the UI layer.
pub trait EventSink: Send + Sync {
    fn emit(&self, event: EnrollmentEvent);
}

/// No-op sink for callers that don't observe outputs.
pub struct NoOpSink;

impl EventSink for NoOpSink {
    fn emit(&self, _event: EnrollmentEvent) {}
}

/// In-memory sink that captures events for testing.
#[derive(Default)]
pub struct CaptureSink {
    events: Mutex<Vec<EnrollmentEvent>>,
}

impl CaptureSink {
    pub fn new() -> Self {
        Self {
            events: Mutex::new(Vec::new()),
        }
    }

    pub fn events(&self) -> Vec<EnrollmentEvent> {
        self.events.lock().clone()
    }

    pub fn kinds(&self) -> Vec<EnrollmentEventKind> {
        self.events
            .lock()
            .iter()
            .map(|e| e.kind)
            .collect()
    }

    pub fn count(&self) -> usize {
        self.events.lock().len()
    }

    pub fn count_kind(&self, kind: EnrollmentEventKind) -> usize {
        self.events
            .lock()
            .iter()
            .filter(|e| e.kind == kind)
            .count()
    }

    pub fn clear(&self) {
        self.events.lock().clear();
    }
}

impl EventSink for CaptureSink {
    fn emit(&self, event: EnrollmentEvent) {
        self.events.lock().push(event);
    }
}

/// Convenience builder for creating `EnrollmentEvent` with minimal boilerplate.
pub fn make_event(
    kind: EnrollmentEventKind,
    cause_code: impl Into<String>,
    viewer_id: Option<String>,
    detail: Option<String>,
) -> EnrollmentEvent {
    EnrollmentEvent {
        event_id: Uuid::new_v4(),
        kind,
        cause_code: cause_code.into(),
        viewer_id,
        detail,
        timestamp: Utc::now(),
    }
}

pub fn noop_sink() -> Arc<dyn EventSink> {
    Arc::new(NoOpSink)
}

pub fn capture_sink() -> Arc<CaptureSink> {
    Arc::new(CaptureSink::new())
}
