//! Journal events for audit runs.
//!
//! Every lifecycle transition of a session is recorded as an immutable event
//! in an append-only journal, next to the checkpoint that holds the record.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A single entry in a session's journal
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    /// Unique identifier for this event
    pub id: Uuid,

    /// When this event occurred (ISO 8601)
    pub timestamp: DateTime<Utc>,

    /// Session the event belongs to
    pub session: String,

    /// Stage name (if applicable)
    pub stage: Option<String>,

    /// Type of event
    pub event_type: EventType,

    /// Human-readable summary
    pub summary: String,

    /// Time taken in milliseconds (for completed stages)
    pub duration_ms: Option<u64>,

    /// Error message if failed
    pub error: Option<String>,
}

impl Event {
    /// Create a new event with the current timestamp
    pub fn new(
        session: impl Into<String>,
        stage: Option<String>,
        event_type: EventType,
        summary: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            session: session.into(),
            stage,
            event_type,
            summary: summary.into(),
            duration_ms: None,
            error: None,
        }
    }

    pub fn with_duration(mut self, duration_ms: u64) -> Self {
        self.duration_ms = Some(duration_ms);
        self
    }

    pub fn with_error(mut self, error: String) -> Self {
        self.error = Some(error);
        self
    }
}

/// Types of events that can occur during an audit run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    /// A new run started from a seed record
    RunStarted,

    /// A paused run was approved and resumed
    RunResumed,

    /// A stage executed and its update was merged
    StageCompleted,

    /// The run stopped before the approval stage
    RunPaused,

    /// The run reached the terminal marker
    RunCompleted,

    /// The run stopped on a graph or store error
    RunFailed,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_serialization() {
        let event = Event::new(
            "session-a",
            Some("discovery".to_string()),
            EventType::StageCompleted,
            "Stage 'discovery' completed",
        )
        .with_duration(12);

        let json = serde_json::to_string(&event).unwrap();
        let parsed: Event = serde_json::from_str(&json).unwrap();

        assert_eq!(parsed.event_type, EventType::StageCompleted);
        assert_eq!(parsed.stage.as_deref(), Some("discovery"));
        assert_eq!(parsed.duration_ms, Some(12));
    }

    #[test]
    fn test_event_with_error() {
        let event = Event::new("s", None, EventType::RunFailed, "Run failed")
            .with_error("no edge for branch 'sideways'".to_string());

        assert_eq!(
            event.error,
            Some("no edge for branch 'sideways'".to_string())
        );
    }
}
