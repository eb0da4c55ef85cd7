//! Run results and persisted checkpoints.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::record::AuditRecord;

/// Persisted state of a session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Checkpoint {
    /// Session key
    pub session: String,

    /// Record as of the last executed stage
    pub record: AuditRecord,

    /// Stage awaiting approval; `Some` means the session is paused
    pub pending_stage: Option<String>,

    /// When this checkpoint was written
    pub saved_at: DateTime<Utc>,
}

impl Checkpoint {
    pub fn new(session: impl Into<String>, record: AuditRecord, pending_stage: Option<String>) -> Self {
        Self {
            session: session.into(),
            record,
            pending_stage,
            saved_at: Utc::now(),
        }
    }

    pub fn is_paused(&self) -> bool {
        self.pending_stage.is_some()
    }
}

/// Where a run stopped
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "status")]
pub enum RunState {
    /// Stopped before `stage`, waiting for approval
    Paused { stage: String },

    /// Reached the terminal marker
    Completed,
}

/// Result of one `Orchestrator::run` call
#[derive(Debug, Clone)]
pub struct RunResult {
    /// Session key the run belongs to
    pub session: String,

    /// Record at the point the run stopped
    pub record: AuditRecord,

    /// Paused or completed
    pub state: RunState,

    /// Stages executed during this call, in order
    pub executed: Vec<String>,
}

impl RunResult {
    /// Stage awaiting approval, if paused
    pub fn pending_stage(&self) -> Option<&str> {
        match &self.state {
            RunState::Paused { stage } => Some(stage.as_str()),
            RunState::Completed => None,
        }
    }

    pub fn is_paused(&self) -> bool {
        matches!(self.state, RunState::Paused { .. })
    }

    pub fn is_completed(&self) -> bool {
        matches!(self.state, RunState::Completed)
    }
}
