//! Domain types for the sentinels pipeline.
//!
//! This module contains the core data structures:
//! - AuditRecord: State shared by every stage
//! - Merge: Per-field merge policy table
//! - Events: Journal entries
//! - Run: Checkpoints and run results

pub mod events;
pub mod merge;
pub mod record;
pub mod run;

// Re-export commonly used types
pub use events::{Event, EventType};
pub use merge::{apply, merge, policy_for, MergeError, MergePolicy, MERGE_POLICIES};
pub use record::{
    AuditRecord, Confidence, EnforcementAction, RecordUpdate, RiskLevel, DEFAULT_SENSITIVITY,
    FORECAST_LEN, NO_ACTION_REQUIRED, RED_TEAM_PREFIX,
};
pub use run::{Checkpoint, RunResult, RunState};
