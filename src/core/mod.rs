//! Core orchestration logic.
//!
//! This module contains:
//! - Graph: Stage graph definition and validation
//! - Checkpoint: Per-session persistence of the record and pause pointer
//! - Journal: Append-only run event log
//! - Safety: Step budget and attachment limits
//! - Orchestrator: Main execution engine

pub mod checkpoint;
pub mod graph;
pub mod journal;
pub mod orchestrator;
pub mod safety;

// Re-export commonly used types
pub use checkpoint::{validate_session, CheckpointStore, FileCheckpointStore, MemoryCheckpointStore};
pub use graph::{BranchSelector, Edge, GraphBuilder, GraphError, NextHop, StageGraph};
pub use journal::RunJournal;
pub use orchestrator::{Orchestrator, OrchestratorError};
pub use safety::{SafetyLimits, SafetyTracker, SafetyViolation};
