//! sentinels - Checkpointed compliance-audit pipeline
//!
//! Runs a transaction log and optional evidence through a graph of audit
//! stages (discovery, risk analysis, gap analysis, remediation, consensus,
//! forecasting) and stops before enforcement until a human approves.
//!
//! # Architecture
//!
//! The system is built around a single record and a stage graph:
//! - Each stage reads the record and returns a partial update
//! - Updates are merged by a per-field policy (append or overwrite)
//! - The record is checkpointed after every stage, keyed by session
//! - A paused session is resumed by a later, separate call
//!
//! # Modules
//!
//! - `adapters`: Capability interfaces (search, LLM, policy, evidence)
//! - `core`: Orchestration logic (StageGraph, Checkpoint, Journal, Safety)
//! - `domain`: Data structures (AuditRecord, RecordUpdate, Event)
//! - `stages`: The audit stages
//! - `cli`: Command-line interface
//!
//! # Usage
//!
//! ```bash
//! # Start an audit (pauses before enforcement)
//! sentinels run --session q3-payments --log-sample "card 4111-2222-3333-4444"
//!
//! # Check where it stopped
//! sentinels status q3-payments
//!
//! # Approve and enforce
//! sentinels approve q3-payments
//! ```

pub mod adapters;
pub mod cli;
pub mod config;
pub mod core;
pub mod domain;
pub mod report;
pub mod stages;

// Re-export main types at crate root for convenience
pub use adapters::Toolkit;
pub use core::{
    CheckpointStore, FileCheckpointStore, MemoryCheckpointStore, Orchestrator, OrchestratorError,
    RunJournal, StageGraph,
};
pub use domain::{AuditRecord, Checkpoint, RecordUpdate, RiskLevel, RunResult, RunState};
pub use stages::Stage;
