//! Main orchestrator for audit runs.
//!
//! Walks the stage graph from the entry stage to the terminal marker,
//! merging each stage's update into the record and checkpointing after
//! every step. Stops in front of the pause-before stage until a later call
//! resumes the session.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use thiserror::Error;
use tracing::{debug, error, info, instrument, warn};

use crate::adapters::Toolkit;
use crate::domain::{
    merge, AuditRecord, Checkpoint, Event, EventType, MergeError, RunResult, RunState,
};
use crate::stages::{self, Stage};

use super::checkpoint::CheckpointStore;
use super::graph::{GraphError, NextHop, StageGraph};
use super::journal::RunJournal;
use super::safety::{SafetyLimits, SafetyTracker};

/// Failures that end a `run` call
#[derive(Debug, Error)]
pub enum OrchestratorError {
    #[error("No checkpoint for session '{session}'")]
    NoCheckpoint { session: String },

    #[error("Session '{session}' is not paused; nothing to resume")]
    NotPaused { session: String },

    #[error("Stage '{stage}' selected branch '{branch}' which has no edge")]
    UnknownBranch { stage: String, branch: String },

    #[error("No stage registered for graph node '{0}'")]
    UnknownStage(String),

    #[error("Invalid stage graph: {0}")]
    Graph(GraphError),

    #[error("Step budget exceeded: {limit} stages executed without reaching a pause or the end")]
    StepBudgetExceeded { limit: u32 },

    #[error("Failed to merge stage update: {0}")]
    Merge(#[from] MergeError),

    #[error(transparent)]
    Store(#[from] anyhow::Error),
}

impl From<GraphError> for OrchestratorError {
    fn from(e: GraphError) -> Self {
        match e {
            GraphError::UnknownBranch { stage, branch } => Self::UnknownBranch { stage, branch },
            other => Self::Graph(other),
        }
    }
}

/// Drives audit runs over a stage graph
pub struct Orchestrator {
    graph: StageGraph,
    stages: HashMap<String, Arc<dyn Stage>>,
    store: Arc<dyn CheckpointStore>,
    limits: SafetyLimits,
    journal: Option<RunJournal>,
}

impl Orchestrator {
    /// Every graph node must have a stage with the same name
    pub fn new(
        graph: StageGraph,
        stages: Vec<Arc<dyn Stage>>,
        store: Arc<dyn CheckpointStore>,
    ) -> Result<Self, OrchestratorError> {
        let stages: HashMap<String, Arc<dyn Stage>> = stages
            .into_iter()
            .map(|stage| (stage.name().to_string(), stage))
            .collect();

        if let Some(missing) = graph.stages().iter().find(|name| !stages.contains_key(*name)) {
            return Err(OrchestratorError::UnknownStage(missing.clone()));
        }

        Ok(Self {
            graph,
            stages,
            store,
            limits: SafetyLimits::default(),
            journal: None,
        })
    }

    /// The standard compliance pipeline wired to `toolkit`
    pub fn compliance(
        toolkit: &Toolkit,
        store: Arc<dyn CheckpointStore>,
    ) -> Result<Self, OrchestratorError> {
        Self::new(
            StageGraph::compliance()?,
            stages::compliance_stages(toolkit),
            store,
        )
    }

    /// Replace the stage registered under the same name
    pub fn with_stage(mut self, stage: Arc<dyn Stage>) -> Result<Self, OrchestratorError> {
        let name = stage.name().to_string();
        if !self.graph.contains(&name) {
            return Err(OrchestratorError::UnknownStage(name));
        }
        self.stages.insert(name, stage);
        Ok(self)
    }

    pub fn with_journal(mut self, journal: RunJournal) -> Self {
        self.journal = Some(journal);
        self
    }

    pub fn with_limits(mut self, limits: SafetyLimits) -> Self {
        self.limits = limits;
        self
    }

    pub fn graph(&self) -> &StageGraph {
        &self.graph
    }

    /// Start a new run from `seed`, or resume the paused session when `seed`
    /// is `None`.
    ///
    /// A seed always restarts at the entry stage, discarding any checkpoint
    /// already stored under `session`. Resuming executes the pending stage
    /// without pausing again.
    #[instrument(skip(self, seed), fields(session = %session, resume = seed.is_none()))]
    pub async fn run(
        &self,
        seed: Option<AuditRecord>,
        session: &str,
    ) -> Result<RunResult, OrchestratorError> {
        let result = match self.begin(seed, session).await {
            Ok((record, start, approved)) => self.drive(session, record, start, approved).await,
            Err(e) => Err(e),
        };

        if let Err(ref e) = result {
            error!(error = %e, "Audit run failed");
            let event = Event::new(session, None, EventType::RunFailed, "Run failed")
                .with_error(e.to_string());
            if let Err(journal_err) = self.journal(event).await {
                warn!(error = %journal_err, "Failed to journal run failure");
            }
        }

        result
    }

    /// Stage awaiting approval for `session`, if any
    pub async fn pending(&self, session: &str) -> Result<Option<String>, OrchestratorError> {
        Ok(self.store.get_pending(session).await?)
    }

    /// Latest checkpoint for `session`
    pub async fn checkpoint(&self, session: &str) -> Result<Option<Checkpoint>, OrchestratorError> {
        Ok(self.store.load(session).await?)
    }

    /// Resolve the starting record and stage for a run call
    async fn begin(
        &self,
        seed: Option<AuditRecord>,
        session: &str,
    ) -> Result<(AuditRecord, String, bool), OrchestratorError> {
        let start = match seed {
            Some(seed) => {
                info!(entry = %self.graph.entry(), "Starting audit run");
                self.journal(Event::new(
                    session,
                    None,
                    EventType::RunStarted,
                    format!("Run started at '{}'", self.graph.entry()),
                ))
                .await?;
                (seed, self.graph.entry().to_string(), false)
            }
            None => {
                let checkpoint = self.store.load(session).await?.ok_or_else(|| {
                    OrchestratorError::NoCheckpoint {
                        session: session.to_string(),
                    }
                })?;
                let Some(pending) = checkpoint.pending_stage else {
                    return Err(OrchestratorError::NotPaused {
                        session: session.to_string(),
                    });
                };

                info!(stage = %pending, "Resuming approved run");
                self.journal(Event::new(
                    session,
                    Some(pending.clone()),
                    EventType::RunResumed,
                    format!("Approved; resuming at '{}'", pending),
                ))
                .await?;
                (checkpoint.record, pending, true)
            }
        };
        Ok(start)
    }

    async fn drive(
        &self,
        session: &str,
        mut record: AuditRecord,
        mut current: String,
        mut approved: bool,
    ) -> Result<RunResult, OrchestratorError> {
        let mut tracker = SafetyTracker::new();
        let mut executed = Vec::new();

        loop {
            if !approved && self.graph.pause_before() == Some(current.as_str()) {
                self.store.save(session, &record, Some(&current)).await?;
                self.journal(Event::new(
                    session,
                    Some(current.clone()),
                    EventType::RunPaused,
                    format!("Waiting for approval before '{}'", current),
                ))
                .await?;

                info!(stage = %current, executed = executed.len(), "Paused for approval");
                return Ok(RunResult {
                    session: session.to_string(),
                    record,
                    state: RunState::Paused { stage: current },
                    executed,
                });
            }
            // Approval covers the pending stage only
            approved = false;

            if self.limits.check(&tracker).is_err() {
                return Err(OrchestratorError::StepBudgetExceeded {
                    limit: self.limits.max_steps,
                });
            }

            let stage = self
                .stages
                .get(&current)
                .ok_or_else(|| OrchestratorError::UnknownStage(current.clone()))?;

            let started = Instant::now();
            let update = stage.run(&record).await;
            merge::apply(&mut record, &update)?;
            let duration_ms = started.elapsed().as_millis() as u64;

            tracker.record_step();
            executed.push(current.clone());
            self.store.save(session, &record, None).await?;
            self.journal(
                Event::new(
                    session,
                    Some(current.clone()),
                    EventType::StageCompleted,
                    format!("Stage '{}' completed in {}ms", current, duration_ms),
                )
                .with_duration(duration_ms),
            )
            .await?;
            debug!(stage = %current, duration_ms, "Stage completed");

            match self.graph.next(&current, &record)? {
                NextHop::Stage(next) => current = next,
                NextHop::End => {
                    self.journal(Event::new(
                        session,
                        None,
                        EventType::RunCompleted,
                        format!("Run completed after {} stages", executed.len()),
                    ))
                    .await?;

                    info!(
                        risk = %record.risk_level,
                        elapsed_ms = tracker.elapsed_ms(),
                        "Audit run completed"
                    );
                    return Ok(RunResult {
                        session: session.to_string(),
                        record,
                        state: RunState::Completed,
                        executed,
                    });
                }
            }
        }
    }

    async fn journal(&self, event: Event) -> Result<(), OrchestratorError> {
        if let Some(ref journal) = self.journal {
            journal.append(&event).await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::MemoryCheckpointStore;
    use crate::domain::RecordUpdate;
    use async_trait::async_trait;

    struct Noop(&'static str);

    #[async_trait]
    impl Stage for Noop {
        fn name(&self) -> &str {
            self.0
        }

        async fn run(&self, _record: &AuditRecord) -> RecordUpdate {
            RecordUpdate::empty()
        }
    }

    fn store() -> Arc<dyn CheckpointStore> {
        Arc::new(MemoryCheckpointStore::new())
    }

    #[test]
    fn test_missing_stage_rejected() {
        let graph = StageGraph::builder()
            .stage("a")
            .stage("b")
            .entry("a")
            .edge("a", NextHop::stage("b"))
            .edge("b", NextHop::End)
            .build()
            .unwrap();

        let result = Orchestrator::new(graph, vec![Arc::new(Noop("a"))], store());
        assert!(matches!(result, Err(OrchestratorError::UnknownStage(ref s)) if s == "b"));
    }

    #[test]
    fn test_override_must_name_a_graph_stage() {
        let orchestrator = Orchestrator::compliance(&Toolkit::offline().unwrap(), store()).unwrap();
        let result = orchestrator.with_stage(Arc::new(Noop("not-a-stage")));
        assert!(matches!(result, Err(OrchestratorError::UnknownStage(_))));
    }

    #[tokio::test]
    async fn test_cycle_hits_step_budget() {
        let graph = StageGraph::builder()
            .stage("loop")
            .entry("loop")
            .edge("loop", NextHop::stage("loop"))
            .build()
            .unwrap();

        let orchestrator = Orchestrator::new(graph, vec![Arc::new(Noop("loop"))], store())
            .unwrap()
            .with_limits(SafetyLimits {
                max_steps: 5,
                ..Default::default()
            });

        let err = orchestrator
            .run(Some(AuditRecord::new()), "cycle")
            .await
            .unwrap_err();
        assert!(matches!(err, OrchestratorError::StepBudgetExceeded { limit: 5 }));
    }

    #[test]
    fn test_unknown_branch_conversion() {
        let err: OrchestratorError = GraphError::UnknownBranch {
            stage: "s".into(),
            branch: "b".into(),
        }
        .into();
        assert!(matches!(err, OrchestratorError::UnknownBranch { .. }));

        let err: OrchestratorError = GraphError::MissingEntry.into();
        assert!(matches!(err, OrchestratorError::Graph(GraphError::MissingEntry)));
    }
}
