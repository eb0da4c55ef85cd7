//! Stage graph definitions.
//!
//! A graph is a set of named stages connected by edges. An edge is either
//! direct or a branch: a selector inspects the freshly merged record and
//! returns a label, and the label picks the next hop. One stage may be
//! marked pause-before, which makes the orchestrator stop and wait for
//! approval before executing it.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use thiserror::Error;

use crate::domain::AuditRecord;
use crate::stages::{self, discovery};

/// Chooses a branch label from the current record
pub type BranchSelector = Arc<dyn Fn(&AuditRecord) -> String + Send + Sync>;

/// Where execution goes after a stage
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NextHop {
    Stage(String),
    End,
}

impl NextHop {
    pub fn stage(name: impl Into<String>) -> Self {
        Self::Stage(name.into())
    }
}

/// Outgoing edge of a stage
#[derive(Clone)]
pub enum Edge {
    /// Always go to the same hop
    Direct(NextHop),

    /// Evaluate the selector and follow the matching route
    Branch {
        selector: BranchSelector,
        routes: HashMap<String, NextHop>,
    },
}

impl fmt::Debug for Edge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Direct(hop) => f.debug_tuple("Direct").field(hop).finish(),
            Self::Branch { routes, .. } => f.debug_struct("Branch").field("routes", routes).finish(),
        }
    }
}

/// Graph configuration errors
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum GraphError {
    #[error("Graph has no entry stage")]
    MissingEntry,

    #[error("Stage '{0}' is referenced but not defined")]
    UndefinedStage(String),

    #[error("Stage '{0}' is defined twice")]
    DuplicateStage(String),

    #[error("Stage '{0}' has no outgoing edge")]
    MissingEdge(String),

    #[error("Stage '{stage}' selected branch '{branch}' which has no edge")]
    UnknownBranch { stage: String, branch: String },
}

/// A validated stage graph
#[derive(Debug, Clone)]
pub struct StageGraph {
    entry: String,
    stages: Vec<String>,
    edges: HashMap<String, Edge>,
    pause_before: Option<String>,
}

impl StageGraph {
    pub fn builder() -> GraphBuilder {
        GraphBuilder::default()
    }

    /// The compliance-audit graph.
    ///
    /// ```text
    /// discovery ─┬─ retry ──► discovery
    ///            └─ continue ► adversarial ► intelligence ► risk ► strategy
    ///              ► codegen ► simulation ► consensus ► forecast
    ///              ► [pause] enforcement ► END
    /// ```
    pub fn compliance() -> Result<Self, GraphError> {
        let routes = HashMap::from([
            (discovery::BRANCH_RETRY.to_string(), NextHop::stage(stages::DISCOVERY)),
            (discovery::BRANCH_CONTINUE.to_string(), NextHop::stage(stages::ADVERSARIAL)),
        ]);

        Self::builder()
            .stage(stages::DISCOVERY)
            .stage(stages::ADVERSARIAL)
            .stage(stages::INTELLIGENCE)
            .stage(stages::RISK)
            .stage(stages::STRATEGY)
            .stage(stages::CODEGEN)
            .stage(stages::SIMULATION)
            .stage(stages::CONSENSUS)
            .stage(stages::FORECAST)
            .stage(stages::ENFORCEMENT)
            .entry(stages::DISCOVERY)
            .branch(
                stages::DISCOVERY,
                Arc::new(|record: &AuditRecord| discovery::route(record).to_string()),
                routes,
            )
            .edge(stages::ADVERSARIAL, NextHop::stage(stages::INTELLIGENCE))
            .edge(stages::INTELLIGENCE, NextHop::stage(stages::RISK))
            .edge(stages::RISK, NextHop::stage(stages::STRATEGY))
            .edge(stages::STRATEGY, NextHop::stage(stages::CODEGEN))
            .edge(stages::CODEGEN, NextHop::stage(stages::SIMULATION))
            .edge(stages::SIMULATION, NextHop::stage(stages::CONSENSUS))
            .edge(stages::CONSENSUS, NextHop::stage(stages::FORECAST))
            .edge(stages::FORECAST, NextHop::stage(stages::ENFORCEMENT))
            .edge(stages::ENFORCEMENT, NextHop::End)
            .pause_before(stages::ENFORCEMENT)
            .build()
    }

    pub fn entry(&self) -> &str {
        &self.entry
    }

    pub fn stages(&self) -> &[String] {
        &self.stages
    }

    pub fn contains(&self, stage: &str) -> bool {
        self.stages.iter().any(|s| s == stage)
    }

    /// Stage the orchestrator pauses in front of
    pub fn pause_before(&self) -> Option<&str> {
        self.pause_before.as_deref()
    }

    /// Resolve the hop after `stage` given the record it just produced
    pub fn next(&self, stage: &str, record: &AuditRecord) -> Result<NextHop, GraphError> {
        let edge = self
            .edges
            .get(stage)
            .ok_or_else(|| GraphError::MissingEdge(stage.to_string()))?;

        match edge {
            Edge::Direct(hop) => Ok(hop.clone()),
            Edge::Branch { selector, routes } => {
                let branch = selector(record);
                routes
                    .get(&branch)
                    .cloned()
                    .ok_or_else(|| GraphError::UnknownBranch {
                        stage: stage.to_string(),
                        branch,
                    })
            }
        }
    }
}

/// Incremental graph construction; `build` validates
#[derive(Default)]
pub struct GraphBuilder {
    entry: Option<String>,
    stages: Vec<String>,
    edges: HashMap<String, Edge>,
    pause_before: Option<String>,
}

impl GraphBuilder {
    pub fn stage(mut self, name: impl Into<String>) -> Self {
        self.stages.push(name.into());
        self
    }

    pub fn entry(mut self, name: impl Into<String>) -> Self {
        self.entry = Some(name.into());
        self
    }

    pub fn edge(mut self, from: impl Into<String>, to: NextHop) -> Self {
        self.edges.insert(from.into(), Edge::Direct(to));
        self
    }

    pub fn branch(
        mut self,
        from: impl Into<String>,
        selector: BranchSelector,
        routes: HashMap<String, NextHop>,
    ) -> Self {
        self.edges
            .insert(from.into(), Edge::Branch { selector, routes });
        self
    }

    pub fn pause_before(mut self, name: impl Into<String>) -> Self {
        self.pause_before = Some(name.into());
        self
    }

    /// Validate references and produce the graph
    pub fn build(self) -> Result<StageGraph, GraphError> {
        let entry = self.entry.ok_or(GraphError::MissingEntry)?;

        for (i, name) in self.stages.iter().enumerate() {
            if self.stages[..i].contains(name) {
                return Err(GraphError::DuplicateStage(name.clone()));
            }
        }

        let known = |name: &str| self.stages.iter().any(|s| s == name);

        if !known(&entry) {
            return Err(GraphError::UndefinedStage(entry));
        }
        if let Some(ref pause) = self.pause_before {
            if !known(pause) {
                return Err(GraphError::UndefinedStage(pause.clone()));
            }
        }

        for stage in &self.stages {
            if !self.edges.contains_key(stage) {
                return Err(GraphError::MissingEdge(stage.clone()));
            }
        }

        for (from, edge) in &self.edges {
            if !known(from) {
                return Err(GraphError::UndefinedStage(from.clone()));
            }
            let targets: Vec<&NextHop> = match edge {
                Edge::Direct(hop) => vec![hop],
                Edge::Branch { routes, .. } => routes.values().collect(),
            };
            for hop in targets {
                if let NextHop::Stage(target) = hop {
                    if !known(target) {
                        return Err(GraphError::UndefinedStage(target.clone()));
                    }
                }
            }
        }

        Ok(StageGraph {
            entry,
            stages: self.stages,
            edges: self.edges,
            pause_before: self.pause_before,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Confidence;

    #[test]
    fn test_compliance_graph_shape() {
        let graph = StageGraph::compliance().unwrap();
        assert_eq!(graph.entry(), stages::DISCOVERY);
        assert_eq!(graph.pause_before(), Some(stages::ENFORCEMENT));
        assert_eq!(graph.stages().len(), 10);
        assert_eq!(
            graph.next(stages::ENFORCEMENT, &AuditRecord::new()).unwrap(),
            NextHop::End
        );
    }

    #[test]
    fn test_discovery_branching() {
        let graph = StageGraph::compliance().unwrap();

        let mut record = AuditRecord::new();
        record.confidence = Confidence::Low;
        record.retry_count = 1;
        assert_eq!(
            graph.next(stages::DISCOVERY, &record).unwrap(),
            NextHop::stage(stages::DISCOVERY)
        );

        record.retry_count = 3;
        assert_eq!(
            graph.next(stages::DISCOVERY, &record).unwrap(),
            NextHop::stage(stages::ADVERSARIAL)
        );
    }

    #[test]
    fn test_undefined_edge_target_rejected() {
        let result = StageGraph::builder()
            .stage("a")
            .entry("a")
            .edge("a", NextHop::stage("ghost"))
            .build();
        assert_eq!(result.unwrap_err(), GraphError::UndefinedStage("ghost".to_string()));
    }

    #[test]
    fn test_missing_edge_rejected() {
        let result = StageGraph::builder()
            .stage("a")
            .stage("b")
            .entry("a")
            .edge("a", NextHop::stage("b"))
            .build();
        assert_eq!(result.unwrap_err(), GraphError::MissingEdge("b".to_string()));
    }

    #[test]
    fn test_unknown_branch_reported() {
        let graph = StageGraph::builder()
            .stage("a")
            .entry("a")
            .branch(
                "a",
                Arc::new(|_: &AuditRecord| "sideways".to_string()),
                HashMap::from([("forward".to_string(), NextHop::End)]),
            )
            .build()
            .unwrap();

        let err = graph.next("a", &AuditRecord::new()).unwrap_err();
        assert_eq!(
            err,
            GraphError::UnknownBranch {
                stage: "a".to_string(),
                branch: "sideways".to_string()
            }
        );
    }
}
