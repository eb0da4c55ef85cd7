//! Pipeline stages.
//!
//! A stage reads the current record and returns a [`RecordUpdate`]; the
//! orchestrator merges it. Stages are total: every capability failure is
//! absorbed with a fallback value so `run` always yields an update.

pub mod adversarial;
pub mod codegen;
pub mod consensus;
pub mod discovery;
pub mod enforcement;
pub mod forecast;
pub mod intelligence;
pub mod risk;
pub mod simulation;
pub mod strategy;

use std::sync::Arc;

use async_trait::async_trait;

use crate::adapters::Toolkit;
use crate::domain::{AuditRecord, RecordUpdate};

pub use adversarial::AdversarialStage;
pub use codegen::CodegenStage;
pub use consensus::ConsensusStage;
pub use discovery::DiscoveryStage;
pub use enforcement::EnforcementStage;
pub use forecast::ForecastStage;
pub use intelligence::IntelligenceStage;
pub use risk::RiskStage;
pub use simulation::SimulationStage;
pub use strategy::StrategyStage;

pub const DISCOVERY: &str = "discovery";
pub const ADVERSARIAL: &str = "adversarial";
pub const INTELLIGENCE: &str = "intelligence";
pub const RISK: &str = "risk";
pub const STRATEGY: &str = "strategy";
pub const CODEGEN: &str = "codegen";
pub const SIMULATION: &str = "simulation";
pub const CONSENSUS: &str = "consensus";
pub const FORECAST: &str = "forecast";
pub const ENFORCEMENT: &str = "enforcement";

/// One named processing step
#[async_trait]
pub trait Stage: Send + Sync {
    /// Node name in the stage graph
    fn name(&self) -> &str;

    /// Produce a partial update from the current record
    async fn run(&self, record: &AuditRecord) -> RecordUpdate;
}

/// The full compliance catalog wired to `toolkit`
pub fn compliance_stages(toolkit: &Toolkit) -> Vec<Arc<dyn Stage>> {
    vec![
        Arc::new(DiscoveryStage::new(toolkit.search.clone())),
        Arc::new(AdversarialStage),
        Arc::new(IntelligenceStage::new(toolkit.knowledge.clone())),
        Arc::new(RiskStage::new(
            toolkit.scanner.clone(),
            toolkit.anomaly.clone(),
            toolkit.evidence.clone(),
        )),
        Arc::new(StrategyStage::new(toolkit.llm.clone(), toolkit.policy.clone())),
        Arc::new(CodegenStage::new(toolkit.llm.clone())),
        Arc::new(SimulationStage),
        Arc::new(ConsensusStage),
        Arc::new(ForecastStage),
        Arc::new(EnforcementStage),
    ]
}

/// Truncate to at most `max` characters without splitting a code point
pub(crate) fn truncate(text: &str, max: usize) -> &str {
    match text.char_indices().nth(max) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_catalog_names_match_graph() {
        let graph = crate::core::StageGraph::compliance().unwrap();
        let stages = compliance_stages(&Toolkit::offline().unwrap());

        assert_eq!(stages.len(), graph.stages().len());
        for stage in &stages {
            assert!(graph.contains(stage.name()), "{} not in graph", stage.name());
        }
    }

    #[test]
    fn test_truncate_respects_char_boundaries() {
        assert_eq!(truncate("héllo", 2), "hé");
        assert_eq!(truncate("short", 10), "short");
    }
}
