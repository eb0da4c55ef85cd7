//! Federated threat-intelligence sharing.
//!
//! When federated mode is on, queries the knowledge graph for each partner
//! signal concurrently and records what comes back. Otherwise a no-op.

use std::sync::Arc;

use async_trait::async_trait;
use futures::future::join_all;

use crate::adapters::KnowledgeGraph;
use crate::domain::{AuditRecord, RecordUpdate};

use super::{Stage, INTELLIGENCE};

/// Signals reported by partner institutions: (keyword, is supply-chain)
const PARTNER_SIGNALS: &[(&str, bool)] = &[
    ("pci", false),
    ("aml", false),
    ("vendor", true),
    ("sdk", true),
];

pub struct IntelligenceStage {
    knowledge: Arc<dyn KnowledgeGraph>,
}

impl IntelligenceStage {
    pub fn new(knowledge: Arc<dyn KnowledgeGraph>) -> Self {
        Self { knowledge }
    }
}

#[async_trait]
impl Stage for IntelligenceStage {
    fn name(&self) -> &str {
        INTELLIGENCE
    }

    async fn run(&self, record: &AuditRecord) -> RecordUpdate {
        if !record.federated_mode {
            return RecordUpdate::empty();
        }

        let lookups = PARTNER_SIGNALS.iter().map(|&(keyword, supply_chain)| async move {
            (keyword, supply_chain, self.knowledge.lookup(keyword).await)
        });

        let mut update = RecordUpdate::empty();
        for (keyword, supply_chain, insight) in join_all(lookups).await {
            let insight = insight
                .unwrap_or_else(|| format!("No graph entry for '{}'; flagged for analyst review", keyword));
            if supply_chain {
                update.supply_chain_risks.push(insight);
            } else {
                update
                    .findings
                    .push(format!("Federated Intel ({}): {}", keyword.to_uppercase(), insight));
            }
        }

        update
    }
}
