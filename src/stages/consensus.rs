//! Consensus review of the generated patch.
//!
//! Two reviewers vote: a static inspection for unsafe constructs and the
//! simulation verdict. Both votes go to the audit trail, followed by an
//! integrity hash over the decision-relevant fields so later tampering with
//! the record is detectable.

use async_trait::async_trait;
use serde_json::json;
use sha2::{Digest, Sha256};
use tracing::info;

use crate::domain::{AuditRecord, RecordUpdate};

use super::{Stage, CONSENSUS};

const UNSAFE_MARKERS: &[&str] = &["eval(", "exec(", "rm -rf", "DROP TABLE", "os.system", "subprocess"];

pub struct ConsensusStage;

/// SHA-256 (hex) over the canonical JSON of the decision subset
pub fn integrity_hash(record: &AuditRecord) -> String {
    let subset = json!({
        "findings": record.findings,
        "generated_code": record.generated_code,
        "policy_gaps": record.policy_gaps,
        "remediation_plan": record.remediation_plan,
        "risk_level": record.risk_level,
    });

    let mut hasher = Sha256::new();
    hasher.update(subset.to_string().as_bytes());
    hex::encode(hasher.finalize())
}

fn unsafe_markers(code: &str) -> Vec<&'static str> {
    UNSAFE_MARKERS
        .iter()
        .copied()
        .filter(|marker| code.contains(marker))
        .collect()
}

#[async_trait]
impl Stage for ConsensusStage {
    fn name(&self) -> &str {
        CONSENSUS
    }

    async fn run(&self, record: &AuditRecord) -> RecordUpdate {
        let markers = unsafe_markers(&record.generated_code);
        let static_vote = if markers.is_empty() {
            "Consensus [static-review]: APPROVED - no unsafe constructs in patch".to_string()
        } else {
            format!(
                "Consensus [static-review]: REJECTED - unsafe constructs: {}",
                markers.join(", ")
            )
        };

        let simulation_vote = match record.simulation_passed {
            Some(true) | None => "Consensus [simulation]: APPROVED - performance within budget",
            Some(false) => "Consensus [simulation]: REJECTED - performance budget exceeded",
        };

        let hash = integrity_hash(record);
        info!(unsafe_markers = markers.len(), hash = %hash, "Consensus reached");

        RecordUpdate {
            integrity_hash: Some(hash),
            ..Default::default()
        }
        .audit(static_vote)
        .audit(simulation_vote)
    }
}
