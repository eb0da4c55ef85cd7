//! Synthetic performance simulation of the generated patch.
//!
//! No code is executed. The projected overhead grows with the size of the
//! patch; anything above [`MAX_OVERHEAD_PCT`] fails.

use async_trait::async_trait;
use tracing::info;

use crate::domain::{AuditRecord, RecordUpdate};

use super::{Stage, SIMULATION};

/// Highest acceptable latency overhead, in percent
pub const MAX_OVERHEAD_PCT: f64 = 15.0;

const OVERHEAD_PER_LINE_PCT: f64 = 1.5;

pub struct SimulationStage;

fn projected_overhead(code: &str) -> f64 {
    let lines = code.lines().filter(|l| !l.trim().is_empty()).count();
    lines as f64 * OVERHEAD_PER_LINE_PCT
}

#[async_trait]
impl Stage for SimulationStage {
    fn name(&self) -> &str {
        SIMULATION
    }

    async fn run(&self, record: &AuditRecord) -> RecordUpdate {
        if record.is_no_op_patch() {
            return RecordUpdate {
                simulation_report: Some("No patch to simulate.".to_string()),
                simulation_passed: Some(true),
                ..Default::default()
            };
        }

        let overhead = projected_overhead(&record.generated_code);
        let passed = overhead <= MAX_OVERHEAD_PCT;
        info!(overhead_pct = overhead, passed, "Patch simulated");

        let report = format!(
            "Simulated 10,000 transactions through patched pipeline: +{:.1}% latency overhead ({}).",
            overhead,
            if passed { "within budget" } else { "exceeds budget" }
        );

        RecordUpdate {
            simulation_report: Some(report),
            simulation_passed: Some(passed),
            ..Default::default()
        }
    }
}
