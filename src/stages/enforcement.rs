//! Gateway enforcement. Runs only after approval.
//!
//! Maps the final risk picture to a gateway action, records it, and tunes
//! the anomaly threshold: tighter after a kill switch, slightly looser after
//! a clean authorization. `sentinels run` seeds the next run of the same
//! session with the tuned value.

use async_trait::async_trait;
use tracing::info;

use crate::domain::{AuditRecord, EnforcementAction, RecordUpdate, RiskLevel};

use super::{Stage, ENFORCEMENT};

const MIN_SENSITIVITY: f64 = 0.3;
const MAX_SENSITIVITY: f64 = 0.9;

pub struct EnforcementStage;

pub fn decide(record: &AuditRecord) -> EnforcementAction {
    let adversarial = record.has_adversarial_findings();
    match record.risk_level {
        RiskLevel::Critical => EnforcementAction::KillSwitch,
        RiskLevel::High if adversarial => EnforcementAction::KillSwitch,
        RiskLevel::High => EnforcementAction::ConditionalBlock,
        _ if adversarial => EnforcementAction::ConditionalBlock,
        _ => EnforcementAction::Authorized,
    }
}

fn adapt_sensitivity(current: f64, action: EnforcementAction) -> f64 {
    match action {
        EnforcementAction::KillSwitch => (current - 0.1).max(MIN_SENSITIVITY),
        EnforcementAction::ConditionalBlock => current,
        EnforcementAction::Authorized => (current + 0.05).min(MAX_SENSITIVITY),
    }
}

#[async_trait]
impl Stage for EnforcementStage {
    fn name(&self) -> &str {
        ENFORCEMENT
    }

    async fn run(&self, record: &AuditRecord) -> RecordUpdate {
        let action = decide(record);
        let gateway = match action {
            EnforcementAction::KillSwitch => {
                "VISA GATEWAY: KILL SWITCH ENGAGED. All transactions halted. \
                 (Triggered 'Block-at-Edge' protocol via Visa Direct API.)"
            }
            EnforcementAction::ConditionalBlock => {
                "VISA GATEWAY: TRANSACTION HELD. Routed to manual review. \
                 (Conditional block pending analyst sign-off.)"
            }
            EnforcementAction::Authorized => {
                "VISA GATEWAY: Transaction Authorized. (Compliance checks passed.)"
            }
        };

        let sensitivity = adapt_sensitivity(record.effective_sensitivity(), action);
        info!(action = %action, risk = %record.risk_level, sensitivity, "Enforcement decided");

        RecordUpdate {
            enforcement: Some(action),
            sensitivity: Some(sensitivity),
            ..Default::default()
        }
        .finding(gateway)
        .audit(format!(
            "Enforcement: {} (risk {}, integrity {})",
            action,
            record.risk_level,
            if record.integrity_hash.is_empty() {
                "unsealed"
            } else {
                record.integrity_hash.as_str()
            }
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::RED_TEAM_PREFIX;

    fn record(risk: RiskLevel, adversarial: bool) -> AuditRecord {
        let mut record = AuditRecord::new();
        record.risk_level = risk;
        if adversarial {
            record.findings.push(format!("{} payload", RED_TEAM_PREFIX));
        }
        record
    }

    #[test]
    fn test_decision_table() {
        use EnforcementAction::*;
        let cases = [
            (RiskLevel::Critical, false, KillSwitch),
            (RiskLevel::High, true, KillSwitch),
            (RiskLevel::High, false, ConditionalBlock),
            (RiskLevel::Low, true, ConditionalBlock),
            (RiskLevel::Low, false, Authorized),
            (RiskLevel::Unknown, false, Authorized),
        ];
        for (risk, adversarial, expected) in cases {
            assert_eq!(decide(&record(risk, adversarial)), expected, "{} {}", risk, adversarial);
        }
    }

    #[tokio::test]
    async fn test_kill_switch_tightens_sensitivity() {
        let update = EnforcementStage.run(&record(RiskLevel::Critical, false)).await;
        assert_eq!(update.enforcement, Some(EnforcementAction::KillSwitch));
        assert!((update.sensitivity.unwrap() - 0.6).abs() < 1e-9);
        assert!(update.findings[0].contains("KILL SWITCH"));
        assert_eq!(update.audit_trail.len(), 1);
    }

    #[tokio::test]
    async fn test_non_finite_sensitivity_adapts_from_default() {
        let mut seed = record(RiskLevel::Low, false);
        seed.sensitivity = f64::NAN;
        let update = EnforcementStage.run(&seed).await;
        assert!((update.sensitivity.unwrap() - 0.75).abs() < 1e-9);
    }

    #[test]
    fn test_sensitivity_bounds() {
        assert_eq!(adapt_sensitivity(0.35, EnforcementAction::KillSwitch), MIN_SENSITIVITY);
        assert_eq!(adapt_sensitivity(0.88, EnforcementAction::Authorized), MAX_SENSITIVITY);
        assert_eq!(adapt_sensitivity(0.7, EnforcementAction::ConditionalBlock), 0.7);
    }
}
