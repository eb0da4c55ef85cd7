//! Gap analysis and remediation strategy.
//!
//! Compares the discovered regulation against internal policy, estimates
//! the financial exposure and drafts the remediation plan. The two language
//! model calls are independent and run concurrently.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, warn};

use crate::adapters::{PolicyRetriever, TextGenerator};
use crate::domain::{AuditRecord, RecordUpdate, RiskLevel};

use super::{Stage, STRATEGY};

const FALLBACK_GAP: &str = "VIOLATION DETECTED: Clause 2 of Internal Policy allows plain-text \
     storage of Credit Card (PAN) data, which explicitly violates PCI-DSS Requirement 3.4 \
     mandating unreadable storage.";

const FALLBACK_PCI_FINE: &str = "$100,000/mo (PCI Monthly Non-Compliance Fee)";
const FALLBACK_GDPR_FINE: &str = "€20 Million (GDPR Tier 1 Max Fine)";

pub struct StrategyStage {
    llm: Arc<dyn TextGenerator>,
    policy: Arc<dyn PolicyRetriever>,
}

impl StrategyStage {
    pub fn new(llm: Arc<dyn TextGenerator>, policy: Arc<dyn PolicyRetriever>) -> Self {
        Self { llm, policy }
    }

    async fn gap_analysis(&self, regulation: &str, clause: Option<&str>) -> String {
        let prompt = format!(
            "You are a Senior Compliance Auditor.\n\
             Compare the following Regulatory Update against our Internal Policy.\n\n\
             [REGULATORY UPDATE]\n{}\n\n\
             [INTERNAL POLICY]\n{}\n\n\
             [MOST RELEVANT CLAUSE]\n{}\n\n\
             TASK: Identify the specific clause in our policy that violates the regulation.\n\
             Return ONLY the violation analysis in one clear sentence.",
            regulation,
            self.policy.full_text(),
            clause.unwrap_or("(none matched)"),
        );

        match self.llm.generate(&prompt).await {
            Ok(text) if !text.trim().is_empty() => text.trim().to_string(),
            Ok(_) => {
                warn!("Empty gap analysis, using fallback");
                FALLBACK_GAP.to_string()
            }
            Err(e) => {
                warn!(provider = self.llm.name(), error = %e, "Gap analysis failed, using fallback");
                FALLBACK_GAP.to_string()
            }
        }
    }

    async fn estimate_fine(&self, violation_type: &str) -> String {
        let prompt = format!(
            "Act as a Chief Risk Officer. Estimate the maximum potential fine for a '{}' \
             violation under GDPR (Tier 1) or PCI-DSS 4.0.\n\
             Return ONLY the dollar/euro amount and a 3-word reason.\n\
             Example: '$20 Million (GDPR Art 83)'",
            violation_type
        );

        match self.llm.generate(&prompt).await {
            Ok(text) if !text.trim().is_empty() => text.trim().to_string(),
            result => {
                if let Err(e) = result {
                    warn!(error = %e, "Fine estimate failed, using fallback");
                }
                fallback_fine(violation_type).to_string()
            }
        }
    }
}

fn fallback_fine(violation_type: &str) -> &'static str {
    if violation_type.contains("PCI") || violation_type.contains("Card") {
        FALLBACK_PCI_FINE
    } else {
        FALLBACK_GDPR_FINE
    }
}

/// Violation category named by the risk stage, defaulting to privacy
fn violation_type(record: &AuditRecord) -> &'static str {
    let card_data = record
        .findings
        .iter()
        .filter(|f| f.starts_with("Sentry Analysis") || f.starts_with("Audio Analysis"))
        .any(|f| f.contains("PCI"));

    if card_data {
        "PCI_CARD"
    } else {
        "GDPR_EMAIL"
    }
}

fn is_violation(gap: &str) -> bool {
    gap.to_lowercase().contains("violat")
}

fn drift_score(risk: RiskLevel, violation: bool) -> f64 {
    match (risk, violation) {
        (RiskLevel::Critical, _) => 0.9,
        (RiskLevel::High, _) => 0.6,
        (_, true) => 0.4,
        _ => 0.1,
    }
}

#[async_trait]
impl Stage for StrategyStage {
    fn name(&self) -> &str {
        STRATEGY
    }

    async fn run(&self, record: &AuditRecord) -> RecordUpdate {
        let regulation = record
            .findings
            .first()
            .map(String::as_str)
            .unwrap_or("No regulations found.");

        let clause = match self.policy.retrieve(regulation).await {
            Ok(clause) => clause,
            Err(e) => {
                warn!(error = %e, "Policy retrieval failed, analysing against full text only");
                None
            }
        };
        debug!(clause = ?clause, "Relevant policy clause");

        let violation_type = violation_type(record);
        let (gap, fine) = tokio::join!(
            self.gap_analysis(regulation, clause.as_deref()),
            self.estimate_fine(violation_type)
        );

        let violation = is_violation(&gap);
        let plan = match record.risk_level {
            RiskLevel::Critical => "URGENT: Initiate 'Kill Switch' for logging pipeline. \
                                    Segregate Data Lakes immediately."
                .to_string(),
            RiskLevel::High => format!("ACTION REQUIRED: {} -> Suggestion: Implement tokenization.", gap),
            _ if violation => format!("ACTION REQUIRED: {} -> Suggestion: Implement tokenization.", gap),
            _ => "System Policy is aligned with current regulations.".to_string(),
        };

        let amendment = match clause {
            Some(ref clause) if violation => format!(
                "Replace \"{}\" with: Card numbers (PAN) and personal identifiers must be \
                 tokenized or masked before they reach any log, backup or analytics store.",
                clause
            ),
            _ if violation => "Add clause: Card numbers (PAN) and personal identifiers must be \
                               tokenized or masked before they reach any log, backup or analytics store."
                .to_string(),
            _ => "No amendment required.".to_string(),
        };

        RecordUpdate {
            remediation_plan: Some(plan),
            evidence_package: Some(format!(
                "Audit Report: {} findings. Analysis: {}",
                record.findings.len(),
                gap
            )),
            policy_gaps: vec![gap],
            drift_score: Some(drift_score(record.risk_level, violation)),
            policy_amendment: Some(amendment),
            financial_impact: Some(fine),
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::{PolicyIndex, Unavailable, DEFAULT_POLICY};
    use anyhow::Result;

    struct Scripted(&'static str);

    #[async_trait]
    impl TextGenerator for Scripted {
        fn name(&self) -> &str {
            "scripted"
        }

        async fn generate(&self, _prompt: &str) -> Result<String> {
            Ok(self.0.to_string())
        }
    }

    fn offline() -> StrategyStage {
        StrategyStage::new(Arc::new(Unavailable), Arc::new(PolicyIndex::new(DEFAULT_POLICY)))
    }

    fn record(risk: RiskLevel, sentry: &str) -> AuditRecord {
        let mut record = AuditRecord::new();
        record.findings = vec![
            "Scout identified regulatory mandate: PCI-DSS 4.0 requires card numbers to be unreadable...".to_string(),
            sentry.to_string(),
        ];
        record.risk_level = risk;
        record
    }

    #[tokio::test]
    async fn test_critical_plan_and_fallbacks() {
        let update = offline()
            .run(&record(RiskLevel::Critical, "Sentry Analysis: SYSTEMIC RISK: PCI-DSS and GDPR"))
            .await;

        assert!(update.remediation_plan.unwrap().starts_with("URGENT"));
        assert_eq!(update.policy_gaps, vec![FALLBACK_GAP.to_string()]);
        assert_eq!(update.financial_impact.as_deref(), Some(FALLBACK_PCI_FINE));
        assert_eq!(update.drift_score, Some(0.9));
        assert!(update.evidence_package.unwrap().starts_with("Audit Report: 2 findings"));
        assert!(update.policy_amendment.unwrap().contains("Logging"));
    }

    #[tokio::test]
    async fn test_high_risk_requires_action() {
        let update = offline()
            .run(&record(RiskLevel::High, "Sentry Analysis: Risk Detected: GDPR_EMAIL found"))
            .await;

        assert!(update.remediation_plan.unwrap().starts_with("ACTION REQUIRED"));
        assert_eq!(update.financial_impact.as_deref(), Some(FALLBACK_GDPR_FINE));
    }

    #[tokio::test]
    async fn test_aligned_when_model_finds_no_gap() {
        let stage = StrategyStage::new(
            Arc::new(Scripted("Internal policy is consistent with the regulation.")),
            Arc::new(PolicyIndex::new(DEFAULT_POLICY)),
        );
        let update = stage
            .run(&record(RiskLevel::Low, "Sentry Analysis: Traffic analysis normal."))
            .await;

        assert_eq!(
            update.remediation_plan.as_deref(),
            Some("System Policy is aligned with current regulations.")
        );
        assert_eq!(update.policy_amendment.as_deref(), Some("No amendment required."));
        assert_eq!(update.drift_score, Some(0.1));
        assert_eq!(update.policy_gaps.len(), 1);
    }

    #[tokio::test]
    async fn test_empty_findings_still_analysed() {
        let update = offline().run(&AuditRecord::new()).await;
        assert_eq!(update.policy_gaps.len(), 1);
        assert!(update.evidence_package.unwrap().starts_with("Audit Report: 0 findings"));
    }
}
