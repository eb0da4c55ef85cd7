//! Risk analysis.
//!
//! Classifies the transaction stream from two signals: a pattern scan for
//! regulated data and an anomaly score compared against the record's
//! sensitivity. Card data and email together are a systemic (CRITICAL)
//! failure. Uploaded image or audio evidence can escalate the result further.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{info, warn};

use crate::adapters::{
    AnomalyScorer, DataScanner, EvidenceAnalyzer, EvidenceVerdict, GDPR_EMAIL, PCI_CARD,
};
use crate::domain::{AuditRecord, RecordUpdate, RiskLevel};

use super::{truncate, Stage, RISK};

pub struct RiskStage {
    scanner: Arc<dyn DataScanner>,
    anomaly: Arc<dyn AnomalyScorer>,
    evidence: Arc<dyn EvidenceAnalyzer>,
}

impl RiskStage {
    pub fn new(
        scanner: Arc<dyn DataScanner>,
        anomaly: Arc<dyn AnomalyScorer>,
        evidence: Arc<dyn EvidenceAnalyzer>,
    ) -> Self {
        Self {
            scanner,
            anomaly,
            evidence,
        }
    }

    async fn image_verdict(&self, bytes: &[u8]) -> EvidenceVerdict {
        match self.evidence.analyze_image(bytes).await {
            Ok(verdict) => verdict,
            Err(e) => {
                warn!(error = %e, "Image analysis failed, treating evidence as unverified");
                EvidenceVerdict {
                    summary: "Image could not be analyzed; held as unverified evidence of exposure."
                        .to_string(),
                    suspicious: true,
                }
            }
        }
    }

    async fn audio_verdict(&self, bytes: &[u8]) -> EvidenceVerdict {
        match self.evidence.transcribe_audio(bytes).await {
            Ok(transcript) => {
                let hits = self.scanner.scan(&transcript);
                EvidenceVerdict {
                    summary: format!("Transcript: \"{}\"", truncate(transcript.trim(), 160)),
                    suspicious: !hits.is_empty(),
                }
            }
            Err(e) => {
                warn!(error = %e, "Transcription failed, treating recording as unverified");
                EvidenceVerdict {
                    summary: "Recording could not be transcribed; held as unverified evidence of exposure."
                        .to_string(),
                    suspicious: true,
                }
            }
        }
    }
}

#[async_trait]
impl Stage for RiskStage {
    fn name(&self) -> &str {
        RISK
    }

    async fn run(&self, record: &AuditRecord) -> RecordUpdate {
        let violations = self.scanner.scan(&record.log_sample);

        let score = match self.anomaly.score(&record.log_sample).await {
            Ok(score) => score,
            Err(e) => {
                warn!(error = %e, "Anomaly scorer failed, assuming baseline");
                0.0
            }
        };
        let sensitivity = record.effective_sensitivity();
        let anomalous = score >= sensitivity;

        let mut update = RecordUpdate::empty();

        let mut level = if violations.contains(&PCI_CARD) && violations.contains(&GDPR_EMAIL) {
            update = update.finding(
                "Sentry Analysis: SYSTEMIC RISK DETECTED: Simultaneous violation of PCI-DSS \
                 (Security) and GDPR (Privacy) in a single log stream. Indicates total failure \
                 of Data Segregation protocols.",
            );
            RiskLevel::Critical
        } else if !violations.is_empty() {
            update = update.finding(format!(
                "Sentry Analysis: Risk Detected: {} found in live stream.",
                violations.join(", ")
            ));
            RiskLevel::High
        } else if anomalous {
            update = update.finding(format!(
                "Sentry Analysis: ML anomaly score {:.2} exceeds sensitivity {:.2}.",
                score, sensitivity
            ));
            RiskLevel::High
        } else {
            update = update.finding("Sentry Analysis: Traffic analysis normal. Zero-Trust indicators verified.");
            RiskLevel::Low
        };

        if let Some(ref image) = record.image {
            let verdict = self.image_verdict(image).await;
            update = update.finding(format!("Vision Analysis: {}", verdict.summary));
            if verdict.suspicious {
                level = level.escalate();
            }
        }

        if let Some(ref audio) = record.audio {
            let verdict = self.audio_verdict(audio).await;
            update = update.finding(format!("Audio Analysis: {}", verdict.summary));
            if verdict.suspicious {
                level = level.escalate();
            }
        }

        info!(risk = %level, anomaly_score = score, violations = ?violations, "Risk classified");
        update.risk_level = Some(level);
        update
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::{PatternScanner, SimulatedAnomalyScorer, Unavailable};
    use anyhow::Result;

    /// Reports the same labels for any text
    struct FixedScan(Vec<&'static str>);

    impl DataScanner for FixedScan {
        fn scan(&self, _text: &str) -> Vec<&'static str> {
            self.0.clone()
        }
    }

    fn patterns() -> Arc<dyn DataScanner> {
        Arc::new(PatternScanner::new().unwrap())
    }

    struct FixedScore(f64);

    #[async_trait]
    impl AnomalyScorer for FixedScore {
        async fn score(&self, _text: &str) -> Result<f64> {
            Ok(self.0)
        }
    }

    struct CleanEvidence;

    #[async_trait]
    impl EvidenceAnalyzer for CleanEvidence {
        async fn analyze_image(&self, _bytes: &[u8]) -> Result<EvidenceVerdict> {
            Ok(EvidenceVerdict {
                summary: "CLEAR".to_string(),
                suspicious: false,
            })
        }

        async fn transcribe_audio(&self, _bytes: &[u8]) -> Result<String> {
            Ok("My card is 4111 1111 1111 1111".to_string())
        }
    }

    fn stage(score: f64) -> RiskStage {
        RiskStage::new(patterns(), Arc::new(FixedScore(score)), Arc::new(Unavailable))
    }

    #[tokio::test]
    async fn test_card_and_email_is_critical() {
        let update = stage(0.0).run(&AuditRecord::new()).await;
        assert_eq!(update.risk_level, Some(RiskLevel::Critical));
        assert!(update.findings[0].contains("SYSTEMIC"));
    }

    #[tokio::test]
    async fn test_single_category_is_high() {
        let record = AuditRecord::new().with_log_sample("Refund issued to user@example.org");
        let update = stage(0.0).run(&record).await;
        assert_eq!(update.risk_level, Some(RiskLevel::High));
    }

    #[tokio::test]
    async fn test_anomaly_alone_is_high() {
        let record = AuditRecord::new().with_log_sample("Nightly batch reconciled 42 invoices");
        assert_eq!(stage(0.95).run(&record).await.risk_level, Some(RiskLevel::High));
        assert_eq!(stage(0.10).run(&record).await.risk_level, Some(RiskLevel::Low));
    }

    #[tokio::test]
    async fn test_unanalyzable_image_escalates() {
        let record = AuditRecord::new()
            .with_log_sample("Refund issued to user@example.org")
            .with_image(vec![0x89, 0x50, 0x4e, 0x47]);
        let update = stage(0.0).run(&record).await;

        assert_eq!(update.risk_level, Some(RiskLevel::Critical));
        assert!(update.findings.iter().any(|f| f.starts_with("Vision Analysis")));
    }

    #[tokio::test]
    async fn test_clean_image_and_card_audio() {
        let stage = RiskStage::new(
            patterns(),
            Arc::new(SimulatedAnomalyScorer),
            Arc::new(CleanEvidence),
        );
        let record = AuditRecord::new()
            .with_log_sample("Nightly batch reconciled 42 invoices")
            .with_image(vec![1])
            .with_audio(vec![2]);
        let update = stage.run(&record).await;

        // Image is clean, transcript reveals a card number: one escalation
        assert_eq!(update.risk_level, Some(RiskLevel::High));
        assert_eq!(update.findings.len(), 3);
    }

    #[tokio::test]
    async fn test_injected_scanner_drives_classification() {
        let record = AuditRecord::new().with_log_sample("opaque payload");

        let stage = RiskStage::new(
            Arc::new(FixedScan(vec![PCI_CARD, GDPR_EMAIL])),
            Arc::new(FixedScore(0.0)),
            Arc::new(Unavailable),
        );
        assert_eq!(stage.run(&record).await.risk_level, Some(RiskLevel::Critical));

        let stage = RiskStage::new(
            Arc::new(FixedScan(Vec::new())),
            Arc::new(FixedScore(0.0)),
            Arc::new(Unavailable),
        );
        assert_eq!(stage.run(&AuditRecord::new()).await.risk_level, Some(RiskLevel::Low));
    }

    #[tokio::test]
    async fn test_non_finite_sensitivity_uses_default() {
        let mut record = AuditRecord::new().with_log_sample("Nightly batch reconciled 42 invoices");
        record.sensitivity = f64::NAN;

        assert_eq!(stage(0.95).run(&record).await.risk_level, Some(RiskLevel::High));
        assert_eq!(stage(0.10).run(&record).await.risk_level, Some(RiskLevel::Low));
    }
}
