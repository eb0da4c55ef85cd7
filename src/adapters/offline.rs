//! Offline capability implementations.

use anyhow::Result;
use async_trait::async_trait;
use sha2::{Digest, Sha256};

use super::{AnomalyScorer, EvidenceAnalyzer, EvidenceVerdict, SearchProvider, TextGenerator};

/// Stand-in for any networked capability when none is configured.
/// Every call fails immediately so the calling stage uses its fallback.
#[derive(Debug, Clone, Copy, Default)]
pub struct Unavailable;

#[async_trait]
impl SearchProvider for Unavailable {
    fn name(&self) -> &str {
        "unavailable"
    }

    async fn search(&self, _query: &str) -> Result<String> {
        anyhow::bail!("Search is unavailable in offline mode")
    }
}

#[async_trait]
impl TextGenerator for Unavailable {
    fn name(&self) -> &str {
        "unavailable"
    }

    async fn generate(&self, _prompt: &str) -> Result<String> {
        anyhow::bail!("No language model configured")
    }
}

#[async_trait]
impl EvidenceAnalyzer for Unavailable {
    async fn analyze_image(&self, _bytes: &[u8]) -> Result<EvidenceVerdict> {
        anyhow::bail!("Vision analysis is unavailable in offline mode")
    }

    async fn transcribe_audio(&self, _bytes: &[u8]) -> Result<String> {
        anyhow::bail!("Transcription is unavailable in offline mode")
    }
}

/// Deterministic stand-in for a trained anomaly model.
///
/// The score blends a content hash (so different streams get different
/// baselines) with a bump for each card- or identity-like token.
#[derive(Debug, Clone, Copy, Default)]
pub struct SimulatedAnomalyScorer;

const SUSPICIOUS_TOKENS: &[&str] = &["card", "ssn", "password", "wire", "transfer", "@"];

#[async_trait]
impl AnomalyScorer for SimulatedAnomalyScorer {
    async fn score(&self, text: &str) -> Result<f64> {
        let digest = Sha256::digest(text.as_bytes());
        let baseline = f64::from(digest[0]) / 255.0 * 0.4;

        let lower = text.to_lowercase();
        let hits = SUSPICIOUS_TOKENS
            .iter()
            .filter(|token| lower.contains(*token))
            .count();

        Ok((baseline + hits as f64 * 0.2).min(1.0))
    }
}
