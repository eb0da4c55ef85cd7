//! Capability interfaces for external collaborators.
//!
//! Stages never talk to the network directly. They receive a [`Toolkit`]
//! holding one implementation per capability, so tests can inject
//! deterministic fakes and offline runs can fail fast into fallbacks.

pub mod knowledge;
pub mod offline;
pub mod openai;
pub mod patterns;
pub mod search;

use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use tracing::info;

use crate::config::ResolvedConfig;

pub use knowledge::{PolicyIndex, StaticKnowledgeGraph, DEFAULT_POLICY};
pub use offline::{SimulatedAnomalyScorer, Unavailable};
pub use openai::OpenAiClient;
pub use patterns::{PatternScanner, GDPR_EMAIL, PCI_CARD, SSN_PII};
pub use search::DuckDuckGoSearch;

/// Web search (query → text)
#[async_trait]
pub trait SearchProvider: Send + Sync {
    fn name(&self) -> &str;

    async fn search(&self, query: &str) -> Result<String>;
}

/// Language model (prompt → text)
#[async_trait]
pub trait TextGenerator: Send + Sync {
    fn name(&self) -> &str;

    async fn generate(&self, prompt: &str) -> Result<String>;
}

/// Semantic retrieval over internal policy (query → relevant context)
#[async_trait]
pub trait PolicyRetriever: Send + Sync {
    async fn retrieve(&self, query: &str) -> Result<Option<String>>;

    /// Full policy text, for prompts that need the whole document
    fn full_text(&self) -> &str;
}

/// Regulatory knowledge graph (keyword → insight)
#[async_trait]
pub trait KnowledgeGraph: Send + Sync {
    async fn lookup(&self, keyword: &str) -> Option<String>;
}

/// Detector for regulated data in free text (text → category labels)
pub trait DataScanner: Send + Sync {
    fn scan(&self, text: &str) -> Vec<&'static str>;
}

/// Anomaly model (text → score in 0.0..=1.0)
#[async_trait]
pub trait AnomalyScorer: Send + Sync {
    async fn score(&self, text: &str) -> Result<f64>;
}

/// Verdict on an uploaded image
#[derive(Debug, Clone, PartialEq)]
pub struct EvidenceVerdict {
    /// One-line description of what was found
    pub summary: String,

    /// Whether the evidence shows sensitive data exposure
    pub suspicious: bool,
}

/// Vision and speech analysis of uploaded evidence
#[async_trait]
pub trait EvidenceAnalyzer: Send + Sync {
    async fn analyze_image(&self, bytes: &[u8]) -> Result<EvidenceVerdict>;

    async fn transcribe_audio(&self, bytes: &[u8]) -> Result<String>;
}

/// The set of capabilities handed to every stage
#[derive(Clone)]
pub struct Toolkit {
    pub search: Arc<dyn SearchProvider>,
    pub llm: Arc<dyn TextGenerator>,
    pub policy: Arc<dyn PolicyRetriever>,
    pub knowledge: Arc<dyn KnowledgeGraph>,
    pub scanner: Arc<dyn DataScanner>,
    pub anomaly: Arc<dyn AnomalyScorer>,
    pub evidence: Arc<dyn EvidenceAnalyzer>,
}

impl Toolkit {
    /// No network at all: search, LLM and evidence analysis always fail,
    /// so stages run on their fallbacks.
    pub fn offline() -> Result<Self> {
        let scanner =
            PatternScanner::new().context("Failed to compile regulated-data patterns")?;
        let unavailable = Arc::new(Unavailable);
        Ok(Self {
            search: unavailable.clone(),
            llm: unavailable.clone(),
            policy: Arc::new(PolicyIndex::new(DEFAULT_POLICY)),
            knowledge: Arc::new(StaticKnowledgeGraph::new()),
            scanner: Arc::new(scanner),
            anomaly: Arc::new(SimulatedAnomalyScorer),
            evidence: unavailable,
        })
    }

    /// Build from configuration: real search and LLM when enabled and
    /// credentials exist, offline fallbacks otherwise.
    pub fn from_config(config: &ResolvedConfig) -> Result<Self> {
        let mut toolkit = Self::offline()?;

        let policy_text = match config.policy_file {
            Some(ref path) if path.exists() => std::fs::read_to_string(path).map_err(|e| {
                anyhow::anyhow!("Failed to read policy file {}: {}", path.display(), e)
            })?,
            _ => DEFAULT_POLICY.to_string(),
        };
        toolkit.policy = Arc::new(PolicyIndex::new(&policy_text));

        if config.search.enabled {
            toolkit.search = Arc::new(DuckDuckGoSearch::new(
                config.search.endpoint.clone(),
                config.search.timeout_seconds,
            )?);
        }

        match config.llm.api_key {
            Some(ref api_key) => {
                let client = Arc::new(OpenAiClient::new(
                    api_key.clone(),
                    config.llm.base_url.clone(),
                    config.llm.model.clone(),
                    config.llm.timeout_seconds,
                )?);
                info!(model = %config.llm.model, "Language model configured");
                toolkit.llm = client.clone();
                toolkit.evidence = client;
            }
            None => info!("No API key configured, running in circuit-breaker mode"),
        }

        Ok(toolkit)
    }
}
