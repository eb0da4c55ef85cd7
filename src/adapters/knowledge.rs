//! Local lookup structures: the internal policy index and the regulatory
//! knowledge graph. Both are built once and read-only afterwards.

use std::collections::{HashMap, HashSet};

use anyhow::Result;
use async_trait::async_trait;

use super::{KnowledgeGraph, PolicyRetriever};

/// Internal policy used when no policy file is configured
pub const DEFAULT_POLICY: &str = "\
1. Access Control: Production databases are reachable only from the corporate VPN.
2. Logging: Application logs may record full transaction payloads, including card numbers (PAN), in plain text to simplify debugging.
3. Retention: Transaction logs are kept for seven years in the shared data lake.
4. Customer Data: Customer email addresses may be shared with analytics partners without additional consent.
5. Incident Response: Security incidents are reported to the compliance team within 30 days.";

/// Keyword index over policy clauses.
///
/// Clauses are the non-empty lines of the policy text. Retrieval ranks
/// clauses by the number of query words they share.
pub struct PolicyIndex {
    text: String,
    clauses: Vec<(String, HashSet<String>)>,
}

impl PolicyIndex {
    pub fn new(policy: &str) -> Self {
        let clauses = policy
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(|line| (line.to_string(), tokenize(line)))
            .collect();

        Self {
            text: policy.to_string(),
            clauses,
        }
    }

    pub fn len(&self) -> usize {
        self.clauses.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clauses.is_empty()
    }

    /// Best-matching clause, if any clause shares a word with the query
    pub fn best_match(&self, query: &str) -> Option<&str> {
        let terms = tokenize(query);
        self.clauses
            .iter()
            .map(|(clause, words)| (clause, words.intersection(&terms).count()))
            .filter(|(_, overlap)| *overlap > 0)
            // Ties go to the earliest clause
            .min_by_key(|(_, overlap)| std::cmp::Reverse(*overlap))
            .map(|(clause, _)| clause.as_str())
    }
}

#[async_trait]
impl PolicyRetriever for PolicyIndex {
    async fn retrieve(&self, query: &str) -> Result<Option<String>> {
        Ok(self.best_match(query).map(String::from))
    }

    fn full_text(&self) -> &str {
        &self.text
    }
}

const STOPWORDS: &[&str] = &[
    "the", "and", "for", "are", "with", "may", "from", "that", "this", "into", "any", "all",
];

fn tokenize(text: &str) -> HashSet<String> {
    text.split(|c: char| !c.is_ascii_alphanumeric())
        .map(|w| w.to_ascii_lowercase())
        .filter(|w| w.len() > 2 && !STOPWORDS.contains(&w.as_str()))
        .collect()
}

/// Fixed regulatory knowledge graph
pub struct StaticKnowledgeGraph {
    insights: HashMap<&'static str, &'static str>,
}

impl Default for StaticKnowledgeGraph {
    fn default() -> Self {
        Self::new()
    }
}

impl StaticKnowledgeGraph {
    pub fn new() -> Self {
        let insights = HashMap::from([
            (
                "pci",
                "PCI-DSS 4.0 Req 3.4 -> renders PAN unreadable -> linked to tokenization vendors and HSM key custody",
            ),
            (
                "gdpr",
                "GDPR Art 32 -> security of processing -> linked to Art 83 fines up to 4% of global turnover",
            ),
            (
                "aml",
                "AML structuring pattern -> repeated sub-threshold transfers -> linked to FinCEN SAR filing",
            ),
            (
                "vendor",
                "Third-party processor breach -> shared card vault exposure -> linked to PCI-DSS Req 12.8",
            ),
            (
                "sdk",
                "Compromised payments SDK -> supply-chain injection of skimming code -> linked to PCI-DSS Req 6.4.3",
            ),
        ]);

        Self { insights }
    }
}

#[async_trait]
impl KnowledgeGraph for StaticKnowledgeGraph {
    async fn lookup(&self, keyword: &str) -> Option<String> {
        self.insights
            .get(keyword.to_ascii_lowercase().as_str())
            .map(|s| s.to_string())
    }
}
