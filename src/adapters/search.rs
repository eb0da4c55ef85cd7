//! DuckDuckGo instant-answer search adapter.

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Deserialize;

use super::SearchProvider;

/// Default instant-answer endpoint
pub const DEFAULT_ENDPOINT: &str = "https://api.duckduckgo.com/";

/// Search client for the DuckDuckGo instant-answer API
pub struct DuckDuckGoSearch {
    endpoint: String,
    client: reqwest::Client,
}

/// Subset of the instant-answer response we read
#[derive(Debug, Deserialize)]
struct InstantAnswer {
    #[serde(rename = "AbstractText", default)]
    abstract_text: String,
    #[serde(rename = "RelatedTopics", default)]
    related_topics: Vec<RelatedTopic>,
}

#[derive(Debug, Deserialize)]
struct RelatedTopic {
    #[serde(rename = "Text", default)]
    text: Option<String>,
}

impl DuckDuckGoSearch {
    pub fn new(endpoint: String, timeout_seconds: u64) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_seconds))
            .build()
            .context("Failed to build search HTTP client")?;

        Ok(Self { endpoint, client })
    }
}

#[async_trait]
impl SearchProvider for DuckDuckGoSearch {
    fn name(&self) -> &str {
        "duckduckgo"
    }

    async fn search(&self, query: &str) -> Result<String> {
        let response = self
            .client
            .get(&self.endpoint)
            .query(&[("q", query), ("format", "json"), ("no_html", "1")])
            .send()
            .await
            .context("Search request failed")?
            .error_for_status()
            .context("Search endpoint returned an error")?;

        let answer: InstantAnswer = response
            .json()
            .await
            .context("Failed to parse search response")?;

        extract_text(answer).context("Search returned no usable text")
    }
}

fn extract_text(answer: InstantAnswer) -> Option<String> {
    if !answer.abstract_text.trim().is_empty() {
        return Some(answer.abstract_text);
    }

    let joined = answer
        .related_topics
        .into_iter()
        .filter_map(|t| t.text)
        .take(3)
        .collect::<Vec<_>>()
        .join(" ");

    (!joined.trim().is_empty()).then_some(joined)
}
