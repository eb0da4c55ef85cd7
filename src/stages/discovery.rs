//! Regulatory discovery with a bounded retry loop.
//!
//! Each attempt searches for the governing mandate, appends a finding and
//! bumps the retry counter. Low confidence routes back into this stage until
//! [`MAX_DISCOVERY_RETRIES`] attempts have been made; after that the
//! pipeline moves on regardless.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, warn};

use crate::adapters::SearchProvider;
use crate::domain::{AuditRecord, Confidence, RecordUpdate};

use super::{truncate, Stage, DISCOVERY};

/// Hard ceiling on discovery attempts
pub const MAX_DISCOVERY_RETRIES: u32 = 3;

/// Branch label: run discovery again
pub const BRANCH_RETRY: &str = "retry";

/// Branch label: move on to the next stage
pub const BRANCH_CONTINUE: &str = "continue";

pub const DISCOVERY_QUERY: &str =
    "PCI-DSS 4.0 requirements for storing credit card numbers in logs";

const FALLBACK_MANDATE: &str =
    "PCI-DSS 4.0 requires primary account numbers to be unreadable anywhere they are stored.";

/// Answers shorter than this are too thin to trust
const MIN_CONFIDENT_CHARS: usize = 80;

/// Branch selector for the discovery node
pub fn route(record: &AuditRecord) -> &'static str {
    if record.confidence == Confidence::Low && record.retry_count < MAX_DISCOVERY_RETRIES {
        BRANCH_RETRY
    } else {
        BRANCH_CONTINUE
    }
}

pub struct DiscoveryStage {
    search: Arc<dyn SearchProvider>,
}

impl DiscoveryStage {
    pub fn new(search: Arc<dyn SearchProvider>) -> Self {
        Self { search }
    }
}

#[async_trait]
impl Stage for DiscoveryStage {
    fn name(&self) -> &str {
        DISCOVERY
    }

    async fn run(&self, record: &AuditRecord) -> RecordUpdate {
        let attempt = record.retry_count.saturating_add(1);

        let (mandate, confidence) = match self.search.search(DISCOVERY_QUERY).await {
            Ok(text) if text.trim().chars().count() >= MIN_CONFIDENT_CHARS => {
                (text, Confidence::High)
            }
            Ok(text) => {
                debug!(attempt, "Search answer too short to trust");
                (text, Confidence::Low)
            }
            Err(e) => {
                warn!(attempt, provider = self.search.name(), error = %e, "Search failed, using fallback mandate");
                (FALLBACK_MANDATE.to_string(), Confidence::Low)
            }
        };

        RecordUpdate {
            retry_count: Some(attempt),
            confidence: Some(confidence),
            ..Default::default()
        }
        .finding(format!(
            "Scout identified regulatory mandate: {}...",
            truncate(mandate.trim(), 300)
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::Unavailable;
    use anyhow::Result;

    struct FixedSearch(&'static str);

    #[async_trait]
    impl SearchProvider for FixedSearch {
        fn name(&self) -> &str {
            "fixed"
        }

        async fn search(&self, _query: &str) -> Result<String> {
            Ok(self.0.to_string())
        }
    }

    #[tokio::test]
    async fn test_fallback_sets_low_confidence() {
        let stage = DiscoveryStage::new(Arc::new(Unavailable));
        let update = stage.run(&AuditRecord::new()).await;

        assert_eq!(update.confidence, Some(Confidence::Low));
        assert_eq!(update.retry_count, Some(1));
        assert_eq!(update.findings.len(), 1);
        assert!(update.findings[0].contains("unreadable"));
    }

    #[tokio::test]
    async fn test_substantive_answer_is_confident() {
        let answer = "PCI DSS Requirement 3.4 states that the PAN must be rendered unreadable \
                      anywhere it is stored, including logs, backups and removable media.";
        let stage = DiscoveryStage::new(Arc::new(FixedSearch(answer)));

        let mut record = AuditRecord::new();
        record.retry_count = 1;
        let update = stage.run(&record).await;

        assert_eq!(update.confidence, Some(Confidence::High));
        assert_eq!(update.retry_count, Some(2));
    }

    #[tokio::test]
    async fn test_short_answer_is_not_confident() {
        let stage = DiscoveryStage::new(Arc::new(FixedSearch("PCI")));
        let update = stage.run(&AuditRecord::new()).await;
        assert_eq!(update.confidence, Some(Confidence::Low));
    }

    #[tokio::test]
    async fn test_retry_count_saturates() {
        let stage = DiscoveryStage::new(Arc::new(Unavailable));
        let mut record = AuditRecord::new();
        record.retry_count = u32::MAX;

        let update = stage.run(&record).await;
        assert_eq!(update.retry_count, Some(u32::MAX));
        assert_eq!(route(&record), BRANCH_CONTINUE);
    }

    #[test]
    fn test_route_ceiling_is_hard() {
        let mut record = AuditRecord::new();
        record.confidence = Confidence::Low;

        for count in 0..MAX_DISCOVERY_RETRIES {
            record.retry_count = count;
            assert_eq!(route(&record), BRANCH_RETRY);
        }
        record.retry_count = MAX_DISCOVERY_RETRIES;
        assert_eq!(route(&record), BRANCH_CONTINUE);

        record.retry_count = 0;
        record.confidence = Confidence::High;
        assert_eq!(route(&record), BRANCH_CONTINUE);
    }
}
