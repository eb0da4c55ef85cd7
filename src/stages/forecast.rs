//! 30-day risk projection.
//!
//! Unremediated elevated risk compounds day over day; otherwise the series
//! stays near zero. Jitter comes from a digest of the record, so the same
//! record always yields the same forecast.

use async_trait::async_trait;
use sha2::{Digest, Sha256};

use crate::domain::{AuditRecord, RecordUpdate, FORECAST_LEN};

use super::{Stage, FORECAST};

const DAILY_GROWTH: f64 = 3.0;
const MAX_JITTER: f64 = 5.0;
const BASELINE_CEILING: f64 = 5.0;

pub struct ForecastStage;

/// One byte of jitter source per point
fn jitter_source(record: &AuditRecord) -> Vec<u8> {
    let mut hasher = Sha256::new();
    hasher.update(record.log_sample.as_bytes());
    hasher.update(record.risk_level.to_string().as_bytes());
    for finding in &record.findings {
        hasher.update(finding.as_bytes());
    }
    hasher.finalize().to_vec()
}

pub fn project(record: &AuditRecord) -> Vec<f64> {
    let source = jitter_source(record);
    let elevated = record.risk_level.is_elevated();

    (0..FORECAST_LEN)
        .map(|day| {
            let unit = f64::from(source[day % source.len()]) / 255.0;
            if elevated {
                let jitter = unit * 2.0 * MAX_JITTER - MAX_JITTER;
                ((day + 1) as f64 * DAILY_GROWTH + jitter).clamp(0.0, 100.0)
            } else {
                unit * BASELINE_CEILING
            }
        })
        .collect()
}

#[async_trait]
impl Stage for ForecastStage {
    fn name(&self) -> &str {
        FORECAST
    }

    async fn run(&self, record: &AuditRecord) -> RecordUpdate {
        RecordUpdate {
            forecast: Some(project(record)),
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::RiskLevel;

    #[test]
    fn test_elevated_risk_trends_upward() {
        let mut record = AuditRecord::new();
        record.risk_level = RiskLevel::Critical;
        let series = project(&record);

        assert_eq!(series.len(), FORECAST_LEN);
        assert!(series.iter().all(|v| (0.0..=100.0).contains(v)));
        assert!(series[FORECAST_LEN - 1] > series[0] + 50.0);
    }

    #[test]
    fn test_low_risk_stays_flat() {
        let mut record = AuditRecord::new();
        record.risk_level = RiskLevel::Low;
        assert!(project(&record).iter().all(|v| (0.0..=BASELINE_CEILING).contains(v)));
    }

    #[test]
    fn test_deterministic_per_record() {
        let mut record = AuditRecord::new();
        record.risk_level = RiskLevel::High;
        assert_eq!(project(&record), project(&record.clone()));

        let other = record.clone().with_log_sample("Refund issued to user@example.org");
        assert_ne!(project(&record), project(&other));
    }
}
