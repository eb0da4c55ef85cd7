//! The audit record shared by every stage.
//!
//! A record is created once per audit run, enriched by each stage through a
//! [`RecordUpdate`], and read by the report renderer once the run finishes.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Payload the code-generation stage emits when there is nothing to patch
pub const NO_ACTION_REQUIRED: &str = "NO_ACTION_REQUIRED";

/// Number of points in the risk forecast series
pub const FORECAST_LEN: usize = 30;

/// Default anomaly threshold (scores at or above it are flagged)
pub const DEFAULT_SENSITIVITY: f64 = 0.7;

/// Prefix carried by every finding the adversarial stage injects
pub const RED_TEAM_PREFIX: &str = "RED TEAM:";

/// Transaction stream scanned when the caller does not supply one
pub const DEMO_LOG_SAMPLE: &str =
    "Payment processed for user@email.com using card 4111-2222-3333-4444";

/// The single unit of state flowing through the pipeline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AuditRecord {
    /// Ordered log of textual findings (append-only)
    pub findings: Vec<String>,

    /// Current risk classification
    pub risk_level: RiskLevel,

    /// Remediation plan drafted by the strategy stage
    pub remediation_plan: String,

    /// Evidence summary for the report
    pub evidence_package: String,

    /// Gaps between regulation and internal policy (append-only)
    pub policy_gaps: Vec<String>,

    /// Number of discovery attempts so far
    pub retry_count: u32,

    /// Confidence of the latest discovery attempt
    pub confidence: Confidence,

    /// Generated patch, or [`NO_ACTION_REQUIRED`]
    pub generated_code: String,

    /// Projected risk values, [`FORECAST_LEN`] points once forecast has run
    #[serde(deserialize_with = "wire::lenient_floats")]
    pub forecast: Vec<f64>,

    /// Uploaded screenshot or scan
    #[serde(with = "wire::base64_bytes")]
    pub image: Option<Vec<u8>>,

    /// Uploaded call recording
    #[serde(with = "wire::base64_bytes")]
    pub audio: Option<Vec<u8>>,

    /// Simulate an adversarial injection
    pub red_team_mode: bool,

    /// Simulate federated threat-intelligence sharing
    pub federated_mode: bool,

    /// Decision log (append-only)
    pub audit_trail: Vec<String>,

    /// How far current policy has drifted from regulation, 0.0..=1.0
    #[serde(deserialize_with = "wire::lenient_float")]
    pub drift_score: f64,

    /// Third-party risks reported by partners (append-only)
    pub supply_chain_risks: Vec<String>,

    /// Proposed amendment to internal policy
    pub policy_amendment: String,

    /// SHA-256 over the decision-relevant fields
    pub integrity_hash: String,

    /// Anomaly threshold used by risk analysis. Read through
    /// [`AuditRecord::effective_sensitivity`].
    #[serde(deserialize_with = "wire::lenient_float")]
    pub sensitivity: f64,

    /// Transaction log excerpt scanned for violations
    pub log_sample: String,

    /// Estimated regulatory fine
    pub financial_impact: String,

    /// Synthetic performance impact of the generated patch
    pub simulation_report: String,

    /// Whether the patch passed simulation
    pub simulation_passed: Option<bool>,

    /// Gateway decision taken by enforcement
    pub enforcement: Option<EnforcementAction>,
}

impl Default for AuditRecord {
    fn default() -> Self {
        Self {
            findings: Vec::new(),
            risk_level: RiskLevel::Unknown,
            remediation_plan: String::new(),
            evidence_package: String::new(),
            policy_gaps: Vec::new(),
            retry_count: 0,
            confidence: Confidence::Unknown,
            generated_code: String::new(),
            forecast: Vec::new(),
            image: None,
            audio: None,
            red_team_mode: false,
            federated_mode: false,
            audit_trail: Vec::new(),
            drift_score: 0.0,
            supply_chain_risks: Vec::new(),
            policy_amendment: String::new(),
            integrity_hash: String::new(),
            sensitivity: DEFAULT_SENSITIVITY,
            log_sample: DEMO_LOG_SAMPLE.to_string(),
            financial_impact: String::new(),
            simulation_report: String::new(),
            simulation_passed: None,
            enforcement: None,
        }
    }
}

impl AuditRecord {
    /// Fresh seed record for a new audit run
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_red_team(mut self, enabled: bool) -> Self {
        self.red_team_mode = enabled;
        self
    }

    pub fn with_federated(mut self, enabled: bool) -> Self {
        self.federated_mode = enabled;
        self
    }

    pub fn with_log_sample(mut self, sample: impl Into<String>) -> Self {
        self.log_sample = sample.into();
        self
    }

    pub fn with_image(mut self, bytes: Vec<u8>) -> Self {
        self.image = Some(bytes);
        self
    }

    pub fn with_audio(mut self, bytes: Vec<u8>) -> Self {
        self.audio = Some(bytes);
        self
    }

    /// Sensitivity clamped to 0.0..=1.0; non-finite values fall back to
    /// [`DEFAULT_SENSITIVITY`]
    pub fn effective_sensitivity(&self) -> f64 {
        if self.sensitivity.is_finite() {
            self.sensitivity.clamp(0.0, 1.0)
        } else {
            DEFAULT_SENSITIVITY
        }
    }

    /// True once the adversarial stage has injected anything
    pub fn has_adversarial_findings(&self) -> bool {
        self.findings.iter().any(|f| f.starts_with(RED_TEAM_PREFIX))
    }

    /// True when the code-generation stage decided there is nothing to patch
    pub fn is_no_op_patch(&self) -> bool {
        self.generated_code.is_empty() || self.generated_code == NO_ACTION_REQUIRED
    }
}

/// Risk classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RiskLevel {
    Unknown,
    Low,
    High,
    Critical,
}

impl Default for RiskLevel {
    fn default() -> Self {
        Self::Unknown
    }
}

impl RiskLevel {
    /// HIGH or CRITICAL
    pub fn is_elevated(self) -> bool {
        matches!(self, Self::High | Self::Critical)
    }

    /// One level up; CRITICAL saturates
    pub fn escalate(self) -> Self {
        match self {
            Self::Unknown | Self::Low => Self::High,
            Self::High | Self::Critical => Self::Critical,
        }
    }
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Unknown => "UNKNOWN",
            Self::Low => "LOW",
            Self::High => "HIGH",
            Self::Critical => "CRITICAL",
        };
        f.write_str(label)
    }
}

/// Confidence label set by the discovery stage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Confidence {
    Unknown,
    Low,
    High,
}

impl Default for Confidence {
    fn default() -> Self {
        Self::Unknown
    }
}

/// Outcome of the enforcement stage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EnforcementAction {
    /// Transaction allowed through the gateway
    Authorized,

    /// Transaction held pending manual review
    ConditionalBlock,

    /// Pipeline halted and all traffic blocked
    KillSwitch,
}

impl fmt::Display for EnforcementAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Authorized => "AUTHORIZED",
            Self::ConditionalBlock => "CONDITIONAL_BLOCK",
            Self::KillSwitch => "KILL_SWITCH",
        };
        f.write_str(label)
    }
}

/// A partial update returned by a stage.
///
/// Fields left at their defaults are not serialized and therefore never
/// touch the record during merge.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecordUpdate {
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub findings: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub risk_level: Option<RiskLevel>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remediation_plan: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub evidence_package: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub policy_gaps: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry_count: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub confidence: Option<Confidence>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub generated_code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub forecast: Option<Vec<f64>>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub audit_trail: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub drift_score: Option<f64>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub supply_chain_risks: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub policy_amendment: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub integrity_hash: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sensitivity: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub financial_impact: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub simulation_report: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub simulation_passed: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enforcement: Option<EnforcementAction>,
}

impl RecordUpdate {
    /// An update that changes nothing
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    pub fn finding(mut self, finding: impl Into<String>) -> Self {
        self.findings.push(finding.into());
        self
    }

    pub fn audit(mut self, entry: impl Into<String>) -> Self {
        self.audit_trail.push(entry.into());
        self
    }
}

/// Checkpoint encodings for fields JSON handles badly
mod wire {
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine;
    use serde::{Deserialize, Deserializer, Serializer};

    /// Attachments as a base64 string instead of a number array
    pub mod base64_bytes {
        use super::*;

        pub fn serialize<S: Serializer>(bytes: &Option<Vec<u8>>, s: S) -> Result<S::Ok, S::Error> {
            match bytes {
                Some(bytes) => s.serialize_some(&STANDARD.encode(bytes)),
                None => s.serialize_none(),
            }
        }

        pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<Vec<u8>>, D::Error> {
            match Option::<String>::deserialize(d)? {
                Some(encoded) => STANDARD
                    .decode(encoded.as_bytes())
                    .map(Some)
                    .map_err(serde::de::Error::custom),
                None => Ok(None),
            }
        }
    }

    // serde_json writes NaN and infinities as null
    pub fn lenient_float<'de, D: Deserializer<'de>>(d: D) -> Result<f64, D::Error> {
        Ok(Option::<f64>::deserialize(d)?.unwrap_or(f64::NAN))
    }

    pub fn lenient_floats<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<f64>, D::Error> {
        Ok(Vec::<Option<f64>>::deserialize(d)?
            .into_iter()
            .map(|v| v.unwrap_or(f64::NAN))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fresh_record() {
        let record = AuditRecord::new();
        assert!(record.findings.is_empty());
        assert!(record.policy_gaps.is_empty());
        assert_eq!(record.retry_count, 0);
        assert_eq!(record.risk_level, RiskLevel::Unknown);
        assert_eq!(record.sensitivity, DEFAULT_SENSITIVITY);
    }

    #[test]
    fn test_risk_escalation_saturates() {
        assert_eq!(RiskLevel::Low.escalate(), RiskLevel::High);
        assert_eq!(RiskLevel::High.escalate(), RiskLevel::Critical);
        assert_eq!(RiskLevel::Critical.escalate(), RiskLevel::Critical);
        assert!(!RiskLevel::Unknown.is_elevated());
    }

    #[test]
    fn test_risk_level_wire_format() {
        let json = serde_json::to_string(&RiskLevel::Critical).unwrap();
        assert_eq!(json, "\"CRITICAL\"");
        let parsed: RiskLevel = serde_json::from_str("\"LOW\"").unwrap();
        assert_eq!(parsed, RiskLevel::Low);
    }

    #[test]
    fn test_missing_fields_take_defaults() {
        let record: AuditRecord =
            serde_json::from_str(r#"{"findings": [], "risk_level": "UNKNOWN", "retry_count": 0}"#)
                .unwrap();
        assert_eq!(record.log_sample, DEMO_LOG_SAMPLE);
        assert!(!record.red_team_mode);
    }

    #[test]
    fn test_empty_update_serializes_to_nothing() {
        let json = serde_json::to_value(RecordUpdate::empty()).unwrap();
        assert_eq!(json, serde_json::json!({}));
        assert!(RecordUpdate::empty().is_empty());
        assert!(!RecordUpdate::empty().finding("x").is_empty());
    }

    #[test]
    fn test_attachments_encode_as_base64() {
        let record = AuditRecord::new().with_image(vec![0x89, 0x50, 0x4e, 0x47]);
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["image"], "iVBORw==");
        assert!(json["audio"].is_null());

        let parsed: AuditRecord = serde_json::from_value(json).unwrap();
        assert_eq!(parsed.image, Some(vec![0x89, 0x50, 0x4e, 0x47]));
        assert_eq!(parsed.audio, None);
    }

    #[test]
    fn test_non_finite_floats_survive_checkpoint_json() {
        let mut record = AuditRecord::new();
        record.sensitivity = f64::NAN;
        record.drift_score = f64::INFINITY;
        record.forecast = vec![1.0, f64::NAN];

        let json = serde_json::to_string(&record).unwrap();
        let parsed: AuditRecord = serde_json::from_str(&json).unwrap();

        assert!(parsed.sensitivity.is_nan());
        assert!(parsed.drift_score.is_nan());
        assert_eq!(parsed.forecast[0], 1.0);
        assert!(parsed.forecast[1].is_nan());
        assert_eq!(parsed.effective_sensitivity(), DEFAULT_SENSITIVITY);
    }

    #[test]
    fn test_effective_sensitivity_clamps() {
        let mut record = AuditRecord::new();
        record.sensitivity = 1.7;
        assert_eq!(record.effective_sensitivity(), 1.0);
        record.sensitivity = -0.2;
        assert_eq!(record.effective_sensitivity(), 0.0);
        record.sensitivity = 0.4;
        assert_eq!(record.effective_sensitivity(), 0.4);
    }

    #[test]
    fn test_adversarial_detection() {
        let mut record = AuditRecord::new();
        assert!(!record.has_adversarial_findings());
        record.findings.push(format!("{} injected payload", RED_TEAM_PREFIX));
        assert!(record.has_adversarial_findings());
    }
}
