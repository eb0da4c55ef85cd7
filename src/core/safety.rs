//! Safety limits for audit runs.
//!
//! Guards against runaway execution and unsafe inputs:
//! - Step budget per `run` call (catches misconfigured cycles)
//! - Attachment size limits
//! - Denylist patterns (so secrets are never uploaded as evidence)

use std::path::Path;
use std::time::Instant;

use glob::Pattern;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Safety limits for pipeline execution
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SafetyLimits {
    /// Maximum stage executions per run call (default: 50)
    #[serde(default = "default_max_steps")]
    pub max_steps: u32,

    /// Maximum size of an image or audio attachment (default: 10MB)
    #[serde(default = "default_max_attachment_bytes")]
    pub max_attachment_bytes: u64,

    /// Glob patterns for files that must never be attached
    #[serde(default = "default_denylist")]
    pub denylist_patterns: Vec<String>,
}

fn default_max_steps() -> u32 {
    50
}
fn default_max_attachment_bytes() -> u64 {
    10 * 1024 * 1024
} // 10MB

fn default_denylist() -> Vec<String> {
    vec![
        "**/.env*".to_string(),
        "**/secrets*".to_string(),
        "**/*credential*".to_string(),
        "**/*.pem".to_string(),
        "**/*.key".to_string(),
    ]
}

impl Default for SafetyLimits {
    fn default() -> Self {
        Self {
            max_steps: default_max_steps(),
            max_attachment_bytes: default_max_attachment_bytes(),
            denylist_patterns: default_denylist(),
        }
    }
}

impl SafetyLimits {
    /// Check if a path matches any denylist pattern
    pub fn is_denylisted(&self, path: &str) -> bool {
        self.denylist_patterns
            .iter()
            .filter_map(|p| Pattern::new(p).ok())
            .any(|pattern| pattern.matches(path))
    }

    /// Validate an attachment against the denylist and size limit
    pub fn validate_attachment(&self, path: &Path, size: u64) -> Result<(), SafetyViolation> {
        let path_str = path.to_string_lossy();
        if self.is_denylisted(&path_str) {
            return Err(SafetyViolation::DenylistMatch {
                path: path_str.to_string(),
            });
        }

        if size > self.max_attachment_bytes {
            return Err(SafetyViolation::MaxAttachmentBytes {
                actual: size,
                limit: self.max_attachment_bytes,
            });
        }

        Ok(())
    }

    /// Check current tracker state against limits
    pub fn check(&self, tracker: &SafetyTracker) -> Result<(), SafetyViolation> {
        if tracker.steps_executed >= self.max_steps {
            return Err(SafetyViolation::MaxSteps {
                actual: tracker.steps_executed,
                limit: self.max_steps,
            });
        }
        Ok(())
    }
}

/// Tracks resource usage during a run call
#[derive(Debug, Clone)]
pub struct SafetyTracker {
    /// Number of stages executed
    pub steps_executed: u32,

    /// When the call started
    pub started_at: Instant,
}

impl Default for SafetyTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl SafetyTracker {
    pub fn new() -> Self {
        Self {
            steps_executed: 0,
            started_at: Instant::now(),
        }
    }

    /// Record a stage execution
    pub fn record_step(&mut self) {
        self.steps_executed += 1;
    }

    pub fn elapsed_ms(&self) -> u64 {
        self.started_at.elapsed().as_millis() as u64
    }
}

/// Safety violation errors
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SafetyViolation {
    #[error("Maximum steps exceeded: {actual} >= {limit}")]
    MaxSteps { actual: u32, limit: u32 },

    #[error("Attachment too large: {actual} > {limit} bytes")]
    MaxAttachmentBytes { actual: u64, limit: u64 },

    #[error("Path matches denylist pattern: {path}")]
    DenylistMatch { path: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_limits() {
        let limits = SafetyLimits::default();
        assert_eq!(limits.max_steps, 50);
        assert_eq!(limits.max_attachment_bytes, 10 * 1024 * 1024);
    }

    #[test]
    fn test_denylist_matching() {
        let limits = SafetyLimits::default();

        assert!(limits.is_denylisted(".env"));
        assert!(limits.is_denylisted("config/secrets.json"));
        assert!(limits.is_denylisted("certs/server.pem"));

        assert!(!limits.is_denylisted("evidence/receipt.png"));
        assert!(!limits.is_denylisted("calls/support.wav"));
    }

    #[test]
    fn test_attachment_validation() {
        let limits = SafetyLimits {
            max_attachment_bytes: 100,
            ..Default::default()
        };

        assert!(limits
            .validate_attachment(Path::new("scan.png"), 50)
            .is_ok());
        assert!(matches!(
            limits.validate_attachment(Path::new("scan.png"), 200),
            Err(SafetyViolation::MaxAttachmentBytes { .. })
        ));
        assert!(matches!(
            limits.validate_attachment(Path::new("keys/server.key"), 10),
            Err(SafetyViolation::DenylistMatch { .. })
        ));
    }

    #[test]
    fn test_tracker_step_counting() {
        let limits = SafetyLimits {
            max_steps: 2,
            ..Default::default()
        };

        let mut tracker = SafetyTracker::new();
        assert!(limits.check(&tracker).is_ok());

        tracker.record_step();
        assert!(limits.check(&tracker).is_ok());

        tracker.record_step();
        assert_eq!(
            limits.check(&tracker),
            Err(SafetyViolation::MaxSteps { actual: 2, limit: 2 })
        );
    }
}
