//! Remediation patch generation.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{info, warn};

use crate::adapters::TextGenerator;
use crate::domain::{AuditRecord, RecordUpdate, NO_ACTION_REQUIRED};

use super::{Stage, CODEGEN};

const FALLBACK_PATCH: &str = r#"import re

PAN_PATTERN = re.compile(r"\b(?:\d[ -]*?){13,16}\b")


def tokenize_pan(message: str) -> str:
    """Mask card numbers before the message reaches any log sink."""
    return PAN_PATTERN.sub(lambda m: "**** **** **** " + re.sub(r"\D", "", m.group())[-4:], message)
"#;

pub struct CodegenStage {
    llm: Arc<dyn TextGenerator>,
}

impl CodegenStage {
    pub fn new(llm: Arc<dyn TextGenerator>) -> Self {
        Self { llm }
    }
}

/// Strip a surrounding markdown code fence, if the model added one
fn strip_fence(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let body = rest.split_once('\n').map(|(_, body)| body).unwrap_or("");
    body.strip_suffix("```").unwrap_or(body).trim()
}

#[async_trait]
impl Stage for CodegenStage {
    fn name(&self) -> &str {
        CODEGEN
    }

    async fn run(&self, record: &AuditRecord) -> RecordUpdate {
        if !record.risk_level.is_elevated() {
            info!(risk = %record.risk_level, "Risk not elevated, no patch needed");
            return RecordUpdate {
                generated_code: Some(NO_ACTION_REQUIRED.to_string()),
                ..Default::default()
            };
        }

        let prompt = format!(
            "You are a secure-coding assistant. Write a short Python function that fixes this \
             compliance issue.\n\nRemediation plan: {}\n\nReturn only code.",
            record.remediation_plan
        );

        let code = match self.llm.generate(&prompt).await {
            Ok(text) if !strip_fence(&text).is_empty() => strip_fence(&text).to_string(),
            Ok(_) => {
                warn!("Model returned no code, using fallback patch");
                FALLBACK_PATCH.to_string()
            }
            Err(e) => {
                warn!(provider = self.llm.name(), error = %e, "Code generation failed, using fallback patch");
                FALLBACK_PATCH.to_string()
            }
        };

        RecordUpdate {
            generated_code: Some(code),
            ..Default::default()
        }
    }
}
