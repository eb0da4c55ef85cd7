//! OpenAI-compatible chat/transcription client.
//!
//! Serves as both the text generator and the evidence analyzer. Any
//! endpoint implementing `/chat/completions` and `/audio/transcriptions`
//! works.

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use base64::Engine;
use reqwest::multipart::{Form, Part};
use serde::Deserialize;

use super::{EvidenceAnalyzer, EvidenceVerdict, TextGenerator};

/// Default API base URL
pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

/// Default chat model
pub const DEFAULT_MODEL: &str = "gpt-4o";

/// Chat-completions client
pub struct OpenAiClient {
    api_key: String,
    base_url: String,
    model: String,
    client: reqwest::Client,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TranscriptionResponse {
    text: String,
}

impl OpenAiClient {
    pub fn new(
        api_key: String,
        base_url: String,
        model: String,
        timeout_seconds: u64,
    ) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_seconds))
            .build()
            .context("Failed to build LLM HTTP client")?;

        Ok(Self {
            api_key,
            base_url: base_url.trim_end_matches('/').to_string(),
            model,
            client,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path)
    }

    /// Send one user message and return the first choice's content
    async fn chat(&self, content: serde_json::Value) -> Result<String> {
        let response = self
            .client
            .post(self.url("chat/completions"))
            .bearer_auth(&self.api_key)
            .json(&serde_json::json!({
                "model": self.model,
                "temperature": 0,
                "messages": [{ "role": "user", "content": content }],
            }))
            .send()
            .await
            .context("Chat completion request failed")?
            .error_for_status()
            .context("Chat completion endpoint returned an error")?;

        let parsed: ChatResponse = response
            .json()
            .await
            .context("Failed to parse chat completion response")?;

        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .context("Chat completion returned no content")
    }
}

#[async_trait]
impl TextGenerator for OpenAiClient {
    fn name(&self) -> &str {
        "openai"
    }

    async fn generate(&self, prompt: &str) -> Result<String> {
        self.chat(serde_json::Value::String(prompt.to_string()))
            .await
    }
}

const IMAGE_PROMPT: &str = "You are a PCI/GDPR compliance auditor. Describe in one sentence \
whether this image exposes card numbers, personal identifiers or credentials. \
Start your answer with EXPOSED or CLEAR.";

#[async_trait]
impl EvidenceAnalyzer for OpenAiClient {
    async fn analyze_image(&self, bytes: &[u8]) -> Result<EvidenceVerdict> {
        let encoded = base64::engine::general_purpose::STANDARD.encode(bytes);
        let content = serde_json::json!([
            { "type": "text", "text": IMAGE_PROMPT },
            {
                "type": "image_url",
                "image_url": { "url": format!("data:image/png;base64,{}", encoded) },
            },
        ]);

        let answer = self.chat(content).await?;
        Ok(parse_verdict(&answer))
    }

    async fn transcribe_audio(&self, bytes: &[u8]) -> Result<String> {
        let part = Part::bytes(bytes.to_vec())
            .file_name("evidence.wav")
            .mime_str("audio/wav")
            .context("Failed to build audio upload")?;
        let form = Form::new().text("model", "whisper-1").part("file", part);

        let response = self
            .client
            .post(self.url("audio/transcriptions"))
            .bearer_auth(&self.api_key)
            .multipart(form)
            .send()
            .await
            .context("Transcription request failed")?
            .error_for_status()
            .context("Transcription endpoint returned an error")?;

        let parsed: TranscriptionResponse = response
            .json()
            .await
            .context("Failed to parse transcription response")?;

        Ok(parsed.text)
    }
}

fn parse_verdict(answer: &str) -> EvidenceVerdict {
    let suspicious = !answer.trim_start().to_uppercase().starts_with("CLEAR");
    EvidenceVerdict {
        summary: answer.to_string(),
        suspicious,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_url_trailing_slash_trimmed() {
        let client = OpenAiClient::new(
            "key".to_string(),
            "https://llm.internal/v1/".to_string(),
            DEFAULT_MODEL.to_string(),
            30,
        )
        .unwrap();
        assert_eq!(
            client.url("chat/completions"),
            "https://llm.internal/v1/chat/completions"
        );
    }

    #[test]
    fn test_verdict_parsing() {
        assert!(!parse_verdict("CLEAR: receipt shows masked card").suspicious);
        assert!(parse_verdict("EXPOSED: full PAN visible").suspicious);
        // Anything ambiguous is treated as exposure
        assert!(parse_verdict("The image is blurry").suspicious);
    }
}
