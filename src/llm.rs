//! Chat-completions client
//!
//! Thin client for an OpenAI-compatible completions endpoint. Everything
//! model-facing in the crate goes through here: SQL generation, answer
//! synthesis, and receipt structuring (text and image).

use crate::config::LlmConfig;
use crate::error::{QuittungError, Result};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use serde_json::Value;
use std::time::Duration;
use tracing::warn;

const JSON_SYSTEM_PROMPT: &str =
    "You are a precise JSON-only responder. Always return valid JSON, no other text.";
const RETRY_BACKOFF: Duration = Duration::from_millis(500);

#[derive(Clone)]
pub struct LlmClient {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
    model: String,
}

impl LlmClient {
    pub fn new(config: &LlmConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| QuittungError::Llm(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            api_key: config.api_key.clone(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
        })
    }

    /// Send a single user prompt and return the model's reply verbatim.
    pub async fn complete(&self, prompt: &str) -> Result<String> {
        self.chat(vec![serde_json::json!({"role": "user", "content": prompt})])
            .await
    }

    /// Like [`complete`](Self::complete), but with a system instruction that
    /// pins the model to JSON output.
    pub async fn complete_json(&self, prompt: &str) -> Result<String> {
        self.chat(vec![
            serde_json::json!({"role": "system", "content": JSON_SYSTEM_PROMPT}),
            serde_json::json!({"role": "user", "content": prompt}),
        ])
        .await
    }

    /// Multimodal prompt: the image travels inline as a base64 data URL.
    pub async fn complete_with_image(
        &self,
        prompt: &str,
        image: &[u8],
        mime: &str,
    ) -> Result<String> {
        let data_url = format!("data:{};base64,{}", mime, BASE64.encode(image));
        self.chat(vec![
            serde_json::json!({"role": "system", "content": JSON_SYSTEM_PROMPT}),
            serde_json::json!({
                "role": "user",
                "content": [
                    {"type": "text", "text": prompt},
                    {"type": "image_url", "image_url": {"url": data_url}},
                ],
            }),
        ])
        .await
    }

    async fn chat(&self, messages: Vec<Value>) -> Result<String> {
        let body = serde_json::json!({
            "model": self.model,
            "messages": messages,
            "temperature": 0.1,
            "max_tokens": 1000,
        });
        let url = format!("{}/chat/completions", self.base_url);

        // One retry, and only for transport-level failures. A provider that
        // answered with an error body gets no second chance.
        let mut attempt = 0;
        loop {
            attempt += 1;
            match self.send(&url, &body).await {
                Ok(content) => return Ok(content),
                Err(failure) if failure.transient && attempt == 1 => {
                    warn!(error = %failure.message, "transient LLM failure, retrying once");
                    tokio::time::sleep(RETRY_BACKOFF).await;
                }
                Err(failure) => return Err(QuittungError::Llm(failure.message)),
            }
        }
    }

    async fn send(&self, url: &str, body: &Value) -> std::result::Result<String, SendFailure> {
        let response = self
            .client
            .post(url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(body)
            .send()
            .await
            .map_err(|e| SendFailure {
                transient: e.is_timeout() || e.is_connect(),
                message: format!("LLM API call failed: {}", e),
            })?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(SendFailure {
                transient: false,
                message: format!("LLM API returned {}: {}", status, truncate(&detail, 300)),
            });
        }

        let payload: Value = response.json().await.map_err(|e| SendFailure {
            transient: false,
            message: format!("Failed to parse LLM response: {}", e),
        })?;

        payload["choices"][0]["message"]["content"]
            .as_str()
            .map(|content| content.trim().to_string())
            .ok_or_else(|| SendFailure {
                transient: false,
                message: "No content in LLM response".to_string(),
            })
    }
}

struct SendFailure {
    transient: bool,
    message: String,
}

fn truncate(text: &str, limit: usize) -> &str {
    match text.char_indices().nth(limit) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

/// Pull the JSON payload out of a model reply that may wrap it in markdown
/// fences or surrounding prose.
pub fn extract_json_block(response: &str) -> String {
    if let Some(start) = response.find("```json") {
        let after = &response[start + 7..];
        if let Some(end) = after.find("```") {
            return after[..end].trim().to_string();
        }
    }

    if let Some(start) = response.find("```") {
        let after = &response[start + 3..];
        if let Some(end) = after.find("```") {
            let candidate = after[..end].trim();
            if serde_json::from_str::<Value>(candidate).is_ok() {
                return candidate.to_string();
            }
        }
    }

    let json_start = response.find('[').or_else(|| response.find('{'));
    let json_end = response.rfind(']').or_else(|| response.rfind('}'));
    if let (Some(start), Some(end)) = (json_start, json_end) {
        if start <= end {
            return response[start..=end].to_string();
        }
    }

    response.trim().to_string()
}
