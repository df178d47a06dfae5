// src/llm/backend.rs
//! HTTP backends for the hosted chat models.
//!
//!   AnthropicBackend: Anthropic Messages API (claude-*)
//!   MistralBackend:   Mistral chat completions (OpenAI-style)

use async_trait::async_trait;
use reqwest::StatusCode;

use crate::llm::{LlmBackend, LlmRequest, LlmResponse};
use crate::utils::error::LlmError;

pub const ANTHROPIC_BASE_URL: &str = "https://api.anthropic.com";
pub const MISTRAL_BASE_URL: &str = "https://api.mistral.ai";
pub const ANTHROPIC_DEFAULT_MODEL: &str = "claude-3-5-sonnet-latest";
pub const MISTRAL_DEFAULT_MODEL: &str = "mistral-large-latest";
const ANTHROPIC_VERSION: &str = "2023-06-01";

// ── Helpers ───────────────────────────────────────────────────────────────────

/// Maps HTTP failures to [`LlmError`] and parses successful bodies as JSON.
pub(crate) async fn check_response_status(resp: reqwest::Response) -> Result<serde_json::Value, LlmError> {
    let status = resp.status();
    if status == StatusCode::TOO_MANY_REQUESTS {
        return Err(LlmError::RateLimited);
    }
    let text = resp.text().await?;
    if !status.is_success() {
        let message = serde_json::from_str::<serde_json::Value>(&text)
            .ok()
            .and_then(|body| {
                body["error"]["message"]
                    .as_str()
                    .or_else(|| body["message"].as_str())
                    .map(String::from)
            })
            .unwrap_or(text);
        return Err(LlmError::Api { status: status.as_u16(), message });
    }
    serde_json::from_str(&text).map_err(|e| LlmError::Malformed(format!("response is not JSON: {}", e)))
}

fn required_text(value: Option<&str>, what: &str) -> Result<String, LlmError> {
    value
        .map(String::from)
        .ok_or_else(|| LlmError::Malformed(format!("response has no {}", what)))
}

// ── Anthropic ─────────────────────────────────────────────────────────────────

pub struct AnthropicBackend {
    pub model: String,
    base_url: String,
    api_key: String,
    client: reqwest::Client,
}

impl AnthropicBackend {
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            base_url: ANTHROPIC_BASE_URL.to_string(),
            api_key: api_key.into(),
            client: reqwest::Client::new(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }
}

#[async_trait]
impl LlmBackend for AnthropicBackend {
    async fn complete(&self, req: LlmRequest) -> Result<LlmResponse, LlmError> {
        let mut body = serde_json::json!({
            "model":       &self.model,
            "max_tokens":  req.max_tokens,
            "temperature": req.temperature,
            "messages":    [{"role": "user", "content": req.prompt}],
        });
        if let Some(system) = req.system.filter(|s| !s.is_empty()) {
            body["system"] = serde_json::Value::String(system);
        }

        let url = format!("{}/v1/messages", self.base_url.trim_end_matches('/'));
        let resp = self.client
            .post(&url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(&body)
            .send()
            .await?;
        let json = check_response_status(resp).await?;

        let content = required_text(
            json["content"]
                .as_array()
                .and_then(|blocks| blocks.first())
                .and_then(|b| b["text"].as_str()),
            "content[0].text",
        )?;

        Ok(LlmResponse {
            content,
            model: json["model"].as_str().unwrap_or(&self.model).to_string(),
        })
    }

    fn model_id(&self) -> &str { &self.model }
    fn provider(&self) -> &'static str { "anthropic" }
}

// ── Mistral ───────────────────────────────────────────────────────────────────

pub struct MistralBackend {
    pub model: String,
    base_url: String,
    api_key: String,
    client: reqwest::Client,
}

impl MistralBackend {
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            base_url: MISTRAL_BASE_URL.to_string(),
            api_key: api_key.into(),
            client: reqwest::Client::new(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }
}

#[async_trait]
impl LlmBackend for MistralBackend {
    async fn complete(&self, req: LlmRequest) -> Result<LlmResponse, LlmError> {
        let mut messages = Vec::with_capacity(2);
        if let Some(system) = req.system.filter(|s| !s.is_empty()) {
            messages.push(serde_json::json!({"role": "system", "content": system}));
        }
        messages.push(serde_json::json!({"role": "user", "content": req.prompt}));

        let body = serde_json::json!({
            "model":       &self.model,
            "messages":    messages,
            "max_tokens":  req.max_tokens,
            "temperature": req.temperature,
        });

        let url = format!("{}/v1/chat/completions", self.base_url.trim_end_matches('/'));
        let resp = self.client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;
        let json = check_response_status(resp).await?;

        let content = required_text(json["choices"][0]["message"]["content"].as_str(), "choices[0].message.content")?;
        Ok(LlmResponse {
            content,
            model: json["model"].as_str().unwrap_or(&self.model).to_string(),
        })
    }

    fn model_id(&self) -> &str { &self.model }
    fn provider(&self) -> &'static str { "mistral" }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
