use async_trait::async_trait;
use synapse_core::{Result, Role, SynapseError};
use tracing::{debug, info};

use crate::provider::*;

/// OpenAI-compatible API provider (works with OpenAI, Azure, Together, vLLM, etc.)
pub struct OpenAiProvider {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
    provider_name: String,
}

impl OpenAiProvider {
    pub fn new(api_key: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key,
            base_url: "https://api.openai.com/v1".into(),
            provider_name: "openai".into(),
        }
    }

    /// Use a custom base URL and routing name.
    pub fn with_base_url(mut self, url: String, name: String) -> Self {
        self.base_url = url;
        self.provider_name = name;
        self
    }
}

#[async_trait]
impl LlmProvider for OpenAiProvider {
    fn name(&self) -> &str {
        &self.provider_name
    }

    fn models(&self) -> Vec<String> {
        vec!["gpt-4o".into(), "gpt-4o-mini".into(), "o3-mini".into()]
    }

    async fn complete(&self, request: &LlmRequest) -> Result<LlmResponse> {
        let mut messages = Vec::new();

        if let Some(ref system) = request.system {
            messages.push(serde_json::json!({
                "role": "system",
                "content": system,
            }));
        }

        for turn in &request.turns {
            let role = match turn.role {
                Role::System => "system",
                Role::User => "user",
                Role::Assistant => "assistant",
            };
            messages.push(serde_json::json!({ "role": role, "content": turn.content }));
        }

        let mut body = serde_json::json!({
            "model": &request.model,
            "messages": messages,
        });
        if uses_max_completion_tokens(&request.model) {
            body["max_completion_tokens"] = serde_json::json!(request.max_tokens);
        } else {
            body["max_tokens"] = serde_json::json!(request.max_tokens);
            body["temperature"] = serde_json::json!(request.temperature);
        }

        debug!(provider = %self.provider_name, model = %request.model, "sending chat completion request");

        let resp = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&body)
            .send()
            .await
            .map_err(|e| SynapseError::GeneratorFailure(e.to_string()))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let text = resp.text().await.unwrap_or_default();
            return Err(SynapseError::GeneratorFailure(format!(
                "HTTP {status}: {text}"
            )));
        }

        let data: serde_json::Value = resp
            .json()
            .await
            .map_err(|e| SynapseError::GeneratorFailure(e.to_string()))?;

        let choice = &data["choices"][0];
        let text = choice["message"]["content"]
            .as_str()
            .unwrap_or("")
            .to_string();

        let usage = Usage {
            input_tokens: data["usage"]["prompt_tokens"].as_u64().unwrap_or(0) as u32,
            output_tokens: data["usage"]["completion_tokens"].as_u64().unwrap_or(0) as u32,
        };

        Ok(LlmResponse {
            text,
            usage,
            stop_reason: match choice["finish_reason"].as_str().unwrap_or("") {
                "length" => StopReason::MaxTokens,
                "content_filter" => StopReason::ContentFilter,
                _ => StopReason::EndTurn,
            },
        })
    }

    async fn health_check(&self) -> Result<()> {
        info!(provider = self.provider_name, "checking API health");
        if self.api_key.is_empty() {
            return Err(SynapseError::GeneratorUnavailable(format!(
                "{} API key not set",
                self.provider_name
            )));
        }
        Ok(())
    }
}

/// Returns true for models that require `max_completion_tokens` instead of `max_tokens`.
fn uses_max_completion_tokens(model: &str) -> bool {
    let m = model.to_lowercase();
    m.starts_with("o1") || m.starts_with("o3") || m.starts_with("o4") || m.contains("gpt-5")
}
