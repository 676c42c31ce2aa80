use async_trait::async_trait;
use reqwest::Client;
use synapse_core::{Result, Role, SynapseError};
use tracing::debug;

use crate::provider::*;

/// Anthropic Claude API provider.
pub struct AnthropicProvider {
    client: Client,
    api_key: String,
    base_url: String,
}

impl AnthropicProvider {
    pub fn new(api_key: String) -> Self {
        Self {
            client: Client::new(),
            api_key,
            base_url: "https://api.anthropic.com/v1".into(),
        }
    }

    pub fn with_base_url(mut self, url: String) -> Self {
        self.base_url = url;
        self
    }

    fn build_request_body(&self, request: &LlmRequest) -> serde_json::Value {
        let messages: Vec<serde_json::Value> = request
            .turns
            .iter()
            .filter_map(|turn| {
                let role = match turn.role {
                    Role::System => return None,
                    Role::User => "user",
                    Role::Assistant => "assistant",
                };
                Some(serde_json::json!({ "role": role, "content": turn.content }))
            })
            .collect();

        let mut body = serde_json::json!({
            "model": &request.model,
            "max_tokens": request.max_tokens,
            "temperature": request.temperature,
            "messages": messages,
        });

        if let Some(ref system) = request.system {
            body["system"] = serde_json::json!(system);
        }

        body
    }
}

#[async_trait]
impl LlmProvider for AnthropicProvider {
    fn name(&self) -> &str {
        "anthropic"
    }

    fn models(&self) -> Vec<String> {
        vec![
            "claude-opus-4-20250514".into(),
            "claude-sonnet-4-20250514".into(),
            "claude-haiku-3-5".into(),
        ]
    }

    async fn complete(&self, request: &LlmRequest) -> Result<LlmResponse> {
        let body = self.build_request_body(request);
        debug!(model = %request.model, "sending Anthropic API request");

        let resp = self
            .client
            .post(format!("{}/messages", self.base_url))
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", "2023-06-01")
            .header("content-type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| SynapseError::GeneratorFailure(e.to_string()))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let text = resp.text().await.unwrap_or_default();
            if status.as_u16() == 429 {
                return Err(SynapseError::RateLimited {
                    retry_after_secs: 30,
                });
            }
            return Err(SynapseError::GeneratorFailure(format!(
                "HTTP {status}: {text}"
            )));
        }

        let data: serde_json::Value = resp
            .json()
            .await
            .map_err(|e| SynapseError::GeneratorFailure(e.to_string()))?;

        let text = data["content"]
            .as_array()
            .map(|blocks| {
                blocks
                    .iter()
                    .filter(|b| b["type"] == "text")
                    .filter_map(|b| b["text"].as_str())
                    .collect::<Vec<_>>()
                    .join("")
            })
            .unwrap_or_default();

        let stop_reason = match data["stop_reason"].as_str() {
            Some("max_tokens") => StopReason::MaxTokens,
            Some("stop_sequence") => StopReason::StopSequence,
            _ => StopReason::EndTurn,
        };

        let usage = Usage {
            input_tokens: data["usage"]["input_tokens"].as_u64().unwrap_or(0) as u32,
            output_tokens: data["usage"]["output_tokens"].as_u64().unwrap_or(0) as u32,
        };

        Ok(LlmResponse {
            text,
            usage,
            stop_reason,
        })
    }

    async fn health_check(&self) -> Result<()> {
        if self.api_key.is_empty() {
            return Err(SynapseError::GeneratorUnavailable(
                "anthropic API key not set".into(),
            ));
        }
        Ok(())
    }
}
