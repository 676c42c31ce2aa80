use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use synapse_core::{ConversationTurn, Result};

/// A request to an LLM provider.
#[derive(Debug, Clone)]
pub struct LlmRequest {
    /// The model to use (provider-specific part once routed).
    pub model: String,
    /// User/assistant turns, oldest first. System turns are carried in `system`.
    pub turns: Vec<ConversationTurn>,
    /// System prompt (separate from turns for providers that support it).
    pub system: Option<String>,
    /// Maximum tokens to generate.
    pub max_tokens: u32,
    /// Temperature.
    pub temperature: f32,
}

/// A complete response from an LLM.
#[derive(Debug, Clone)]
pub struct LlmResponse {
    pub text: String,
    pub usage: Usage,
    pub stop_reason: StopReason,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    EndTurn,
    MaxTokens,
    StopSequence,
    ContentFilter,
}

/// Token usage statistics.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Usage {
    pub input_tokens: u32,
    pub output_tokens: u32,
}

impl Usage {
    pub fn total_tokens(&self) -> u32 {
        self.input_tokens + self.output_tokens
    }
}

/// Trait implemented by each LLM provider (Anthropic, OpenAI, mock).
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Routing prefix, e.g. "anthropic", "openai".
    fn name(&self) -> &str;

    /// List available models.
    fn models(&self) -> Vec<String>;

    /// Send a request and wait for the full reply.
    async fn complete(&self, request: &LlmRequest) -> Result<LlmResponse>;

    /// Check if this provider is usable.
    async fn health_check(&self) -> Result<()>;
}
