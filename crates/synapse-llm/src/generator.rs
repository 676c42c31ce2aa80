use async_trait::async_trait;
use synapse_core::{ConversationTurn, Result, Role};
use tracing::debug;

use crate::provider::LlmRequest;
use crate::router::ModelRouter;

/// Opaque text completion used by node actors for free-form input.
#[async_trait]
pub trait Generator: Send + Sync {
    /// Produce a reply for `turns` (system turns first, user turn last).
    async fn generate(&self, turns: &[ConversationTurn]) -> Result<String>;
}

/// Sampling settings the router is driven with.
#[derive(Debug, Clone)]
pub struct GenerationSettings {
    pub model: String,
    pub fallback_model: Option<String>,
    pub max_tokens: u32,
    pub temperature: f32,
}

impl Default for GenerationSettings {
    fn default() -> Self {
        Self {
            model: "mock/echo".into(),
            fallback_model: None,
            max_tokens: 1024,
            temperature: 0.7,
        }
    }
}

/// [`Generator`] backed by a [`ModelRouter`].
pub struct RoutedGenerator {
    router: ModelRouter,
    settings: GenerationSettings,
}

impl RoutedGenerator {
    pub fn new(router: ModelRouter, settings: GenerationSettings) -> Self {
        Self { router, settings }
    }

    pub fn settings(&self) -> &GenerationSettings {
        &self.settings
    }

    fn build_request(&self, turns: &[ConversationTurn]) -> LlmRequest {
        let system: Vec<&str> = turns
            .iter()
            .filter(|t| t.role == Role::System)
            .map(|t| t.content.as_str())
            .collect();
        LlmRequest {
            model: self.settings.model.clone(),
            turns: turns
                .iter()
                .filter(|t| t.role != Role::System)
                .cloned()
                .collect(),
            system: (!system.is_empty()).then(|| system.join("\n\n")),
            max_tokens: self.settings.max_tokens,
            temperature: self.settings.temperature,
        }
    }
}

#[async_trait]
impl Generator for RoutedGenerator {
    async fn generate(&self, turns: &[ConversationTurn]) -> Result<String> {
        let request = self.build_request(turns);
        let response = self
            .router
            .complete(&request, self.settings.fallback_model.as_deref())
            .await?;
        debug!(
            model = %self.settings.model,
            input_tokens = response.usage.input_tokens,
            output_tokens = response.usage.output_tokens,
            "generator reply"
        );
        Ok(response.text)
    }
}
