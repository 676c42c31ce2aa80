//! Mock LLM provider for deterministic testing and offline demos.
//!
//! Returns pre-configured responses without making any HTTP calls.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;
use synapse_core::{Result, Role, SynapseError};

use crate::provider::*;

/// A mock LLM provider that returns queued responses in order.
///
/// When the queue is empty it echoes the last user turn, so a node wired to
/// `mock/echo` still answers something readable.
///
/// # Example
/// ```
/// use synapse_llm::mock::MockProvider;
/// let provider = MockProvider::new("mock")
///     .with_response("Hello, world!");
/// ```
pub struct MockProvider {
    responses: Arc<Mutex<VecDeque<MockResponse>>>,
    /// Every request received, for assertions in tests.
    requests: Arc<Mutex<Vec<LlmRequest>>>,
    name: String,
}

/// A pre-configured response from the mock provider.
#[derive(Debug, Clone, Default)]
pub struct MockResponse {
    pub text: String,
    /// If set, the provider returns this error instead.
    pub error: Option<String>,
    /// Delay before answering.
    pub delay: Option<Duration>,
}

impl MockResponse {
    pub fn text(text: &str) -> Self {
        Self {
            text: text.to_string(),
            ..Default::default()
        }
    }

    pub fn error(msg: &str) -> Self {
        Self {
            error: Some(msg.to_string()),
            ..Default::default()
        }
    }

    pub fn delayed(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }
}

impl MockProvider {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            responses: Arc::new(Mutex::new(VecDeque::new())),
            requests: Arc::new(Mutex::new(vec![])),
            name: name.into(),
        }
    }

    /// Queue a simple text response.
    pub fn with_response(self, text: &str) -> Self {
        self.responses.lock().push_back(MockResponse::text(text));
        self
    }

    /// Queue an error response.
    pub fn with_error(self, error: &str) -> Self {
        self.responses.lock().push_back(MockResponse::error(error));
        self
    }

    /// Queue a fully custom response.
    pub fn with_mock_response(self, resp: MockResponse) -> Self {
        self.responses.lock().push_back(resp);
        self
    }

    /// Queue a response through a shared reference.
    pub fn queue_response(&self, resp: MockResponse) {
        self.responses.lock().push_back(resp);
    }

    /// Handle on all requests made to this provider.
    pub fn recorded_requests(&self) -> Arc<Mutex<Vec<LlmRequest>>> {
        Arc::clone(&self.requests)
    }

    fn next_response(&self, request: &LlmRequest) -> MockResponse {
        if let Some(resp) = self.responses.lock().pop_front() {
            return resp;
        }
        let last_user = request
            .turns
            .iter()
            .rev()
            .find(|t| t.role == Role::User)
            .map(|t| t.content.clone())
            .unwrap_or_default();
        MockResponse::text(&format!("(mock) {last_user}"))
    }
}

#[async_trait]
impl LlmProvider for MockProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn models(&self) -> Vec<String> {
        vec!["echo".to_string()]
    }

    async fn complete(&self, request: &LlmRequest) -> Result<LlmResponse> {
        self.requests.lock().push(request.clone());
        let mock = self.next_response(request);

        if let Some(delay) = mock.delay {
            tokio::time::sleep(delay).await;
        }
        if let Some(error) = mock.error {
            return Err(SynapseError::GeneratorFailure(error));
        }

        Ok(LlmResponse {
            usage: Usage {
                input_tokens: request.turns.iter().map(|t| t.content.len() as u32 / 4).sum(),
                output_tokens: mock.text.len() as u32 / 4,
            },
            text: mock.text,
            stop_reason: StopReason::EndTurn,
        })
    }

    async fn health_check(&self) -> Result<()> {
        Ok(())
    }
}
