use std::sync::Arc;
use std::time::Duration;
use synapse_core::{Result, SynapseError};
use tracing::{debug, info, warn};

use crate::provider::{LlmProvider, LlmRequest, LlmResponse};

/// How often and how patiently a single route is retried.
///
/// The whole generation is already bounded by the node's generator timeout,
/// so the default schedule stays short.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Extra attempts after the first one.
    pub max_retries: u32,
    /// First backoff; doubled on every further attempt.
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 2,
            base_delay: Duration::from_millis(500),
        }
    }
}

impl RetryPolicy {
    fn delay(&self, attempt: u32, err: &SynapseError) -> Duration {
        match err {
            SynapseError::RateLimited { retry_after_secs } => {
                Duration::from_secs(*retry_after_secs)
            }
            _ => self.base_delay * 2u32.saturating_pow(attempt),
        }
    }
}

/// Status code of a provider failure rendered as `HTTP <code>: ...`.
fn http_status(message: &str) -> Option<u16> {
    message.strip_prefix("HTTP ")?.get(..3)?.parse().ok()
}

/// Rate limits, 5xx answers and dropped connections are worth another try;
/// anything else (bad key, bad request) fails the route immediately.
pub fn is_transient(err: &SynapseError) -> bool {
    match err {
        SynapseError::RateLimited { .. } => true,
        SynapseError::GeneratorFailure(msg) => match http_status(msg) {
            Some(status) => status == 429 || status >= 500,
            None => msg.contains("timed out") || msg.contains("connection"),
        },
        _ => false,
    }
}

/// A provider plus the model name it should be asked for.
struct Route {
    provider: Arc<dyn LlmProvider>,
    model: String,
}

/// Picks a provider for a model string and drives the request through it,
/// falling back to a second model when the first route gives up.
#[derive(Clone, Default)]
pub struct ModelRouter {
    providers: Vec<Arc<dyn LlmProvider>>,
    retry: RetryPolicy,
}

impl ModelRouter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Override the retry schedule.
    pub fn with_retry_policy(mut self, max_retries: u32, base_delay: Duration) -> Self {
        self.retry = RetryPolicy {
            max_retries,
            base_delay,
        };
        self
    }

    pub fn add_provider(&mut self, provider: Arc<dyn LlmProvider>) {
        info!(provider = provider.name(), "registered LLM provider");
        self.providers.push(provider);
    }

    pub fn has_providers(&self) -> bool {
        !self.providers.is_empty()
    }

    pub fn provider_names(&self) -> Vec<String> {
        self.providers.iter().map(|p| p.name().to_string()).collect()
    }

    /// `provider/model` selects by provider name; a bare model name matches
    /// whichever provider lists it.
    fn route(&self, model: &str) -> Option<Route> {
        let by_prefix = model.split_once('/').and_then(|(prefix, name)| {
            self.providers
                .iter()
                .find(|p| p.name().eq_ignore_ascii_case(prefix))
                .map(|p| Route {
                    provider: Arc::clone(p),
                    model: name.to_string(),
                })
        });
        by_prefix.or_else(|| {
            self.providers
                .iter()
                .find(|p| p.models().iter().any(|m| m == model))
                .map(|p| Route {
                    provider: Arc::clone(p),
                    model: model.to_string(),
                })
        })
    }

    /// Complete `request` on its model, then on `fallback_model` if the
    /// primary route is missing or fails. The last route's error is returned.
    pub async fn complete(
        &self,
        request: &LlmRequest,
        fallback_model: Option<&str>,
    ) -> Result<LlmResponse> {
        let candidates = std::iter::once(request.model.as_str())
            .chain(fallback_model.filter(|m| *m != request.model));

        let mut last_err = None;
        for model in candidates {
            let Some(route) = self.route(model) else {
                debug!(model, "no provider serves model");
                continue;
            };
            match self.attempt(&route, request).await {
                Ok(resp) => return Ok(resp),
                Err(e) => {
                    warn!(provider = route.provider.name(), model, error = %e, "route failed");
                    last_err = Some(e);
                }
            }
        }

        Err(last_err.unwrap_or_else(|| {
            SynapseError::GeneratorUnavailable(format!(
                "no provider available for model '{}'",
                request.model
            ))
        }))
    }

    async fn attempt(&self, route: &Route, request: &LlmRequest) -> Result<LlmResponse> {
        let mut req = request.clone();
        req.model = route.model.clone();

        let mut attempt = 0;
        loop {
            match route.provider.complete(&req).await {
                Ok(resp) => return Ok(resp),
                Err(e) if attempt < self.retry.max_retries && is_transient(&e) => {
                    let delay = self.retry.delay(attempt, &e);
                    warn!(
                        provider = route.provider.name(),
                        attempt = attempt + 1,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "transient provider error, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}
