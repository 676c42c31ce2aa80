//! # synapse-llm
//!
//! Fallback text generation for node actors. Free-form terminal input that is
//! neither a relay nor a builtin goes through a [`Generator`]; the default one
//! routes to Anthropic or OpenAI-compatible providers with retry and failover.

pub mod anthropic;
pub mod generator;
pub mod mock;
pub mod openai;
pub mod provider;
pub mod router;

pub use generator::{GenerationSettings, Generator, RoutedGenerator};
pub use mock::{MockProvider, MockResponse};
pub use provider::{LlmProvider, LlmRequest, LlmResponse, StopReason, Usage};
pub use router::{ModelRouter, RetryPolicy};
