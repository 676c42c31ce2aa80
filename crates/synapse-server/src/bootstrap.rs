//! Wiring a running mesh out of a [`SynapseConfig`].

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use synapse_config::{RelayMode, StoreBackend, SynapseConfig};
use synapse_core::{Result, SynapseError};
use synapse_llm::anthropic::AnthropicProvider;
use synapse_llm::openai::OpenAiProvider;
use synapse_llm::{GenerationSettings, Generator, MockProvider, ModelRouter, RoutedGenerator};
use synapse_mesh::{HttpRelay, MeshRegistry};
use synapse_node::{ActorDirectory, NodeSettings, RelayRoute};
use synapse_store::{KvStore, MemoryKv, SqliteKv};
use tracing::{info, warn};

/// Open the configured key-value store. `db_path` is already resolved.
pub fn open_store(config: &SynapseConfig, db_path: &Path) -> Result<Arc<dyn KvStore>> {
    let store: Arc<dyn KvStore> = match config.store.backend {
        StoreBackend::Sqlite => {
            if let Some(parent) = db_path.parent()
                && !parent.as_os_str().is_empty()
            {
                std::fs::create_dir_all(parent)?;
            }
            Arc::new(SqliteKv::open(db_path)?)
        }
        StoreBackend::Memory => {
            warn!("using in-memory store, node state is lost on exit");
            Arc::new(MemoryKv::new())
        }
    };
    info!(backend = store.name(), "store opened");
    Ok(store)
}

/// Build the fallback generator from the configured providers.
///
/// Config file keys take priority; env vars were already folded in by the
/// loader. A `mock/...` model always resolves to the echoing mock provider.
/// Returns `None` when no provider can serve the configured model.
pub fn build_generator(config: &SynapseConfig) -> Option<Arc<dyn Generator>> {
    let mut router = ModelRouter::new();
    if let Some(ref key) = config.services.anthropic_api_key {
        router.add_provider(Arc::new(AnthropicProvider::new(key.clone())));
    }
    if let Some(ref key) = config.services.openai_api_key {
        let provider = OpenAiProvider::new(key.clone());
        let provider = match config.services.openai_base_url {
            Some(ref url) => provider.with_base_url(url.clone(), "openai".into()),
            None => provider,
        };
        router.add_provider(Arc::new(provider));
    }
    if config.generator.model.starts_with("mock/") {
        router.add_provider(Arc::new(MockProvider::new("mock")));
    }

    if !router.has_providers() {
        warn!(
            model = %config.generator.model,
            "no LLM provider configured, free-form input will report the generator as unavailable"
        );
        return None;
    }
    info!(providers = ?router.provider_names(), model = %config.generator.model, "generator ready");

    let settings = GenerationSettings {
        model: config.generator.model.clone(),
        fallback_model: config.generator.fallback_model.clone(),
        max_tokens: config.generator.max_tokens,
        temperature: config.generator.temperature,
    };
    Some(Arc::new(RoutedGenerator::new(router, settings)))
}

pub fn node_settings(config: &SynapseConfig) -> NodeSettings {
    NodeSettings {
        history_limit: config.generator.history_limit,
        generator_timeout: Duration::from_secs(config.generator.timeout_secs),
        relay_timeout: Duration::from_secs(config.relay.timeout_secs),
        auto_register: config.mesh.auto_register,
    }
}

/// Everything a server needs: store, registry, generator and the actor
/// directory on top of them.
pub fn build_directory(config: &SynapseConfig, db_path: &Path) -> Result<Arc<ActorDirectory>> {
    let store = open_store(config, db_path)?;
    let registry = Arc::new(MeshRegistry::new(store.clone()));
    let generator = build_generator(config);

    let route = match config.relay.mode {
        RelayMode::Local => RelayRoute::Local,
        RelayMode::Http => {
            let base_url = config.relay.base_url.clone().ok_or_else(|| {
                SynapseError::Config("relay.mode = \"http\" requires relay.base_url".into())
            })?;
            info!(base_url = %base_url, "relaying over HTTP");
            RelayRoute::Remote(Arc::new(HttpRelay::new(
                base_url,
                Duration::from_secs(config.relay.timeout_secs),
            )?))
        }
    };

    Ok(ActorDirectory::new(
        store,
        registry,
        generator,
        node_settings(config),
        route,
    ))
}
