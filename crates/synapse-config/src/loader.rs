use parking_lot::RwLock;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use synapse_core::SynapseError;
use tracing::{info, warn};

use crate::schema::SynapseConfig;

/// Loads the Synapse configuration and keeps a shared snapshot of it.
pub struct ConfigLoader {
    config: Arc<RwLock<SynapseConfig>>,
    config_path: PathBuf,
}

impl ConfigLoader {
    /// Resolve the config path: explicit path > SYNAPSE_CONFIG env > ~/.synapse/synapse.toml
    pub fn resolve_path(explicit: Option<&Path>) -> PathBuf {
        if let Some(p) = explicit {
            return p.to_path_buf();
        }
        if let Ok(p) = std::env::var("SYNAPSE_CONFIG") {
            return PathBuf::from(p);
        }
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".synapse")
            .join("synapse.toml")
    }

    /// Load the config from disk, falling back to defaults.
    pub fn load(path: Option<&Path>) -> synapse_core::Result<Self> {
        let config_path = Self::resolve_path(path);
        let config = if config_path.exists() {
            info!(?config_path, "loading configuration");
            Self::parse_file(&config_path)?
        } else {
            warn!(?config_path, "config file not found, using defaults");
            SynapseConfig::default()
        };

        let config = Self::apply_env_overrides(config);

        match config.validate() {
            Ok(warnings) => {
                for w in &warnings {
                    warn!("{}", w);
                }
            }
            Err(e) => {
                return Err(SynapseError::Config(e));
            }
        }

        Ok(Self {
            config: Arc::new(RwLock::new(config)),
            config_path,
        })
    }

    /// Build a loader around an in-memory config (tests, embedding).
    pub fn from_config(config: SynapseConfig) -> Self {
        Self {
            config: Arc::new(RwLock::new(config)),
            config_path: PathBuf::new(),
        }
    }

    /// Get a read snapshot of the current config.
    pub fn get(&self) -> SynapseConfig {
        self.config.read().clone()
    }

    /// Get a shared reference for subscription.
    pub fn shared(&self) -> Arc<RwLock<SynapseConfig>> {
        Arc::clone(&self.config)
    }

    /// Path the config was loaded from.
    pub fn path(&self) -> &Path {
        &self.config_path
    }

    /// The SQLite path with relative paths anchored next to the config file.
    pub fn db_path(&self) -> PathBuf {
        let db_path = self.config.read().store.db_path.clone();
        if db_path.is_absolute() {
            return db_path;
        }
        match self.config_path.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir.join(db_path),
            _ => db_path,
        }
    }

    /// Reload the config from disk. The current config is kept when the file
    /// fails to parse or validate.
    pub fn reload(&self) -> synapse_core::Result<()> {
        if !self.config_path.exists() {
            return Err(SynapseError::Config(format!(
                "config file not found: {}",
                self.config_path.display()
            )));
        }
        let new_config = Self::apply_env_overrides(Self::parse_file(&self.config_path)?);
        new_config.validate().map_err(SynapseError::Config)?;
        *self.config.write() = new_config;
        info!("configuration reloaded");
        Ok(())
    }

    fn parse_file(path: &Path) -> synapse_core::Result<SynapseConfig> {
        let raw = std::fs::read_to_string(path)?;
        toml::from_str::<SynapseConfig>(&raw).map_err(|e| {
            SynapseError::Config(format!("failed to parse {}: {}", path.display(), e))
        })
    }

    /// Apply env var overrides (SYNAPSE_SERVER_LISTEN, SYNAPSE_LOG_LEVEL, etc.)
    fn apply_env_overrides(mut config: SynapseConfig) -> SynapseConfig {
        if let Ok(v) = std::env::var("SYNAPSE_SERVER_LISTEN") {
            config.server.listen = v;
        }
        if let Ok(v) = std::env::var("SYNAPSE_LOG_LEVEL") {
            config.logging.level = v;
        }
        if let Ok(v) = std::env::var("SYNAPSE_GENERATOR_MODEL") {
            config.generator.model = v;
        }
        if let Ok(v) = std::env::var("SYNAPSE_RELAY_BASE_URL") {
            config.relay.base_url = Some(v);
        }
        // API keys: config file takes priority, env is the fallback.
        if config.services.anthropic_api_key.is_none()
            && let Ok(v) = std::env::var("ANTHROPIC_API_KEY")
        {
            config.services.anthropic_api_key = Some(v);
        }
        if config.services.openai_api_key.is_none()
            && let Ok(v) = std::env::var("OPENAI_API_KEY")
        {
            config.services.openai_api_key = Some(v);
        }
        config
    }
}
