//! # synapse-config
//!
//! Process configuration for the Synapse server and CLI. Reads `synapse.toml`,
//! then applies environment overrides, then validates.

pub mod loader;
pub mod schema;

pub use loader::ConfigLoader;
pub use schema::SynapseConfig;
pub use schema::{
    ConfigWarning, GeneratorConfig, LoggingConfig, MeshConfig, RelayConfig, RelayMode,
    ServerConfig, ServicesConfig, StoreBackend, StoreConfig, WarningSeverity,
};
