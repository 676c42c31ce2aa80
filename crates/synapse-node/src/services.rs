use std::sync::Arc;
use std::time::Duration;
use synapse_llm::Generator;
use synapse_mesh::{MeshRegistry, RelayClient};
use synapse_store::KvStore;

/// Tunables shared by every node actor in a process.
#[derive(Debug, Clone)]
pub struct NodeSettings {
    /// Conversation turns kept per node.
    pub history_limit: usize,
    pub generator_timeout: Duration,
    pub relay_timeout: Duration,
    /// Put a node in the registry the first time it is hydrated.
    pub auto_register: bool,
}

impl Default for NodeSettings {
    fn default() -> Self {
        Self {
            history_limit: 20,
            generator_timeout: Duration::from_secs(30),
            relay_timeout: Duration::from_secs(45),
            auto_register: true,
        }
    }
}

/// Collaborators every actor reaches through.
pub struct NodeServices {
    pub store: Arc<dyn KvStore>,
    pub registry: Arc<MeshRegistry>,
    pub relay: RelayClient,
    pub generator: Option<Arc<dyn Generator>>,
    pub settings: NodeSettings,
}
