use async_trait::async_trait;
use dashmap::DashMap;
use std::sync::{Arc, Weak};
use synapse_core::{ActorId, ExecuteRequest, Result, SynapseError};
use synapse_llm::Generator;
use synapse_mesh::{MeshRegistry, RelayClient, RelayTransport};
use synapse_store::KvStore;
use tracing::debug;

use crate::actor::NodeActor;
use crate::services::{NodeServices, NodeSettings};

/// How relayed calls reach their target.
pub enum RelayRoute {
    /// Straight into an actor of the same process.
    Local,
    /// Through another transport, typically HTTP to a peer process.
    Remote(Arc<dyn RelayTransport>),
}

/// Lazily created actors, one per id. Looking up an id always yields the
/// same actor for the lifetime of the directory.
pub struct ActorDirectory {
    actors: DashMap<ActorId, Arc<NodeActor>>,
    services: Arc<NodeServices>,
}

impl ActorDirectory {
    pub fn new(
        store: Arc<dyn KvStore>,
        registry: Arc<MeshRegistry>,
        generator: Option<Arc<dyn Generator>>,
        settings: NodeSettings,
        route: RelayRoute,
    ) -> Arc<Self> {
        Arc::new_cyclic(|weak: &Weak<ActorDirectory>| {
            let transport: Arc<dyn RelayTransport> = match route {
                RelayRoute::Local => Arc::new(LocalRelay {
                    directory: weak.clone(),
                }),
                RelayRoute::Remote(transport) => transport,
            };
            let relay = RelayClient::new(registry.clone(), transport, settings.relay_timeout);
            Self {
                actors: DashMap::new(),
                services: Arc::new(NodeServices {
                    store,
                    registry,
                    relay,
                    generator,
                    settings,
                }),
            }
        })
    }

    /// The actor for `id`, created on first use. Persisted state is loaded
    /// by the actor's first operation.
    pub fn get_or_create(&self, id: &ActorId) -> Arc<NodeActor> {
        self.actors
            .entry(id.clone())
            .or_insert_with(|| {
                debug!(actor = %id, "actor created");
                Arc::new(NodeActor::new(id.clone(), self.services.clone()))
            })
            .value()
            .clone()
    }

    pub fn get(&self, id: &ActorId) -> Option<Arc<NodeActor>> {
        self.actors.get(id).map(|a| a.value().clone())
    }

    /// Actors instantiated so far.
    pub fn len(&self) -> usize {
        self.actors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actors.is_empty()
    }

    pub fn services(&self) -> &Arc<NodeServices> {
        &self.services
    }

    pub fn registry(&self) -> &Arc<MeshRegistry> {
        &self.services.registry
    }
}

/// In-process transport: the target actor's `execute` is called directly.
pub struct LocalRelay {
    directory: Weak<ActorDirectory>,
}

#[async_trait]
impl RelayTransport for LocalRelay {
    fn name(&self) -> &str {
        "local"
    }

    async fn execute(&self, target: &ActorId, request: ExecuteRequest) -> Result<String> {
        let directory = self
            .directory
            .upgrade()
            .ok_or_else(|| SynapseError::unreachable(target.as_str(), "actor directory is gone"))?;
        let actor = directory.get_or_create(target);
        actor.execute(request).await
    }
}
