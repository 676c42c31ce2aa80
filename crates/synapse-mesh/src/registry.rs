use chrono::Utc;
use std::sync::Arc;
use synapse_core::{ActorId, Persona, RegisterRequest, RegistryEntry, Result};
use synapse_store::{GLOBAL_NAMESPACE, KvStore, get_json, keys, put_json};
use tokio::sync::Mutex;
use tracing::{debug, info};

/// Directory of known nodes, kept in the `global` namespace of the store.
///
/// Entries are ordered by first registration. Registering an id again
/// refreshes its display name and persona in place; `createdAt` and the
/// position are kept. Nothing is ever removed.
pub struct MeshRegistry {
    store: Arc<dyn KvStore>,
    /// Serializes read-modify-write cycles on the registry key.
    lock: Mutex<()>,
}

impl MeshRegistry {
    pub fn new(store: Arc<dyn KvStore>) -> Self {
        Self {
            store,
            lock: Mutex::new(()),
        }
    }

    async fn load(&self) -> Result<Vec<RegistryEntry>> {
        Ok(get_json(&*self.store, GLOBAL_NAMESPACE, keys::REGISTRY)
            .await?
            .unwrap_or_default())
    }

    /// Add `entry`, or refresh the existing entry with the same id.
    /// Returns the stored entry.
    pub async fn register(&self, entry: RegistryEntry) -> Result<RegistryEntry> {
        let _guard = self.lock.lock().await;
        let mut entries = self.load().await?;

        let stored = match entries.iter_mut().find(|e| e.id == entry.id) {
            Some(existing) => {
                existing.display_name = entry.display_name;
                existing.persona = entry.persona;
                debug!(node = %existing.id, "registry entry refreshed");
                existing.clone()
            }
            None => {
                info!(node = %entry.id, persona = %entry.persona, "node registered");
                entries.push(entry.clone());
                entry
            }
        };

        put_json(&*self.store, GLOBAL_NAMESPACE, keys::REGISTRY, &entries).await?;
        Ok(stored)
    }

    /// Validate a wire request and register it.
    pub async fn register_request(&self, request: RegisterRequest) -> Result<RegistryEntry> {
        let entry = request.into_entry(Utc::now())?;
        self.register(entry).await
    }

    /// Register `id` with the given name and persona, stamped now.
    pub async fn upsert(
        &self,
        id: &ActorId,
        display_name: &str,
        persona: Persona,
    ) -> Result<RegistryEntry> {
        self.register(RegistryEntry {
            id: id.clone(),
            display_name: display_name.to_string(),
            persona,
            created_at: Utc::now(),
        })
        .await
    }

    /// All entries in registration order.
    pub async fn list_nodes(&self) -> Result<Vec<RegistryEntry>> {
        let _guard = self.lock.lock().await;
        self.load().await
    }

    /// Exact id lookup.
    pub async fn get(&self, id: &ActorId) -> Result<Option<RegistryEntry>> {
        Ok(self.list_nodes().await?.into_iter().find(|e| &e.id == id))
    }

    /// Find a node by id, or by display name ignoring case.
    pub async fn resolve(&self, name: &str) -> Result<Option<RegistryEntry>> {
        let entries = self.list_nodes().await?;
        if let Some(entry) = entries.iter().find(|e| e.id.as_str() == name) {
            return Ok(Some(entry.clone()));
        }
        Ok(entries.into_iter().find(|e| {
            e.display_name.eq_ignore_ascii_case(name) || e.id.as_str().eq_ignore_ascii_case(name)
        }))
    }
}
