use async_trait::async_trait;
use serde::Serialize;
use serde::de::DeserializeOwned;
use synapse_core::{Result, SynapseError};

/// Well-known namespace holding mesh-wide records such as the registry.
pub const GLOBAL_NAMESPACE: &str = "global";

/// Keys an actor stores under its own namespace.
pub mod keys {
    pub const CONFIG: &str = "config";
    pub const FS: &str = "fs";
    pub const STATS: &str = "stats";
    pub const REGISTRY: &str = "registry";
}

/// Durable string key-value store partitioned by namespace.
///
/// Every node actor reads and writes only its own namespace (its id); the
/// registry lives under [`GLOBAL_NAMESPACE`]. Values are JSON documents.
#[async_trait]
pub trait KvStore: Send + Sync {
    /// Backend name, for logs and diagnostics.
    fn name(&self) -> &str;

    async fn get(&self, namespace: &str, key: &str) -> Result<Option<String>>;

    async fn put(&self, namespace: &str, key: &str, value: String) -> Result<()>;
}

/// Read a JSON value. A stored value that no longer parses is reported as a
/// storage error rather than silently replaced.
pub async fn get_json<T: DeserializeOwned>(
    store: &dyn KvStore,
    namespace: &str,
    key: &str,
) -> Result<Option<T>> {
    match store.get(namespace, key).await? {
        Some(raw) => serde_json::from_str(&raw).map(Some).map_err(|e| {
            SynapseError::StorageError(format!("corrupt value at {namespace}/{key}: {e}"))
        }),
        None => Ok(None),
    }
}

/// Serialize `value` as JSON and store it.
pub async fn put_json<T: Serialize + ?Sized>(
    store: &dyn KvStore,
    namespace: &str,
    key: &str,
    value: &T,
) -> Result<()> {
    let raw = serde_json::to_string(value)?;
    store.put(namespace, key, raw).await
}
