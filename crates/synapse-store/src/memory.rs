use async_trait::async_trait;
use dashmap::DashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use synapse_core::{Result, SynapseError};

use crate::kv::KvStore;

/// In-process store. State disappears with the process.
///
/// Writes can be switched to fail on demand, which lets callers exercise
/// their rollback paths.
#[derive(Default)]
pub struct MemoryKv {
    entries: DashMap<(String, String), String>,
    fail_writes: AtomicBool,
    writes: AtomicU64,
}

impl MemoryKv {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent `put` fail (or succeed again).
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Number of successful writes so far.
    pub fn write_count(&self) -> u64 {
        self.writes.load(Ordering::SeqCst)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[async_trait]
impl KvStore for MemoryKv {
    fn name(&self) -> &str {
        "memory"
    }

    async fn get(&self, namespace: &str, key: &str) -> Result<Option<String>> {
        Ok(self
            .entries
            .get(&(namespace.to_string(), key.to_string()))
            .map(|v| v.value().clone()))
    }

    async fn put(&self, namespace: &str, key: &str, value: String) -> Result<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(SynapseError::StorageError(format!(
                "write to {namespace}/{key} rejected"
            )));
        }
        self.entries
            .insert((namespace.to_string(), key.to_string()), value);
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
