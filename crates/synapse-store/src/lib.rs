//! # synapse-store
//!
//! Durable state for Synapse nodes. Each node keeps its config, virtual
//! filesystem and counters under its own namespace; the mesh registry lives
//! in the `global` namespace.

pub mod kv;
pub mod memory;
pub mod sqlite;

pub use kv::{GLOBAL_NAMESPACE, KvStore, get_json, keys, put_json};
pub use memory::MemoryKv;
pub use sqlite::SqliteKv;
