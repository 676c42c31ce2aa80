use async_trait::async_trait;
use parking_lot::Mutex;
use rusqlite::{Connection, OptionalExtension};
use std::path::Path;
use std::sync::Arc;
use synapse_core::{Result, SynapseError};
use tracing::{debug, info};

use crate::kv::KvStore;

fn storage_err(e: rusqlite::Error) -> SynapseError {
    SynapseError::StorageError(e.to_string())
}

/// SQLite-backed store: one `kv` table keyed by (namespace, key).
pub struct SqliteKv {
    db: Arc<Mutex<Connection>>,
}

impl SqliteKv {
    /// Open or create the database at the given path.
    pub fn open(path: &Path) -> Result<Self> {
        info!(?path, "opening kv store");

        let conn = Connection::open(path).map_err(storage_err)?;

        // Enable WAL mode for concurrent reads
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL;")
            .map_err(storage_err)?;

        conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS kv (
                namespace TEXT NOT NULL,
                key TEXT NOT NULL,
                value TEXT NOT NULL,
                updated_at TEXT NOT NULL,
                PRIMARY KEY (namespace, key)
            );
            ",
        )
        .map_err(storage_err)?;

        Ok(Self {
            db: Arc::new(Mutex::new(conn)),
        })
    }

    /// Open an in-memory database (for tests).
    pub fn open_in_memory() -> Result<Self> {
        Self::open(Path::new(":memory:"))
    }

    /// Namespaces that hold at least one key, sorted.
    pub fn namespaces(&self) -> Result<Vec<String>> {
        let db = self.db.lock();
        let mut stmt = db
            .prepare("SELECT DISTINCT namespace FROM kv ORDER BY namespace")
            .map_err(storage_err)?;
        let rows = stmt
            .query_map([], |row| row.get::<_, String>(0))
            .map_err(storage_err)?
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(storage_err)?;
        Ok(rows)
    }
}

#[async_trait]
impl KvStore for SqliteKv {
    fn name(&self) -> &str {
        "sqlite"
    }

    async fn get(&self, namespace: &str, key: &str) -> Result<Option<String>> {
        let db = self.db.lock();
        db.query_row(
            "SELECT value FROM kv WHERE namespace = ?1 AND key = ?2",
            rusqlite::params![namespace, key],
            |row| row.get::<_, String>(0),
        )
        .optional()
        .map_err(storage_err)
    }

    async fn put(&self, namespace: &str, key: &str, value: String) -> Result<()> {
        let db = self.db.lock();
        let now = chrono::Utc::now().to_rfc3339();
        db.execute(
            "INSERT INTO kv (namespace, key, value, updated_at) VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(namespace, key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
            rusqlite::params![namespace, key, value, now],
        )
        .map_err(storage_err)?;
        debug!(namespace, key, "persisted");
        Ok(())
    }
}
