#[cfg(test)]
mod tests {
    use serde::{Deserialize, Serialize};
    use synapse_store::*;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Doc {
        name: String,
        count: u32,
    }

    // ── MemoryKv ───────────────────────────────────────────────

    mod memory {
        use super::*;

        #[tokio::test]
        async fn test_get_missing_is_none() {
            let kv = MemoryKv::new();
            assert_eq!(kv.get("alice", "config").await.unwrap(), None);
        }

        #[tokio::test]
        async fn test_put_then_get() {
            let kv = MemoryKv::new();
            kv.put("alice", "config", "{}".into()).await.unwrap();
            assert_eq!(kv.get("alice", "config").await.unwrap().as_deref(), Some("{}"));
            assert_eq!(kv.write_count(), 1);
        }

        #[tokio::test]
        async fn test_namespaces_are_isolated() {
            let kv = MemoryKv::new();
            kv.put("alice", "fs", "a".into()).await.unwrap();
            kv.put("bob", "fs", "b".into()).await.unwrap();
            assert_eq!(kv.get("alice", "fs").await.unwrap().as_deref(), Some("a"));
            assert_eq!(kv.get("bob", "fs").await.unwrap().as_deref(), Some("b"));
            assert_eq!(kv.len(), 2);
        }

        #[tokio::test]
        async fn test_failing_writes_leave_old_value() {
            let kv = MemoryKv::new();
            kv.put("alice", "fs", "old".into()).await.unwrap();
            kv.set_fail_writes(true);
            let err = kv.put("alice", "fs", "new".into()).await.unwrap_err();
            assert_eq!(err.kind(), "StorageError");
            assert_eq!(kv.get("alice", "fs").await.unwrap().as_deref(), Some("old"));

            kv.set_fail_writes(false);
            kv.put("alice", "fs", "new".into()).await.unwrap();
            assert_eq!(kv.get("alice", "fs").await.unwrap().as_deref(), Some("new"));
        }

        #[tokio::test]
        async fn test_json_helpers() {
            let kv = MemoryKv::new();
            let doc = Doc {
                name: "manifest".into(),
                count: 3,
            };
            put_json(&kv, "alice", "doc", &doc).await.unwrap();
            let back: Option<Doc> = get_json(&kv, "alice", "doc").await.unwrap();
            assert_eq!(back, Some(doc));
        }

        #[tokio::test]
        async fn test_corrupt_json_is_storage_error() {
            let kv = MemoryKv::new();
            kv.put("alice", "doc", "not json".into()).await.unwrap();
            let err = get_json::<Doc>(&kv, "alice", "doc").await.unwrap_err();
            assert_eq!(err.kind(), "StorageError");
        }
    }

    // ── SqliteKv ───────────────────────────────────────────────

    mod sqlite {
        use super::*;

        #[tokio::test]
        async fn test_upsert_overwrites() {
            let kv = SqliteKv::open_in_memory().unwrap();
            kv.put("alice", "config", "1".into()).await.unwrap();
            kv.put("alice", "config", "2".into()).await.unwrap();
            assert_eq!(kv.get("alice", "config").await.unwrap().as_deref(), Some("2"));
        }

        #[tokio::test]
        async fn test_persists_across_reopen() {
            let dir = tempfile::tempdir().unwrap();
            let db_path = dir.path().join("synapse.db");
            {
                let kv = SqliteKv::open(&db_path).unwrap();
                put_json(&kv, "bob", "doc", &Doc { name: "x".into(), count: 9 })
                    .await
                    .unwrap();
            }
            let kv = SqliteKv::open(&db_path).unwrap();
            let doc: Doc = get_json(&kv, "bob", "doc").await.unwrap().unwrap();
            assert_eq!(doc.count, 9);
        }

        #[tokio::test]
        async fn test_namespaces_listing() {
            let kv = SqliteKv::open_in_memory().unwrap();
            kv.put("bob", "fs", "[]".into()).await.unwrap();
            kv.put(GLOBAL_NAMESPACE, keys::REGISTRY, "[]".into())
                .await
                .unwrap();
            kv.put("alice", "fs", "[]".into()).await.unwrap();
            assert_eq!(kv.namespaces().unwrap(), vec!["alice", "bob", "global"]);
        }

        #[tokio::test]
        async fn test_missing_key_is_none() {
            let kv = SqliteKv::open_in_memory().unwrap();
            assert!(kv.get("nobody", "config").await.unwrap().is_none());
            assert_eq!(kv.name(), "sqlite");
        }
    }
}
