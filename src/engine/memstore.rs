use std::collections::HashMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::engine::persistence::{Collection, SCHEMA_VERSION};
use crate::engine::Persistence;
use crate::model::FileRecord;
use crate::{now_millis, Error, MetaStore, RecordReader, RecordWriter, Result};

#[derive(Default)]
struct State {
    files: HashMap<String, FileRecord>,
    updated_at: Option<i64>,
}

/// In-memory file collection with optional write-through persistence.
///
/// Writers are serialised by `write_lock`, which is held across the disk write
/// so the newest snapshot is always the one left on disk. Readers only take
/// the `RwLock` and never wait on I/O.
pub struct MemStore {
    state: RwLock<State>,
    meta: RwLock<HashMap<String, String>>,
    persistence: Option<Arc<Persistence>>,
    write_lock: Mutex<()>,
}

impl MemStore {
    pub fn new(
        initial: Collection,
        meta: HashMap<String, String>,
        persistence: Option<Arc<Persistence>>,
    ) -> Self {
        Self {
            state: RwLock::new(State {
                files: initial.files,
                updated_at: initial.updated_at,
            }),
            meta: RwLock::new(meta),
            persistence,
            write_lock: Mutex::new(()),
        }
    }

    /// A store with no backing files, used by tests and embedders.
    pub fn in_memory() -> Self {
        Self::new(Collection::default(), HashMap::new(), None)
    }

    /// Loads everything the persistence layer holds and writes through to it.
    pub fn load(persistence: Arc<Persistence>) -> Result<Self> {
        let collection = persistence.load_collection()?;
        let meta = persistence.load_meta()?;
        Ok(Self::new(collection, meta, Some(persistence)))
    }

    fn read_state(&self) -> Result<RwLockReadGuard<'_, State>> {
        self.state
            .read()
            .map_err(|_| Error::Internal("store lock poisoned".to_string()))
    }

    fn write_state(&self) -> Result<RwLockWriteGuard<'_, State>> {
        self.state
            .write()
            .map_err(|_| Error::Internal("store lock poisoned".to_string()))
    }

    fn snapshot(&self) -> Result<Collection> {
        let state = self.read_state()?;
        Ok(Collection {
            version: SCHEMA_VERSION,
            updated_at: state.updated_at,
            files: state.files.clone(),
        })
    }

    // Callers must hold `write_lock`.
    async fn persist_files(&self) -> Result<()> {
        if let Some(p) = &self.persistence {
            let collection = self.snapshot()?;
            let p = p.clone();
            tokio::task::spawn_blocking(move || p.save_collection(&collection))
                .await
                .map_err(|e| Error::Internal(e.to_string()))??;
        }
        Ok(())
    }

    async fn persist_meta(&self) -> Result<()> {
        if let Some(p) = &self.persistence {
            let meta = self
                .meta
                .read()
                .map_err(|_| Error::Internal("meta lock poisoned".to_string()))?
                .clone();
            let p = p.clone();
            tokio::task::spawn_blocking(move || p.save_meta(&meta))
                .await
                .map_err(|e| Error::Internal(e.to_string()))??;
        }
        Ok(())
    }
}

#[async_trait]
impl RecordReader for MemStore {
    async fn list_all(&self) -> Result<Vec<FileRecord>> {
        let state = self.read_state()?;
        Ok(state.files.values().cloned().collect())
    }

    async fn get(&self, id: &str) -> Result<Option<FileRecord>> {
        let state = self.read_state()?;
        Ok(state.files.get(id).cloned())
    }

    async fn updated_at(&self) -> Result<Option<i64>> {
        Ok(self.read_state()?.updated_at)
    }
}

#[async_trait]
impl RecordWriter for MemStore {
    async fn put(&self, record: FileRecord) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        {
            let mut state = self.write_state()?;
            state.files.insert(record.id.clone(), record);
            state.updated_at = Some(now_millis());
        }
        self.persist_files().await
    }

    async fn delete(&self, id: &str) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        let removed = {
            let mut state = self.write_state()?;
            let removed = state.files.remove(id).is_some();
            if removed {
                state.updated_at = Some(now_millis());
            }
            removed
        };
        if removed {
            self.persist_files().await?;
        }
        Ok(())
    }

    async fn clear(&self) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        {
            let mut state = self.write_state()?;
            state.files.clear();
            state.updated_at = Some(now_millis());
        }
        self.persist_files().await
    }
}

#[async_trait]
impl MetaStore for MemStore {
    async fn get_meta(&self, key: &str) -> Result<Option<String>> {
        let meta = self
            .meta
            .read()
            .map_err(|_| Error::Internal("meta lock poisoned".to_string()))?;
        Ok(meta.get(key).cloned())
    }

    async fn set_meta(&self, key: &str, value: &str) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        {
            let mut meta = self
                .meta
                .write()
                .map_err(|_| Error::Internal("meta lock poisoned".to_string()))?;
            meta.insert(key.to_string(), value.to_string());
        }
        self.persist_meta().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn record(id: &str, size: u64) -> FileRecord {
        FileRecord {
            id: id.to_string(),
            name: format!("{}.bin", id),
            media_type: "application/octet-stream".to_string(),
            size_bytes: size,
            last_modified: 0,
            content: None,
            path: None,
        }
    }

    #[tokio::test]
    async fn test_memstore_put_get() {
        let store = MemStore::in_memory();
        store.put(record("a", 1)).await.unwrap();

        assert_eq!(store.get("a").await.unwrap(), Some(record("a", 1)));
        assert_eq!(store.get("missing").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_put_replaces_whole_record() {
        let store = MemStore::in_memory();
        store.put(record("a", 1)).await.unwrap();
        let mut replacement = record("a", 9);
        replacement.name = "renamed".to_string();
        store.put(replacement.clone()).await.unwrap();

        assert_eq!(store.list_all().await.unwrap(), vec![replacement]);
    }

    #[tokio::test]
    async fn test_delete_missing_is_noop() {
        let store = MemStore::in_memory();
        store.delete("nope").await.unwrap();
        assert_eq!(store.updated_at().await.unwrap(), None);

        store.put(record("a", 1)).await.unwrap();
        store.delete("a").await.unwrap();
        assert!(store.get("a").await.unwrap().is_none());
        assert!(store.updated_at().await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_clear() {
        let store = MemStore::in_memory();
        store.put(record("a", 1)).await.unwrap();
        store.put(record("b", 2)).await.unwrap();
        store.clear().await.unwrap();
        assert!(store.list_all().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_meta_roundtrip() {
        let store = MemStore::in_memory();
        assert_eq!(store.get_meta("k").await.unwrap(), None);
        store.set_meta("k", "v").await.unwrap();
        assert_eq!(store.get_meta("k").await.unwrap(), Some("v".to_string()));
    }

    #[tokio::test]
    async fn test_writes_reach_disk() {
        let dir = tempdir().unwrap();
        let persistence = Arc::new(Persistence::new(dir.path()).unwrap());
        let store = MemStore::load(persistence.clone()).unwrap();

        store.put(record("a", 3)).await.unwrap();
        store.put(record("b", 4)).await.unwrap();
        store.delete("a").await.unwrap();
        store.set_meta("key", "secret").await.unwrap();

        let reloaded = MemStore::load(persistence).unwrap();
        let files = reloaded.list_all().await.unwrap();
        assert_eq!(files, vec![record("b", 4)]);
        assert_eq!(reloaded.get_meta("key").await.unwrap(), Some("secret".to_string()));
        assert_eq!(reloaded.updated_at().await.unwrap(), store.updated_at().await.unwrap());
    }

    #[tokio::test]
    async fn test_concurrent_puts_all_land() {
        let dir = tempdir().unwrap();
        let persistence = Arc::new(Persistence::new(dir.path()).unwrap());
        let store = Arc::new(MemStore::load(persistence.clone()).unwrap());

        let writes = (0..20).map(|i| {
            let store = store.clone();
            async move { store.put(record(&format!("f{}", i), i)).await }
        });
        for res in futures::future::join_all(writes).await {
            res.unwrap();
        }

        let reloaded = MemStore::load(persistence).unwrap();
        assert_eq!(reloaded.list_all().await.unwrap().len(), 20);
    }
}
