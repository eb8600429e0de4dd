use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use log::info;
use tokio::sync::OnceCell;

use crate::engine::{MemStore, Persistence};
use crate::model::FileRecord;
use crate::{MetaStore, RecordReader, RecordWriter, Result};

/// A durable store that opens its data directory on first use.
///
/// The directory, the empty collection and the in-memory index are set up
/// exactly once per `Database`; every later call reuses the same handle.
pub struct Database {
    data_dir: PathBuf,
    handle: OnceCell<Arc<MemStore>>,
}

impl Database {
    pub fn new<P: AsRef<Path>>(data_dir: P) -> Self {
        Self {
            data_dir: data_dir.as_ref().to_path_buf(),
            handle: OnceCell::new(),
        }
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    pub fn is_open(&self) -> bool {
        self.handle.initialized()
    }

    /// Returns the open engine, establishing it on the first call.
    pub async fn handle(&self) -> Result<Arc<MemStore>> {
        let store = self
            .handle
            .get_or_try_init(|| async {
                let dir = self.data_dir.clone();
                let store = tokio::task::spawn_blocking(move || -> Result<MemStore> {
                    let persistence = Arc::new(Persistence::new(&dir)?);
                    MemStore::load(persistence)
                })
                .await
                .map_err(|e| crate::Error::Internal(e.to_string()))??;
                info!("Opened file store at {:?}", self.data_dir);
                Ok::<_, crate::Error>(Arc::new(store))
            })
            .await?;
        Ok(store.clone())
    }
}

#[async_trait]
impl RecordReader for Database {
    async fn list_all(&self) -> Result<Vec<FileRecord>> {
        self.handle().await?.list_all().await
    }

    async fn get(&self, id: &str) -> Result<Option<FileRecord>> {
        self.handle().await?.get(id).await
    }

    async fn updated_at(&self) -> Result<Option<i64>> {
        self.handle().await?.updated_at().await
    }
}

#[async_trait]
impl RecordWriter for Database {
    async fn put(&self, record: FileRecord) -> Result<()> {
        self.handle().await?.put(record).await
    }

    async fn delete(&self, id: &str) -> Result<()> {
        self.handle().await?.delete(id).await
    }

    async fn clear(&self) -> Result<()> {
        self.handle().await?.clear().await
    }
}

#[async_trait]
impl MetaStore for Database {
    async fn get_meta(&self, key: &str) -> Result<Option<String>> {
        self.handle().await?.get_meta(key).await
    }

    async fn set_meta(&self, key: &str, value: &str) -> Result<()> {
        self.handle().await?.set_meta(key, value).await
    }
}
