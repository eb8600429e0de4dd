//! Record operations over the file collection.
//!
//! Every operation validates the caller's key before touching the store and
//! reports failures as a crate [`Error`]; storage errors are logged and folded
//! into a fixed, caller-safe message. Turn a result into the wire envelope with
//! [`Envelope::from`](crate::model::Envelope).

use std::collections::BTreeMap;
use std::sync::Arc;

use log::error;
use uuid::Uuid;

use crate::credentials::Credentials;
use crate::model::{
    summarize_categories, CategorySummary, DeleteReceipt, FileCategory, FilePatch, FileRecord,
    NewFile, StorageStats,
};
use crate::{now_millis, Error, HavenStore, RecordReader, RecordWriter, Result};

fn failed(message: &'static str, err: Error) -> Error {
    error!("{}: {}", message, err);
    Error::Failed(message)
}

#[derive(Clone)]
pub struct FileService {
    store: Arc<dyn HavenStore>,
    credentials: Credentials,
}

impl FileService {
    pub fn new(store: Arc<dyn HavenStore>) -> Self {
        let credentials = Credentials::new(store.clone());
        Self { store, credentials }
    }

    pub fn credentials(&self) -> &Credentials {
        &self.credentials
    }

    async fn existing(&self, id: &str, message: &'static str) -> Result<FileRecord> {
        self.store
            .get(id)
            .await
            .map_err(|e| failed(message, e))?
            .ok_or(Error::FileNotFound)
    }

    pub async fn list_files(&self, token: &str) -> Result<Vec<FileRecord>> {
        self.authorize(token).await?;
        self.store
            .list_all()
            .await
            .map_err(|e| failed("Failed to retrieve files", e))
    }

    pub async fn get_file(&self, token: &str, id: &str) -> Result<FileRecord> {
        self.authorize(token).await?;
        self.existing(id, "Failed to retrieve file").await
    }

    /// Stores a new record under a freshly assigned id.
    pub async fn create_file(&self, token: &str, file: NewFile) -> Result<FileRecord> {
        self.authorize(token).await?;
        let id = self.fresh_id().await.map_err(|e| failed("Failed to save file", e))?;
        let record = file.into_record(id, now_millis());
        self.store
            .put(record.clone())
            .await
            .map_err(|e| failed("Failed to save file", e))?;
        Ok(record)
    }

    /// Upserts a record under its own id, replacing any previous version.
    pub async fn save_file(&self, token: &str, mut record: FileRecord) -> Result<FileRecord> {
        self.authorize(token).await?;
        if record.id.is_empty() {
            record.id = self.fresh_id().await.map_err(|e| failed("Failed to save file", e))?;
        }
        record.last_modified = now_millis();
        self.store
            .put(record.clone())
            .await
            .map_err(|e| failed("Failed to save file", e))?;
        Ok(record)
    }

    pub async fn update_file(&self, token: &str, id: &str, patch: FilePatch) -> Result<FileRecord> {
        self.authorize(token).await?;
        let mut record = self.existing(id, "Failed to update file").await?;
        patch.apply(&mut record, now_millis());
        self.store
            .put(record.clone())
            .await
            .map_err(|e| failed("Failed to update file", e))?;
        Ok(record)
    }

    pub async fn delete_file(&self, token: &str, id: &str) -> Result<DeleteReceipt> {
        self.authorize(token).await?;
        self.existing(id, "Failed to delete file").await?;
        self.store
            .delete(id)
            .await
            .map_err(|e| failed("Failed to delete file", e))?;
        Ok(DeleteReceipt { deleted: true })
    }

    /// Totals over the collection as it is now. `lastUpdated` is the time of
    /// the last mutation, or the current time for a store never written to.
    /// The byte total saturates at `u64::MAX`.
    pub async fn get_stats(&self, token: &str) -> Result<StorageStats> {
        self.authorize(token).await?;
        let message = "Failed to retrieve storage stats";
        let files = self.store.list_all().await.map_err(|e| failed(message, e))?;
        let updated_at = self.store.updated_at().await.map_err(|e| failed(message, e))?;
        Ok(StorageStats {
            total_size_bytes: files.iter().fold(0u64, |total, f| total.saturating_add(f.size_bytes)),
            file_count: files.len(),
            last_updated: updated_at.unwrap_or_else(now_millis),
        })
    }

    /// Per-category counts and byte totals.
    pub async fn category_breakdown(
        &self,
        token: &str,
    ) -> Result<BTreeMap<FileCategory, CategorySummary>> {
        let files = self.list_files(token).await?;
        Ok(summarize_categories(&files))
    }

    /// Fails with [`Error::InvalidApiKey`] unless `token` is the stored key.
    pub async fn authorize(&self, token: &str) -> Result<()> {
        match self.credentials.validate(token).await {
            Ok(true) => Ok(()),
            Ok(false) => Err(Error::InvalidApiKey),
            Err(e) => Err(failed("Failed to validate API key", e)),
        }
    }

    /// Removes every record and returns how many there were.
    pub async fn clear_files(&self, token: &str) -> Result<usize> {
        self.authorize(token).await?;
        let message = "Failed to clear files";
        let count = self.store.list_all().await.map_err(|e| failed(message, e))?.len();
        self.store.clear().await.map_err(|e| failed(message, e))?;
        Ok(count)
    }

    async fn fresh_id(&self) -> Result<String> {
        loop {
            let id = Uuid::new_v4().to_string();
            if self.store.get(&id).await?.is_none() {
                return Ok(id);
            }
        }
    }
}
