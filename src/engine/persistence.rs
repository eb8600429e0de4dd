use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use log::warn;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::model::FileRecord;
use crate::Result;

/// On-disk schema version of the file collection.
pub const SCHEMA_VERSION: u32 = 1;

const FILES_NAME: &str = "files.json";
const META_NAME: &str = "metadata.json";

/// Serialized form of the file collection.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Collection {
    pub version: u32,
    pub updated_at: Option<i64>,
    pub files: HashMap<String, FileRecord>,
}

/// Handles disk I/O for the [`MemStore`](crate::engine::MemStore).
///
/// Persistence uses an atomic "write-then-rename" strategy so a crash never
/// leaves a half-written collection behind. Records live in `files.json`,
/// scalar metadata (the API key) in `metadata.json`.
pub struct Persistence {
    data_dir: PathBuf,
}

impl Persistence {
    /// Opens the data directory, creating it and an empty collection if missing.
    pub fn new<P: AsRef<Path>>(dir: P) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        if !dir.exists() {
            fs::create_dir_all(&dir)?;
        }
        let persistence = Self { data_dir: dir };
        if !persistence.data_dir.join(FILES_NAME).exists() {
            persistence.save_collection(&Collection {
                version: SCHEMA_VERSION,
                ..Default::default()
            })?;
        }
        Ok(persistence)
    }

    pub fn save_collection(&self, collection: &Collection) -> Result<()> {
        self.write_atomic(FILES_NAME, collection)
    }

    pub fn save_meta(&self, meta: &HashMap<String, String>) -> Result<()> {
        self.write_atomic(META_NAME, meta)
    }

    /// Loads the file collection. An unreadable or corrupt file is logged and
    /// treated as empty.
    pub fn load_collection(&self) -> Result<Collection> {
        let mut collection: Collection = self.read_or_default(FILES_NAME);
        if collection.version == 0 {
            collection.version = SCHEMA_VERSION;
        } else if collection.version > SCHEMA_VERSION {
            warn!(
                "Collection schema version {} is newer than supported version {}",
                collection.version, SCHEMA_VERSION
            );
        }
        Ok(collection)
    }

    pub fn load_meta(&self) -> Result<HashMap<String, String>> {
        Ok(self.read_or_default(META_NAME))
    }

    fn write_atomic<T: Serialize>(&self, name: &str, value: &T) -> Result<()> {
        let file_path = self.data_dir.join(name);
        let temp_path = file_path.with_extension("json.tmp");

        let bytes = serde_json::to_vec_pretty(value)?;

        fs::write(&temp_path, bytes)?;
        fs::rename(&temp_path, &file_path)?;

        Ok(())
    }

    fn read_or_default<T: DeserializeOwned + Default>(&self, name: &str) -> T {
        let path = self.data_dir.join(name);
        if !path.exists() {
            return T::default();
        }

        let content = match fs::read(&path) {
            Ok(c) => c,
            Err(e) => {
                warn!("Could not read {:?}: {}", path, e);
                return T::default();
            }
        };

        match serde_json::from_slice(&content) {
            Ok(v) => v,
            Err(e) => {
                warn!("Could not unmarshal {:?}: {}", path, e);
                T::default()
            }
        }
    }
}
