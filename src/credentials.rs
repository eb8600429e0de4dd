use std::sync::Arc;

use log::info;
use uuid::Uuid;

use crate::{HavenStore, MetaStore, Result};

/// Metadata key the API key is persisted under.
pub const API_KEY_STORAGE: &str = "local_data_haven_api_key";

/// Prefix of every generated API key.
pub const API_KEY_PREFIX: &str = "ldh_";

/// The single bearer key guarding the store.
///
/// There is exactly one valid key at a time. It is created lazily on first
/// access and replaced only by [`Credentials::reset`].
#[derive(Clone)]
pub struct Credentials {
    store: Arc<dyn HavenStore>,
}

impl Credentials {
    pub fn new(store: Arc<dyn HavenStore>) -> Self {
        Self { store }
    }

    /// Returns the persisted key, generating and persisting one if none exists.
    pub async fn get_or_create(&self) -> Result<String> {
        if let Some(key) = self.store.get_meta(API_KEY_STORAGE).await? {
            if !key.is_empty() {
                return Ok(key);
            }
        }
        let key = generate_key();
        self.store.set_meta(API_KEY_STORAGE, &key).await?;
        info!("Generated a new API key");
        Ok(key)
    }

    /// True iff `candidate` is exactly the persisted key.
    pub async fn validate(&self, candidate: &str) -> Result<bool> {
        Ok(match self.store.get_meta(API_KEY_STORAGE).await? {
            Some(key) => !key.is_empty() && key == candidate,
            None => false,
        })
    }

    /// Replaces the key unconditionally. The previous key stops validating at once.
    pub async fn reset(&self) -> Result<String> {
        let key = generate_key();
        self.store.set_meta(API_KEY_STORAGE, &key).await?;
        info!("API key reset; previously issued keys are no longer valid");
        Ok(key)
    }
}

fn generate_key() -> String {
    format!("{}{}", API_KEY_PREFIX, hex::encode(Uuid::new_v4().as_bytes()))
}
