use std::env;
use std::path::PathBuf;
use std::sync::Arc;

use crate::engine::{Database, MemStore};
use crate::sdk::Client;
use crate::server::gateway::{self, Installed, Interceptor, Transport};
use crate::server::Router;
use crate::service::FileService;
use crate::{HavenStore, Result};

/// Environment variable naming the data directory.
pub const DATA_DIR_ENV: &str = "HAVEN_DATA_DIR";

/// Default data directory when neither an argument nor the environment names one.
pub const DEFAULT_DATA_DIR: &str = "data";

/// Resolves the data directory: explicit argument, then `HAVEN_DATA_DIR`, then `data`.
pub fn resolve_data_dir(explicit: Option<&str>) -> PathBuf {
    explicit
        .map(str::to_string)
        .or_else(|| env::var(DATA_DIR_ENV).ok().filter(|v| !v.is_empty()))
        .unwrap_or_else(|| DEFAULT_DATA_DIR.to_string())
        .into()
}

/// The wired-up stack: store, record operations and router.
pub struct Haven {
    pub store: Arc<dyn HavenStore>,
    pub files: FileService,
    pub router: Arc<Router>,
}

impl Haven {
    pub fn from_store(store: Arc<dyn HavenStore>) -> Self {
        let files = FileService::new(store.clone());
        let router = Arc::new(Router::new(files.clone()));
        Self { store, files, router }
    }

    /// A throwaway stack with nothing on disk.
    pub fn in_memory() -> Self {
        Self::from_store(Arc::new(MemStore::in_memory()))
    }

    /// Installs this stack's router as the process-wide gateway.
    pub fn install(&self, fallback: Arc<dyn Transport>) -> Result<Arc<Interceptor>> {
        gateway::install(self.router.clone(), fallback)
    }

    /// A client that talks to the installed gateway using the current API key.
    pub async fn client(&self) -> Result<Client> {
        let key = self.files.credentials().get_or_create().await?;
        Ok(Client::new(Arc::new(Installed), &key))
    }
}

/// Opens the durable store in `data_dir` (resolved as in [`resolve_data_dir`]).
///
/// Nothing touches the disk until the first operation; the directory and
/// collection are then set up exactly once.
///
/// # Examples
///
/// ```no_run
/// use haven_store::sdk;
///
/// #[tokio::main]
/// async fn main() -> anyhow::Result<()> {
///     let haven = sdk::open(Some("./data"));
///     let key = haven.files.credentials().get_or_create().await?;
///     let files = haven.files.list_files(&key).await?;
///     println!("{} files", files.len());
///     Ok(())
/// }
/// ```
pub fn open(data_dir: Option<&str>) -> Haven {
    let dir = resolve_data_dir(data_dir);
    log::debug!("Using data directory {:?}", dir);
    Haven::from_store(Arc::new(Database::new(dir)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::NewFile;
    use tempfile::tempdir;

    #[test]
    fn test_explicit_dir_wins() {
        assert_eq!(resolve_data_dir(Some("/tmp/x")), PathBuf::from("/tmp/x"));
    }

    #[tokio::test]
    async fn test_open_persists_key_and_files() {
        let dir = tempdir().unwrap();
        let path = dir.path().to_str().unwrap();

        let (key, id) = {
            let haven = open(Some(path));
            let key = haven.files.credentials().get_or_create().await.unwrap();
            let rec = haven
                .files
                .create_file(&key, NewFile { name: "a.txt".to_string(), ..Default::default() })
                .await
                .unwrap();
            (key, rec.id)
        };

        let haven = open(Some(path));
        assert_eq!(haven.files.credentials().get_or_create().await.unwrap(), key);
        assert_eq!(haven.files.get_file(&key, &id).await.unwrap().name, "a.txt");
    }
}
