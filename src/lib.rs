//! Haven Store is a local file store with a virtual, in-process API.
//!
//! Files are kept as [`model::FileRecord`]s in a durable collection keyed by id.
//! The same records are reachable two ways: directly through the
//! [`service::FileService`] record operations, or through an HTTP-shaped request
//! path served by the [`server::Router`] without any listening socket.
//!
//! ## Core Components
//! - [`engine`]: The storage backend (in-memory with atomic JSON persistence).
//! - [`credentials`]: The single bearer key guarding every operation.
//! - [`service`]: Auth-gated create/read/update/delete and storage statistics.
//! - [`server`]: Route table, request dispatch and the interception gateway.
//! - [`sdk`]: A typed client for external callers and store discovery.

pub mod credentials;
pub mod engine;
pub mod model;
pub mod sdk;
pub mod server;
pub mod service;

use async_trait::async_trait;
use http::StatusCode;
use model::FileRecord;
use thiserror::Error;

/// Errors returned by Haven Store.
#[derive(Error, Debug)]
pub enum Error {
    /// The request carried no credential header.
    #[error("API key is required")]
    MissingApiKey,
    /// The supplied credential does not match the persisted key.
    #[error("Invalid API key")]
    InvalidApiKey,
    /// No record exists for the requested id.
    #[error("File not found")]
    FileNotFound,
    /// The path is routed but the method is not.
    #[error("Not found")]
    RouteNotFound,
    /// The request payload could not be parsed.
    #[error("Invalid request body: {0}")]
    InvalidBody(String),
    /// A storage operation failed; the message is safe to show to callers.
    #[error("{0}")]
    Failed(&'static str),
    /// The gateway is already installed for this process.
    #[error("gateway already installed")]
    AlreadyInstalled,
    /// No gateway has been installed.
    #[error("gateway not installed")]
    NotInstalled,
    /// A request fell through to a transport with no network behind it.
    #[error("no route to {0}")]
    Unroutable(String),
    /// An error envelope received by the SDK client.
    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },
    /// An internal error occurred.
    #[error("internal error: {0}")]
    Internal(String),
    /// An I/O error occurred during persistence.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    /// Error during JSON serialization or deserialization.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl Error {
    /// The status code this error is reported with on the virtual API.
    pub fn status(&self) -> StatusCode {
        match self {
            Error::MissingApiKey | Error::InvalidApiKey => StatusCode::UNAUTHORIZED,
            Error::FileNotFound | Error::RouteNotFound => StatusCode::NOT_FOUND,
            Error::InvalidBody(_) => StatusCode::BAD_REQUEST,
            Error::Unroutable(_) => StatusCode::BAD_GATEWAY,
            Error::Api { status, .. } => {
                StatusCode::from_u16(*status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
            }
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// The message placed in a response envelope. Internal details are not
    /// leaked to callers.
    pub fn public_message(&self) -> String {
        match self {
            Error::Internal(_) | Error::Io(_) | Error::Serialization(_) => {
                "Internal server error".to_string()
            }
            other => other.to_string(),
        }
    }
}

/// A specialized Result type for Haven Store operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Current wall-clock time in epoch milliseconds.
pub fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// Read access to the file collection.
#[async_trait]
pub trait RecordReader: Send + Sync {
    /// Returns every record, in no particular order.
    async fn list_all(&self) -> Result<Vec<FileRecord>>;
    /// Looks a record up by id. A missing id is `Ok(None)`, never an error.
    async fn get(&self, id: &str) -> Result<Option<FileRecord>>;
    /// Epoch milliseconds of the last mutation, if the collection was ever mutated.
    async fn updated_at(&self) -> Result<Option<i64>>;
}

/// Write access to the file collection.
#[async_trait]
pub trait RecordWriter: Send + Sync {
    /// Inserts the record, fully replacing any record with the same id.
    async fn put(&self, record: FileRecord) -> Result<()>;
    /// Removes the record if present. Deleting a missing id is not an error.
    async fn delete(&self, id: &str) -> Result<()>;
    /// Removes every record.
    async fn clear(&self) -> Result<()>;
}

/// Scalar values persisted alongside the collection, such as the API key.
#[async_trait]
pub trait MetaStore: Send + Sync {
    async fn get_meta(&self, key: &str) -> Result<Option<String>>;
    async fn set_meta(&self, key: &str, value: &str) -> Result<()>;
}

/// The complete storage capability consumed by the rest of the crate.
pub trait HavenStore: RecordReader + RecordWriter + MetaStore {}

impl<T: RecordReader + RecordWriter + MetaStore> HavenStore for T {}
