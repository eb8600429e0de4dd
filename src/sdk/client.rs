use std::sync::Arc;

use http::Method;
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::model::{DeleteReceipt, Envelope, FilePatch, FileRecord, NewFile, StorageStats};
use crate::server::{ApiRequest, ApiResponse, Transport};
use crate::{Error, Result};

/// Typed client for the virtual API, as an external caller would use it.
///
/// Every request carries the API key header and goes through `transport`,
/// usually the installed gateway. Error envelopes come back as
/// [`Error::Api`] with the response status.
pub struct Client {
    transport: Arc<dyn Transport>,
    base_url: String,
    api_key: String,
}

impl Client {
    pub fn new(transport: Arc<dyn Transport>, api_key: &str) -> Self {
        Self {
            transport,
            base_url: String::new(),
            api_key: api_key.to_string(),
        }
    }

    /// Prefixes every path, e.g. `http://localhost:3000`.
    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = base_url.trim_end_matches('/').to_string();
        self
    }

    fn request(&self, method: Method, path: &str) -> Result<ApiRequest> {
        ApiRequest::new(method, &format!("{}{}", self.base_url, path))?.api_key(&self.api_key)
    }

    /// Sends a raw request and returns the response as-is.
    pub async fn send(&self, request: ApiRequest) -> Result<ApiResponse> {
        self.transport.fetch(request).await
    }

    async fn call<T: DeserializeOwned>(&self, request: ApiRequest) -> Result<T> {
        let response = self.send(request).await?;
        let envelope: Envelope<T> = response.envelope_json()?;
        if envelope.success {
            envelope
                .data
                .ok_or_else(|| Error::Internal("response carried no data".to_string()))
        } else {
            Err(Error::Api {
                status: response.status.as_u16(),
                message: envelope.error.unwrap_or_default(),
            })
        }
    }

    async fn call_with<B: Serialize, T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        body: &B,
    ) -> Result<T> {
        let request = self.request(method, path)?.json(body)?;
        self.call(request).await
    }

    pub async fn list_files(&self) -> Result<Vec<FileRecord>> {
        self.call(self.request(Method::GET, "/api/files")?).await
    }

    pub async fn get_file(&self, id: &str) -> Result<FileRecord> {
        self.call(self.request(Method::GET, &format!("/api/files/{}", id))?).await
    }

    pub async fn create_file(&self, file: &NewFile) -> Result<FileRecord> {
        self.call_with(Method::POST, "/api/files", file).await
    }

    pub async fn update_file(&self, id: &str, patch: &FilePatch) -> Result<FileRecord> {
        self.call_with(Method::PUT, &format!("/api/files/{}", id), patch).await
    }

    pub async fn delete_file(&self, id: &str) -> Result<DeleteReceipt> {
        self.call(self.request(Method::DELETE, &format!("/api/files/{}", id))?).await
    }

    pub async fn stats(&self) -> Result<StorageStats> {
        self.call(self.request(Method::GET, "/api/stats")?).await
    }
}
