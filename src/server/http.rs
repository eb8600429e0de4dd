use http::header::{
    HeaderName, ACCESS_CONTROL_ALLOW_HEADERS, ACCESS_CONTROL_ALLOW_METHODS,
    ACCESS_CONTROL_ALLOW_ORIGIN, CONTENT_TYPE,
};
use http::{HeaderMap, HeaderValue, Method, StatusCode, Uri};
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::model::Envelope;
use crate::{Error, Result};

/// Header carrying the bearer key on every API request.
pub const API_KEY_HEADER: &str = "x-api-key";

/// An HTTP-shaped request travelling through the in-process gateway.
#[derive(Debug, Clone)]
pub struct ApiRequest {
    pub method: Method,
    pub uri: Uri,
    pub headers: HeaderMap,
    pub body: Option<String>,
}

impl ApiRequest {
    /// Builds a request for `url`, which may be a bare path or an absolute URL.
    pub fn new(method: Method, url: &str) -> Result<Self> {
        let uri = url
            .parse::<Uri>()
            .map_err(|e| Error::Internal(format!("invalid url {:?}: {}", url, e)))?;
        Ok(Self {
            method,
            uri,
            headers: HeaderMap::new(),
            body: None,
        })
    }

    pub fn header(mut self, name: &str, value: &str) -> Result<Self> {
        let name = HeaderName::from_bytes(name.as_bytes())
            .map_err(|e| Error::Internal(format!("invalid header name: {}", e)))?;
        let value = HeaderValue::from_str(value)
            .map_err(|e| Error::Internal(format!("invalid header value: {}", e)))?;
        self.headers.insert(name, value);
        Ok(self)
    }

    pub fn api_key(self, key: &str) -> Result<Self> {
        self.header(API_KEY_HEADER, key)
    }

    pub fn body(mut self, body: impl Into<String>) -> Self {
        self.body = Some(body.into());
        self
    }

    pub fn json<T: Serialize>(mut self, value: &T) -> Result<Self> {
        self.body = Some(serde_json::to_string(value)?);
        self.headers
            .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        Ok(self)
    }

    pub fn path(&self) -> &str {
        self.uri.path()
    }

    /// The credential header, if present and non-empty.
    pub fn credential(&self) -> Option<&str> {
        self.headers
            .get(API_KEY_HEADER)
            .and_then(|v| v.to_str().ok())
            .filter(|v| !v.is_empty())
    }
}

/// A response manufactured by the router: status, CORS headers and a JSON envelope.
#[derive(Debug, Clone)]
pub struct ApiResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: String,
}

impl ApiResponse {
    pub fn envelope<T: Serialize>(status: StatusCode, envelope: &Envelope<T>) -> Self {
        match serde_json::to_string(envelope) {
            Ok(body) => Self { status, headers: cors_headers(), body },
            Err(e) => {
                log::error!("Failed to encode response: {}", e);
                Self {
                    status: StatusCode::INTERNAL_SERVER_ERROR,
                    headers: cors_headers(),
                    body: r#"{"success":false,"error":"Internal server error"}"#.to_string(),
                }
            }
        }
    }

    /// `success` on `Ok`, the error's own status otherwise.
    pub fn from_result<T: Serialize>(result: Result<T>, success: StatusCode) -> Self {
        match result {
            Ok(data) => Self::envelope(success, &Envelope::ok(data)),
            Err(e) => Self::error(&e),
        }
    }

    pub fn error(err: &Error) -> Self {
        Self::envelope::<()>(err.status(), &Envelope::err(err.public_message()))
    }

    pub fn envelope_json<T: DeserializeOwned>(&self) -> Result<Envelope<T>> {
        Ok(serde_json::from_str(&self.body)?)
    }
}

fn cors_headers() -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    headers.insert(ACCESS_CONTROL_ALLOW_ORIGIN, HeaderValue::from_static("*"));
    headers.insert(
        ACCESS_CONTROL_ALLOW_METHODS,
        HeaderValue::from_static("GET, POST, PUT, DELETE, OPTIONS"),
    );
    headers.insert(
        ACCESS_CONTROL_ALLOW_HEADERS,
        HeaderValue::from_static("x-api-key, Content-Type"),
    );
    headers
}
