use http::{Method, StatusCode};
use log::{debug, warn};
use serde::de::DeserializeOwned;

use crate::model::{FilePatch, NewFile};
use crate::server::http::{ApiRequest, ApiResponse};
use crate::service::FileService;
use crate::{Error, Result};

/// A matched entry of the fixed route table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route<'a> {
    /// `/api/files`
    Files,
    /// `/api/files/{id}`, a single non-empty segment.
    File(&'a str),
    /// `/api/stats`
    Stats,
}

impl<'a> Route<'a> {
    /// Matches `path` against the route table. Exact paths are tried first.
    pub fn match_path(path: &'a str) -> Option<Self> {
        match path {
            "/api/files" => Some(Route::Files),
            "/api/stats" => Some(Route::Stats),
            _ => path
                .strip_prefix("/api/files/")
                .filter(|id| !id.is_empty() && !id.contains('/'))
                .map(Route::File),
        }
    }
}

/// Serves the record operations as synthetic HTTP responses.
///
/// The router never touches a socket: [`Router::handle`] maps a request to a
/// response, or returns `None` when the request is not for this API and should
/// go to the real network instead.
pub struct Router {
    service: FileService,
    origin: Option<String>,
}

impl Router {
    pub fn new(service: FileService) -> Self {
        Self { service, origin: None }
    }

    /// Restricts absolute URLs to `origin` (`scheme://host[:port]`). Relative
    /// URLs are always treated as same-origin.
    pub fn with_origin(mut self, origin: &str) -> Self {
        self.origin = Some(origin.trim_end_matches('/').to_ascii_lowercase());
        self
    }

    pub fn service(&self) -> &FileService {
        &self.service
    }

    fn same_origin(&self, request: &ApiRequest) -> bool {
        let (Some(expected), Some(authority)) = (&self.origin, request.uri.authority()) else {
            return true;
        };
        let scheme = request.uri.scheme_str().unwrap_or("http");
        let actual = format!("{}://{}", scheme, authority).to_ascii_lowercase();
        &actual == expected
    }

    /// True if `handle` would answer this request rather than pass it through.
    pub fn matches(&self, request: &ApiRequest) -> bool {
        self.same_origin(request) && Route::match_path(request.path()).is_some()
    }

    pub async fn handle(&self, request: &ApiRequest) -> Option<ApiResponse> {
        if !self.same_origin(request) {
            return None;
        }
        let route = Route::match_path(request.path())?;
        debug!("{} {} -> {:?}", request.method, request.path(), route);
        Some(self.dispatch(route, request).await)
    }

    async fn dispatch(&self, route: Route<'_>, request: &ApiRequest) -> ApiResponse {
        let Some(key) = request.credential() else {
            return ApiResponse::error(&Error::MissingApiKey);
        };
        let service = &self.service;

        match (route, &request.method) {
            (Route::Files, &Method::GET) => {
                ApiResponse::from_result(service.list_files(key).await, StatusCode::OK)
            }
            (Route::Files, &Method::POST) => {
                let file = match authorized_body::<NewFile>(service, key, request).await {
                    Ok(file) => file,
                    Err(e) => return ApiResponse::error(&e),
                };
                ApiResponse::from_result(service.create_file(key, file).await, StatusCode::CREATED)
            }
            (Route::File(id), &Method::GET) => {
                ApiResponse::from_result(service.get_file(key, id).await, StatusCode::OK)
            }
            (Route::File(id), &Method::PUT) => {
                let patch = match authorized_body::<FilePatch>(service, key, request).await {
                    Ok(patch) => patch,
                    Err(e) => return ApiResponse::error(&e),
                };
                ApiResponse::from_result(service.update_file(key, id, patch).await, StatusCode::OK)
            }
            (Route::File(id), &Method::DELETE) => {
                ApiResponse::from_result(service.delete_file(key, id).await, StatusCode::OK)
            }
            (Route::Stats, &Method::GET) => {
                ApiResponse::from_result(service.get_stats(key).await, StatusCode::OK)
            }
            _ => ApiResponse::error(&Error::RouteNotFound),
        }
    }
}

// The key is checked before the body is read, so a bad key is a 401 whatever
// the payload looks like.
async fn authorized_body<T: DeserializeOwned>(
    service: &FileService,
    key: &str,
    request: &ApiRequest,
) -> Result<T> {
    service.authorize(key).await?;
    parse_body(request)
}

// An absent or blank body reads as `{}`.
fn parse_body<T: DeserializeOwned>(request: &ApiRequest) -> Result<T> {
    let raw = request.body.as_deref().map(str::trim).filter(|b| !b.is_empty()).unwrap_or("{}");
    serde_json::from_str(raw).map_err(|e| {
        warn!("Rejected {} {}: {}", request.method, request.path(), e);
        Error::InvalidBody(e.to_string())
    })
}
