use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use log::{info, warn};

use crate::server::http::{ApiRequest, ApiResponse};
use crate::server::Router;
use crate::{Error, Result};

/// Anything that can carry a request to a response: the real network, or the
/// intercepting gateway in front of it.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn fetch(&self, request: ApiRequest) -> Result<ApiResponse>;
}

/// A transport with no network behind it. Every request fails as unroutable.
pub struct Offline;

#[async_trait]
impl Transport for Offline {
    async fn fetch(&self, request: ApiRequest) -> Result<ApiResponse> {
        Err(Error::Unroutable(request.uri.to_string()))
    }
}

/// Answers API requests from the [`Router`] and hands everything else to the
/// wrapped transport untouched.
pub struct Interceptor {
    router: Arc<Router>,
    fallback: Arc<dyn Transport>,
}

impl Interceptor {
    pub fn new(router: Arc<Router>, fallback: Arc<dyn Transport>) -> Self {
        Self { router, fallback }
    }

    pub fn router(&self) -> &Arc<Router> {
        &self.router
    }
}

#[async_trait]
impl Transport for Interceptor {
    async fn fetch(&self, request: ApiRequest) -> Result<ApiResponse> {
        match self.router.handle(&request).await {
            Some(response) => Ok(response),
            None => self.fallback.fetch(request).await,
        }
    }
}

static GATEWAY: RwLock<Option<Arc<Interceptor>>> = RwLock::new(None);

fn poisoned<T>(_: T) -> Error {
    Error::Internal("gateway lock poisoned".to_string())
}

/// Installs the process-wide gateway in front of `fallback`.
///
/// Only one gateway may be installed at a time; a second call fails with
/// [`Error::AlreadyInstalled`] instead of stacking another interceptor.
pub fn install(router: Arc<Router>, fallback: Arc<dyn Transport>) -> Result<Arc<Interceptor>> {
    let mut slot = GATEWAY.write().map_err(poisoned)?;
    if slot.is_some() {
        warn!("API gateway is already installed; ignoring second install");
        return Err(Error::AlreadyInstalled);
    }
    let interceptor = Arc::new(Interceptor::new(router, fallback));
    *slot = Some(interceptor.clone());
    info!("API gateway installed");
    Ok(interceptor)
}

/// Removes the installed gateway. Returns false if none was installed.
pub fn uninstall() -> Result<bool> {
    let removed = GATEWAY.write().map_err(poisoned)?.take().is_some();
    if removed {
        info!("API gateway removed");
    }
    Ok(removed)
}

pub fn is_installed() -> bool {
    GATEWAY.read().map(|slot| slot.is_some()).unwrap_or(false)
}

pub fn installed() -> Result<Arc<Interceptor>> {
    GATEWAY
        .read()
        .map_err(poisoned)?
        .clone()
        .ok_or(Error::NotInstalled)
}

/// Sends a request through the installed gateway.
pub async fn fetch(request: ApiRequest) -> Result<ApiResponse> {
    let gateway = installed()?;
    gateway.fetch(request).await
}

/// A [`Transport`] handle onto whatever gateway is installed at call time.
pub struct Installed;

#[async_trait]
impl Transport for Installed {
    async fn fetch(&self, request: ApiRequest) -> Result<ApiResponse> {
        fetch(request).await
    }
}
