//! Request interception: cache-first for the shell, stale-while-revalidate
//! for story data.

use std::future::Future;
use std::sync::{Arc, Mutex};

use reqwest::{Method, Url};
use tokio::task::JoinHandle;

use crate::api::{push, ApiClient};

use super::storage::{Cache, CacheStorage};
use super::{CacheError, ProxyRequest, ProxyResponse, ResponseKind, ResponseSource};

/// Path of the application shell document used as the offline fallback.
pub const SHELL_FALLBACK_PATH: &str = "/index.html";

/// Shell assets cached at install time. Relative paths resolve against the app origin.
pub const PRECACHE_URLS: &[&str] = &[
    "/",
    "/index.html",
    "/manifest.json",
    "/icons/icon-192.png",
    "/icons/icon-512.png",
    "https://unpkg.com/leaflet@1.9.4/dist/images/marker-icon.png",
    "https://unpkg.com/leaflet@1.9.4/dist/images/marker-icon-2x.png",
    "https://unpkg.com/leaflet@1.9.4/dist/images/marker-shadow.png",
    "https://unpkg.com/leaflet@1.9.4/dist/leaflet.css",
];


/// Network access used by the proxy.
pub trait Fetcher: Send + Sync + 'static {
    fn fetch(
        &self,
        request: &ProxyRequest,
    ) -> impl Future<Output = Result<ProxyResponse, CacheError>> + Send;
}

/// Whether two URLs share scheme, host and port.
pub fn same_origin(url: &str, origin: &str) -> bool {
    match (Url::parse(url), Url::parse(origin)) {
        (Ok(a), Ok(b)) => a.origin() == b.origin(),
        _ => false,
    }
}

/// [`Fetcher`] that performs real HTTP requests through the [`ApiClient`].
pub struct HttpFetcher {
    api: Arc<ApiClient>,
    app_origin: String,
}

impl HttpFetcher {
    pub fn new(api: Arc<ApiClient>, app_origin: &str) -> Self {
        Self {
            api,
            app_origin: app_origin.to_string(),
        }
    }
}

impl Fetcher for HttpFetcher {
    async fn fetch(&self, request: &ProxyRequest) -> Result<ProxyResponse, CacheError> {
        let resp = self
            .api
            .send_absolute(request.method.clone(), &request.url, &request.headers)
            .await
            .map_err(|e| CacheError::Network(e.to_string()))?;

        let status = resp.status().as_u16();
        let headers = resp
            .headers()
            .iter()
            .filter_map(|(k, v)| v.to_str().ok().map(|v| (k.as_str().to_string(), v.to_string())))
            .collect();
        let body = resp
            .bytes()
            .await
            .map_err(|e| CacheError::Network(e.to_string()))?
            .to_vec();
        let kind = if same_origin(&request.url, &self.app_origin) {
            ResponseKind::Basic
        } else {
            ResponseKind::Cors
        };

        Ok(ProxyResponse {
            status,
            headers,
            body,
            kind,
            source: ResponseSource::Network,
        })
    }
}

/// Versioned partition names.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheNames {
    pub shell: String,
    pub data: String,
}

impl CacheNames {
    pub fn for_version(version: &str) -> Self {
        Self {
            shell: format!("story-app-cache-{}", version),
            data: format!("story-app-data-{}", version),
        }
    }

    fn is_current(&self, name: &str) -> bool {
        name == self.shell || name == self.data
    }
}

#[derive(Debug, Clone)]
pub struct ProxyConfig {
    pub names: CacheNames,
    /// Story list endpoint, e.g. `https://story-api.dicoding.dev/v1/stories`.
    pub story_api_url: String,
    /// Origin of the shell assets, e.g. `http://localhost:8080`.
    pub app_origin: String,
    pub precache: Vec<String>,
}

impl ProxyConfig {
    pub fn new(version: &str, api_base_url: &str, app_origin: &str) -> Self {
        let app_origin = app_origin.trim_end_matches('/').to_string();
        Self {
            names: CacheNames::for_version(version),
            story_api_url: format!("{}/stories", api_base_url.trim_end_matches('/')),
            precache: PRECACHE_URLS
                .iter()
                .map(|u| resolve(&app_origin, u))
                .collect(),
            app_origin,
        }
    }

    fn shell_fallback_url(&self) -> String {
        resolve(&self.app_origin, SHELL_FALLBACK_PATH)
    }

    /// Push subscription requests are never treated as story data.
    fn is_story_data(&self, url: &str) -> bool {
        url.contains(&self.story_api_url) && !url.contains(push::SUBSCRIBE_PATH)
    }
}

fn resolve(origin: &str, url: &str) -> String {
    if url.starts_with('/') {
        format!("{}{}", origin, url)
    } else {
        url.to_string()
    }
}

/// Proxy lifecycle. Requests are only intercepted once active.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lifecycle {
    Parsed,
    Installed,
    Active,
}

type Revalidation = JoinHandle<Result<ProxyResponse, CacheError>>;

/// Caching proxy over a [`Fetcher`].
pub struct CacheProxy<F: Fetcher> {
    storage: CacheStorage,
    fetcher: Arc<F>,
    config: ProxyConfig,
    lifecycle: Mutex<Lifecycle>,
    revalidations: Mutex<Vec<Revalidation>>,
}

impl<F: Fetcher> CacheProxy<F> {
    pub fn new(storage: CacheStorage, fetcher: Arc<F>, config: ProxyConfig) -> Self {
        Self {
            storage,
            fetcher,
            config,
            lifecycle: Mutex::new(Lifecycle::Parsed),
            revalidations: Mutex::new(Vec::new()),
        }
    }

    pub fn config(&self) -> &ProxyConfig {
        &self.config
    }

    pub fn lifecycle(&self) -> Lifecycle {
        self.lifecycle.lock().map(|l| *l).unwrap_or(Lifecycle::Parsed)
    }

    fn set_lifecycle(&self, next: Lifecycle) {
        if let Ok(mut lifecycle) = self.lifecycle.lock() {
            *lifecycle = next;
        }
    }

    /// Open the shell partition and precache the shell assets.
    ///
    /// Assets that fail to download are logged and skipped. Returns how many
    /// were stored.
    pub async fn install(&self) -> Result<usize, CacheError> {
        let shell = self.storage.open(&self.config.names.shell).await?;

        let mut stored = 0;
        for url in &self.config.precache {
            let request = ProxyRequest::get(url.as_str());
            match self.fetcher.fetch(&request).await {
                Ok(response) if response.is_ok() => {
                    shell.put(&request, &response).await?;
                    stored += 1;
                }
                Ok(response) => {
                    log::warn!("Precache of {} skipped: status {}", url, response.status)
                }
                Err(e) => log::warn!("Precache of {} failed: {}", url, e),
            }
        }

        // A new version takes over without waiting for the previous one.
        self.set_lifecycle(Lifecycle::Installed);
        log::info!(
            "Cache proxy installed: {}/{} shell assets cached",
            stored,
            self.config.precache.len()
        );
        Ok(stored)
    }

    /// Delete stale partitions and start intercepting requests.
    ///
    /// Returns the names of the partitions that were deleted.
    pub async fn activate(&self) -> Result<Vec<String>, CacheError> {
        let mut deleted = Vec::new();
        for name in self.storage.keys().await? {
            if !self.config.names.is_current(&name) {
                self.storage.delete(&name).await?;
                log::info!("Deleted stale cache partition {}", name);
                deleted.push(name);
            }
        }

        self.set_lifecycle(Lifecycle::Active);
        log::info!("Cache proxy active");
        Ok(deleted)
    }

    /// Install then activate in one step.
    pub async fn start(&self) -> Result<(), CacheError> {
        self.install().await?;
        self.activate().await?;
        Ok(())
    }

    /// Activate, installing first only when the shell partition is missing.
    pub async fn resume(&self) -> Result<(), CacheError> {
        if !self.storage.has(&self.config.names.shell).await? {
            self.install().await?;
        }
        self.activate().await?;
        Ok(())
    }

    /// Handle one outbound request.
    ///
    /// Non-GET requests, and any request before activation, go straight to
    /// the network.
    pub async fn handle(&self, request: &ProxyRequest) -> Result<ProxyResponse, CacheError> {
        if request.method != Method::GET || self.lifecycle() != Lifecycle::Active {
            return self.fetcher.fetch(request).await;
        }

        if self.config.is_story_data(&request.url) {
            self.stale_while_revalidate(request).await
        } else {
            self.cache_first(request).await
        }
    }

    /// Wait for background revalidations started by earlier calls.
    pub async fn settle(&self) {
        let pending: Vec<Revalidation> = match self.revalidations.lock() {
            Ok(mut guard) => guard.drain(..).collect(),
            Err(_) => return,
        };
        for handle in pending {
            let _ = handle.await;
        }
    }

    async fn stale_while_revalidate(
        &self,
        request: &ProxyRequest,
    ) -> Result<ProxyResponse, CacheError> {
        let data = match self.storage.open(&self.config.names.data).await {
            Ok(data) => data,
            Err(e) => {
                log::warn!("Data cache unavailable for {}: {}", request.url, e);
                return match self.fetcher.fetch(request).await {
                    Ok(response) => Ok(response),
                    Err(e) => {
                        log::warn!("Network failed for API request {}: {}", request.url, e);
                        self.shell_fallback(request).await
                    }
                };
            }
        };
        let cached = data.match_request(request).await.unwrap_or_else(|e| {
            log::warn!("Data cache lookup failed for {}: {}", request.url, e);
            None
        });

        let revalidation = self.spawn_revalidation(data, request.clone());

        if let Some(cached) = cached {
            if let Ok(mut pending) = self.revalidations.lock() {
                pending.retain(|h| !h.is_finished());
                pending.push(revalidation);
            }
            return Ok(cached);
        }

        match revalidation.await {
            Ok(Ok(response)) => Ok(response),
            Ok(Err(e)) => {
                log::warn!("Network failed for API request {}: {}", request.url, e);
                self.shell_fallback(request).await
            }
            Err(e) => {
                log::warn!("Revalidation task aborted for {}: {}", request.url, e);
                self.shell_fallback(request).await
            }
        }
    }

    fn spawn_revalidation(&self, data: Cache, request: ProxyRequest) -> Revalidation {
        let fetcher = self.fetcher.clone();
        tokio::spawn(async move {
            let response = fetcher.fetch(&request).await?;
            if response.status == 200 || response.kind == ResponseKind::Opaque {
                if let Err(e) = data.put(&request, &response).await {
                    log::warn!("Failed to update data cache for {}: {}", request.url, e);
                }
            }
            Ok::<_, CacheError>(response)
        })
    }

    async fn cache_first(&self, request: &ProxyRequest) -> Result<ProxyResponse, CacheError> {
        match self.storage.match_any(request).await {
            Ok(Some(hit)) => return Ok(hit),
            Ok(None) => {}
            Err(e) => log::warn!("Cache lookup failed for {}: {}", request.url, e),
        }

        match self.fetcher.fetch(request).await {
            Ok(response) => {
                if response.status == 200 && same_origin(&request.url, &self.config.app_origin) {
                    self.store_shell(request, &response).await;
                }
                Ok(response)
            }
            Err(e) => {
                log::debug!("Network failed for {}: {}", request.url, e);
                self.shell_fallback(request).await
            }
        }
    }

    async fn store_shell(&self, request: &ProxyRequest, response: &ProxyResponse) {
        let result = match self.storage.open(&self.config.names.shell).await {
            Ok(shell) => shell.put(request, response).await,
            Err(e) => Err(e),
        };
        if let Err(e) = result {
            log::warn!("Failed to cache {}: {}", request.url, e);
        }
    }

    async fn shell_fallback(&self, request: &ProxyRequest) -> Result<ProxyResponse, CacheError> {
        let shell_request = ProxyRequest::get(self.config.shell_fallback_url());
        let cached = self.storage.match_any(&shell_request).await.unwrap_or_else(|e| {
            log::warn!("Shell fallback lookup failed: {}", e);
            None
        });
        match cached {
            Some(mut shell) => {
                shell.source = ResponseSource::ShellFallback;
                Ok(shell)
            }
            None => Err(CacheError::Offline(request.url.clone())),
        }
    }
}
