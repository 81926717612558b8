//! Application state shared by the CLI commands and the daemon.
//!
//! Holds the stores, the API client and the credential relay. The replay
//! engine and cache proxy are cheap views over this state, built on demand.

use std::sync::Arc;

use crate::api::auth::{KeychainError, KeychainTokenStore, TokenStore};
use crate::api::client::ApiClient;
use crate::cache::{CacheProxy, CacheStorage, HttpFetcher, ProxyConfig};
use crate::config::Config;
use crate::notify::{LogNotifier, Notifier};
use crate::queue::QueueStore;
use crate::relay::CredentialRelay;
use crate::sync::{ReplayEngine, SyncRegistry};

pub struct AppState {
    pub config: Config,

    /// HTTP client for the story API.
    pub api: Arc<ApiClient>,

    /// Durable queue of submissions waiting for replay.
    pub queue: QueueStore,

    /// Versioned response cache partitions.
    pub cache: CacheStorage,

    /// Background-to-foreground token channel.
    pub relay: Arc<CredentialRelay>,

    /// Where the foreground keeps the session token.
    pub tokens: Arc<dyn TokenStore>,

    pub notifier: Arc<dyn Notifier>,

    /// Set once the SyncDaemon is spawned. Uses std::sync::RwLock because
    /// registration happens from synchronous code paths too.
    pub sync_registry: std::sync::RwLock<Option<SyncRegistry>>,
}

impl AppState {
    /// State backed by the OS keychain and the log notifier.
    pub fn new(config: Config) -> Self {
        Self::with_parts(
            config,
            Arc::new(KeychainTokenStore::new()),
            Arc::new(LogNotifier),
        )
    }

    pub fn with_parts(
        config: Config,
        tokens: Arc<dyn TokenStore>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            api: Arc::new(ApiClient::new(&config.api_base_url)),
            queue: QueueStore::new(config.queue_db_path()),
            cache: CacheStorage::new(config.cache_db_path()),
            relay: Arc::new(CredentialRelay::new()),
            tokens,
            notifier,
            sync_registry: std::sync::RwLock::new(None),
            config,
        }
    }

    pub fn replay_engine(&self) -> ReplayEngine<ApiClient> {
        ReplayEngine::new(
            self.queue.clone(),
            self.relay.clone(),
            self.api.clone(),
            self.notifier.clone(),
        )
    }

    pub fn cache_proxy(&self) -> CacheProxy<HttpFetcher> {
        let fetcher = HttpFetcher::new(self.api.clone(), &self.config.app_origin);
        let proxy_config = ProxyConfig::new(
            &self.config.cache_version,
            &self.config.api_base_url,
            &self.config.app_origin,
        );
        CacheProxy::new(self.cache.clone(), Arc::new(fetcher), proxy_config)
    }

    /// Registry for deferred sync triggers, if a daemon is listening.
    pub fn sync_registry(&self) -> Option<SyncRegistry> {
        self.sync_registry
            .read()
            .ok()
            .and_then(|guard| guard.clone())
    }

    pub fn set_sync_registry(&self, registry: SyncRegistry) {
        if let Ok(mut guard) = self.sync_registry.write() {
            *guard = Some(registry);
        }
    }

    /// Load the stored session token into the API client.
    ///
    /// Returns whether a token was found.
    pub async fn restore_session(&self) -> Result<bool, KeychainError> {
        match self.tokens.load_token()? {
            Some(token) => {
                self.api.set_access_token(token).await;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Store a fresh session token.
    pub async fn save_session(&self, token: &str) -> Result<(), KeychainError> {
        self.tokens.store_token(token)?;
        self.api.set_access_token(token.to_string()).await;
        Ok(())
    }

    /// Forget the session token everywhere.
    pub async fn clear_session(&self) -> Result<(), KeychainError> {
        self.api.clear_access_token().await;
        self.tokens.clear_token()
    }
}
