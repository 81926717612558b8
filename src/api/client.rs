//! HTTP client for the story API with bearer-token injection.

use std::time::Duration;

use reqwest::{Client, Response};
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::RwLock;

/// HTTP client wrapper for story API communication.
///
/// Holds the base URL and, for foreground use, the session token. The replay
/// engine never relies on the stored token; it passes one explicitly per batch.
pub struct ApiClient {
    client: Client,
    base_url: String,
    access_token: Arc<RwLock<Option<String>>>,
}

impl ApiClient {
    /// Create a new API client with the given base URL.
    pub fn new(base_url: &str) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(120))
            .connect_timeout(Duration::from_secs(10))
            .build()
            .unwrap_or_else(|_| Client::new());
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            access_token: Arc::new(RwLock::new(None)),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Absolute URL for a path relative to the API base.
    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Store the access token for authenticated foreground requests.
    pub async fn set_access_token(&self, token: String) {
        let mut guard = self.access_token.write().await;
        *guard = Some(token);
    }

    /// Clear the access token (used on logout).
    pub async fn clear_access_token(&self) {
        let mut guard = self.access_token.write().await;
        *guard = None;
    }

    pub async fn access_token(&self) -> Option<String> {
        self.access_token.read().await.clone()
    }

    /// Send an authenticated GET request to a relative API path.
    pub async fn authenticated_get(&self, path: &str) -> Result<Response, reqwest::Error> {
        let token = self.access_token.read().await;

        let mut builder = self.client.get(self.url(path));
        if let Some(ref t) = *token {
            builder = builder.bearer_auth(t);
        }

        builder.send().await
    }

    /// Send an unauthenticated POST request with a JSON body to a relative API path.
    pub async fn post<T: Serialize>(&self, path: &str, body: &T) -> Result<Response, reqwest::Error> {
        self.client.post(self.url(path)).json(body).send().await
    }

    /// Send a JSON POST authorized with an explicit bearer token.
    pub async fn post_with_token<T: Serialize>(
        &self,
        path: &str,
        body: &T,
        token: &str,
    ) -> Result<Response, reqwest::Error> {
        self.client
            .post(self.url(path))
            .bearer_auth(token)
            .json(body)
            .send()
            .await
    }

    /// Send a multipart POST authorized with an explicit bearer token.
    pub async fn multipart_post_with_token(
        &self,
        path: &str,
        form: reqwest::multipart::Form,
        token: &str,
    ) -> Result<Response, reqwest::Error> {
        self.client
            .post(self.url(path))
            .bearer_auth(token)
            .multipart(form)
            .send()
            .await
    }

    /// Send a bodiless request to an absolute URL, used by the cache proxy's
    /// network fetcher.
    pub async fn send_absolute(
        &self,
        method: reqwest::Method,
        url: &str,
        headers: &[(String, String)],
    ) -> Result<Response, reqwest::Error> {
        let mut builder = self.client.request(method, url);
        for (name, value) in headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        builder.send().await
    }
}
