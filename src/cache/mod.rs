//! Cache proxy in front of outbound GET requests.
//!
//! Two named partitions are kept in one SQLite file:
//! - the shell partition (`story-app-cache-<version>`) for static assets,
//!   filled at install time and on same-origin cache misses;
//! - the data partition (`story-app-data-<version>`) for story list responses,
//!   served stale-while-revalidate.
//!
//! Activating a new version deletes every partition whose name is not one of
//! the two current names.

pub mod proxy;
pub mod storage;

use reqwest::Method;
use thiserror::Error;

use crate::db::StorageError;

pub use proxy::{CacheNames, CacheProxy, Fetcher, HttpFetcher, Lifecycle, ProxyConfig};
pub use storage::{Cache, CacheStorage};

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("cache storage failed: {0}")]
    Storage(#[from] StorageError),
    #[error("network request failed: {0}")]
    Network(String),
    #[error("offline and no cached copy of {0}")]
    Offline(String),
}

/// An intercepted request. Cache identity is method + URL; headers are only
/// forwarded to the network.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProxyRequest {
    pub method: Method,
    pub url: String,
    pub headers: Vec<(String, String)>,
}

impl ProxyRequest {
    pub fn new(method: Method, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            headers: Vec::new(),
        }
    }

    pub fn get(url: impl Into<String>) -> Self {
        Self::new(Method::GET, url)
    }

    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.headers.push((name.to_string(), value.to_string()));
        self
    }
}

/// Response type as seen by the proxy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseKind {
    /// Same-origin response.
    Basic,
    /// Readable cross-origin response.
    Cors,
    /// Unreadable cross-origin response; status is not meaningful.
    Opaque,
}

impl ResponseKind {
    fn as_str(&self) -> &'static str {
        match self {
            ResponseKind::Basic => "basic",
            ResponseKind::Cors => "cors",
            ResponseKind::Opaque => "opaque",
        }
    }

    fn parse(value: &str) -> Self {
        match value {
            "basic" => ResponseKind::Basic,
            "opaque" => ResponseKind::Opaque,
            _ => ResponseKind::Cors,
        }
    }
}

/// Where a response handed back by the proxy came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseSource {
    Network,
    Cache,
    /// The cached application shell, served because nothing better was available.
    ShellFallback,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ProxyResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
    pub kind: ResponseKind,
    pub source: ResponseSource,
}

impl ProxyResponse {
    /// A network response with no headers, mostly for fetchers and tests.
    pub fn network(status: u16, kind: ResponseKind, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status,
            headers: Vec::new(),
            body: body.into(),
            kind,
            source: ResponseSource::Network,
        }
    }

    pub fn is_ok(&self) -> bool {
        (200..300).contains(&self.status)
    }
}
