//! API client module for the story service.
//!
//! Provides the HTTP client with bearer-token injection, keychain token
//! storage, story and push subscription endpoints, and request/response
//! types matching the API.

pub mod auth;
pub mod client;
pub mod push;
pub mod stories;
pub mod types;
#[cfg(test)]
mod tests;

use thiserror::Error;

pub use client::ApiClient;
pub use stories::StoryUpload;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("request failed: {0}")]
    Network(#[from] reqwest::Error),
    #[error("server responded {status}: {message}")]
    Status { status: u16, message: String },
    #[error("Unauthorized: no token")]
    Unauthorized,
    #[error("invalid request: {0}")]
    Invalid(String),
}

impl ApiError {
    /// Whether the server rejected the credential (401 or 403).
    pub fn is_auth_rejection(&self) -> bool {
        matches!(self, ApiError::Status { status: 401 | 403, .. })
    }
}
