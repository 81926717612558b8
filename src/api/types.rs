//! Request and response types for the story API.
//!
//! All structs use camelCase serialization to match the API's JSON format.

use serde::{Deserialize, Serialize};

/// Login request body sent to POST /login.
#[derive(Debug, Serialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// Account creation body sent to POST /register.
#[derive(Debug, Serialize)]
pub struct RegisterRequest {
    pub name: String,
    pub email: String,
    pub password: String,
}

/// Session details inside a successful login response.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginResult {
    pub user_id: String,
    pub name: String,
    pub token: String,
}

/// Login response from POST /login.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginResponse {
    pub error: bool,
    pub message: String,
    pub login_result: LoginResult,
}

/// A story as returned by GET /stories.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Story {
    pub id: String,
    pub name: String,
    pub description: String,
    pub photo_url: String,
    pub created_at: String,
    #[serde(default)]
    pub lat: Option<f64>,
    #[serde(default)]
    pub lon: Option<f64>,
}

/// Response from GET /stories.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoriesResponse {
    pub error: bool,
    pub message: String,
    #[serde(default)]
    pub list_story: Vec<Story>,
}

/// Generic `{ error, message }` body returned by POST /stories and by failures.
#[derive(Debug, Default, Deserialize)]
pub struct ApiMessage {
    #[serde(default)]
    pub error: bool,
    #[serde(default)]
    pub message: String,
}

/// Key material of a push subscription, base64url encoded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PushKeys {
    pub p256dh: String,
    pub auth: String,
}

/// A push subscription in the JSON shape push services hand out.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PushSubscription {
    pub endpoint: String,
    #[serde(default)]
    pub expiration_time: Option<i64>,
    pub keys: PushKeys,
}
