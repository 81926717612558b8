//! Push subscription registration with the story API.
//!
//! The server keeps one subscription per device and pushes a notification
//! when a new story is posted. Both calls need the session token.

use super::client::ApiClient;
use super::stories::check_status;
use super::types::{ApiMessage, PushSubscription};
use super::ApiError;

/// Path that registers a subscription, relative to the API base.
pub const SUBSCRIBE_PATH: &str = "/push-subscribe";
/// Path that removes a subscription, relative to the API base.
pub const UNSUBSCRIBE_PATH: &str = "/push-unsubscribe";

/// POST /push-subscribe
pub async fn subscribe(
    client: &ApiClient,
    subscription: &PushSubscription,
    token: &str,
) -> Result<ApiMessage, ApiError> {
    send(client, SUBSCRIBE_PATH, subscription, token).await
}

/// POST /push-unsubscribe
pub async fn unsubscribe(
    client: &ApiClient,
    subscription: &PushSubscription,
    token: &str,
) -> Result<ApiMessage, ApiError> {
    send(client, UNSUBSCRIBE_PATH, subscription, token).await
}

async fn send(
    client: &ApiClient,
    path: &str,
    subscription: &PushSubscription,
    token: &str,
) -> Result<ApiMessage, ApiError> {
    if token.is_empty() {
        return Err(ApiError::Unauthorized);
    }
    let resp = check_status(client.post_with_token(path, subscription, token).await?).await?;
    log::info!("Push subscription sent to {}", path);
    Ok(resp.json().await.unwrap_or_default())
}
