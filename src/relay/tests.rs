//! Unit tests for the credential relay.

#[cfg(test)]
mod credential_relay_tests {
    use std::sync::Arc;
    use std::time::Duration;

    use tokio::time::Instant;

    use crate::api::auth::{MemoryTokenStore, TokenStore};
    use crate::relay::{CredentialRelay, RelayMessage, TOKEN_REQUEST_TIMEOUT};

    fn store(token: Option<&str>) -> Arc<dyn TokenStore> {
        match token {
            Some(t) => Arc::new(MemoryTokenStore::with_token(t)),
            None => Arc::new(MemoryTokenStore::default()),
        }
    }

    #[test]
    fn test_message_wire_shape() {
        assert_eq!(
            serde_json::to_value(RelayMessage::RequestToken).unwrap(),
            serde_json::json!({"type": "REQUEST_TOKEN"})
        );
        assert_eq!(
            serde_json::to_value(RelayMessage::TokenResponse {
                token: Some("abc".into())
            })
            .unwrap(),
            serde_json::json!({"type": "TOKEN_RESPONSE", "token": "abc"})
        );

        let parsed: RelayMessage =
            serde_json::from_str(r#"{"type":"TOKEN_RESPONSE","token":null}"#).unwrap();
        assert_eq!(parsed, RelayMessage::TokenResponse { token: None });
    }

    #[tokio::test]
    async fn test_no_clients_resolves_none_immediately() {
        let relay = CredentialRelay::new();
        let started = Instant::now();

        assert_eq!(relay.request_token().await, None);
        assert!(started.elapsed() < Duration::from_secs(1));
    }

    #[tokio::test]
    async fn test_serving_client_returns_token() {
        let relay = CredentialRelay::new();
        let client = relay.connect().await;
        tokio::spawn(client.serve(store(Some("bearer-123"))));

        assert_eq!(relay.request_token().await.as_deref(), Some("bearer-123"));
        // The same client answers subsequent batches too.
        assert_eq!(relay.request_token().await.as_deref(), Some("bearer-123"));
    }

    #[tokio::test]
    async fn test_logged_out_client_returns_none() {
        let relay = CredentialRelay::new();
        let client = relay.connect().await;
        tokio::spawn(client.serve(store(None)));

        assert_eq!(relay.request_token().await, None);
    }

    #[tokio::test]
    async fn test_empty_token_counts_as_none() {
        let relay = CredentialRelay::new();
        let client = relay.connect().await;
        tokio::spawn(client.serve(store(Some(""))));

        assert_eq!(relay.request_token().await, None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_silent_client_times_out_after_eight_seconds() {
        let relay = CredentialRelay::new();
        // Connected but never answers.
        let _silent = relay.connect().await;

        let started = Instant::now();
        assert_eq!(relay.request_token().await, None);
        assert!(started.elapsed() >= TOKEN_REQUEST_TIMEOUT);
    }

    #[tokio::test]
    async fn test_visible_client_is_preferred() {
        let relay = CredentialRelay::new();

        let hidden = relay.connect().await;
        let visible = relay.connect().await;
        visible.set_visible(true);

        tokio::spawn(hidden.serve(store(Some("hidden-token"))));
        tokio::spawn(visible.serve(store(Some("visible-token"))));

        assert_eq!(relay.request_token().await.as_deref(), Some("visible-token"));
    }

    #[tokio::test]
    async fn test_falls_back_to_first_client_when_none_visible() {
        let relay = CredentialRelay::new();

        let first = relay.connect().await;
        let second = relay.connect().await;
        tokio::spawn(first.serve(store(Some("first"))));
        tokio::spawn(second.serve(store(Some("second"))));

        assert_eq!(relay.request_token().await.as_deref(), Some("first"));
    }

    #[tokio::test]
    async fn test_disconnected_clients_are_pruned() {
        let relay = CredentialRelay::new();
        let gone = relay.connect().await;
        let alive = relay.connect().await;
        drop(gone);
        tokio::spawn(alive.serve(store(Some("alive"))));

        assert_eq!(relay.client_count().await, 1);
        assert_eq!(relay.request_token().await.as_deref(), Some("alive"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_late_answer_does_not_leak_into_next_request() {
        let relay = CredentialRelay::with_timeout(Duration::from_secs(1));
        let mut slow = relay.connect().await;
        let slow_store = MemoryTokenStore::with_token("stale");

        // First request times out while the client is not reading its inbox.
        assert_eq!(relay.request_token().await, None);

        // The client now answers the old request; that answer must be discarded.
        assert!(slow.handle_next(&slow_store).await);
        slow_store.store_token("fresh").unwrap();

        let answer = tokio::spawn(async move {
            slow.handle_next(&slow_store).await;
            slow
        });
        assert_eq!(relay.request_token().await.as_deref(), Some("fresh"));
        drop(answer.await.unwrap());
    }
}
