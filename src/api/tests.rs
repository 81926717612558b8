//! Tests for the story endpoints against a local mock server.

#[cfg(test)]
mod story_api_tests {
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use crate::api::push;
    use crate::api::stories::{self, StoryUpload};
    use crate::api::types::{PushKeys, PushSubscription};
    use crate::api::{ApiClient, ApiError};

    fn make_upload() -> StoryUpload {
        StoryUpload {
            description: "Morning market".to_string(),
            photo: vec![0xFF, 0xD8, 0xFF, 0xE0],
            photo_mime: "image/jpeg".to_string(),
            file_name: "offline_temp-1-aaaaaaa.jpg".to_string(),
            lat: Some(-6.2),
            lon: None,
        }
    }

    #[tokio::test]
    async fn test_add_story_sends_bearer_token() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/stories"))
            .and(header("authorization", "Bearer secret"))
            .respond_with(
                ResponseTemplate::new(201)
                    .set_body_json(serde_json::json!({"error": false, "message": "Story created successfully"})),
            )
            .expect(1)
            .mount(&server)
            .await;

        let client = ApiClient::new(&server.uri());
        let resp = stories::add_story(&client, make_upload(), "secret").await.unwrap();
        assert!(!resp.error);
        assert_eq!(resp.message, "Story created successfully");
    }

    #[tokio::test]
    async fn test_add_story_unauthorized_is_auth_rejection() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/stories"))
            .respond_with(
                ResponseTemplate::new(401)
                    .set_body_json(serde_json::json!({"error": true, "message": "Invalid token"})),
            )
            .mount(&server)
            .await;

        let client = ApiClient::new(&server.uri());
        let err = stories::add_story(&client, make_upload(), "expired").await.unwrap_err();

        assert!(err.is_auth_rejection());
        match err {
            ApiError::Status { status, message } => {
                assert_eq!(status, 401);
                assert_eq!(message, "Invalid token");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_add_story_server_error_is_not_auth_rejection() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/stories"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let client = ApiClient::new(&server.uri());
        let err = stories::add_story(&client, make_upload(), "secret").await.unwrap_err();
        assert!(!err.is_auth_rejection());
        assert!(matches!(err, ApiError::Status { status: 503, .. }));
    }

    #[tokio::test]
    async fn test_add_story_requires_photo_before_network() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(201))
            .expect(0)
            .mount(&server)
            .await;

        let client = ApiClient::new(&server.uri());
        let mut upload = make_upload();
        upload.photo.clear();

        let err = stories::add_story(&client, upload, "secret").await.unwrap_err();
        assert!(matches!(err, ApiError::Invalid(_)));
    }

    #[tokio::test]
    async fn test_fetch_stories_reads_list() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/stories"))
            .and(header("authorization", "Bearer secret"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "error": false,
                "message": "Stories fetched successfully",
                "listStory": [{
                    "id": "story-1",
                    "name": "Dimas",
                    "description": "Lorem ipsum",
                    "photoUrl": "https://example.com/1.jpg",
                    "createdAt": "2022-01-08T06:34:18.598Z",
                    "lat": -10.212,
                    "lon": -16.002
                }]
            })))
            .mount(&server)
            .await;

        let client = ApiClient::new(&server.uri());
        client.set_access_token("secret".to_string()).await;

        let stories = stories::fetch_stories(&client).await.unwrap();
        assert_eq!(stories.len(), 1);
        assert_eq!(stories[0].id, "story-1");
        assert_eq!(stories[0].lat, Some(-10.212));
    }

    #[tokio::test]
    async fn test_fetch_stories_without_token_fails_fast() {
        let client = ApiClient::new("http://127.0.0.1:9");
        let err = stories::fetch_stories(&client).await.unwrap_err();
        assert!(matches!(err, ApiError::Unauthorized));
    }

    #[tokio::test]
    async fn test_login_returns_token() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/login"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "error": false,
                "message": "success",
                "loginResult": {"userId": "user-1", "name": "Arif", "token": "jwt-token"}
            })))
            .mount(&server)
            .await;

        let client = ApiClient::new(&server.uri());
        let result = stories::login(&client, "a@b.c", "password").await.unwrap();
        assert_eq!(result.token, "jwt-token");
        assert_eq!(result.user_id, "user-1");
    }

    #[test]
    fn test_base_url_trailing_slash_trimmed() {
        let client = ApiClient::new("https://story-api.dicoding.dev/v1/");
        assert_eq!(client.url("/stories"), "https://story-api.dicoding.dev/v1/stories");
    }

    fn make_subscription() -> PushSubscription {
        PushSubscription {
            endpoint: "https://push.example/send/abc".to_string(),
            expiration_time: None,
            keys: PushKeys {
                p256dh: "BNcRd".to_string(),
                auth: "tBHI".to_string(),
            },
        }
    }

    #[tokio::test]
    async fn test_register_reports_server_message() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/register"))
            .and(body_json(serde_json::json!({
                "name": "Arif",
                "email": "a@b.c",
                "password": "password"
            })))
            .respond_with(
                ResponseTemplate::new(201)
                    .set_body_json(serde_json::json!({"error": false, "message": "User created"})),
            )
            .expect(1)
            .mount(&server)
            .await;

        let client = ApiClient::new(&server.uri());
        let resp = stories::register(&client, "Arif", "a@b.c", "password").await.unwrap();
        assert_eq!(resp.message, "User created");
    }

    #[tokio::test]
    async fn test_register_duplicate_email_is_status_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/register"))
            .respond_with(
                ResponseTemplate::new(400)
                    .set_body_json(serde_json::json!({"error": true, "message": "Email is already taken"})),
            )
            .mount(&server)
            .await;

        let client = ApiClient::new(&server.uri());
        let err = stories::register(&client, "Arif", "a@b.c", "password").await.unwrap_err();
        match err {
            ApiError::Status { status, message } => {
                assert_eq!(status, 400);
                assert_eq!(message, "Email is already taken");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_push_subscribe_posts_subscription_with_token() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/push-subscribe"))
            .and(header("authorization", "Bearer secret"))
            .and(body_json(serde_json::json!({
                "endpoint": "https://push.example/send/abc",
                "expirationTime": null,
                "keys": {"p256dh": "BNcRd", "auth": "tBHI"}
            })))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({"error": false, "message": "Subscribed"})),
            )
            .expect(1)
            .mount(&server)
            .await;

        let client = ApiClient::new(&server.uri());
        let resp = push::subscribe(&client, &make_subscription(), "secret").await.unwrap();
        assert_eq!(resp.message, "Subscribed");
    }

    #[tokio::test]
    async fn test_push_unsubscribe_uses_its_own_path() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/push-unsubscribe"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"error": false, "message": "Unsubscribed"})))
            .expect(1)
            .mount(&server)
            .await;

        let client = ApiClient::new(&server.uri());
        push::unsubscribe(&client, &make_subscription(), "secret").await.unwrap();
    }

    #[tokio::test]
    async fn test_push_subscribe_without_token_sends_nothing() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let client = ApiClient::new(&server.uri());
        let err = push::subscribe(&client, &make_subscription(), "").await.unwrap_err();
        assert!(matches!(err, ApiError::Unauthorized));
    }
}
