//! Story endpoints: list, submit, register and login.

use reqwest::multipart::{Form, Part};
use reqwest::Response;

use super::client::ApiClient;
use super::types::{
    ApiMessage, LoginRequest, LoginResponse, LoginResult, RegisterRequest, StoriesResponse, Story,
};
use super::ApiError;

/// Path of the story list/submission endpoint, relative to the API base.
pub const STORIES_PATH: &str = "/stories";

/// A story ready to be sent as multipart form data.
#[derive(Debug, Clone, PartialEq)]
pub struct StoryUpload {
    pub description: String,
    pub photo: Vec<u8>,
    pub photo_mime: String,
    pub file_name: String,
    pub lat: Option<f64>,
    pub lon: Option<f64>,
}

impl StoryUpload {
    /// Build the multipart body: `description`, `photo`, and `lat`/`lon` only when present.
    pub fn into_form(self) -> Result<Form, ApiError> {
        if self.description.is_empty() || self.photo.is_empty() {
            return Err(ApiError::Invalid(
                "Description and photo are required".to_string(),
            ));
        }

        let photo = Part::bytes(self.photo)
            .file_name(self.file_name)
            .mime_str(&self.photo_mime)
            .map_err(|e| ApiError::Invalid(format!("Invalid photo mime type: {}", e)))?;

        let mut form = Form::new()
            .text("description", self.description)
            .part("photo", photo);
        if let Some(lat) = self.lat {
            form = form.text("lat", lat.to_string());
        }
        if let Some(lon) = self.lon {
            form = form.text("lon", lon.to_string());
        }
        Ok(form)
    }
}

/// Map a non-success response to [`ApiError::Status`], using the body's
/// `message` when the server sent one.
pub(crate) async fn check_status(resp: Response) -> Result<Response, ApiError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }

    let body = resp.text().await.unwrap_or_default();
    let message = serde_json::from_str::<ApiMessage>(&body)
        .ok()
        .map(|m| m.message)
        .filter(|m| !m.is_empty())
        .unwrap_or_else(|| status.canonical_reason().unwrap_or("request failed").to_string());

    Err(ApiError::Status {
        status: status.as_u16(),
        message,
    })
}

/// Fetch the story feed with the foreground session token.
///
/// GET /stories
pub async fn fetch_stories(client: &ApiClient) -> Result<Vec<Story>, ApiError> {
    if client.access_token().await.is_none() {
        return Err(ApiError::Unauthorized);
    }

    let resp = check_status(client.authenticated_get(STORIES_PATH).await?).await?;
    let stories: StoriesResponse = resp.json().await?;
    Ok(stories.list_story)
}

/// Submit a story with an explicit bearer token.
///
/// POST /stories with multipart form data.
pub async fn add_story(
    client: &ApiClient,
    upload: StoryUpload,
    token: &str,
) -> Result<ApiMessage, ApiError> {
    let form = upload.into_form()?;
    let resp = check_status(
        client
            .multipart_post_with_token(STORIES_PATH, form, token)
            .await?,
    )
    .await?;

    Ok(resp.json().await.unwrap_or_default())
}

/// Log in and return the session token.
///
/// POST /login
pub async fn login(client: &ApiClient, email: &str, password: &str) -> Result<LoginResult, ApiError> {
    let request = LoginRequest {
        email: email.to_string(),
        password: password.to_string(),
    };
    let resp = check_status(client.post("/login", &request).await?).await?;
    let login: LoginResponse = resp.json().await?;
    Ok(login.login_result)
}

/// Create an account. The server answers with a plain message.
///
/// POST /register
pub async fn register(
    client: &ApiClient,
    name: &str,
    email: &str,
    password: &str,
) -> Result<ApiMessage, ApiError> {
    let request = RegisterRequest {
        name: name.to_string(),
        email: email.to_string(),
        password: password.to_string(),
    };
    let resp = check_status(client.post("/register", &request).await?).await?;
    Ok(resp.json().await?)
}
