//! User-visible notifications raised by background sync and push messages.

use serde::Deserialize;

/// Route opened when a notification without a story is clicked.
pub const HOME_ROUTE: &str = "/#/home";

const PUSH_DEFAULT_TITLE: &str = "New Story Notification";
const PUSH_DEFAULT_BODY: &str = "There is an interesting new story!";

/// A notification with a title and body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub title: String,
    pub body: String,
    /// Story the notification points at, for push messages.
    pub story_id: Option<String>,
}

/// JSON body of a push message sent by the story server.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PushPayload {
    title: Option<String>,
    body: Option<String>,
    story_id: Option<String>,
}

impl Notification {
    pub fn new(title: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            body: body.into(),
            story_id: None,
        }
    }

    /// Queued stories exist but no session token could be obtained.
    pub fn sync_pending() -> Self {
        Self::new(
            "Sync Pending",
            "Offline stories pending. Please ensure you are logged in.",
        )
    }

    /// A queued story reached the server. `excerpt` is the start of its description.
    pub fn sync_success(excerpt: &str) -> Self {
        Self::new(
            "Sync Success",
            format!("Story: {}... successfully uploaded.", excerpt),
        )
    }

    /// The server rejected the session token; the story was discarded.
    pub fn login_expired() -> Self {
        Self::new(
            "Sync Failed: Login Expired",
            "Please re-login. Story removed as it cannot be synced.",
        )
    }

    /// Notification for an incoming push message.
    ///
    /// Missing or empty fields, and payloads that are not JSON, fall back to
    /// generic text.
    pub fn from_push(data: Option<&[u8]>) -> Self {
        let payload = match data {
            Some(bytes) => serde_json::from_slice(bytes).unwrap_or_else(|e| {
                log::warn!("Malformed push payload, using defaults: {}", e);
                PushPayload::default()
            }),
            None => PushPayload::default(),
        };

        Self {
            title: payload
                .title
                .filter(|t| !t.is_empty())
                .unwrap_or_else(|| PUSH_DEFAULT_TITLE.to_string()),
            body: payload
                .body
                .filter(|b| !b.is_empty())
                .unwrap_or_else(|| PUSH_DEFAULT_BODY.to_string()),
            story_id: payload.story_id.filter(|id| !id.is_empty()),
        }
    }

    /// Route to open when the notification is clicked.
    pub fn click_target(&self) -> String {
        match &self.story_id {
            Some(id) => format!("/#/detail/{}", id),
            None => HOME_ROUTE.to_string(),
        }
    }
}

/// Sink for user-visible notifications.
pub trait Notifier: Send + Sync {
    fn show(&self, notification: Notification);
}

/// Notifier that writes each notification to the log.
#[derive(Debug, Default)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn show(&self, notification: Notification) {
        match notification.story_id {
            Some(_) => log::info!(
                "[notification] {}: {} ({})",
                notification.title,
                notification.body,
                notification.click_target()
            ),
            None => log::info!("[notification] {}: {}", notification.title, notification.body),
        }
    }
}
