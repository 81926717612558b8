//! Foreground submission: one direct attempt, then fall back to the queue.

use thiserror::Error;

use crate::api::auth::TokenStore;
use crate::api::stories::StoryUpload;
use crate::db::StorageError;
use crate::queue::{PendingSubmission, QueueStore};

use super::replay::StorySubmitter;
use super::SyncRegistry;

/// A story as entered by the user, with the photo still as raw bytes.
#[derive(Debug, Clone, PartialEq)]
pub struct StoryDraft {
    pub description: String,
    pub photo: Vec<u8>,
    pub photo_mime: String,
    /// Original photo file name, used for the direct upload.
    pub file_name: String,
    pub lat: Option<f64>,
    pub lon: Option<f64>,
}

impl StoryDraft {
    fn to_upload(&self) -> StoryUpload {
        StoryUpload {
            description: self.description.clone(),
            photo: self.photo.clone(),
            photo_mime: self.photo_mime.clone(),
            file_name: self.file_name.clone(),
            lat: self.lat,
            lon: self.lon,
        }
    }

    fn to_pending(&self) -> PendingSubmission {
        PendingSubmission::new(
            self.description.clone(),
            &self.photo_mime,
            &self.photo,
            self.lat,
            self.lon,
        )
    }
}

#[derive(Debug, Error)]
pub enum CaptureError {
    #[error("Description and photo are required")]
    Invalid,
    #[error("Failed to save offline: {0}")]
    Storage(#[from] StorageError),
}

/// How a queued story will eventually be sent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplayScheduling {
    /// A deferred sync trigger was registered.
    Registered,
    /// No trigger could be registered; the story syncs on the next app start.
    NextVisit,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// The direct attempt succeeded.
    Submitted,
    /// The direct attempt failed and the story was queued.
    Queued {
        id: String,
        scheduling: ReplayScheduling,
    },
}

impl SubmitOutcome {
    /// Message shown to the user.
    pub fn message(&self) -> &'static str {
        match self {
            SubmitOutcome::Submitted => "Story added successfully online!",
            SubmitOutcome::Queued {
                scheduling: ReplayScheduling::Registered,
                ..
            } => "Offline saved! Will sync when online.",
            SubmitOutcome::Queued {
                scheduling: ReplayScheduling::NextVisit,
                ..
            } => "Offline saved! Sync will happen when the app is next visited online.",
        }
    }
}

/// Queue a draft and ask for a deferred sync trigger.
///
/// `registry` is `None` when the host cannot deliver deferred triggers.
pub async fn capture(
    queue: &QueueStore,
    registry: Option<&SyncRegistry>,
    draft: &StoryDraft,
) -> Result<SubmitOutcome, CaptureError> {
    let saved = queue.enqueue(draft.to_pending()).await?;

    let scheduling = match registry {
        Some(registry) if registry.register(super::SYNC_TAG) => ReplayScheduling::Registered,
        _ => ReplayScheduling::NextVisit,
    };

    Ok(SubmitOutcome::Queued {
        id: saved.id,
        scheduling,
    })
}

/// Submit a story directly; on any failure queue it for replay instead.
///
/// The direct attempt is made exactly once. A missing session token counts
/// as a failed attempt.
pub async fn submit_or_queue<S: StorySubmitter>(
    submitter: &S,
    tokens: &dyn TokenStore,
    queue: &QueueStore,
    registry: Option<&SyncRegistry>,
    draft: &StoryDraft,
) -> Result<SubmitOutcome, CaptureError> {
    if draft.description.trim().is_empty() || draft.photo.is_empty() {
        return Err(CaptureError::Invalid);
    }

    let attempt = match tokens.load_token() {
        Ok(Some(token)) => submitter
            .submit_story(draft.to_upload(), &token)
            .await
            .map_err(|e| e.to_string()),
        Ok(None) => Err("Unauthorized: no token".to_string()),
        Err(e) => Err(e.to_string()),
    };

    match attempt {
        Ok(()) => Ok(SubmitOutcome::Submitted),
        Err(reason) => {
            log::warn!("Network submit failed, saving story offline: {}", reason);
            capture(queue, registry, draft).await
        }
    }
}
