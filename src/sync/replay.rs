//! Replay of queued submissions when a sync trigger is delivered.
//!
//! Per-record policy:
//! - success: remove the record and notify;
//! - credential rejected (401/403): remove the record, notify that the login
//!   expired, and stop processing this batch;
//! - anything else: leave the record queued and fail the whole invocation so
//!   the trigger is delivered again later.
//!
//! There is no retry loop here. Scheduling the next attempt belongs to
//! whoever delivers triggers (see [`super::SyncDaemon`]).

use std::future::Future;
use std::sync::Arc;

use thiserror::Error;

use crate::api::stories::{self, StoryUpload};
use crate::api::{ApiClient, ApiError};
use crate::db::StorageError;
use crate::notify::{Notification, Notifier};
use crate::queue::{PayloadError, PendingSubmission, QueueStore};
use crate::relay::CredentialRelay;

/// Outcome of a single submission attempt.
#[derive(Debug, Error)]
pub enum SubmitError {
    #[error("credential rejected with status {0}")]
    AuthRejected(u16),
    #[error("{0}")]
    Transient(String),
}

impl From<ApiError> for SubmitError {
    fn from(err: ApiError) -> Self {
        match err {
            ApiError::Status { status, .. } if status == 401 || status == 403 => {
                SubmitError::AuthRejected(status)
            }
            other => SubmitError::Transient(other.to_string()),
        }
    }
}

/// Remote story submission, abstracted for testability.
///
/// In production, `ApiClient` implements this via POST /stories.
/// In tests, a mock implementation controls success/failure behavior.
pub trait StorySubmitter: Send + Sync {
    fn submit_story(
        &self,
        upload: StoryUpload,
        token: &str,
    ) -> impl Future<Output = Result<(), SubmitError>> + Send;
}

impl StorySubmitter for ApiClient {
    async fn submit_story(&self, upload: StoryUpload, token: &str) -> Result<(), SubmitError> {
        stories::add_story(self, upload, token).await?;
        Ok(())
    }
}

/// Failure of a whole replay invocation. Any of these means "deliver the
/// trigger again later"; nothing in the queue was lost.
#[derive(Debug, Error)]
pub enum ReplayError {
    #[error("queue storage failed: {0}")]
    Storage(#[from] StorageError),
    #[error("Missing token for sync")]
    AuthMissing,
    #[error("upload of {id} failed: {reason}")]
    Transient { id: String, reason: String },
    #[error("stored photo for {id} is unreadable: {reason}")]
    Payload { id: String, reason: String },
}

/// What a successful replay invocation did.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct ReplayReport {
    /// Ids uploaded and removed, in processing order.
    pub uploaded: Vec<String>,
    /// Id discarded because the server rejected the credential.
    pub discarded: Option<String>,
    /// Records left untouched because the batch stopped early.
    pub skipped: usize,
}

impl ReplayReport {
    pub fn is_noop(&self) -> bool {
        self.uploaded.is_empty() && self.discarded.is_none()
    }
}

/// Build the upload for a queued record.
pub fn upload_for(record: &PendingSubmission) -> Result<StoryUpload, PayloadError> {
    let photo = record.decode_photo()?;
    Ok(StoryUpload {
        description: record.description.clone(),
        photo: photo.bytes,
        photo_mime: photo.mime,
        file_name: record.upload_file_name(),
        lat: record.lat,
        lon: record.lon,
    })
}

/// Drains the queue once per delivered trigger.
///
/// Not re-entrant: callers must not run two replays at once. The daemon
/// processes triggers one at a time.
pub struct ReplayEngine<S: StorySubmitter> {
    queue: QueueStore,
    relay: Arc<CredentialRelay>,
    submitter: Arc<S>,
    notifier: Arc<dyn Notifier>,
}

impl<S: StorySubmitter> ReplayEngine<S> {
    pub fn new(
        queue: QueueStore,
        relay: Arc<CredentialRelay>,
        submitter: Arc<S>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            queue,
            relay,
            submitter,
            notifier,
        }
    }

    pub fn queue(&self) -> &QueueStore {
        &self.queue
    }

    /// Run one replay invocation.
    pub async fn replay(&self) -> Result<ReplayReport, ReplayError> {
        let records = self.queue.list_all().await?;
        if records.is_empty() {
            log::debug!("Replay: queue empty, nothing to do");
            return Ok(ReplayReport::default());
        }

        let Some(token) = self.relay.request_token().await else {
            log::error!("Token is missing, cannot sync stories; waiting for the next trigger");
            self.notifier.show(Notification::sync_pending());
            return Err(ReplayError::AuthMissing);
        };

        log::info!("Replaying {} offline stories", records.len());
        let total = records.len();
        let mut report = ReplayReport::default();

        for (index, record) in records.iter().enumerate() {
            let upload = upload_for(record).map_err(|e| ReplayError::Payload {
                id: record.id.clone(),
                reason: e.to_string(),
            })?;

            match self.submitter.submit_story(upload, &token).await {
                Ok(()) => {
                    self.queue.remove(&record.id).await?;
                    log::info!("Offline story {} uploaded", record.id);
                    self.notifier
                        .show(Notification::sync_success(&record.excerpt()));
                    report.uploaded.push(record.id.clone());
                }
                Err(SubmitError::AuthRejected(status)) => {
                    log::warn!(
                        "Credential rejected ({}) while syncing {}, discarding it",
                        status,
                        record.id
                    );
                    self.notifier.show(Notification::login_expired());
                    self.queue.remove(&record.id).await?;
                    report.discarded = Some(record.id.clone());
                    report.skipped = total - index - 1;
                    break;
                }
                Err(SubmitError::Transient(reason)) => {
                    log::error!("Error during sync of story {}: {}", record.id, reason);
                    return Err(ReplayError::Transient {
                        id: record.id.clone(),
                        reason,
                    });
                }
            }
        }

        Ok(report)
    }
}
