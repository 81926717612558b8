//! Status state machine for background sync.
//!
//! Reported by the sync daemon in its logs and by the CLI after a manual sync.

use super::replay::ReplayError;

/// All states background sync can be in.
#[derive(Debug, Clone, PartialEq)]
pub enum SyncStatus {
    /// Nothing has been attempted yet.
    Idle,
    /// A replay trigger is being processed.
    Syncing,
    /// Last replay finished; the queue was drained or an auth failure was handled.
    Synced,
    /// Queued stories are waiting for the user to log in.
    Pending,
    /// Last replay hit a network or server error; waiting for re-delivery.
    Offline,
    /// Something went wrong locally (with human-readable description).
    Error(String),
}

impl SyncStatus {
    /// Human-readable status text.
    pub fn label(&self) -> &str {
        match self {
            SyncStatus::Idle => "Idle",
            SyncStatus::Syncing => "Syncing...",
            SyncStatus::Synced => "Synced",
            SyncStatus::Pending => "Waiting for login",
            SyncStatus::Offline => "Offline",
            SyncStatus::Error(_) => "Error",
        }
    }

    /// Whether the trigger must be delivered again later.
    pub fn needs_retry(&self) -> bool {
        matches!(
            self,
            SyncStatus::Pending | SyncStatus::Offline | SyncStatus::Error(_)
        )
    }

    /// Status after a failed replay.
    pub fn from_error(error: &ReplayError) -> Self {
        match error {
            ReplayError::AuthMissing => SyncStatus::Pending,
            ReplayError::Transient { .. } => SyncStatus::Offline,
            other => SyncStatus::Error(other.to_string()),
        }
    }
}
