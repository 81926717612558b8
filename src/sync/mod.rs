//! Background sync of stories captured offline.
//!
//! The foreground queues a story and registers the [`SYNC_TAG`] trigger. The
//! daemon receives triggers, runs the replay engine, and when a replay fails
//! delivers the trigger again on its next connectivity check. That re-delivery
//! is the only retry mechanism; the replay engine itself never loops.

pub mod capture;
pub mod replay;
pub mod status;

pub use capture::{submit_or_queue, CaptureError, ReplayScheduling, StoryDraft, SubmitOutcome};
pub use replay::{ReplayEngine, ReplayError, ReplayReport, StorySubmitter, SubmitError};
pub use status::SyncStatus;

use std::time::Duration;

use tokio::sync::mpsc;

/// Tag identifying the deferred replay trigger.
pub const SYNC_TAG: &str = "sync-offline-stories";

/// Default interval between connectivity checks (30 seconds).
pub const SYNC_INTERVAL: Duration = Duration::from_secs(30);

/// Registration side of deferred sync triggers.
///
/// Registering a tag that is already pending coalesces with it.
#[derive(Clone)]
pub struct SyncRegistry {
    tx: mpsc::Sender<String>,
}

impl SyncRegistry {
    /// Create a registry and the receiver the daemon listens on.
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<String>) {
        let (tx, rx) = mpsc::channel(capacity);
        (Self { tx }, rx)
    }

    /// Request a deferred trigger for `tag`. Returns `false` when nothing is
    /// listening for triggers.
    pub fn register(&self, tag: &str) -> bool {
        match self.tx.try_send(tag.to_string()) {
            Ok(()) => true,
            // A trigger is already waiting; it will drain the queue too.
            Err(mpsc::error::TrySendError::Full(_)) => true,
            Err(mpsc::error::TrySendError::Closed(_)) => false,
        }
    }
}

/// The background sync daemon.
///
/// Runs in a tokio task. Delivers a replay whenever a [`SYNC_TAG`] trigger
/// arrives. On each interval tick it re-delivers while the last replay
/// failed, or when records are queued that no trigger announced (stories
/// captured by another process, or left over from a previous run).
pub struct SyncDaemon<S: StorySubmitter> {
    engine: ReplayEngine<S>,
    triggers: mpsc::Receiver<String>,
    poll_interval: Duration,
    status: SyncStatus,
}

impl<S: StorySubmitter> SyncDaemon<S> {
    pub fn new(engine: ReplayEngine<S>, triggers: mpsc::Receiver<String>) -> Self {
        Self {
            engine,
            triggers,
            poll_interval: SYNC_INTERVAL,
            status: SyncStatus::Idle,
        }
    }

    pub fn with_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    pub fn status(&self) -> &SyncStatus {
        &self.status
    }

    /// Main run loop. Returns once every [`SyncRegistry`] has been dropped.
    pub async fn run(&mut self) {
        match self.engine.queue().is_empty().await {
            Ok(false) => {
                log::info!("Offline stories found at startup, scheduling sync");
                self.status = SyncStatus::Offline;
            }
            Ok(true) => {}
            Err(e) => log::warn!("Failed to inspect offline queue at startup: {}", e),
        }

        let mut ticker = tokio::time::interval(self.poll_interval);
        // The first tick fires immediately; skip it so startup work settles.
        ticker.tick().await;

        log::info!(
            "Sync daemon started (interval: {}s)",
            self.poll_interval.as_secs()
        );

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if self.status.needs_retry() {
                        log::info!("Re-delivering {} after failed sync", SYNC_TAG);
                        self.deliver(SYNC_TAG).await;
                    } else if self.has_pending().await {
                        log::info!("Offline stories queued without a trigger, syncing");
                        self.deliver(SYNC_TAG).await;
                    }
                }
                trigger = self.triggers.recv() => match trigger {
                    Some(tag) => {
                        self.deliver(&tag).await;
                    }
                    None => {
                        log::info!("Sync trigger channel closed, daemon stopping");
                        break;
                    }
                },
            }
        }
    }

    /// Whether the queue holds records. Other processes may enqueue into the
    /// same store without being able to reach this daemon's registry.
    async fn has_pending(&self) -> bool {
        match self.engine.queue().is_empty().await {
            Ok(empty) => !empty,
            Err(e) => {
                log::warn!("Failed to inspect offline queue: {}", e);
                false
            }
        }
    }

    /// Deliver one trigger. Unknown tags are ignored.
    pub async fn deliver(&mut self, tag: &str) -> Option<ReplayReport> {
        if tag != SYNC_TAG {
            log::debug!("Ignoring unknown sync tag {}", tag);
            return None;
        }

        self.status = SyncStatus::Syncing;
        match self.engine.replay().await {
            Ok(report) => {
                if !report.is_noop() {
                    log::info!(
                        "Sync finished: {} uploaded, {} discarded",
                        report.uploaded.len(),
                        usize::from(report.discarded.is_some())
                    );
                }
                self.status = SyncStatus::Synced;
                Some(report)
            }
            Err(e) => {
                log::warn!("Sync failed, will retry: {}", e);
                self.status = SyncStatus::from_error(&e);
                None
            }
        }
    }
}
