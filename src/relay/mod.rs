//! Credential relay between the background worker and foreground contexts.
//!
//! The worker has no access to the session token. To sync it broadcasts a
//! `REQUEST_TOKEN` message to one connected foreground context (a visible one
//! if any) and waits up to [`TOKEN_REQUEST_TIMEOUT`] for the matching
//! `TOKEN_RESPONSE`. Responses are correlated by message type only, so at most
//! one request may be outstanding; [`CredentialRelay::request_token`] holds a
//! lock for its whole duration to enforce that.

#[cfg(test)]
mod tests;

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, Mutex, RwLock};

use crate::api::auth::TokenStore;

/// How long the worker waits for a foreground context to answer.
pub const TOKEN_REQUEST_TIMEOUT: Duration = Duration::from_secs(8);

const CHANNEL_CAPACITY: usize = 8;

/// Messages exchanged between the worker and foreground contexts.
///
/// Serialized as `{"type":"REQUEST_TOKEN"}` and
/// `{"type":"TOKEN_RESPONSE","token":...}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RelayMessage {
    RequestToken,
    TokenResponse { token: Option<String> },
}

/// Worker-side view of one connected foreground context.
struct ClientHandle {
    id: u64,
    visible: Arc<AtomicBool>,
    tx: mpsc::Sender<RelayMessage>,
}

/// Worker side of the relay.
pub struct CredentialRelay {
    clients: RwLock<Vec<ClientHandle>>,
    next_client_id: AtomicU64,
    responses_tx: mpsc::Sender<RelayMessage>,
    responses_rx: Mutex<mpsc::Receiver<RelayMessage>>,
    timeout: Duration,
}

impl CredentialRelay {
    pub fn new() -> Self {
        Self::with_timeout(TOKEN_REQUEST_TIMEOUT)
    }

    pub fn with_timeout(timeout: Duration) -> Self {
        let (responses_tx, responses_rx) = mpsc::channel(CHANNEL_CAPACITY);
        Self {
            clients: RwLock::new(Vec::new()),
            next_client_id: AtomicU64::new(1),
            responses_tx,
            responses_rx: Mutex::new(responses_rx),
            timeout,
        }
    }

    /// Register a new foreground context. It starts out not visible.
    pub async fn connect(&self) -> ForegroundContext {
        let id = self.next_client_id.fetch_add(1, Ordering::SeqCst);
        let (tx, inbox) = mpsc::channel(CHANNEL_CAPACITY);
        let visible = Arc::new(AtomicBool::new(false));

        self.clients.write().await.push(ClientHandle {
            id,
            visible: visible.clone(),
            tx,
        });
        log::debug!("Foreground context {} connected", id);

        ForegroundContext {
            id,
            visible,
            inbox,
            reply: self.responses_tx.clone(),
        }
    }

    /// Number of foreground contexts still connected.
    pub async fn client_count(&self) -> usize {
        let mut clients = self.clients.write().await;
        clients.retain(|c| !c.tx.is_closed());
        clients.len()
    }

    /// Pick the visible context if there is one, else the first connected.
    async fn pick_client(&self) -> Option<(u64, mpsc::Sender<RelayMessage>)> {
        let mut clients = self.clients.write().await;
        clients.retain(|c| !c.tx.is_closed());

        clients
            .iter()
            .find(|c| c.visible.load(Ordering::SeqCst))
            .or_else(|| clients.first())
            .map(|c| (c.id, c.tx.clone()))
    }

    /// Ask a foreground context for the session token.
    ///
    /// Resolves to `None` immediately when no context is connected, and after
    /// the timeout when none answers. An empty token counts as `None`.
    pub async fn request_token(&self) -> Option<String> {
        let mut responses = self.responses_rx.lock().await;

        // Answers that arrived after an earlier request timed out are stale.
        while responses.try_recv().is_ok() {}

        let Some((client_id, client)) = self.pick_client().await else {
            log::info!("No foreground context connected, token unavailable");
            return None;
        };

        if client.send(RelayMessage::RequestToken).await.is_err() {
            log::warn!("Foreground context {} went away before token request", client_id);
            return None;
        }

        let wait = async {
            loop {
                match responses.recv().await {
                    Some(RelayMessage::TokenResponse { token }) => return token,
                    Some(other) => log::debug!("Ignoring relay message {:?}", other),
                    None => return None,
                }
            }
        };

        match tokio::time::timeout(self.timeout, wait).await {
            Ok(token) => token.filter(|t| !t.is_empty()),
            Err(_) => {
                log::warn!(
                    "No token response within {}s, treating as logged out",
                    self.timeout.as_secs()
                );
                None
            }
        }
    }
}

impl Default for CredentialRelay {
    fn default() -> Self {
        Self::new()
    }
}

/// Foreground side of the relay: answers token requests from its own store.
pub struct ForegroundContext {
    id: u64,
    visible: Arc<AtomicBool>,
    inbox: mpsc::Receiver<RelayMessage>,
    reply: mpsc::Sender<RelayMessage>,
}

impl ForegroundContext {
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Mark this context as the visible/focused one.
    pub fn set_visible(&self, visible: bool) {
        self.visible.store(visible, Ordering::SeqCst);
    }

    /// Wait for the next message and answer it if it is a token request.
    ///
    /// Returns `false` once the worker side has been dropped.
    pub async fn handle_next(&mut self, store: &dyn TokenStore) -> bool {
        let Some(message) = self.inbox.recv().await else {
            return false;
        };

        if message == RelayMessage::RequestToken {
            let token = match store.load_token() {
                Ok(token) => token,
                Err(e) => {
                    log::warn!("Failed to read token for worker: {}", e);
                    None
                }
            };
            if self
                .reply
                .send(RelayMessage::TokenResponse { token })
                .await
                .is_err()
            {
                return false;
            }
        }
        true
    }

    /// Answer token requests until the worker side goes away.
    pub async fn serve(mut self, store: Arc<dyn TokenStore>) {
        while self.handle_next(store.as_ref()).await {}
        log::debug!("Foreground context {} stopped serving", self.id);
    }
}
