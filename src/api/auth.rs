//! Session token storage owned by the foreground context.
//!
//! The bearer token lives in the OS keychain via the `keyring` crate. The
//! background worker never reads it directly; it asks a foreground context
//! through the credential relay.

use std::sync::Mutex;

use keyring::Entry;
use thiserror::Error;

/// Keychain service name for the story app.
const SERVICE_NAME: &str = "dev.storyshare.sync";

/// Keychain account under which the session token is stored.
const TOKEN_ACCOUNT: &str = "token";

#[derive(Debug, Error)]
pub enum KeychainError {
    #[error("Keychain operation failed: {0}")]
    OperationFailed(String),
}

impl From<keyring::Error> for KeychainError {
    fn from(err: keyring::Error) -> Self {
        KeychainError::OperationFailed(err.to_string())
    }
}

/// Persistent key-value storage for the session token.
pub trait TokenStore: Send + Sync {
    /// Read the stored token. `None` when the user is logged out.
    fn load_token(&self) -> Result<Option<String>, KeychainError>;

    fn store_token(&self, token: &str) -> Result<(), KeychainError>;

    /// Remove the stored token. Idempotent.
    fn clear_token(&self) -> Result<(), KeychainError>;
}

/// Token store backed by the system keychain.
pub struct KeychainTokenStore {
    account: String,
}

impl KeychainTokenStore {
    pub fn new() -> Self {
        Self::with_account(TOKEN_ACCOUNT)
    }

    /// Use a distinct keychain account, e.g. one per API endpoint.
    pub fn with_account(account: &str) -> Self {
        Self {
            account: account.to_string(),
        }
    }

    fn entry(&self) -> Result<Entry, KeychainError> {
        Ok(Entry::new(SERVICE_NAME, &self.account)?)
    }
}

impl Default for KeychainTokenStore {
    fn default() -> Self {
        Self::new()
    }
}

impl TokenStore for KeychainTokenStore {
    fn load_token(&self) -> Result<Option<String>, KeychainError> {
        match self.entry()?.get_password() {
            Ok(token) => Ok(Some(token)),
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(e) => Err(KeychainError::from(e)),
        }
    }

    fn store_token(&self, token: &str) -> Result<(), KeychainError> {
        self.entry()?.set_password(token)?;
        Ok(())
    }

    fn clear_token(&self) -> Result<(), KeychainError> {
        match self.entry()?.delete_credential() {
            Ok(()) => Ok(()),
            Err(keyring::Error::NoEntry) => Ok(()), // Already deleted, idempotent
            Err(e) => Err(KeychainError::from(e)),
        }
    }
}

/// Process-local token store, for embedding and tests.
#[derive(Default)]
pub struct MemoryTokenStore {
    token: Mutex<Option<String>>,
}

impl MemoryTokenStore {
    pub fn with_token(token: &str) -> Self {
        Self {
            token: Mutex::new(Some(token.to_string())),
        }
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Option<String>>, KeychainError> {
        self.token
            .lock()
            .map_err(|_| KeychainError::OperationFailed("token lock poisoned".to_string()))
    }
}

impl TokenStore for MemoryTokenStore {
    fn load_token(&self) -> Result<Option<String>, KeychainError> {
        Ok(self.lock()?.clone())
    }

    fn store_token(&self, token: &str) -> Result<(), KeychainError> {
        *self.lock()? = Some(token.to_string());
        Ok(())
    }

    fn clear_token(&self) -> Result<(), KeychainError> {
        *self.lock()? = None;
        Ok(())
    }
}
