//! Lazily opened SQLite handle shared by the queue and cache stores.
//!
//! The connection is opened on first use and reused for the life of the
//! process; there is no explicit close. `tokio_rusqlite` runs every call on
//! the connection's own thread, one at a time, and each call executes as its
//! own SQLite transaction, so callers in different tasks never need
//! additional locking.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use rusqlite::Connection;
use thiserror::Error;
use tokio::sync::OnceCell;
use tokio_rusqlite::Connection as AsyncConnection;

/// Failure to open, read, write or delete from a local SQLite store.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("failed to open database at {path}: {source}")]
    Open {
        path: String,
        #[source]
        source: tokio_rusqlite::Error,
    },
    #[error("failed to create data directory: {0}")]
    Io(#[from] std::io::Error),
    #[error("database operation failed: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("database connection failed: {0}")]
    Connection(#[from] tokio_rusqlite::Error),
    #[error("failed to encode stored value: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Shared, lazily opened database handle.
///
/// Cloning is cheap; all clones share the same connection.
#[derive(Clone)]
pub struct Database {
    path: Arc<PathBuf>,
    schema: &'static str,
    conn: Arc<OnceCell<AsyncConnection>>,
}

impl Database {
    /// Describe a database at `path` with the given schema. Nothing is opened yet.
    pub fn new(path: impl Into<PathBuf>, schema: &'static str) -> Self {
        Self {
            path: Arc::new(path.into()),
            schema,
            conn: Arc::new(OnceCell::new()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn connection(&self) -> Result<AsyncConnection, StorageError> {
        let conn = self
            .conn
            .get_or_try_init(|| open_database(&self.path, self.schema))
            .await?;
        Ok(conn.clone())
    }

    /// Run `f` against the connection on its database thread.
    pub async fn call<T, F>(&self, f: F) -> Result<T, StorageError>
    where
        F: FnOnce(&mut Connection) -> Result<T, StorageError> + Send + 'static,
        T: Send + 'static,
    {
        let conn = self.connection().await?;
        conn.call(move |conn| Ok(f(conn))).await?
    }
}

async fn open_database(path: &Path, schema: &'static str) -> Result<AsyncConnection, StorageError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            tokio::fs::create_dir_all(parent).await?;
        }
    }

    let conn = AsyncConnection::open(path)
        .await
        .map_err(|source| StorageError::Open {
            path: path.display().to_string(),
            source,
        })?;
    conn.call(move |conn| Ok(conn.execute_batch(schema)))
        .await??;

    log::info!("Database opened: {}", path.display());
    Ok(conn)
}
