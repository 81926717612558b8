//! Durable store of submissions that have not reached the server yet.

use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use rand::Rng;
use rusqlite::{params, Row};
use serde::{Deserialize, Serialize};

use crate::db::{Database, StorageError};

use super::payload::{self, DecodedPhoto, PayloadError};

const SCHEMA: &str = "CREATE TABLE IF NOT EXISTS offline_stories (
    id            TEXT PRIMARY KEY NOT NULL,
    description   TEXT NOT NULL,
    photo_payload TEXT NOT NULL,
    lat           REAL,
    lon           REAL,
    sync_state    INTEGER NOT NULL DEFAULT 0
);";

/// A story waiting to be uploaded.
///
/// Created by the capture path, read and deleted by the replay engine, never
/// updated in place. `sync_state` is always `false` while the record is queued.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingSubmission {
    /// Local identifier. Empty until assigned by [`QueueStore::enqueue`].
    pub id: String,
    pub description: String,
    /// Photo content as a base64 data URL.
    pub photo_payload: String,
    pub lat: Option<f64>,
    pub lon: Option<f64>,
    pub sync_state: bool,
}

impl PendingSubmission {
    /// Build an unsaved record from raw photo bytes.
    pub fn new(
        description: impl Into<String>,
        photo_mime: &str,
        photo: &[u8],
        lat: Option<f64>,
        lon: Option<f64>,
    ) -> Self {
        Self {
            id: String::new(),
            description: description.into(),
            photo_payload: payload::encode_data_url(photo_mime, photo),
            lat,
            lon,
            sync_state: false,
        }
    }

    /// Decode the stored photo back to bytes.
    pub fn decode_photo(&self) -> Result<DecodedPhoto, PayloadError> {
        payload::decode_data_url(&self.photo_payload)
    }

    /// File name used when the photo is uploaded during replay.
    pub fn upload_file_name(&self) -> String {
        format!("offline_{}.jpg", self.id)
    }

    /// First 30 characters of the description, for notifications and listings.
    pub fn excerpt(&self) -> String {
        self.description.chars().take(30).collect()
    }

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            description: row.get(1)?,
            photo_payload: row.get(2)?,
            lat: row.get(3)?,
            lon: row.get(4)?,
            sync_state: row.get(5)?,
        })
    }
}

/// Generate a local identifier: `temp-<unix millis>-<7 base36 chars>`.
pub fn generate_local_id() -> String {
    const ALPHABET: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";

    let millis = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or(0);
    let mut rng = rand::thread_rng();
    let suffix: String = (0..7)
        .map(|_| ALPHABET[rng.gen_range(0..ALPHABET.len())] as char)
        .collect();

    format!("temp-{}-{}", millis, suffix)
}

/// Persistent queue of [`PendingSubmission`]s.
///
/// This store is the only record of what still needs uploading; nothing else
/// keeps pending submissions in memory. Clones share one lazily opened
/// connection.
#[derive(Clone)]
pub struct QueueStore {
    db: Database,
}

impl QueueStore {
    /// Create a store backed by the SQLite file at `path`. Opens on first use.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            db: Database::new(path, SCHEMA),
        }
    }

    pub fn path(&self) -> &Path {
        self.db.path()
    }

    /// Persist a record, assigning a fresh id if it has none.
    ///
    /// Fails if a record with the same id is already queued.
    pub async fn enqueue(
        &self,
        mut record: PendingSubmission,
    ) -> Result<PendingSubmission, StorageError> {
        if record.id.is_empty() {
            record.id = generate_local_id();
        }
        record.sync_state = false;

        let row = record.clone();
        self.db
            .call(move |conn| {
                conn.execute(
                    "INSERT INTO offline_stories
                        (id, description, photo_payload, lat, lon, sync_state)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                    params![
                        row.id,
                        row.description,
                        row.photo_payload,
                        row.lat,
                        row.lon,
                        row.sync_state
                    ],
                )?;
                Ok(())
            })
            .await?;

        log::info!("Queued offline story {}", record.id);
        Ok(record)
    }

    /// Every queued record, ordered by id. Callers must not rely on FIFO order.
    pub async fn list_all(&self) -> Result<Vec<PendingSubmission>, StorageError> {
        self.db
            .call(|conn| {
                let mut stmt = conn.prepare(
                    "SELECT id, description, photo_payload, lat, lon, sync_state
                     FROM offline_stories ORDER BY id",
                )?;
                let rows = stmt.query_map([], PendingSubmission::from_row)?;
                Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
            })
            .await
    }

    /// Delete the record with `id`. Deleting an absent id is a no-op.
    pub async fn remove(&self, id: &str) -> Result<(), StorageError> {
        let id = id.to_string();
        let removed = self
            .db
            .call(move |conn| Ok(conn.execute("DELETE FROM offline_stories WHERE id = ?1", [&id])?))
            .await?;

        if removed == 0 {
            log::debug!("Remove of absent offline story ignored");
        }
        Ok(())
    }

    /// Number of queued records.
    pub async fn len(&self) -> Result<usize, StorageError> {
        self.db
            .call(|conn| {
                let count: i64 =
                    conn.query_row("SELECT COUNT(*) FROM offline_stories", [], |r| r.get(0))?;
                Ok(count as usize)
            })
            .await
    }

    pub async fn is_empty(&self) -> Result<bool, StorageError> {
        Ok(self.len().await? == 0)
    }
}
