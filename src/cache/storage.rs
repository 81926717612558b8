//! Named, enumerable cache partitions persisted in SQLite.

use std::path::PathBuf;

use rusqlite::{params, OptionalExtension, Row};

use crate::db::{Database, StorageError};

use super::{ProxyRequest, ProxyResponse, ResponseKind, ResponseSource};

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS caches (
    id   INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL UNIQUE
);
CREATE TABLE IF NOT EXISTS cache_entries (
    cache_name TEXT NOT NULL,
    method     TEXT NOT NULL,
    url        TEXT NOT NULL,
    status     INTEGER NOT NULL,
    headers    TEXT NOT NULL,
    body       BLOB NOT NULL,
    kind       TEXT NOT NULL,
    PRIMARY KEY (cache_name, method, url)
);";

fn response_from_row(row: &Row<'_>) -> rusqlite::Result<(u16, String, Vec<u8>, String)> {
    Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?))
}

fn decode_response(
    (status, headers, body, kind): (u16, String, Vec<u8>, String),
) -> Result<ProxyResponse, StorageError> {
    Ok(ProxyResponse {
        status,
        headers: serde_json::from_str(&headers)?,
        body,
        kind: ResponseKind::parse(&kind),
        source: ResponseSource::Cache,
    })
}

/// Set of named cache partitions.
#[derive(Clone)]
pub struct CacheStorage {
    db: Database,
}

impl CacheStorage {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            db: Database::new(path, SCHEMA),
        }
    }

    /// Open (creating if needed) the partition called `name`.
    pub async fn open(&self, name: &str) -> Result<Cache, StorageError> {
        let owned = name.to_string();
        self.db
            .call(move |conn| {
                conn.execute("INSERT OR IGNORE INTO caches (name) VALUES (?1)", [&owned])?;
                Ok(())
            })
            .await?;

        Ok(Cache {
            db: self.db.clone(),
            name: name.to_string(),
        })
    }

    /// Names of all partitions, oldest first.
    pub async fn keys(&self) -> Result<Vec<String>, StorageError> {
        self.db
            .call(|conn| {
                let mut stmt = conn.prepare("SELECT name FROM caches ORDER BY id")?;
                let names = stmt.query_map([], |r| r.get(0))?;
                Ok(names.collect::<rusqlite::Result<Vec<String>>>()?)
            })
            .await
    }

    pub async fn has(&self, name: &str) -> Result<bool, StorageError> {
        Ok(self.keys().await?.iter().any(|k| k == name))
    }

    /// Delete a partition and all its entries. Returns whether it existed.
    pub async fn delete(&self, name: &str) -> Result<bool, StorageError> {
        let name = name.to_string();
        self.db
            .call(move |conn| {
                let tx = conn.transaction()?;
                tx.execute("DELETE FROM cache_entries WHERE cache_name = ?1", [&name])?;
                let removed = tx.execute("DELETE FROM caches WHERE name = ?1", [&name])?;
                tx.commit()?;
                Ok(removed > 0)
            })
            .await
    }

    /// Look `request` up across every partition, oldest partition first.
    pub async fn match_any(
        &self,
        request: &ProxyRequest,
    ) -> Result<Option<ProxyResponse>, StorageError> {
        let method = request.method.to_string();
        let url = request.url.clone();
        let row = self
            .db
            .call(move |conn| {
                Ok(conn
                    .query_row(
                        "SELECT e.status, e.headers, e.body, e.kind
                         FROM cache_entries e JOIN caches c ON c.name = e.cache_name
                         WHERE e.method = ?1 AND e.url = ?2
                         ORDER BY c.id LIMIT 1",
                        params![method, url],
                        response_from_row,
                    )
                    .optional()?)
            })
            .await?;

        row.map(decode_response).transpose()
    }
}

/// One named partition.
#[derive(Clone)]
pub struct Cache {
    db: Database,
    name: String,
}

impl Cache {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Stored response for `request` in this partition only.
    pub async fn match_request(
        &self,
        request: &ProxyRequest,
    ) -> Result<Option<ProxyResponse>, StorageError> {
        let name = self.name.clone();
        let method = request.method.to_string();
        let url = request.url.clone();
        let row = self
            .db
            .call(move |conn| {
                Ok(conn
                    .query_row(
                        "SELECT status, headers, body, kind FROM cache_entries
                         WHERE cache_name = ?1 AND method = ?2 AND url = ?3",
                        params![name, method, url],
                        response_from_row,
                    )
                    .optional()?)
            })
            .await?;

        row.map(decode_response).transpose()
    }

    /// Store `response` for `request`, replacing any previous entry.
    pub async fn put(
        &self,
        request: &ProxyRequest,
        response: &ProxyResponse,
    ) -> Result<(), StorageError> {
        let name = self.name.clone();
        let method = request.method.to_string();
        let url = request.url.clone();
        let headers = serde_json::to_string(&response.headers)?;
        let body = response.body.clone();
        let status = response.status;
        let kind = response.kind.as_str();

        self.db
            .call(move |conn| {
                conn.execute(
                    "INSERT OR REPLACE INTO cache_entries
                        (cache_name, method, url, status, headers, body, kind)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                    params![name, method, url, status, headers, body, kind],
                )?;
                Ok(())
            })
            .await
    }

    /// Number of entries in this partition.
    pub async fn len(&self) -> Result<usize, StorageError> {
        let name = self.name.clone();
        self.db
            .call(move |conn| {
                let count: i64 = conn.query_row(
                    "SELECT COUNT(*) FROM cache_entries WHERE cache_name = ?1",
                    [&name],
                    |r| r.get(0),
                )?;
                Ok(count as usize)
            })
            .await
    }

    pub async fn is_empty(&self) -> Result<bool, StorageError> {
        Ok(self.len().await? == 0)
    }
}
