//! Single-file SQLite backend for the position store

use crate::error::{Result, StorageError};
use crate::kv::KeyValueStore;
use async_trait::async_trait;
use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info};

const SCHEMA: &str = "CREATE TABLE IF NOT EXISTS kv (
    key TEXT PRIMARY KEY NOT NULL,
    value BLOB NOT NULL
) WITHOUT ROWID;";

/// Key-value store persisted in one SQLite table
///
/// The connection is opened once and shared; calls run on the blocking pool.
#[derive(Clone)]
pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStore {
    /// Open (or create) the database file at `path`
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        info!("Opening position store at {}", path.display());

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| {
                StorageError::ConnectionError(format!("cannot create {}: {}", parent.display(), e))
            })?;
        }

        let conn = Connection::open(path)
            .map_err(|e| StorageError::ConnectionError(e.to_string()))?;
        Self::init(conn)
    }

    /// Private in-memory database
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()
            .map_err(|e| StorageError::ConnectionError(e.to_string()))?;
        Self::init(conn)
    }

    fn init(conn: Connection) -> Result<Self> {
        let mode: String = conn
            .pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get(0))
            .map_err(|e| StorageError::SchemaError(e.to_string()))?;
        debug!("SQLite journal mode: {}", mode);

        conn.execute_batch(SCHEMA)
            .map_err(|e| StorageError::SchemaError(e.to_string()))?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    async fn with_conn<T, F>(&self, f: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&Connection) -> Result<T> + Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let guard = conn.lock();
            f(&guard)
        })
        .await?
    }
}

#[async_trait]
impl KeyValueStore for SqliteStore {
    async fn get(&self, key: &str) -> Result<Vec<u8>> {
        let key = key.to_string();
        self.with_conn(move |conn| {
            let value = conn
                .query_row("SELECT value FROM kv WHERE key = ?1", params![key], |row| {
                    row.get::<_, Vec<u8>>(0)
                })
                .optional()?;
            value.ok_or(StorageError::NotFound(key))
        })
        .await
    }

    async fn put(&self, key: &str, value: &[u8]) -> Result<()> {
        let key = key.to_string();
        let value = value.to_vec();
        self.with_conn(move |conn| {
            conn.execute(
                "INSERT INTO kv (key, value) VALUES (?1, ?2)
                 ON CONFLICT(key) DO UPDATE SET value = excluded.value",
                params![key, value],
            )?;
            Ok(())
        })
        .await
    }

    async fn delete(&self, key: &str) -> Result<()> {
        let key = key.to_string();
        self.with_conn(move |conn| {
            conn.execute("DELETE FROM kv WHERE key = ?1", params![key])?;
            Ok(())
        })
        .await
    }

    async fn scan_prefix(&self, prefix: &str) -> Result<Vec<(String, Vec<u8>)>> {
        let prefix = prefix.to_string();
        self.with_conn(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT key, value FROM kv
                 WHERE substr(key, 1, length(?1)) = ?1
                 ORDER BY key",
            )?;
            let rows = stmt.query_map(params![prefix], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, Vec<u8>>(1)?))
            })?;

            let mut entries = Vec::new();
            for row in rows {
                entries.push(row?);
            }
            Ok(entries)
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_roundtrip_in_memory() {
        let store = SqliteStore::in_memory().unwrap();

        assert!(store.get("BTCUSDT/5m/EMA").await.unwrap_err().is_not_found());

        store.put("BTCUSDT/5m/EMA", br#"{"symbol":"BTCUSDT"}"#).await.unwrap();
        store.put("BTCUSDT/5m/EMA", br#"{"symbol":"BTCUSDT","position":"Long"}"#).await.unwrap();

        let value = store.get("BTCUSDT/5m/EMA").await.unwrap();
        assert_eq!(value, br#"{"symbol":"BTCUSDT","position":"Long"}"#.to_vec());

        store.delete("BTCUSDT/5m/EMA").await.unwrap();
        assert!(store.get("BTCUSDT/5m/EMA").await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn test_scan_prefix_is_ordered() {
        let store = SqliteStore::in_memory().unwrap();
        for key in ["SOLUSDT/1d/EMA", "BTCUSDT/5m/EMA", "BTCUSDT/1h/CDC", "BTCUSDTX/5m/EMA"] {
            store.put(key, b"{}").await.unwrap();
        }

        let keys: Vec<String> = store
            .scan_prefix("BTCUSDT/")
            .await
            .unwrap()
            .into_iter()
            .map(|(k, _)| k)
            .collect();
        assert_eq!(keys, vec!["BTCUSDT/1h/CDC", "BTCUSDT/5m/EMA"]);
    }

    #[tokio::test]
    async fn test_file_persists_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("positions.db");

        {
            let store = SqliteStore::open(&path).unwrap();
            store.put("ETHUSDT/4h/CDC", b"short").await.unwrap();
        }

        let reopened = SqliteStore::open(&path).unwrap();
        assert_eq!(reopened.get("ETHUSDT/4h/CDC").await.unwrap(), b"short".to_vec());
    }
}
