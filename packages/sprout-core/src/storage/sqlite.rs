//! # SQLite Store
//!
//! File-backed [`KeyValueStore`]. Each operation is a single statement, so
//! single-key writes are atomic.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use rusqlite::{params, Connection};

use super::{schema, KeyValueStore};
use crate::error::{Error, Result};

/// SQLite-backed key-value store
#[derive(Clone)]
pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStore {
    /// Open or create a store
    ///
    /// If path is None, creates an in-memory database (useful for testing).
    pub fn open(path: Option<&Path>) -> Result<Self> {
        let conn = match path {
            Some(p) => Connection::open(p)
                .map_err(|e| Error::DatabaseError(format!("Failed to open database: {}", e)))?,
            None => Connection::open_in_memory().map_err(|e| {
                Error::DatabaseError(format!("Failed to create in-memory database: {}", e))
            })?,
        };

        let store = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        store.init_schema()?;

        Ok(store)
    }

    fn init_schema(&self) -> Result<()> {
        let conn = self.conn.lock();

        let version: Option<i32> = conn
            .query_row("SELECT version FROM schema_version LIMIT 1", [], |row| row.get(0))
            .ok();

        match version {
            None => {
                conn.execute_batch(schema::CREATE_TABLES)
                    .map_err(|e| Error::DatabaseError(format!("Failed to create tables: {}", e)))?;
                conn.execute(
                    "INSERT INTO schema_version (version) VALUES (?)",
                    params![schema::SCHEMA_VERSION],
                )
                .map_err(|e| Error::DatabaseError(format!("Failed to set schema version: {}", e)))?;

                tracing::info!("Store schema created (version {})", schema::SCHEMA_VERSION);
            }
            Some(v) if v > schema::SCHEMA_VERSION => {
                return Err(Error::DatabaseError(format!(
                    "Store schema version {} is newer than supported {}",
                    v,
                    schema::SCHEMA_VERSION
                )));
            }
            Some(_) => {}
        }

        Ok(())
    }

    /// When a key was last written, in unix milliseconds
    pub fn updated_at(&self, key: &str) -> Result<Option<i64>> {
        let conn = self.conn.lock();
        let result = conn.query_row(
            "SELECT updated_at FROM kv_entries WHERE key = ?",
            params![key],
            |row| row.get(0),
        );
        match result {
            Ok(ts) => Ok(Some(ts)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(Error::StorageReadError(e.to_string())),
        }
    }
}

#[async_trait]
impl KeyValueStore for SqliteStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let conn = self.conn.lock();
        let result = conn.query_row(
            "SELECT value FROM kv_entries WHERE key = ?",
            params![key],
            |row| row.get(0),
        );
        match result {
            Ok(value) => Ok(Some(value)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(Error::StorageReadError(format!("Failed to read {}: {}", key, e))),
        }
    }

    async fn set(&self, key: &str, value: &str) -> Result<()> {
        let conn = self.conn.lock();
        let now = crate::time::now_timestamp_millis();
        conn.execute(
            "INSERT OR REPLACE INTO kv_entries (key, value, updated_at) VALUES (?, ?, ?)",
            params![key, value, now],
        )
        .map_err(|e| Error::StorageWriteError(format!("Failed to write {}: {}", key, e)))?;
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<bool> {
        let conn = self.conn.lock();
        let rows = conn
            .execute("DELETE FROM kv_entries WHERE key = ?", params![key])
            .map_err(|e| Error::StorageWriteError(format!("Failed to delete {}: {}", key, e)))?;
        Ok(rows > 0)
    }

    async fn keys(&self) -> Result<Vec<String>> {
        let conn = self.conn.lock();
        let mut stmt = conn
            .prepare("SELECT key FROM kv_entries ORDER BY key")
            .map_err(|e| Error::DatabaseError(format!("Failed to prepare query: {}", e)))?;
        let rows = stmt
            .query_map([], |row| row.get(0))
            .map_err(|e| Error::StorageReadError(format!("Failed to list keys: {}", e)))?;
        let mut keys = Vec::new();
        for row in rows {
            keys.push(row.map_err(|e| Error::StorageReadError(e.to_string()))?);
        }
        Ok(keys)
    }
}
