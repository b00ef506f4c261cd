//! # Storage Module
//!
//! Everything that touches durable key-value storage goes through the
//! [`KeyValueStore`] port defined here. Adapters above it never reach for a
//! global.
//!
//! ## Storage Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         STORAGE SYSTEM                                  │
//! ├─────────────────────────────────────────────────────────────────────────┤
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │  AdaptiveStorage                                                │   │
//! │  │  picks an adapter from the active StorageMode                   │   │
//! │  └───────────────┬───────────────────────────────┬─────────────────┘   │
//! │                  │ Local                         │ Cloud               │
//! │                  ▼                               ▼                     │
//! │  ┌───────────────────────────┐   ┌───────────────────────────────┐    │
//! │  │  LocalPersistence         │◄──│  CloudSync                     │    │
//! │  │  user-record              │   │  1. write-through to local     │    │
//! │  │  user-record-backup       │   │  2. probe connectivity         │    │
//! │  └─────────────┬─────────────┘   │  3. POST /api/user-data        │    │
//! │                │                 └───────────────────────────────┘    │
//! │                ▼                                                       │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │  KeyValueStore (port)                                          │   │
//! │  │  MemoryStore  - tests, ephemeral sessions                      │   │
//! │  │  SqliteStore  - durable, file-backed                           │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Single-key writes are atomic. There is no cross-key transaction, so the
//! primary/backup pair written by a save is not atomic as a pair.

mod adaptive;
mod cloud;
mod local;
mod memory;
mod record;
mod schema;
mod sqlite;
mod stats;

pub use adaptive::AdaptiveStorage;
pub use cloud::CloudSync;
pub use local::LocalPersistence;
pub use memory::MemoryStore;
pub use record::{ChildProfile, DataSource, LoadOutcome, SaveOutcome, UserRecord};
pub use sqlite::SqliteStore;
pub use stats::StorageStats;

use async_trait::async_trait;
use serde::{de::DeserializeOwned, Serialize};

use crate::error::{Error, Result};

/// Key names for the application keyspace
pub mod keys {
    /// The persisted `StorageMode`
    pub const STORAGE_MODE_PREFERENCE: &str = "storage-mode-preference";

    /// The user record (primary copy)
    pub const USER_RECORD: &str = "user-record";

    /// Shadow copy written on every local save
    pub const USER_RECORD_BACKUP: &str = "user-record-backup";

    /// Locally registered identities
    pub const LOCAL_IDENTITY_ROSTER: &str = "local-identity-roster";

    /// Local-mode session capability
    pub const LOCAL_SESSION_TOKEN: &str = "local-session-token";

    /// Redacted identity for the local session
    pub const LOCAL_SESSION_IDENTITY: &str = "local-session-identity";

    /// Server-issued bearer token
    pub const REMOTE_SESSION_TOKEN: &str = "remote-session-token";

    /// Redacted identity for the cloud session
    pub const REMOTE_SESSION_IDENTITY: &str = "remote-session-identity";

    /// Every key the application owns
    pub const ALL: &[&str] = &[
        STORAGE_MODE_PREFERENCE,
        USER_RECORD,
        USER_RECORD_BACKUP,
        LOCAL_IDENTITY_ROSTER,
        LOCAL_SESSION_TOKEN,
        LOCAL_SESSION_IDENTITY,
        REMOTE_SESSION_TOKEN,
        REMOTE_SESSION_IDENTITY,
    ];
}

/// Durable key-value storage port
///
/// Implementations must make each single-key operation atomic. Calls are
/// async for uniformity with the remote path even when the backing store is
/// synchronous.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Read a value
    async fn get(&self, key: &str) -> Result<Option<String>>;

    /// Write a value, replacing any previous one
    async fn set(&self, key: &str, value: &str) -> Result<()>;

    /// Delete a value, returning whether it existed
    async fn remove(&self, key: &str) -> Result<bool>;

    /// List every stored key
    async fn keys(&self) -> Result<Vec<String>>;
}

/// Read and decode a JSON value
///
/// A value that exists but does not decode is reported as corruption rather
/// than silently treated as missing.
pub async fn get_json<T: DeserializeOwned>(
    store: &dyn KeyValueStore,
    key: &str,
) -> Result<Option<T>> {
    match store.get(key).await? {
        Some(raw) => serde_json::from_str(&raw)
            .map(Some)
            .map_err(|e| Error::StorageCorrupted(format!("{key}: {e}"))),
        None => Ok(None),
    }
}

/// Encode and write a JSON value
pub async fn set_json<T: Serialize + ?Sized>(
    store: &dyn KeyValueStore,
    key: &str,
    value: &T,
) -> Result<()> {
    let raw = serde_json::to_string(value)?;
    store.set(key, &raw).await
}
